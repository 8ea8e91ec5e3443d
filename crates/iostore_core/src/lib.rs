//! Container id collision resolver for IoStore (`.utoc` / `.ucas`) mod archives.
//!
//! Mods built independently often ship containers with the same 64-bit
//! container id. The engine then treats them as one container and silently
//! drops content. This crate finds those collisions across a batch of
//! table-of-contents files and rewrites the id everywhere it is stored:
//!
//! - **Header**: the container id field at byte 56 of the `.utoc` file
//! - **Entry table**: the type-10 ("container header") entry carrying the id
//! - **Bulk data**: the copy at the start of the container-header payload in
//!   the `.ucas` file, located through the data-location and compressed-block
//!   tables
//!
//! Package (chunk) ids shared between containers are collated and reported but
//! never rewritten.
//!
//! # Example
//!
//! ```no_run
//! use iostore_core::{BatchCoordinator, BatchOptions, ContainerPaths};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pairs = vec![
//!     ContainerPaths::from_toc_path("mods/ModA_P.utoc"),
//!     ContainerPaths::from_toc_path("mods/ModB_P.utoc"),
//! ];
//!
//! let report = BatchCoordinator::new(BatchOptions::default()).run(pairs)?;
//! for (name, old_id, new_id) in report.reassigned() {
//!     println!("{name}: {old_id:016x} -> {new_id:016x}");
//! }
//! for (package_id, containers) in report.shared_packages() {
//!     println!("{package_id:016x} shared by {containers:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
pub mod layout;
pub mod patcher;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod toc;

// Re-export main types
pub use batch::{BatchCoordinator, BatchOptions, ContainerPaths};
pub use error::{Error, ErrorKind, Result, TocSection};
pub use patcher::{PatchOutcome, PatchWrite};
pub use registry::{IdRegistry, IdScope};
pub use report::{BatchReport, ContainerReport, ContainerStatus, PackageIdMap, Severity, Warning};
pub use resolver::{CollisionResolver, ContainerState, ResolvedContainer};
pub use toc::TocDocument;
