//! Per-container and per-batch results handed back to the caller.
//!
//! Everything here is [`Serialize`] (camelCase) so a front end can print it,
//! log it or emit it as JSON without knowing about the parsing internals.

use crate::error::ErrorKind;
use camino::Utf8PathBuf;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// How urgently a [`Warning`] should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Warning,
    High,
}

/// A non-fatal problem noticed while processing a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Warning {
    /// The table-of-contents file was patched but the bulk-data copy was not.
    /// The pair now disagrees about its container id.
    #[serde(rename_all = "camelCase")]
    PartialPatch {
        bulk_path: Utf8PathBuf,
        reason: String,
    },

    /// The container is encrypted. It was processed as if it were not.
    Encrypted,

    /// The header declares perfect-hash tables; the compressed-block table
    /// offset was still derived without them.
    #[serde(rename_all = "camelCase")]
    PerfectHashSeeds {
        seeds: u32,
        without_perfect_hash: u32,
    },

    /// A package id of this container was already referenced by earlier
    /// containers in the batch. Package ids are never rewritten.
    #[serde(rename_all = "camelCase")]
    SharedPackageId {
        package_id: u64,
        containers: Vec<String>,
    },
}

impl Warning {
    pub fn severity(&self) -> Severity {
        match self {
            Warning::PartialPatch { .. } => Severity::High,
            Warning::SharedPackageId { .. } => Severity::Warning,
            Warning::Encrypted | Warning::PerfectHashSeeds { .. } => Severity::Info,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::PartialPatch { bulk_path, reason } => write!(
                f,
                "table of contents updated but bulk data '{}' was not: {}",
                bulk_path, reason
            ),
            Warning::Encrypted => f.write_str("container is encrypted; patched as plain data"),
            Warning::PerfectHashSeeds {
                seeds,
                without_perfect_hash,
            } => write!(
                f,
                "header declares {} perfect-hash seeds and {} chunks without perfect hash; \
                 compressed-block offsets assume neither table is present",
                seeds, without_perfect_hash
            ),
            Warning::SharedPackageId {
                package_id,
                containers,
            } => write!(
                f,
                "package id {:016x} is also used by {}",
                package_id,
                containers.join(", ")
            ),
        }
    }
}

/// What happened to one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ContainerStatus {
    /// First owner of its id; nothing was written.
    Unchanged,
    /// Given a new id (written to disk unless the batch was a dry run).
    Reassigned,
    /// Processing stopped with an error.
    ///
    /// Parse, consistency and bounds failures happen before any write. An I/O
    /// error while writing the table-of-contents file itself can leave the
    /// writes that preceded it in place; `kind` is then [`ErrorKind::Io`].
    Failed { kind: ErrorKind, message: String },
}

/// Result of processing one table-of-contents / bulk-data pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerReport {
    pub name: String,
    pub toc_path: Utf8PathBuf,
    #[serde(flatten)]
    pub status: ContainerStatus,
    /// Container id read from the file (0 if the file could not be parsed).
    pub old_id: u64,
    /// Replacement id, or 0 if the container kept its id.
    pub new_id: u64,
    pub package_count: usize,
    pub warnings: Vec<Warning>,
}

impl ContainerReport {
    pub fn is_reassigned(&self) -> bool {
        matches!(self.status, ContainerStatus::Reassigned)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ContainerStatus::Failed { .. })
    }

    /// Highest severity among this container's warnings.
    pub fn max_severity(&self) -> Option<Severity> {
        self.warnings.iter().map(Warning::severity).max()
    }
}

/// Package id -> names of the containers referencing it.
///
/// Iterates in first-insertion order so reports are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIdMap {
    order: Vec<u64>,
    owners: HashMap<u64, Vec<String>>,
}

impl PackageIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `container` references `package_id`.
    ///
    /// Returns the containers that referenced it before this call. A container
    /// is listed at most once per id.
    pub fn insert(&mut self, package_id: u64, container: &str) -> Vec<String> {
        let owners = self.owners.entry(package_id).or_insert_with(|| {
            self.order.push(package_id);
            Vec::new()
        });

        let previous = owners
            .iter()
            .filter(|name| name.as_str() != container)
            .cloned()
            .collect();
        if !owners.iter().any(|name| name == container) {
            owners.push(container.to_string());
        }
        previous
    }

    pub fn get(&self, package_id: u64) -> Option<&[String]> {
        self.owners.get(&package_id).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[String])> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.get(*id).map(|names| (*id, names)))
    }

    /// Package ids referenced by more than one container.
    pub fn shared(&self) -> impl Iterator<Item = (u64, &[String])> + '_ {
        self.iter().filter(|(_, names)| names.len() > 1)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackageRefs<'a> {
    package_id: u64,
    containers: &'a [String],
}

impl Serialize for PackageIdMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|(package_id, containers)| PackageRefs {
            package_id,
            containers,
        }))
    }
}

/// Summary of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Whether the batch ran without touching any file.
    pub dry_run: bool,
    /// One report per input pair, in processing order.
    pub containers: Vec<ContainerReport>,
    pub package_ids: PackageIdMap,
}

impl BatchReport {
    /// `(name, old id, new id)` for every reassigned container, in processing order.
    pub fn reassigned(&self) -> impl Iterator<Item = (&str, u64, u64)> + '_ {
        self.containers
            .iter()
            .filter(|c| c.is_reassigned())
            .map(|c| (c.name.as_str(), c.old_id, c.new_id))
    }

    pub fn failed(&self) -> impl Iterator<Item = &ContainerReport> + '_ {
        self.containers.iter().filter(|c| c.is_failed())
    }

    /// Package ids shared between containers. These are reported, never rewritten.
    pub fn shared_packages(&self) -> impl Iterator<Item = (u64, &[String])> + '_ {
        self.package_ids.shared()
    }

    pub fn reassigned_count(&self) -> usize {
        self.reassigned().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}
