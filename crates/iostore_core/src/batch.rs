//! Batch processing of table-of-contents / bulk-data pairs.
//!
//! The [`BatchCoordinator`] runs the full pipeline for each pair, strictly one
//! pair at a time and in the order given:
//!
//! 1. Read and parse the table-of-contents file ([`TocDocument::parse`]).
//! 2. Resolve it against the batch [`IdRegistry`] ([`CollisionResolver`]).
//!    The first container to present an id keeps it; later ones are reassigned.
//! 3. If a new id was assigned and this is not a dry run, patch both files in
//!    place ([`patcher::apply`]).
//! 4. Collate the container's package ids into the batch-wide
//!    [`PackageIdMap`](crate::report::PackageIdMap) and warn about ids that an
//!    earlier container already referenced.
//!
//! Format, truncation and consistency errors are recorded in that container's
//! report and the batch moves on. [`Error::AllocationExhausted`] stops the batch.

use crate::error::{Error, Result};
use crate::patcher::{self, PatchOutcome};
use crate::registry::IdRegistry;
use crate::report::{BatchReport, ContainerReport, ContainerStatus, Warning};
use crate::resolver::CollisionResolver;
use crate::toc::TocDocument;
use camino::{Utf8Path, Utf8PathBuf};

/// Extension of table-of-contents files.
pub const TOC_EXTENSION: &str = "utoc";
/// Extension of bulk-data files.
pub const BULK_EXTENSION: &str = "ucas";

/// One container to process: a table-of-contents file and its bulk-data companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPaths {
    /// Display name, taken from the table-of-contents file name up to its first `.`.
    pub name: String,
    pub toc_path: Utf8PathBuf,
    pub bulk_path: Utf8PathBuf,
}

impl ContainerPaths {
    pub fn new(toc_path: impl Into<Utf8PathBuf>, bulk_path: impl Into<Utf8PathBuf>) -> Self {
        let toc_path = toc_path.into();
        Self {
            name: container_name(&toc_path),
            toc_path,
            bulk_path: bulk_path.into(),
        }
    }

    /// Pair a `.utoc` path with the `.ucas` file next to it.
    ///
    /// The bulk-data extension follows the letter case of the toc extension, so
    /// `Foo.UTOC` pairs with `Foo.UCAS`.
    pub fn from_toc_path(toc_path: impl Into<Utf8PathBuf>) -> Self {
        let toc_path = toc_path.into();
        let bulk_extension = bulk_extension_for(toc_path.extension().unwrap_or(TOC_EXTENSION));
        let bulk_path = toc_path.with_extension(bulk_extension);
        Self::new(toc_path, bulk_path)
    }
}

fn bulk_extension_for(toc_extension: &str) -> String {
    let mut toc_chars = toc_extension.chars();
    BULK_EXTENSION
        .chars()
        .map(|c| match toc_chars.next() {
            Some(t) if t.is_ascii_uppercase() => c.to_ascii_uppercase(),
            _ => c,
        })
        .collect()
}

fn container_name(toc_path: &Utf8Path) -> String {
    toc_path
        .file_name()
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(toc_path.as_str())
        .to_string()
}

/// Knobs for a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Give every container a new id, colliding or not.
    pub force_reassign: bool,
    /// Resolve and report, but do not write to any file.
    pub dry_run: bool,
}

/// Runs a batch of containers against one shared [`IdRegistry`].
///
/// Create it with [`new`](Self::new) (or [`with_registry`](Self::with_registry)
/// to start from pre-claimed ids), then either call [`run`](Self::run) with the
/// whole input list or drive it step by step with [`process`](Self::process).
#[derive(Debug)]
pub struct BatchCoordinator {
    registry: IdRegistry,
    resolver: CollisionResolver,
    options: BatchOptions,
    report: BatchReport,
}

impl BatchCoordinator {
    pub fn new(options: BatchOptions) -> Self {
        Self::with_registry(IdRegistry::new(), options)
    }

    pub fn with_registry(registry: IdRegistry, options: BatchOptions) -> Self {
        Self {
            registry,
            resolver: CollisionResolver::new().with_force_reassign(options.force_reassign),
            options,
            report: BatchReport {
                dry_run: options.dry_run,
                ..Default::default()
            },
        }
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    /// Report of everything processed so far.
    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    pub fn into_report(self) -> BatchReport {
        self.report
    }

    pub fn into_parts(self) -> (BatchReport, IdRegistry) {
        (self.report, self.registry)
    }

    /// Process every pair in order and return the batch report.
    ///
    /// Stops at the first fatal error; containers processed before it have
    /// already been patched.
    pub fn run<I>(mut self, pairs: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = ContainerPaths>,
    {
        for paths in pairs {
            self.process(&paths)?;
        }

        let report = &self.report;
        tracing::info!(
            "Batch complete: containers={} reassigned={} failed={} shared_package_ids={}",
            report.containers.len(),
            report.reassigned_count(),
            report.failed_count(),
            report.shared_packages().count()
        );
        Ok(self.report)
    }

    /// Process a single pair.
    ///
    /// Per-container failures are recorded in the returned report. Only fatal
    /// errors are returned as `Err`.
    pub fn process(&mut self, paths: &ContainerPaths) -> Result<&ContainerReport> {
        tracing::debug!("Processing container {} ({})", paths.name, paths.toc_path);

        let doc = match TocDocument::from_file_path(paths.toc_path.as_std_path()) {
            Ok(doc) => doc,
            Err(err) => return Ok(self.push_failed(paths, 0, err)),
        };

        let resolved = match self.resolver.resolve(&doc, &mut self.registry) {
            Ok(resolved) => resolved,
            Err(err) if err.is_fatal() => {
                tracing::error!("Aborting batch at {}: {}", paths.name, err);
                return Err(err);
            }
            Err(err) => return Ok(self.push_failed(paths, doc.container_id(), err)),
        };

        let mut warnings = resolved.warnings.clone();

        let status = match resolved.new_id {
            None => {
                tracing::debug!("No changes needed: {}", paths.name);
                ContainerStatus::Unchanged
            }
            Some(new_id) => {
                if !self.options.dry_run {
                    let outcome = patcher::apply(
                        &paths.toc_path,
                        &resolved.toc_writes,
                        &paths.bulk_path,
                        &resolved.bulk_writes,
                    );
                    match outcome {
                        Ok(PatchOutcome::Complete) => {}
                        Ok(PatchOutcome::Partial { reason }) => {
                            warnings.push(Warning::PartialPatch {
                                bulk_path: paths.bulk_path.clone(),
                                reason,
                            });
                        }
                        Err(err) => return Ok(self.push_failed(paths, resolved.old_id, err)),
                    }
                }
                tracing::info!(
                    "{}: {:016x} -> {:016x}",
                    paths.name,
                    resolved.old_id,
                    new_id
                );
                ContainerStatus::Reassigned
            }
        };

        for &package_id in &resolved.package_ids {
            let previous = self.report.package_ids.insert(package_id, &paths.name);
            if !previous.is_empty() {
                warnings.push(Warning::SharedPackageId {
                    package_id,
                    containers: previous,
                });
            }
        }

        for warning in &warnings {
            tracing::warn!("{}: {}", paths.name, warning);
        }

        Ok(self.push(ContainerReport {
            name: paths.name.clone(),
            toc_path: paths.toc_path.clone(),
            status,
            old_id: resolved.old_id,
            new_id: resolved.new_id.unwrap_or(0),
            package_count: resolved.package_ids.len(),
            warnings,
        }))
    }

    fn push_failed(
        &mut self,
        paths: &ContainerPaths,
        old_id: u64,
        err: Error,
    ) -> &ContainerReport {
        tracing::warn!("Skipping {}: {}", paths.name, err);
        self.push(ContainerReport {
            name: paths.name.clone(),
            toc_path: paths.toc_path.clone(),
            status: ContainerStatus::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
            old_id,
            new_id: 0,
            package_count: 0,
            warnings: Vec::new(),
        })
    }

    fn push(&mut self, report: ContainerReport) -> &ContainerReport {
        self.report.containers.push(report);
        &self.report.containers[self.report.containers.len() - 1]
    }
}
