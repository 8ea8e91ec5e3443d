//! Finding `.utoc` / `.ucas` pairs on disk.

use crate::errors::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use iostore_core::batch::TOC_EXTENSION;
use iostore_core::ContainerPaths;
use walkdir::WalkDir;

/// Collect every table-of-contents file under `dirs`, paired with its bulk-data file.
///
/// Directories are walked in the order given, each one depth-first with
/// entries sorted by file name so repeated runs see the same order. A `.utoc`
/// found twice (overlapping directories) is listed once.
pub fn discover_containers(dirs: &[Utf8PathBuf]) -> Result<Vec<ContainerPaths>, CliError> {
    let mut pairs: Vec<ContainerPaths> = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            return Err(CliError::invalid_directory(dir.clone()));
        }

        for entry in WalkDir::new(dir.as_std_path())
            .sort_by_file_name()
            .into_iter()
            .filter_map(|x| x.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(path) = Utf8Path::from_path(entry.path()) else {
                tracing::warn!("Skipping non UTF-8 path {}", entry.path().display());
                continue;
            };
            if !is_toc_file(path) {
                continue;
            }
            if pairs.iter().any(|pair| pair.toc_path == path) {
                continue;
            }

            tracing::debug!("Found container {}", path);
            pairs.push(ContainerPaths::from_toc_path(path));
        }
    }

    if pairs.is_empty() {
        return Err(CliError::no_containers_found(dirs));
    }

    Ok(pairs)
}

fn is_toc_file(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(TOC_EXTENSION))
}
