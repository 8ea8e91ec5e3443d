//! In-place patching of table-of-contents and bulk-data files.
//!
//! Files are opened for random-access update, never created, truncated or
//! extended. Every write is bounds-checked against the current file length
//! before the first byte is written, so a rejected write set leaves the file
//! untouched.

use crate::error::{Error, Result};
use camino::Utf8Path;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

/// Eight bytes to overwrite at a fixed file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchWrite {
    pub offset: u64,
    pub bytes: [u8; 8],
}

impl PatchWrite {
    /// A write of `id` encoded little-endian at `offset`.
    pub fn id(offset: u64, id: u64) -> Self {
        Self {
            offset,
            bytes: id.to_le_bytes(),
        }
    }

    fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.bytes.len() as u64)
    }
}

/// Result of [`apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Both files were written.
    Complete,
    /// The table-of-contents file was written but the bulk-data file was not.
    /// The table-of-contents write is not rolled back.
    Partial { reason: String },
}

/// Apply `toc_writes` to `toc_path`, then `bulk_writes` to `bulk_path`.
///
/// A failure on the table-of-contents file is returned as an error and the
/// bulk-data file is not touched. Open and bounds failures happen before any
/// byte is written; an I/O error part-way through the writes leaves the earlier
/// ones in place. A failure on the bulk-data file is returned as
/// [`PatchOutcome::Partial`].
pub fn apply(
    toc_path: &Utf8Path,
    toc_writes: &[PatchWrite],
    bulk_path: &Utf8Path,
    bulk_writes: &[PatchWrite],
) -> Result<PatchOutcome> {
    write_in_place(toc_path, toc_writes)?;
    tracing::debug!("Patched {} write(s) into {}", toc_writes.len(), toc_path);

    match write_in_place(bulk_path, bulk_writes) {
        Ok(()) => {
            tracing::debug!("Patched {} write(s) into {}", bulk_writes.len(), bulk_path);
            Ok(PatchOutcome::Complete)
        }
        Err(err) => {
            tracing::warn!(
                "Bulk data {} not patched after {} was updated: {}",
                bulk_path,
                toc_path,
                err
            );
            Ok(PatchOutcome::Partial {
                reason: err.to_string(),
            })
        }
    }
}

/// Overwrite `writes` in the existing file at `path`.
pub fn write_in_place(path: &Utf8Path, writes: &[PatchWrite]) -> Result<()> {
    if writes.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path.as_std_path())?;
    let file_len = file.metadata()?.len();

    for write in writes {
        match write.end() {
            Some(end) if end <= file_len => {}
            _ => {
                return Err(Error::WriteOutOfBounds {
                    offset: write.offset,
                    len: write.bytes.len() as u64,
                    file_len,
                })
            }
        }
    }

    for write in writes {
        file.seek(SeekFrom::Start(write.offset))?;
        file.write_all(&write.bytes)?;
    }
    file.flush()?;

    Ok(())
}
