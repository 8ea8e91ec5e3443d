//! Error types for container parsing, resolution and patching.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. Most variants abort processing of a single container and
//! leave its files untouched; only [`Error::AllocationExhausted`] stops a whole
//! batch (see [`Error::is_fatal`]).

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Region of a table-of-contents file, used to say where a file was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TocSection {
    Header,
    Entries,
    DataLocations,
    CompressedBlocks,
}

impl fmt::Display for TocSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TocSection::Header => "header",
            TocSection::Entries => "entry table",
            TocSection::DataLocations => "data-location table",
            TocSection::CompressedBlocks => "compressed-block table",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while processing a container.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (reading or opening the table-of-contents file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The header could not be decoded by `binrw`.
    #[error("Binary decode error: {0}")]
    BinRw(#[from] binrw::Error),

    /// The file is not a table-of-contents file, or its header is unusable.
    #[error("Invalid table-of-contents format: {0}")]
    Format(String),

    /// A table declared by the header extends past the end of the file.
    #[error("Truncated {section}: need {expected} bytes, file has {actual}")]
    TruncatedFile {
        section: TocSection,
        expected: u64,
        actual: u64,
    },

    /// The file parsed, but its tables disagree with each other.
    #[error("Inconsistent container: {0}")]
    Consistency(String),

    /// The id generator could not find an unclaimed value.
    #[error("Could not allocate a unique id after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    /// A value does not fit in a packed integer field.
    #[error("Value {value:#x} does not fit in {bits} bits")]
    Range { bits: u32, value: u64 },

    /// A patch would write outside the existing bounds of a file.
    #[error("Write of {len} bytes at offset {offset} exceeds file length {file_len}")]
    WriteOutOfBounds { offset: u64, len: u64, file_len: u64 },
}

/// Coarse classification of an [`Error`], suitable for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Io,
    Format,
    Truncated,
    Consistency,
    AllocationExhausted,
    Range,
}

impl Error {
    /// Whether this error must stop the whole batch rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::AllocationExhausted { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::WriteOutOfBounds { .. } => ErrorKind::Io,
            Error::BinRw(_) | Error::Format(_) => ErrorKind::Format,
            Error::TruncatedFile { .. } => ErrorKind::Truncated,
            Error::Consistency(_) => ErrorKind::Consistency,
            Error::AllocationExhausted { .. } => ErrorKind::AllocationExhausted,
            Error::Range { .. } => ErrorKind::Range,
        }
    }
}
