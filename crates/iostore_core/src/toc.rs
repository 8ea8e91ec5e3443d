//! Parsed table-of-contents document.
//!
//! [`TocDocument::parse`] decodes the header and the three fixed-layout tables
//! that follow it. Table offsets are not stored in the file; they are derived
//! from the header counts:
//!
//! - entries start at byte 144
//! - data locations start at `144 + entry_count * 12`
//! - compressed blocks start at `144 + entry_count * 22`
//!
//! Everything after the compressed-block table (compression method names,
//! directory index, chunk metadata) is left alone.

use crate::error::{Error, Result, TocSection};
use crate::layout::{
    CompressedBlock, DataLocation, TocEntry, TocHeader, COMPRESSED_BLOCK_SIZE,
    CONTAINER_HEADER_CHUNK_TYPE, DATA_LOCATION_SIZE, TOC_ENTRY_SIZE, TOC_HEADER_SIZE, TOC_MAGIC,
};
use binrw::BinRead;
use std::io::Cursor;
use std::path::Path;

/// A table-of-contents file decoded into its header and tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocDocument {
    header: TocHeader,
    entries: Vec<TocEntry>,
    locations: Vec<DataLocation>,
    blocks: Vec<CompressedBlock>,
    file_len: u64,
}

impl TocDocument {
    /// Decode a table-of-contents file held in memory.
    ///
    /// Fails with [`Error::Format`] on a bad signature or an unusable header, and
    /// with [`Error::TruncatedFile`] when a table runs past the end of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let file_len = bytes.len() as u64;

        if bytes.len() < TOC_HEADER_SIZE {
            return Err(Error::Format(format!(
                "header needs {} bytes, file has {}",
                TOC_HEADER_SIZE, file_len
            )));
        }
        if bytes[..TOC_MAGIC.len()] != TOC_MAGIC {
            return Err(Error::Format(format!(
                "invalid magic {}, expected {}",
                hex::encode(&bytes[..TOC_MAGIC.len()]),
                hex::encode(TOC_MAGIC)
            )));
        }

        let header = TocHeader::read(&mut Cursor::new(&bytes[..TOC_HEADER_SIZE]))?;
        validate_header(&header)?;

        let layout = TableLayout::new(&header);
        layout.check_len(file_len)?;

        let entries = bytes[layout.entries.0 as usize..layout.entries.1 as usize]
            .chunks_exact(TOC_ENTRY_SIZE)
            .map(|chunk| TocEntry::read(&mut Cursor::new(chunk)).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        let locations = bytes[layout.locations.0 as usize..layout.locations.1 as usize]
            .chunks_exact(DATA_LOCATION_SIZE)
            .map(DataLocation::decode)
            .collect::<Result<Vec<_>>>()?;

        let blocks = bytes[layout.blocks.0 as usize..layout.blocks.1 as usize]
            .chunks_exact(COMPRESSED_BLOCK_SIZE)
            .map(CompressedBlock::decode)
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(
            "Parsed toc: entries={} blocks={} container_id={:016x}",
            entries.len(),
            blocks.len(),
            header.container_id
        );

        Ok(Self {
            header,
            entries,
            locations,
            blocks,
            file_len,
        })
    }

    /// Read and parse a table-of-contents file from disk.
    pub fn from_file_path<P: AsRef<Path> + ?Sized>(path: &P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn header(&self) -> &TocHeader {
        &self.header
    }

    pub fn container_id(&self) -> u64 {
        self.header.container_id
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn compressed_blocks(&self) -> &[CompressedBlock] {
        &self.blocks
    }

    /// Length of the file this document was parsed from.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn is_encrypted(&self) -> bool {
        self.header.is_encrypted()
    }

    pub fn entries_offset(&self) -> u64 {
        TOC_HEADER_SIZE as u64
    }

    pub fn locations_offset(&self) -> u64 {
        TableLayout::new(&self.header).locations.0
    }

    pub fn blocks_offset(&self) -> u64 {
        TableLayout::new(&self.header).blocks.0
    }

    /// Byte offset of the entry at `index` inside the file.
    pub fn entry_offset(&self, index: usize) -> u64 {
        self.entries_offset() + index as u64 * TOC_ENTRY_SIZE as u64
    }

    /// Index of the first entry with the given id and type tag.
    pub fn find_entry(&self, id: u64, chunk_type: u8) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.id == id && entry.chunk_type == chunk_type)
    }

    /// Index of the container-header entry whose id matches the header's container id.
    pub fn container_header_index(&self) -> Option<usize> {
        self.find_entry(self.header.container_id, CONTAINER_HEADER_CHUNK_TYPE)
    }

    pub fn data_location(&self, index: usize) -> Option<DataLocation> {
        self.locations.get(index).copied()
    }

    /// Map a logical offset to a physical byte offset in the bulk-data file.
    ///
    /// The logical offset is split into a compressed-block index and a remainder;
    /// the result is that block's physical offset plus the remainder.
    pub fn physical_offset_for(&self, logical_offset: u64) -> Result<u64> {
        let block_size = u64::from(self.header.compression_block_size);
        if block_size == 0 {
            return Err(Error::Format("compression block size is zero".into()));
        }

        let block_index = logical_offset / block_size;
        let block = usize::try_from(block_index)
            .ok()
            .and_then(|idx| self.blocks.get(idx))
            .ok_or_else(|| {
                Error::Consistency(format!(
                    "logical offset {:#x} maps to block {} but only {} blocks exist",
                    logical_offset,
                    block_index,
                    self.blocks.len()
                ))
            })?;

        block
            .offset
            .checked_add(logical_offset % block_size)
            .ok_or_else(|| Error::Consistency("physical offset overflows u64".into()))
    }

    /// Identifiers of every entry that is not the container header, in table order.
    pub fn package_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries
            .iter()
            .filter(|entry| !entry.is_container_header())
            .map(|entry| entry.id)
    }
}

fn validate_header(header: &TocHeader) -> Result<()> {
    if header.entry_count > 0 && header.compression_block_size == 0 {
        return Err(Error::Format(
            "compression block size is zero but the container has entries".into(),
        ));
    }
    if header.compressed_block_entry_count > 0
        && header.compressed_block_entry_size as usize != COMPRESSED_BLOCK_SIZE
    {
        return Err(Error::Format(format!(
            "compressed-block entry size is {}, expected {}",
            header.compressed_block_entry_size, COMPRESSED_BLOCK_SIZE
        )));
    }
    Ok(())
}

/// Start and end byte offsets of the three fixed tables.
struct TableLayout {
    entries: (u64, u64),
    locations: (u64, u64),
    blocks: (u64, u64),
}

impl TableLayout {
    fn new(header: &TocHeader) -> Self {
        let entry_count = u64::from(header.entry_count);
        let block_count = u64::from(header.compressed_block_entry_count);

        let entries_start = TOC_HEADER_SIZE as u64;
        let locations_start = entries_start + entry_count * TOC_ENTRY_SIZE as u64;
        let blocks_start = locations_start + entry_count * DATA_LOCATION_SIZE as u64;
        let blocks_end = blocks_start + block_count * COMPRESSED_BLOCK_SIZE as u64;

        Self {
            entries: (entries_start, locations_start),
            locations: (locations_start, blocks_start),
            blocks: (blocks_start, blocks_end),
        }
    }

    fn check_len(&self, file_len: u64) -> Result<()> {
        let sections = [
            (TocSection::Entries, self.entries.1),
            (TocSection::DataLocations, self.locations.1),
            (TocSection::CompressedBlocks, self.blocks.1),
        ];
        for (section, end) in sections {
            if end > file_len {
                return Err(Error::TruncatedFile {
                    section,
                    expected: end,
                    actual: file_len,
                });
            }
        }
        Ok(())
    }
}
