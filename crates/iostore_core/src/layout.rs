//! Fixed-width records of the IoStore table-of-contents (`.utoc`) format.
//!
//! A table-of-contents file is laid out as:
//!
//! ```text
//! +------------------------------+  0
//! | TocHeader (144 bytes)        |
//! +------------------------------+  144
//! | TocEntry x entry_count       |  12 bytes each
//! +------------------------------+
//! | DataLocation x entry_count   |  10 bytes each, packed 40-bit big-endian
//! +------------------------------+
//! | CompressedBlock x block_count|  12 bytes each, packed little-endian
//! +------------------------------+
//! | compression names, directory index, ... (never written)
//! ```
//!
//! The header and entries are plain little-endian structs and are handled by
//! `binrw`. The two packed record types mix byte orders (big-endian in
//! [`DataLocation`], little-endian in [`CompressedBlock`]), so they go through
//! the explicit bounded-width helpers below instead.

use crate::error::{Error, Result};
use binrw::binrw;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Signature at the start of every table-of-contents file.
pub const TOC_MAGIC: [u8; 16] = *b"-==--==--==--==-";

pub const TOC_HEADER_SIZE: usize = 144;
pub const TOC_ENTRY_SIZE: usize = 12;
pub const DATA_LOCATION_SIZE: usize = 10;
pub const COMPRESSED_BLOCK_SIZE: usize = 12;

/// Byte offset of [`TocHeader::container_id`] inside the file.
pub const CONTAINER_ID_OFFSET: u64 = 56;

/// Type tag of the entry that names the container itself.
pub const CONTAINER_HEADER_CHUNK_TYPE: u8 = 10;

/// Container flag set when the payload is encrypted.
pub const CONTAINER_FLAG_ENCRYPTED: u8 = 0x02;

pub const UINT40_MAX: u64 = (1 << 40) - 1;
pub const UINT24_MAX: u64 = (1 << 24) - 1;

/// Read exactly five bytes as an unsigned integer in byte order `B`.
pub fn decode_uint40<B: ByteOrder>(bytes: &[u8]) -> Result<u64> {
    decode_packed::<B>(bytes, 5)
}

/// Read exactly three bytes as an unsigned integer in byte order `B`.
pub fn decode_uint24<B: ByteOrder>(bytes: &[u8]) -> Result<u32> {
    decode_packed::<B>(bytes, 3).map(|v| v as u32)
}

/// Encode `value` into five bytes in byte order `B`.
///
/// Fails with [`Error::Range`] if `value >= 2^40`.
pub fn encode_uint40<B: ByteOrder>(value: u64) -> Result<[u8; 5]> {
    if value > UINT40_MAX {
        return Err(Error::Range { bits: 40, value });
    }
    let mut buf = [0u8; 5];
    B::write_uint(&mut buf, value, 5);
    Ok(buf)
}

/// Encode `value` into three bytes in byte order `B`.
///
/// Fails with [`Error::Range`] if `value >= 2^24`.
pub fn encode_uint24<B: ByteOrder>(value: u32) -> Result<[u8; 3]> {
    let value = u64::from(value);
    if value > UINT24_MAX {
        return Err(Error::Range { bits: 24, value });
    }
    let mut buf = [0u8; 3];
    B::write_uint(&mut buf, value, 3);
    Ok(buf)
}

fn decode_packed<B: ByteOrder>(bytes: &[u8], width: usize) -> Result<u64> {
    if bytes.len() != width {
        return Err(Error::Format(format!(
            "expected {} bytes for a {}-bit integer, got {}",
            width,
            width * 8,
            bytes.len()
        )));
    }
    Ok(B::read_uint(bytes, width))
}

/// The 144-byte header at the start of a table-of-contents file.
///
/// Reserved fields are kept so the header can be written back byte-for-byte.
#[binrw]
#[brw(little, magic = b"-==--==--==--==-")]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocHeader {
    pub version: u8,
    pub reserved0: u8,
    pub reserved1: u16,
    pub header_size: u32,
    pub entry_count: u32,
    pub compressed_block_entry_count: u32,
    pub compressed_block_entry_size: u32,
    pub compression_method_name_count: u32,
    pub compression_method_name_length: u32,
    pub compression_block_size: u32,
    pub directory_index_size: u32,
    pub partition_count: u32,
    pub container_id: u64,
    pub encryption_key_guid: [u32; 4],
    pub container_flags: u8,
    pub reserved2: u8,
    pub reserved3: u16,
    pub perfect_hash_seeds_count: u32,
    pub partition_size: u64,
    pub chunks_without_perfect_hash_count: u32,
    pub reserved4: u32,
    pub reserved5: [u64; 5],
}

impl TocHeader {
    pub fn is_encrypted(&self) -> bool {
        self.container_flags & CONTAINER_FLAG_ENCRYPTED != 0
            || self.encryption_key_guid.iter().any(|&part| part != 0)
    }
}

/// One 12-byte chunk identifier record.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TocEntry {
    pub id: u64,
    pub reserved0: u16,
    pub reserved1: u8,
    pub chunk_type: u8,
}

impl TocEntry {
    pub fn is_container_header(&self) -> bool {
        self.chunk_type == CONTAINER_HEADER_CHUNK_TYPE
    }
}

/// Where a chunk lives in the bulk-data file's logical address space.
///
/// Stored as two packed 40-bit big-endian integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataLocation {
    pub offset: u64,
    pub length: u64,
}

impl DataLocation {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != DATA_LOCATION_SIZE {
            return Err(Error::Format(format!(
                "data-location record must be {} bytes, got {}",
                DATA_LOCATION_SIZE,
                bytes.len()
            )));
        }
        Ok(Self {
            offset: decode_uint40::<BigEndian>(&bytes[0..5])?,
            length: decode_uint40::<BigEndian>(&bytes[5..10])?,
        })
    }

    pub fn encode(&self) -> Result<[u8; DATA_LOCATION_SIZE]> {
        let mut out = [0u8; DATA_LOCATION_SIZE];
        out[0..5].copy_from_slice(&encode_uint40::<BigEndian>(self.offset)?);
        out[5..10].copy_from_slice(&encode_uint40::<BigEndian>(self.length)?);
        Ok(out)
    }

    /// First and last compressed-block indices covered by this range.
    ///
    /// An empty range covers only its first block.
    pub fn block_range(&self, block_size: u32) -> Option<(u64, u64)> {
        if block_size == 0 {
            return None;
        }
        let block_size = u64::from(block_size);
        let first = self.offset / block_size;
        let end = self.offset.checked_add(self.length)?;
        let last = end.div_ceil(block_size).saturating_sub(1).max(first);
        Some((first, last))
    }
}

/// One compressed block of the bulk-data file.
///
/// 40-bit offset, 24-bit compressed size, 24-bit uncompressed size and an 8-bit
/// compression method index, all little-endian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressedBlock {
    pub offset: u64,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub compression_method: u8,
}

impl CompressedBlock {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != COMPRESSED_BLOCK_SIZE {
            return Err(Error::Format(format!(
                "compressed-block record must be {} bytes, got {}",
                COMPRESSED_BLOCK_SIZE,
                bytes.len()
            )));
        }
        Ok(Self {
            offset: decode_uint40::<LittleEndian>(&bytes[0..5])?,
            compressed_size: decode_uint24::<LittleEndian>(&bytes[5..8])?,
            uncompressed_size: decode_uint24::<LittleEndian>(&bytes[8..11])?,
            compression_method: bytes[11],
        })
    }

    pub fn encode(&self) -> Result<[u8; COMPRESSED_BLOCK_SIZE]> {
        let mut out = [0u8; COMPRESSED_BLOCK_SIZE];
        out[0..5].copy_from_slice(&encode_uint40::<LittleEndian>(self.offset)?);
        out[5..8].copy_from_slice(&encode_uint24::<LittleEndian>(self.compressed_size)?);
        out[8..11].copy_from_slice(&encode_uint24::<LittleEndian>(self.uncompressed_size)?);
        out[11] = self.compression_method;
        Ok(out)
    }
}
