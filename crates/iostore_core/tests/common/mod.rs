//! Synthesized `.utoc` / `.ucas` pairs for integration tests.

#![allow(dead_code)]

use binrw::BinWrite;
use camino::{Utf8Path, Utf8PathBuf};
use iostore_core::layout::{
    CompressedBlock, DataLocation, TocEntry, TocHeader, COMPRESSED_BLOCK_SIZE,
    CONTAINER_HEADER_CHUNK_TYPE, TOC_HEADER_SIZE,
};
use iostore_core::ContainerPaths;
use std::io::Cursor;

pub const BLOCK_SIZE: u32 = 0x10000;
/// Physical offset of the container-header payload in every fixture `.ucas`.
pub const HEADER_PAYLOAD_OFFSET: u64 = 0x1040;
pub const BULK_LEN: usize = 0x2000;
pub const TRAILER: &[u8] = b"DIRECTORY-INDEX-AND-NAMES";

/// Describes one container to write to disk.
#[derive(Debug, Clone)]
pub struct ContainerFixture {
    pub container_id: u64,
    pub package_ids: Vec<u64>,
    pub header_entry_type: u8,
    pub container_flags: u8,
    pub perfect_hash_seeds: u32,
    /// Length of the container-header data location.
    pub header_length: u64,
}

impl ContainerFixture {
    pub fn new(container_id: u64) -> Self {
        Self {
            container_id,
            package_ids: vec![container_id ^ 0xA5A5_0000_0000_0001],
            header_entry_type: CONTAINER_HEADER_CHUNK_TYPE,
            container_flags: 0,
            perfect_hash_seeds: 0,
            header_length: 0x20,
        }
    }

    pub fn with_packages(mut self, ids: &[u64]) -> Self {
        self.package_ids = ids.to_vec();
        self
    }

    pub fn with_perfect_hash_seeds(mut self, seeds: u32) -> Self {
        self.perfect_hash_seeds = seeds;
        self
    }

    pub fn with_header_length(mut self, length: u64) -> Self {
        self.header_length = length;
        self
    }

    /// Store the container id under a non-header type tag.
    pub fn without_header_entry(mut self) -> Self {
        self.header_entry_type = 2;
        self
    }

    pub fn entry_count(&self) -> usize {
        self.package_ids.len() + 1
    }

    pub fn toc_bytes(&self) -> Vec<u8> {
        let entry_count = self.entry_count() as u32;
        let header = TocHeader {
            version: 3,
            header_size: TOC_HEADER_SIZE as u32,
            entry_count,
            compressed_block_entry_count: 2,
            compressed_block_entry_size: COMPRESSED_BLOCK_SIZE as u32,
            compression_method_name_count: 0,
            compression_block_size: BLOCK_SIZE,
            directory_index_size: TRAILER.len() as u32,
            partition_count: 1,
            container_id: self.container_id,
            container_flags: self.container_flags,
            perfect_hash_seeds_count: self.perfect_hash_seeds,
            partition_size: u64::MAX,
            ..Default::default()
        };

        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();
        for &id in &self.package_ids {
            TocEntry {
                id,
                chunk_type: 1,
                ..Default::default()
            }
            .write(&mut cursor)
            .unwrap();
        }
        TocEntry {
            id: self.container_id,
            chunk_type: self.header_entry_type,
            ..Default::default()
        }
        .write(&mut cursor)
        .unwrap();

        let mut bytes = cursor.into_inner();
        for index in 0..self.package_ids.len() {
            let location = DataLocation {
                offset: index as u64 * 0x100,
                length: 0x80,
            };
            bytes.extend_from_slice(&location.encode().unwrap());
        }
        let header_location = DataLocation {
            offset: u64::from(BLOCK_SIZE) + 0x40,
            length: self.header_length,
        };
        bytes.extend_from_slice(&header_location.encode().unwrap());

        for offset in [0u64, 0x1000] {
            let block = CompressedBlock {
                offset,
                compressed_size: 0x1000,
                uncompressed_size: BLOCK_SIZE,
                compression_method: 0,
            };
            bytes.extend_from_slice(&block.encode().unwrap());
        }

        bytes.extend_from_slice(TRAILER);
        bytes
    }

    pub fn bulk_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0xEE; BULK_LEN];
        let at = HEADER_PAYLOAD_OFFSET as usize;
        bytes[at..at + 8].copy_from_slice(&self.container_id.to_le_bytes());
        bytes
    }

    /// Write `<name>.utoc` and `<name>.ucas` into `dir`.
    pub fn write(&self, dir: &Utf8Path, name: &str) -> ContainerPaths {
        let paths = ContainerPaths::from_toc_path(dir.join(format!("{name}.utoc")));
        std::fs::write(&paths.toc_path, self.toc_bytes()).unwrap();
        std::fs::write(&paths.bulk_path, self.bulk_bytes()).unwrap();
        paths
    }
}

pub fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
}

/// Current contents of both files of a pair.
pub fn snapshot(paths: &ContainerPaths) -> (Vec<u8>, Vec<u8>) {
    (
        std::fs::read(&paths.toc_path).unwrap(),
        std::fs::read(&paths.bulk_path).unwrap(),
    )
}

pub fn bulk_id_at_header_payload(paths: &ContainerPaths) -> u64 {
    let bytes = std::fs::read(&paths.bulk_path).unwrap();
    let at = HEADER_PAYLOAD_OFFSET as usize;
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}
