//! Container id collision detection and rewrite planning.
//!
//! # Algorithm
//!
//! 1. Look up the header's container id in the [`IdRegistry`]. If it is free
//!    (and reassignment is not forced), record it and stop: the container is
//!    [`ContainerState::Unseen`] and nothing is rewritten.
//! 2. Otherwise the container is [`ContainerState::Colliding`]:
//!    - find the type-10 entry carrying the old id (missing entry is a
//!      [`Error::Consistency`]),
//!    - resolve that entry's data location to a compressed block and then to a
//!      physical offset in the bulk-data file,
//!    - claim a fresh id and plan three 8-byte little-endian writes: the header
//!      container id field, the entry id field, and the copy at the start of
//!      the container-header payload in the bulk-data file.
//! 3. Every other entry id is collected as a package id. Package ids are only
//!    collated; rewriting them would also require patching references inside
//!    the bulk-data payload, which this crate does not parse.
//!
//! All lookups happen before the new id is claimed, so a container that fails
//! step 2 leaves the registry as it found it.

use crate::error::{Error, Result};
use crate::layout::{CONTAINER_HEADER_CHUNK_TYPE, CONTAINER_ID_OFFSET};
use crate::patcher::PatchWrite;
use crate::registry::{IdRegistry, IdScope};
use crate::report::Warning;
use crate::toc::TocDocument;

/// Where a container stands relative to the ids seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Id not seen before; recorded, left as is.
    Unseen,
    /// Id already claimed earlier in the batch, or reassignment was forced.
    Colliding,
}

/// Everything the patcher and the batch report need to know about one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContainer {
    pub state: ContainerState,
    pub old_id: u64,
    /// `Some` when the container was given a new id.
    pub new_id: Option<u64>,
    /// Writes into the table-of-contents file.
    pub toc_writes: Vec<PatchWrite>,
    /// Writes into the bulk-data file.
    pub bulk_writes: Vec<PatchWrite>,
    pub package_ids: Vec<u64>,
    pub warnings: Vec<Warning>,
}

impl ResolvedContainer {
    pub fn needs_patch(&self) -> bool {
        !self.toc_writes.is_empty() || !self.bulk_writes.is_empty()
    }
}

/// Decides whether a container needs a new id and plans the rewrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionResolver {
    force_reassign: bool,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassign every container, even ones whose id is not taken yet.
    pub fn with_force_reassign(mut self, force: bool) -> Self {
        self.force_reassign = force;
        self
    }

    pub fn classify(&self, doc: &TocDocument, registry: &IdRegistry) -> ContainerState {
        if self.force_reassign || registry.is_claimed(IdScope::Container, doc.container_id()) {
            ContainerState::Colliding
        } else {
            ContainerState::Unseen
        }
    }

    /// Resolve one parsed container against the batch registry.
    ///
    /// On success the registry has been updated (the old id marked seen, or the
    /// new id claimed) and the returned plan lists every write. On error the
    /// registry is unchanged and nothing should be written.
    pub fn resolve(
        &self,
        doc: &TocDocument,
        registry: &mut IdRegistry,
    ) -> Result<ResolvedContainer> {
        let old_id = doc.container_id();
        let package_ids: Vec<u64> = doc.package_ids().collect();
        let mut warnings = Vec::new();

        if doc.is_encrypted() {
            warnings.push(Warning::Encrypted);
        }

        let header = doc.header();
        if header.perfect_hash_seeds_count > 0 || header.chunks_without_perfect_hash_count > 0 {
            warnings.push(Warning::PerfectHashSeeds {
                seeds: header.perfect_hash_seeds_count,
                without_perfect_hash: header.chunks_without_perfect_hash_count,
            });
        }

        let state = self.classify(doc, registry);
        if state == ContainerState::Unseen {
            registry.mark_seen(IdScope::Container, old_id);
            for &id in &package_ids {
                registry.mark_seen(IdScope::Chunk, id);
            }
            return Ok(ResolvedContainer {
                state,
                old_id,
                new_id: None,
                toc_writes: Vec::new(),
                bulk_writes: Vec::new(),
                package_ids,
                warnings,
            });
        }

        let entry_index = doc
            .find_entry(old_id, CONTAINER_HEADER_CHUNK_TYPE)
            .ok_or_else(|| {
                Error::Consistency(format!(
                    "no container-header entry (type {}) carries container id {:016x}",
                    CONTAINER_HEADER_CHUNK_TYPE, old_id
                ))
            })?;

        let location = doc.data_location(entry_index).ok_or_else(|| {
            Error::Consistency(format!("entry {} has no data location", entry_index))
        })?;

        let block_size = doc.header().compression_block_size;
        let (_, last_block) = location.block_range(block_size).ok_or_else(|| {
            Error::Consistency(format!(
                "data location {:#x}+{:#x} cannot be mapped with block size {}",
                location.offset, location.length, block_size
            ))
        })?;
        if last_block >= doc.compressed_blocks().len() as u64 {
            return Err(Error::Consistency(format!(
                "container header spans blocks up to {} but only {} blocks exist",
                last_block,
                doc.compressed_blocks().len()
            )));
        }
        let bulk_offset = doc.physical_offset_for(location.offset)?;

        let new_id = registry.claim(IdScope::Container, None)?;
        registry.mark_seen(IdScope::Container, old_id);
        for &id in &package_ids {
            registry.mark_seen(IdScope::Chunk, id);
        }

        tracing::debug!(
            "Planned container id rewrite {:016x} -> {:016x} (entry={} bulk_offset={:#x})",
            old_id,
            new_id,
            entry_index,
            bulk_offset
        );

        Ok(ResolvedContainer {
            state,
            old_id,
            new_id: Some(new_id),
            toc_writes: vec![
                PatchWrite::id(CONTAINER_ID_OFFSET, new_id),
                PatchWrite::id(doc.entry_offset(entry_index), new_id),
            ],
            bulk_writes: vec![PatchWrite::id(bulk_offset, new_id)],
            package_ids,
            warnings,
        })
    }
}
