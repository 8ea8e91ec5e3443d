//! Batch-wide registry of claimed container and chunk ids.
//!
//! The registry is created once per batch and passed by reference into every
//! resolution call. It only grows while the batch runs; nothing is persisted.
//! Container ids and chunk ids live in separate namespaces ([`IdScope`]).

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt;

/// How many random candidates [`IdRegistry::claim`] tries before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 10;

/// Source of candidate ids. Defaults to [`random_id`].
pub type IdGenerator = Box<dyn FnMut() -> u64 + Send>;

/// Namespace an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdScope {
    Container,
    Chunk,
}

/// Draw a random 64-bit id from a v4 UUID.
pub fn random_id() -> u64 {
    uuid::Uuid::new_v4().as_u128() as u64
}

/// Set of ids already present in the batch, per scope.
///
/// Id `0` is never handed out by [`claim`](Self::claim) since reports use it to
/// mean "unchanged".
pub struct IdRegistry {
    containers: HashSet<u64>,
    chunks: HashSet<u64>,
    generator: IdGenerator,
}

impl Default for IdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdRegistry")
            .field("containers", &self.containers.len())
            .field("chunks", &self.chunks.len())
            .finish_non_exhaustive()
    }
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::with_generator(random_id)
    }

    /// Create a registry that draws candidates from `generator`.
    ///
    /// Mostly useful for tests that need deterministic or colliding ids.
    pub fn with_generator<F>(generator: F) -> Self
    where
        F: FnMut() -> u64 + Send + 'static,
    {
        Self {
            containers: HashSet::new(),
            chunks: HashSet::new(),
            generator: Box::new(generator),
        }
    }

    /// Pre-populate a scope, e.g. with ids of base-game containers.
    pub fn seed<I>(&mut self, scope: IdScope, ids: I)
    where
        I: IntoIterator<Item = u64>,
    {
        self.set_mut(scope).extend(ids);
    }

    pub fn is_claimed(&self, scope: IdScope, id: u64) -> bool {
        self.set(scope).contains(&id)
    }

    /// Record an id that already exists on disk.
    ///
    /// Returns `true` if the id was not known before.
    pub fn mark_seen(&mut self, scope: IdScope, id: u64) -> bool {
        self.set_mut(scope).insert(id)
    }

    /// Claim a fresh id in `scope`.
    ///
    /// `hint` is used as-is when it is non-zero and unclaimed. Otherwise up to
    /// [`MAX_ALLOCATION_ATTEMPTS`] generated candidates are tried; if none is
    /// free the call fails with [`Error::AllocationExhausted`].
    pub fn claim(&mut self, scope: IdScope, hint: Option<u64>) -> Result<u64> {
        if let Some(id) = hint.filter(|&id| id != 0) {
            if self.mark_seen(scope, id) {
                return Ok(id);
            }
        }

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let candidate = (self.generator)();
            if candidate != 0 && self.mark_seen(scope, candidate) {
                return Ok(candidate);
            }
        }

        Err(Error::AllocationExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    pub fn len(&self, scope: IdScope) -> usize {
        self.set(scope).len()
    }

    pub fn is_empty(&self, scope: IdScope) -> bool {
        self.set(scope).is_empty()
    }

    pub fn ids(&self, scope: IdScope) -> impl Iterator<Item = u64> + '_ {
        self.set(scope).iter().copied()
    }

    /// Forget every id, ready for a new batch.
    pub fn clear(&mut self) {
        self.containers.clear();
        self.chunks.clear();
    }

    fn set(&self, scope: IdScope) -> &HashSet<u64> {
        match scope {
            IdScope::Container => &self.containers,
            IdScope::Chunk => &self.chunks,
        }
    }

    fn set_mut(&mut self, scope: IdScope) -> &mut HashSet<u64> {
        match scope {
            IdScope::Container => &mut self.containers,
            IdScope::Chunk => &mut self.chunks,
        }
    }
}
