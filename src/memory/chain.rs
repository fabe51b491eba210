//! Supersession-chain traversal.
//!
//! Chains are an explicit graph of IDs resolved through the store's point
//! lookup: `A.superseded_by = B`, `B.superseded_by = C`, ... ending in a live
//! head or a tombstone. A visited set makes traversal terminate on corrupted
//! (cyclic) data.

use std::collections::HashSet;

use anyhow::Result;

use super::store::MemoryStore;
use super::types::{Memory, Supersession};

/// Where a chain walk ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEnd {
    /// Reached a live memory.
    Head(Memory),
    /// The chain ends in a deletion.
    Deleted,
    /// A pointer referenced a missing record.
    Dangling { missing: String },
    /// A pointer led back to an already-visited record.
    Cycle { at: String },
}

impl ChainEnd {
    pub fn into_head(self) -> Option<Memory> {
        match self {
            Self::Head(memory) => Some(memory),
            _ => None,
        }
    }
}

/// Walk `superseded_by` pointers starting from an already-fetched record.
///
/// Storage failures during intermediate lookups propagate. Every other way a
/// chain can fail to reach a live head is reported as a [`ChainEnd`] variant.
pub fn follow_chain(store: &dyn MemoryStore, start: Memory) -> Result<ChainEnd> {
    let mut visited: HashSet<String> = HashSet::from([start.id.clone()]);
    let mut current = start;

    loop {
        let next_id = match &current.superseded_by {
            None => return Ok(ChainEnd::Head(current)),
            Some(Supersession::Tombstone) => return Ok(ChainEnd::Deleted),
            Some(Supersession::Memory(next)) => next.clone(),
        };

        if !visited.insert(next_id.clone()) {
            return Ok(ChainEnd::Cycle { at: next_id });
        }

        current = match store.find_by_id(&next_id)? {
            Some(record) => record,
            None => return Ok(ChainEnd::Dangling { missing: next_id }),
        };
    }
}

/// Resolve an ID to the live head of its chain, if any.
pub fn resolve_head(store: &dyn MemoryStore, id: &str) -> Result<Option<Memory>> {
    match store.find_by_id(id)? {
        Some(record) => Ok(follow_chain(store, record)?.into_head()),
        None => Ok(None),
    }
}
