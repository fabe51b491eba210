//! Map-backed [`MemoryStore`] with an injected [`VectorIndex`].
//!
//! Nothing is persisted. Used for tests and for exercising the service
//! against an exact brute-force index.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, ensure, Result};
use chrono::Utc;

use crate::memory::index::{FlatIndex, VectorIndex};
use crate::memory::store::MemoryStore;
use crate::memory::types::{ListPage, ListQuery, Memory, Neighbor, SortOrder, Supersession};

pub struct InMemoryStore<I: VectorIndex = FlatIndex> {
    records: RwLock<HashMap<String, Memory>>,
    index: I,
}

impl InMemoryStore<FlatIndex> {
    pub fn new() -> Self {
        Self::with_index(FlatIndex::new())
    }
}

impl Default for InMemoryStore<FlatIndex> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: VectorIndex> InMemoryStore<I> {
    pub fn with_index(index: I) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            index,
        }
    }

    /// Overwrite a record's supersession pointer without any validation.
    ///
    /// Lets tests build chains, including deliberately corrupted ones.
    pub fn set_superseded_by(&self, id: &str, target: Option<Supersession>) -> Result<bool> {
        let mut records = self.write()?;
        match records.get_mut(id) {
            Some(record) => {
                record.superseded_by = target;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Memory>>> {
        self.records
            .read()
            .map_err(|e| anyhow!("record lock poisoned: {e}"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Memory>>> {
        self.records
            .write()
            .map_err(|e| anyhow!("record lock poisoned: {e}"))
    }

    /// Insert under an already-held write lock. The index write happens first so a
    /// rejected vector leaves no record behind.
    fn insert_locked(&self, records: &mut HashMap<String, Memory>, memory: &Memory) -> Result<()> {
        ensure!(
            !records.contains_key(&memory.id),
            "memory id already exists: {}",
            memory.id
        );
        self.index.insert(&memory.id, &memory.embedding)?;
        records.insert(memory.id.clone(), memory.clone());
        Ok(())
    }
}

impl<I: VectorIndex> MemoryStore for InMemoryStore<I> {
    fn insert(&self, memory: &Memory) -> Result<()> {
        let mut records = self.write()?;
        self.insert_locked(&mut records, memory)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Memory>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn mark_deleted(&self, id: &str) -> Result<bool> {
        self.set_superseded_by(id, Some(Supersession::Tombstone))
    }

    fn find_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        self.index.nearest(embedding, k)
    }

    fn insert_superseding(&self, memory: &Memory, old_id: &str) -> Result<bool> {
        let mut records = self.write()?;
        let old_is_live = records.get(old_id).is_some_and(Memory::is_live);
        if !old_is_live {
            return Ok(false);
        }

        self.insert_locked(&mut records, memory)?;
        if let Some(old) = records.get_mut(old_id) {
            old.superseded_by = Some(Supersession::Memory(memory.id.clone()));
            old.updated_at = Utc::now();
        }
        Ok(true)
    }

    fn list(&self, query: &ListQuery) -> Result<ListPage> {
        let records = self.read()?;
        let mut matching: Vec<&Memory> = records
            .values()
            .filter(|m| query.include_inactive || m.is_live())
            .filter(|m| query.filter.matches(m))
            .collect();
        // UUID v7 ids break ties between records created in the same instant.
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if query.order == SortOrder::NewestFirst {
            matching.reverse();
        }

        let mut memories: Vec<Memory> = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.saturating_add(1))
            .cloned()
            .collect();
        let has_more = memories.len() > query.limit;
        memories.truncate(query.limit);

        Ok(ListPage { memories, has_more })
    }
}
