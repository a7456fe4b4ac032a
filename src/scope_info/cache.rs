//! Advisory cache for [`ScopeInfo::context_slot_index`].

use super::{ScopeInfo, SlotLookup};
use crate::lang::name::Name;
use parking_lot::Mutex;
use tracing::trace;

pub const DEFAULT_CAPACITY: usize = 256;

/// Outcome of probing the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheProbe {
    /// Nothing cached for this pair.
    Miss,
    /// A cached answer, which may itself be "not a context local".
    Hit(Option<SlotLookup>),
}

struct Entry {
    // Owning handles keep both identities alive while cached.
    scope_info: ScopeInfo,
    name: Name,
    result: Option<SlotLookup>,
}

/// Direct-mapped cache from (scope info, name) identity to a context slot
/// lookup result.
///
/// Safe to share between threads. Collisions simply overwrite; a lost entry
/// only costs a rescan.
pub struct ContextSlotCache {
    entries: Mutex<Vec<Option<Entry>>>,
}

impl ContextSlotCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "context slot cache needs at least one entry");
        let entries = std::iter::repeat_with(|| None).take(capacity).collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().len()
    }

    fn hash(&self, scope_info: &ScopeInfo, name: &Name, capacity: usize) -> usize {
        ((scope_info.addr() >> 3) ^ (name.addr() >> 3)) % capacity
    }

    pub fn lookup(&self, scope_info: &ScopeInfo, name: &Name) -> CacheProbe {
        let entries = self.entries.lock();
        let index = self.hash(scope_info, name, entries.len());
        match &entries[index] {
            Some(entry) if entry.scope_info.ptr_eq(scope_info) && entry.name == *name => {
                trace!(name = %name, slot = index, "context slot cache hit");
                CacheProbe::Hit(entry.result)
            }
            _ => CacheProbe::Miss,
        }
    }

    pub fn update(&self, scope_info: &ScopeInfo, name: &Name, result: Option<SlotLookup>) {
        let mut entries = self.entries.lock();
        let index = self.hash(scope_info, name, entries.len());
        entries[index] = Some(Entry {
            scope_info: scope_info.clone(),
            name: name.clone(),
            result,
        });
    }

    pub fn clear(&self) {
        self.entries.lock().iter_mut().for_each(|e| *e = None);
    }

    /// Number of occupied entries.
    pub fn len(&self) -> usize {
        self.entries.lock().iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ContextSlotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContextSlotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSlotCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
