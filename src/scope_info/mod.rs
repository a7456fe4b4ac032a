//! # Scope descriptors
//!
//! A [`ScopeInfo`] is the runtime description of one lexical scope: which names
//! live in parameters, stack slots, context slots or module cells. It is a
//! single immutable slot array. Section boundaries are never stored; they are
//! recomputed from the header through [`layout::Header`].
//!
//! ## Layout
//!
//! ```text
//! [flags, #params, #stack, #context]          header
//! param names ...                             declaration scopes only
//! first stack slot
//! stack local names ...                       by slot index
//! context local names ... / infos ...         parallel, by index - MIN_CONTEXT_SLOTS
//! receiver index                              receiver on stack or in context
//! function name, function index               function name on stack or in context
//! module info, #module vars, (name, idx, info) ...   module scopes only
//! ```

pub mod cache;
pub mod encode;
pub mod flags;
pub mod layout;
pub mod module_info;
pub mod print;
pub mod reader;
pub mod scope_info_error;

use crate::lang::name::Name;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use cache::{CacheProbe, ContextSlotCache};
pub use flags::{ScopeFlags, VariableAllocationInfo, VariableInfo};
pub use module_info::{ModuleInfo, ModuleInfoEntry};
pub use scope_info_error::ScopeInfoError;

use crate::lang::scope::{InitializationFlag, MaybeAssignedFlag, VariableMode};

/// One cell of a scope info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    Smi(i32),
    Name(Name),
    ModuleInfo(Arc<ModuleInfo>),
    /// Not yet written. Never present in a finished scope info.
    Empty,
}

/// Result of a successful context or module slot lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLookup {
    pub index: i32,
    pub mode: VariableMode,
    pub init_flag: InitializationFlag,
    pub maybe_assigned: MaybeAssignedFlag,
}

/// Immutable, shareable scope descriptor. Cloning shares the slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeInfo {
    slots: Arc<[Slot]>,
}

impl ScopeInfo {
    /// The zero-length descriptor used for scopes that need none.
    pub fn empty() -> ScopeInfo {
        ScopeInfo {
            slots: Arc::from(Vec::new()),
        }
    }

    pub(crate) fn from_slots(slots: Vec<Slot>) -> ScopeInfo {
        ScopeInfo {
            slots: Arc::from(slots),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Whether both handles refer to the same descriptor.
    pub fn ptr_eq(&self, other: &ScopeInfo) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.slots).cast::<u8>() as usize
    }
}
