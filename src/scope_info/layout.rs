//! Section boundaries of a [`ScopeInfo`](super::ScopeInfo).
//!
//! Every offset is derived from the four header slots alone. The encoder and
//! the reader both go through [`Header`], so there is exactly one definition of
//! the layout.

use super::flags::ScopeFlags;
use crate::lang::scope::ScopeType;

pub const FLAGS_INDEX: usize = 0;
pub const PARAMETER_COUNT_INDEX: usize = 1;
pub const STACK_LOCAL_COUNT_INDEX: usize = 2;
pub const CONTEXT_LOCAL_COUNT_INDEX: usize = 3;
/// First slot after the fixed header.
pub const VARIABLE_PART_INDEX: usize = 4;

/// (name, index, info) per module variable.
pub const MODULE_VARIABLE_ENTRY_LENGTH: usize = 3;
pub const MODULE_VARIABLE_NAME_OFFSET: usize = 0;
pub const MODULE_VARIABLE_INDEX_OFFSET: usize = 1;
pub const MODULE_VARIABLE_PROPERTIES_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub flags: ScopeFlags,
    pub parameter_count: usize,
    pub stack_local_count: usize,
    pub context_local_count: usize,
}

impl Header {
    pub fn is_module(&self) -> bool {
        self.flags.scope_type == ScopeType::Module
    }

    pub fn parameter_entries_index(&self) -> usize {
        VARIABLE_PART_INDEX
    }

    pub fn stack_local_first_slot_index(&self) -> usize {
        self.parameter_entries_index() + self.parameter_count
    }

    pub fn stack_local_entries_index(&self) -> usize {
        self.stack_local_first_slot_index() + 1
    }

    pub fn context_local_name_entries_index(&self) -> usize {
        self.stack_local_entries_index() + self.stack_local_count
    }

    pub fn context_local_info_entries_index(&self) -> usize {
        self.context_local_name_entries_index() + self.context_local_count
    }

    pub fn receiver_entry_index(&self) -> usize {
        self.context_local_info_entries_index() + self.context_local_count
    }

    pub fn function_name_entry_index(&self) -> usize {
        let receiver_width = usize::from(self.flags.receiver.is_allocated());
        self.receiver_entry_index() + receiver_width
    }

    pub fn module_info_entry_index(&self) -> usize {
        let function_name_width = if self.flags.function_name.is_allocated() { 2 } else { 0 };
        self.function_name_entry_index() + function_name_width
    }

    pub fn module_variable_count_index(&self) -> usize {
        self.module_info_entry_index() + 1
    }

    pub fn module_variable_entries_index(&self) -> usize {
        self.module_variable_count_index() + 1
    }

    /// Total slot count. `module_variable_count` is ignored outside module
    /// scopes.
    pub fn length(&self, module_variable_count: usize) -> usize {
        if self.is_module() {
            self.module_variable_entries_index()
                + MODULE_VARIABLE_ENTRY_LENGTH * module_variable_count
        } else {
            self.module_info_entry_index()
        }
    }
}
