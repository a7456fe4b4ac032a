//! Read-only queries over a finished [`ScopeInfo`].
//!
//! Out-of-range element access panics: a malformed scope info is a compiler
//! bug, not a runtime condition.

use super::cache::{CacheProbe, ContextSlotCache};
use super::flags::{ScopeFlags, VariableAllocationInfo, VariableInfo};
use super::layout::{
    CONTEXT_LOCAL_COUNT_INDEX, FLAGS_INDEX, Header, MODULE_VARIABLE_ENTRY_LENGTH,
    MODULE_VARIABLE_INDEX_OFFSET, MODULE_VARIABLE_NAME_OFFSET, MODULE_VARIABLE_PROPERTIES_OFFSET,
    PARAMETER_COUNT_INDEX, STACK_LOCAL_COUNT_INDEX, VARIABLE_PART_INDEX,
};
use super::scope_info_error::slot_kind;
use super::{ModuleInfo, ScopeInfo, ScopeInfoError, Slot, SlotLookup};
use crate::lang::name::{Name, NameTable, is_synthetic_name};
use crate::lang::scope::{
    FunctionKind, InitializationFlag, LanguageMode, MIN_CONTEXT_SLOTS, MaybeAssignedFlag,
    ScopeType, VariableMode,
};
use std::sync::Arc;

impl ScopeInfo {
    // =========================================================================
    // Raw slots
    // =========================================================================

    fn smi_at(&self, index: usize) -> i32 {
        match &self.slots()[index] {
            Slot::Smi(value) => *value,
            other => panic!("scope info slot {} is not a Smi: {:?}", index, other),
        }
    }

    fn name_at(&self, index: usize) -> &Name {
        match &self.slots()[index] {
            Slot::Name(name) => name,
            other => panic!("scope info slot {} is not a name: {:?}", index, other),
        }
    }

    fn count_at(&self, index: usize) -> usize {
        if self.is_empty() {
            0
        } else {
            self.smi_at(index) as usize
        }
    }

    pub fn header(&self) -> Header {
        Header {
            flags: self.flags(),
            parameter_count: self.parameter_count(),
            stack_local_count: self.stack_local_count(),
            context_local_count: self.context_local_count(),
        }
    }

    // =========================================================================
    // Header
    // =========================================================================

    pub fn flags(&self) -> ScopeFlags {
        assert!(!self.is_empty(), "the empty scope info has no flags");
        ScopeFlags::decode(self.smi_at(FLAGS_INDEX))
    }

    pub fn parameter_count(&self) -> usize {
        self.count_at(PARAMETER_COUNT_INDEX)
    }

    pub fn stack_local_count(&self) -> usize {
        self.count_at(STACK_LOCAL_COUNT_INDEX)
    }

    pub fn context_local_count(&self) -> usize {
        self.count_at(CONTEXT_LOCAL_COUNT_INDEX)
    }

    pub fn scope_type(&self) -> ScopeType {
        self.flags().scope_type
    }

    pub fn language_mode(&self) -> LanguageMode {
        self.flags().language_mode
    }

    pub fn calls_eval(&self) -> bool {
        !self.is_empty() && self.flags().calls_eval
    }

    pub fn calls_sloppy_eval(&self) -> bool {
        self.calls_eval() && self.language_mode().is_sloppy()
    }

    pub fn is_declaration_scope(&self) -> bool {
        self.flags().is_declaration_scope
    }

    pub fn is_asm_module(&self) -> bool {
        !self.is_empty() && self.flags().asm_module
    }

    pub fn is_asm_function(&self) -> bool {
        !self.is_empty() && self.flags().asm_function
    }

    pub fn has_simple_parameters(&self) -> bool {
        self.flags().has_simple_parameters
    }

    pub fn function_kind(&self) -> FunctionKind {
        self.flags().function_kind
    }

    pub fn has_new_target(&self) -> bool {
        !self.is_empty() && self.flags().has_new_target
    }

    pub fn has_receiver(&self) -> bool {
        !self.is_empty() && self.flags().receiver != VariableAllocationInfo::None
    }

    pub fn has_allocated_receiver(&self) -> bool {
        !self.is_empty() && self.flags().receiver.is_allocated()
    }

    pub fn has_function_name(&self) -> bool {
        !self.is_empty() && self.flags().function_name != VariableAllocationInfo::None
    }

    /// Slots in a context for this scope, or 0 if it needs none.
    pub fn context_length(&self) -> i32 {
        if self.is_empty() {
            return 0;
        }
        let flags = self.flags();
        let context_locals = self.context_local_count() as i32;
        let function_name_context_slot = flags.function_name == VariableAllocationInfo::Context;
        let calls_sloppy_eval = flags.calls_eval && flags.language_mode.is_sloppy();
        let has_context = context_locals > 0
            || function_name_context_slot
            || flags.scope_type == ScopeType::With
            || (flags.scope_type == ScopeType::Block
                && calls_sloppy_eval
                && flags.is_declaration_scope)
            || (flags.scope_type == ScopeType::Function && calls_sloppy_eval)
            || flags.scope_type == ScopeType::Module;
        if has_context {
            MIN_CONTEXT_SLOTS + context_locals + i32::from(function_name_context_slot)
        } else {
            0
        }
    }

    pub fn has_context(&self) -> bool {
        self.context_length() > 0
    }

    /// Frame slots used by this scope, including a stack-allocated function
    /// name.
    pub fn stack_slot_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let function_name_stack_slot = self.flags().function_name == VariableAllocationInfo::Stack;
        self.stack_local_count() + usize::from(function_name_stack_slot)
    }

    pub fn local_count(&self) -> usize {
        self.stack_local_count() + self.context_local_count()
    }

    // =========================================================================
    // Section boundaries
    // =========================================================================

    pub fn parameter_entries_index(&self) -> usize {
        self.header().parameter_entries_index()
    }

    pub fn stack_local_first_slot_index(&self) -> usize {
        self.header().stack_local_first_slot_index()
    }

    pub fn stack_local_entries_index(&self) -> usize {
        self.header().stack_local_entries_index()
    }

    pub fn context_local_name_entries_index(&self) -> usize {
        self.header().context_local_name_entries_index()
    }

    pub fn context_local_info_entries_index(&self) -> usize {
        self.header().context_local_info_entries_index()
    }

    pub fn receiver_entry_index(&self) -> usize {
        self.header().receiver_entry_index()
    }

    pub fn function_name_entry_index(&self) -> usize {
        self.header().function_name_entry_index()
    }

    pub fn module_info_entry_index(&self) -> usize {
        self.header().module_info_entry_index()
    }

    pub fn module_variable_count_index(&self) -> usize {
        self.header().module_variable_count_index()
    }

    pub fn module_variable_entries_index(&self) -> usize {
        self.header().module_variable_entries_index()
    }

    // =========================================================================
    // Elements
    // =========================================================================

    pub fn parameter_name(&self, var: usize) -> &Name {
        assert!(var < self.parameter_count(), "parameter {} out of range", var);
        self.name_at(self.parameter_entries_index() + var)
    }

    /// Frame slot of the first stack local.
    pub fn stack_local_first_slot(&self) -> i32 {
        self.smi_at(self.stack_local_first_slot_index())
    }

    pub fn stack_local_name(&self, var: usize) -> &Name {
        assert!(var < self.stack_local_count(), "stack local {} out of range", var);
        self.name_at(self.stack_local_entries_index() + var)
    }

    pub fn stack_local_index(&self, var: usize) -> i32 {
        assert!(var < self.stack_local_count(), "stack local {} out of range", var);
        self.stack_local_first_slot() + var as i32
    }

    pub fn context_local_name(&self, var: usize) -> &Name {
        assert!(var < self.context_local_count(), "context local {} out of range", var);
        self.name_at(self.context_local_name_entries_index() + var)
    }

    fn context_local_info(&self, var: usize) -> VariableInfo {
        assert!(var < self.context_local_count(), "context local {} out of range", var);
        VariableInfo::decode(self.smi_at(self.context_local_info_entries_index() + var))
    }

    pub fn context_local_mode(&self, var: usize) -> VariableMode {
        self.context_local_info(var).mode
    }

    pub fn context_local_init_flag(&self, var: usize) -> InitializationFlag {
        self.context_local_info(var).init_flag
    }

    pub fn context_local_maybe_assigned_flag(&self, var: usize) -> MaybeAssignedFlag {
        self.context_local_info(var).maybe_assigned
    }

    /// Reads the stored synthetic bit of a context local.
    pub fn context_local_is_synthetic(&self, var: usize) -> bool {
        self.context_local_info(var).is_synthetic
    }

    /// Stack locals first, then context locals.
    pub fn local_name(&self, var: usize) -> &Name {
        let stack = self.stack_local_count();
        if var < stack {
            self.stack_local_name(var)
        } else {
            self.context_local_name(var - stack)
        }
    }

    pub fn function_name(&self) -> Option<&Name> {
        if self.is_empty() || !self.flags().function_name.is_allocated() {
            return None;
        }
        Some(self.name_at(self.function_name_entry_index()))
    }

    pub fn module_info(&self) -> Option<&Arc<ModuleInfo>> {
        if self.is_empty() || self.scope_type() != ScopeType::Module {
            return None;
        }
        match &self.slots()[self.module_info_entry_index()] {
            Slot::ModuleInfo(info) => Some(info),
            other => panic!("module info slot holds {:?}", other),
        }
    }

    pub fn module_variable_count(&self) -> usize {
        if self.is_empty() || self.scope_type() != ScopeType::Module {
            return 0;
        }
        self.smi_at(self.module_variable_count_index()) as usize
    }

    /// The `i`th module variable as (name, cell index, info).
    pub fn module_variable(&self, i: usize) -> (&Name, i32, VariableInfo) {
        assert!(i < self.module_variable_count(), "module variable {} out of range", i);
        let entry = self.module_variable_entries_index() + i * MODULE_VARIABLE_ENTRY_LENGTH;
        (
            self.name_at(entry + MODULE_VARIABLE_NAME_OFFSET),
            self.smi_at(entry + MODULE_VARIABLE_INDEX_OFFSET),
            VariableInfo::decode(self.smi_at(entry + MODULE_VARIABLE_PROPERTIES_OFFSET)),
        )
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Frame slot of a stack local.
    pub fn stack_slot_index(&self, name: &Name) -> Option<i32> {
        if self.is_empty() {
            return None;
        }
        let start = self.stack_local_entries_index();
        (0..self.stack_local_count())
            .find(|&i| self.name_at(start + i) == name)
            .map(|i| self.stack_local_first_slot() + i as i32)
    }

    /// Position of a parameter. Repeated names resolve to the last one.
    pub fn parameter_index(&self, name: &Name) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let start = self.parameter_entries_index();
        (0..self.parameter_count())
            .rev()
            .find(|&i| self.name_at(start + i) == name)
    }

    /// Context slot of a context local, with its binding properties.
    ///
    /// `cache` only short-cuts the scan; the result is the same without it.
    pub fn context_slot_index(
        &self,
        name: &Name,
        cache: Option<&ContextSlotCache>,
    ) -> Option<SlotLookup> {
        if self.is_empty() {
            return None;
        }
        if let Some(cache) = cache
            && let CacheProbe::Hit(result) = cache.lookup(self, name)
        {
            return result;
        }

        let start = self.context_local_name_entries_index();
        let result = (0..self.context_local_count())
            .find(|&i| self.name_at(start + i) == name)
            .map(|var| {
                let info = self.context_local_info(var);
                SlotLookup {
                    index: MIN_CONTEXT_SLOTS + var as i32,
                    mode: info.mode,
                    init_flag: info.init_flag,
                    maybe_assigned: info.maybe_assigned,
                }
            });

        if let Some(cache) = cache {
            cache.update(self, name, result);
        }
        result
    }

    /// Cell index of a module variable, with its binding properties.
    pub fn module_index(&self, name: &Name) -> Option<SlotLookup> {
        (0..self.module_variable_count()).find_map(|i| {
            let (var_name, index, info) = self.module_variable(i);
            (var_name == name).then_some(SlotLookup {
                index,
                mode: info.mode,
                init_flag: info.init_flag,
                maybe_assigned: info.maybe_assigned,
            })
        })
    }

    /// Context slot of the function-name binding, if `name` is that binding
    /// and it lives in the context.
    pub fn function_context_slot_index(&self, name: &Name) -> Option<i32> {
        if self.is_empty() || self.flags().function_name != VariableAllocationInfo::Context {
            return None;
        }
        let entry = self.function_name_entry_index();
        (self.name_at(entry) == name).then(|| self.smi_at(entry + 1))
    }

    /// Slot of an allocated receiver: parameter -1 on the stack, or its
    /// context slot.
    pub fn receiver_index(&self) -> Option<i32> {
        if !self.has_allocated_receiver() {
            return None;
        }
        Some(self.smi_at(self.receiver_entry_index()))
    }

    pub fn receiver_context_slot_index(&self) -> Option<i32> {
        if self.is_empty() || self.flags().receiver != VariableAllocationInfo::Context {
            return None;
        }
        Some(self.smi_at(self.receiver_entry_index()))
    }

    /// Name-shape test for compiler-internal bindings.
    pub fn variable_is_synthetic(name: &str) -> bool {
        is_synthetic_name(name)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Checks the slot array against its own header. Scope infos built by
    /// [`ScopeInfo::create`] always pass; this guards deserialized data.
    pub fn validate(&self) -> Result<(), ScopeInfoError> {
        if self.is_empty() {
            return Ok(());
        }
        let slots = self.slots();
        if slots.len() < VARIABLE_PART_INDEX + 1 {
            return Err(ScopeInfoError::TooShort { length: slots.len() });
        }
        let wrong = |index: usize, expected: &'static str, found: &Slot| ScopeInfoError::WrongSlotKind {
            index,
            expected,
            found: slot_kind(found),
        };
        let smi = |index: usize| match slots.get(index) {
            Some(Slot::Smi(value)) => Ok(*value),
            Some(other) => Err(wrong(index, "a Smi", other)),
            None => Err(ScopeInfoError::PastEnd { index }),
        };
        let count = |index: usize| {
            let value = smi(index)?;
            usize::try_from(value).map_err(|_| ScopeInfoError::NegativeCount { index, value })
        };
        let name = |index: usize| match slots.get(index) {
            Some(Slot::Name(_)) => Ok(()),
            Some(other) => Err(wrong(index, "a name", other)),
            None => Err(ScopeInfoError::PastEnd { index }),
        };
        let info_word = |index: usize| {
            let word = smi(index)?;
            VariableInfo::try_decode(word)
                .map(|_| ())
                .ok_or(ScopeInfoError::MalformedVariableInfo { index, word })
        };

        let word = smi(FLAGS_INDEX)?;
        let header = Header {
            flags: ScopeFlags::try_decode(word).ok_or(ScopeInfoError::MalformedFlags(word))?,
            parameter_count: count(PARAMETER_COUNT_INDEX)?,
            stack_local_count: count(STACK_LOCAL_COUNT_INDEX)?,
            context_local_count: count(CONTEXT_LOCAL_COUNT_INDEX)?,
        };

        let module_variable_count = if header.is_module() {
            count(header.module_variable_count_index())?
        } else {
            0
        };
        let expected = header.length(module_variable_count);
        if expected != slots.len() {
            return Err(ScopeInfoError::LengthMismatch {
                expected,
                actual: slots.len(),
            });
        }

        for i in 0..header.parameter_count {
            name(header.parameter_entries_index() + i)?;
        }
        smi(header.stack_local_first_slot_index())?;
        for i in 0..header.stack_local_count {
            name(header.stack_local_entries_index() + i)?;
        }
        for i in 0..header.context_local_count {
            name(header.context_local_name_entries_index() + i)?;
            info_word(header.context_local_info_entries_index() + i)?;
        }
        if header.flags.receiver.is_allocated() {
            smi(header.receiver_entry_index())?;
        }
        if header.flags.function_name.is_allocated() {
            name(header.function_name_entry_index())?;
            smi(header.function_name_entry_index() + 1)?;
        }
        if header.is_module() {
            if !matches!(slots[header.module_info_entry_index()], Slot::ModuleInfo(_)) {
                return Err(ScopeInfoError::MissingModuleInfo);
            }
            for i in 0..module_variable_count {
                let entry = header.module_variable_entries_index() + i * MODULE_VARIABLE_ENTRY_LENGTH;
                name(entry + MODULE_VARIABLE_NAME_OFFSET)?;
                smi(entry + MODULE_VARIABLE_INDEX_OFFSET)?;
                info_word(entry + MODULE_VARIABLE_PROPERTIES_OFFSET)?;
            }
        }
        Ok(())
    }

    /// Copy of this scope info whose names all come from `names`.
    pub(crate) fn reintern(&self, names: &NameTable) -> ScopeInfo {
        let slots = self
            .slots()
            .iter()
            .map(|slot| match slot {
                Slot::Name(name) => Slot::Name(names.intern_name(name)),
                Slot::ModuleInfo(info) => Slot::ModuleInfo(Arc::new(info.reintern(names))),
                other => other.clone(),
            })
            .collect();
        ScopeInfo::from_slots(slots)
    }
}
