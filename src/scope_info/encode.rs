//! Building scope infos from allocated scopes.

use super::flags::{ScopeFlags, VariableAllocationInfo, VariableInfo};
use super::layout::{
    CONTEXT_LOCAL_COUNT_INDEX, FLAGS_INDEX, Header, MODULE_VARIABLE_ENTRY_LENGTH,
    PARAMETER_COUNT_INDEX, STACK_LOCAL_COUNT_INDEX,
};
use super::{ModuleInfo, ScopeInfo, Slot};
use crate::lang::name::NameTable;
use crate::lang::scope::{
    FunctionKind, InitializationFlag, LanguageMode, MIN_CONTEXT_SLOTS, MaybeAssignedFlag, Scope,
    ScopeType, Variable, VariableLocation, VariableMode,
};
use std::sync::Arc;
use tracing::debug;

/// Slot writer over a pre-sized buffer. Every slot is written exactly once.
struct SlotWriter {
    slots: Vec<Slot>,
}

impl SlotWriter {
    fn new(length: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; length],
        }
    }

    fn set(&mut self, index: usize, slot: Slot) {
        assert!(
            index < self.slots.len(),
            "scope info write at {} past length {}",
            index,
            self.slots.len()
        );
        assert!(
            matches!(self.slots[index], Slot::Empty),
            "scope info slot {} written twice",
            index
        );
        self.slots[index] = slot;
    }

    fn set_smi(&mut self, index: usize, value: i32) {
        self.set(index, Slot::Smi(value));
    }

    fn write_header(&mut self, header: &Header) {
        self.set_smi(FLAGS_INDEX, header.flags.encode());
        self.set_smi(PARAMETER_COUNT_INDEX, header.parameter_count as i32);
        self.set_smi(STACK_LOCAL_COUNT_INDEX, header.stack_local_count as i32);
        self.set_smi(CONTEXT_LOCAL_COUNT_INDEX, header.context_local_count as i32);
    }

    fn finish(self) -> ScopeInfo {
        if let Some(hole) = self.slots.iter().position(|s| matches!(s, Slot::Empty)) {
            panic!("scope info slot {} was never written", hole);
        }
        ScopeInfo::from_slots(self.slots)
    }
}

fn variable_info(var: &Variable) -> VariableInfo {
    VariableInfo {
        mode: var.mode(),
        init_flag: var.initialization_flag(),
        maybe_assigned: var.maybe_assigned(),
        is_synthetic: var.is_synthetic(),
    }
}

fn receiver_allocation(scope: &Scope) -> VariableAllocationInfo {
    match scope.receiver() {
        None => VariableAllocationInfo::None,
        Some(var) if !var.is_used() => VariableAllocationInfo::Unused,
        Some(var) if var.is_context_slot() => VariableAllocationInfo::Context,
        Some(var) => {
            assert!(
                var.is_parameter(),
                "receiver must live in a parameter or context slot, found {:?}",
                var.location()
            );
            VariableAllocationInfo::Stack
        }
    }
}

fn function_name_allocation(scope: &Scope) -> VariableAllocationInfo {
    if scope.scope_type() != ScopeType::Function {
        return VariableAllocationInfo::None;
    }
    match scope.function_var() {
        None => VariableAllocationInfo::None,
        Some(var) if !var.is_used() => VariableAllocationInfo::Unused,
        Some(var) if var.is_context_slot() => VariableAllocationInfo::Context,
        Some(var) => {
            assert!(
                var.is_stack_local(),
                "function name '{}' must live in a stack or context slot, found {:?}",
                var.name(),
                var.location()
            );
            VariableAllocationInfo::Stack
        }
    }
}

impl ScopeInfo {
    /// Serializes an allocated scope.
    ///
    /// Panics if the scope is inconsistent: overlapping or sparse slot
    /// indices, unallocated bindings that the layout needs, or counts that
    /// disagree with the scope's own view.
    pub fn create(scope: &Scope) -> ScopeInfo {
        // Classify locals.
        let mut stack_local_count = 0usize;
        let mut context_local_count = 0usize;
        let mut module_variable_count = 0usize;
        let mut first_slot_index: Option<i32> = None;
        for var in scope.locals() {
            match var.location() {
                VariableLocation::Local => {
                    stack_local_count += 1;
                    first_slot_index =
                        Some(first_slot_index.map_or(var.index(), |first| first.min(var.index())));
                }
                VariableLocation::Context => context_local_count += 1,
                VariableLocation::Module => module_variable_count += 1,
                VariableLocation::Parameter | VariableLocation::Unallocated => {}
            }
        }
        let first_slot_index = first_slot_index.unwrap_or(0);

        let receiver = receiver_allocation(scope);
        let function_name = function_name_allocation(scope);

        let parameter_count = if scope.is_declaration_scope() {
            scope.num_parameters()
        } else {
            0
        };

        let header = Header {
            flags: ScopeFlags {
                scope_type: scope.scope_type(),
                calls_eval: scope.calls_eval(),
                language_mode: scope.language_mode(),
                is_declaration_scope: scope.is_declaration_scope(),
                receiver,
                has_new_target: scope.has_new_target(),
                function_name,
                asm_module: scope.is_asm_module(),
                asm_function: scope.is_asm_function(),
                has_simple_parameters: scope.has_simple_parameters(),
                function_kind: scope.function_kind(),
            },
            parameter_count,
            stack_local_count,
            context_local_count,
        };
        let length = header.length(module_variable_count);

        let mut out = SlotWriter::new(length);
        out.write_header(&header);

        for i in 0..parameter_count {
            let name = scope.parameter(i).name().clone();
            out.set(header.parameter_entries_index() + i, Slot::Name(name));
        }

        out.set_smi(header.stack_local_first_slot_index(), first_slot_index);

        let module_entries = header.module_variable_entries_index();
        let mut module_cursor = module_entries;
        for var in scope.locals() {
            match var.location() {
                VariableLocation::Local => {
                    let offset = (var.index() - first_slot_index) as usize;
                    assert!(
                        offset < stack_local_count,
                        "stack local '{}' at slot {} is outside [{}, {})",
                        var.name(),
                        var.index(),
                        first_slot_index,
                        first_slot_index + stack_local_count as i32
                    );
                    out.set(
                        header.stack_local_entries_index() + offset,
                        Slot::Name(var.name().clone()),
                    );
                }
                VariableLocation::Context => {
                    let offset = var.index() - MIN_CONTEXT_SLOTS;
                    assert!(
                        offset >= 0 && (offset as usize) < context_local_count,
                        "context local '{}' at slot {} is outside the context locals",
                        var.name(),
                        var.index()
                    );
                    let offset = offset as usize;
                    out.set(
                        header.context_local_name_entries_index() + offset,
                        Slot::Name(var.name().clone()),
                    );
                    out.set_smi(
                        header.context_local_info_entries_index() + offset,
                        variable_info(var).encode(),
                    );
                }
                VariableLocation::Module => {
                    out.set(module_cursor, Slot::Name(var.name().clone()));
                    out.set_smi(module_cursor + 1, var.index());
                    out.set_smi(module_cursor + 2, variable_info(var).encode());
                    module_cursor += MODULE_VARIABLE_ENTRY_LENGTH;
                }
                VariableLocation::Parameter | VariableLocation::Unallocated => {}
            }
        }

        if receiver.is_allocated()
            && let Some(var) = scope.receiver()
        {
            out.set_smi(header.receiver_entry_index(), var.index());
        }

        if function_name.is_allocated()
            && let Some(var) = scope.function_var()
        {
            let index = header.function_name_entry_index();
            out.set(index, Slot::Name(var.name().clone()));
            out.set_smi(index + 1, var.index());
        }

        if header.is_module() {
            let descriptor = scope
                .module()
                .unwrap_or_else(|| panic!("module scope without a module descriptor"));
            out.set(
                header.module_info_entry_index(),
                Slot::ModuleInfo(Arc::new(ModuleInfo::new(descriptor))),
            );
            out.set_smi(header.module_variable_count_index(), module_variable_count as i32);
            assert_eq!(
                module_cursor,
                length,
                "module variables did not fill the module section"
            );
        }

        let info = out.finish();

        assert_eq!(
            info.parameter_count(),
            parameter_count,
            "parameter count mismatch"
        );
        assert_eq!(
            info.context_length(),
            scope.num_heap_slots(),
            "context length disagrees with the scope"
        );
        if function_name == VariableAllocationInfo::Context
            && let Some(var) = scope.function_var()
        {
            assert_eq!(
                var.index(),
                info.context_length() - 1,
                "function name must occupy the last context slot"
            );
        }

        debug!(
            scope_type = ?header.flags.scope_type,
            length,
            parameters = parameter_count,
            stack_locals = stack_local_count,
            context_locals = context_local_count,
            module_variables = module_variable_count,
            "created scope info"
        );
        info
    }

    /// Scope info of a `with` statement: no variables, but a context.
    pub fn create_for_with_scope() -> ScopeInfo {
        let header = Header {
            flags: ScopeFlags {
                scope_type: ScopeType::With,
                calls_eval: false,
                language_mode: LanguageMode::Sloppy,
                is_declaration_scope: false,
                receiver: VariableAllocationInfo::None,
                has_new_target: false,
                function_name: VariableAllocationInfo::None,
                asm_module: false,
                asm_function: false,
                has_simple_parameters: true,
                function_kind: FunctionKind::NormalFunction,
            },
            parameter_count: 0,
            stack_local_count: 0,
            context_local_count: 0,
        };

        let mut out = SlotWriter::new(header.length(0));
        out.write_header(&header);
        out.set_smi(header.stack_local_first_slot_index(), 0);
        let info = out.finish();

        assert_eq!(info.context_length(), MIN_CONTEXT_SLOTS);
        info
    }

    /// Scope info of the script-level `this` binding: one context-allocated
    /// `const this`.
    pub fn create_global_this_binding(names: &NameTable) -> ScopeInfo {
        let header = Header {
            flags: ScopeFlags {
                scope_type: ScopeType::Script,
                calls_eval: false,
                language_mode: LanguageMode::Sloppy,
                is_declaration_scope: true,
                receiver: VariableAllocationInfo::Context,
                has_new_target: false,
                function_name: VariableAllocationInfo::None,
                asm_module: false,
                asm_function: false,
                has_simple_parameters: true,
                function_kind: FunctionKind::NormalFunction,
            },
            parameter_count: 0,
            stack_local_count: 0,
            context_local_count: 1,
        };

        let info_word = VariableInfo {
            mode: VariableMode::Const,
            init_flag: InitializationFlag::CreatedInitialized,
            maybe_assigned: MaybeAssignedFlag::NotAssigned,
            is_synthetic: true,
        };

        let mut out = SlotWriter::new(header.length(0));
        out.write_header(&header);
        out.set_smi(header.stack_local_first_slot_index(), 0);
        out.set(
            header.context_local_name_entries_index(),
            Slot::Name(names.this_string()),
        );
        out.set_smi(header.context_local_info_entries_index(), info_word.encode());
        out.set_smi(header.receiver_entry_index(), MIN_CONTEXT_SLOTS);
        let info = out.finish();

        assert_eq!(info.context_length(), MIN_CONTEXT_SLOTS + 1);
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::scope::{ModuleDescriptor, ModuleEntry};

    fn function_scope(names: &NameTable, params: &[&str], locals: &[&str]) -> Scope {
        let mut scope = Scope::new_function(FunctionKind::NormalFunction);
        for p in params {
            scope.declare_parameter(names.intern(p));
        }
        for l in locals {
            scope.declare_local(names.intern(l), VariableMode::Var);
        }
        scope
    }

    #[test]
    fn test_simple_function_layout() {
        let names = NameTable::new();
        let mut scope = function_scope(&names, &["a"], &["b"]);
        scope.allocate_variables(0);
        let info = ScopeInfo::create(&scope);

        assert_eq!(info.len(), 7);
        assert_eq!(info.parameter_count(), 1);
        assert_eq!(info.stack_local_count(), 1);
        assert_eq!(info.context_local_count(), 0);
        assert_eq!(info.context_length(), 0);
        assert_eq!(info.stack_local_entries_index(), 6);
        assert_eq!(info.stack_local_name(0), &names.intern("b"));
    }

    #[test]
    fn test_stack_locals_written_in_slot_order() {
        let names = NameTable::new();
        let mut scope = function_scope(&names, &[], &["x", "y", "z"]);
        // allocate out of declaration order
        let ids: Vec<_> = ["x", "y", "z"]
            .iter()
            .map(|n| scope.lookup_local(&names.intern(n)).unwrap())
            .collect();
        scope.variable_mut(ids[0]).allocate_to(VariableLocation::Local, 7);
        scope.variable_mut(ids[1]).allocate_to(VariableLocation::Local, 5);
        scope.variable_mut(ids[2]).allocate_to(VariableLocation::Local, 6);

        let info = ScopeInfo::create(&scope);
        assert_eq!(info.stack_local_first_slot(), 5);
        assert_eq!(info.stack_local_name(0), &names.intern("y"));
        assert_eq!(info.stack_local_name(1), &names.intern("z"));
        assert_eq!(info.stack_local_name(2), &names.intern("x"));
        assert_eq!(info.stack_slot_index(&names.intern("x")), Some(7));
    }

    #[test]
    #[should_panic(expected = "written twice")]
    fn test_overlapping_context_slots_are_fatal() {
        let names = NameTable::new();
        let mut scope = function_scope(&names, &[], &["p", "q"]);
        scope.variable_mut(0).allocate_to(VariableLocation::Context, MIN_CONTEXT_SLOTS);
        scope.variable_mut(1).allocate_to(VariableLocation::Context, MIN_CONTEXT_SLOTS);
        ScopeInfo::create(&scope);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_sparse_stack_slots_are_fatal() {
        let names = NameTable::new();
        let mut scope = function_scope(&names, &[], &["p", "q"]);
        scope.variable_mut(0).allocate_to(VariableLocation::Local, 0);
        scope.variable_mut(1).allocate_to(VariableLocation::Local, 2);
        ScopeInfo::create(&scope);
    }

    #[test]
    fn test_module_scope_layout() {
        let names = NameTable::new();
        let mut scope = Scope::new(ScopeType::Module);
        scope.declare_module_variable(names.intern("exported"), VariableMode::Let, 1);
        scope.declare_module_variable(names.intern("imported"), VariableMode::Import, -1);
        scope.declare_local(names.intern("inner"), VariableMode::Var);
        if let Some(module) = scope.module_mut() {
            module.add_regular_export(ModuleEntry::local_export(
                names.intern("exported"),
                names.intern("default"),
                1,
            ));
        }
        scope.allocate_variables(0);
        let info = ScopeInfo::create(&scope);

        assert_eq!(info.context_local_count(), 1);
        assert_eq!(info.context_length(), MIN_CONTEXT_SLOTS + 1);
        assert_eq!(info.module_variable_count(), 2);
        assert_eq!(info.len(), info.module_variable_entries_index() + 6);
        let module_info = info.module_info().map(|m| m.regular_exports().len());
        assert_eq!(module_info, Some(1));

        let imported = info.module_index(&names.intern("imported"));
        assert_eq!(imported.map(|l| (l.index, l.mode)), Some((-1, VariableMode::Import)));
    }

    #[test]
    fn test_with_scope() {
        let info = ScopeInfo::create_for_with_scope();
        assert_eq!(info.len(), 5);
        assert_eq!(info.scope_type(), ScopeType::With);
        assert!(info.has_context());
    }

    #[test]
    fn test_global_this_binding() {
        let names = NameTable::new();
        let info = ScopeInfo::create_global_this_binding(&names);
        assert_eq!(info.len(), 8);
        assert_eq!(info.context_length(), 5);
        assert_eq!(info.receiver_context_slot_index(), Some(MIN_CONTEXT_SLOTS));
        let this = info.context_slot_index(&names.this_string(), None);
        assert_eq!(this.map(|l| (l.index, l.mode)), Some((MIN_CONTEXT_SLOTS, VariableMode::Const)));
        assert!(info.context_local_is_synthetic(0));
    }

    #[test]
    fn test_empty_module_descriptor_is_accepted() {
        let scope = Scope::new(ScopeType::Module);
        let info = ScopeInfo::create(&scope);
        assert_eq!(info.module_info().map(|m| **m == ModuleInfo::new(&ModuleDescriptor::new())), Some(true));
        assert_eq!(info.context_length(), MIN_CONTEXT_SLOTS);
    }
}
