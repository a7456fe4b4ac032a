//! Lexical scopes as handed over by the front end.
//!
//! A [`Scope`] owns its declared [`Variable`]s in declaration order. Storage is
//! decided by [`Scope::allocate_variables`] (or by hand, through
//! [`Variable::allocate_to`]); the scope-info encoder only serializes decisions
//! that were already made.

use super::name::{Name, is_synthetic_name};
use serde::{Deserialize, Serialize};

/// Fixed slots at the start of every context: closure, previous context,
/// extension object and native context.
pub const MIN_CONTEXT_SLOTS: i32 = 4;

/// Index of a variable within its scope's declaration list.
pub type VariableId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ScopeType {
    Eval = 0,
    Function = 1,
    Module = 2,
    Script = 3,
    Catch = 4,
    Block = 5,
    With = 6,
}

impl ScopeType {
    pub(crate) fn from_bits(bits: u32) -> Option<ScopeType> {
        match bits {
            0 => Some(ScopeType::Eval),
            1 => Some(ScopeType::Function),
            2 => Some(ScopeType::Module),
            3 => Some(ScopeType::Script),
            4 => Some(ScopeType::Catch),
            5 => Some(ScopeType::Block),
            6 => Some(ScopeType::With),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScopeType::Eval => "EVAL_SCOPE",
            ScopeType::Function => "FUNCTION_SCOPE",
            ScopeType::Module => "MODULE_SCOPE",
            ScopeType::Script => "SCRIPT_SCOPE",
            ScopeType::Catch => "CATCH_SCOPE",
            ScopeType::Block => "BLOCK_SCOPE",
            ScopeType::With => "WITH_SCOPE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LanguageMode {
    #[default]
    Sloppy = 0,
    Strict = 1,
    Strong = 2,
}

impl LanguageMode {
    pub(crate) fn from_bits(bits: u32) -> Option<LanguageMode> {
        match bits {
            0 => Some(LanguageMode::Sloppy),
            1 => Some(LanguageMode::Strict),
            2 => Some(LanguageMode::Strong),
            _ => None,
        }
    }

    pub fn is_sloppy(self) -> bool {
        self == LanguageMode::Sloppy
    }

    pub fn is_strict(self) -> bool {
        !self.is_sloppy()
    }

    pub fn is_strong(self) -> bool {
        self == LanguageMode::Strong
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VariableMode {
    Var = 0,
    ConstLegacy = 1,
    Let = 2,
    Import = 3,
    Const = 4,
    /// Compiler-introduced binding that never lives in a context.
    Temporary = 5,
    Dynamic = 6,
    DynamicGlobal = 7,
    DynamicLocal = 8,
}

impl VariableMode {
    pub(crate) fn from_bits(bits: u32) -> Option<VariableMode> {
        match bits {
            0 => Some(VariableMode::Var),
            1 => Some(VariableMode::ConstLegacy),
            2 => Some(VariableMode::Let),
            3 => Some(VariableMode::Import),
            4 => Some(VariableMode::Const),
            5 => Some(VariableMode::Temporary),
            6 => Some(VariableMode::Dynamic),
            7 => Some(VariableMode::DynamicGlobal),
            8 => Some(VariableMode::DynamicLocal),
            _ => None,
        }
    }

    pub fn is_lexical(self) -> bool {
        matches!(self, VariableMode::Let | VariableMode::Const | VariableMode::Import)
    }

    pub fn is_declared(self) -> bool {
        matches!(
            self,
            VariableMode::Var
                | VariableMode::ConstLegacy
                | VariableMode::Let
                | VariableMode::Import
                | VariableMode::Const
        )
    }

    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            VariableMode::Dynamic | VariableMode::DynamicGlobal | VariableMode::DynamicLocal
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableLocation {
    Unallocated,
    Parameter,
    Local,
    Context,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InitializationFlag {
    NeedsInitialization = 0,
    CreatedInitialized = 1,
}

impl InitializationFlag {
    pub(crate) fn from_bits(bits: u32) -> InitializationFlag {
        if bits == 0 {
            InitializationFlag::NeedsInitialization
        } else {
            InitializationFlag::CreatedInitialized
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MaybeAssignedFlag {
    NotAssigned = 0,
    MaybeAssigned = 1,
}

impl MaybeAssignedFlag {
    pub(crate) fn from_bits(bits: u32) -> MaybeAssignedFlag {
        if bits == 0 {
            MaybeAssignedFlag::NotAssigned
        } else {
            MaybeAssignedFlag::MaybeAssigned
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FunctionKind {
    #[default]
    NormalFunction = 0,
    ArrowFunction = 1,
    GeneratorFunction = 2,
    ConciseMethod = 3,
    ConciseGeneratorMethod = 4,
    GetterFunction = 5,
    SetterFunction = 6,
    DefaultConstructor = 7,
    BaseConstructor = 8,
    SubclassConstructor = 9,
    AsyncFunction = 10,
}

impl FunctionKind {
    pub(crate) fn from_bits(bits: u32) -> Option<FunctionKind> {
        match bits {
            0 => Some(FunctionKind::NormalFunction),
            1 => Some(FunctionKind::ArrowFunction),
            2 => Some(FunctionKind::GeneratorFunction),
            3 => Some(FunctionKind::ConciseMethod),
            4 => Some(FunctionKind::ConciseGeneratorMethod),
            5 => Some(FunctionKind::GetterFunction),
            6 => Some(FunctionKind::SetterFunction),
            7 => Some(FunctionKind::DefaultConstructor),
            8 => Some(FunctionKind::BaseConstructor),
            9 => Some(FunctionKind::SubclassConstructor),
            10 => Some(FunctionKind::AsyncFunction),
            _ => None,
        }
    }

    pub fn is_arrow(self) -> bool {
        self == FunctionKind::ArrowFunction
    }
}

// =============================================================================
// VARIABLE
// =============================================================================

#[derive(Debug, Clone)]
pub struct Variable {
    name: Name,
    mode: VariableMode,
    location: VariableLocation,
    index: i32,
    initialization_flag: InitializationFlag,
    maybe_assigned: MaybeAssignedFlag,
    is_used: bool,
    forced_context_allocation: bool,
    is_synthetic: bool,
}

impl Variable {
    pub fn new(name: Name, mode: VariableMode) -> Self {
        let initialization_flag = if mode.is_lexical() {
            InitializationFlag::NeedsInitialization
        } else {
            InitializationFlag::CreatedInitialized
        };
        let is_synthetic = is_synthetic_name(name.as_str());
        Self {
            name,
            mode,
            location: VariableLocation::Unallocated,
            index: -1,
            initialization_flag,
            maybe_assigned: MaybeAssignedFlag::NotAssigned,
            is_used: true,
            forced_context_allocation: false,
            is_synthetic,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn mode(&self) -> VariableMode {
        self.mode
    }

    pub fn location(&self) -> VariableLocation {
        self.location
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn initialization_flag(&self) -> InitializationFlag {
        self.initialization_flag
    }

    pub fn maybe_assigned(&self) -> MaybeAssignedFlag {
        self.maybe_assigned
    }

    pub fn is_used(&self) -> bool {
        self.is_used
    }

    pub fn is_synthetic(&self) -> bool {
        self.is_synthetic
    }

    pub fn has_forced_context_allocation(&self) -> bool {
        self.forced_context_allocation
    }

    pub fn is_unallocated(&self) -> bool {
        self.location == VariableLocation::Unallocated
    }

    pub fn is_parameter(&self) -> bool {
        self.location == VariableLocation::Parameter
    }

    pub fn is_stack_local(&self) -> bool {
        self.location == VariableLocation::Local
    }

    pub fn is_context_slot(&self) -> bool {
        self.location == VariableLocation::Context
    }

    pub fn is_module(&self) -> bool {
        self.location == VariableLocation::Module
    }

    pub fn set_is_used(&mut self, used: bool) -> &mut Self {
        self.is_used = used;
        self
    }

    pub fn set_maybe_assigned(&mut self) -> &mut Self {
        self.maybe_assigned = MaybeAssignedFlag::MaybeAssigned;
        self
    }

    pub fn set_initialization_flag(&mut self, flag: InitializationFlag) -> &mut Self {
        self.initialization_flag = flag;
        self
    }

    pub fn set_is_synthetic(&mut self, synthetic: bool) -> &mut Self {
        self.is_synthetic = synthetic;
        self
    }

    /// Forces the variable into a context slot (it is captured by an inner
    /// closure).
    pub fn force_context_allocation(&mut self) -> &mut Self {
        self.forced_context_allocation = true;
        self
    }

    pub fn allocate_to(&mut self, location: VariableLocation, index: i32) -> &mut Self {
        assert!(
            self.is_unallocated() || (self.location == location && self.index == index),
            "variable '{}' is already allocated to {:?} {}",
            self.name,
            self.location,
            self.index
        );
        self.location = location;
        self.index = index;
        self
    }
}

// =============================================================================
// MODULES
// =============================================================================

/// One import/export record of a module.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub export_name: Option<Name>,
    pub local_name: Option<Name>,
    pub import_name: Option<Name>,
    pub module_request: i32,
    pub cell_index: i32,
    pub beg_pos: i32,
    pub end_pos: i32,
}

impl ModuleEntry {
    /// `export { local as exported }`
    pub fn local_export(local_name: Name, export_name: Name, cell_index: i32) -> Self {
        Self {
            export_name: Some(export_name),
            local_name: Some(local_name),
            import_name: None,
            module_request: -1,
            cell_index,
            beg_pos: 0,
            end_pos: 0,
        }
    }

    /// `export { imported as exported } from "request"`
    pub fn indirect_export(import_name: Name, export_name: Name, module_request: i32) -> Self {
        Self {
            export_name: Some(export_name),
            local_name: None,
            import_name: Some(import_name),
            module_request,
            cell_index: 0,
            beg_pos: 0,
            end_pos: 0,
        }
    }

    /// `export * from "request"`
    pub fn star_export(module_request: i32) -> Self {
        Self {
            export_name: None,
            local_name: None,
            import_name: None,
            module_request,
            cell_index: 0,
            beg_pos: 0,
            end_pos: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleDescriptor {
    special_exports: Vec<ModuleEntry>,
    regular_exports: Vec<ModuleEntry>,
}

impl ModuleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_special_export(&mut self, entry: ModuleEntry) {
        self.special_exports.push(entry);
    }

    pub fn add_regular_export(&mut self, entry: ModuleEntry) {
        assert!(
            entry.local_name.is_some() && entry.export_name.is_some(),
            "regular exports need both a local and an export name"
        );
        self.regular_exports.push(entry);
    }

    pub fn special_exports(&self) -> &[ModuleEntry] {
        &self.special_exports
    }

    pub fn regular_exports(&self) -> &[ModuleEntry] {
        &self.regular_exports
    }
}

// =============================================================================
// SCOPE
// =============================================================================

#[derive(Debug, Clone)]
pub struct Scope {
    scope_type: ScopeType,
    language_mode: LanguageMode,
    calls_eval: bool,
    is_declaration_scope: bool,
    asm_module: bool,
    asm_function: bool,
    has_simple_parameters: bool,
    function_kind: FunctionKind,
    force_context_allocation: bool,

    /// Declared variables in declaration order.
    variables: Vec<Variable>,
    /// Parameters by position; duplicate names share a variable.
    params: Vec<VariableId>,
    receiver: Option<Variable>,
    function: Option<Variable>,
    new_target: bool,
    module: Option<ModuleDescriptor>,
}

impl Scope {
    pub fn new(scope_type: ScopeType) -> Self {
        let is_declaration_scope = matches!(
            scope_type,
            ScopeType::Eval | ScopeType::Function | ScopeType::Module | ScopeType::Script
        );
        Self {
            scope_type,
            language_mode: if scope_type == ScopeType::Module {
                LanguageMode::Strict
            } else {
                LanguageMode::Sloppy
            },
            calls_eval: false,
            is_declaration_scope,
            asm_module: false,
            asm_function: false,
            has_simple_parameters: true,
            function_kind: FunctionKind::NormalFunction,
            force_context_allocation: false,
            variables: Vec::new(),
            params: Vec::new(),
            receiver: None,
            function: None,
            new_target: false,
            module: (scope_type == ScopeType::Module).then(ModuleDescriptor::new),
        }
    }

    pub fn new_function(kind: FunctionKind) -> Self {
        let mut scope = Scope::new(ScopeType::Function);
        scope.function_kind = kind;
        scope
    }

    // --- flags ---

    pub fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    pub fn language_mode(&self) -> LanguageMode {
        self.language_mode
    }

    pub fn set_language_mode(&mut self, mode: LanguageMode) -> &mut Self {
        self.language_mode = mode;
        self
    }

    pub fn calls_eval(&self) -> bool {
        self.calls_eval
    }

    pub fn calls_sloppy_eval(&self) -> bool {
        self.calls_eval && self.language_mode.is_sloppy()
    }

    pub fn record_eval_call(&mut self) -> &mut Self {
        self.calls_eval = true;
        self
    }

    pub fn is_declaration_scope(&self) -> bool {
        self.is_declaration_scope
    }

    /// Block scopes that host sloppy-eval `var`s act as declaration scopes.
    pub fn set_is_declaration_scope(&mut self) -> &mut Self {
        self.is_declaration_scope = true;
        self
    }

    pub fn is_asm_module(&self) -> bool {
        self.asm_module
    }

    pub fn set_asm_module(&mut self) -> &mut Self {
        self.asm_module = true;
        self
    }

    pub fn is_asm_function(&self) -> bool {
        self.asm_function
    }

    pub fn set_asm_function(&mut self) -> &mut Self {
        self.asm_function = true;
        self
    }

    pub fn has_simple_parameters(&self) -> bool {
        self.has_simple_parameters
    }

    pub fn set_has_simple_parameters(&mut self, simple: bool) -> &mut Self {
        self.has_simple_parameters = simple;
        self
    }

    pub fn function_kind(&self) -> FunctionKind {
        self.function_kind
    }

    /// Every variable of this scope goes to the context.
    pub fn force_context_allocation(&mut self) -> &mut Self {
        self.force_context_allocation = true;
        self
    }

    // --- declarations ---

    /// Declares the next positional parameter. A repeated name reuses the
    /// existing variable.
    pub fn declare_parameter(&mut self, name: Name) -> VariableId {
        let existing = self
            .params
            .iter()
            .copied()
            .find(|&id| self.variables[id].name == name);
        let id = match existing {
            Some(id) => id,
            None => self.push_variable(Variable::new(name, VariableMode::Var)),
        };
        self.params.push(id);
        id
    }

    /// Declares a local. Redeclaring a name returns the existing variable.
    pub fn declare_local(&mut self, name: Name, mode: VariableMode) -> VariableId {
        match self.lookup_local(&name) {
            Some(id) => id,
            None => self.push_variable(Variable::new(name, mode)),
        }
    }

    pub fn declare_temporary(&mut self, name: Name) -> VariableId {
        self.push_variable(Variable::new(name, VariableMode::Temporary))
    }

    /// Declares a binding backed by a module cell. Module variables are
    /// allocated on declaration.
    pub fn declare_module_variable(
        &mut self,
        name: Name,
        mode: VariableMode,
        cell_index: i32,
    ) -> VariableId {
        assert_eq!(
            self.scope_type,
            ScopeType::Module,
            "module variables can only be declared in module scopes"
        );
        let mut var = Variable::new(name, mode);
        var.allocate_to(VariableLocation::Module, cell_index);
        self.push_variable(var)
    }

    /// Declares the receiver. It starts unused; front ends mark it when `this`
    /// is referenced.
    pub fn declare_this(&mut self, this_name: Name) -> &mut Variable {
        let mut var = Variable::new(this_name, VariableMode::Var);
        var.set_is_used(false);
        self.receiver.insert(var)
    }

    /// Declares the binding of a named function expression's own name.
    pub fn declare_function_var(&mut self, name: Name) -> &mut Variable {
        assert_eq!(
            self.scope_type,
            ScopeType::Function,
            "only function scopes bind a function name"
        );
        let mode = if self.language_mode.is_sloppy() {
            VariableMode::ConstLegacy
        } else {
            VariableMode::Const
        };
        self.function.insert(Variable::new(name, mode))
    }

    pub fn set_new_target_used(&mut self) -> &mut Self {
        self.new_target = true;
        self
    }

    fn push_variable(&mut self, var: Variable) -> VariableId {
        self.variables.push(var);
        self.variables.len() - 1
    }

    // --- accessors ---

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id]
    }

    pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id]
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn lookup_local(&self, name: &Name) -> Option<VariableId> {
        self.variables.iter().position(|v| v.name == *name)
    }

    /// Receiver first (if declared), then every declared variable.
    pub fn locals(&self) -> impl Iterator<Item = &Variable> {
        self.receiver.iter().chain(self.variables.iter())
    }

    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }

    pub fn parameter(&self, index: usize) -> &Variable {
        &self.variables[self.params[index]]
    }

    pub fn receiver(&self) -> Option<&Variable> {
        self.receiver.as_ref()
    }

    pub fn receiver_mut(&mut self) -> Option<&mut Variable> {
        self.receiver.as_mut()
    }

    pub fn function_var(&self) -> Option<&Variable> {
        self.function.as_ref()
    }

    pub fn function_var_mut(&mut self) -> Option<&mut Variable> {
        self.function.as_mut()
    }

    pub fn has_new_target(&self) -> bool {
        self.new_target
    }

    pub fn module(&self) -> Option<&ModuleDescriptor> {
        self.module.as_ref()
    }

    pub fn module_mut(&mut self) -> Option<&mut ModuleDescriptor> {
        self.module.as_mut()
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Scopes that need a context object even without context locals.
    pub fn must_have_context(&self) -> bool {
        match self.scope_type {
            ScopeType::With | ScopeType::Module => true,
            ScopeType::Function => self.calls_sloppy_eval(),
            ScopeType::Block => self.calls_sloppy_eval() && self.is_declaration_scope,
            _ => false,
        }
    }

    fn must_allocate_in_context(&self, var: &Variable) -> bool {
        if var.mode == VariableMode::Temporary {
            return false;
        }
        if self.force_context_allocation || var.forced_context_allocation {
            return true;
        }
        match self.scope_type {
            ScopeType::Catch | ScopeType::Module => return true,
            ScopeType::Script if var.mode.is_lexical() => return true,
            _ => {}
        }
        self.calls_eval
    }

    /// Assigns a storage location to every unallocated, used variable.
    ///
    /// Stack locals are numbered from `first_stack_slot` (non-zero for block
    /// scopes living in their parent's frame). Returns the next free stack slot.
    pub fn allocate_variables(&mut self, first_stack_slot: i32) -> i32 {
        let mut next_stack_slot = first_stack_slot;
        let mut next_heap_slot = MIN_CONTEXT_SLOTS;

        let receiver_in_context = self
            .receiver
            .as_ref()
            .map(|v| v.is_used && self.must_allocate_in_context(v));
        if let (Some(receiver), Some(in_context)) = (self.receiver.as_mut(), receiver_in_context)
            && receiver.is_unallocated()
        {
            if in_context {
                receiver.allocate_to(VariableLocation::Context, next_heap_slot);
                next_heap_slot += 1;
            } else {
                receiver.allocate_to(VariableLocation::Parameter, -1);
            }
        }

        // Last to first: a repeated parameter name binds to its last position.
        for position in (0..self.params.len()).rev() {
            let id = self.params[position];
            let var = &self.variables[id];
            if !var.is_unallocated() || !var.is_used {
                continue;
            }
            if self.must_allocate_in_context(var) {
                self.variables[id].allocate_to(VariableLocation::Context, next_heap_slot);
                next_heap_slot += 1;
            } else {
                self.variables[id].allocate_to(VariableLocation::Parameter, position as i32);
            }
        }

        for id in 0..self.variables.len() {
            let var = &self.variables[id];
            if !var.is_unallocated() || !var.is_used {
                continue;
            }
            if self.must_allocate_in_context(var) {
                self.variables[id].allocate_to(VariableLocation::Context, next_heap_slot);
                next_heap_slot += 1;
            } else {
                self.variables[id].allocate_to(VariableLocation::Local, next_stack_slot);
                next_stack_slot += 1;
            }
        }

        // The function name takes the last context slot.
        let function_in_context = self
            .function
            .as_ref()
            .map(|v| v.is_used && self.must_allocate_in_context(v));
        if let (Some(function), Some(in_context)) = (self.function.as_mut(), function_in_context)
            && function.is_unallocated()
            && function.is_used
        {
            if in_context {
                function.allocate_to(VariableLocation::Context, next_heap_slot);
            } else {
                function.allocate_to(VariableLocation::Local, next_stack_slot);
                next_stack_slot += 1;
            }
        }

        next_stack_slot
    }

    /// Stack slots used by this scope's frame, counted from the allocated
    /// indices.
    pub fn num_stack_slots(&self) -> i32 {
        self.locals()
            .chain(self.function.iter())
            .filter(|v| v.is_stack_local())
            .map(|v| v.index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Length of this scope's context, counted from the allocated indices.
    pub fn num_heap_slots(&self) -> i32 {
        let highest = self
            .locals()
            .chain(self.function.iter())
            .filter(|v| v.is_context_slot())
            .map(|v| v.index + 1)
            .max();
        match highest {
            Some(length) => length,
            None if self.must_have_context() => MIN_CONTEXT_SLOTS,
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::name::NameTable;

    #[test]
    fn test_duplicate_parameters_share_variable() {
        let names = NameTable::new();
        let mut scope = Scope::new_function(FunctionKind::NormalFunction);
        let first = scope.declare_parameter(names.intern("a"));
        let second = scope.declare_parameter(names.intern("a"));
        assert_eq!(first, second);
        assert_eq!(scope.num_parameters(), 2);
        scope.allocate_variables(0);
        // the last position wins
        assert_eq!(scope.parameter(0).index(), 1);
    }

    #[test]
    fn test_allocation_stack_and_context() {
        let names = NameTable::new();
        let mut scope = Scope::new_function(FunctionKind::NormalFunction);
        scope.declare_parameter(names.intern("p"));
        let x = scope.declare_local(names.intern("x"), VariableMode::Var);
        let y = scope.declare_local(names.intern("y"), VariableMode::Let);
        let z = scope.declare_local(names.intern("z"), VariableMode::Const);
        scope.variable_mut(y).force_context_allocation();
        let next = scope.allocate_variables(0);

        assert_eq!(next, 2);
        assert_eq!(scope.variable(x).location(), VariableLocation::Local);
        assert_eq!(scope.variable(x).index(), 0);
        assert_eq!(scope.variable(y).location(), VariableLocation::Context);
        assert_eq!(scope.variable(y).index(), MIN_CONTEXT_SLOTS);
        assert_eq!(scope.variable(z).index(), 1);
        assert_eq!(scope.num_stack_slots(), 2);
        assert_eq!(scope.num_heap_slots(), MIN_CONTEXT_SLOTS + 1);
    }

    #[test]
    fn test_block_scope_continues_parent_frame() {
        let names = NameTable::new();
        let mut block = Scope::new(ScopeType::Block);
        let a = block.declare_local(names.intern("a"), VariableMode::Let);
        let next = block.allocate_variables(3);
        assert_eq!(block.variable(a).index(), 3);
        assert_eq!(next, 4);
        assert_eq!(block.num_heap_slots(), 0);
    }

    #[test]
    fn test_sloppy_eval_forces_context() {
        let names = NameTable::new();
        let mut scope = Scope::new_function(FunctionKind::NormalFunction);
        scope.record_eval_call();
        let v = scope.declare_local(names.intern("v"), VariableMode::Var);
        let t = scope.declare_temporary(names.intern(".t"));
        scope.allocate_variables(0);
        assert!(scope.variable(v).is_context_slot());
        assert!(scope.variable(t).is_stack_local());
        assert!(scope.variable(t).is_synthetic());
        assert!(scope.must_have_context());
    }

    #[test]
    fn test_empty_scopes_without_context() {
        let function = Scope::new_function(FunctionKind::NormalFunction);
        assert_eq!(function.num_heap_slots(), 0);
        let with = Scope::new(ScopeType::With);
        assert_eq!(with.num_heap_slots(), MIN_CONTEXT_SLOTS);
        let module = Scope::new(ScopeType::Module);
        assert_eq!(module.num_heap_slots(), MIN_CONTEXT_SLOTS);
    }

    #[test]
    fn test_unused_variables_stay_unallocated() {
        let names = NameTable::new();
        let mut scope = Scope::new_function(FunctionKind::NormalFunction);
        let dead = scope.declare_local(names.intern("dead"), VariableMode::Var);
        scope.variable_mut(dead).set_is_used(false);
        scope.declare_this(names.this_string());
        scope.allocate_variables(0);
        assert!(scope.variable(dead).is_unallocated());
        assert_eq!(scope.receiver().map(|r| r.location()), Some(VariableLocation::Parameter));
    }

    #[test]
    fn test_function_var_takes_last_context_slot() {
        let names = NameTable::new();
        let mut scope = Scope::new_function(FunctionKind::NormalFunction);
        scope.force_context_allocation();
        scope.declare_local(names.intern("c"), VariableMode::Let);
        scope.declare_function_var(names.intern("f"));
        scope.allocate_variables(0);
        let f = scope.function_var().map(|v| (v.location(), v.index()));
        assert_eq!(f, Some((VariableLocation::Context, MIN_CONTEXT_SLOTS + 1)));
        assert_eq!(scope.num_heap_slots(), MIN_CONTEXT_SLOTS + 2);
    }

    #[test]
    #[should_panic(expected = "already allocated")]
    fn test_reallocation_is_fatal() {
        let names = NameTable::new();
        let mut var = Variable::new(names.intern("v"), VariableMode::Var);
        var.allocate_to(VariableLocation::Local, 0);
        var.allocate_to(VariableLocation::Context, MIN_CONTEXT_SLOTS);
    }
}
