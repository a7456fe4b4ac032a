//! Fluent emitter for one function's bytecode.
//!
//! Every emission method validates its operands and returns `&mut Self`.
//! Invalid operands, double binds and unbalanced temporaries are compiler bugs
//! and panic. The only recoverable overflow is jump distance: a jump whose
//! delta does not fit in 8 bits is rewritten in place to the same-width
//! variant that reads the delta from the constant pool.

use super::array::{BytecodeArray, POINTER_SIZE};
use super::constant_pool::ConstantPoolBuilder;
use super::label::{BytecodeLabel, LabelState};
use super::op::{Bytecode, OperandType, Token};
use super::register::Register;
use super::register_allocator::RegisterAllocator;
use crate::lang::name::Name;
use crate::lang::scope::{LanguageMode, Variable, VariableLocation};
use crate::lang::value::Object;
use std::collections::HashMap;
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct BytecodeArrayBuilder {
    bytecodes: Vec<u8>,
    constants: ConstantPoolBuilder,
    registers: RegisterAllocator,
    parameter_count: Option<usize>,
    locals_count: Option<usize>,

    /// Offset where the current basic block starts.
    last_block_end: usize,
    last_bytecode_start: Option<usize>,

    /// Unpatched jump offset -> previous unpatched jump to the same label.
    label_links: HashMap<usize, usize>,
    unbound_jumps: usize,
}

impl BytecodeArrayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Frame shape
    // =========================================================================

    /// Parameter count including the receiver.
    pub fn set_parameter_count(&mut self, count: usize) -> &mut Self {
        assert!(self.parameter_count.is_none(), "parameter count is already set");
        assert!(self.bytecodes.is_empty(), "parameter count must be set before emitting");
        self.parameter_count = Some(count);
        self
    }

    pub fn set_locals_count(&mut self, count: usize) -> &mut Self {
        assert!(self.locals_count.is_none(), "locals count is already set");
        assert!(self.bytecodes.is_empty(), "locals count must be set before emitting");
        self.locals_count = Some(count);
        self.registers = RegisterAllocator::new(count);
        self
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
            .unwrap_or_else(|| panic!("parameter count was never set"))
    }

    pub fn locals_count(&self) -> usize {
        self.locals_count
            .unwrap_or_else(|| panic!("locals count was never set"))
    }

    pub fn parameter(&self, index: usize) -> Register {
        Register::from_parameter_index(index, self.parameter_count())
    }

    /// Register holding an allocated parameter or stack local.
    pub fn variable_register(&self, var: &Variable) -> Register {
        match var.location() {
            VariableLocation::Local => Register::new(var.index()),
            // the receiver is parameter -1 and sits at register index 0
            VariableLocation::Parameter => self.parameter((var.index() + 1) as usize),
            other => panic!("variable '{}' lives in {:?}, not a register", var.name(), other),
        }
    }

    pub fn current_offset(&self) -> usize {
        self.bytecodes.len()
    }

    pub fn temporary_register_count(&self) -> usize {
        self.registers.max_temporaries()
    }

    pub fn borrow_temporary_register(&mut self) -> Register {
        assert!(
            self.locals_count.is_some(),
            "locals count must be set before borrowing temporaries"
        );
        self.registers.borrow()
    }

    pub fn return_temporary_register(&mut self, register: Register) {
        self.registers.give_back(register);
    }

    /// Index of `value` in the constant pool.
    pub fn constant_pool_entry(&mut self, value: Object) -> usize {
        self.constants.insert(value)
    }

    /// Index of the string constant for `name`.
    pub fn name_constant(&mut self, name: &Name) -> usize {
        self.constants.insert_name(name)
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn operand_is_valid(&self, bytecode: Bytecode, i: usize, operand: u32) -> bool {
        let operand_type = bytecode.operand_type(i);
        if operand > operand_type.max_value() {
            return false;
        }
        match operand_type {
            OperandType::None => false,
            OperandType::Count8 | OperandType::Imm8 | OperandType::Idx8 | OperandType::Idx16 => {
                true
            }
            OperandType::MaybeReg8 if operand == 0 => true,
            OperandType::Reg8 | OperandType::MaybeReg8 => {
                self.register_is_valid(Register::from_operand(operand as u8))
            }
        }
    }

    fn register_is_valid(&self, register: Register) -> bool {
        if register.is_function_closure() || register.is_current_context() {
            true
        } else if register.is_parameter() {
            let count = self.parameter_count();
            let index = register.to_parameter_index(count);
            index >= 0 && (index as usize) < count
        } else {
            register.index() >= 0 && register.index() < self.registers.next_index()
        }
    }

    fn output(&mut self, bytecode: Bytecode, operands: &[u32]) {
        assert_eq!(
            operands.len(),
            bytecode.operand_count(),
            "{} takes {} operands",
            bytecode,
            bytecode.operand_count()
        );
        for (i, &operand) in operands.iter().enumerate() {
            assert!(
                self.operand_is_valid(bytecode, i, operand),
                "invalid operand {} ({:?}) for {}",
                operand,
                bytecode.operand_type(i),
                bytecode
            );
        }

        self.last_bytecode_start = Some(self.bytecodes.len());
        self.bytecodes.push(bytecode.to_byte());
        for (i, &operand) in operands.iter().enumerate() {
            match bytecode.operand_type(i).size() {
                1 => self.bytecodes.push(operand as u8),
                2 => self.bytecodes.extend_from_slice(&(operand as u16).to_le_bytes()),
                size => unreachable!("operand of {} bytes", size),
            }
        }
    }

    fn leave_basic_block(&mut self) {
        self.last_block_end = self.bytecodes.len();
    }

    /// Last instruction, if it belongs to the current basic block.
    fn last_bytecode_in_same_block(&self) -> Option<(Bytecode, usize)> {
        let start = self.last_bytecode_start?;
        if start < self.last_block_end || start >= self.bytecodes.len() {
            return None;
        }
        Bytecode::from_byte(self.bytecodes[start]).map(|b| (b, start))
    }

    /// The accumulator already holds `register` (it was just loaded from or
    /// stored to it).
    fn is_register_in_accumulator(&self, register: Register) -> bool {
        match self.last_bytecode_in_same_block() {
            Some((Bytecode::Ldar | Bytecode::Star, start)) => {
                self.bytecodes[start + 1] == register.to_operand()
            }
            _ => false,
        }
    }

    fn idx8(index: usize, what: &str) -> u32 {
        assert!(index <= u8::MAX as usize, "{} index {} does not fit in 8 bits", what, index);
        index as u32
    }

    // =========================================================================
    // Literals
    // =========================================================================

    pub fn load_literal(&mut self, value: Object) -> &mut Self {
        match value {
            Object::Smi(0) => self.output(Bytecode::LdaZero, &[]),
            Object::Smi(v) if i8::try_from(v).is_ok() => {
                self.output(Bytecode::LdaSmi8, &[v as i8 as u8 as u32])
            }
            Object::Undefined => return self.load_undefined(),
            Object::Null => return self.load_null(),
            Object::TheHole => return self.load_the_hole(),
            Object::True => return self.load_true(),
            Object::False => return self.load_false(),
            value => {
                let index = self.constants.insert(value);
                if index <= u8::MAX as usize {
                    self.output(Bytecode::LdaConstant, &[index as u32]);
                } else if index <= u16::MAX as usize {
                    self.output(Bytecode::LdaConstantWide, &[index as u32]);
                } else {
                    panic!("constant pool index {} does not fit in 16 bits", index);
                }
            }
        }
        self
    }

    pub fn load_undefined(&mut self) -> &mut Self {
        self.output(Bytecode::LdaUndefined, &[]);
        self
    }

    pub fn load_null(&mut self) -> &mut Self {
        self.output(Bytecode::LdaNull, &[]);
        self
    }

    pub fn load_the_hole(&mut self) -> &mut Self {
        self.output(Bytecode::LdaTheHole, &[]);
        self
    }

    pub fn load_true(&mut self) -> &mut Self {
        self.output(Bytecode::LdaTrue, &[]);
        self
    }

    pub fn load_false(&mut self) -> &mut Self {
        self.output(Bytecode::LdaFalse, &[]);
        self
    }

    pub fn load_boolean(&mut self, value: bool) -> &mut Self {
        if value { self.load_true() } else { self.load_false() }
    }

    // =========================================================================
    // Registers, globals, contexts
    // =========================================================================

    pub fn load_accumulator_with_register(&mut self, register: Register) -> &mut Self {
        if !self.is_register_in_accumulator(register) {
            self.output(Bytecode::Ldar, &[register.to_operand() as u32]);
        }
        self
    }

    pub fn store_accumulator_in_register(&mut self, register: Register) -> &mut Self {
        if !self.is_register_in_accumulator(register) {
            self.output(Bytecode::Star, &[register.to_operand() as u32]);
        }
        self
    }

    pub fn move_register(&mut self, from: Register, to: Register) -> &mut Self {
        assert_ne!(from, to, "moving {} onto itself", from);
        self.output(Bytecode::Mov, &[from.to_operand() as u32, to.to_operand() as u32]);
        self
    }

    pub fn load_global(&mut self, name: &Name) -> &mut Self {
        let index = self.constants.insert_name(name);
        self.output(Bytecode::LdaGlobal, &[Self::idx8(index, "global name")]);
        self
    }

    pub fn load_context_slot(&mut self, context: Register, slot_index: usize) -> &mut Self {
        self.output(
            Bytecode::LdaContextSlot,
            &[context.to_operand() as u32, Self::idx8(slot_index, "context slot")],
        );
        self
    }

    pub fn store_context_slot(&mut self, context: Register, slot_index: usize) -> &mut Self {
        self.output(
            Bytecode::StaContextSlot,
            &[context.to_operand() as u32, Self::idx8(slot_index, "context slot")],
        );
        self
    }

    /// Saves the current context in `context` and makes the accumulator the
    /// current context.
    pub fn push_context(&mut self, context: Register) -> &mut Self {
        self.output(Bytecode::PushContext, &[context.to_operand() as u32]);
        self
    }

    /// Restores the current context from `context`.
    pub fn pop_context(&mut self, context: Register) -> &mut Self {
        self.output(Bytecode::PopContext, &[context.to_operand() as u32]);
        self
    }

    // =========================================================================
    // Property access
    // =========================================================================

    pub fn load_named_property(
        &mut self,
        object: Register,
        name: &Name,
        feedback_slot: usize,
        language_mode: LanguageMode,
    ) -> &mut Self {
        let bytecode = match language_mode {
            LanguageMode::Sloppy => Bytecode::LoadICSloppy,
            LanguageMode::Strict => Bytecode::LoadICStrict,
            LanguageMode::Strong => panic!("named load in strong mode is not implemented"),
        };
        let name_index = self.constants.insert_name(name);
        self.output(
            bytecode,
            &[
                object.to_operand() as u32,
                Self::idx8(name_index, "property name"),
                Self::idx8(feedback_slot, "feedback slot"),
            ],
        );
        self
    }

    /// Loads `object[accumulator]`.
    pub fn load_keyed_property(
        &mut self,
        object: Register,
        feedback_slot: usize,
        language_mode: LanguageMode,
    ) -> &mut Self {
        let bytecode = match language_mode {
            LanguageMode::Sloppy => Bytecode::KeyedLoadICSloppy,
            LanguageMode::Strict => Bytecode::KeyedLoadICStrict,
            LanguageMode::Strong => panic!("keyed load in strong mode is not implemented"),
        };
        self.output(
            bytecode,
            &[object.to_operand() as u32, Self::idx8(feedback_slot, "feedback slot")],
        );
        self
    }

    /// Stores the accumulator to `object.name`.
    pub fn store_named_property(
        &mut self,
        object: Register,
        name: &Name,
        feedback_slot: usize,
        language_mode: LanguageMode,
    ) -> &mut Self {
        let bytecode = match language_mode {
            LanguageMode::Sloppy => Bytecode::StoreICSloppy,
            LanguageMode::Strict => Bytecode::StoreICStrict,
            LanguageMode::Strong => panic!("named store in strong mode is not implemented"),
        };
        let name_index = self.constants.insert_name(name);
        self.output(
            bytecode,
            &[
                object.to_operand() as u32,
                Self::idx8(name_index, "property name"),
                Self::idx8(feedback_slot, "feedback slot"),
            ],
        );
        self
    }

    /// Stores the accumulator to `object[key]`.
    pub fn store_keyed_property(
        &mut self,
        object: Register,
        key: Register,
        feedback_slot: usize,
        language_mode: LanguageMode,
    ) -> &mut Self {
        let bytecode = match language_mode {
            LanguageMode::Sloppy => Bytecode::KeyedStoreICSloppy,
            LanguageMode::Strict => Bytecode::KeyedStoreICStrict,
            LanguageMode::Strong => panic!("keyed store in strong mode is not implemented"),
        };
        self.output(
            bytecode,
            &[
                object.to_operand() as u32,
                key.to_operand() as u32,
                Self::idx8(feedback_slot, "feedback slot"),
            ],
        );
        self
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// `accumulator = register OP accumulator`
    pub fn binary_operation(
        &mut self,
        op: Token,
        register: Register,
        language_mode: LanguageMode,
    ) -> &mut Self {
        if language_mode.is_strong() {
            panic!("strong mode {:?} is not implemented", op);
        }
        let bytecode = op
            .binary_bytecode()
            .unwrap_or_else(|| panic!("{:?} is not a binary operator", op));
        self.output(bytecode, &[register.to_operand() as u32]);
        self
    }

    /// `accumulator = register OP accumulator`, yielding a boolean.
    pub fn compare_operation(
        &mut self,
        op: Token,
        register: Register,
        language_mode: LanguageMode,
    ) -> &mut Self {
        if language_mode.is_strong() {
            panic!("strong mode {:?} is not implemented", op);
        }
        let bytecode = op
            .compare_bytecode()
            .unwrap_or_else(|| panic!("{:?} is not a comparison", op));
        self.output(bytecode, &[register.to_operand() as u32]);
        self
    }

    pub fn logical_not(&mut self) -> &mut Self {
        self.output(Bytecode::LogicalNot, &[]);
        self
    }

    pub fn type_of(&mut self) -> &mut Self {
        self.output(Bytecode::TypeOf, &[]);
        self
    }

    /// Skipped when the accumulator is already known to be a boolean.
    pub fn cast_accumulator_to_boolean(&mut self) -> &mut Self {
        let known_boolean = self
            .last_bytecode_in_same_block()
            .is_some_and(|(b, _)| b.leaves_boolean_in_accumulator());
        if !known_boolean {
            self.output(Bytecode::ToBoolean, &[]);
        }
        self
    }

    pub fn cast_accumulator_to_name(&mut self) -> &mut Self {
        self.output(Bytecode::ToName, &[]);
        self
    }

    pub fn cast_accumulator_to_number(&mut self) -> &mut Self {
        self.output(Bytecode::ToNumber, &[]);
        self
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Calls `callable` with `receiver` and the `arg_count` registers that
    /// follow it.
    pub fn call(&mut self, callable: Register, receiver: Register, arg_count: usize) -> &mut Self {
        self.output(
            Bytecode::Call,
            &[
                callable.to_operand() as u32,
                receiver.to_operand() as u32,
                Self::count8(arg_count),
            ],
        );
        self
    }

    pub fn call_runtime(
        &mut self,
        function_id: u16,
        first_arg: Register,
        arg_count: usize,
    ) -> &mut Self {
        let first_arg = if arg_count == 0 { 0 } else { first_arg.to_operand() as u32 };
        self.output(
            Bytecode::CallRuntime,
            &[function_id as u32, first_arg, Self::count8(arg_count)],
        );
        self
    }

    /// `new constructor(args...)`
    pub fn construct(
        &mut self,
        constructor: Register,
        first_arg: Register,
        arg_count: usize,
    ) -> &mut Self {
        let first_arg = if arg_count == 0 { 0 } else { first_arg.to_operand() as u32 };
        self.output(
            Bytecode::New,
            &[constructor.to_operand() as u32, first_arg, Self::count8(arg_count)],
        );
        self
    }

    fn count8(count: usize) -> u32 {
        assert!(count <= u8::MAX as usize, "argument count {} does not fit in 8 bits", count);
        count as u32
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    /// Binds `label` here and patches every jump waiting for it.
    pub fn bind(&mut self, label: &mut BytecodeLabel) -> &mut Self {
        let target = self.current_offset();
        if let LabelState::Linked { last_referrer } = label.state() {
            self.patch_chain(last_referrer, target);
        }
        label.bind_to(target);
        self.leave_basic_block();
        self
    }

    /// Binds `label` to the position of the already-bound `target`.
    pub fn bind_alias(&mut self, target: &BytecodeLabel, label: &mut BytecodeLabel) -> &mut Self {
        let offset = target
            .offset()
            .unwrap_or_else(|| panic!("alias target label is not bound"));
        if let LabelState::Linked { last_referrer } = label.state() {
            self.patch_chain(last_referrer, offset);
        }
        label.bind_to(offset);
        self.leave_basic_block();
        self
    }

    fn patch_chain(&mut self, last_referrer: usize, target: usize) {
        let mut referrer = Some(last_referrer);
        while let Some(jump_location) = referrer {
            self.patch_jump(jump_location, target);
            self.unbound_jumps -= 1;
            referrer = self.label_links.remove(&jump_location);
        }
    }

    fn patch_jump(&mut self, jump_location: usize, target: usize) {
        let bytecode = Bytecode::from_byte(self.bytecodes[jump_location])
            .filter(|b| b.is_jump_immediate())
            .unwrap_or_else(|| panic!("no placeholder jump at offset {}", jump_location));
        let delta = target as i64 - jump_location as i64;

        if let Ok(delta) = i8::try_from(delta) {
            self.bytecodes[jump_location + 1] = delta as u8;
        } else {
            let delta = i32::try_from(delta)
                .unwrap_or_else(|_| panic!("jump delta {} is out of range", delta));
            let index = self.constants.insert(Object::Smi(delta));
            let index = Self::idx8(index, "jump constant");
            let promoted = bytecode.with_constant_operand();
            self.bytecodes[jump_location] = promoted.to_byte();
            self.bytecodes[jump_location + 1] = index as u8;
            trace!(
                offset = jump_location,
                delta,
                constant = index,
                "promoted {} to {}",
                bytecode,
                promoted
            );
        }
    }

    fn output_jump(&mut self, jump: Bytecode, label: &mut BytecodeLabel) -> &mut Self {
        let current = self.current_offset();
        match label.state() {
            LabelState::Bound { offset } => {
                let delta = offset as i64 - current as i64;
                if let Ok(delta) = i8::try_from(delta) {
                    self.output(jump, &[delta as u8 as u32]);
                } else {
                    let delta = i32::try_from(delta)
                        .unwrap_or_else(|_| panic!("jump delta {} is out of range", delta));
                    let index = self.constants.insert(Object::Smi(delta));
                    let index = Self::idx8(index, "jump constant");
                    self.output(jump.with_constant_operand(), &[index]);
                }
            }
            LabelState::Linked { last_referrer } => {
                self.label_links.insert(current, last_referrer);
                label.set_referrer(current);
                self.output(jump, &[0]);
                self.unbound_jumps += 1;
            }
            LabelState::Unused => {
                label.set_referrer(current);
                self.output(jump, &[0]);
                self.unbound_jumps += 1;
            }
        }
        self.leave_basic_block();
        self
    }

    pub fn jump(&mut self, label: &mut BytecodeLabel) -> &mut Self {
        self.output_jump(Bytecode::Jump, label)
    }

    pub fn jump_if_true(&mut self, label: &mut BytecodeLabel) -> &mut Self {
        self.output_jump(Bytecode::JumpIfTrue, label)
    }

    pub fn jump_if_false(&mut self, label: &mut BytecodeLabel) -> &mut Self {
        self.output_jump(Bytecode::JumpIfFalse, label)
    }

    /// Both mark a basic-block boundary for the peephole rules.
    pub fn enter_block(&mut self) -> &mut Self {
        self.leave_basic_block();
        self
    }

    pub fn leave_block(&mut self) -> &mut Self {
        self.leave_basic_block();
        self
    }

    pub fn throw(&mut self) -> &mut Self {
        self.output(Bytecode::Throw, &[]);
        self
    }

    pub fn ret(&mut self) -> &mut Self {
        self.output(Bytecode::Return, &[]);
        self
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    fn ensure_return(&mut self) {
        let returns = matches!(self.last_bytecode_in_same_block(), Some((Bytecode::Return, _)));
        if !returns {
            self.load_undefined();
            self.ret();
        }
    }

    /// Freezes the builder into an immutable array.
    pub fn to_bytecode_array(mut self) -> BytecodeArray {
        let parameter_count = self.parameter_count();
        let locals_count = self.locals_count();
        assert_eq!(
            self.unbound_jumps, 0,
            "{} jumps target labels that were never bound",
            self.unbound_jumps
        );
        assert_eq!(
            self.registers.outstanding(),
            0,
            "temporary registers are still borrowed"
        );

        self.ensure_return();

        let register_count = locals_count + self.registers.max_temporaries();
        let frame_size = register_count * POINTER_SIZE;
        debug!(
            bytes = self.bytecodes.len(),
            constants = self.constants.len(),
            frame_size,
            parameter_count,
            "finalized bytecode array"
        );
        BytecodeArray::new(
            self.bytecodes,
            self.constants.into_entries(),
            frame_size,
            parameter_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::array::DecodedBytecode;
    use crate::lang::name::NameTable;

    fn builder(parameters: usize, locals: usize) -> BytecodeArrayBuilder {
        let mut builder = BytecodeArrayBuilder::new();
        builder.set_parameter_count(parameters).set_locals_count(locals);
        builder
    }

    fn bytecodes(array: &BytecodeArray) -> Vec<Bytecode> {
        array.iter().map(|d| d.bytecode).collect()
    }

    fn decoded(array: &BytecodeArray) -> Vec<DecodedBytecode> {
        array.iter().collect()
    }

    #[test]
    fn test_smi_fast_paths() {
        let mut b = builder(1, 0);
        b.load_literal(Object::Smi(0))
            .load_literal(Object::Smi(-128))
            .load_literal(Object::Smi(127))
            .load_literal(Object::Smi(128))
            .ret();
        let array = b.to_bytecode_array();
        assert_eq!(
            bytecodes(&array),
            vec![
                Bytecode::LdaZero,
                Bytecode::LdaSmi8,
                Bytecode::LdaSmi8,
                Bytecode::LdaConstant,
                Bytecode::Return
            ]
        );
        assert_eq!(array.constant_pool(), &[Object::Smi(128)]);
    }

    #[test]
    fn test_singletons_use_dedicated_bytecodes() {
        let mut b = builder(1, 0);
        b.load_literal(Object::Undefined)
            .load_literal(Object::Null)
            .load_literal(Object::TheHole)
            .load_literal(Object::True)
            .load_literal(Object::False);
        let array = b.to_bytecode_array();
        assert!(array.constant_pool().is_empty());
        assert_eq!(bytecodes(&array)[..5], [
            Bytecode::LdaUndefined,
            Bytecode::LdaNull,
            Bytecode::LdaTheHole,
            Bytecode::LdaTrue,
            Bytecode::LdaFalse
        ]);
    }

    #[test]
    fn test_constant_dedup_by_identity() {
        let mut b = builder(1, 0);
        let shared = Object::new_heap_number(3.25);
        for _ in 0..4 {
            b.load_literal(shared.clone());
        }
        b.load_literal(Object::new_heap_number(3.25))
            .load_literal(Object::new_heap_number(3.25));
        let array = b.to_bytecode_array();
        assert_eq!(array.constant_pool().len(), 3);
        let indices: Vec<u32> = decoded(&array)
            .iter()
            .filter(|d| d.bytecode == Bytecode::LdaConstant)
            .map(|d| d.operands[0])
            .collect();
        assert_eq!(indices, vec![0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_wide_constant_load() {
        let mut b = builder(1, 0);
        for i in 0..300 {
            b.load_literal(Object::Smi(1000 + i));
        }
        let array = b.to_bytecode_array();
        let last = decoded(&array)
            .into_iter()
            .filter(|d| d.bytecode == Bytecode::LdaConstantWide)
            .last()
            .map(|d| d.operands[0]);
        assert_eq!(last, Some(299));
    }

    #[test]
    fn test_register_load_elided_after_store() {
        let mut b = builder(1, 1);
        let r0 = Register::new(0);
        b.load_literal(Object::Smi(7))
            .store_accumulator_in_register(r0)
            .load_accumulator_with_register(r0)
            .ret();
        let array = b.to_bytecode_array();
        assert_eq!(
            bytecodes(&array),
            vec![Bytecode::LdaSmi8, Bytecode::Star, Bytecode::Return]
        );
    }

    #[test]
    fn test_register_load_kept_across_block_boundary() {
        let mut b = builder(1, 1);
        let r0 = Register::new(0);
        let mut label = BytecodeLabel::new();
        b.store_accumulator_in_register(r0)
            .bind(&mut label)
            .load_accumulator_with_register(r0)
            .ret();
        let array = b.to_bytecode_array();
        assert_eq!(
            bytecodes(&array),
            vec![Bytecode::Star, Bytecode::Ldar, Bytecode::Return]
        );
    }

    #[test]
    fn test_boolean_cast_elision() {
        let r0 = Register::new(0);

        let mut b = builder(1, 1);
        b.compare_operation(Token::Lt, r0, LanguageMode::Sloppy)
            .cast_accumulator_to_boolean()
            .ret();
        assert_eq!(
            bytecodes(&b.to_bytecode_array()),
            vec![Bytecode::TestLessThan, Bytecode::Return]
        );

        let mut b = builder(1, 1);
        b.compare_operation(Token::Lt, r0, LanguageMode::Sloppy)
            .enter_block()
            .cast_accumulator_to_boolean()
            .ret();
        assert_eq!(
            bytecodes(&b.to_bytecode_array()),
            vec![Bytecode::TestLessThan, Bytecode::ToBoolean, Bytecode::Return]
        );

        let mut b = builder(1, 1);
        b.load_accumulator_with_register(r0)
            .cast_accumulator_to_boolean()
            .ret();
        assert_eq!(
            bytecodes(&b.to_bytecode_array()),
            vec![Bytecode::Ldar, Bytecode::ToBoolean, Bytecode::Return]
        );
    }

    #[test]
    fn test_forward_jump_at_immediate_boundary() {
        let mut b = builder(1, 0);
        let mut label = BytecodeLabel::new();
        b.jump(&mut label);
        let size_before = b.current_offset();
        for _ in 0..125 {
            b.load_literal(Object::Smi(0));
        }
        b.bind(&mut label);
        assert_eq!(b.current_offset(), size_before + 125);
        let array = b.to_bytecode_array();
        let jump = &decoded(&array)[0];
        assert_eq!(jump.bytecode, Bytecode::Jump);
        assert_eq!(jump.operands[0] as u8 as i8, 127);
        assert!(array.constant_pool().is_empty());
    }

    #[test]
    fn test_forward_jump_promoted_past_boundary() {
        let mut b = builder(1, 0);
        let mut label = BytecodeLabel::new();
        b.jump_if_false(&mut label);
        for _ in 0..126 {
            b.load_literal(Object::Smi(0));
        }
        let size_before_bind = b.current_offset();
        b.bind(&mut label);
        assert_eq!(b.current_offset(), size_before_bind);
        let array = b.to_bytecode_array();
        let jump = &decoded(&array)[0];
        assert_eq!(jump.bytecode, Bytecode::JumpIfFalseConstant);
        assert_eq!(jump.size(), Bytecode::JumpIfFalse.size());
        assert_eq!(array.constant_pool()[jump.operands[0] as usize], Object::Smi(128));
        assert_eq!(array.jump_target(jump), Some(128));
    }

    #[test]
    fn test_backward_jump_boundary() {
        let mut b = builder(1, 0);
        let mut near = BytecodeLabel::new();
        b.bind(&mut near);
        for _ in 0..128 {
            b.load_literal(Object::Smi(0));
        }
        b.jump(&mut near);
        let array = b.to_bytecode_array();
        let jump = decoded(&array).into_iter().find(|d| d.bytecode.is_jump());
        assert_eq!(jump.map(|d| d.operands[0] as u8 as i8), Some(-128));

        let mut b = builder(1, 0);
        let mut far = BytecodeLabel::new();
        b.bind(&mut far);
        for _ in 0..129 {
            b.load_literal(Object::Smi(0));
        }
        b.jump(&mut far);
        let array = b.to_bytecode_array();
        let jump = decoded(&array).into_iter().find(|d| d.bytecode.is_jump());
        assert_eq!(jump.as_ref().map(|d| d.bytecode), Some(Bytecode::JumpConstant));
        assert_eq!(array.constant_pool(), &[Object::Smi(-129)]);
    }

    #[test]
    fn test_multiple_forward_referrers_all_patched() {
        let mut b = builder(1, 0);
        let mut end = BytecodeLabel::new();
        b.load_true()
            .jump_if_true(&mut end)
            .load_false()
            .jump_if_false(&mut end)
            .load_null()
            .jump(&mut end);
        b.bind(&mut end).load_literal(Object::Smi(1)).ret();
        let array = b.to_bytecode_array();
        let targets: Vec<_> = decoded(&array)
            .iter()
            .filter(|d| d.bytecode.is_jump())
            .map(|d| array.jump_target(d))
            .collect();
        assert_eq!(targets, vec![Some(9); 3]);
    }

    #[test]
    fn test_bind_alias() {
        let mut b = builder(1, 0);
        let mut target = BytecodeLabel::new();
        let mut alias = BytecodeLabel::new();
        b.load_true().jump_if_true(&mut alias).load_null();
        b.bind(&mut target).bind_alias(&target, &mut alias).ret();
        assert_eq!(alias.offset(), target.offset());
        let array = b.to_bytecode_array();
        let jump = &decoded(&array)[1];
        assert_eq!(array.jump_target(jump), target.offset());
    }

    #[test]
    fn test_fall_off_end_synthesizes_return() {
        let mut b = builder(1, 0);
        b.load_literal(Object::Smi(2));
        let array = b.to_bytecode_array();
        assert_eq!(
            bytecodes(&array),
            vec![Bytecode::LdaSmi8, Bytecode::LdaUndefined, Bytecode::Return]
        );
    }

    #[test]
    fn test_return_before_bound_label_is_not_final() {
        let mut b = builder(1, 0);
        let mut label = BytecodeLabel::new();
        b.load_true().jump_if_true(&mut label).ret().bind(&mut label);
        let array = b.to_bytecode_array();
        let tail: Vec<_> = bytecodes(&array).into_iter().rev().take(2).collect();
        assert_eq!(tail, vec![Bytecode::Return, Bytecode::LdaUndefined]);
    }

    #[test]
    fn test_explicit_return_not_duplicated() {
        let mut b = builder(1, 0);
        b.load_undefined().ret();
        assert_eq!(b.to_bytecode_array().len(), 2);
    }

    #[test]
    fn test_frame_size() {
        let mut b = builder(2, 3);
        let t = b.borrow_temporary_register();
        b.store_accumulator_in_register(t);
        b.return_temporary_register(t);
        let array = b.to_bytecode_array();
        assert_eq!(array.frame_size(), 4 * POINTER_SIZE);
        assert_eq!(array.register_count(), 4);
        assert_eq!(array.parameter_count(), 2);
    }

    #[test]
    fn test_variable_registers() {
        let names = NameTable::new();
        let mut scope = crate::lang::scope::Scope::new_function(Default::default());
        scope.declare_this(names.this_string()).set_is_used(true);
        let a = scope.declare_parameter(names.intern("a"));
        let v = scope.declare_local(names.intern("v"), crate::lang::scope::VariableMode::Var);
        scope.allocate_variables(0);

        let b = builder(scope.num_parameters() + 1, 1);
        let receiver = scope.receiver().map(|r| b.variable_register(r));
        assert_eq!(receiver, Some(b.parameter(0)));
        assert_eq!(b.variable_register(scope.variable(a)), b.parameter(1));
        assert_eq!(b.variable_register(scope.variable(v)), Register::new(0));
    }

    #[test]
    fn test_call_operands() {
        let mut b = builder(1, 3);
        b.call(Register::new(0), Register::new(1), 1)
            .call_runtime(7, Register::new(0), 0)
            .construct(Register::new(0), Register::new(1), 2);
        let array = b.to_bytecode_array();
        let d = decoded(&array);
        assert_eq!(d[0].operands, vec![0, 0xff, 1]);
        assert_eq!(d[1].operands, vec![7, 0, 0]);
        assert_eq!(d[2].bytecode, Bytecode::New);
    }

    #[test]
    fn test_named_property_uses_name_constant() {
        let names = NameTable::new();
        let mut b = builder(2, 0);
        let object = b.parameter(1);
        let length = names.intern("length");
        b.load_named_property(object, &length, 0, LanguageMode::Sloppy)
            .store_named_property(object, &length, 1, LanguageMode::Strict)
            .load_global(&length);
        let array = b.to_bytecode_array();
        assert_eq!(array.constant_pool().len(), 1);
        assert_eq!(
            bytecodes(&array)[..3],
            [Bytecode::LoadICSloppy, Bytecode::StoreICStrict, Bytecode::LdaGlobal]
        );
    }

    #[test]
    #[should_panic(expected = "not implemented")]
    fn test_strong_store_is_rejected() {
        let names = NameTable::new();
        let mut b = builder(2, 0);
        let object = b.parameter(1);
        b.store_named_property(object, &names.intern("x"), 0, LanguageMode::Strong);
    }

    #[test]
    #[should_panic(expected = "not implemented")]
    fn test_strong_binary_operation_is_rejected() {
        let mut b = builder(1, 1);
        b.binary_operation(Token::Add, Register::new(0), LanguageMode::Strong);
    }

    #[test]
    #[should_panic(expected = "invalid operand")]
    fn test_unallocated_register_is_fatal() {
        let mut b = builder(1, 1);
        b.store_accumulator_in_register(Register::new(1));
    }

    #[test]
    #[should_panic(expected = "invalid operand")]
    fn test_out_of_range_parameter_is_fatal() {
        let mut b = builder(2, 0);
        b.load_accumulator_with_register(Register::from_parameter_index(0, 3));
    }

    #[test]
    #[should_panic(expected = "already bound")]
    fn test_double_bind_is_fatal() {
        let mut b = builder(1, 0);
        let mut label = BytecodeLabel::new();
        b.bind(&mut label).bind(&mut label);
    }

    #[test]
    #[should_panic(expected = "never bound")]
    fn test_unbound_forward_jump_is_fatal() {
        let mut b = builder(1, 0);
        let mut label = BytecodeLabel::new();
        b.jump(&mut label);
        b.to_bytecode_array();
    }

    #[test]
    #[should_panic(expected = "before borrowing temporaries")]
    fn test_temporary_before_locals_is_fatal() {
        let mut b = BytecodeArrayBuilder::new();
        b.set_parameter_count(1);
        b.borrow_temporary_register();
    }

    #[test]
    fn test_temporaries_start_after_locals() {
        let mut b = builder(1, 2);
        let t = b.borrow_temporary_register();
        assert_eq!(t.index(), 2);
        assert_eq!(b.temporary_register_count(), 1);
    }

    #[test]
    #[should_panic(expected = "never set")]
    fn test_finalize_requires_counts() {
        BytecodeArrayBuilder::new().to_bytecode_array();
    }
}
