use crate::bytecode::{Bytecode, BytecodeArray, DecodedBytecode, Register, verify};
use crate::lang::name::Name;
use crate::lang::value::{HeapObject, Object};
use crate::runtime::runtime_error::RuntimeError;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub max_steps: Option<usize>,
    pub max_frame_registers: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_steps: None,
            max_frame_registers: 1024,
        }
    }
}

/// Register file of one activation.
struct Frame {
    registers: Vec<Object>,
    /// Receiver first.
    parameters: Vec<Object>,
}

impl Frame {
    fn read(&self, register: Register) -> Option<&Object> {
        if register.is_parameter() {
            let index = register.to_parameter_index(self.parameters.len());
            self.parameters.get(usize::try_from(index).ok()?)
        } else if register.index() >= 0 {
            self.registers.get(register.index() as usize)
        } else {
            None
        }
    }

    fn slot_mut(&mut self, register: Register) -> Option<&mut Object> {
        if register.is_parameter() {
            let index = register.to_parameter_index(self.parameters.len());
            self.parameters.get_mut(usize::try_from(index).ok()?)
        } else if register.index() >= 0 {
            self.registers.get_mut(register.index() as usize)
        } else {
            None
        }
    }
}

/// Executes a single function's bytecode.
///
/// Covers the accumulator, register, arithmetic, comparison, cast and
/// control-flow bytecodes. Anything needing an object model or a call stack
/// stops with [`RuntimeError::Unsupported`].
pub struct Interpreter {
    config: InterpreterConfig,
    steps: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self { config, steps: 0 }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Instructions executed by the last run.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn reset_execution_state(&mut self) {
        self.steps = 0;
    }

    /// Runs `array` with `receiver` and `args`. Missing arguments are
    /// undefined.
    pub fn run(
        &mut self,
        array: &BytecodeArray,
        receiver: Object,
        args: &[Object],
    ) -> Result<Object, RuntimeError> {
        self.reset_execution_state();
        verify(array)?;

        let registers = array.register_count();
        if registers > self.config.max_frame_registers {
            return Err(RuntimeError::FrameTooLarge {
                registers,
                max: self.config.max_frame_registers,
            });
        }
        let expected = array.parameter_count() - 1;
        if args.len() > expected {
            return Err(RuntimeError::TooManyArguments {
                expected,
                got: args.len(),
            });
        }

        let mut parameters = Vec::with_capacity(array.parameter_count());
        parameters.push(receiver);
        parameters.extend(args.iter().cloned());
        parameters.resize(array.parameter_count(), Object::Undefined);

        let mut frame = Frame {
            registers: vec![Object::Undefined; registers],
            parameters,
        };
        self.exec(array, &mut frame)
    }

    fn check_limits(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps
            && self.steps > max
        {
            return Err(RuntimeError::StepLimitExceeded(max));
        }

        Ok(())
    }

    fn exec(&mut self, array: &BytecodeArray, frame: &mut Frame) -> Result<Object, RuntimeError> {
        let mut accumulator = Object::Undefined;
        let mut pc = 0;

        loop {
            self.check_limits()?;

            let decoded = array
                .decode_at(pc)
                .unwrap_or_else(|| panic!("verified bytecode failed to decode at {}", pc));
            let bytecode = decoded.bytecode;
            trace!(offset = pc, %bytecode, "dispatch");
            let unsupported = move || RuntimeError::Unsupported {
                bytecode,
                offset: pc,
            };
            let mut next = pc + decoded.size();

            match bytecode {
                // Literals
                Bytecode::LdaZero => accumulator = Object::Smi(0),
                Bytecode::LdaSmi8 => accumulator = Object::Smi(decoded.imm(0) as i32),
                Bytecode::LdaConstant | Bytecode::LdaConstantWide => {
                    accumulator = array.constant_pool()[decoded.operands[0] as usize].clone()
                }
                Bytecode::LdaUndefined => accumulator = Object::Undefined,
                Bytecode::LdaNull => accumulator = Object::Null,
                Bytecode::LdaTheHole => accumulator = Object::TheHole,
                Bytecode::LdaTrue => accumulator = Object::True,
                Bytecode::LdaFalse => accumulator = Object::False,

                // Registers
                Bytecode::Ldar => {
                    accumulator = frame.read(decoded.register(0)).ok_or_else(unsupported)?.clone()
                }
                Bytecode::Star => {
                    *frame.slot_mut(decoded.register(0)).ok_or_else(unsupported)? =
                        accumulator.clone()
                }
                Bytecode::Mov => {
                    let value = frame.read(decoded.register(0)).ok_or_else(unsupported)?.clone();
                    *frame.slot_mut(decoded.register(1)).ok_or_else(unsupported)? = value;
                }

                // Binary operators: register OP accumulator
                Bytecode::Add
                | Bytecode::Sub
                | Bytecode::Mul
                | Bytecode::Div
                | Bytecode::Mod
                | Bytecode::BitwiseOr
                | Bytecode::BitwiseXor
                | Bytecode::BitwiseAnd
                | Bytecode::ShiftLeft
                | Bytecode::ShiftRight
                | Bytecode::ShiftRightLogical => {
                    let left = frame.read(decoded.register(0)).ok_or_else(unsupported)?;
                    accumulator = binary_op(bytecode, left, &accumulator);
                }

                // Comparisons: register OP accumulator
                Bytecode::TestEqual
                | Bytecode::TestNotEqual
                | Bytecode::TestEqualStrict
                | Bytecode::TestNotEqualStrict
                | Bytecode::TestLessThan
                | Bytecode::TestGreaterThan
                | Bytecode::TestLessThanOrEqual
                | Bytecode::TestGreaterThanOrEqual => {
                    let left = frame.read(decoded.register(0)).ok_or_else(unsupported)?;
                    accumulator = Object::boolean(compare_op(bytecode, left, &accumulator));
                }

                // Unary operators and casts
                Bytecode::LogicalNot => accumulator = Object::boolean(!accumulator.to_boolean()),
                Bytecode::TypeOf => {
                    accumulator = Object::string(Name::new_uninterned(accumulator.type_of()))
                }
                Bytecode::ToBoolean => accumulator = Object::boolean(accumulator.to_boolean()),
                Bytecode::ToNumber => accumulator = Object::number(accumulator.to_number()),
                Bytecode::ToName => {
                    if !accumulator.is_string() {
                        accumulator =
                            Object::string(Name::new_uninterned(&accumulator.to_string()));
                    }
                }

                // Control flow
                Bytecode::Jump | Bytecode::JumpConstant => next = jump_target(array, &decoded),
                Bytecode::JumpIfTrue | Bytecode::JumpIfTrueConstant => {
                    if accumulator == Object::True {
                        next = jump_target(array, &decoded);
                    }
                }
                Bytecode::JumpIfFalse | Bytecode::JumpIfFalseConstant => {
                    if accumulator == Object::False {
                        next = jump_target(array, &decoded);
                    }
                }
                Bytecode::Return => return Ok(accumulator),
                Bytecode::Throw => return Err(RuntimeError::Thrown(accumulator)),

                _ => return Err(unsupported()),
            }

            pc = next;
        }
    }
}

fn jump_target(array: &BytecodeArray, decoded: &DecodedBytecode) -> usize {
    array
        .jump_target(decoded)
        .unwrap_or_else(|| panic!("verified jump at {} has no target", decoded.offset))
}

fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

fn binary_op(bytecode: Bytecode, left: &Object, right: &Object) -> Object {
    if bytecode == Bytecode::Add {
        if left.is_string() || right.is_string() {
            return Object::string(Name::new_uninterned(&format!("{}{}", left, right)));
        }
        if let (Object::Smi(a), Object::Smi(b)) = (left, right)
            && let Some(sum) = a.checked_add(*b)
        {
            return Object::Smi(sum);
        }
    }

    let (a, b) = (left.to_number(), right.to_number());
    let result = match bytecode {
        Bytecode::Add => a + b,
        Bytecode::Sub => a - b,
        Bytecode::Mul => a * b,
        Bytecode::Div => a / b,
        Bytecode::Mod => a % b,
        Bytecode::BitwiseOr => (to_int32(a) | to_int32(b)) as f64,
        Bytecode::BitwiseXor => (to_int32(a) ^ to_int32(b)) as f64,
        Bytecode::BitwiseAnd => (to_int32(a) & to_int32(b)) as f64,
        Bytecode::ShiftLeft => to_int32(a).wrapping_shl(to_int32(b) as u32 & 31) as f64,
        Bytecode::ShiftRight => (to_int32(a) >> (to_int32(b) as u32 & 31)) as f64,
        Bytecode::ShiftRightLogical => ((to_int32(a) as u32) >> (to_int32(b) as u32 & 31)) as f64,
        other => unreachable!("{} is not a binary operator", other),
    };
    Object::number(result)
}

fn compare_op(bytecode: Bytecode, left: &Object, right: &Object) -> bool {
    if let (Object::Heap(a), Object::Heap(b)) = (left, right)
        && let (HeapObject::String(x), HeapObject::String(y)) = (&**a, &**b)
    {
        let (x, y) = (x.as_str(), y.as_str());
        match bytecode {
            Bytecode::TestLessThan => return x < y,
            Bytecode::TestGreaterThan => return x > y,
            Bytecode::TestLessThanOrEqual => return x <= y,
            Bytecode::TestGreaterThanOrEqual => return x >= y,
            _ => {}
        }
    }

    let (a, b) = (left.to_number(), right.to_number());
    match bytecode {
        Bytecode::TestEqual => left.loose_equals(right),
        Bytecode::TestNotEqual => !left.loose_equals(right),
        Bytecode::TestEqualStrict => left.strict_equals(right),
        Bytecode::TestNotEqualStrict => !left.strict_equals(right),
        Bytecode::TestLessThan => a < b,
        Bytecode::TestGreaterThan => a > b,
        Bytecode::TestLessThanOrEqual => a <= b,
        Bytecode::TestGreaterThanOrEqual => a >= b,
        other => unreachable!("{} is not a comparison", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{BytecodeArrayBuilder, BytecodeLabel, Token};
    use crate::lang::scope::LanguageMode;

    fn builder(parameters: usize, locals: usize) -> BytecodeArrayBuilder {
        let mut builder = BytecodeArrayBuilder::new();
        builder.set_parameter_count(parameters).set_locals_count(locals);
        builder
    }

    fn run(array: &BytecodeArray, args: &[Object]) -> Result<Object, RuntimeError> {
        Interpreter::new().run(array, Object::Undefined, args)
    }

    #[test]
    fn test_add_parameter_and_local() {
        let mut b = builder(2, 1);
        let a = b.parameter(1);
        let local = Register::new(0);
        b.load_literal(Object::Smi(1))
            .store_accumulator_in_register(local)
            .load_accumulator_with_register(a)
            .binary_operation(Token::Add, local, LanguageMode::Sloppy)
            .ret();
        let array = b.to_bytecode_array();
        assert_eq!(run(&array, &[Object::Smi(5)]), Ok(Object::Smi(6)));
    }

    #[test]
    fn test_missing_argument_is_undefined() {
        let mut b = builder(2, 0);
        let a = b.parameter(1);
        b.load_accumulator_with_register(a).type_of().ret();
        let result = run(&b.to_bytecode_array(), &[]);
        assert_eq!(result.map(|v| v.to_string()), Ok("undefined".to_string()));
    }

    #[test]
    fn test_operand_order_is_register_then_accumulator() {
        let mut b = builder(1, 1);
        let r0 = Register::new(0);
        b.load_literal(Object::Smi(10))
            .store_accumulator_in_register(r0)
            .load_literal(Object::Smi(3))
            .binary_operation(Token::Sub, r0, LanguageMode::Strict)
            .ret();
        assert_eq!(run(&b.to_bytecode_array(), &[]), Ok(Object::Smi(7)));
    }

    #[test]
    fn test_smi_overflow_becomes_heap_number() {
        let mut b = builder(1, 1);
        let r0 = Register::new(0);
        b.load_literal(Object::Smi(i32::MAX))
            .store_accumulator_in_register(r0)
            .load_literal(Object::Smi(1))
            .binary_operation(Token::Add, r0, LanguageMode::Sloppy)
            .ret();
        let result = run(&b.to_bytecode_array(), &[]);
        assert_eq!(result.map(|v| v.to_number()), Ok(2_147_483_648.0));
    }

    #[test]
    fn test_string_concatenation() {
        let mut b = builder(2, 1);
        let r0 = Register::new(0);
        let a = b.parameter(1);
        b.load_literal(Object::string(Name::new_uninterned("n=")))
            .store_accumulator_in_register(r0)
            .load_accumulator_with_register(a)
            .binary_operation(Token::Add, r0, LanguageMode::Sloppy)
            .ret();
        let result = run(&b.to_bytecode_array(), &[Object::Smi(4)]);
        assert_eq!(result.map(|v| v.to_string()), Ok("n=4".to_string()));
    }

    #[test]
    fn test_bitwise_and_shifts() {
        let cases = [
            (Token::BitOr, 12, 3, 15),
            (Token::BitAnd, 12, 10, 8),
            (Token::Shl, 1, 33, 2),
            (Token::Sar, -8, 1, -4),
        ];
        for (op, left, right, expected) in cases {
            let mut b = builder(1, 1);
            let r0 = Register::new(0);
            b.load_literal(Object::Smi(left))
                .store_accumulator_in_register(r0)
                .load_literal(Object::Smi(right))
                .binary_operation(op, r0, LanguageMode::Sloppy)
                .ret();
            assert_eq!(run(&b.to_bytecode_array(), &[]), Ok(Object::Smi(expected)));
        }
        assert_eq!(to_int32(4_294_967_297.0), 1);
        assert_eq!(to_int32(f64::NAN), 0);
    }

    #[test]
    fn test_conditional_branch() {
        // a < 3 ? 100 : 200
        let mut b = builder(2, 1);
        let r0 = Register::new(0);
        let mut else_label = BytecodeLabel::new();
        let mut done = BytecodeLabel::new();
        let a = b.parameter(1);
        b.load_accumulator_with_register(a)
            .store_accumulator_in_register(r0)
            .load_literal(Object::Smi(3))
            .compare_operation(Token::Lt, r0, LanguageMode::Sloppy)
            .cast_accumulator_to_boolean()
            .jump_if_false(&mut else_label)
            .load_literal(Object::Smi(100))
            .jump(&mut done)
            .bind(&mut else_label)
            .load_literal(Object::Smi(200))
            .bind(&mut done)
            .ret();
        let array = b.to_bytecode_array();
        assert_eq!(run(&array, &[Object::Smi(1)]), Ok(Object::Smi(100)));
        assert_eq!(run(&array, &[Object::Smi(5)]), Ok(Object::Smi(200)));
    }

    #[test]
    fn test_promoted_jump_executes() {
        let mut b = builder(1, 0);
        let mut skip = BytecodeLabel::new();
        b.load_true().jump_if_true(&mut skip);
        for _ in 0..200 {
            b.load_literal(Object::Smi(1));
        }
        b.bind(&mut skip).load_literal(Object::Smi(9)).ret();
        let array = b.to_bytecode_array();
        assert_eq!(run(&array, &[]), Ok(Object::Smi(9)));
    }

    #[test]
    fn test_loop_hits_step_limit() {
        let mut b = builder(1, 0);
        let mut top = BytecodeLabel::new();
        b.bind(&mut top).jump(&mut top);
        let array = b.to_bytecode_array();
        let mut interpreter = Interpreter::with_config(InterpreterConfig {
            max_steps: Some(50),
            ..InterpreterConfig::default()
        });
        let result = interpreter.run(&array, Object::Undefined, &[]);
        assert_eq!(result, Err(RuntimeError::StepLimitExceeded(50)));
    }

    #[test]
    fn test_throw() {
        let mut b = builder(1, 0);
        b.load_literal(Object::Smi(42)).throw();
        let result = run(&b.to_bytecode_array(), &[]);
        assert_eq!(result, Err(RuntimeError::Thrown(Object::Smi(42))));
    }

    #[test]
    fn test_unsupported_bytecode() {
        let mut b = builder(1, 1);
        b.push_context(Register::new(0)).ret();
        let result = run(&b.to_bytecode_array(), &[]);
        assert!(matches!(
            result,
            Err(RuntimeError::Unsupported {
                bytecode: Bytecode::PushContext,
                offset: 0
            })
        ));
    }

    #[test]
    fn test_too_many_arguments() {
        let mut b = builder(1, 0);
        b.ret();
        let result = run(&b.to_bytecode_array(), &[Object::Null]);
        assert_eq!(
            result,
            Err(RuntimeError::TooManyArguments {
                expected: 0,
                got: 1
            })
        );
    }

    #[test]
    fn test_frame_limit() {
        let b = builder(1, 8);
        let array = b.to_bytecode_array();
        let mut interpreter = Interpreter::with_config(InterpreterConfig {
            max_frame_registers: 4,
            ..InterpreterConfig::default()
        });
        assert_eq!(
            interpreter.run(&array, Object::Undefined, &[]),
            Err(RuntimeError::FrameTooLarge {
                registers: 8,
                max: 4
            })
        );
    }
}
