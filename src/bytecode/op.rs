use serde::{Deserialize, Serialize};

// =============================================================================
// OPERANDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    /// No operand at this position.
    None,
    /// Unsigned 8-bit count.
    Count8,
    /// Signed 8-bit immediate.
    Imm8,
    /// Unsigned 8-bit constant pool or slot index.
    Idx8,
    /// Unsigned 16-bit index, little endian.
    Idx16,
    /// 8-bit register operand.
    Reg8,
    /// Register operand that is ignored (and encoded as 0) when the
    /// following count is zero.
    MaybeReg8,
}

impl OperandType {
    pub fn size(self) -> usize {
        match self {
            OperandType::None => 0,
            OperandType::Idx16 => 2,
            OperandType::Count8
            | OperandType::Imm8
            | OperandType::Idx8
            | OperandType::Reg8
            | OperandType::MaybeReg8 => 1,
        }
    }

    pub fn is_register(self) -> bool {
        matches!(self, OperandType::Reg8 | OperandType::MaybeReg8)
    }

    /// Largest encodable value.
    pub fn max_value(self) -> u32 {
        match self {
            OperandType::None => 0,
            OperandType::Idx16 => u16::MAX as u32,
            _ => u8::MAX as u32,
        }
    }
}

// =============================================================================
// BYTECODES
// =============================================================================

macro_rules! bytecode_list {
    ($($name:ident => [$($operand:ident),*]),* $(,)?) => {
        /// Register-machine instructions. Most operations read and write the
        /// implicit accumulator.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Bytecode {
            $($name),*
        }

        impl Bytecode {
            pub const ALL: &'static [Bytecode] = &[$(Bytecode::$name),*];

            pub fn operand_types(self) -> &'static [OperandType] {
                match self {
                    $(Bytecode::$name => &[$(OperandType::$operand),*]),*
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Bytecode::$name => stringify!($name)),*
                }
            }
        }
    };
}

bytecode_list! {
    // literals
    LdaZero => [],
    LdaSmi8 => [Imm8],
    LdaConstant => [Idx8],
    LdaConstantWide => [Idx16],
    LdaUndefined => [],
    LdaNull => [],
    LdaTheHole => [],
    LdaTrue => [],
    LdaFalse => [],

    // globals and contexts
    LdaGlobal => [Idx8],
    LdaContextSlot => [Reg8, Idx8],
    StaContextSlot => [Reg8, Idx8],
    PushContext => [Reg8],
    PopContext => [Reg8],

    // register transfers
    Ldar => [Reg8],
    Star => [Reg8],
    Mov => [Reg8, Reg8],

    // property access: object, name, feedback slot
    LoadICSloppy => [Reg8, Idx8, Idx8],
    LoadICStrict => [Reg8, Idx8, Idx8],
    KeyedLoadICSloppy => [Reg8, Idx8],
    KeyedLoadICStrict => [Reg8, Idx8],
    StoreICSloppy => [Reg8, Idx8, Idx8],
    StoreICStrict => [Reg8, Idx8, Idx8],
    KeyedStoreICSloppy => [Reg8, Reg8, Idx8],
    KeyedStoreICStrict => [Reg8, Reg8, Idx8],

    // binary operators: register OP accumulator
    Add => [Reg8],
    Sub => [Reg8],
    Mul => [Reg8],
    Div => [Reg8],
    Mod => [Reg8],
    BitwiseOr => [Reg8],
    BitwiseXor => [Reg8],
    BitwiseAnd => [Reg8],
    ShiftLeft => [Reg8],
    ShiftRight => [Reg8],
    ShiftRightLogical => [Reg8],

    // unary operators
    LogicalNot => [],
    TypeOf => [],

    // comparisons: register OP accumulator
    TestEqual => [Reg8],
    TestNotEqual => [Reg8],
    TestEqualStrict => [Reg8],
    TestNotEqualStrict => [Reg8],
    TestLessThan => [Reg8],
    TestGreaterThan => [Reg8],
    TestLessThanOrEqual => [Reg8],
    TestGreaterThanOrEqual => [Reg8],
    TestInstanceOf => [Reg8],
    TestIn => [Reg8],

    // casts
    ToBoolean => [],
    ToName => [],
    ToNumber => [],

    // calls: callable, receiver, argument count
    Call => [Reg8, Reg8, Count8],
    // runtime function id, first argument, argument count
    CallRuntime => [Idx16, MaybeReg8, Count8],
    // constructor, first argument, argument count
    New => [Reg8, MaybeReg8, Count8],

    // control flow: immediate delta or constant pool index of the delta
    Jump => [Imm8],
    JumpConstant => [Idx8],
    JumpIfTrue => [Imm8],
    JumpIfTrueConstant => [Idx8],
    JumpIfFalse => [Imm8],
    JumpIfFalseConstant => [Idx8],

    Throw => [],
    Return => [],
}

impl Bytecode {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Bytecode> {
        Bytecode::ALL.get(byte as usize).copied()
    }

    pub fn operand_count(self) -> usize {
        self.operand_types().len()
    }

    pub fn operand_type(self, i: usize) -> OperandType {
        self.operand_types().get(i).copied().unwrap_or(OperandType::None)
    }

    /// Byte offset of operand `i` from the start of the instruction.
    pub fn operand_offset(self, i: usize) -> usize {
        1 + self.operand_types()[..i].iter().map(|t| t.size()).sum::<usize>()
    }

    /// Total encoded length, opcode included.
    pub fn size(self) -> usize {
        self.operand_offset(self.operand_count())
    }

    pub fn is_jump_immediate(self) -> bool {
        matches!(self, Bytecode::Jump | Bytecode::JumpIfTrue | Bytecode::JumpIfFalse)
    }

    pub fn is_jump_constant(self) -> bool {
        matches!(
            self,
            Bytecode::JumpConstant | Bytecode::JumpIfTrueConstant | Bytecode::JumpIfFalseConstant
        )
    }

    pub fn is_jump(self) -> bool {
        self.is_jump_immediate() || self.is_jump_constant()
    }

    pub fn is_conditional_jump(self) -> bool {
        self.is_jump() && !matches!(self, Bytecode::Jump | Bytecode::JumpConstant)
    }

    /// The same-width jump that takes its delta from the constant pool.
    pub fn with_constant_operand(self) -> Bytecode {
        match self {
            Bytecode::Jump => Bytecode::JumpConstant,
            Bytecode::JumpIfTrue => Bytecode::JumpIfTrueConstant,
            Bytecode::JumpIfFalse => Bytecode::JumpIfFalseConstant,
            other => panic!("{} has no constant-operand form", other),
        }
    }

    /// Instructions after which the accumulator is known to hold a boolean.
    pub fn leaves_boolean_in_accumulator(self) -> bool {
        matches!(
            self,
            Bytecode::LdaTrue
                | Bytecode::LdaFalse
                | Bytecode::LogicalNot
                | Bytecode::ToBoolean
                | Bytecode::TestEqual
                | Bytecode::TestNotEqual
                | Bytecode::TestEqualStrict
                | Bytecode::TestNotEqualStrict
                | Bytecode::TestLessThan
                | Bytecode::TestGreaterThan
                | Bytecode::TestLessThanOrEqual
                | Bytecode::TestGreaterThanOrEqual
                | Bytecode::TestInstanceOf
                | Bytecode::TestIn
        )
    }

    /// Control never reaches the next instruction.
    pub fn is_terminator(self) -> bool {
        matches!(self, Bytecode::Return | Bytecode::Throw | Bytecode::Jump | Bytecode::JumpConstant)
    }
}

impl std::fmt::Display for Bytecode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// Source-level operators accepted by the operator emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Sar,
    Shr,

    Eq,
    Ne,
    EqStrict,
    NeStrict,
    Lt,
    Gt,
    Lte,
    Gte,
    InstanceOf,
    In,
}

impl Token {
    pub fn binary_bytecode(self) -> Option<Bytecode> {
        Some(match self {
            Token::Add => Bytecode::Add,
            Token::Sub => Bytecode::Sub,
            Token::Mul => Bytecode::Mul,
            Token::Div => Bytecode::Div,
            Token::Mod => Bytecode::Mod,
            Token::BitOr => Bytecode::BitwiseOr,
            Token::BitXor => Bytecode::BitwiseXor,
            Token::BitAnd => Bytecode::BitwiseAnd,
            Token::Shl => Bytecode::ShiftLeft,
            Token::Sar => Bytecode::ShiftRight,
            Token::Shr => Bytecode::ShiftRightLogical,
            _ => return None,
        })
    }

    pub fn compare_bytecode(self) -> Option<Bytecode> {
        Some(match self {
            Token::Eq => Bytecode::TestEqual,
            Token::Ne => Bytecode::TestNotEqual,
            Token::EqStrict => Bytecode::TestEqualStrict,
            Token::NeStrict => Bytecode::TestNotEqualStrict,
            Token::Lt => Bytecode::TestLessThan,
            Token::Gt => Bytecode::TestGreaterThan,
            Token::Lte => Bytecode::TestLessThanOrEqual,
            Token::Gte => Bytecode::TestGreaterThanOrEqual,
            Token::InstanceOf => Bytecode::TestInstanceOf,
            Token::In => Bytecode::TestIn,
            _ => return None,
        })
    }
}
