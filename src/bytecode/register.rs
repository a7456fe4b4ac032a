use serde::{Deserialize, Serialize};

/// Index of the current function's closure.
pub const FUNCTION_CLOSURE_INDEX: i32 = -1;
/// Index of the current context.
pub const CURRENT_CONTEXT_INDEX: i32 = -2;
/// Parameters count down from here; the last parameter sits at this index.
pub const LAST_PARAMETER_INDEX: i32 = -3;

/// A frame register.
///
/// Non-negative indices are locals followed by temporaries. Negative indices
/// are the two pseudo-registers and then the parameters, receiver first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Register(i32);

impl Register {
    pub fn new(index: i32) -> Register {
        Register(index)
    }

    pub fn index(self) -> i32 {
        self.0
    }

    pub fn function_closure() -> Register {
        Register(FUNCTION_CLOSURE_INDEX)
    }

    pub fn current_context() -> Register {
        Register(CURRENT_CONTEXT_INDEX)
    }

    pub fn is_function_closure(self) -> bool {
        self.0 == FUNCTION_CLOSURE_INDEX
    }

    pub fn is_current_context(self) -> bool {
        self.0 == CURRENT_CONTEXT_INDEX
    }

    pub fn is_parameter(self) -> bool {
        self.0 <= LAST_PARAMETER_INDEX
    }

    /// Register of parameter `index`, where 0 is the receiver.
    pub fn from_parameter_index(index: usize, parameter_count: usize) -> Register {
        assert!(
            index < parameter_count,
            "parameter {} out of range for {} parameters",
            index,
            parameter_count
        );
        let from_last = (parameter_count - 1 - index) as i32;
        Register(LAST_PARAMETER_INDEX - from_last)
    }

    /// Inverse of [`Register::from_parameter_index`]. May be out of range for
    /// registers that belong to a larger parameter list.
    pub fn to_parameter_index(self, parameter_count: usize) -> i64 {
        assert!(self.is_parameter(), "{} is not a parameter register", self);
        self.0 as i64 - LAST_PARAMETER_INDEX as i64 + parameter_count as i64 - 1
    }

    /// Encodes the register as a signed 8-bit operand.
    pub fn to_operand(self) -> u8 {
        let negated = -(self.0 as i64);
        assert!(
            (i8::MIN as i64..=i8::MAX as i64).contains(&negated),
            "{} does not fit in a register operand",
            self
        );
        negated as i8 as u8
    }

    pub fn from_operand(operand: u8) -> Register {
        Register(-(operand as i8 as i32))
    }

    /// Name used in listings: `<this>` and `a0..` for parameters.
    pub fn display_name(self, parameter_count: usize) -> String {
        if self.is_parameter() {
            match self.to_parameter_index(parameter_count) {
                0 => "<this>".to_string(),
                i => format!("a{}", i - 1),
            }
        } else {
            self.to_string()
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            FUNCTION_CLOSURE_INDEX => write!(f, "<closure>"),
            CURRENT_CONTEXT_INDEX => write!(f, "<context>"),
            i if i >= 0 => write!(f, "r{}", i),
            i => write!(f, "p{}", LAST_PARAMETER_INDEX - i),
        }
    }
}
