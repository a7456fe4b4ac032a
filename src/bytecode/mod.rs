//! Register-machine bytecode: instruction set, emitter and finished arrays.

pub mod array;
pub mod builder;
pub mod constant_pool;
pub mod disasm;
pub mod label;
pub mod op;
pub mod register;
pub mod register_allocator;
pub mod verify;

pub use array::{BytecodeArray, DecodedBytecode, POINTER_SIZE};
pub use builder::BytecodeArrayBuilder;
pub use label::BytecodeLabel;
pub use op::{Bytecode, OperandType, Token};
pub use register::Register;
pub use register_allocator::TemporaryRegisterScope;
pub use verify::{VerifyError, verify};
