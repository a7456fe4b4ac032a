use crate::bytecode::{Bytecode, VerifyError};
use crate::lang::value::Object;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("runtime error: execution step limit exceeded ({0})")]
    StepLimitExceeded(usize),

    #[error("runtime error: frame of {registers} registers exceeds the limit of {max}")]
    FrameTooLarge { registers: usize, max: usize },

    #[error("runtime error: {bytecode} at offset {offset} is not supported by the interpreter")]
    Unsupported { bytecode: Bytecode, offset: usize },

    #[error("runtime error: uncaught exception: {0}")]
    Thrown(Object),

    #[error("runtime error: expected at most {expected} arguments, got {got}")]
    TooManyArguments { expected: usize, got: usize },
}
