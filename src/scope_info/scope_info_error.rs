use super::Slot;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeInfoError {
    #[error("scope info error: length {length} is shorter than the header")]
    TooShort { length: usize },

    #[error("scope info error: length {actual} but the header describes {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("scope info error: slot {index} should be {expected}, found {found}")]
    WrongSlotKind {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("scope info error: slot {index} is past the end")]
    PastEnd { index: usize },

    #[error("scope info error: slot {index} holds negative count {value}")]
    NegativeCount { index: usize, value: i32 },

    #[error("scope info error: malformed flags word {0:#x}")]
    MalformedFlags(i32),

    #[error("scope info error: slot {index} holds malformed variable info {word:#x}")]
    MalformedVariableInfo { index: usize, word: i32 },

    #[error("scope info error: module scope without module info")]
    MissingModuleInfo,
}

pub(crate) fn slot_kind(slot: &Slot) -> &'static str {
    match slot {
        Slot::Smi(_) => "a Smi",
        Slot::Name(_) => "a name",
        Slot::ModuleInfo(_) => "module info",
        Slot::Empty => "an empty slot",
    }
}
