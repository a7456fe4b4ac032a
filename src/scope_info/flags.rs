//! Packed bit-fields stored in Smi slots of a [`ScopeInfo`](super::ScopeInfo).

use crate::lang::scope::{
    FunctionKind, InitializationFlag, LanguageMode, MaybeAssignedFlag, ScopeType, VariableMode,
};

/// A `SIZE`-bit unsigned field starting at bit `SHIFT`.
#[derive(Debug, Clone, Copy)]
pub struct BitField<const SHIFT: u32, const SIZE: u32>;

impl<const SHIFT: u32, const SIZE: u32> BitField<SHIFT, SIZE> {
    pub const MASK: u32 = ((1u32 << SIZE) - 1) << SHIFT;
    pub const MAX: u32 = (1u32 << SIZE) - 1;

    pub fn encode(value: u32) -> u32 {
        assert!(value <= Self::MAX, "value {} does not fit in {} bits", value, SIZE);
        value << SHIFT
    }

    pub fn decode(word: u32) -> u32 {
        (word & Self::MASK) >> SHIFT
    }

    pub fn update(word: u32, value: u32) -> u32 {
        (word & !Self::MASK) | Self::encode(value)
    }
}

/// How the receiver or the function-name binding is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VariableAllocationInfo {
    /// The scope has no such binding.
    None = 0,
    Stack = 1,
    Context = 2,
    /// The binding exists but nothing references it.
    Unused = 3,
}

impl VariableAllocationInfo {
    pub(crate) fn from_bits(bits: u32) -> VariableAllocationInfo {
        match bits {
            0 => VariableAllocationInfo::None,
            1 => VariableAllocationInfo::Stack,
            2 => VariableAllocationInfo::Context,
            _ => VariableAllocationInfo::Unused,
        }
    }

    /// Whether the binding occupies a slot recorded in the scope info.
    pub fn is_allocated(self) -> bool {
        matches!(self, VariableAllocationInfo::Stack | VariableAllocationInfo::Context)
    }
}

// =============================================================================
// Header flags word
// =============================================================================

pub type ScopeTypeField = BitField<0, 4>;
pub type CallsEvalField = BitField<4, 1>;
pub type LanguageModeField = BitField<5, 2>;
pub type DeclarationScopeField = BitField<7, 1>;
pub type ReceiverVariableField = BitField<8, 2>;
pub type HasNewTargetField = BitField<10, 1>;
pub type FunctionVariableField = BitField<11, 2>;
pub type AsmModuleField = BitField<13, 1>;
pub type AsmFunctionField = BitField<14, 1>;
pub type HasSimpleParametersField = BitField<15, 1>;
pub type FunctionKindField = BitField<16, 4>;

/// Decoded view of the header flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeFlags {
    pub scope_type: ScopeType,
    pub calls_eval: bool,
    pub language_mode: LanguageMode,
    pub is_declaration_scope: bool,
    pub receiver: VariableAllocationInfo,
    pub has_new_target: bool,
    pub function_name: VariableAllocationInfo,
    pub asm_module: bool,
    pub asm_function: bool,
    pub has_simple_parameters: bool,
    pub function_kind: FunctionKind,
}

impl ScopeFlags {
    pub fn encode(&self) -> i32 {
        let word = ScopeTypeField::encode(self.scope_type as u32)
            | CallsEvalField::encode(self.calls_eval as u32)
            | LanguageModeField::encode(self.language_mode as u32)
            | DeclarationScopeField::encode(self.is_declaration_scope as u32)
            | ReceiverVariableField::encode(self.receiver as u32)
            | HasNewTargetField::encode(self.has_new_target as u32)
            | FunctionVariableField::encode(self.function_name as u32)
            | AsmModuleField::encode(self.asm_module as u32)
            | AsmFunctionField::encode(self.asm_function as u32)
            | HasSimpleParametersField::encode(self.has_simple_parameters as u32)
            | FunctionKindField::encode(self.function_kind as u32);
        word as i32
    }

    pub fn decode(word: i32) -> ScopeFlags {
        ScopeFlags::try_decode(word)
            .unwrap_or_else(|| panic!("malformed scope flags word {:#x}", word))
    }

    /// Like [`ScopeFlags::decode`], but reports out-of-range fields instead of
    /// panicking.
    pub fn try_decode(word: i32) -> Option<ScopeFlags> {
        let word = word as u32;
        Some(ScopeFlags {
            scope_type: ScopeType::from_bits(ScopeTypeField::decode(word))?,
            calls_eval: CallsEvalField::decode(word) != 0,
            language_mode: LanguageMode::from_bits(LanguageModeField::decode(word))?,
            is_declaration_scope: DeclarationScopeField::decode(word) != 0,
            receiver: VariableAllocationInfo::from_bits(ReceiverVariableField::decode(word)),
            has_new_target: HasNewTargetField::decode(word) != 0,
            function_name: VariableAllocationInfo::from_bits(FunctionVariableField::decode(word)),
            asm_module: AsmModuleField::decode(word) != 0,
            asm_function: AsmFunctionField::decode(word) != 0,
            has_simple_parameters: HasSimpleParametersField::decode(word) != 0,
            function_kind: FunctionKind::from_bits(FunctionKindField::decode(word))?,
        })
    }
}

// =============================================================================
// Variable info word (context locals and module variables)
// =============================================================================

pub type VariableModeField = BitField<0, 4>;
pub type InitFlagField = BitField<4, 1>;
pub type MaybeAssignedFlagField = BitField<5, 1>;
pub type SyntheticField = BitField<6, 1>;

/// Decoded view of a variable-info word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableInfo {
    pub mode: VariableMode,
    pub init_flag: InitializationFlag,
    pub maybe_assigned: MaybeAssignedFlag,
    pub is_synthetic: bool,
}

impl VariableInfo {
    pub fn encode(&self) -> i32 {
        let word = VariableModeField::encode(self.mode as u32)
            | InitFlagField::encode(self.init_flag as u32)
            | MaybeAssignedFlagField::encode(self.maybe_assigned as u32)
            | SyntheticField::encode(self.is_synthetic as u32);
        word as i32
    }

    pub fn decode(word: i32) -> VariableInfo {
        VariableInfo::try_decode(word)
            .unwrap_or_else(|| panic!("malformed variable info word {:#x}", word))
    }

    pub fn try_decode(word: i32) -> Option<VariableInfo> {
        let word = word as u32;
        Some(VariableInfo {
            mode: VariableMode::from_bits(VariableModeField::decode(word))?,
            init_flag: InitializationFlag::from_bits(InitFlagField::decode(word)),
            maybe_assigned: MaybeAssignedFlag::from_bits(MaybeAssignedFlagField::decode(word)),
            is_synthetic: SyntheticField::decode(word) != 0,
        })
    }
}
