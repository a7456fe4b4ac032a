use super::op::{Bytecode, OperandType};
use super::register::Register;
use crate::lang::value::Object;
use serde::{Deserialize, Serialize};

/// Bytes per frame slot.
pub const POINTER_SIZE: usize = 8;

/// Finished, immutable bytecode for one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BytecodeArray {
    bytecodes: Vec<u8>,
    constant_pool: Vec<Object>,
    frame_size: usize,
    parameter_count: usize,
}

/// One instruction decoded from a [`BytecodeArray`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBytecode {
    pub offset: usize,
    pub bytecode: Bytecode,
    pub operands: Vec<u32>,
}

impl DecodedBytecode {
    pub fn size(&self) -> usize {
        self.bytecode.size()
    }

    pub fn register(&self, i: usize) -> Register {
        assert!(
            self.bytecode.operand_type(i).is_register(),
            "operand {} of {} is not a register",
            i,
            self.bytecode
        );
        Register::from_operand(self.operands[i] as u8)
    }

    pub fn imm(&self, i: usize) -> i8 {
        assert_eq!(
            self.bytecode.operand_type(i),
            OperandType::Imm8,
            "operand {} of {} is not an immediate",
            i,
            self.bytecode
        );
        self.operands[i] as u8 as i8
    }
}

impl BytecodeArray {
    pub(crate) fn new(
        bytecodes: Vec<u8>,
        constant_pool: Vec<Object>,
        frame_size: usize,
        parameter_count: usize,
    ) -> Self {
        Self {
            bytecodes,
            constant_pool,
            frame_size,
            parameter_count,
        }
    }

    pub fn bytecodes(&self) -> &[u8] {
        &self.bytecodes
    }

    pub fn len(&self) -> usize {
        self.bytecodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytecodes.is_empty()
    }

    pub fn constant_pool(&self) -> &[Object] {
        &self.constant_pool
    }

    /// Frame size in bytes.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Parameter count including the receiver.
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn register_count(&self) -> usize {
        self.frame_size / POINTER_SIZE
    }

    /// Decodes the instruction at `offset`, or `None` when the opcode is
    /// unknown or its operands run past the end.
    pub fn decode_at(&self, offset: usize) -> Option<DecodedBytecode> {
        let bytecode = Bytecode::from_byte(*self.bytecodes.get(offset)?)?;
        if offset + bytecode.size() > self.bytecodes.len() {
            return None;
        }
        let operands = bytecode
            .operand_types()
            .iter()
            .enumerate()
            .map(|(i, operand_type)| {
                let at = offset + bytecode.operand_offset(i);
                match operand_type.size() {
                    2 => u16::from_le_bytes([self.bytecodes[at], self.bytecodes[at + 1]]) as u32,
                    _ => self.bytecodes[at] as u32,
                }
            })
            .collect();
        Some(DecodedBytecode {
            offset,
            bytecode,
            operands,
        })
    }

    /// Walks the instructions in order. Panics on malformed code; run
    /// [`verify`](super::verify::verify) first for untrusted input.
    pub fn iter(&self) -> impl Iterator<Item = DecodedBytecode> + '_ {
        let mut offset = 0;
        std::iter::from_fn(move || {
            if offset >= self.bytecodes.len() {
                return None;
            }
            let decoded = self
                .decode_at(offset)
                .unwrap_or_else(|| panic!("malformed bytecode at offset {}", offset));
            offset += decoded.size();
            Some(decoded)
        })
    }

    /// Signed distance of a jump, resolving the constant-pool form.
    pub fn jump_delta(&self, decoded: &DecodedBytecode) -> Option<i64> {
        if decoded.bytecode.is_jump_immediate() {
            Some(decoded.imm(0) as i64)
        } else if decoded.bytecode.is_jump_constant() {
            match self.constant_pool.get(decoded.operands[0] as usize)? {
                Object::Smi(delta) => Some(*delta as i64),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Absolute target of a jump.
    pub fn jump_target(&self, decoded: &DecodedBytecode) -> Option<usize> {
        let target = decoded.offset as i64 + self.jump_delta(decoded)?;
        usize::try_from(target).ok()
    }
}
