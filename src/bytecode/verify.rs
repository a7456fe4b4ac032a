use super::array::{BytecodeArray, POINTER_SIZE};
use super::op::{Bytecode, OperandType};
use super::register::Register;
use crate::lang::value::Object;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("verify error: unknown bytecode 0x{byte:02x} at offset {offset}")]
    UnknownBytecode { offset: usize, byte: u8 },

    #[error("verify error: {bytecode} at offset {offset} is missing operand bytes")]
    TruncatedOperands { offset: usize, bytecode: Bytecode },

    #[error("verify error: {bytecode} at offset {offset} addresses {register} outside the frame")]
    InvalidRegister {
        offset: usize,
        bytecode: Bytecode,
        register: Register,
    },

    #[error(
        "verify error: {bytecode} at offset {offset} uses constant {index} of a pool of {pool_size}"
    )]
    ConstantIndexOutOfRange {
        offset: usize,
        bytecode: Bytecode,
        index: usize,
        pool_size: usize,
    },

    #[error("verify error: jump at offset {offset} has a non-Smi delta constant")]
    NonSmiJumpConstant { offset: usize },

    #[error("verify error: jump at offset {offset} targets {target}, outside the code")]
    JumpTargetOutOfRange { offset: usize, target: i64 },

    #[error("verify error: jump at offset {offset} lands inside an instruction at {target}")]
    NotInstructionBoundary { offset: usize, target: usize },

    #[error("verify error: control falls off the end after {bytecode} at offset {offset}")]
    FallsOffEnd { offset: usize, bytecode: Bytecode },

    #[error("verify error: empty bytecode array")]
    Empty,

    #[error("verify error: frame size {0} is not a multiple of the slot size")]
    FrameSizeNotAligned(usize),

    #[error("verify error: parameter count must include the receiver")]
    MissingReceiver,
}

/// Operands that index the constant pool, per bytecode.
fn constant_operands(bytecode: Bytecode) -> &'static [usize] {
    match bytecode {
        Bytecode::LdaConstant
        | Bytecode::LdaConstantWide
        | Bytecode::LdaGlobal
        | Bytecode::JumpConstant
        | Bytecode::JumpIfTrueConstant
        | Bytecode::JumpIfFalseConstant => &[0],
        Bytecode::LoadICSloppy
        | Bytecode::LoadICStrict
        | Bytecode::StoreICSloppy
        | Bytecode::StoreICStrict => &[1],
        _ => &[],
    }
}

fn register_in_frame(array: &BytecodeArray, register: Register) -> bool {
    if register.is_function_closure() || register.is_current_context() {
        return true;
    }
    if register.is_parameter() {
        let index = register.to_parameter_index(array.parameter_count());
        return index >= 0 && (index as usize) < array.parameter_count();
    }
    (register.index() as usize) < array.register_count()
}

/// Checks that a finished array is safe to decode and execute: every
/// instruction is complete, registers and constants are addressable, and
/// jumps land on instruction boundaries.
///
/// This is a linear scan. It does not check that registers are written
/// before they are read.
pub fn verify(array: &BytecodeArray) -> Result<(), VerifyError> {
    if array.frame_size() % POINTER_SIZE != 0 {
        return Err(VerifyError::FrameSizeNotAligned(array.frame_size()));
    }
    if array.parameter_count() == 0 {
        return Err(VerifyError::MissingReceiver);
    }

    let code = array.bytecodes();
    let mut boundaries = vec![false; code.len()];
    let mut jumps = Vec::new();
    let mut offset = 0;
    let mut last = None;

    while offset < code.len() {
        let byte = code[offset];
        let bytecode =
            Bytecode::from_byte(byte).ok_or(VerifyError::UnknownBytecode { offset, byte })?;
        let decoded = array
            .decode_at(offset)
            .ok_or(VerifyError::TruncatedOperands { offset, bytecode })?;
        boundaries[offset] = true;

        for (i, &operand) in decoded.operands.iter().enumerate() {
            let operand_type = bytecode.operand_type(i);
            let skipped = operand_type == OperandType::MaybeReg8 && operand == 0;
            if operand_type.is_register() && !skipped {
                let register = decoded.register(i);
                if !register_in_frame(array, register) {
                    return Err(VerifyError::InvalidRegister {
                        offset,
                        bytecode,
                        register,
                    });
                }
            }
        }

        for &i in constant_operands(bytecode) {
            let index = decoded.operands[i] as usize;
            if index >= array.constant_pool().len() {
                return Err(VerifyError::ConstantIndexOutOfRange {
                    offset,
                    bytecode,
                    index,
                    pool_size: array.constant_pool().len(),
                });
            }
        }

        if bytecode.is_jump_constant()
            && !matches!(
                array.constant_pool()[decoded.operands[0] as usize],
                Object::Smi(_)
            )
        {
            return Err(VerifyError::NonSmiJumpConstant { offset });
        }
        if bytecode.is_jump() {
            jumps.push(decoded.clone());
        }

        last = Some((offset, bytecode));
        offset += decoded.size();
    }

    let (last_offset, last_bytecode) = last.ok_or(VerifyError::Empty)?;
    if !last_bytecode.is_terminator() {
        return Err(VerifyError::FallsOffEnd {
            offset: last_offset,
            bytecode: last_bytecode,
        });
    }

    for jump in &jumps {
        let delta = array
            .jump_delta(jump)
            .ok_or(VerifyError::NonSmiJumpConstant { offset: jump.offset })?;
        let target = jump.offset as i64 + delta;
        if target < 0 || target >= code.len() as i64 {
            return Err(VerifyError::JumpTargetOutOfRange {
                offset: jump.offset,
                target,
            });
        }
        if !boundaries[target as usize] {
            return Err(VerifyError::NotInstructionBoundary {
                offset: jump.offset,
                target: target as usize,
            });
        }
    }

    Ok(())
}
