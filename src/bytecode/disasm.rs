use super::array::{BytecodeArray, DecodedBytecode};
use super::op::OperandType;
use crate::lang::value::{HeapObject, Object};
use std::collections::BTreeSet;

/// Print a bytecode array under a banner, followed by its constant pool
pub fn print_bytecode_array(name: &str, array: &BytecodeArray) {
    print!("{}", listing(name, array));
}

/// Banner, instructions and constant pool as one string.
pub fn listing(name: &str, array: &BytecodeArray) -> String {
    let mut output = String::new();
    output.push_str("════════════════════════════════════════\n");
    output.push_str(&format!(" {}\n", name));
    output.push_str(&format!(
        " {} bytes, {} registers, {} parameters\n",
        array.len(),
        array.register_count(),
        array.parameter_count()
    ));
    output.push_str("════════════════════════════════════════\n");
    output.push_str(&disassemble(array));
    output.push_str(&format!("Constant pool (size = {})\n", array.constant_pool().len()));
    for (i, constant) in array.constant_pool().iter().enumerate() {
        output.push_str(&format!("  {:>3}: {}\n", i, format_constant(constant)));
    }
    output
}

/// Return disassembly as a String
pub fn disassemble(array: &BytecodeArray) -> String {
    let mut output = String::new();
    let jump_targets = collect_jump_targets(array);

    for decoded in array.iter() {
        if jump_targets.contains(&decoded.offset) {
            output.push_str("      ┌──────────────────────────────────\n");
        }

        output.push_str(&format!("{:04} ", decoded.offset));

        if jump_targets.contains(&decoded.offset) {
            output.push_str("► ");
        } else {
            output.push_str("  ");
        }

        output.push_str(&format_bytecode(array, &decoded));
        output.push('\n');
    }

    output
}

fn collect_jump_targets(array: &BytecodeArray) -> BTreeSet<usize> {
    array
        .iter()
        .filter_map(|decoded| array.jump_target(&decoded))
        .collect()
}

/// One instruction, mnemonic padded to a fixed column.
pub fn format_bytecode(array: &BytecodeArray, decoded: &DecodedBytecode) -> String {
    let mnemonic = decoded.bytecode.mnemonic();

    if decoded.bytecode.is_jump() {
        let delta = array.jump_delta(decoded).unwrap_or(0);
        let direction = if delta < 0 { "↑" } else { "↓" };
        let target = decoded.offset as i64 + delta;
        let via = if decoded.bytecode.is_jump_constant() {
            format!("[{}] ", decoded.operands[0])
        } else {
            String::new()
        };
        return format!(
            "{:<20}{}{:+} {} (→ {:04})",
            mnemonic, via, delta, direction, target
        );
    }

    let operands: Vec<String> = decoded
        .operands
        .iter()
        .enumerate()
        .map(|(i, &operand)| match decoded.bytecode.operand_type(i) {
            OperandType::MaybeReg8 if operand == 0 => "_".to_string(),
            OperandType::Reg8 | OperandType::MaybeReg8 => decoded
                .register(i)
                .display_name(array.parameter_count()),
            OperandType::Imm8 => format!("{}", decoded.imm(i)),
            OperandType::Count8 => format!("#{}", operand),
            OperandType::Idx8 | OperandType::Idx16 => format!("[{}]", operand),
            OperandType::None => String::new(),
        })
        .collect();

    if operands.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{:<20}{}", mnemonic, operands.join(", "))
    }
}

fn format_constant(constant: &Object) -> String {
    match constant {
        Object::Heap(handle) => match &**handle {
            HeapObject::String(s) => format!("{:?}", s.as_str()),
            HeapObject::HeapNumber(_) => format!("<heap number {}>", constant),
        },
        other => other.to_string(),
    }
}
