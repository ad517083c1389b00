//! Disassembler for Intcode programs.
//!
//! Operands are written with a mode prefix: `@` positional, `#` immediate,
//! `~` relative. Words that do not decode are shown as `data`.

use crate::machine::decode::{decode, Instruction, ParamMode};
use crate::machine::Word;

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the number of words it occupies. Missing trailing
/// parameters read as zero, like memory does.
pub fn disassemble_instruction(memory: &[Word], addr: usize) -> (String, usize) {
    let raw = memory.get(addr).copied().unwrap_or(0);
    match decode(raw) {
        Ok(instr) => {
            let params: Vec<Word> = (0..instr.arity())
                .map(|i| memory.get(addr + 1 + i).copied().unwrap_or(0))
                .collect();
            (format_instruction(&instr, &params), 1 + instr.arity())
        }
        Err(_) => (format!("data {}", raw), 1),
    }
}

/// Disassemble a whole program with a linear sweep.
pub fn disassemble(program: &[Word]) -> String {
    let mut output = String::new();
    output.push_str("; Intcode Disassembly\n");
    output.push_str("; -------------------\n\n");

    let mut addr = 0;
    while addr < program.len() {
        let (line, width) = disassemble_instruction(program, addr);
        let end = (addr + width).min(program.len());
        let words = program[addr..end]
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(",");
        output.push_str(&format!("{:04}: {:<28} ; {}\n", addr, line, words));
        addr += width;
    }

    output
}

/// Format a decoded instruction with its raw parameter words.
pub fn format_instruction(instr: &Instruction, params: &[Word]) -> String {
    let operands = params
        .iter()
        .enumerate()
        .map(|(i, &p)| format_operand(p, instr.mode(i)))
        .collect::<Vec<_>>()
        .join(", ");

    if operands.is_empty() {
        instr.opcode.mnemonic().to_string()
    } else {
        format!("{} {}", instr.opcode.mnemonic(), operands)
    }
}

fn format_operand(param: Word, mode: ParamMode) -> String {
    match mode {
        ParamMode::Position => format!("@{}", param),
        ParamMode::Immediate => format!("#{}", param),
        ParamMode::Relative => format!("~{}", param),
    }
}
