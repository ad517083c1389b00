//! Instruction decoder for Intcode.
//!
//! An instruction word is `modes * 100 + opcode`. The mode digits are read
//! least-significant first, one per parameter; missing digits mean
//! positional mode.

use crate::machine::memory::Word;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Parameter addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamMode {
    /// The parameter is an address; the operand is `mem[param]`.
    #[default]
    Position,
    /// The parameter is the operand. Not allowed for write targets.
    Immediate,
    /// The parameter is an offset; the operand is `mem[rb + param]`.
    Relative,
}

impl ParamMode {
    /// Create from a mode digit.
    pub fn from_digit(digit: Word) -> Option<Self> {
        match digit {
            0 => Some(ParamMode::Position),
            1 => Some(ParamMode::Immediate),
            2 => Some(ParamMode::Relative),
            _ => None,
        }
    }

    /// Convert to a mode digit.
    pub fn to_digit(self) -> Word {
        match self {
            ParamMode::Position => 0,
            ParamMode::Immediate => 1,
            ParamMode::Relative => 2,
        }
    }

    pub const ALL: [ParamMode; 3] = [ParamMode::Position, ParamMode::Immediate, ParamMode::Relative];
}

/// The fixed Intcode instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// `mem[p3] = p1 + p2`
    Add,
    /// `mem[p3] = p1 * p2`
    Multiply,
    /// Pop one input value into `mem[p1]`, suspending if none is queued.
    Input,
    /// Push `p1` onto the output channel.
    Output,
    /// `if p1 != 0 { pc = p2 }`
    JumpIfTrue,
    /// `if p1 == 0 { pc = p2 }`
    JumpIfFalse,
    /// `mem[p3] = (p1 < p2) as Word`
    LessThan,
    /// `mem[p3] = (p1 == p2) as Word`
    Equals,
    /// `rb += p1`
    AdjustRelativeBase,
    /// Stop execution.
    Halt,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::Add,
        Opcode::Multiply,
        Opcode::Input,
        Opcode::Output,
        Opcode::JumpIfTrue,
        Opcode::JumpIfFalse,
        Opcode::LessThan,
        Opcode::Equals,
        Opcode::AdjustRelativeBase,
        Opcode::Halt,
    ];

    /// Look up an opcode by its two-digit code.
    pub fn from_code(code: Word) -> Option<Self> {
        let op = match code {
            1 => Opcode::Add,
            2 => Opcode::Multiply,
            3 => Opcode::Input,
            4 => Opcode::Output,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustRelativeBase,
            99 => Opcode::Halt,
            _ => return None,
        };
        Some(op)
    }

    /// The two-digit code.
    pub fn code(self) -> Word {
        match self {
            Opcode::Add => 1,
            Opcode::Multiply => 2,
            Opcode::Input => 3,
            Opcode::Output => 4,
            Opcode::JumpIfTrue => 5,
            Opcode::JumpIfFalse => 6,
            Opcode::LessThan => 7,
            Opcode::Equals => 8,
            Opcode::AdjustRelativeBase => 9,
            Opcode::Halt => 99,
        }
    }

    /// Number of parameters following the instruction word.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::Input | Opcode::Output | Opcode::AdjustRelativeBase => 1,
            Opcode::Halt => 0,
        }
    }

    /// Index of the parameter this opcode writes to, if any.
    pub fn write_param(self) -> Option<usize> {
        match self {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => Some(2),
            Opcode::Input => Some(0),
            _ => None,
        }
    }

    /// Short assembly name.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Multiply => "mul",
            Opcode::Input => "in",
            Opcode::Output => "out",
            Opcode::JumpIfTrue => "jnz",
            Opcode::JumpIfFalse => "jz",
            Opcode::LessThan => "lt",
            Opcode::Equals => "eq",
            Opcode::AdjustRelativeBase => "arb",
            Opcode::Halt => "hlt",
        }
    }
}

/// A decoded instruction word: the opcode plus one mode per parameter.
///
/// Modes past the opcode's arity are always `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modes: [ParamMode; 3],
}

impl Instruction {
    /// An instruction with every parameter in positional mode.
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode, modes: [ParamMode::Position; 3] }
    }

    /// Set the modes of the leading parameters.
    pub fn with_modes(mut self, modes: &[ParamMode]) -> Self {
        for (slot, mode) in self.modes.iter_mut().zip(modes).take(self.opcode.arity()) {
            *slot = *mode;
        }
        self
    }

    pub fn arity(&self) -> usize {
        self.opcode.arity()
    }

    /// Mode of parameter `index` (0-based).
    pub fn mode(&self, index: usize) -> ParamMode {
        self.modes[index]
    }
}

/// Decode an instruction word.
pub fn decode(raw: Word) -> Result<Instruction, DecodeError> {
    if raw < 0 {
        return Err(DecodeError::InvalidOpcode(raw));
    }

    let opcode = Opcode::from_code(raw % 100).ok_or(DecodeError::InvalidOpcode(raw % 100))?;

    let mut modes = [ParamMode::Position; 3];
    let mut rest = raw / 100;
    for (position, slot) in modes.iter_mut().enumerate().take(opcode.arity()) {
        let digit = rest % 10;
        *slot = ParamMode::from_digit(digit).ok_or(DecodeError::InvalidMode { digit, position })?;
        rest /= 10;
    }

    Ok(Instruction { opcode, modes })
}

/// Encode an instruction back to a word.
pub fn encode(instr: &Instruction) -> Word {
    let mut word = instr.opcode.code();
    let mut scale = 100;
    for mode in instr.modes.iter().take(instr.arity()) {
        word += mode.to_digit() * scale;
        scale *= 10;
    }
    word
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0}")]
    InvalidOpcode(Word),

    #[error("invalid mode digit {digit} for parameter {position}")]
    InvalidMode { digit: Word, position: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_halt() {
        let instr = decode(99).unwrap();
        assert_eq!(instr.opcode, Opcode::Halt);
        assert_eq!(instr.arity(), 0);
    }

    #[test]
    fn test_decode_modes() {
        let instr = decode(1002).unwrap();
        assert_eq!(instr.opcode, Opcode::Multiply);
        assert_eq!(
            instr.modes,
            [ParamMode::Position, ParamMode::Immediate, ParamMode::Position]
        );

        let instr = decode(21101).unwrap();
        assert_eq!(instr.opcode, Opcode::Add);
        assert_eq!(
            instr.modes,
            [ParamMode::Immediate, ParamMode::Immediate, ParamMode::Relative]
        );

        let instr = decode(204).unwrap();
        assert_eq!(instr.opcode, Opcode::Output);
        assert_eq!(instr.mode(0), ParamMode::Relative);
    }

    #[test]
    fn test_decode_invalid() {
        assert_eq!(decode(0), Err(DecodeError::InvalidOpcode(0)));
        assert_eq!(decode(42), Err(DecodeError::InvalidOpcode(42)));
        assert_eq!(decode(-1), Err(DecodeError::InvalidOpcode(-1)));
        assert_eq!(
            decode(301),
            Err(DecodeError::InvalidMode { digit: 3, position: 0 })
        );
    }

    #[test]
    fn test_mode_digits_past_arity_ignored() {
        // Output has one parameter; the second mode digit is never consulted.
        let instr = decode(1104).unwrap();
        assert_eq!(instr.opcode, Opcode::Output);
        assert_eq!(instr.mode(0), ParamMode::Immediate);
        assert_eq!(instr.mode(1), ParamMode::Position);
    }

    #[test]
    fn test_mode_roundtrip() {
        for mode in ParamMode::ALL {
            assert_eq!(ParamMode::from_digit(mode.to_digit()), Some(mode));
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let cases = [
            Instruction::new(Opcode::Halt),
            Instruction::new(Opcode::Add)
                .with_modes(&[ParamMode::Immediate, ParamMode::Relative, ParamMode::Relative]),
            Instruction::new(Opcode::JumpIfFalse)
                .with_modes(&[ParamMode::Relative, ParamMode::Immediate]),
            Instruction::new(Opcode::AdjustRelativeBase).with_modes(&[ParamMode::Immediate]),
        ];

        for instr in cases {
            assert_eq!(decode(encode(&instr)).unwrap(), instr);
        }
        assert_eq!(
            encode(&Instruction::new(Opcode::Multiply).with_modes(&[ParamMode::Position, ParamMode::Immediate])),
            1002
        );
    }

    #[test]
    fn test_with_modes_respects_arity() {
        let instr = Instruction::new(Opcode::Input)
            .with_modes(&[ParamMode::Relative, ParamMode::Immediate]);
        assert_eq!(instr.modes, [ParamMode::Relative, ParamMode::Position, ParamMode::Position]);
    }
}
