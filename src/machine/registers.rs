//! Intcode machine registers.
//!
//! An Intcode machine has two registers:
//! - PC: index of the next instruction
//! - RB: the relative base added to relative-mode offsets

use crate::machine::memory::{AddressFault, Memory, Word};
use serde::{Serialize, Deserialize};

/// The Intcode register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Program counter.
    pub pc: usize,

    /// Relative base. May go negative between instructions as long as every
    /// effective address computed from it is non-negative.
    pub relative_base: Word,
}

impl Registers {
    /// Create a register file with both registers zeroed.
    pub fn new() -> Self {
        Self { pc: 0, relative_base: 0 }
    }

    /// Reset both registers to zero.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.relative_base = 0;
    }

    /// Advance the program counter past an instruction of the given arity.
    /// Returns the old value.
    pub fn advance_pc(&mut self, arity: usize) -> usize {
        let old = self.pc;
        self.pc += 1 + arity;
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, target: Word) -> Result<(), AddressFault> {
        self.pc = Memory::index(target)?;
        Ok(())
    }

    /// Add `delta` to the relative base. Returns `None` on overflow, leaving
    /// the register untouched.
    pub fn adjust_base(&mut self, delta: Word) -> Option<Word> {
        self.relative_base = self.relative_base.checked_add(delta)?;
        Some(self.relative_base)
    }

    /// Compute the effective address of a relative-mode parameter.
    ///
    /// A sum past `i64::MAX` is `OutOfRange`; past `i64::MIN` it is negative.
    pub fn relative_address(&self, offset: Word) -> Result<usize, AddressFault> {
        match self.relative_base.checked_add(offset) {
            Some(addr) => Memory::index(addr),
            None if offset < 0 => Err(AddressFault::Negative(offset)),
            None => Err(AddressFault::OutOfRange(offset)),
        }
    }
}
