//! The Intcode machine.
//!
//! This module implements the complete Intcode architecture:
//! - growable memory of signed 64-bit words
//! - 2 registers: PC and the relative base
//! - 10-instruction set with positional, immediate and relative parameters
//! - unbounded input/output channels with suspension on empty input

pub mod memory;
pub mod registers;
pub mod decode;
pub mod channel;
pub mod execute;

pub use memory::{Memory, Word, AddressFault};
pub use registers::Registers;
pub use decode::{Instruction, Opcode, ParamMode, DecodeError};
pub use channel::Channel;
pub use execute::{Machine, MachineError, StepResult};
