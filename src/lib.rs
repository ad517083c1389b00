//! # Intcode VM
//!
//! A virtual machine for the Intcode instruction set.
//!
//! Machines communicate only through unbounded input and output channels,
//! and suspend (rather than block the thread) when they need input that has
//! not arrived. That lets an external scheduler interleave many machines in
//! pipelines, feedback loops and packet networks.

pub mod machine;
pub mod program;
pub mod orchestrate;
pub mod config;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use machine::{Machine, MachineError, StepResult, Word, Instruction, Opcode, ParamMode};
pub use program::{parse_listing, load_listing, disassemble, ListingError};
pub use orchestrate::{Scheduler, Pipeline, Network, Packet, OrchestrateError};
pub use config::RunLimits;
