//! Program listings and disassembly.
//!
//! This module provides:
//! - A parser for the comma-separated listing format
//! - A disassembler (memory image → readable text)

pub mod listing;
pub mod disasm;

pub use listing::{parse_listing, load_listing, format_listing, ListingError};
pub use disasm::{disassemble, disassemble_instruction};
