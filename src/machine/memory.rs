//! Intcode memory subsystem.
//!
//! Memory is a sequence of signed 64-bit words indexed from 0. It grows on
//! demand when written past its end; cells that were never written read as
//! zero. Low addresses live in a contiguous vector. Writes far beyond it go
//! to a sparse map so a program touching a huge address does not allocate
//! everything below it.

use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// One memory cell.
pub type Word = i64;

/// Addresses below this are stored contiguously.
pub const DENSE_LIMIT: usize = 1 << 24;

/// Growable Intcode memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<Word>,
    /// Cells at or above `DENSE_LIMIT`.
    #[serde(default)]
    far: BTreeMap<usize, Word>,
}

impl Memory {
    /// Create an empty memory. Every cell reads as zero.
    pub fn new() -> Self {
        Self { cells: Vec::new(), far: BTreeMap::new() }
    }

    /// Create a memory holding a copy of `image` starting at address 0.
    pub fn from_image(image: &[Word]) -> Self {
        Self { cells: image.to_vec(), far: BTreeMap::new() }
    }

    /// Convert a signed address into an index.
    ///
    /// Only negative addresses are invalid. `OutOfRange` is returned for
    /// addresses the host cannot represent as `usize`.
    pub fn index(addr: Word) -> Result<usize, AddressFault> {
        if addr < 0 {
            return Err(AddressFault::Negative(addr));
        }
        usize::try_from(addr).map_err(|_| AddressFault::OutOfRange(addr))
    }

    /// Read a cell. Addresses beyond the end read as zero.
    #[inline]
    pub fn read(&self, addr: usize) -> Word {
        match self.cells.get(addr) {
            Some(&value) => value,
            None => self.far.get(&addr).copied().unwrap_or(0),
        }
    }

    /// Write a cell, growing memory if needed.
    #[inline]
    pub fn write(&mut self, addr: usize, value: Word) {
        if addr < self.cells.len() {
            self.cells[addr] = value;
        } else if addr < DENSE_LIMIT {
            self.cells.resize(addr + 1, 0);
            self.cells[addr] = value;
        } else {
            self.far.insert(addr, value);
        }
    }

    /// Replace the contents with a copy of `image`.
    pub fn load_image(&mut self, image: &[Word]) {
        self.cells.clear();
        self.cells.extend_from_slice(image);
        self.far.clear();
    }

    /// Number of contiguously stored cells (highest dense address written + 1).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if no cell has ever been stored.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.far.is_empty()
    }

    /// Number of cells stored outside the contiguous range.
    pub fn far_len(&self) -> usize {
        self.far.len()
    }

    /// The contiguously stored cells.
    pub fn as_slice(&self) -> &[Word] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("len", &self.cells.len())
            .field("far_cells", &self.far.len())
            .finish()
    }
}

/// Why an operand could not be turned into a usable address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AddressFault {
    #[error("negative address {0}")]
    Negative(Word),

    #[error("address {0} cannot be stored on this host")]
    OutOfRange(Word),

    #[error("write target uses immediate mode")]
    ImmediateWrite,
}
