//! WebAssembly bindings for the Intcode VM.
//!
//! This module provides JavaScript-friendly wrappers around the core machine.

use wasm_bindgen::prelude::*;
use crate::{Machine, StepResult};
use crate::program::{parse_listing, disassemble_instruction};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create an empty machine.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self { machine: Machine::default() }
    }

    /// Load a comma-separated program listing. Returns its length in words.
    #[wasm_bindgen]
    pub fn load_listing(&mut self, source: &str) -> Result<usize, JsError> {
        let program = parse_listing(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        self.machine.load(&program);
        Ok(program.len())
    }

    /// Step one instruction. Returns "continue", "halted" or "blocked".
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let result = self.machine.step()
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        let name = match result {
            StepResult::Continue => "continue",
            StepResult::Halted => "halted",
            StepResult::Blocked => "blocked",
        };
        Ok(name.to_string())
    }

    /// Run until the machine halts or waits for input.
    /// Returns true if it halted.
    #[wasm_bindgen]
    pub fn resume(&mut self) -> Result<bool, JsError> {
        let result = self.machine.resume()
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(result == StepResult::Halted)
    }

    /// Restore the loaded program's initial state.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    #[wasm_bindgen]
    pub fn push_input(&mut self, value: i64) {
        self.machine.push_input(value);
    }

    /// Queue a string as ASCII input.
    #[wasm_bindgen]
    pub fn push_ascii(&mut self, text: &str) {
        self.machine.push_ascii(text);
    }

    /// Take the oldest output value, if any.
    #[wasm_bindgen]
    pub fn pop_output(&mut self) -> Option<i64> {
        self.machine.try_pop_output()
    }

    /// Take all pending output.
    #[wasm_bindgen]
    pub fn drain_output(&mut self) -> Vec<i64> {
        self.machine.drain_output()
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    #[wasm_bindgen]
    pub fn is_waiting(&self) -> bool {
        self.machine.is_waiting()
    }

    #[wasm_bindgen]
    pub fn steps(&self) -> u64 {
        self.machine.steps()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> usize {
        self.machine.program_counter()
    }

    #[wasm_bindgen]
    pub fn relative_base(&self) -> i64 {
        self.machine.relative_base()
    }

    /// Get memory cell value at an address.
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: usize) -> i64 {
        self.machine.peek(addr)
    }

    /// Disassemble the instruction at the program counter.
    #[wasm_bindgen]
    pub fn current_instruction(&self) -> String {
        let (text, _) = disassemble_instruction(self.machine.memory().as_slice(), self.machine.program_counter());
        text
    }

    /// Get the machine state as JSON.
    #[wasm_bindgen]
    pub fn state_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.machine)
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Disassemble a whole comma-separated listing.
#[wasm_bindgen]
pub fn wasm_disassemble(source: &str) -> Result<String, JsError> {
    let program = parse_listing(source)
        .map_err(|e| JsError::new(&format!("{}", e)))?;
    Ok(crate::program::disassemble(&program))
}
