//! Execution engine for the Intcode machine.
//!
//! Implements the decode-execute cycle, the input suspension contract and the
//! run-to-completion drivers.

use crate::machine::channel::Channel;
use crate::machine::decode::{self, DecodeError, Instruction, Opcode, ParamMode};
use crate::machine::memory::{AddressFault, Memory, Word};
use crate::machine::registers::Registers;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Outcome of a single [`Machine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    /// An instruction was executed.
    Continue,
    /// The instruction at the program counter is `halt`.
    Halted,
    /// The machine is waiting for input that has not arrived yet.
    Blocked,
}

/// An Intcode machine.
///
/// The machine owns its memory, registers and output channel. Input is pushed
/// by whoever drives it; nothing else touches its state.
#[derive(Clone, Serialize, Deserialize)]
pub struct Machine {
    regs: Registers,
    mem: Memory,
    /// Initial memory image, restored by `reset`.
    image: Vec<Word>,
    input: Channel,
    output: Channel,
    /// Set when an `input` instruction found the input channel empty.
    waiting: bool,
    /// Set once a step has failed; cleared only by `reset`.
    faulted: bool,
    /// Instructions executed since the last reset.
    steps: u64,
    last_instr: Option<Instruction>,
}

impl Machine {
    /// Create a machine from an initial memory image.
    pub fn new(program: &[Word]) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::from_image(program),
            image: program.to_vec(),
            input: Channel::new(),
            output: Channel::new(),
            waiting: false,
            faulted: false,
            steps: 0,
            last_instr: None,
        }
    }

    /// Replace the initial memory image and reset.
    pub fn load(&mut self, program: &[Word]) {
        self.image = program.to_vec();
        self.reset();
    }

    /// Restore the state the machine had right after construction.
    pub fn reset(&mut self) {
        self.mem.load_image(&self.image);
        self.regs.reset();
        self.input.clear();
        self.output.clear();
        self.waiting = false;
        self.faulted = false;
        self.steps = 0;
        self.last_instr = None;
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Result<StepResult, MachineError> {
        if self.faulted {
            return Err(MachineError::Faulted { pc: self.regs.pc });
        }

        if self.waiting {
            if self.input.is_empty() {
                return Ok(StepResult::Blocked);
            }
            self.waiting = false;
            debug!(pc = self.regs.pc, "input arrived, resuming");
        }

        let pc = self.regs.pc;
        let raw = self.mem.read(pc);

        let instr = match decode::decode(raw) {
            Ok(instr) => instr,
            Err(source) => {
                return Err(self.fail(MachineError::MalformedProgram { pc, instruction: raw, source }));
            }
        };

        if instr.opcode == Opcode::Halt {
            return Ok(StepResult::Halted);
        }

        match self.execute(instr, raw) {
            Ok(StepResult::Continue) => {
                self.steps += 1;
                self.last_instr = Some(instr);
                Ok(StepResult::Continue)
            }
            Ok(other) => Ok(other),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Run until halt, returning `memory[0]`.
    ///
    /// Blocking on input is a deadlock here: nobody else can feed the
    /// machine while this call owns it.
    pub fn run_to_halt(&mut self) -> Result<Word, MachineError> {
        loop {
            match self.step()? {
                StepResult::Continue => {}
                StepResult::Halted => return Ok(self.mem.read(0)),
                StepResult::Blocked => return Err(self.deadlock()),
            }
        }
    }

    /// Run until halt, executing at most `max_steps` instructions.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<Word, MachineError> {
        let start = self.steps;

        loop {
            let executed = self.steps - start;
            if executed >= max_steps && !self.is_halted() {
                warn!(pc = self.regs.pc, executed, "step limit reached");
                return Err(MachineError::StepLimit { steps: executed });
            }

            match self.step()? {
                StepResult::Continue => {}
                StepResult::Halted => return Ok(self.mem.read(0)),
                StepResult::Blocked => return Err(self.deadlock()),
            }
        }
    }

    /// Run until the machine halts or blocks on input, returning which.
    ///
    /// A program that loops forever without reading input never returns.
    pub fn resume(&mut self) -> Result<StepResult, MachineError> {
        loop {
            match self.step()? {
                StepResult::Continue => {}
                other => return Ok(other),
            }
        }
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction, raw: Word) -> Result<StepResult, MachineError> {
        let pc = self.regs.pc;
        trace!(pc, instruction = raw, op = instr.opcode.mnemonic(), rb = self.regs.relative_base, "execute");

        match instr.opcode {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => {
                let a = self.operand(&instr, 0, raw)?;
                let b = self.operand(&instr, 1, raw)?;
                let dst = self.target(&instr, 2, raw)?;

                let value = match instr.opcode {
                    Opcode::Add => a.checked_add(b),
                    Opcode::Multiply => a.checked_mul(b),
                    Opcode::LessThan => Some((a < b) as Word),
                    _ => Some((a == b) as Word),
                };
                let value = value.ok_or(MachineError::Overflow { pc, instruction: raw })?;
                self.mem.write(dst, value);
            }

            Opcode::Input => {
                let dst = self.target(&instr, 0, raw)?;
                match self.input.pop() {
                    Some(value) => self.mem.write(dst, value),
                    None => {
                        self.waiting = true;
                        debug!(pc, "waiting for input");
                        return Ok(StepResult::Blocked);
                    }
                }
            }

            Opcode::Output => {
                let value = self.operand(&instr, 0, raw)?;
                self.output.push(value);
            }

            Opcode::JumpIfTrue | Opcode::JumpIfFalse => {
                let cond = self.operand(&instr, 0, raw)?;
                let target = self.operand(&instr, 1, raw)?;
                let taken = (cond != 0) == (instr.opcode == Opcode::JumpIfTrue);

                if taken {
                    self.regs
                        .jump(target)
                        .map_err(|fault| MachineError::InvalidAddress { pc, instruction: raw, fault })?;
                    return Ok(StepResult::Continue);
                }
            }

            Opcode::AdjustRelativeBase => {
                let delta = self.operand(&instr, 0, raw)?;
                self.regs
                    .adjust_base(delta)
                    .ok_or(MachineError::Overflow { pc, instruction: raw })?;
            }

            Opcode::Halt => return Ok(StepResult::Halted),
        }

        self.regs.advance_pc(instr.arity());
        Ok(StepResult::Continue)
    }

    /// Raw parameter word `index` of the current instruction.
    fn param(&self, index: usize) -> Word {
        self.mem.read(self.regs.pc + 1 + index)
    }

    /// Resolve parameter `index` to its operand value.
    fn operand(&self, instr: &Instruction, index: usize, raw: Word) -> Result<Word, MachineError> {
        let param = self.param(index);
        let addr = match instr.mode(index) {
            ParamMode::Immediate => return Ok(param),
            ParamMode::Position => Memory::index(param),
            ParamMode::Relative => self.regs.relative_address(param),
        };
        match addr {
            Ok(addr) => Ok(self.mem.read(addr)),
            // Never written, so it reads as zero.
            Err(AddressFault::OutOfRange(_)) => Ok(0),
            Err(fault) => Err(self.address_error(raw, fault)),
        }
    }

    /// Resolve parameter `index` to the address it writes to.
    fn target(&self, instr: &Instruction, index: usize, raw: Word) -> Result<usize, MachineError> {
        let param = self.param(index);
        let addr = match instr.mode(index) {
            ParamMode::Immediate => Err(AddressFault::ImmediateWrite),
            ParamMode::Position => Memory::index(param),
            ParamMode::Relative => self.regs.relative_address(param),
        };
        addr.map_err(|fault| self.address_error(raw, fault))
    }

    fn address_error(&self, raw: Word, fault: AddressFault) -> MachineError {
        MachineError::InvalidAddress { pc: self.regs.pc, instruction: raw, fault }
    }

    fn deadlock(&self) -> MachineError {
        warn!(pc = self.regs.pc, steps = self.steps, "blocked on input with no producer");
        MachineError::Deadlock { pc: self.regs.pc, steps: self.steps }
    }

    /// Mark the machine faulted and hand the error back.
    fn fail(&mut self, error: MachineError) -> MachineError {
        warn!(pc = self.regs.pc, %error, "machine fault");
        self.faulted = true;
        error
    }

    // ==================== I/O ====================

    /// Queue one input value.
    pub fn push_input(&mut self, value: Word) {
        self.input.push(value);
    }

    /// Queue several input values in order.
    pub fn push_inputs<I: IntoIterator<Item = Word>>(&mut self, values: I) {
        self.input.extend(values);
    }

    /// Queue the bytes of `text` as input, one value per byte.
    pub fn push_ascii(&mut self, text: &str) {
        self.input.extend(text.bytes().map(Word::from));
    }

    /// Take the oldest pending output value.
    pub fn try_pop_output(&mut self) -> Option<Word> {
        self.output.pop()
    }

    /// Take every pending output value, oldest first.
    pub fn drain_output(&mut self) -> Vec<Word> {
        self.output.drain().collect()
    }

    // ==================== Inspection ====================

    pub fn program_counter(&self) -> usize {
        self.regs.pc
    }

    pub fn relative_base(&self) -> Word {
        self.regs.relative_base
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn input(&self) -> &Channel {
        &self.input
    }

    pub fn output(&self) -> &Channel {
        &self.output
    }

    /// Read a memory cell.
    pub fn peek(&self, addr: usize) -> Word {
        self.mem.read(addr)
    }

    /// Patch a memory cell before (or between) runs. Any address is
    /// accepted; `reset` undoes it.
    pub fn poke(&mut self, addr: usize, value: Word) {
        self.mem.write(addr, value);
    }

    /// Check if the machine is suspended on an `input` instruction.
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Check if the machine sits on a `halt` instruction.
    pub fn is_halted(&self) -> bool {
        !self.waiting
            && !self.faulted
            && matches!(decode::decode(self.mem.read(self.regs.pc)), Ok(i) if i.opcode == Opcode::Halt)
    }

    /// Check if a previous step failed.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Instructions executed since the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("regs", &self.regs)
            .field("waiting", &self.waiting)
            .field("faulted", &self.faulted)
            .field("steps", &self.steps)
            .field("input", &self.input.len())
            .field("output", &self.output.len())
            .field("mem", &self.mem)
            .finish()
    }
}

/// Errors that can occur during execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("malformed program at pc={pc}: instruction {instruction}: {source}")]
    MalformedProgram {
        pc: usize,
        instruction: Word,
        source: DecodeError,
    },

    #[error("invalid address at pc={pc}: instruction {instruction}: {fault}")]
    InvalidAddress {
        pc: usize,
        instruction: Word,
        fault: AddressFault,
    },

    #[error("arithmetic overflow at pc={pc}: instruction {instruction}")]
    Overflow { pc: usize, instruction: Word },

    #[error("deadlock at pc={pc}: blocked on input after {steps} steps")]
    Deadlock { pc: usize, steps: u64 },

    #[error("step limit reached after {steps} steps")]
    StepLimit { steps: u64 },

    #[error("machine already faulted at pc={pc}")]
    Faulted { pc: usize },
}

impl MachineError {
    /// Program counter of the failing instruction, where known.
    pub fn pc(&self) -> Option<usize> {
        match self {
            MachineError::MalformedProgram { pc, .. }
            | MachineError::InvalidAddress { pc, .. }
            | MachineError::Overflow { pc, .. }
            | MachineError::Deadlock { pc, .. }
            | MachineError::Faulted { pc } => Some(*pc),
            MachineError::StepLimit { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::decode::encode;

    #[test]
    fn test_add_in_place() {
        let mut m = Machine::new(&[1, 0, 0, 0, 99]);
        assert_eq!(m.run_to_halt().unwrap(), 2);
        assert_eq!(m.steps(), 1);
        assert!(m.is_halted());
    }

    #[test]
    fn test_immediate_multiply() {
        let mut m = Machine::new(&[1002, 4, 3, 4, 33]);
        m.run_to_halt().unwrap();
        assert_eq!(m.peek(4), 99);
    }

    #[test]
    fn test_negative_immediate() {
        let mut m = Machine::new(&[1101, 100, -1, 4, 0]);
        m.run_to_halt().unwrap();
        assert_eq!(m.peek(4), 99);
    }

    #[test]
    fn test_echo() {
        let mut m = Machine::new(&[3, 0, 4, 0, 99]);
        m.push_input(17);
        m.run_to_halt().unwrap();
        assert_eq!(m.drain_output(), vec![17]);
    }

    #[test]
    fn test_blocked_input_keeps_pc() {
        let mut m = Machine::new(&[3, 0, 4, 0, 99]);

        assert_eq!(m.step().unwrap(), StepResult::Blocked);
        assert!(m.is_waiting());
        assert!(!m.is_halted());
        assert_eq!(m.program_counter(), 0);

        // Still blocked, nothing changes.
        assert_eq!(m.step().unwrap(), StepResult::Blocked);
        assert_eq!(m.program_counter(), 0);
        assert_eq!(m.steps(), 0);

        m.push_input(5);
        assert_eq!(m.step().unwrap(), StepResult::Continue);
        assert!(!m.is_waiting());
        assert_eq!(m.program_counter(), 2);
        assert_eq!(m.step().unwrap(), StepResult::Continue);
        assert_eq!(m.try_pop_output(), Some(5));
        assert_eq!(m.step().unwrap(), StepResult::Halted);
    }

    #[test]
    fn test_run_to_halt_deadlock() {
        let mut m = Machine::new(&[3, 0, 99]);
        let err = m.run_to_halt().unwrap_err();
        assert_eq!(err, MachineError::Deadlock { pc: 0, steps: 0 });
        // A deadlock is not a fault: feeding input lets it finish.
        m.push_input(8);
        assert_eq!(m.run_to_halt().unwrap(), 8);
    }

    #[test]
    fn test_jumps() {
        // Compare input to 8 using jumps: output 1 if equal, else 0.
        let program = [3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8];
        let mut m = Machine::new(&program);
        m.push_input(8);
        m.run_to_halt().unwrap();
        assert_eq!(m.drain_output(), vec![1]);

        let program = [3, 12, 6, 12, 15, 1, 13, 14, 13, 4, 13, 99, -1, 0, 1, 9];
        let mut m = Machine::new(&program);
        m.push_input(0);
        m.run_to_halt().unwrap();
        assert_eq!(m.drain_output(), vec![0]);

        m.reset();
        m.push_input(3);
        m.run_to_halt().unwrap();
        assert_eq!(m.drain_output(), vec![1]);
    }

    #[test]
    fn test_jump_to_self_does_not_advance() {
        // jnz #1, #0 loops on itself forever.
        let mut m = Machine::new(&[1105, 1, 0]);
        for _ in 0..5 {
            assert_eq!(m.step().unwrap(), StepResult::Continue);
            assert_eq!(m.program_counter(), 0);
        }
        assert_eq!(m.run_limited(10), Err(MachineError::StepLimit { steps: 10 }));
    }

    #[test]
    fn test_run_limited_checks_before_stepping() {
        let mut m = Machine::new(&[1101, 1, 1, 0, 99]);
        assert_eq!(m.run_limited(0), Err(MachineError::StepLimit { steps: 0 }));
        assert_eq!(m.steps(), 0);
        assert_eq!(m.peek(0), 1101);

        assert_eq!(m.run_limited(1), Ok(2));

        // Already parked on the halt: no step budget needed.
        let mut m = Machine::new(&[99]);
        assert_eq!(m.run_limited(0), Ok(99));
    }

    #[test]
    fn test_poke_any_address() {
        let mut m = Machine::new(&[99]);
        m.poke(usize::MAX, 1);
        m.poke(1 << 40, 2);
        assert_eq!(m.peek(usize::MAX), 1);
        assert_eq!(m.peek(1 << 40), 2);
        assert_eq!(m.memory().len(), 1);

        m.reset();
        assert_eq!(m.peek(1 << 40), 0);
    }

    #[test]
    fn test_relative_base() {
        // arb #10; out ~-3 (reads mem[7]); hlt
        let mut m = Machine::new(&[109, 10, 204, -3, 99, 0, 0, 42]);
        m.run_to_halt().unwrap();
        assert_eq!(m.relative_base(), 10);
        assert_eq!(m.drain_output(), vec![42]);
    }

    #[test]
    fn test_relative_write_target() {
        // arb #3; in ~5 -> writes mem[8]; hlt
        let mut m = Machine::new(&[109, 3, 203, 5, 99]);
        m.push_input(-6);
        m.run_to_halt().unwrap();
        assert_eq!(m.peek(8), -6);
        assert_eq!(m.memory().len(), 9);
    }

    #[test]
    fn test_large_numbers() {
        let mut m = Machine::new(&[1102, 34915192, 34915192, 7, 4, 7, 99, 0]);
        m.run_to_halt().unwrap();
        let out = m.drain_output();
        assert_eq!(out, vec![1219070632396864]);

        let mut m = Machine::new(&[104, 1125899906842624, 99]);
        m.run_to_halt().unwrap();
        assert_eq!(m.drain_output(), vec![1125899906842624]);
    }

    #[test]
    fn test_unknown_opcode_faults() {
        let mut m = Machine::new(&[1, 0, 0, 0, 42]);
        let err = m.run_to_halt().unwrap_err();
        assert!(matches!(
            err,
            MachineError::MalformedProgram { pc: 4, instruction: 42, .. }
        ));
        assert!(m.is_faulted());
        assert_eq!(m.step(), Err(MachineError::Faulted { pc: 4 }));

        m.reset();
        assert!(!m.is_faulted());
    }

    #[test]
    fn test_negative_address_faults_without_writing() {
        let mut m = Machine::new(&[1, -1, 0, 0, 99]);
        let err = m.step().unwrap_err();
        assert_eq!(
            err,
            MachineError::InvalidAddress { pc: 0, instruction: 1, fault: AddressFault::Negative(-1) }
        );
        assert_eq!(m.memory().as_slice(), &[1, -1, 0, 0, 99]);
    }

    #[test]
    fn test_immediate_write_faults() {
        let mut m = Machine::new(&[11101, 1, 1, 0, 99]);
        let err = m.step().unwrap_err();
        assert_eq!(
            err,
            MachineError::InvalidAddress { pc: 0, instruction: 11101, fault: AddressFault::ImmediateWrite }
        );
        assert_eq!(err.pc(), Some(0));
    }

    #[test]
    fn test_negative_jump_target_faults() {
        let mut m = Machine::new(&[1105, 1, -4]);
        assert!(matches!(
            m.step(),
            Err(MachineError::InvalidAddress { fault: AddressFault::Negative(-4), .. })
        ));
    }

    #[test]
    fn test_overflow_faults() {
        let mut m = Machine::new(&[1102, i64::MAX, 2, 0, 99]);
        assert_eq!(
            m.step(),
            Err(MachineError::Overflow { pc: 0, instruction: 1102 })
        );
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let program = [3, 0, 4, 0, 99];
        let mut m = Machine::new(&program);
        let fresh = m.clone();

        m.push_inputs([1, 2, 3]);
        m.run_to_halt().unwrap();
        m.poke(100, 7);
        m.reset();

        assert_eq!(m.memory(), fresh.memory());
        assert_eq!(m.registers(), fresh.registers());
        assert!(m.input().is_empty());
        assert!(m.output().is_empty());
        assert!(!m.is_waiting());
        assert_eq!(m.steps(), 0);
        assert_eq!(m.last_instruction(), None);
    }

    #[test]
    fn test_load_replaces_image() {
        let mut m = Machine::new(&[99]);
        m.load(&[1101, 2, 3, 0, 99]);
        assert_eq!(m.run_to_halt().unwrap(), 5);
        m.reset();
        assert_eq!(m.peek(0), 1101);
    }

    #[test]
    fn test_resume_stops_at_input() {
        // Output 1, read, output what was read, halt.
        let mut m = Machine::new(&[104, 1, 3, 9, 4, 9, 99, 0, 0, 0]);
        assert_eq!(m.resume().unwrap(), StepResult::Blocked);
        assert_eq!(m.drain_output(), vec![1]);

        m.push_ascii("A");
        assert_eq!(m.resume().unwrap(), StepResult::Halted);
        assert_eq!(m.drain_output(), vec![65]);
    }

    #[test]
    fn test_last_instruction() {
        let mut m = Machine::new(&[1001, 0, 5, 0, 99]);
        m.step().unwrap();
        let last = m.last_instruction().unwrap();
        assert_eq!(encode(&last), 1001);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut m = Machine::new(&[3, 0, 4, 0, 99]);
        m.step().unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let mut restored: Machine = serde_json::from_str(&json).unwrap();

        assert!(restored.is_waiting());
        restored.push_input(9);
        assert_eq!(restored.run_to_halt().unwrap(), 9);
    }
}
