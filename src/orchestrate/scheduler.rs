//! Round-robin scheduler for groups of machines.
//!
//! Each round steps every machine once, in index order. After a machine
//! steps, any output it produced is relayed, in order, to the machine its
//! route points at. Machines without a route keep their output.

use crate::machine::{Machine, MachineError, StepResult, Word};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Summary of one scheduler round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    /// Some machine executed an instruction or some value was relayed.
    pub progressed: bool,
    /// Every machine reported `Halted`.
    pub all_halted: bool,
}

/// Cooperative scheduler over a fixed set of machines.
#[derive(Debug, Clone)]
pub struct Scheduler {
    machines: Vec<Machine>,
    /// `routes[i]` is where machine `i`'s output goes.
    routes: Vec<Option<usize>>,
    /// Last value each machine emitted, relayed or not.
    last_output: Vec<Option<Word>>,
    rounds: u64,
}

impl Scheduler {
    pub fn new(machines: Vec<Machine>) -> Self {
        let n = machines.len();
        Self {
            machines,
            routes: vec![None; n],
            last_output: vec![None; n],
            rounds: 0,
        }
    }

    /// Relay every value machine `from` emits into machine `to`'s input.
    pub fn link(&mut self, from: usize, to: usize) -> Result<(), OrchestrateError> {
        let n = self.machines.len();
        for index in [from, to] {
            if index >= n {
                return Err(OrchestrateError::UnknownMachine { index, count: n });
            }
        }
        self.routes[from] = Some(to);
        Ok(())
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn machine(&self, index: usize) -> Option<&Machine> {
        self.machines.get(index)
    }

    pub fn machine_mut(&mut self, index: usize) -> Option<&mut Machine> {
        self.machines.get_mut(index)
    }

    /// Last value machine `index` emitted.
    pub fn last_output(&self, index: usize) -> Option<Word> {
        self.last_output.get(index).copied().flatten()
    }

    /// Rounds driven so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Step every machine once.
    pub fn step_round(&mut self) -> Result<RoundReport, OrchestrateError> {
        let mut progressed = false;
        let mut all_halted = true;

        for index in 0..self.machines.len() {
            let result = self.machines[index]
                .step()
                .map_err(|source| OrchestrateError::Machine { index, source })?;

            match result {
                StepResult::Continue => {
                    progressed = true;
                    all_halted = false;
                }
                StepResult::Blocked => all_halted = false,
                StepResult::Halted => {}
            }

            if self.relay(index) > 0 {
                progressed = true;
            }
        }

        self.rounds += 1;
        Ok(RoundReport { progressed, all_halted })
    }

    /// Run rounds until every machine halts.
    ///
    /// Fails with `Deadlock` as soon as a round changes nothing while some
    /// machine is still blocked, and with `RoundLimit` after `max_rounds`.
    pub fn run(&mut self, max_rounds: u64) -> Result<u64, OrchestrateError> {
        if self.machines.is_empty() {
            return Err(OrchestrateError::EmptyTopology);
        }

        let start = self.rounds;
        loop {
            if self.rounds - start >= max_rounds {
                warn!(rounds = max_rounds, "round limit reached");
                return Err(OrchestrateError::RoundLimit { rounds: max_rounds });
            }

            let report = self.step_round()?;
            if report.all_halted {
                debug!(rounds = self.rounds - start, "all machines halted");
                return Ok(self.rounds - start);
            }
            if !report.progressed {
                warn!(round = self.rounds, "no machine can make progress");
                return Err(OrchestrateError::Deadlock { round: self.rounds });
            }
        }
    }

    /// Move pending output of machine `from` along its route.
    /// Returns how many values were moved.
    fn relay(&mut self, from: usize) -> usize {
        match self.routes[from] {
            Some(to) => {
                let values = self.machines[from].drain_output();
                if let Some(&last) = values.last() {
                    self.last_output[from] = Some(last);
                }
                trace!(from, to, count = values.len(), "relay");
                let moved = values.len();
                self.machines[to].push_inputs(values);
                moved
            }
            None => {
                if let Some(&last) = self.machines[from].output().iter().last() {
                    self.last_output[from] = Some(last);
                }
                0
            }
        }
    }
}

/// Errors raised while driving several machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrateError {
    #[error("machine {index}: {source}")]
    Machine {
        index: usize,
        source: MachineError,
    },

    #[error("deadlock in round {round}: every running machine is blocked on input")]
    Deadlock { round: u64 },

    #[error("round limit of {rounds} reached")]
    RoundLimit { rounds: u64 },

    #[error("every machine halted in round {round} before a result was produced")]
    AllHalted { round: u64 },

    #[error("machine index {index} out of range ({count} machines)")]
    UnknownMachine { index: usize, count: usize },

    #[error("machine {from} sent a packet to unknown address {dest}")]
    UnroutablePacket { from: usize, dest: Word },

    #[error("topology has no machines")]
    EmptyTopology,

    #[error("final machine produced no output")]
    NoOutput,
}
