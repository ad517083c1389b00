//! Amplifier pipelines.
//!
//! A pipeline runs one copy of a program per phase setting. Each copy first
//! reads its phase, then signals; stage `i`'s output is stage `i + 1`'s
//! input. In feedback mode the last stage feeds the first, so the stages
//! have to be interleaved by the scheduler instead of run one after another.

use crate::machine::{Machine, Word};
use crate::orchestrate::scheduler::{OrchestrateError, Scheduler};
use tracing::debug;

/// A chain of machines primed with phase settings.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Machine>,
    feedback: bool,
}

impl Pipeline {
    /// Build one stage per phase, each loaded with `program`.
    pub fn new(program: &[Word], phases: &[Word], feedback: bool) -> Result<Self, OrchestrateError> {
        if phases.is_empty() {
            return Err(OrchestrateError::EmptyTopology);
        }

        let stages = phases
            .iter()
            .map(|&phase| {
                let mut machine = Machine::new(program);
                machine.push_input(phase);
                machine
            })
            .collect();

        Ok(Self { stages, feedback })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Feed `seed` to the first stage and return the last value the final
    /// stage emits.
    pub fn run(self, seed: Word, max_rounds: u64) -> Result<Word, OrchestrateError> {
        if self.feedback {
            self.run_feedback(seed, max_rounds)
        } else {
            self.run_chain(seed)
        }
    }

    /// Run each stage to completion in order, handing its output on.
    fn run_chain(mut self, seed: Word) -> Result<Word, OrchestrateError> {
        let mut signal = vec![seed];

        for (index, stage) in self.stages.iter_mut().enumerate() {
            stage.push_inputs(signal);
            stage
                .run_to_halt()
                .map_err(|source| OrchestrateError::Machine { index, source })?;
            signal = stage.drain_output();
            debug!(stage = index, ?signal, "stage finished");
        }

        signal.last().copied().ok_or(OrchestrateError::NoOutput)
    }

    /// Interleave the stages with the last one looped back to the first.
    fn run_feedback(self, seed: Word, max_rounds: u64) -> Result<Word, OrchestrateError> {
        let n = self.stages.len();
        let mut sched = Scheduler::new(self.stages);
        for i in 0..n {
            sched.link(i, (i + 1) % n)?;
        }
        if let Some(first) = sched.machine_mut(0) {
            first.push_input(seed);
        }

        let rounds = sched.run(max_rounds)?;
        debug!(rounds, "feedback loop settled");
        sched.last_output(n - 1).ok_or(OrchestrateError::NoOutput)
    }
}

/// Try every ordering of `phases` and return the one giving the largest
/// final signal, together with that signal. The seed signal is 0.
pub fn best_phase_setting(
    program: &[Word],
    phases: &[Word],
    feedback: bool,
    max_rounds: u64,
) -> Result<(Vec<Word>, Word), OrchestrateError> {
    let mut best: Option<(Vec<Word>, Word)> = None;

    for order in permutations(phases) {
        let signal = Pipeline::new(program, &order, feedback)?.run(0, max_rounds)?;
        if best.as_ref().map_or(true, |(_, b)| signal > *b) {
            best = Some((order, signal));
        }
    }

    best.ok_or(OrchestrateError::EmptyTopology)
}

/// All orderings of `items` (Heap's algorithm).
fn permutations(items: &[Word]) -> Vec<Vec<Word>> {
    let mut items = items.to_vec();
    let n = items.len();
    let mut out = vec![items.clone()];
    let mut c = vec![0usize; n];

    let mut i = 0;
    while i < n {
        if c[i] < i {
            if i % 2 == 0 {
                items.swap(0, i);
            } else {
                items.swap(c[i], i);
            }
            out.push(items.clone());
            c[i] += 1;
            i = 0;
        } else {
            c[i] = 0;
            i += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: [Word; 17] = [3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0];

    const FEEDBACK: [Word; 29] = [
        3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28,
        1005, 28, 6, 99, 0, 0, 5,
    ];

    #[test]
    fn test_chain_signal() {
        let signal = Pipeline::new(&CHAIN, &[4, 3, 2, 1, 0], false)
            .unwrap()
            .run(0, 1000)
            .unwrap();
        assert_eq!(signal, 43210);
    }

    #[test]
    fn test_feedback_signal() {
        let signal = Pipeline::new(&FEEDBACK, &[9, 8, 7, 6, 5], true)
            .unwrap()
            .run(0, 100_000)
            .unwrap();
        assert_eq!(signal, 139629729);
    }

    #[test]
    fn test_best_phase_setting() {
        let (order, signal) = best_phase_setting(&CHAIN, &[0, 1, 2, 3, 4], false, 1000).unwrap();
        assert_eq!(order, vec![4, 3, 2, 1, 0]);
        assert_eq!(signal, 43210);

        let (order, signal) = best_phase_setting(&FEEDBACK, &[5, 6, 7, 8, 9], true, 100_000).unwrap();
        assert_eq!(order, vec![9, 8, 7, 6, 5]);
        assert_eq!(signal, 139629729);
    }

    #[test]
    fn test_permutations_complete() {
        let perms = permutations(&[1, 2, 3, 4]);
        assert_eq!(perms.len(), 24);
        let mut unique = perms.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn test_empty_pipeline() {
        assert_eq!(
            Pipeline::new(&CHAIN, &[], false).unwrap_err(),
            OrchestrateError::EmptyTopology
        );
    }
}
