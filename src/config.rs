//! Execution bounds shared by the CLI and the orchestrators.

use serde::{Serialize, Deserialize};

/// Default bound on instructions for a single-machine run.
pub const DEFAULT_MAX_STEPS: u64 = 100_000_000;

/// Default bound on scheduler rounds for multi-machine runs.
pub const DEFAULT_MAX_ROUNDS: u64 = 10_000_000;

/// Limits imposed on a run from outside the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimits {
    /// Maximum instructions one machine may execute.
    pub max_steps: u64,
    /// Maximum round-robin rounds an orchestrator may drive.
    pub max_rounds: u64,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl RunLimits {
    /// Load limits from a JSON file. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let limits = RunLimits::from_json(r#"{ "max_rounds": 50 }"#).unwrap();
        assert_eq!(limits.max_rounds, 50);
        assert_eq!(limits.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(RunLimits::from_json("{}").unwrap(), RunLimits::default());
    }
}
