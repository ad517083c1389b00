//! Driving several machines together.
//!
//! Everything here is built on the public machine contract only: `step`,
//! `push_input`, output draining and the `waiting` flag.
//! - [`Scheduler`] - round-robin stepping with ordered output relays
//! - [`Pipeline`] - amplifier chains, optionally looped back on themselves
//! - [`Network`] - addressed nodes exchanging packets through a NAT

pub mod scheduler;
pub mod amplifier;
pub mod network;

pub use scheduler::{Scheduler, RoundReport, OrchestrateError};
pub use amplifier::{Pipeline, best_phase_setting};
pub use network::{Network, Packet, NatEvent, NAT_ADDRESS};
