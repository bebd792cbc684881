//! Port layer.
//!
//! Tracks port operational state; oper-state transitions are the input
//! of the fine-grained manager's link reactor.

mod orch;
mod types;

pub use orch::PortsOrch;
pub use types::{Port, PortOperStateUpdate};
