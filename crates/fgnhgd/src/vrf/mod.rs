//! Virtual router layer.
//!
//! Fine-grained ECMP only operates in the default VRF; this module holds
//! the default virtual-router handle and per-VRF reference counts.

mod orch;

pub use orch::VrfOrch;
