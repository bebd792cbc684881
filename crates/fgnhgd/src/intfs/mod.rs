//! Router interface layer.
//!
//! Maps interface aliases to router-interface HAL handles, used for the
//! RIF fallback when a fine-grained group has no forwardable member.

mod orch;

pub use orch::IntfsOrch;
