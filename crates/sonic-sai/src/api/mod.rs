//! Safe wrappers for SAI API surfaces.
//!
//! Each submodule wraps one SAI API with type-safe object ids and
//! `SaiResult` returns over a shared [`crate::backend::SwitchBackend`]:
//!
//! - [`next_hop_group`]: fine-grained next-hop group and member management
//! - [`route`]: route entry next-hop binding

pub mod next_hop_group;
pub mod route;

pub use next_hop_group::NextHopGroupApi;
pub use route::RouteApi;
