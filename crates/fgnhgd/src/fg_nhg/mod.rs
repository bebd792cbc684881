//! Fine-grained ECMP next-hop group management.
//!
//! Fine-grained ECMP pins a route to a fixed-size array of hash buckets,
//! each bucket bound to one next-hop. Membership changes rewrite only the
//! buckets of the next-hops that changed, so flows hashed to surviving
//! next-hops keep their path (resilient hashing). This module owns:
//!
//! - the configured group/prefix/member model ([`types::FgNhgEntry`])
//! - the shadow of what has been pushed to the HAL
//!   ([`types::FgNextHopGroupEntry`])
//! - the bucket distribution algorithms (`bucket`)
//! - the config handlers, route reactor and link reactor ([`orch::FgNhgOrch`])
//! - the warm-restart journal projection of each bucket array

mod bucket;
mod orch;
mod types;

pub use orch::{route_fvs_from_nhg_key, FgNhgOrch, FgRouteUpdate};
pub use types::{
    BankIndexRange, BankMemberChanges, FgMatchMode, FgNextHopGroupEntry, FgNextHopInfo,
    FgNhgEntry,
};

/// Group configuration table.
pub const CFG_FG_NHG: &str = "FG_NHG";
/// Prefix binding configuration table.
pub const CFG_FG_NHG_PREFIX: &str = "FG_NHG_PREFIX";
/// Member configuration table.
pub const CFG_FG_NHG_MEMBER: &str = "FG_NHG_MEMBER";
/// Warm-restart journal table of per-bucket next-hop assignments.
pub const STATE_FG_ROUTE_TABLE_NAME: &str = "FG_ROUTE_TABLE";
