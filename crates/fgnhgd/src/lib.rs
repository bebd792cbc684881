//! fgnhgd - SONiC fine-grained ECMP next-hop group manager.
//!
//! Fine-grained ECMP programs routes with hash-bucket-level next-hop
//! assignments: when a next hop becomes unreachable, only the traffic
//! that hashed to it is rebalanced, so flows to surviving next hops keep
//! their path. This matters for stateful devices (firewalls, NATs,
//! stateful load balancers) sitting behind the ECMP group.
//!
//! # Architecture
//!
//! ```text
//! [FG_NHG / FG_NHG_PREFIX / FG_NHG_MEMBER] ─┐
//! [ROUTE_TABLE] ────────────────────────────┼──> [OrchDaemon] ──> [SAI] ──> ASIC
//! [port oper state] ────────────────────────┘         │
//!                                                     v
//!                                           [FG_ROUTE_TABLE journal]
//! ```
//!
//! # Key Components
//!
//! - [`fg_nhg::FgNhgOrch`]: the manager: config handlers, bucket
//!   distributor, shadow table, warm-restart journal
//! - [`daemon::OrchDaemon`]: single-threaded event dispatch
//! - [`route`], [`neigh`], [`intfs`], [`vrf`], [`ports`]: collaborator
//!   layers the manager consults

pub mod daemon;
pub mod fg_nhg;
pub mod intfs;
pub mod neigh;
pub mod ports;
pub mod route;
pub mod vrf;

// Re-export commonly used types
pub use daemon::OrchDaemon;
pub use fg_nhg::{
    FgMatchMode, FgNextHopGroupEntry, FgNhgEntry, FgNhgOrch, CFG_FG_NHG, CFG_FG_NHG_MEMBER,
    CFG_FG_NHG_PREFIX, STATE_FG_ROUTE_TABLE_NAME,
};
pub use route::{NextHopGroupKey, NextHopKey};
