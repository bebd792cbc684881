//! Route types and the slim general route processor.
//!
//! The fine-grained manager owns routes for bound prefixes; everything
//! else flows through [`RouteOrch`], which keeps the conventional
//! next-hop group bookkeeping the manager consults during prefix
//! migration.

mod nexthop;
mod nhg;
mod orch;
mod types;

pub use nexthop::{NextHopFlags, NextHopKey, ParseNextHopKeyError};
pub use nhg::NextHopGroupKey;
pub use orch::RouteOrch;
pub use types::RouteTableProducer;

/// Application route table consumed by the route processor.
pub const APP_ROUTE_TABLE_NAME: &str = "ROUTE_TABLE";
