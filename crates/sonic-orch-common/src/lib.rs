//! Common orchestration abstractions for the SONiC fine-grained ECMP
//! control plane:
//!
//! - [`Orch`]: trait an orchestration agent implements to be driven by
//!   the single-threaded dispatch loop
//! - [`Consumer`]: per-table entry queue whose pending state per key
//!   collapses to SET, DEL, or DEL-then-SET, with head-of-line retry
//! - [`TaskStatus`] / [`TaskError`]: the handled-or-retry disposition
//!   vocabulary and the route-level failure kinds
//! - [`RefTable`]: reference-counted object table backing the neighbor
//!   and router-interface layers
//! - [`StateTable`]: in-memory STATE_DB-style hash table backing the
//!   warm-restart journal
//!
//! # Event model
//!
//! 1. Configuration and route entries are published into per-table
//!    consumers
//! 2. The dispatcher drains every consumer to quiescence each pass;
//!    handlers consume entries or defer them intact
//! 3. Handlers translate entries into HAL calls, journaling durable
//!    projections into STATE_DB tables as they go

mod consumer;
mod orch;
mod ref_table;
mod table;
mod task;

pub use consumer::{Consumer, FieldValue, KeyOpFieldsValues, Operation};
pub use orch::Orch;
pub use ref_table::{RefTable, RefTableError};
pub use table::StateTable;
pub use task::{TaskError, TaskResult, TaskStatus};
