//! Safe Rust bindings for SAI (Switch Abstraction Interface).
//!
//! This crate provides type-safe wrappers around the SAI object model,
//! preventing common errors like mixing object IDs of different types and
//! ensuring proper error handling.
//!
//! # Architecture
//!
//! - [`types`]: Core SAI types including type-safe object IDs
//! - [`error`]: Error types, status handling and the task-status classifier
//! - [`backend`]: The raw switch operation trait the API wrappers drive
//! - [`api`]: Safe wrappers around SAI API surfaces (next-hop group, route)
//! - [`vs`]: In-memory virtual switch backend (simulated platform, tests)
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use sonic_sai::api::NextHopGroupApi;
//! use sonic_sai::backend::SharedBackend;
//! use sonic_sai::vs::VirtualSwitch;
//!
//! let backend: SharedBackend = Arc::new(Mutex::new(VirtualSwitch::new()));
//! let api = NextHopGroupApi::new(backend);
//! let group = api.create_fine_grained_group(64).unwrap();
//! assert_eq!(api.real_size(group, 64).unwrap(), 64);
//! ```

pub mod api;
pub mod backend;
pub mod error;
pub mod types;
pub mod vs;

// Re-export commonly used types
pub use types::{
    NeighborEntryKind, NeighborEntryOid, NextHopGroupKind, NextHopGroupMemberKind,
    NextHopGroupMemberOid, NextHopGroupOid, NextHopKind, NextHopOid, PortKind, PortOid,
    RawSaiObjectId, RouteEntryKind, RouteEntryOid, RouterInterfaceKind, RouterInterfaceOid,
    SaiObjectId, SaiObjectKind, SwitchKind, SwitchOid, VirtualRouterKind, VirtualRouterOid,
};

pub use backend::{SharedBackend, SwitchBackend};
pub use error::{handle_sai_status, HandleStatus, SaiError, SaiResult, SaiStatus};
