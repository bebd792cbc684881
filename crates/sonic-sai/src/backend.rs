//! Raw switch operation trait driven by the typed API wrappers.
//!
//! `SwitchBackend` is the seam between the typed API surfaces in [`crate::api`]
//! and whatever actually executes the operations: the vendor SAI library via
//! FFI on hardware, or [`crate::vs::VirtualSwitch`] on the simulated platform
//! and in tests. Operations take and return raw object ids, matching the C
//! API boundary; type safety is layered on top by the wrappers.

use crate::error::SaiResult;
use crate::types::RawSaiObjectId;
use sonic_types::IpPrefix;
use std::sync::{Arc, Mutex};

/// The narrow set of switch operations the fine-grained ECMP path needs.
pub trait SwitchBackend: Send {
    /// Creates a next-hop group of type fine-grain ECMP with the given
    /// configured bucket count. Returns the group object id.
    fn create_next_hop_group(&mut self, configured_size: u32) -> SaiResult<RawSaiObjectId>;

    /// Queries the actual bucket count the hardware allocated for the
    /// group (`SAI_NEXT_HOP_GROUP_ATTR_REAL_SIZE`).
    ///
    /// Backends without real-size support return `NotSupported`.
    fn query_real_size(&self, group: RawSaiObjectId) -> SaiResult<u32>;

    /// Removes a next-hop group. All members must have been removed first.
    fn remove_next_hop_group(&mut self, group: RawSaiObjectId) -> SaiResult<()>;

    /// Creates a group member bound to one hash bucket:
    /// `{group, next_hop, index}`.
    fn create_next_hop_group_member(
        &mut self,
        group: RawSaiObjectId,
        next_hop: RawSaiObjectId,
        index: u32,
    ) -> SaiResult<RawSaiObjectId>;

    /// Rewrites the next-hop attribute of an existing group member.
    fn set_member_next_hop(
        &mut self,
        member: RawSaiObjectId,
        next_hop: RawSaiObjectId,
    ) -> SaiResult<()>;

    /// Removes a group member.
    fn remove_next_hop_group_member(&mut self, member: RawSaiObjectId) -> SaiResult<()>;

    /// Sets `SAI_ROUTE_ENTRY_ATTR_NEXT_HOP_ID` for a route entry.
    fn set_route_next_hop_id(
        &mut self,
        vrf: RawSaiObjectId,
        destination: &IpPrefix,
        next_hop_id: RawSaiObjectId,
    ) -> SaiResult<()>;
}

/// Shared handle to a switch backend.
///
/// The API wrappers in [`crate::api`] clone this handle so that the group
/// and route surfaces talk to the same switch.
pub type SharedBackend = Arc<Mutex<dyn SwitchBackend>>;
