//! Neighbor (ARP/NDP) entry types.

use crate::route::NextHopFlags;
use sonic_sai::NextHopOid;
use sonic_types::MacAddress;

/// A resolved neighbor with its HAL next-hop handle.
///
/// Reference counting lives in the neighbor table itself, so this
/// carries only the forwarding state.
#[derive(Debug, Clone)]
pub struct NeighborEntry {
    /// MAC address the neighbor resolved to.
    pub mac: MacAddress,
    /// HAL next-hop object created for this neighbor.
    pub next_hop_id: NextHopOid,
    /// State flags (interface down etc.).
    pub nh_flags: NextHopFlags,
}

impl NeighborEntry {
    /// Creates a new resolved neighbor entry.
    pub fn new(mac: MacAddress, next_hop_id: NextHopOid) -> Self {
        Self {
            mac,
            next_hop_id,
            nh_flags: NextHopFlags::NONE,
        }
    }
}
