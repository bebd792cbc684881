//! Neighbor orchestration logic.

use log::{info, warn};
use sonic_orch_common::RefTable;
use sonic_sai::NextHopOid;
use sonic_types::{IpAddress, MacAddress};

use super::types::NeighborEntry;
use crate::route::NextHopKey;

/// Base of the id space used for neighbor next-hop handles.
const NEXT_HOP_OID_BASE: u64 = 0x4000_0000_0000;

/// The neighbor table: resolved next hops and their HAL handles.
///
/// The table tracks how many group buckets and routes point at each
/// next hop; a referenced neighbor cannot be removed.
pub struct NeighOrch {
    next_hops: RefTable<NextHopKey, NeighborEntry>,
    next_hop_seq: u64,
}

impl NeighOrch {
    /// Creates an empty neighbor table.
    pub fn new() -> Self {
        Self {
            next_hops: RefTable::new(),
            next_hop_seq: 0,
        }
    }

    /// Records a resolved neighbor, allocating its next-hop handle.
    ///
    /// Re-resolution of a known neighbor keeps the existing handle and
    /// its references; only the MAC is refreshed.
    pub fn add_neighbor(&mut self, nexthop: NextHopKey, mac: MacAddress) -> NextHopOid {
        if let Some(entry) = self.next_hops.get_mut(&nexthop) {
            entry.mac = mac;
            return entry.next_hop_id;
        }

        self.next_hop_seq += 1;
        let next_hop_id = NextHopOid::from_raw_unchecked(NEXT_HOP_OID_BASE + self.next_hop_seq);
        info!("Neighbor {} resolved, next hop id {}", nexthop, next_hop_id);
        self.next_hops
            .insert(nexthop, NeighborEntry::new(mac, next_hop_id));
        next_hop_id
    }

    /// Removes a resolved neighbor.
    ///
    /// Refuses while group buckets still reference the next-hop.
    pub fn remove_neighbor(&mut self, nexthop: &NextHopKey) -> bool {
        match self.next_hops.remove(nexthop) {
            Ok(Some(_)) => {
                info!("Neighbor {} removed", nexthop);
                true
            }
            Ok(None) => true,
            Err(_) => {
                warn!("Neighbor {} still referenced, not removing", nexthop);
                false
            }
        }
    }

    /// Returns true if the next-hop is resolved.
    pub fn has_next_hop(&self, nexthop: &NextHopKey) -> bool {
        self.next_hops.contains_key(nexthop)
    }

    /// Returns the HAL handle for a resolved next-hop, or the null id.
    pub fn next_hop_id(&self, nexthop: &NextHopKey) -> NextHopOid {
        self.next_hops
            .get(nexthop)
            .map(|entry| entry.next_hop_id)
            .unwrap_or(NextHopOid::NULL)
    }

    /// Looks up the resolved neighbor for an IP address.
    pub fn get_neighbor_entry(&self, ip: &IpAddress) -> Option<(NextHopKey, MacAddress)> {
        self.next_hops
            .iter()
            .find(|(key, _)| key.ip_address() == ip)
            .map(|(key, entry)| (key.clone(), entry.mac))
    }

    /// Returns true if the interface-down flag is set for the next-hop.
    pub fn is_next_hop_if_down(&self, nexthop: &NextHopKey) -> bool {
        self.next_hops
            .get(nexthop)
            .map(|entry| entry.nh_flags.is_if_down())
            .unwrap_or(false)
    }

    /// Sets or clears the interface-down flag for the next-hop.
    pub fn set_next_hop_if_down(&mut self, nexthop: &NextHopKey, down: bool) {
        if let Some(entry) = self.next_hops.get_mut(nexthop) {
            entry.nh_flags.set_if_down(down);
        }
    }

    /// Takes a reference on the next-hop (a bucket or route now points
    /// at it).
    pub fn increase_next_hop_ref_count(&mut self, nexthop: &NextHopKey) {
        if self.next_hops.acquire(nexthop).is_err() {
            warn!("Ref count increment for unresolved next hop {}", nexthop);
        }
    }

    /// Drops a reference on the next-hop.
    pub fn decrease_next_hop_ref_count(&mut self, nexthop: &NextHopKey) {
        if self.next_hops.release(nexthop).is_err() {
            warn!("Ref count decrement for unresolved next hop {}", nexthop);
        }
    }

    /// Returns the next-hop reference count, if resolved.
    pub fn next_hop_ref_count(&self, nexthop: &NextHopKey) -> Option<u32> {
        self.next_hops.ref_count(nexthop)
    }

    /// Number of resolved neighbors.
    pub fn neighbor_count(&self) -> usize {
        self.next_hops.len()
    }
}

impl Default for NeighOrch {
    fn default() -> Self {
        Self::new()
    }
}
