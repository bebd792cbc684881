//! Slim general route processor.
//!
//! Keeps the table of conventionally-programmed routes (those the
//! fine-grained manager declined) and answers the one question the
//! manager's prefix migration needs: which next-hop group a prefix is
//! currently synced with.

use log::info;
use sonic_sai::VirtualRouterOid;
use sonic_types::IpPrefix;
use std::collections::HashMap;

use super::nhg::NextHopGroupKey;

/// The conventional route bookkeeping of the route processor.
pub struct RouteOrch {
    /// VRF -> (prefix -> synced next-hop group)
    syncd_routes: HashMap<VirtualRouterOid, HashMap<IpPrefix, NextHopGroupKey>>,
}

impl RouteOrch {
    /// Creates an empty route processor.
    pub fn new() -> Self {
        Self {
            syncd_routes: HashMap::new(),
        }
    }

    /// Records a conventionally-programmed route.
    pub fn add_syncd_route(
        &mut self,
        vrf_id: VirtualRouterOid,
        prefix: IpPrefix,
        nhg_key: NextHopGroupKey,
    ) {
        info!("Syncd conventional route {} -> {}", prefix, nhg_key);
        self.syncd_routes
            .entry(vrf_id)
            .or_default()
            .insert(prefix, nhg_key);
    }

    /// Removes a conventionally-programmed route. Idempotent.
    pub fn remove_syncd_route(&mut self, vrf_id: VirtualRouterOid, prefix: &IpPrefix) {
        if let Some(table) = self.syncd_routes.get_mut(&vrf_id) {
            if table.remove(prefix).is_some() {
                info!("Removed conventional route {}", prefix);
            }
            if table.is_empty() {
                self.syncd_routes.remove(&vrf_id);
            }
        }
    }

    /// Returns the next-hop group a prefix is currently synced with.
    ///
    /// An empty group key means the route processor has no route for the
    /// prefix.
    pub fn syncd_route_nhg_key(&self, vrf_id: VirtualRouterOid, prefix: &IpPrefix) -> NextHopGroupKey {
        self.syncd_routes
            .get(&vrf_id)
            .and_then(|table| table.get(prefix))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns true if the route processor has a route for the prefix.
    pub fn has_route(&self, vrf_id: VirtualRouterOid, prefix: &IpPrefix) -> bool {
        self.syncd_routes
            .get(&vrf_id)
            .map(|table| table.contains_key(prefix))
            .unwrap_or(false)
    }

    /// Number of synced conventional routes across all VRFs.
    pub fn route_count(&self) -> usize {
        self.syncd_routes.values().map(|t| t.len()).sum()
    }
}

impl Default for RouteOrch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vrf() -> VirtualRouterOid {
        VirtualRouterOid::from_raw(1).unwrap()
    }

    #[test]
    fn test_syncd_route_lookup() {
        let mut orch = RouteOrch::new();
        let prefix: IpPrefix = "10.50.0.0/16".parse().unwrap();
        let nhg: NextHopGroupKey = "10.0.0.1@Ethernet0,10.0.0.2@Ethernet4".parse().unwrap();

        assert!(orch.syncd_route_nhg_key(vrf(), &prefix).is_empty());

        orch.add_syncd_route(vrf(), prefix, nhg.clone());
        assert!(orch.has_route(vrf(), &prefix));
        assert_eq!(orch.syncd_route_nhg_key(vrf(), &prefix), nhg);
    }

    #[test]
    fn test_remove_idempotent() {
        let mut orch = RouteOrch::new();
        let prefix: IpPrefix = "10.50.0.0/16".parse().unwrap();

        orch.remove_syncd_route(vrf(), &prefix);
        orch.add_syncd_route(vrf(), prefix, NextHopGroupKey::new());
        orch.remove_syncd_route(vrf(), &prefix);
        orch.remove_syncd_route(vrf(), &prefix);
        assert_eq!(orch.route_count(), 0);
    }
}
