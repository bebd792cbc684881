//! Safe wrapper for the SAI route API.
//!
//! The fine-grained ECMP path only touches one route attribute:
//! `SAI_ROUTE_ENTRY_ATTR_NEXT_HOP_ID`. The id may refer to a next-hop
//! group (HAL-backed forwarding) or a router interface (RIF fallback), so
//! the setter takes the raw object id.

use crate::backend::SharedBackend;
use crate::error::{SaiError, SaiResult};
use crate::types::{RawSaiObjectId, VirtualRouterOid};
use sonic_types::IpPrefix;

/// A route entry: destination prefix within a virtual router.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteEntry {
    /// Virtual router (VRF) this route belongs to
    pub vrf_id: VirtualRouterOid,
    /// Destination IP prefix
    pub destination: IpPrefix,
}

impl RouteEntry {
    /// Creates a new route entry.
    pub fn new(vrf_id: VirtualRouterOid, destination: IpPrefix) -> Self {
        Self {
            vrf_id,
            destination,
        }
    }
}

/// Safe wrapper for route entry operations.
pub struct RouteApi {
    backend: SharedBackend,
}

impl RouteApi {
    /// Creates a new API wrapper over the given backend.
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Points a route entry at the given next-hop object.
    pub fn set_route_next_hop_id(
        &self,
        entry: &RouteEntry,
        next_hop_id: RawSaiObjectId,
    ) -> SaiResult<()> {
        if entry.vrf_id.is_null() {
            return Err(SaiError::invalid_parameter("VRF ID is null"));
        }
        if next_hop_id == 0 {
            return Err(SaiError::invalid_parameter("next-hop id is null"));
        }
        self.backend
            .lock()
            .map_err(|_| SaiError::internal("switch backend mutex poisoned"))?
            .set_route_next_hop_id(entry.vrf_id.as_raw(), &entry.destination, next_hop_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vs::VirtualSwitch;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_set_route_next_hop_id() {
        let backend: SharedBackend = Arc::new(Mutex::new(VirtualSwitch::new()));
        let api = RouteApi::new(Arc::clone(&backend));

        let vrf = VirtualRouterOid::from_raw(1).unwrap();
        let entry = RouteEntry::new(vrf, "10.50.0.0/16".parse().unwrap());
        api.set_route_next_hop_id(&entry, 0x42).unwrap();
    }

    #[test]
    fn test_null_parameters_rejected() {
        let backend: SharedBackend = Arc::new(Mutex::new(VirtualSwitch::new()));
        let api = RouteApi::new(backend);

        let entry = RouteEntry::new(VirtualRouterOid::NULL, "10.50.0.0/16".parse().unwrap());
        assert!(api.set_route_next_hop_id(&entry, 0x42).is_err());

        let vrf = VirtualRouterOid::from_raw(1).unwrap();
        let entry = RouteEntry::new(vrf, "10.50.0.0/16".parse().unwrap());
        assert!(api.set_route_next_hop_id(&entry, 0).is_err());
    }
}
