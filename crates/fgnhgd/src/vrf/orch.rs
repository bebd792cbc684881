//! Virtual router orchestration logic.

use log::warn;
use sonic_sai::VirtualRouterOid;
use std::collections::HashMap;

/// Raw id of the default virtual router.
const DEFAULT_VRF_OID: u64 = 0x3000_0000_0001;

/// The virtual router table.
pub struct VrfOrch {
    default_vrf_id: VirtualRouterOid,
    ref_counts: HashMap<VirtualRouterOid, u32>,
}

impl VrfOrch {
    /// Creates the table with the default virtual router present.
    pub fn new() -> Self {
        let default_vrf_id = VirtualRouterOid::from_raw_unchecked(DEFAULT_VRF_OID);
        let mut ref_counts = HashMap::new();
        ref_counts.insert(default_vrf_id, 0);
        Self {
            default_vrf_id,
            ref_counts,
        }
    }

    /// Returns the default virtual router handle.
    pub fn default_vrf_id(&self) -> VirtualRouterOid {
        self.default_vrf_id
    }

    /// Increments the reference count for a VRF.
    pub fn increase_vrf_ref_count(&mut self, vrf_id: VirtualRouterOid) {
        *self.ref_counts.entry(vrf_id).or_insert(0) += 1;
    }

    /// Decrements the reference count for a VRF.
    pub fn decrease_vrf_ref_count(&mut self, vrf_id: VirtualRouterOid) {
        match self.ref_counts.get_mut(&vrf_id) {
            Some(count) if *count > 0 => *count -= 1,
            _ => warn!("VRF ref count decrement underflow for {}", vrf_id),
        }
    }

    /// Returns the reference count for a VRF.
    pub fn vrf_ref_count(&self, vrf_id: VirtualRouterOid) -> u32 {
        self.ref_counts.get(&vrf_id).copied().unwrap_or(0)
    }
}

impl Default for VrfOrch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_vrf() {
        let orch = VrfOrch::new();
        assert!(orch.default_vrf_id().is_valid());
        assert_eq!(orch.vrf_ref_count(orch.default_vrf_id()), 0);
    }

    #[test]
    fn test_ref_counting() {
        let mut orch = VrfOrch::new();
        let vrf = orch.default_vrf_id();

        orch.increase_vrf_ref_count(vrf);
        orch.increase_vrf_ref_count(vrf);
        assert_eq!(orch.vrf_ref_count(vrf), 2);

        orch.decrease_vrf_ref_count(vrf);
        orch.decrease_vrf_ref_count(vrf);
        orch.decrease_vrf_ref_count(vrf);
        assert_eq!(orch.vrf_ref_count(vrf), 0);
    }
}
