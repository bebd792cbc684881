//! Safe wrapper for the SAI next-hop group API, fine-grained flavor.
//!
//! Fine-grained ECMP groups own a fixed array of hash buckets; every
//! bucket is a group member carrying an explicit index. This wrapper
//! keeps group/member resource usage counters in lockstep with the
//! create/remove calls so callers can watch hardware occupancy.

use crate::backend::SharedBackend;
use crate::error::{SaiError, SaiResult};
use crate::types::{NextHopGroupMemberOid, NextHopGroupOid, NextHopOid};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Safe wrapper for fine-grained next-hop group operations.
pub struct NextHopGroupApi {
    backend: SharedBackend,
    groups_in_use: Arc<AtomicU64>,
    members_in_use: Arc<AtomicU64>,
}

impl NextHopGroupApi {
    /// Creates a new API wrapper over the given backend.
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            groups_in_use: Arc::new(AtomicU64::new(0)),
            members_in_use: Arc::new(AtomicU64::new(0)),
        }
    }

    fn backend(
        &self,
    ) -> SaiResult<std::sync::MutexGuard<'_, dyn crate::backend::SwitchBackend + 'static>> {
        self.backend
            .lock()
            .map_err(move |_| SaiError::internal("switch backend mutex poisoned"))
    }

    /// Creates a next-hop group with
    /// `{type = FINE_GRAIN_ECMP, configured_size}`.
    pub fn create_fine_grained_group(&self, configured_size: u32) -> SaiResult<NextHopGroupOid> {
        if configured_size == 0 {
            return Err(SaiError::invalid_parameter("configured size is zero"));
        }
        let raw = self.backend()?.create_next_hop_group(configured_size)?;
        self.groups_in_use.fetch_add(1, Ordering::SeqCst);
        NextHopGroupOid::from_raw(raw)
            .ok_or_else(|| SaiError::internal("backend returned null group id"))
    }

    /// Returns the bucket count the hardware actually allocated.
    ///
    /// Platforms without `REAL_SIZE` support (the simulated switch) fall
    /// back to the configured size.
    pub fn real_size(&self, group: NextHopGroupOid, configured_size: u32) -> SaiResult<u32> {
        match self.backend()?.query_real_size(group.as_raw()) {
            Ok(real) => Ok(real),
            Err(SaiError::NotSupported { .. }) => Ok(configured_size),
            Err(e) => Err(e),
        }
    }

    /// Removes a next-hop group.
    pub fn remove_group(&self, group: NextHopGroupOid) -> SaiResult<()> {
        if group.is_null() {
            return Err(SaiError::invalid_parameter("group OID is null"));
        }
        self.backend()?.remove_next_hop_group(group.as_raw())?;
        self.groups_in_use.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    /// Creates a group member bound to one hash bucket.
    pub fn create_member(
        &self,
        group: NextHopGroupOid,
        next_hop: NextHopOid,
        index: u32,
    ) -> SaiResult<NextHopGroupMemberOid> {
        if group.is_null() {
            return Err(SaiError::invalid_parameter("group OID is null"));
        }
        if next_hop.is_null() {
            return Err(SaiError::invalid_parameter("next_hop OID is null"));
        }
        let raw = self
            .backend()?
            .create_next_hop_group_member(group.as_raw(), next_hop.as_raw(), index)?;
        self.members_in_use.fetch_add(1, Ordering::SeqCst);
        NextHopGroupMemberOid::from_raw(raw)
            .ok_or_else(|| SaiError::internal("backend returned null member id"))
    }

    /// Rewrites the next-hop attribute of a member (one bucket rewrite).
    pub fn set_member_next_hop(
        &self,
        member: NextHopGroupMemberOid,
        next_hop: NextHopOid,
    ) -> SaiResult<()> {
        if member.is_null() {
            return Err(SaiError::invalid_parameter("member OID is null"));
        }
        if next_hop.is_null() {
            return Err(SaiError::invalid_parameter("next_hop OID is null"));
        }
        self.backend()?
            .set_member_next_hop(member.as_raw(), next_hop.as_raw())
    }

    /// Removes a group member.
    pub fn remove_member(&self, member: NextHopGroupMemberOid) -> SaiResult<()> {
        if member.is_null() {
            return Err(SaiError::invalid_parameter("member OID is null"));
        }
        self.backend()?.remove_next_hop_group_member(member.as_raw())?;
        self.members_in_use.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    /// Number of fine-grained groups currently created.
    pub fn groups_in_use(&self) -> u64 {
        self.groups_in_use.load(Ordering::SeqCst)
    }

    /// Number of group members (hash buckets) currently created.
    pub fn members_in_use(&self) -> u64 {
        self.members_in_use.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vs::VirtualSwitch;
    use std::sync::Mutex;

    fn api() -> NextHopGroupApi {
        NextHopGroupApi::new(Arc::new(Mutex::new(VirtualSwitch::new())))
    }

    #[test]
    fn test_create_and_remove_group() {
        let api = api();
        let group = api.create_fine_grained_group(64).unwrap();
        assert_eq!(api.groups_in_use(), 1);

        api.remove_group(group).unwrap();
        assert_eq!(api.groups_in_use(), 0);
    }

    #[test]
    fn test_zero_size_rejected() {
        let api = api();
        assert!(api.create_fine_grained_group(0).is_err());
    }

    #[test]
    fn test_real_size_falls_back_to_configured() {
        let api = api();
        let group = api.create_fine_grained_group(60).unwrap();
        assert_eq!(api.real_size(group, 60).unwrap(), 60);
    }

    #[test]
    fn test_member_counters_in_lockstep() {
        let api = api();
        let group = api.create_fine_grained_group(4).unwrap();
        let nh = NextHopOid::from_raw(0x77).unwrap();

        let mut members = Vec::new();
        for index in 0..4 {
            members.push(api.create_member(group, nh, index).unwrap());
        }
        assert_eq!(api.members_in_use(), 4);

        for member in members {
            api.remove_member(member).unwrap();
        }
        assert_eq!(api.members_in_use(), 0);
    }

    #[test]
    fn test_null_oid_rejected() {
        let api = api();
        let nh = NextHopOid::from_raw(0x77).unwrap();
        assert!(api
            .create_member(NextHopGroupOid::NULL, nh, 0)
            .is_err());
        assert!(api
            .set_member_next_hop(NextHopGroupMemberOid::NULL, nh)
            .is_err());
    }
}
