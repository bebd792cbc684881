//! In-memory virtual switch backend.
//!
//! `VirtualSwitch` models the object state a real ASIC would hold for the
//! fine-grained ECMP path: next-hop groups, per-bucket group members and
//! route next-hop bindings. It is the backend used on the simulated
//! platform and in tests, where it additionally supports fault injection
//! and inspection of programmed state.

use crate::backend::SwitchBackend;
use crate::error::{SaiError, SaiResult, SaiStatus};
use crate::types::RawSaiObjectId;
use sonic_types::IpPrefix;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct VsNextHopGroup {
    configured_size: u32,
    member_count: u32,
}

#[derive(Debug, Clone)]
struct VsGroupMember {
    group: RawSaiObjectId,
    next_hop: RawSaiObjectId,
    index: u32,
}

/// An in-memory switch.
#[derive(Debug)]
pub struct VirtualSwitch {
    next_oid: RawSaiObjectId,
    groups: HashMap<RawSaiObjectId, VsNextHopGroup>,
    members: HashMap<RawSaiObjectId, VsGroupMember>,
    routes: HashMap<(RawSaiObjectId, IpPrefix), RawSaiObjectId>,
    /// When set, `query_real_size` reports this value instead of
    /// returning `NotSupported` (models hardware that rounds the
    /// configured size).
    reported_real_size: Option<u32>,
    fail_remaining: u32,
    fail_status: SaiStatus,
}

impl VirtualSwitch {
    /// Creates an empty virtual switch.
    pub fn new() -> Self {
        Self {
            next_oid: 0,
            groups: HashMap::new(),
            members: HashMap::new(),
            routes: HashMap::new(),
            reported_real_size: None,
            fail_remaining: 0,
            fail_status: SaiStatus::Failure,
        }
    }

    /// Makes `query_real_size` report the given bucket count.
    pub fn set_reported_real_size(&mut self, real_size: u32) {
        self.reported_real_size = Some(real_size);
    }

    /// Fails the next `count` mutating operations with `status`.
    pub fn inject_failures(&mut self, count: u32, status: SaiStatus) {
        self.fail_remaining = count;
        self.fail_status = status;
    }

    fn take_injected_failure(&mut self) -> SaiResult<()> {
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            return Err(SaiError::from_status(self.fail_status));
        }
        Ok(())
    }

    fn alloc_oid(&mut self) -> RawSaiObjectId {
        self.next_oid += 1;
        self.next_oid
    }

    /// Returns the next-hop currently programmed on a member.
    pub fn member_next_hop(&self, member: RawSaiObjectId) -> Option<RawSaiObjectId> {
        self.members.get(&member).map(|m| m.next_hop)
    }

    /// Returns the bucket index of a member.
    pub fn member_index(&self, member: RawSaiObjectId) -> Option<u32> {
        self.members.get(&member).map(|m| m.index)
    }

    /// Returns the number of members a group currently has.
    pub fn group_member_count(&self, group: RawSaiObjectId) -> u32 {
        self.groups.get(&group).map(|g| g.member_count).unwrap_or(0)
    }

    /// Returns true if the group object exists.
    pub fn group_exists(&self, group: RawSaiObjectId) -> bool {
        self.groups.contains_key(&group)
    }

    /// Returns the configured bucket count of a group.
    pub fn group_configured_size(&self, group: RawSaiObjectId) -> Option<u32> {
        self.groups.get(&group).map(|g| g.configured_size)
    }

    /// Returns the next-hop id a route entry is programmed with.
    pub fn route_next_hop(
        &self,
        vrf: RawSaiObjectId,
        destination: &IpPrefix,
    ) -> Option<RawSaiObjectId> {
        self.routes.get(&(vrf, *destination)).copied()
    }
}

impl Default for VirtualSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchBackend for VirtualSwitch {
    fn create_next_hop_group(&mut self, configured_size: u32) -> SaiResult<RawSaiObjectId> {
        self.take_injected_failure()?;
        if configured_size == 0 {
            return Err(SaiError::invalid_parameter("configured size is zero"));
        }
        let oid = self.alloc_oid();
        self.groups.insert(
            oid,
            VsNextHopGroup {
                configured_size,
                member_count: 0,
            },
        );
        Ok(oid)
    }

    fn query_real_size(&self, group: RawSaiObjectId) -> SaiResult<u32> {
        if !self.groups.contains_key(&group) {
            return Err(SaiError::not_found(format!("next-hop group 0x{:x}", group)));
        }
        match self.reported_real_size {
            Some(real) => Ok(real),
            None => Err(SaiError::not_supported("SAI_NEXT_HOP_GROUP_ATTR_REAL_SIZE")),
        }
    }

    fn remove_next_hop_group(&mut self, group: RawSaiObjectId) -> SaiResult<()> {
        self.take_injected_failure()?;
        let entry = self
            .groups
            .get(&group)
            .ok_or_else(|| SaiError::not_found(format!("next-hop group 0x{:x}", group)))?;
        if entry.member_count != 0 {
            return Err(SaiError::ObjectInUse {
                object: format!("next-hop group 0x{:x}", group),
            });
        }
        self.groups.remove(&group);
        Ok(())
    }

    fn create_next_hop_group_member(
        &mut self,
        group: RawSaiObjectId,
        next_hop: RawSaiObjectId,
        index: u32,
    ) -> SaiResult<RawSaiObjectId> {
        self.take_injected_failure()?;
        let entry = self
            .groups
            .get_mut(&group)
            .ok_or_else(|| SaiError::not_found(format!("next-hop group 0x{:x}", group)))?;
        if next_hop == 0 {
            return Err(SaiError::invalid_parameter("member next-hop id is null"));
        }
        entry.member_count += 1;
        let oid = self.alloc_oid();
        self.members.insert(
            oid,
            VsGroupMember {
                group,
                next_hop,
                index,
            },
        );
        Ok(oid)
    }

    fn set_member_next_hop(
        &mut self,
        member: RawSaiObjectId,
        next_hop: RawSaiObjectId,
    ) -> SaiResult<()> {
        self.take_injected_failure()?;
        let entry = self
            .members
            .get_mut(&member)
            .ok_or_else(|| SaiError::not_found(format!("group member 0x{:x}", member)))?;
        if next_hop == 0 {
            return Err(SaiError::invalid_parameter("member next-hop id is null"));
        }
        entry.next_hop = next_hop;
        Ok(())
    }

    fn remove_next_hop_group_member(&mut self, member: RawSaiObjectId) -> SaiResult<()> {
        self.take_injected_failure()?;
        let entry = self
            .members
            .remove(&member)
            .ok_or_else(|| SaiError::not_found(format!("group member 0x{:x}", member)))?;
        if let Some(group) = self.groups.get_mut(&entry.group) {
            group.member_count -= 1;
        }
        Ok(())
    }

    fn set_route_next_hop_id(
        &mut self,
        vrf: RawSaiObjectId,
        destination: &IpPrefix,
        next_hop_id: RawSaiObjectId,
    ) -> SaiResult<()> {
        self.take_injected_failure()?;
        self.routes.insert((vrf, *destination), next_hop_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_group_lifecycle() {
        let mut vs = VirtualSwitch::new();
        let group = vs.create_next_hop_group(64).unwrap();
        assert!(vs.group_exists(group));

        let member = vs.create_next_hop_group_member(group, 0x99, 0).unwrap();
        assert_eq!(vs.member_next_hop(member), Some(0x99));
        assert_eq!(vs.group_member_count(group), 1);

        // Group removal refuses while members remain
        assert!(vs.remove_next_hop_group(group).is_err());

        vs.remove_next_hop_group_member(member).unwrap();
        vs.remove_next_hop_group(group).unwrap();
        assert!(!vs.group_exists(group));
    }

    #[test]
    fn test_member_rewrite() {
        let mut vs = VirtualSwitch::new();
        let group = vs.create_next_hop_group(16).unwrap();
        let member = vs.create_next_hop_group_member(group, 0x1, 3).unwrap();

        vs.set_member_next_hop(member, 0x2).unwrap();
        assert_eq!(vs.member_next_hop(member), Some(0x2));
        assert_eq!(vs.member_index(member), Some(3));
    }

    #[test]
    fn test_real_size_unsupported_by_default() {
        let mut vs = VirtualSwitch::new();
        let group = vs.create_next_hop_group(60).unwrap();
        assert!(matches!(
            vs.query_real_size(group),
            Err(SaiError::NotSupported { .. })
        ));

        vs.set_reported_real_size(64);
        assert_eq!(vs.query_real_size(group).unwrap(), 64);
    }

    #[test]
    fn test_fault_injection() {
        let mut vs = VirtualSwitch::new();
        vs.inject_failures(1, SaiStatus::InsufficientResources);

        let err = vs.create_next_hop_group(64).unwrap_err();
        assert_eq!(err.status(), Some(SaiStatus::InsufficientResources));

        // Next call succeeds
        assert!(vs.create_next_hop_group(64).is_ok());
    }

    #[test]
    fn test_route_binding() {
        let mut vs = VirtualSwitch::new();
        let prefix: IpPrefix = "10.50.0.0/16".parse().unwrap();
        vs.set_route_next_hop_id(1, &prefix, 0x42).unwrap();
        assert_eq!(vs.route_next_hop(1, &prefix), Some(0x42));
        assert_eq!(vs.route_next_hop(2, &prefix), None);
    }
}
