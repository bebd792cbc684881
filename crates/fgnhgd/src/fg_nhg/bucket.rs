//! Hash bucket distribution.
//!
//! Every mutation of the bucket array flows through here. The unit of
//! consistency is the (shadow, HAL, journal) triple: each bucket rewrite
//! issues one HAL call, one journal write and one shadow update before
//! moving to the next bucket, so a failure mid-operation leaves all
//! three agreeing on the buckets already committed.
//!
//! The distribution rules keep the resilient-hashing guarantee: a bucket
//! owned by a surviving next-hop is never reassigned to another
//! survivor. Buckets only move when their owner leaves (handed to
//! survivors round-robin, capped at the equal share) or when a new
//! member claims its share (taken from the tail of over-share donors).

use log::{error, info, warn};
use sonic_orch_common::{TaskError, TaskResult};
use sonic_sai::api::route::RouteEntry;
use sonic_sai::{
    handle_sai_status, HandleStatus, NextHopGroupMemberOid, NextHopOid, RawSaiObjectId, SaiError,
    VirtualRouterOid,
};
use sonic_types::IpPrefix;
use std::collections::HashMap;
use std::collections::VecDeque;

use super::orch::FgNhgOrch;
use super::types::{BankMemberChanges, FgNextHopGroupEntry, FgNhgEntry};
use crate::route::NextHopKey;

/// Maps a HAL failure onto the task vocabulary via the platform
/// status classifier.
pub(super) fn sai_task_error(context: &str, err: SaiError) -> TaskError {
    match handle_sai_status(&err) {
        HandleStatus::TaskNeedRetry => TaskError::retry(format!("{}: {}", context, err)),
        _ => TaskError::hal_failure(format!("{}: {}", context, err)),
    }
}

impl FgNhgOrch {
    pub(super) fn journal_hset(&self, prefix: &IpPrefix, index: u32, nexthop: &NextHopKey) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.hset(prefix.to_string(), index.to_string(), nexthop.to_string());
        }
    }

    pub(super) fn journal_del(&self, prefix: &IpPrefix) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.del(&prefix.to_string());
        }
    }

    /// Rewrites one bucket: HAL member attribute then journal record.
    ///
    /// The caller updates the shadow bucket map for the same index
    /// immediately after this returns.
    pub(super) fn write_hash_bucket_change(
        &self,
        members: &[NextHopGroupMemberOid],
        index: u32,
        nh_oid: NextHopOid,
        prefix: &IpPrefix,
        nexthop: &NextHopKey,
    ) -> TaskResult<()> {
        let member = members
            .get(index as usize)
            .copied()
            .filter(|m| m.is_valid())
            .ok_or_else(|| {
                TaskError::invalid(format!("no group member at bucket {} for {}", index, prefix))
            })?;

        self.nhg_api
            .set_member_next_hop(member, nh_oid)
            .map_err(|e| {
                error!(
                    "Failed to set bucket {} of {} to next hop {}: {}",
                    index, prefix, nexthop, e
                );
                sai_task_error("bucket rewrite", e)
            })?;

        self.journal_hset(prefix, index, nexthop);
        Ok(())
    }

    /// Creates the HAL group for a shadow route and sizes its bucket
    /// array from the hardware-reported real size.
    pub(super) fn create_fine_grained_next_hop_group(
        &self,
        shadow: &mut FgNextHopGroupEntry,
        entry: &mut FgNhgEntry,
    ) -> TaskResult<()> {
        let group = self
            .nhg_api
            .create_fine_grained_group(entry.configured_bucket_size)
            .map_err(|e| sai_task_error("group create", e))?;
        shadow.group_id = Some(group);

        match self.nhg_api.real_size(group, entry.configured_bucket_size) {
            Ok(real) => entry.real_bucket_size = real,
            Err(e) => {
                // Free the just-created group before reporting failure
                if let Err(cleanup) = self.nhg_api.remove_group(group) {
                    error!("Failed to clean up after real-size query failure: {}", cleanup);
                }
                shadow.group_id = None;
                return Err(sai_task_error("real size query", e));
            }
        }

        shadow.nhopgroup_members =
            vec![NextHopGroupMemberOid::NULL; entry.real_bucket_size as usize];
        entry.calculate_bank_ranges();

        info!(
            "Created fine grained next hop group {} of size {}",
            entry.name, entry.real_bucket_size
        );
        Ok(())
    }

    /// Removes every member and then the group itself.
    ///
    /// Slots already removed are nulled in the shadow as it goes, so a
    /// retry after a transient failure does not double-remove.
    pub(super) fn remove_fine_grained_next_hop_group(
        &self,
        shadow: &mut FgNextHopGroupEntry,
    ) -> TaskResult<()> {
        for slot in shadow.nhopgroup_members.iter_mut() {
            if slot.is_null() {
                continue;
            }
            self.nhg_api
                .remove_member(*slot)
                .map_err(|e| sai_task_error("member remove", e))?;
            *slot = NextHopGroupMemberOid::NULL;
        }

        if let Some(group) = shadow.group_id.take() {
            if let Err(e) = self.nhg_api.remove_group(group) {
                shadow.group_id = Some(group);
                return Err(sai_task_error("group remove", e));
            }
        }

        Ok(())
    }

    /// Points the route entry at the given next-hop object.
    pub(super) fn modify_routes_next_hop_id(
        &self,
        vrf_id: VirtualRouterOid,
        prefix: &IpPrefix,
        next_hop_id: RawSaiObjectId,
    ) -> TaskResult<()> {
        self.route_api
            .set_route_next_hop_id(&RouteEntry::new(vrf_id, *prefix), next_hop_id)
            .map_err(|e| {
                error!("Failed to set route {} next hop id: {}", prefix, e);
                sai_task_error("route next hop set", e)
            })
    }

    /// Rebalances one active bank for a membership change.
    ///
    /// Phase 1 swaps deleted members' buckets to added members in place,
    /// which preserves per-member bucket counts and minimizes HAL
    /// writes. Phase 2 then has only deletes or only adds left: deleted
    /// members' buckets go to survivors round-robin until each survivor
    /// reaches its equal share, and new members claim buckets from the
    /// tail of survivors above the new equal share.
    pub(super) fn set_active_bank_hash_bucket_changes(
        &self,
        shadow: &mut FgNextHopGroupEntry,
        entry: &FgNhgEntry,
        syncd_bank: u32,
        mut change: BankMemberChanges,
        members_set: &HashMap<NextHopKey, NextHopOid>,
        prefix: &IpPrefix,
    ) -> TaskResult<()> {
        let bank = syncd_bank as usize;
        let mut add_idx = 0usize;
        let mut del_idx = 0usize;

        // Phase 1: swap in place
        while del_idx < change.nhs_to_del.len() && add_idx < change.nhs_to_add.len() {
            let del_nh = change.nhs_to_del[del_idx].clone();
            let add_nh = change.nhs_to_add[add_idx].clone();
            let add_oid = member_oid(members_set, &add_nh)?;

            let buckets = shadow.bucket_map[bank].remove(&del_nh).unwrap_or_default();
            for (done, bucket) in buckets.iter().copied().enumerate() {
                if let Err(e) = self.write_hash_bucket_change(
                    &shadow.nhopgroup_members,
                    bucket,
                    add_oid,
                    prefix,
                    &add_nh,
                ) {
                    // Keep the shadow honest about the split ownership
                    if done > 0 {
                        shadow.bucket_map[bank]
                            .entry(add_nh.clone())
                            .or_default()
                            .extend_from_slice(&buckets[..done]);
                        shadow.active_nexthops.insert(add_nh);
                    }
                    shadow.bucket_map[bank].insert(del_nh, buckets[done..].to_vec());
                    return Err(e);
                }
            }

            shadow.bucket_map[bank].insert(add_nh.clone(), buckets);
            change.active_nhs.push(add_nh.clone());
            shadow.active_nexthops.remove(&del_nh);
            shadow.active_nexthops.insert(add_nh);

            del_idx += 1;
            add_idx += 1;
        }

        // After the swap phase at most one of the two lists is non-empty

        if del_idx < change.nhs_to_del.len() {
            if change.active_nhs.is_empty() {
                return Err(TaskError::invalid(format!(
                    "{} no surviving next hops to absorb deleted buckets",
                    prefix
                )));
            }

            let num_buckets_in_bank = entry.bank_ranges[bank].len();
            let survivors = change.active_nhs.len() as u32;
            let exp_bucket_size = num_buckets_in_bank / survivors;
            let mut num_nhs_with_one_more = num_buckets_in_bank % survivors;

            let mut rotation: Vec<NextHopKey> = change.active_nhs.clone();
            let mut rot_idx = 0usize;

            while del_idx < change.nhs_to_del.len() {
                let del_nh = change.nhs_to_del[del_idx].clone();
                let mut pending: VecDeque<u32> = shadow.bucket_map[bank]
                    .remove(&del_nh)
                    .unwrap_or_default()
                    .into();

                while let Some(&bucket) = pending.front() {
                    if rotation.is_empty() {
                        let remaining = pending.len();
                        shadow.bucket_map[bank].insert(del_nh, pending.into_iter().collect());
                        return Err(TaskError::invalid(format!(
                            "{} ran out of active next hops with {} buckets left",
                            prefix, remaining
                        )));
                    }
                    if rot_idx >= rotation.len() {
                        rot_idx = 0;
                    }

                    let survivor = rotation[rot_idx].clone();
                    let survivor_size = shadow.bucket_map[bank]
                        .get(&survivor)
                        .map(|b| b.len() as u32)
                        .unwrap_or(0);

                    // A survivor stops receiving once it hits the equal
                    // share; the remainder shares go out one per member.
                    let (move_bkt, drop_from_rotation) = if survivor_size == exp_bucket_size {
                        if num_nhs_with_one_more == 0 {
                            (false, true)
                        } else {
                            num_nhs_with_one_more -= 1;
                            (true, true)
                        }
                    } else {
                        (true, false)
                    };

                    if move_bkt {
                        let survivor_oid = match member_oid(members_set, &survivor) {
                            Ok(oid) => oid,
                            Err(e) => {
                                shadow.bucket_map[bank]
                                    .insert(del_nh, pending.into_iter().collect());
                                return Err(e);
                            }
                        };
                        if let Err(e) = self.write_hash_bucket_change(
                            &shadow.nhopgroup_members,
                            bucket,
                            survivor_oid,
                            prefix,
                            &survivor,
                        ) {
                            shadow.bucket_map[bank]
                                .insert(del_nh, pending.into_iter().collect());
                            return Err(e);
                        }
                        shadow.bucket_map[bank]
                            .entry(survivor)
                            .or_default()
                            .push(bucket);
                        pending.pop_front();
                    }

                    if drop_from_rotation {
                        rotation.remove(rot_idx);
                    } else {
                        rot_idx += 1;
                    }
                }

                shadow.active_nexthops.remove(&del_nh);
                del_idx += 1;
            }
        }

        if add_idx < change.nhs_to_add.len() {
            let total_nhs = (change.active_nhs.len() + change.nhs_to_add.len() - add_idx) as u32;
            let num_buckets_in_bank = entry.bank_ranges[bank].len();
            let exp_bucket_size = num_buckets_in_bank / total_nhs;
            let mut num_nhs_with_one_more = num_buckets_in_bank % total_nhs;
            let mut num_nhs_with_eq_to_exp = total_nhs - num_nhs_with_one_more;

            let mut rotation: Vec<NextHopKey> = change.active_nhs.clone();

            while add_idx < change.nhs_to_add.len() {
                let add_nh = change.nhs_to_add[add_idx].clone();
                let add_oid = member_oid(members_set, &add_nh)?;
                shadow.bucket_map[bank].entry(add_nh.clone()).or_default();

                let add_target = if num_nhs_with_eq_to_exp > 0 {
                    num_nhs_with_eq_to_exp -= 1;
                    exp_bucket_size
                } else {
                    num_nhs_with_one_more -= 1;
                    exp_bucket_size + 1
                };

                let mut rot_idx = 0usize;
                loop {
                    let owned = shadow.bucket_map[bank]
                        .get(&add_nh)
                        .map(|b| b.len() as u32)
                        .unwrap_or(0);
                    if owned == add_target {
                        break;
                    }
                    if rotation.is_empty() {
                        settle_partial_add(shadow, bank, &add_nh);
                        return Err(TaskError::invalid(format!(
                            "{} no donor buckets left for new next hop {}",
                            prefix, add_nh
                        )));
                    }
                    if rot_idx >= rotation.len() {
                        rot_idx = 0;
                    }

                    let donor = rotation[rot_idx].clone();
                    let donor_size = shadow.bucket_map[bank]
                        .get(&donor)
                        .map(|b| b.len() as u32)
                        .unwrap_or(0);

                    // Donors shrink toward the new equal share; members
                    // entitled to share-plus-one are retired from the
                    // rotation without donating that bucket.
                    let (move_bkt, drop_from_rotation) = if donor_size > exp_bucket_size + 1 {
                        (true, false)
                    } else if donor_size == exp_bucket_size + 1 {
                        if num_nhs_with_one_more == 0 {
                            (true, true)
                        } else {
                            num_nhs_with_one_more -= 1;
                            (false, true)
                        }
                    } else {
                        (false, true)
                    };

                    if move_bkt {
                        let bucket = match shadow.bucket_map[bank]
                            .get(&donor)
                            .and_then(|b| b.last().copied())
                        {
                            Some(bucket) => bucket,
                            None => {
                                settle_partial_add(shadow, bank, &add_nh);
                                return Err(TaskError::invalid(format!(
                                    "{} donor {} has no buckets to give",
                                    prefix, donor
                                )));
                            }
                        };
                        if let Err(e) = self.write_hash_bucket_change(
                            &shadow.nhopgroup_members,
                            bucket,
                            add_oid,
                            prefix,
                            &add_nh,
                        ) {
                            settle_partial_add(shadow, bank, &add_nh);
                            return Err(e);
                        }
                        if let Some(donor_buckets) = shadow.bucket_map[bank].get_mut(&donor) {
                            donor_buckets.pop();
                        }
                        if let Some(add_buckets) = shadow.bucket_map[bank].get_mut(&add_nh) {
                            add_buckets.push(bucket);
                        }
                    }

                    if drop_from_rotation {
                        rotation.remove(rot_idx);
                    } else {
                        rot_idx += 1;
                    }
                }

                shadow.active_nexthops.insert(add_nh);
                add_idx += 1;
            }
        }

        Ok(())
    }

    /// Handles a bank whose own membership delta leaves it without
    /// active next-hops, or brings it back to life.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn set_inactive_bank_hash_bucket_changes(
        &mut self,
        shadow: &mut FgNextHopGroupEntry,
        entry: &FgNhgEntry,
        bank: u32,
        changes: &[BankMemberChanges],
        members_set: &HashMap<NextHopKey, NextHopOid>,
        vrf_id: VirtualRouterOid,
        prefix: &IpPrefix,
    ) -> TaskResult<()> {
        let change = &changes[bank as usize];

        if !change.nhs_to_add.is_empty() {
            // Inactive bank transitions to active: reclaim its own range
            info!("Bank {} of {} transitions to active", bank, prefix);
            shadow.bucket_map[bank as usize].clear();

            let range = entry.bank_ranges[bank as usize];
            for bucket in range.start_index..=range.end_index {
                let nexthop = change.nhs_to_add[bucket as usize % change.nhs_to_add.len()].clone();
                let oid = member_oid(members_set, &nexthop)?;
                self.write_hash_bucket_change(
                    &shadow.nhopgroup_members,
                    bucket,
                    oid,
                    prefix,
                    &nexthop,
                )?;
                shadow.bucket_map[bank as usize]
                    .entry(nexthop.clone())
                    .or_default()
                    .push(bucket);
                shadow.active_nexthops.insert(nexthop);
            }
            shadow.inactive_to_active.insert(bank, bank);
            info!("Bank {} of FG next-hops is up for prefix {}", bank, prefix);
        } else if !change.nhs_to_del.is_empty() {
            // Active bank transitions to inactive: its range fails over
            info!("Bank {} of {} transitions to inactive", bank, prefix);
            self.set_inactive_bank_to_next_available_active_bank(
                shadow,
                entry,
                bank,
                changes,
                members_set,
                vrf_id,
                prefix,
            )
            .await?;

            for nexthop in &change.nhs_to_del {
                shadow.active_nexthops.remove(nexthop);
            }
            info!("Bank {} of FG next-hops is down for prefix {}", bank, prefix);
        } else {
            // Bank stays inactive: keep its range aligned with the bank
            // it failed over to, or pick a new one if that bank drained
            let mapped = shadow
                .inactive_to_active
                .get(&bank)
                .copied()
                .filter(|b| (*b as usize) < changes.len());

            match mapped {
                Some(active_bank) if !changes[active_bank as usize].active_nhs.is_empty() => {
                    self.set_active_bank_hash_bucket_changes(
                        shadow,
                        entry,
                        bank,
                        changes[active_bank as usize].clone(),
                        members_set,
                        prefix,
                    )?;
                }
                _ => {
                    self.set_inactive_bank_to_next_available_active_bank(
                        shadow,
                        entry,
                        bank,
                        changes,
                        members_set,
                        vrf_id,
                        prefix,
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }

    /// Re-parents an inactive bank onto the lowest-indexed bank that
    /// still has active next-hops, spraying the bank's range over that
    /// bank's members. When no bank qualifies the route collapses to
    /// the router interface.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn set_inactive_bank_to_next_available_active_bank(
        &mut self,
        shadow: &mut FgNextHopGroupEntry,
        entry: &FgNhgEntry,
        bank: u32,
        changes: &[BankMemberChanges],
        members_set: &HashMap<NextHopKey, NextHopOid>,
        vrf_id: VirtualRouterOid,
        prefix: &IpPrefix,
    ) -> TaskResult<()> {
        let new_bank = changes
            .iter()
            .position(|c| !c.active_nhs.is_empty() || !c.nhs_to_add.is_empty());

        if let Some(new_bank) = new_bank {
            shadow.bucket_map[bank as usize].clear();
            shadow.inactive_to_active.insert(bank, new_bank as u32);

            // Collated set of members which will be active in the bank
            let mut members: Vec<NextHopKey> = changes[new_bank].active_nhs.clone();
            members.extend(changes[new_bank].nhs_to_add.iter().cloned());

            let range = entry.bank_ranges[bank as usize];
            for bucket in range.start_index..=range.end_index {
                let nexthop = members[bucket as usize % members.len()].clone();
                let oid = member_oid(members_set, &nexthop)?;
                self.write_hash_bucket_change(
                    &shadow.nhopgroup_members,
                    bucket,
                    oid,
                    prefix,
                    &nexthop,
                )?;
                shadow.bucket_map[bank as usize]
                    .entry(nexthop)
                    .or_default()
                    .push(bucket);
            }
            return Ok(());
        }

        // No active banks remain
        info!("All banks of FG next-hops are down for prefix {}", prefix);

        if shadow.points_to_rif {
            return Ok(());
        }

        // Point the route at the router interface so the kernel can
        // backfill neighbor resolution, then free the HAL group.
        let alias = shadow
            .nhg_key
            .first()
            .map(|nh| nh.alias().to_string())
            .ok_or_else(|| {
                TaskError::invalid(format!("{} has an empty next hop group key", prefix))
            })?;
        let rif_id = self.intfs.read().await.router_intfs_id(&alias);
        if rif_id.is_null() {
            info!("Failed to get rif next hop for {}", alias);
            return Err(TaskError::retry(format!(
                "router interface for {} not available",
                alias
            )));
        }

        self.modify_routes_next_hop_id(vrf_id, prefix, rif_id.as_raw())?;
        self.remove_fine_grained_next_hop_group(shadow)?;
        shadow.collapse_to_rif(rif_id);
        self.journal_del(prefix);

        Ok(())
    }

    /// Runs the per-bank case analysis over a full set of membership
    /// deltas, banks in ascending index order.
    pub(super) async fn compute_and_set_hash_bucket_changes(
        &mut self,
        shadow: &mut FgNextHopGroupEntry,
        entry: &FgNhgEntry,
        changes: &[BankMemberChanges],
        members_set: &HashMap<NextHopKey, NextHopOid>,
        vrf_id: VirtualRouterOid,
        prefix: &IpPrefix,
    ) -> TaskResult<()> {
        for bank in 0..changes.len() as u32 {
            let change = &changes[bank as usize];
            let active_with_churn = !change.active_nhs.is_empty()
                || (!change.nhs_to_add.is_empty() && !change.nhs_to_del.is_empty());

            if active_with_churn {
                // A bank is treated as active when it retains members,
                // or when every member went down but replacements
                // arrived in the same event
                self.set_active_bank_hash_bucket_changes(
                    shadow,
                    entry,
                    bank,
                    change.clone(),
                    members_set,
                    prefix,
                )?;
            } else {
                self.set_inactive_bank_hash_bucket_changes(
                    shadow, entry, bank, changes, members_set, vrf_id, prefix,
                )
                .await?;
            }
        }

        Ok(())
    }

    /// Populates a freshly-created group: creates one member per bucket,
    /// spraying active banks over their own ranges and parking inactive
    /// banks on active ones. Consumes the warm-restart recovery record
    /// for the prefix when one exists.
    pub(super) fn set_new_nhg_members(
        &mut self,
        shadow: &mut FgNextHopGroupEntry,
        entry: &FgNhgEntry,
        changes: &[BankMemberChanges],
        members_set: &HashMap<NextHopKey, NextHopOid>,
        prefix: &IpPrefix,
    ) -> TaskResult<()> {
        let num_banks = entry.bank_ranges.len();
        while shadow.bucket_map.len() < num_banks {
            shadow.bucket_map.push(Default::default());
        }

        let mut active_banks: Vec<u32> = Vec::new();
        let mut inactive_banks: Vec<u32> = Vec::new();
        for bank in 0..num_banks as u32 {
            if !changes[bank as usize].nhs_to_add.is_empty() {
                active_banks.push(bank);
            } else {
                inactive_banks.push(bank);
            }
        }

        if active_banks.is_empty() {
            // Nothing to place; the retry path owns this scenario
            info!("Found no next-hops to add for {}, skipping", prefix);
            return Err(TaskError::retry(format!(
                "{} has no eligible next hops",
                prefix
            )));
        }

        let recovered = self.recovery_map.get(&prefix.to_string()).cloned();

        for &active_bank in &active_banks {
            shadow.inactive_to_active.insert(active_bank, active_bank);
            self.spray_bank_nhg_members(
                shadow,
                entry,
                active_bank,
                &changes[active_bank as usize],
                members_set,
                prefix,
                recovered.as_deref(),
            )?;
        }

        for (i, &inactive_bank) in inactive_banks.iter().enumerate() {
            let active_bank = active_banks[i % active_banks.len()];
            shadow.inactive_to_active.insert(inactive_bank, active_bank);
            self.spray_bank_nhg_members(
                shadow,
                entry,
                inactive_bank,
                &changes[active_bank as usize],
                members_set,
                prefix,
                recovered.as_deref(),
            )?;
            info!(
                "Bank {} of FG next-hops is down for prefix {}",
                inactive_bank, prefix
            );
        }

        self.recovery_map.remove(&prefix.to_string());
        shadow.points_to_rif = false;
        shadow.rif_id = None;

        Ok(())
    }

    /// Creates the group members for one bank's bucket range.
    ///
    /// On warm restart the recovery record pins each bucket to the
    /// next-hop it held before the restart; otherwise buckets are filled
    /// round-robin from the bank's eligible members.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn spray_bank_nhg_members(
        &self,
        shadow: &mut FgNextHopGroupEntry,
        entry: &FgNhgEntry,
        bank: u32,
        change: &BankMemberChanges,
        members_set: &HashMap<NextHopKey, NextHopOid>,
        prefix: &IpPrefix,
        recovered: Option<&[Option<NextHopKey>]>,
    ) -> TaskResult<()> {
        let group = shadow
            .group_id
            .ok_or_else(|| TaskError::invalid(format!("{} has no HAL group", prefix)))?;
        let range = entry.bank_ranges[bank as usize];

        for bucket in range.start_index..=range.end_index {
            let mut nexthop: Option<NextHopKey> = None;

            if let Some(recovered) = recovered {
                if let Some(candidate) = recovered.get(bucket as usize).and_then(|o| o.as_ref()) {
                    if members_set.contains_key(candidate) {
                        // A recovered next hop from another bank means
                        // this bank was failed over before the restart
                        if let Some(owner_bank) = entry.bank_of(candidate.ip_address()) {
                            if owner_bank != bank {
                                shadow.inactive_to_active.insert(bank, owner_bank);
                            }
                        }
                        nexthop = Some(candidate.clone());
                    } else {
                        warn!(
                            "Recovered next hop {} for bucket {} of {} is not eligible, \
                             assigning cold",
                            candidate, bucket, prefix
                        );
                    }
                }
            }

            let nexthop = match nexthop {
                Some(nh) => nh,
                None => {
                    if change.nhs_to_add.is_empty() {
                        return Err(TaskError::invalid(format!(
                            "{} bank {} has no members to spray",
                            prefix, bank
                        )));
                    }
                    change.nhs_to_add[bucket as usize % change.nhs_to_add.len()].clone()
                }
            };

            let oid = member_oid(members_set, &nexthop)?;
            let member = self.nhg_api.create_member(group, oid, bucket).map_err(|e| {
                error!(
                    "Failed to create member for bucket {} of {}: {}",
                    bucket, prefix, e
                );
                sai_task_error("member create", e)
            })?;

            self.journal_hset(prefix, bucket, &nexthop);
            shadow.bucket_map[bank as usize]
                .entry(nexthop.clone())
                .or_default()
                .push(bucket);
            shadow.active_nexthops.insert(nexthop);
            shadow.nhopgroup_members[bucket as usize] = member;
        }

        Ok(())
    }

    /// Unwinds a failed group initialization: removes whatever members
    /// and group were created and clears the journal for the prefix.
    pub(super) fn abort_group_initialization(
        &self,
        shadow: &mut FgNextHopGroupEntry,
        prefix: &IpPrefix,
    ) {
        if let Err(e) = self.remove_fine_grained_next_hop_group(shadow) {
            error!(
                "Failed to clean up after group initialization failure for {}: {}",
                prefix, e
            );
        }
        shadow.nhopgroup_members.clear();
        shadow.bucket_map.clear();
        shadow.active_nexthops.clear();
        shadow.inactive_to_active.clear();
        self.journal_del(prefix);
    }
}

/// Looks up a next-hop's HAL handle, refusing null handles.
fn member_oid(
    members_set: &HashMap<NextHopKey, NextHopOid>,
    nexthop: &NextHopKey,
) -> TaskResult<NextHopOid> {
    members_set
        .get(nexthop)
        .copied()
        .filter(|oid| oid.is_valid())
        .ok_or_else(|| TaskError::invalid(format!("no HAL handle for next hop {}", nexthop)))
}

/// Keeps the shadow consistent when a new member's claim is interrupted:
/// a member owning buckets must be active, one owning none must not
/// appear in the bucket map at all.
fn settle_partial_add(shadow: &mut FgNextHopGroupEntry, bank: usize, add_nh: &NextHopKey) {
    let owns_buckets = shadow.bucket_map[bank]
        .get(add_nh)
        .map(|b| !b.is_empty())
        .unwrap_or(false);
    if owns_buckets {
        shadow.active_nexthops.insert(add_nh.clone());
    } else {
        shadow.bucket_map[bank].remove(add_nh);
    }
}

