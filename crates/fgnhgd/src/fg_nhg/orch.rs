//! Fine-grained next-hop group orchestration.
//!
//! `FgNhgOrch` consumes the three configuration tables (group, prefix,
//! member), reacts to route updates handed over by the route processor
//! and to port oper-state changes, and keeps the shadow table, the HAL
//! and the warm-restart journal in agreement.

use async_trait::async_trait;
use log::{error, info, warn};
use sonic_orch_common::{
    Consumer, KeyOpFieldsValues, Operation, Orch, StateTable, TaskError, TaskResult, TaskStatus,
};
use sonic_sai::api::{NextHopGroupApi, RouteApi};
use sonic_sai::{NextHopOid, RawSaiObjectId, SharedBackend, VirtualRouterOid};
use sonic_types::{IpAddress, IpPrefix};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use super::types::{BankMemberChanges, FgMatchMode, FgNextHopGroupEntry, FgNhgEntry};
use super::{CFG_FG_NHG, CFG_FG_NHG_MEMBER, CFG_FG_NHG_PREFIX};
use crate::intfs::IntfsOrch;
use crate::neigh::NeighOrch;
use crate::ports::{PortOperStateUpdate, PortsOrch};
use crate::route::{NextHopGroupKey, NextHopKey, RouteOrch, RouteTableProducer};
use crate::vrf::VrfOrch;

/// Outcome of programming a route through the fine-grained path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FgRouteUpdate {
    /// The object the route must point at (group or RIF).
    pub next_hop_id: RawSaiObjectId,
    /// True when the route's next-hop attribute must be (re)programmed;
    /// false when only group members moved.
    pub next_hop_id_changed: bool,
}

/// Builds the application route table field-values for a next-hop group.
pub fn route_fvs_from_nhg_key(nhg_key: &NextHopGroupKey) -> Vec<(String, String)> {
    let nexthops: Vec<String> = nhg_key.iter().map(|nh| nh.ip_address().to_string()).collect();
    let ifnames: Vec<String> = nhg_key.iter().map(|nh| nh.alias().to_string()).collect();
    vec![
        ("nexthop".to_string(), nexthops.join(",")),
        ("ifname".to_string(), ifnames.join(",")),
    ]
}

/// The fine-grained ECMP manager.
pub struct FgNhgOrch {
    pub(super) fg_nhgs: HashMap<String, FgNhgEntry>,
    /// Prefix -> owning group name (route-based / prefix-based binding).
    pub(super) fg_prefixes: HashMap<IpPrefix, String>,
    /// Member IP -> owning group name (nexthop-based matching).
    pub(super) fg_nexthops: HashMap<IpAddress, String>,
    pub(super) fine_grained_configured: bool,

    /// VRF -> prefix -> shadow of the HAL state.
    pub(super) syncd_fg_routes: HashMap<VirtualRouterOid, HashMap<IpPrefix, FgNextHopGroupEntry>>,

    /// Prefix migration state for the two-phase add/del dance.
    pub(super) prefix_add_cache: HashMap<IpPrefix, NextHopGroupKey>,
    pub(super) prefix_del_cache: HashMap<IpPrefix, NextHopGroupKey>,

    /// Warm-restart recovery: prefix string -> bucket index -> next hop.
    pub(super) recovery_map: HashMap<String, Vec<Option<NextHopKey>>>,

    pub(super) nhg_api: NextHopGroupApi,
    pub(super) route_api: RouteApi,
    pub(super) journal: Arc<Mutex<StateTable>>,

    pub(super) neigh: Arc<RwLock<NeighOrch>>,
    pub(super) intfs: Arc<RwLock<IntfsOrch>>,
    pub(super) ports: Arc<RwLock<PortsOrch>>,
    pub(super) vrf: Arc<RwLock<VrfOrch>>,
    pub(super) route_orch: Arc<RwLock<RouteOrch>>,
    pub(super) route_producer: RouteTableProducer,

    group_consumer: Consumer,
    prefix_consumer: Consumer,
    member_consumer: Consumer,
}

impl FgNhgOrch {
    /// Creates the manager with its collaborator handles.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: SharedBackend,
        journal: Arc<Mutex<StateTable>>,
        neigh: Arc<RwLock<NeighOrch>>,
        intfs: Arc<RwLock<IntfsOrch>>,
        ports: Arc<RwLock<PortsOrch>>,
        vrf: Arc<RwLock<VrfOrch>>,
        route_orch: Arc<RwLock<RouteOrch>>,
        route_producer: RouteTableProducer,
    ) -> Self {
        Self {
            fg_nhgs: HashMap::new(),
            fg_prefixes: HashMap::new(),
            fg_nexthops: HashMap::new(),
            fine_grained_configured: false,
            syncd_fg_routes: HashMap::new(),
            prefix_add_cache: HashMap::new(),
            prefix_del_cache: HashMap::new(),
            recovery_map: HashMap::new(),
            nhg_api: NextHopGroupApi::new(Arc::clone(&backend)),
            route_api: RouteApi::new(backend),
            journal,
            neigh,
            intfs,
            ports,
            vrf,
            route_orch,
            route_producer,
            group_consumer: Consumer::new(CFG_FG_NHG),
            prefix_consumer: Consumer::new(CFG_FG_NHG_PREFIX),
            member_consumer: Consumer::new(CFG_FG_NHG_MEMBER),
        }
    }

    /// Queues configuration entries for one of the three tables.
    pub fn add_config(&mut self, table: &str, entries: Vec<KeyOpFieldsValues>) {
        match table {
            CFG_FG_NHG => self.group_consumer.add_to_sync(entries),
            CFG_FG_NHG_PREFIX => self.prefix_consumer.add_to_sync(entries),
            CFG_FG_NHG_MEMBER => self.member_consumer.add_to_sync(entries),
            _ => error!("Unknown table: {}", table),
        }
    }

    /// Returns true when any fine-grained group is configured.
    pub fn is_fine_grained_configured(&self) -> bool {
        self.fine_grained_configured
    }

    /// Looks up a configured group by name.
    pub fn group(&self, name: &str) -> Option<&FgNhgEntry> {
        self.fg_nhgs.get(name)
    }

    /// Looks up the shadow state for a programmed route.
    pub fn shadow_route(
        &self,
        vrf_id: VirtualRouterOid,
        prefix: &IpPrefix,
    ) -> Option<&FgNextHopGroupEntry> {
        self.syncd_fg_routes
            .get(&vrf_id)
            .and_then(|table| table.get(prefix))
    }

    /// Number of configuration entries awaiting processing or retry.
    pub fn pending_config_count(&self) -> usize {
        self.group_consumer.pending_count()
            + self.prefix_consumer.pending_count()
            + self.member_consumer.pending_count()
    }

    /// Access to the group/member resource counters.
    pub fn nhg_api(&self) -> &NextHopGroupApi {
        &self.nhg_api
    }

    // ------------------------------------------------------------------
    // Route pipeline contract
    // ------------------------------------------------------------------

    /// Decides whether a route belongs to the fine-grained path.
    ///
    /// True iff fine-grained groups are configured, the route lives in
    /// the default VRF, and either the prefix is bound to a group or
    /// every next hop belongs to the same nexthop-based group.
    pub async fn is_route_fine_grained(
        &self,
        vrf_id: VirtualRouterOid,
        prefix: &IpPrefix,
        nhg_key: &NextHopGroupKey,
    ) -> bool {
        if !self.fine_grained_configured
            || vrf_id != self.vrf.read().await.default_vrf_id()
        {
            return false;
        }

        if self.fg_prefixes.contains_key(prefix) {
            return true;
        }
        if nhg_key.is_empty() {
            return false;
        }

        let mut group: Option<&String> = None;
        for nexthop in nhg_key.iter() {
            match self.fg_nexthops.get(nexthop.ip_address()) {
                None => {
                    if group.is_some() {
                        warn!(
                            "Route {}:{} has some FG next hops, but {} is not; \
                             route defaulted to non-fine-grained ECMP",
                            prefix, nhg_key, nexthop
                        );
                    }
                    return false;
                }
                Some(name) => match group {
                    None => group = Some(name),
                    Some(existing) if existing != name => {
                        info!(
                            "FG next hop {} found across groups: expected {}, actual {}",
                            nexthop, existing, name
                        );
                        return false;
                    }
                    _ => {}
                },
            }
        }
        true
    }

    /// Returns true if the fine-grained path currently owns the route.
    pub fn syncd_contains_fg_nhg(&self, vrf_id: VirtualRouterOid, prefix: &IpPrefix) -> bool {
        if !self.fine_grained_configured {
            return false;
        }
        self.syncd_fg_routes
            .get(&vrf_id)
            .map(|table| table.contains_key(prefix))
            .unwrap_or(false)
    }

    /// Programs (or reprograms) a fine-grained route.
    ///
    /// Filters the requested next hops through the eligibility rules
    /// (neighbor resolved, tracked link up, interface-down flag clear),
    /// then drives the distributor over the per-bank membership delta.
    pub async fn set_fg_route(
        &mut self,
        vrf_id: VirtualRouterOid,
        prefix: IpPrefix,
        nhg_key: NextHopGroupKey,
    ) -> TaskResult<FgRouteUpdate> {
        // Unchanged group key: nothing to do
        if let Some(shadow) = self
            .syncd_fg_routes
            .get(&vrf_id)
            .and_then(|table| table.get(&prefix))
        {
            if shadow.nhg_key == nhg_key {
                return Ok(FgRouteUpdate {
                    next_hop_id: shadow.next_hop_id(),
                    next_hop_id_changed: false,
                });
            }
        }

        let name = match self.fg_prefixes.get(&prefix) {
            Some(name) => name.clone(),
            None => {
                let first = nhg_key.first().ok_or_else(|| {
                    TaskError::invalid(format!("route {} has no next hops", prefix))
                })?;
                self.fg_nexthops
                    .get(first.ip_address())
                    .cloned()
                    .ok_or_else(|| {
                        error!(
                            "Route addition {}:{} for non-configured FG ECMP entry",
                            prefix, nhg_key
                        );
                        TaskError::invalid(format!(
                            "no FG group for route {}:{}",
                            prefix, nhg_key
                        ))
                    })?
            }
        };

        let mut entry = self.fg_nhgs.remove(&name).ok_or_else(|| {
            TaskError::invalid(format!("FG group {} disappeared during processing", name))
        })?;
        let result = self
            .set_fg_route_inner(&mut entry, vrf_id, prefix, &nhg_key)
            .await;
        self.fg_nhgs.insert(name, entry);
        result
    }

    async fn set_fg_route_inner(
        &mut self,
        entry: &mut FgNhgEntry,
        vrf_id: VirtualRouterOid,
        prefix: IpPrefix,
        nhg_key: &NextHopGroupKey,
    ) -> TaskResult<FgRouteUpdate> {
        if !self.syncd_fg_routes.contains_key(&vrf_id) {
            self.syncd_fg_routes.insert(vrf_id, HashMap::new());
            self.vrf.write().await.increase_vrf_ref_count(vrf_id);
        }

        if entry.match_mode.is_prefix_based() {
            self.materialize_prefix_based_members(entry, &prefix, nhg_key)
                .await;
        }

        let active_snapshot: HashSet<NextHopKey> = self
            .syncd_fg_routes
            .get(&vrf_id)
            .and_then(|table| table.get(&prefix))
            .map(|shadow| shadow.active_nexthops.clone())
            .unwrap_or_default();

        let mut changes: Vec<BankMemberChanges> =
            vec![BankMemberChanges::default(); entry.bank_count_hint()];
        let mut members_set: HashMap<NextHopKey, NextHopOid> = HashMap::new();
        let mut next_hop_to_add = false;

        {
            let neigh = self.neigh.read().await;
            for nexthop in nhg_key.iter() {
                let ip = *nexthop.ip_address();
                if !neigh.has_next_hop(nexthop) {
                    info!("Next hop {} in {} not resolved yet", nexthop, nhg_key);
                    continue;
                }
                let info = match entry.next_hops.get(&ip) {
                    Some(info) => info,
                    None => {
                        warn!(
                            "Could not find next-hop {} in FG group {}, skipping",
                            nexthop, entry.name
                        );
                        continue;
                    }
                };
                if !info.link_is_up() {
                    info!(
                        "Tracked link {:?} associated with nh {} is down",
                        info.link, nexthop
                    );
                    continue;
                }
                if neigh.is_next_hop_if_down(nexthop) {
                    info!("Next hop {} in {} is down, skipping", nexthop, nhg_key);
                    continue;
                }

                let bank = info.bank as usize;
                if bank >= changes.len() {
                    warn!(
                        "Next-hop {} bank {} out of range for group {}",
                        nexthop, bank, entry.name
                    );
                    continue;
                }

                if !active_snapshot.contains(nexthop) {
                    changes[bank].nhs_to_add.push(nexthop.clone());
                    next_hop_to_add = true;
                }
                members_set.insert(nexthop.clone(), neigh.next_hop_id(nexthop));
            }
        }

        let existing = self
            .syncd_fg_routes
            .get_mut(&vrf_id)
            .and_then(|table| table.remove(&prefix));

        let mut changed = false;
        let shadow = match existing {
            Some(mut shadow) => {
                if shadow.points_to_rif {
                    if next_hop_to_add {
                        // Route regains forwardable members: leave the
                        // RIF for a real group
                        changed = true;
                        if let Err(e) =
                            self.create_fine_grained_next_hop_group(&mut shadow, entry)
                        {
                            self.restore_shadow(vrf_id, prefix, shadow);
                            return Err(e);
                        }
                        if let Err(e) = self.set_new_nhg_members(
                            &mut shadow,
                            entry,
                            &changes,
                            &members_set,
                            &prefix,
                        ) {
                            self.abort_group_initialization(&mut shadow, &prefix);
                            shadow.points_to_rif = true;
                            self.restore_shadow(vrf_id, prefix, shadow);
                            return Err(e);
                        }
                    }
                    shadow
                } else {
                    // Diff the eligible set against what is placed
                    for nexthop in shadow.active_nexthops.clone() {
                        let bank = match entry.bank_of(nexthop.ip_address()) {
                            Some(bank) => bank as usize,
                            None => continue,
                        };
                        if bank >= changes.len() {
                            continue;
                        }
                        if !members_set.contains_key(&nexthop) {
                            changes[bank].nhs_to_del.push(nexthop);
                        } else {
                            changes[bank].active_nhs.push(nexthop);
                        }
                    }

                    if let Err(e) = self
                        .compute_and_set_hash_bucket_changes(
                            &mut shadow,
                            entry,
                            &changes,
                            &members_set,
                            vrf_id,
                            &prefix,
                        )
                        .await
                    {
                        self.restore_shadow(vrf_id, prefix, shadow);
                        return Err(e);
                    }
                    shadow
                }
            }
            None => {
                changed = true;
                if next_hop_to_add {
                    let mut shadow = FgNextHopGroupEntry::default();
                    self.create_fine_grained_next_hop_group(&mut shadow, entry)?;
                    if let Err(e) = self.set_new_nhg_members(
                        &mut shadow,
                        entry,
                        &changes,
                        &members_set,
                        &prefix,
                    ) {
                        self.abort_group_initialization(&mut shadow, &prefix);
                        return Err(e);
                    }
                    shadow
                } else {
                    // No next hop is forwardable yet: point the route at
                    // the router interface so the kernel resolves
                    // neighbors for us
                    let alias = nhg_key
                        .first()
                        .map(|nh| nh.alias().to_string())
                        .ok_or_else(|| {
                            TaskError::invalid(format!(
                                "route {} has no next hops",
                                prefix
                            ))
                        })?;
                    let rif_id = self.intfs.read().await.router_intfs_id(&alias);
                    if rif_id.is_null() {
                        info!("Failed to get rif next hop {} for {}", nhg_key, prefix);
                        return Err(TaskError::retry(format!(
                            "router interface for {} not available",
                            alias
                        )));
                    }
                    FgNextHopGroupEntry::new_rif(nhg_key.clone(), rif_id)
                }
            }
        };

        let mut shadow = shadow;
        shadow.nhg_key = nhg_key.clone();
        let next_hop_id = shadow.next_hop_id();
        self.restore_shadow(vrf_id, prefix, shadow);

        {
            let mut neigh = self.neigh.write().await;
            for change in &changes {
                for nexthop in &change.nhs_to_add {
                    neigh.increase_next_hop_ref_count(nexthop);
                    info!("FG nh {} for prefix {} is up", nexthop, prefix);
                }
                for nexthop in &change.nhs_to_del {
                    neigh.decrease_next_hop_ref_count(nexthop);
                    info!("FG nh {} for prefix {} is down", nexthop, prefix);
                }
            }
        }

        Ok(FgRouteUpdate {
            next_hop_id,
            next_hop_id_changed: changed,
        })
    }

    /// Synthesizes prefix-based group members from the route's next-hop
    /// set, up to the configured cap, and installs their link bindings.
    async fn materialize_prefix_based_members(
        &self,
        entry: &mut FgNhgEntry,
        prefix: &IpPrefix,
        nhg_key: &NextHopGroupKey,
    ) {
        let max_next_hops = entry.match_mode.max_next_hops();
        let neigh = self.neigh.read().await;
        let ports = self.ports.read().await;

        for nexthop in nhg_key.iter() {
            let ip = *nexthop.ip_address();
            if entry.next_hops.contains_key(&ip) {
                continue;
            }
            if entry.next_hops.len() as u32 >= max_next_hops {
                warn!(
                    "Next-hop {} exceeds max_next_hops {} for prefix {}, skipping",
                    nexthop, max_next_hops, prefix
                );
                continue;
            }

            // Prefix-based groups use a single bank
            let mut fg_info = super::types::FgNextHopInfo::new(0);
            if neigh.has_next_hop(nexthop) {
                match ports.get_port(nexthop.alias()) {
                    Some(port) if port.port_type.is_physical() => {
                        fg_info.link = Some(port.alias.clone());
                        fg_info.link_oper_state = port.oper_status;
                        entry
                            .links
                            .entry(port.alias.clone())
                            .or_default()
                            .push(ip);
                    }
                    Some(_) => {}
                    None => {
                        warn!(
                            "Next-hop {} prefix {}: link not found",
                            nexthop, prefix
                        );
                    }
                }
            }
            entry.next_hops.insert(ip, fg_info);
            info!(
                "Next-hop {} added to fine grained member list for prefix {}",
                nexthop, prefix
            );
        }
    }

    /// Tears down the fine-grained state for a route. Idempotent.
    pub async fn remove_fg_route(
        &mut self,
        vrf_id: VirtualRouterOid,
        prefix: IpPrefix,
    ) -> TaskResult<()> {
        if !self.fine_grained_configured {
            return Ok(());
        }

        let Some(mut shadow) = self
            .syncd_fg_routes
            .get_mut(&vrf_id)
            .and_then(|table| table.remove(&prefix))
        else {
            info!("No FG route entry for {}, nothing to remove", prefix);
            return Ok(());
        };

        if !shadow.points_to_rif {
            if let Err(e) = self.remove_fine_grained_next_hop_group(&mut shadow) {
                error!("Failed to clean up fine grained ECMP group for {}", prefix);
                self.restore_shadow(vrf_id, prefix, shadow);
                return Err(e);
            }
            {
                let mut neigh = self.neigh.write().await;
                for nexthop in &shadow.active_nexthops {
                    neigh.decrease_next_hop_ref_count(nexthop);
                }
            }
            self.journal_del(&prefix);
        }

        if self
            .syncd_fg_routes
            .get(&vrf_id)
            .map(|table| table.is_empty())
            .unwrap_or(false)
        {
            self.syncd_fg_routes.remove(&vrf_id);
            self.vrf.write().await.decrease_vrf_ref_count(vrf_id);
        }

        info!("Removed FG route for prefix {}", prefix);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Member up/down paths
    // ------------------------------------------------------------------

    /// Places a next-hop that became forwardable into every group that
    /// references it.
    pub async fn valid_next_hop_in_next_hop_group(
        &mut self,
        nexthop: &NextHopKey,
    ) -> TaskResult<()> {
        let route_keys = self.routes_referencing(nexthop);

        for (vrf_id, prefix) in route_keys {
            let Some(name) = self.group_name_for(&prefix, nexthop) else {
                error!(
                    "Next hop {} up event for non-configured FG ECMP entry {}",
                    nexthop, prefix
                );
                return Err(TaskError::invalid(format!(
                    "no FG group for {}",
                    prefix
                )));
            };
            let Some(mut entry) = self.fg_nhgs.remove(&name) else {
                return Err(TaskError::invalid(format!("FG group {} missing", name)));
            };
            let Some(mut shadow) = self
                .syncd_fg_routes
                .get_mut(&vrf_id)
                .and_then(|table| table.remove(&prefix))
            else {
                self.fg_nhgs.insert(name, entry);
                continue;
            };

            let result = self
                .valid_nh_inner(&mut entry, &mut shadow, vrf_id, &prefix, nexthop)
                .await;
            self.restore_shadow(vrf_id, prefix, shadow);
            self.fg_nhgs.insert(name, entry);
            result?;

            info!("FG nh {} for prefix {} is up", nexthop, prefix);
        }

        Ok(())
    }

    async fn valid_nh_inner(
        &mut self,
        entry: &mut FgNhgEntry,
        shadow: &mut FgNextHopGroupEntry,
        vrf_id: VirtualRouterOid,
        prefix: &IpPrefix,
        nexthop: &NextHopKey,
    ) -> TaskResult<()> {
        if shadow.active_nexthops.contains(nexthop) {
            return Ok(());
        }

        let mut changes: Vec<BankMemberChanges> =
            vec![BankMemberChanges::default(); entry.bank_count_hint()];
        let mut members_set: HashMap<NextHopKey, NextHopOid> = HashMap::new();

        {
            let neigh = self.neigh.read().await;
            let oid = neigh.next_hop_id(nexthop);
            if oid.is_null() {
                return Err(TaskError::invalid(format!(
                    "next hop {} has no HAL handle",
                    nexthop
                )));
            }
            members_set.insert(nexthop.clone(), oid);
            for active in &shadow.active_nexthops {
                members_set.insert(active.clone(), neigh.next_hop_id(active));
            }
        }

        let bank = entry.bank_of(nexthop.ip_address()).ok_or_else(|| {
            TaskError::invalid(format!("next hop {} not a member of {}", nexthop, entry.name))
        })? as usize;
        if bank >= changes.len() {
            return Err(TaskError::invalid(format!(
                "next hop {} bank {} out of range for {}",
                nexthop, bank, entry.name
            )));
        }
        changes[bank].nhs_to_add.push(nexthop.clone());

        if shadow.points_to_rif {
            // RIF route is now neighbor-resolved: create the group
            self.create_fine_grained_next_hop_group(shadow, entry)?;
            if let Err(e) =
                self.set_new_nhg_members(shadow, entry, &changes, &members_set, prefix)
            {
                self.abort_group_initialization(shadow, prefix);
                shadow.points_to_rif = true;
                return Err(e);
            }
            self.modify_routes_next_hop_id(vrf_id, prefix, shadow.next_hop_id())?;
        } else {
            for active in shadow.active_nexthops.clone() {
                let Some(active_bank) = entry.bank_of(active.ip_address()) else {
                    continue;
                };
                if (active_bank as usize) < changes.len() {
                    changes[active_bank as usize].active_nhs.push(active);
                }
            }
            self.compute_and_set_hash_bucket_changes(
                shadow,
                entry,
                &changes,
                &members_set,
                vrf_id,
                prefix,
            )
            .await?;
        }

        self.neigh.write().await.increase_next_hop_ref_count(nexthop);
        Ok(())
    }

    /// Withdraws a next-hop that stopped being forwardable from every
    /// group that placed it.
    pub async fn invalid_next_hop_in_next_hop_group(
        &mut self,
        nexthop: &NextHopKey,
    ) -> TaskResult<()> {
        let route_keys = self.routes_referencing(nexthop);

        for (vrf_id, prefix) in route_keys {
            let Some(name) = self.group_name_for(&prefix, nexthop) else {
                error!(
                    "Next hop {} down event for non-configured FG ECMP entry {}",
                    nexthop, prefix
                );
                return Err(TaskError::invalid(format!(
                    "no FG group for {}",
                    prefix
                )));
            };
            let Some(mut entry) = self.fg_nhgs.remove(&name) else {
                return Err(TaskError::invalid(format!("FG group {} missing", name)));
            };
            let Some(mut shadow) = self
                .syncd_fg_routes
                .get_mut(&vrf_id)
                .and_then(|table| table.remove(&prefix))
            else {
                self.fg_nhgs.insert(name, entry);
                continue;
            };

            let result = self
                .invalid_nh_inner(&mut entry, &mut shadow, vrf_id, &prefix, nexthop)
                .await;
            self.restore_shadow(vrf_id, prefix, shadow);
            self.fg_nhgs.insert(name, entry);
            result?;

            info!("FG nh {} for prefix {} is down", nexthop, prefix);
        }

        Ok(())
    }

    async fn invalid_nh_inner(
        &mut self,
        entry: &mut FgNhgEntry,
        shadow: &mut FgNextHopGroupEntry,
        vrf_id: VirtualRouterOid,
        prefix: &IpPrefix,
        nexthop: &NextHopKey,
    ) -> TaskResult<()> {
        if !shadow.active_nexthops.contains(nexthop) {
            return Ok(());
        }

        let mut changes: Vec<BankMemberChanges> =
            vec![BankMemberChanges::default(); entry.bank_count_hint()];
        let mut members_set: HashMap<NextHopKey, NextHopOid> = HashMap::new();

        {
            let neigh = self.neigh.read().await;
            for active in &shadow.active_nexthops {
                if active == nexthop {
                    continue;
                }
                let Some(active_bank) = entry.bank_of(active.ip_address()) else {
                    continue;
                };
                if (active_bank as usize) < changes.len() {
                    changes[active_bank as usize].active_nhs.push(active.clone());
                    members_set.insert(active.clone(), neigh.next_hop_id(active));
                }
            }
        }

        let bank = entry.bank_of(nexthop.ip_address()).ok_or_else(|| {
            TaskError::invalid(format!("next hop {} not a member of {}", nexthop, entry.name))
        })? as usize;
        if bank >= changes.len() {
            return Err(TaskError::invalid(format!(
                "next hop {} bank {} out of range for {}",
                nexthop, bank, entry.name
            )));
        }
        changes[bank].nhs_to_del.push(nexthop.clone());

        self.compute_and_set_hash_bucket_changes(
            shadow,
            entry,
            &changes,
            &members_set,
            vrf_id,
            prefix,
        )
        .await?;

        self.neigh.write().await.decrease_next_hop_ref_count(nexthop);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Link reactor
    // ------------------------------------------------------------------

    /// Translates a port oper-state change into per-next-hop up/down
    /// transitions for every group tracking the port.
    pub async fn update_port_oper_state(&mut self, update: &PortOperStateUpdate) {
        let alias = update.port.alias.clone();
        let oper = update.oper_status;

        let mut affected: Vec<IpAddress> = Vec::new();
        for entry in self.fg_nhgs.values_mut() {
            let Some(ips) = entry.links.get(&alias).cloned() else {
                continue;
            };
            for ip in ips {
                match entry.next_hops.get_mut(&ip) {
                    Some(info) => {
                        info.link_oper_state = oper;
                        info!(
                            "Updated {} associated with {} to state {}",
                            alias, ip, oper
                        );
                        affected.push(ip);
                    }
                    None => warn!("Hit unexpected condition where structs are out of sync"),
                }
            }
        }

        for ip in affected {
            let neighbor = self.neigh.read().await.get_neighbor_entry(&ip);
            let Some((nexthop, _mac)) = neighbor else {
                continue;
            };
            let result = if oper.is_up() {
                self.valid_next_hop_in_next_hop_group(&nexthop).await
            } else {
                self.invalid_next_hop_in_next_hop_group(&nexthop).await
            };
            if let Err(e) = result {
                warn!("Failed to update FG membership for nh {}: {}", nexthop, e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Configuration handlers
    // ------------------------------------------------------------------

    fn do_task_fg_nhg(&mut self, t: &KeyOpFieldsValues) -> TaskStatus {
        let name = t.key.clone();

        match t.op {
            Operation::Set => {
                let mut bucket_size = 0u32;
                let mut max_next_hops = 0u32;
                let mut mode = FgMatchMode::RouteBased;

                for (field, value) in &t.fvs {
                    match field.as_str() {
                        "bucket_size" => bucket_size = value.parse().unwrap_or(0),
                        "max_next_hops" => max_next_hops = value.parse().unwrap_or(0),
                        "match_mode" => match value.as_str() {
                            "nexthop-based" => mode = FgMatchMode::NexthopBased,
                            "prefix-based" => {
                                mode = FgMatchMode::PrefixBased { max_next_hops: 0 }
                            }
                            "route-based" => mode = FgMatchMode::RouteBased,
                            other => warn!(
                                "Received unsupported match_mode {}, defaulted to route-based",
                                other
                            ),
                        },
                        _ => {}
                    }
                }
                if let FgMatchMode::PrefixBased { .. } = mode {
                    if max_next_hops == 0 {
                        error!(
                            "Received match_mode prefix-based with max_next_hops 0, \
                             not a supported combination"
                        );
                        return TaskStatus::Handled;
                    }
                    mode = FgMatchMode::PrefixBased { max_next_hops };
                }
                if bucket_size == 0 {
                    error!("Received bucket_size of 0 for key {}", name);
                    return TaskStatus::Handled;
                }

                if self.fg_nhgs.contains_key(&name) {
                    warn!("FG_NHG {} already exists, ignoring", name);
                    return TaskStatus::Handled;
                }

                info!(
                    "Added new FG_NHG entry {} with bucket_size {}, match_mode {:?}",
                    name, bucket_size, mode
                );
                self.fg_nhgs
                    .insert(name.clone(), FgNhgEntry::new(name, bucket_size, mode));
                self.fine_grained_configured = true;
                TaskStatus::Handled
            }
            Operation::Del => {
                let (no_children, prefix_based_clearable) = match self.fg_nhgs.get(&name) {
                    Some(entry) => (
                        entry.prefixes.is_empty() && entry.next_hops.is_empty(),
                        entry.match_mode.is_prefix_based() && entry.prefixes.is_empty(),
                    ),
                    None => {
                        info!("Received delete for non-existent entry {}", name);
                        return TaskStatus::Handled;
                    }
                };

                if no_children {
                    self.fg_nhgs.remove(&name);
                    info!("Deleted FG_NHG {} with no remaining dependencies", name);
                } else if prefix_based_clearable {
                    // Prefix-based members are synthesized, not
                    // configured, so clear them with the group
                    self.fg_nhgs.remove(&name);
                    info!(
                        "Clearing dynamic member entries associated with FG_NHG {}",
                        name
                    );
                } else {
                    info!(
                        "Child prefix/member entries still associated with FG_NHG {}",
                        name
                    );
                    return TaskStatus::Retry;
                }

                if self.fg_nhgs.is_empty() {
                    self.fine_grained_configured = false;
                }
                TaskStatus::Handled
            }
        }
    }

    async fn do_task_fg_nhg_prefix(&mut self, t: &KeyOpFieldsValues) -> TaskStatus {
        let prefix: IpPrefix = match t.key.parse() {
            Ok(prefix) => prefix,
            Err(e) => {
                error!("Invalid FG_NHG_PREFIX key {}: {}", t.key, e);
                return TaskStatus::Handled;
            }
        };

        match t.op {
            Operation::Set => {
                if self.fg_prefixes.contains_key(&prefix) {
                    info!("FG_NHG prefix {} already exists", prefix);
                    return TaskStatus::Handled;
                }

                let Some(name) = t
                    .get_field("FG_NHG")
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                else {
                    error!("Received FG_NHG with empty name for key {}", t.key);
                    return TaskStatus::Handled;
                };

                let (is_prefix_based, has_prefix, is_nexthop_based) =
                    match self.fg_nhgs.get(&name) {
                        Some(entry) => (
                            entry.match_mode.is_prefix_based(),
                            !entry.prefixes.is_empty(),
                            entry.match_mode == FgMatchMode::NexthopBased,
                        ),
                        None => {
                            info!("FG_NHG entry {} not received yet, continue", name);
                            return TaskStatus::Retry;
                        }
                    };

                // A prefix-based group serves exactly one prefix;
                // disjoint next-hop sets per prefix cannot share a group
                if is_prefix_based && has_prefix {
                    info!(
                        "FG_NHG {} already has a bound prefix, ignoring addition of {}",
                        name, prefix
                    );
                    return TaskStatus::Handled;
                }
                if is_nexthop_based {
                    info!(
                        "FG_NHG {} is configured as nexthop-based: FG_NHG_PREFIX is a no-op",
                        name
                    );
                    return TaskStatus::Handled;
                }

                let vrf_id = self.vrf.read().await.default_vrf_id();
                let nhg = self
                    .route_orch
                    .read()
                    .await
                    .syncd_route_nhg_key(vrf_id, &prefix);

                if !self.prefix_add_cache.contains_key(&prefix) {
                    if nhg.is_empty() {
                        info!(
                            "Route {} not in route processor, no migration needed",
                            prefix
                        );
                        self.bind_prefix(prefix, &name);
                        TaskStatus::Handled
                    } else {
                        info!(
                            "Route {} exists in route processor, deleting to begin migration",
                            prefix
                        );
                        self.prefix_add_cache.insert(prefix, nhg);
                        self.route_producer.del(prefix.to_string());
                        TaskStatus::Retry
                    }
                } else if nhg.is_empty() {
                    // Conventional route is gone; bind and replay it so
                    // it comes back through the fine-grained path
                    self.bind_prefix(prefix, &name);
                    if let Some(cached) = self.prefix_add_cache.remove(&prefix) {
                        self.route_producer
                            .set(prefix.to_string(), route_fvs_from_nhg_key(&cached));
                    }
                    info!("Performed APP_DB addition with prefix {}", prefix);
                    TaskStatus::Handled
                } else {
                    info!(
                        "Route {} still in route processor, waiting for delete to complete",
                        prefix
                    );
                    TaskStatus::Retry
                }
            }
            Operation::Del => {
                let Some(name) = self.fg_prefixes.get(&prefix).cloned() else {
                    info!("FG_NHG prefix {} doesn't exist, ignore", prefix);
                    return TaskStatus::Handled;
                };

                let vrf_id = self.vrf.read().await.default_vrf_id();
                let nhg = self
                    .syncd_fg_routes
                    .get(&vrf_id)
                    .and_then(|table| table.get(&prefix))
                    .map(|shadow| shadow.nhg_key.clone())
                    .unwrap_or_default();

                if !self.prefix_del_cache.contains_key(&prefix) {
                    if nhg.is_empty() {
                        info!(
                            "Route {} not owned by fine-grained path, unbinding directly",
                            prefix
                        );
                        self.unbind_prefix(&prefix, &name);
                        TaskStatus::Handled
                    } else {
                        info!(
                            "Route {} owned by fine-grained path, deleting to begin migration",
                            prefix
                        );
                        self.prefix_del_cache.insert(prefix, nhg);
                        self.route_producer.del(prefix.to_string());
                        TaskStatus::Retry
                    }
                } else if nhg.is_empty() {
                    self.unbind_prefix(&prefix, &name);
                    if let Some(cached) = self.prefix_del_cache.remove(&prefix) {
                        self.route_producer
                            .set(prefix.to_string(), route_fvs_from_nhg_key(&cached));
                    }
                    info!("Performed APP_DB addition with prefix {}", prefix);
                    TaskStatus::Handled
                } else {
                    info!(
                        "Route {} still owned by fine-grained path, waiting for delete",
                        prefix
                    );
                    TaskStatus::Retry
                }
            }
        }
    }

    fn bind_prefix(&mut self, prefix: IpPrefix, name: &str) {
        if let Some(entry) = self.fg_nhgs.get_mut(name) {
            entry.prefixes.push(prefix);
        }
        self.fg_prefixes.insert(prefix, name.to_string());
        info!("FG_NHG prefix {} bound to group {}", prefix, name);
    }

    fn unbind_prefix(&mut self, prefix: &IpPrefix, name: &str) {
        if let Some(entry) = self.fg_nhgs.get_mut(name) {
            entry.prefixes.retain(|candidate| candidate != prefix);
        }
        self.fg_prefixes.remove(prefix);
        info!("FG_NHG prefix {} unbound from group {}", prefix, name);
    }

    async fn do_task_fg_nhg_member(&mut self, t: &KeyOpFieldsValues) -> TaskStatus {
        let ip: IpAddress = match t.key.parse() {
            Ok(ip) => ip,
            Err(e) => {
                error!("Invalid FG_NHG_MEMBER key {}: {}", t.key, e);
                return TaskStatus::Handled;
            }
        };

        match t.op {
            Operation::Set => {
                let Some(name) = t
                    .get_field("FG_NHG")
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                else {
                    error!("Received FG_NHG with empty name for key {}", t.key);
                    return TaskStatus::Handled;
                };
                let bank: u32 = match t.get_field("bank") {
                    Some(value) => match value.parse() {
                        Ok(bank) => bank,
                        Err(_) => {
                            error!("Invalid bank {} for FG_NHG_MEMBER {}", value, t.key);
                            return TaskStatus::Handled;
                        }
                    },
                    None => 0,
                };
                let link = t
                    .get_field("link")
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);

                let (exists, is_prefix_based, is_nexthop_based) = match self.fg_nhgs.get(&name)
                {
                    Some(entry) => (
                        entry.next_hops.contains_key(&ip),
                        entry.match_mode.is_prefix_based(),
                        entry.match_mode == FgMatchMode::NexthopBased,
                    ),
                    None => {
                        info!("FG_NHG entry {} not received yet, continue", name);
                        return TaskStatus::Retry;
                    }
                };
                if is_prefix_based {
                    error!(
                        "Received FG_NHG member for prefix-based match_mode, \
                         not a supported operation"
                    );
                    return TaskStatus::Handled;
                }
                if exists {
                    info!("FG_NHG member {} already exists for {}, skip", ip, name);
                    return TaskStatus::Handled;
                }

                let mut fg_info = super::types::FgNextHopInfo::new(bank);
                let mut link_usable = true;
                if let Some(link_alias) = link {
                    let port = self.ports.read().await.get_port(&link_alias).cloned();
                    match port {
                        None => warn!(
                            "FG_NHG member {} added to {} with non-existent link {}, \
                             link mapping skipped",
                            ip, name, link_alias
                        ),
                        Some(port) => {
                            fg_info.link = Some(link_alias.clone());
                            fg_info.link_oper_state = port.oper_status;
                            link_usable = port.oper_status.is_up();
                            info!("Added link {} to ip {} map", link_alias, ip);
                        }
                    }
                }

                if let Some(entry) = self.fg_nhgs.get_mut(&name) {
                    if let Some(link_alias) = &fg_info.link {
                        entry.links.entry(link_alias.clone()).or_default().push(ip);
                    }
                    entry.next_hops.insert(ip, fg_info);
                }
                if is_nexthop_based {
                    info!("Add member {} as nexthop-based", ip);
                    self.fg_nexthops.insert(ip, name.clone());
                }

                let neighbor = self.neigh.read().await.get_neighbor_entry(&ip);
                match neighbor {
                    None => info!("Nexthop {} is not resolved yet", ip),
                    Some((nexthop, _mac)) if link_usable => {
                        if let Err(e) = self.valid_next_hop_in_next_hop_group(&nexthop).await {
                            info!(
                                "Failing member addition for {}: {}; rolling back",
                                nexthop, e
                            );
                            if let Some(entry) = self.fg_nhgs.get_mut(&name) {
                                entry.unlink_next_hop(&ip);
                                entry.next_hops.remove(&ip);
                            }
                            self.fg_nexthops.remove(&ip);
                            return TaskStatus::Retry;
                        }
                    }
                    Some(_) => {}
                }

                info!("FG_NHG member added for group {}, next-hop {}", name, ip);
                TaskStatus::Handled
            }
            Operation::Del => {
                // Withdraw from the HAL first if the next hop is
                // resolved and placed
                let neighbor = self.neigh.read().await.get_neighbor_entry(&ip);
                if let Some((nexthop, _mac)) = neighbor {
                    if let Err(e) = self.invalid_next_hop_in_next_hop_group(&nexthop).await {
                        warn!("Failed to withdraw member {}: {}", nexthop, e);
                        return TaskStatus::Retry;
                    }
                }

                for (name, entry) in self.fg_nhgs.iter_mut() {
                    if entry.next_hops.contains_key(&ip) {
                        entry.unlink_next_hop(&ip);
                        entry.next_hops.remove(&ip);
                        info!(
                            "FG_NHG member removed for group {}, next-hop {}",
                            name, ip
                        );
                        break;
                    }
                }
                self.fg_nexthops.remove(&ip);
                TaskStatus::Handled
            }
        }
    }

    /// Releases every programmed group and purges the journal.
    ///
    /// Cold-shutdown hook; a warm restart must NOT call this, since the
    /// hardware keeps forwarding on the programmed buckets across the
    /// restart.
    pub async fn teardown(&mut self) {
        let route_keys: Vec<(VirtualRouterOid, IpPrefix)> = self
            .syncd_fg_routes
            .iter()
            .flat_map(|(vrf_id, table)| table.keys().map(move |prefix| (*vrf_id, *prefix)))
            .collect();

        for (vrf_id, prefix) in route_keys {
            if let Err(e) = self.remove_fg_route(vrf_id, prefix).await {
                error!("Teardown failed to release route {}: {}", prefix, e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Warm restart
    // ------------------------------------------------------------------

    /// Loads the journal into the recovery map, deleting each record as
    /// it is consumed.
    fn bake_journal(&mut self) -> bool {
        let Ok(mut journal) = self.journal.lock() else {
            error!("Warm reboot: journal store unavailable");
            return false;
        };

        let keys = journal.keys();
        info!("Warm reboot: recovering {} entries from state", keys.len());

        for key in keys {
            let mut recovered: Vec<Option<NextHopKey>> = Vec::new();
            for (field, value) in journal.get(&key) {
                let Ok(index) = field.parse::<usize>() else {
                    warn!("Warm reboot: bad bucket index {} for {}", field, key);
                    continue;
                };
                let Ok(nexthop) = value.parse::<NextHopKey>() else {
                    warn!("Warm reboot: bad next hop {} for {}", value, key);
                    continue;
                };
                if recovered.len() <= index {
                    recovered.resize(index + 1, None);
                }
                info!("Storing next hop {} at index {}", value, index);
                recovered[index] = Some(nexthop);
            }
            self.recovery_map.insert(key.clone(), recovered);
            journal.del(&key);
        }

        true
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(super) fn restore_shadow(
        &mut self,
        vrf_id: VirtualRouterOid,
        prefix: IpPrefix,
        shadow: FgNextHopGroupEntry,
    ) {
        self.syncd_fg_routes
            .entry(vrf_id)
            .or_default()
            .insert(prefix, shadow);
    }

    fn routes_referencing(&self, nexthop: &NextHopKey) -> Vec<(VirtualRouterOid, IpPrefix)> {
        self.syncd_fg_routes
            .iter()
            .flat_map(|(vrf_id, table)| {
                table
                    .iter()
                    .filter(|(_, shadow)| shadow.nhg_key.contains(nexthop))
                    .map(move |(prefix, _)| (*vrf_id, *prefix))
            })
            .collect()
    }

    fn group_name_for(&self, prefix: &IpPrefix, nexthop: &NextHopKey) -> Option<String> {
        self.fg_prefixes
            .get(prefix)
            .cloned()
            .or_else(|| self.fg_nexthops.get(nexthop.ip_address()).cloned())
    }
}

#[async_trait]
impl Orch for FgNhgOrch {
    fn name(&self) -> &str {
        "FgNhgOrch"
    }

    async fn do_task(&mut self) {
        let entries = self.group_consumer.drain();
        for t in entries {
            if self.do_task_fg_nhg(&t).needs_retry() {
                self.group_consumer.retry(t);
            }
        }

        let entries = self.prefix_consumer.drain();
        for t in entries {
            if self.do_task_fg_nhg_prefix(&t).await.needs_retry() {
                self.prefix_consumer.retry(t);
            }
        }

        let entries = self.member_consumer.drain();
        for t in entries {
            if self.do_task_fg_nhg_member(&t).await.needs_retry() {
                self.member_consumer.retry(t);
            }
        }
    }

    fn bake(&mut self) -> bool {
        self.bake_journal()
    }

    fn has_pending_tasks(&self) -> bool {
        self.pending_config_count() > 0
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        let mut pending = self.group_consumer.dump();
        pending.extend(self.prefix_consumer.dump());
        pending.extend(self.member_consumer.dump());
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_sai::vs::VirtualSwitch;
    use sonic_types::PortType;

    fn make_orch() -> FgNhgOrch {
        let backend: SharedBackend = Arc::new(Mutex::new(VirtualSwitch::new()));
        let journal = Arc::new(Mutex::new(StateTable::new(super::super::STATE_FG_ROUTE_TABLE_NAME)));
        FgNhgOrch::new(
            backend,
            journal,
            Arc::new(RwLock::new(NeighOrch::new())),
            Arc::new(RwLock::new(IntfsOrch::new())),
            Arc::new(RwLock::new(PortsOrch::new())),
            Arc::new(RwLock::new(VrfOrch::new())),
            Arc::new(RwLock::new(RouteOrch::new())),
            RouteTableProducer::new(),
        )
    }

    fn fv(field: &str, value: &str) -> (String, String) {
        (field.to_string(), value.to_string())
    }

    #[tokio::test]
    async fn test_group_config_add() {
        let mut orch = make_orch();
        orch.add_config(
            CFG_FG_NHG,
            vec![KeyOpFieldsValues::set(
                "fgnhg_v4",
                vec![fv("bucket_size", "120"), fv("match_mode", "nexthop-based")],
            )],
        );
        orch.do_task().await;

        let entry = orch.group("fgnhg_v4").unwrap();
        assert_eq!(entry.configured_bucket_size, 120);
        assert_eq!(entry.match_mode, FgMatchMode::NexthopBased);
        assert!(orch.is_fine_grained_configured());
        assert_eq!(orch.pending_config_count(), 0);
    }

    #[tokio::test]
    async fn test_group_config_zero_bucket_size_consumed() {
        let mut orch = make_orch();
        orch.add_config(
            CFG_FG_NHG,
            vec![KeyOpFieldsValues::set(
                "fgnhg_v4",
                vec![fv("bucket_size", "0")],
            )],
        );
        orch.do_task().await;

        // Invalid entry is logged and consumed, not retried
        assert!(orch.group("fgnhg_v4").is_none());
        assert_eq!(orch.pending_config_count(), 0);
        assert!(!orch.is_fine_grained_configured());
    }

    #[tokio::test]
    async fn test_group_config_prefix_based_requires_max_next_hops() {
        let mut orch = make_orch();
        orch.add_config(
            CFG_FG_NHG,
            vec![KeyOpFieldsValues::set(
                "fgnhg_prefix",
                vec![fv("bucket_size", "100"), fv("match_mode", "prefix-based")],
            )],
        );
        orch.do_task().await;

        assert!(orch.group("fgnhg_prefix").is_none());
        assert_eq!(orch.pending_config_count(), 0);
    }

    #[tokio::test]
    async fn test_member_before_group_retries() {
        let mut orch = make_orch();
        orch.add_config(
            CFG_FG_NHG_MEMBER,
            vec![KeyOpFieldsValues::set(
                "10.0.0.1",
                vec![fv("FG_NHG", "fgnhg_v4"), fv("bank", "0")],
            )],
        );
        orch.do_task().await;

        // Deferred until the group appears
        assert_eq!(orch.pending_config_count(), 1);

        orch.add_config(
            CFG_FG_NHG,
            vec![KeyOpFieldsValues::set(
                "fgnhg_v4",
                vec![fv("bucket_size", "60"), fv("match_mode", "nexthop-based")],
            )],
        );
        orch.do_task().await;

        assert_eq!(orch.pending_config_count(), 0);
        let entry = orch.group("fgnhg_v4").unwrap();
        let ip: IpAddress = "10.0.0.1".parse().unwrap();
        assert!(entry.next_hops.contains_key(&ip));
        assert_eq!(orch.fg_nexthops.get(&ip), Some(&"fgnhg_v4".to_string()));
    }

    #[tokio::test]
    async fn test_member_for_prefix_based_group_rejected() {
        let mut orch = make_orch();
        orch.add_config(
            CFG_FG_NHG,
            vec![KeyOpFieldsValues::set(
                "fgnhg_prefix",
                vec![
                    fv("bucket_size", "100"),
                    fv("match_mode", "prefix-based"),
                    fv("max_next_hops", "4"),
                ],
            )],
        );
        orch.add_config(
            CFG_FG_NHG_MEMBER,
            vec![KeyOpFieldsValues::set(
                "10.0.0.1",
                vec![fv("FG_NHG", "fgnhg_prefix"), fv("bank", "0")],
            )],
        );
        orch.do_task().await;

        // Consumed with an error, never applied
        assert_eq!(orch.pending_config_count(), 0);
        assert!(orch.group("fgnhg_prefix").unwrap().next_hops.is_empty());
    }

    #[tokio::test]
    async fn test_member_with_tracked_link_seeds_oper_state() {
        let mut orch = make_orch();
        orch.ports.write().await.add_port("Ethernet0", PortType::Phy);

        orch.add_config(
            CFG_FG_NHG,
            vec![KeyOpFieldsValues::set(
                "fgnhg_v4",
                vec![fv("bucket_size", "60"), fv("match_mode", "nexthop-based")],
            )],
        );
        orch.add_config(
            CFG_FG_NHG_MEMBER,
            vec![KeyOpFieldsValues::set(
                "10.0.0.1",
                vec![
                    fv("FG_NHG", "fgnhg_v4"),
                    fv("bank", "0"),
                    fv("link", "Ethernet0"),
                ],
            )],
        );
        orch.do_task().await;

        let entry = orch.group("fgnhg_v4").unwrap();
        let ip: IpAddress = "10.0.0.1".parse().unwrap();
        let info = entry.next_hops.get(&ip).unwrap();
        assert_eq!(info.link.as_deref(), Some("Ethernet0"));
        // The port exists but is oper-down, so the member starts down
        assert!(!info.link_is_up());
        assert_eq!(entry.links.get("Ethernet0"), Some(&vec![ip]));
    }

    #[tokio::test]
    async fn test_group_delete_blocked_by_children() {
        let mut orch = make_orch();
        orch.add_config(
            CFG_FG_NHG,
            vec![KeyOpFieldsValues::set(
                "fgnhg_v4",
                vec![fv("bucket_size", "60"), fv("match_mode", "nexthop-based")],
            )],
        );
        orch.add_config(
            CFG_FG_NHG_MEMBER,
            vec![KeyOpFieldsValues::set(
                "10.0.0.1",
                vec![fv("FG_NHG", "fgnhg_v4"), fv("bank", "0")],
            )],
        );
        orch.do_task().await;

        orch.add_config(CFG_FG_NHG, vec![KeyOpFieldsValues::del("fgnhg_v4")]);
        orch.do_task().await;

        // Delete deferred while the member child exists
        assert!(orch.group("fgnhg_v4").is_some());
        assert_eq!(orch.pending_config_count(), 1);

        orch.add_config(CFG_FG_NHG_MEMBER, vec![KeyOpFieldsValues::del("10.0.0.1")]);
        orch.do_task().await;
        // The deferred group delete completes once the member is gone
        orch.do_task().await;

        assert!(orch.group("fgnhg_v4").is_none());
        assert!(!orch.is_fine_grained_configured());
        assert_eq!(orch.pending_config_count(), 0);
    }

    #[tokio::test]
    async fn test_is_route_fine_grained_nexthop_based() {
        let mut orch = make_orch();
        orch.add_config(
            CFG_FG_NHG,
            vec![KeyOpFieldsValues::set(
                "fgnhg_v4",
                vec![fv("bucket_size", "60"), fv("match_mode", "nexthop-based")],
            )],
        );
        orch.add_config(
            CFG_FG_NHG_MEMBER,
            vec![
                KeyOpFieldsValues::set(
                    "10.0.0.1",
                    vec![fv("FG_NHG", "fgnhg_v4"), fv("bank", "0")],
                ),
                KeyOpFieldsValues::set(
                    "10.0.0.2",
                    vec![fv("FG_NHG", "fgnhg_v4"), fv("bank", "1")],
                ),
            ],
        );
        orch.do_task().await;

        let vrf_id = orch.vrf.read().await.default_vrf_id();
        let prefix: IpPrefix = "10.50.0.0/16".parse().unwrap();

        let all_members: NextHopGroupKey =
            "10.0.0.1@Ethernet0,10.0.0.2@Ethernet4".parse().unwrap();
        assert!(orch.is_route_fine_grained(vrf_id, &prefix, &all_members).await);

        let mixed: NextHopGroupKey =
            "10.0.0.1@Ethernet0,10.9.9.9@Ethernet8".parse().unwrap();
        assert!(!orch.is_route_fine_grained(vrf_id, &prefix, &mixed).await);

        let empty = NextHopGroupKey::new();
        assert!(!orch.is_route_fine_grained(vrf_id, &prefix, &empty).await);

        let other_vrf = sonic_sai::VirtualRouterOid::from_raw(0x999).unwrap();
        assert!(
            !orch
                .is_route_fine_grained(other_vrf, &prefix, &all_members)
                .await
        );
    }
}
