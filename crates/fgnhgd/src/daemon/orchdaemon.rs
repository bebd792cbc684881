//! OrchDaemon implementation.
//!
//! The daemon owns the manager and its collaborators and serializes
//! every mutating path through one cooperative loop: configuration
//! entries, route updates and port oper-state events all run to
//! completion (or are deferred intact) before the next event starts.
//!
//! Route entries the fine-grained prefix handlers publish through the
//! producer are looped back into the route consumer, so a migration's
//! delete/re-add completes through the same dispatch as any other route.

use log::{error, info};
use sonic_orch_common::{Consumer, KeyOpFieldsValues, Operation, Orch, StateTable, TaskError};
use sonic_sai::api::route::RouteEntry;
use sonic_sai::api::RouteApi;
use sonic_sai::SharedBackend;
use sonic_types::{IpAddress, IpPrefix, OperState};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::fg_nhg::FgNhgOrch;
use crate::intfs::IntfsOrch;
use crate::neigh::NeighOrch;
use crate::ports::PortsOrch;
use crate::route::{NextHopGroupKey, NextHopKey, RouteOrch, RouteTableProducer, APP_ROUTE_TABLE_NAME};
use crate::vrf::VrfOrch;

/// Upper bound on dispatch passes per drain; deferred entries whose
/// dependencies have not appeared by then wait for the next tick.
const MAX_DISPATCH_PASSES: usize = 16;

/// Parses the `nexthop`/`ifname` fields of a route table entry.
fn parse_route_nhg(entry: &KeyOpFieldsValues) -> Result<NextHopGroupKey, String> {
    let nexthops = entry.get_field("nexthop").unwrap_or("");
    let ifnames = entry.get_field("ifname").unwrap_or("");

    let ips: Vec<&str> = nexthops.split(',').filter(|s| !s.is_empty()).collect();
    let aliases: Vec<&str> = ifnames.split(',').filter(|s| !s.is_empty()).collect();
    if ips.len() != aliases.len() {
        return Err(format!(
            "next hop count {} does not match ifname count {}",
            ips.len(),
            aliases.len()
        ));
    }

    let mut key = NextHopGroupKey::new();
    for (ip, alias) in ips.iter().zip(aliases.iter()) {
        let ip: IpAddress = ip
            .trim()
            .parse()
            .map_err(|e| format!("bad nexthop {}: {}", ip, e))?;
        key.add(NextHopKey::new(ip, alias.trim()));
    }
    Ok(key)
}

/// The main orchestration daemon.
pub struct OrchDaemon {
    fg_nhg: FgNhgOrch,
    route_orch: Arc<RwLock<RouteOrch>>,
    neigh: Arc<RwLock<NeighOrch>>,
    intfs: Arc<RwLock<IntfsOrch>>,
    ports: Arc<RwLock<PortsOrch>>,
    vrf: Arc<RwLock<VrfOrch>>,
    route_api: RouteApi,
    route_consumer: Consumer,
    route_producer: RouteTableProducer,
    fatal_failure: bool,
}

impl OrchDaemon {
    /// Wires up the manager and its collaborators over the given switch
    /// backend and journal store.
    pub fn new(backend: SharedBackend, journal: Arc<Mutex<StateTable>>) -> Self {
        let route_orch = Arc::new(RwLock::new(RouteOrch::new()));
        let neigh = Arc::new(RwLock::new(NeighOrch::new()));
        let intfs = Arc::new(RwLock::new(IntfsOrch::new()));
        let ports = Arc::new(RwLock::new(PortsOrch::new()));
        let vrf = Arc::new(RwLock::new(VrfOrch::new()));
        let route_producer = RouteTableProducer::new();

        let fg_nhg = FgNhgOrch::new(
            Arc::clone(&backend),
            journal,
            Arc::clone(&neigh),
            Arc::clone(&intfs),
            Arc::clone(&ports),
            Arc::clone(&vrf),
            Arc::clone(&route_orch),
            route_producer.clone(),
        );

        Self {
            fg_nhg,
            route_orch,
            neigh,
            intfs,
            ports,
            vrf,
            route_api: RouteApi::new(backend),
            route_consumer: Consumer::new(APP_ROUTE_TABLE_NAME),
            route_producer,
            fatal_failure: false,
        }
    }

    /// Recovers warm-restart state before the first dispatch.
    pub fn warm_start(&mut self) -> bool {
        self.fg_nhg.bake()
    }

    /// The fine-grained manager.
    pub fn fg_nhg(&self) -> &FgNhgOrch {
        &self.fg_nhg
    }

    /// Mutable access to the fine-grained manager.
    pub fn fg_nhg_mut(&mut self) -> &mut FgNhgOrch {
        &mut self.fg_nhg
    }

    /// Shared handle to the neighbor layer.
    pub fn neigh_orch(&self) -> Arc<RwLock<NeighOrch>> {
        Arc::clone(&self.neigh)
    }

    /// Shared handle to the router interface layer.
    pub fn intfs_orch(&self) -> Arc<RwLock<IntfsOrch>> {
        Arc::clone(&self.intfs)
    }

    /// Shared handle to the port layer.
    pub fn ports_orch(&self) -> Arc<RwLock<PortsOrch>> {
        Arc::clone(&self.ports)
    }

    /// Shared handle to the virtual router layer.
    pub fn vrf_orch(&self) -> Arc<RwLock<VrfOrch>> {
        Arc::clone(&self.vrf)
    }

    /// Shared handle to the route processor.
    pub fn route_orch(&self) -> Arc<RwLock<RouteOrch>> {
        Arc::clone(&self.route_orch)
    }

    /// True once a fatal HAL failure has been observed.
    pub fn fatal_failure(&self) -> bool {
        self.fatal_failure
    }

    /// Queues fine-grained configuration entries.
    pub fn apply_fg_config(&mut self, table: &str, entries: Vec<KeyOpFieldsValues>) {
        self.fg_nhg.add_config(table, entries);
    }

    /// Queues application route table entries.
    pub fn apply_route_update(&mut self, entries: Vec<KeyOpFieldsValues>) {
        self.route_consumer.add_to_sync(entries);
    }

    /// Applies a port oper-state change and runs the link reactor.
    pub async fn port_oper_state_change(&mut self, alias: &str, oper_status: OperState) {
        let update = self.ports.write().await.set_oper_status(alias, oper_status);
        if let Some(update) = update {
            self.fg_nhg.update_port_oper_state(&update).await;
        }
    }

    /// Dispatches queued work until quiescent or until only deferred
    /// entries remain.
    pub async fn drain(&mut self) {
        let mut last_signature = None;

        for _ in 0..MAX_DISPATCH_PASSES {
            self.fg_nhg.do_task().await;
            self.loopback_produced_routes();
            self.process_route_updates().await;
            self.loopback_produced_routes();

            let signature = (
                self.fg_nhg.pending_config_count(),
                self.route_consumer.pending_count(),
            );
            if signature == (0, 0) {
                break;
            }
            if last_signature == Some(signature) {
                // Only deferred entries left; their dependencies have
                // to arrive from outside before another pass helps
                break;
            }
            last_signature = Some(signature);
        }
    }

    fn loopback_produced_routes(&mut self) {
        let produced = self.route_producer.drain();
        if !produced.is_empty() {
            self.route_consumer.add_to_sync(produced);
        }
    }

    async fn process_route_updates(&mut self) {
        let entries = self.route_consumer.drain();
        for entry in entries {
            let prefix: IpPrefix = match entry.key.parse() {
                Ok(prefix) => prefix,
                Err(e) => {
                    error!("Invalid route key {}: {}", entry.key, e);
                    continue;
                }
            };
            let vrf_id = self.vrf.read().await.default_vrf_id();

            match entry.op {
                Operation::Set => {
                    let nhg_key = match parse_route_nhg(&entry) {
                        Ok(key) => key,
                        Err(msg) => {
                            error!("Invalid route entry {}: {}", entry.key, msg);
                            continue;
                        }
                    };

                    if self
                        .fg_nhg
                        .is_route_fine_grained(vrf_id, &prefix, &nhg_key)
                        .await
                    {
                        match self.fg_nhg.set_fg_route(vrf_id, prefix, nhg_key).await {
                            Ok(update) => {
                                if update.next_hop_id_changed {
                                    if let Err(e) = self.route_api.set_route_next_hop_id(
                                        &RouteEntry::new(vrf_id, prefix),
                                        update.next_hop_id,
                                    ) {
                                        error!("Failed to program route {}: {}", prefix, e);
                                        self.fatal_failure = true;
                                    }
                                }
                            }
                            Err(TaskError::Retry { reason }) => {
                                info!("Deferring route {}: {}", prefix, reason);
                                self.route_consumer.retry(entry);
                            }
                            Err(TaskError::HalFailure { message }) => {
                                error!("Fatal HAL failure on route {}: {}", prefix, message);
                                self.fatal_failure = true;
                            }
                            Err(e) => error!("Dropping route {}: {}", prefix, e),
                        }
                    } else {
                        self.route_orch
                            .write()
                            .await
                            .add_syncd_route(vrf_id, prefix, nhg_key);
                    }
                }
                Operation::Del => {
                    if self.fg_nhg.syncd_contains_fg_nhg(vrf_id, &prefix) {
                        match self.fg_nhg.remove_fg_route(vrf_id, prefix).await {
                            Ok(()) => {}
                            Err(TaskError::Retry { reason }) => {
                                info!("Deferring route delete {}: {}", prefix, reason);
                                self.route_consumer.retry(entry);
                            }
                            Err(TaskError::HalFailure { message }) => {
                                error!(
                                    "Fatal HAL failure removing route {}: {}",
                                    prefix, message
                                );
                                self.fatal_failure = true;
                            }
                            Err(e) => error!("Failed to remove route {}: {}", prefix, e),
                        }
                    } else {
                        self.route_orch
                            .write()
                            .await
                            .remove_syncd_route(vrf_id, &prefix);
                    }
                }
            }
        }
    }

    /// Releases all programmed HAL state for a cold shutdown.
    pub async fn teardown(&mut self) {
        self.fg_nhg.teardown().await;
    }

    /// Runs the dispatch loop until a fatal failure is observed.
    pub async fn run(&mut self, tick: Duration) {
        info!("Starting fgnhgd event loop");
        let mut interval = tokio::time::interval(tick);

        loop {
            interval.tick().await;
            self.drain().await;
            if self.fatal_failure {
                error!("Fatal HAL failure, stopping event loop");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_sai::vs::VirtualSwitch;

    fn daemon() -> OrchDaemon {
        let backend: SharedBackend = Arc::new(Mutex::new(VirtualSwitch::new()));
        let journal = Arc::new(Mutex::new(StateTable::new("FG_ROUTE_TABLE")));
        OrchDaemon::new(backend, journal)
    }

    #[test]
    fn test_parse_route_nhg() {
        let entry = KeyOpFieldsValues::set(
            "10.50.0.0/16",
            vec![
                ("nexthop".to_string(), "10.0.0.1,10.0.0.2".to_string()),
                ("ifname".to_string(), "Ethernet0,Ethernet4".to_string()),
            ],
        );
        let key = parse_route_nhg(&entry).unwrap();
        assert_eq!(key.len(), 2);
        assert_eq!(key.to_string(), "10.0.0.1@Ethernet0,10.0.0.2@Ethernet4");
    }

    #[test]
    fn test_parse_route_nhg_count_mismatch() {
        let entry = KeyOpFieldsValues::set(
            "10.50.0.0/16",
            vec![
                ("nexthop".to_string(), "10.0.0.1,10.0.0.2".to_string()),
                ("ifname".to_string(), "Ethernet0".to_string()),
            ],
        );
        assert!(parse_route_nhg(&entry).is_err());
    }

    #[tokio::test]
    async fn test_conventional_route_flows_to_route_orch() {
        let mut daemon = daemon();
        daemon.apply_route_update(vec![KeyOpFieldsValues::set(
            "10.50.0.0/16",
            vec![
                ("nexthop".to_string(), "10.0.0.1".to_string()),
                ("ifname".to_string(), "Ethernet0".to_string()),
            ],
        )]);
        daemon.drain().await;

        let vrf_id = daemon.vrf_orch().read().await.default_vrf_id();
        let prefix: IpPrefix = "10.50.0.0/16".parse().unwrap();
        assert!(daemon.route_orch().read().await.has_route(vrf_id, &prefix));

        daemon.apply_route_update(vec![KeyOpFieldsValues::del("10.50.0.0/16")]);
        daemon.drain().await;
        assert!(!daemon.route_orch().read().await.has_route(vrf_id, &prefix));
    }
}
