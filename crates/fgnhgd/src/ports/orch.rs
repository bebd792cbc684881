//! Port orchestration logic.

use log::info;
use sonic_types::{OperState, PortType};
use std::collections::HashMap;

use super::types::{Port, PortOperStateUpdate};

/// The port table.
pub struct PortsOrch {
    ports: HashMap<String, Port>,
}

impl PortsOrch {
    /// Creates an empty port table.
    pub fn new() -> Self {
        Self {
            ports: HashMap::new(),
        }
    }

    /// Adds a port to the table.
    pub fn add_port(&mut self, alias: impl Into<String>, port_type: PortType) {
        let port = Port::new(alias, port_type);
        self.ports.insert(port.alias.clone(), port);
    }

    /// Looks up a port by alias.
    pub fn get_port(&self, alias: &str) -> Option<&Port> {
        self.ports.get(alias)
    }

    /// Applies an operational state change.
    ///
    /// Returns the notification to fan out to observers, or `None` when
    /// the port is unknown or the state did not change.
    pub fn set_oper_status(
        &mut self,
        alias: &str,
        oper_status: OperState,
    ) -> Option<PortOperStateUpdate> {
        let port = self.ports.get_mut(alias)?;
        if port.oper_status == oper_status {
            return None;
        }

        port.oper_status = oper_status;
        info!("Port {} oper state changed to {}", alias, oper_status);
        Some(PortOperStateUpdate {
            port: port.clone(),
            oper_status,
        })
    }

    /// Number of ports in the table.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }
}

impl Default for PortsOrch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_oper_state_change() {
        let mut orch = PortsOrch::new();
        orch.add_port("Ethernet0", PortType::Phy);

        let update = orch.set_oper_status("Ethernet0", OperState::Up).unwrap();
        assert_eq!(update.oper_status, OperState::Up);
        assert!(update.port.port_type.is_physical());

        // No-op transition produces no notification
        assert!(orch.set_oper_status("Ethernet0", OperState::Up).is_none());
        assert!(orch.set_oper_status("Ethernet99", OperState::Up).is_none());
    }
}
