//! Port types.

use sonic_types::{OperState, PortType};

/// A switch port.
#[derive(Debug, Clone)]
pub struct Port {
    /// Interface alias (e.g., "Ethernet0").
    pub alias: String,
    /// Kind of port; only physical ports are link-tracked.
    pub port_type: PortType,
    /// Current operational state.
    pub oper_status: OperState,
}

impl Port {
    /// Creates a new port, initially oper-down.
    pub fn new(alias: impl Into<String>, port_type: PortType) -> Self {
        Self {
            alias: alias.into(),
            port_type,
            oper_status: OperState::Down,
        }
    }
}

/// Notification emitted when a port's operational state changes.
#[derive(Debug, Clone)]
pub struct PortOperStateUpdate {
    /// The port after the change.
    pub port: Port,
    /// The new operational state.
    pub oper_status: OperState,
}
