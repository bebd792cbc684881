//! Port type definitions for SONiC switch ports.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of switch port.
///
/// Corresponds to SAI port types used in the SONiC control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Physical front-panel port.
    Phy,
    /// Management port (out-of-band).
    Mgmt,
    /// VLAN interface (SVI).
    Vlan,
    /// Link Aggregation Group (LAG/Port-channel).
    Lag,
}

impl PortType {
    /// Returns true if this is a physical port type.
    pub const fn is_physical(&self) -> bool {
        matches!(self, PortType::Phy)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortType::Phy => "phy",
            PortType::Mgmt => "mgmt",
            PortType::Vlan => "vlan",
            PortType::Lag => "lag",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PortType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phy" => Ok(PortType::Phy),
            "mgmt" => Ok(PortType::Mgmt),
            "vlan" => Ok(PortType::Vlan),
            "lag" => Ok(PortType::Lag),
            _ => Err(ParseError::InvalidPortType(s.to_string())),
        }
    }
}

/// Operational state of a port or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    /// Port is operationally down (default).
    #[default]
    Down,
    /// Port is operationally up.
    Up,
}

impl OperState {
    /// Returns true if the port is operationally up.
    pub const fn is_up(&self) -> bool {
        matches!(self, OperState::Up)
    }

    /// Returns true if the port is operationally down.
    pub const fn is_down(&self) -> bool {
        matches!(self, OperState::Down)
    }
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperState::Up => write!(f, "up"),
            OperState::Down => write!(f, "down"),
        }
    }
}

impl FromStr for OperState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(OperState::Up),
            "down" => Ok(OperState::Down),
            _ => Err(ParseError::InvalidPortType(format!(
                "invalid oper state: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_port_type_classification() {
        assert!(PortType::Phy.is_physical());
        assert!(!PortType::Vlan.is_physical());
        assert!(!PortType::Lag.is_physical());
    }

    #[test]
    fn test_port_type_parse() {
        assert_eq!("phy".parse::<PortType>().unwrap(), PortType::Phy);
        assert_eq!("PHY".parse::<PortType>().unwrap(), PortType::Phy);
        assert!("bogus".parse::<PortType>().is_err());
    }

    #[test]
    fn test_oper_state() {
        assert!(OperState::Up.is_up());
        assert!(OperState::Down.is_down());
        assert_eq!("up".parse::<OperState>().unwrap(), OperState::Up);
        assert_eq!(OperState::Down.to_string(), "down");
    }
}
