//! Next-hop key and state flags.
//!
//! A next-hop is a single forwarding destination, identified by an IP
//! address and the interface alias it is reached over.

use sonic_types::IpAddress;
use std::fmt;
use std::str::FromStr;

/// Flags indicating next-hop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NextHopFlags(u32);

impl NextHopFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Interface carrying the next-hop is down.
    pub const IF_DOWN: Self = Self(1 << 0);

    /// Returns true if the interface-down flag is set.
    pub fn is_if_down(&self) -> bool {
        self.0 & Self::IF_DOWN.0 != 0
    }

    /// Sets or clears the interface-down flag.
    pub fn set_if_down(&mut self, down: bool) {
        if down {
            self.0 |= Self::IF_DOWN.0;
        } else {
            self.0 &= !Self::IF_DOWN.0;
        }
    }
}

/// A key identifying a single next-hop (`ip@alias`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NextHopKey {
    ip_address: IpAddress,
    alias: String,
}

impl NextHopKey {
    /// Creates a new next-hop key.
    pub fn new(ip_address: IpAddress, alias: impl Into<String>) -> Self {
        Self {
            ip_address,
            alias: alias.into(),
        }
    }

    /// Returns the IP address.
    pub fn ip_address(&self) -> &IpAddress {
        &self.ip_address
    }

    /// Returns the interface alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl fmt::Display for NextHopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.ip_address, self.alias)
    }
}

/// Error when parsing a NextHopKey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNextHopKeyError {
    pub message: String,
}

impl fmt::Display for ParseNextHopKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid next-hop key: {}", self.message)
    }
}

impl std::error::Error for ParseNextHopKeyError {}

impl FromStr for NextHopKey {
    type Err = ParseNextHopKeyError;

    /// Parses a next-hop key from its `ip@alias` string form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (ip_part, alias) = s.split_once('@').ok_or_else(|| ParseNextHopKeyError {
            message: format!("missing '@' separator: {}", s),
        })?;

        let ip = ip_part.parse().map_err(|_| ParseNextHopKeyError {
            message: format!("Invalid IP address: {}", ip_part),
        })?;
        if alias.is_empty() {
            return Err(ParseNextHopKeyError {
                message: format!("empty interface alias: {}", s),
            });
        }
        Ok(Self::new(ip, alias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nexthop_key_roundtrip() {
        let nh: NextHopKey = "10.0.0.1@Ethernet0".parse().unwrap();
        assert_eq!(nh.alias(), "Ethernet0");
        assert_eq!(nh.to_string(), "10.0.0.1@Ethernet0");
    }

    #[test]
    fn test_nexthop_key_parse_errors() {
        assert!("10.0.0.1".parse::<NextHopKey>().is_err());
        assert!("bogus@Ethernet0".parse::<NextHopKey>().is_err());
        assert!("10.0.0.1@".parse::<NextHopKey>().is_err());
    }

    #[test]
    fn test_nexthop_key_ordering_is_deterministic() {
        let a: NextHopKey = "10.0.0.1@Ethernet0".parse().unwrap();
        let b: NextHopKey = "10.0.0.2@Ethernet0".parse().unwrap();
        let c: NextHopKey = "10.0.0.1@Ethernet4".parse().unwrap();

        assert!(a < b);
        assert!(a < c);
    }

    #[test]
    fn test_nexthop_flags() {
        let mut flags = NextHopFlags::NONE;
        assert!(!flags.is_if_down());

        flags.set_if_down(true);
        assert!(flags.is_if_down());

        flags.set_if_down(false);
        assert!(!flags.is_if_down());
    }
}
