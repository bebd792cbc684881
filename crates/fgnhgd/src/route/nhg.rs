//! Next-hop group key: the set of next-hops a route resolves over.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::nexthop::{NextHopKey, ParseNextHopKeyError};

/// A key identifying a next-hop group (set of next-hops for ECMP).
///
/// The key is the sorted set of next-hop keys, so two groups with the
/// same next-hops (in any order) compare equal and render identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NextHopGroupKey {
    nexthops: BTreeSet<NextHopKey>,
}

impl NextHopGroupKey {
    /// Creates a new empty next-hop group key.
    pub fn new() -> Self {
        Self {
            nexthops: BTreeSet::new(),
        }
    }

    /// Creates a next-hop group key from multiple next-hops.
    pub fn from_nexthops(nexthops: impl IntoIterator<Item = NextHopKey>) -> Self {
        Self {
            nexthops: nexthops.into_iter().collect(),
        }
    }

    /// Adds a next-hop to the group.
    pub fn add(&mut self, nexthop: NextHopKey) {
        self.nexthops.insert(nexthop);
    }

    /// Returns true if the group contains the given next-hop.
    pub fn contains(&self, nexthop: &NextHopKey) -> bool {
        self.nexthops.contains(nexthop)
    }

    /// Returns the number of next-hops in the group.
    pub fn len(&self) -> usize {
        self.nexthops.len()
    }

    /// Returns true if the group is empty.
    pub fn is_empty(&self) -> bool {
        self.nexthops.is_empty()
    }

    /// Returns an iterator over the next-hops in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &NextHopKey> {
        self.nexthops.iter()
    }

    /// Returns the lowest-ordered next-hop, if any.
    pub fn first(&self) -> Option<&NextHopKey> {
        self.nexthops.iter().next()
    }
}

impl fmt::Display for NextHopGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nexthops: Vec<_> = self.nexthops.iter().map(|nh| nh.to_string()).collect();
        write!(f, "{}", nexthops.join(","))
    }
}

impl FromStr for NextHopGroupKey {
    type Err = ParseNextHopKeyError;

    /// Parses a next-hop group key from a comma-separated string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::new());
        }

        let mut nexthops = BTreeSet::new();
        for part in s.split(',') {
            nexthops.insert(part.trim().parse()?);
        }
        Ok(Self { nexthops })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nhg_key_order_insensitive() {
        let a: NextHopGroupKey = "10.0.0.1@Ethernet0,10.0.0.2@Ethernet4".parse().unwrap();
        let b: NextHopGroupKey = "10.0.0.2@Ethernet4,10.0.0.1@Ethernet0".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_nhg_key_display_sorted() {
        let key: NextHopGroupKey = "10.0.0.2@Ethernet4,10.0.0.1@Ethernet0".parse().unwrap();
        assert_eq!(key.to_string(), "10.0.0.1@Ethernet0,10.0.0.2@Ethernet4");
    }

    #[test]
    fn test_nhg_key_empty() {
        let key: NextHopGroupKey = "".parse().unwrap();
        assert!(key.is_empty());
        assert!(key.first().is_none());
    }

    #[test]
    fn test_nhg_key_contains() {
        let key: NextHopGroupKey = "10.0.0.1@Ethernet0,10.0.0.2@Ethernet4".parse().unwrap();
        let nh: NextHopKey = "10.0.0.1@Ethernet0".parse().unwrap();
        let other: NextHopKey = "10.0.0.3@Ethernet8".parse().unwrap();
        assert!(key.contains(&nh));
        assert!(!key.contains(&other));
    }
}
