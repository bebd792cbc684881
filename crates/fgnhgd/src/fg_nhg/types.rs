//! Fine-grained next-hop group types.

use log::info;
use sonic_sai::{NextHopGroupMemberOid, NextHopGroupOid, RawSaiObjectId, RouterInterfaceOid};
use sonic_types::{IpAddress, IpPrefix, OperState};
use std::collections::{HashMap, HashSet};

use crate::route::{NextHopGroupKey, NextHopKey};

/// How a group's members are discovered.
///
/// The payload carries only the mode-specific configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FgMatchMode {
    /// Members inherited from the route's next-hop set.
    RouteBased,
    /// Members explicitly configured; any route whose next-hops all
    /// belong to the group is matched.
    NexthopBased,
    /// Members synthesized per-route with a single bank capped at
    /// `max_next_hops`.
    PrefixBased { max_next_hops: u32 },
}

impl FgMatchMode {
    /// Returns true for the prefix-based mode.
    pub fn is_prefix_based(&self) -> bool {
        matches!(self, FgMatchMode::PrefixBased { .. })
    }

    /// Returns the member cap for prefix-based groups, 0 otherwise.
    pub fn max_next_hops(&self) -> u32 {
        match self {
            FgMatchMode::PrefixBased { max_next_hops } => *max_next_hops,
            _ => 0,
        }
    }
}

/// Per-member state within a group.
#[derive(Debug, Clone)]
pub struct FgNextHopInfo {
    /// Bank the member belongs to.
    pub bank: u32,
    /// Tracked physical link, if any.
    pub link: Option<String>,
    /// Operational state of the tracked link. Untracked members are
    /// treated as up.
    pub link_oper_state: OperState,
}

impl FgNextHopInfo {
    /// Creates member state for the given bank with no tracked link.
    pub fn new(bank: u32) -> Self {
        Self {
            bank,
            link: None,
            link_oper_state: OperState::Up,
        }
    }

    /// Returns true if the member is usable from a link standpoint.
    pub fn link_is_up(&self) -> bool {
        self.link.is_none() || self.link_oper_state.is_up()
    }
}

/// A contiguous range of hash bucket indices owned by one bank.
///
/// Both indices are inclusive. A bank that ends up with no buckets is
/// rendered as an empty range (`start_index > end_index`), which every
/// `start..=end` iteration treats as zero buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankIndexRange {
    pub start_index: u32,
    pub end_index: u32,
}

impl BankIndexRange {
    /// Number of buckets in the range.
    pub fn len(&self) -> u32 {
        (self.end_index + 1).saturating_sub(self.start_index)
    }

    /// Returns true if the range holds no buckets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named group of potential next-hops sharing a bucket policy.
#[derive(Debug, Clone)]
pub struct FgNhgEntry {
    /// Group name (configuration key).
    pub name: String,
    /// Requested bucket count.
    pub configured_bucket_size: u32,
    /// Bucket count the HAL actually allocated (0 until known).
    pub real_bucket_size: u32,
    /// Member discovery mode.
    pub match_mode: FgMatchMode,
    /// Member IP -> per-member state.
    pub next_hops: HashMap<IpAddress, FgNextHopInfo>,
    /// Tracked link alias -> member IPs using it.
    pub links: HashMap<String, Vec<IpAddress>>,
    /// Per-bank bucket ranges, bank 0 first; computed from
    /// `real_bucket_size` once the HAL reports it.
    pub bank_ranges: Vec<BankIndexRange>,
    /// Prefixes bound to this group.
    pub prefixes: Vec<IpPrefix>,
}

impl FgNhgEntry {
    /// Creates a new group with no members.
    pub fn new(name: impl Into<String>, configured_bucket_size: u32, match_mode: FgMatchMode) -> Self {
        Self {
            name: name.into(),
            configured_bucket_size,
            real_bucket_size: 0,
            match_mode,
            next_hops: HashMap::new(),
            links: HashMap::new(),
            bank_ranges: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    /// Returns the bank a member IP is configured into.
    pub fn bank_of(&self, ip: &IpAddress) -> Option<u32> {
        self.next_hops.get(ip).map(|info| info.bank)
    }

    /// Number of banks implied by the current member configuration.
    ///
    /// Used to size the per-bank change vectors before `bank_ranges` has
    /// been computed. Prefix-based groups always use a single bank.
    pub fn bank_count_hint(&self) -> usize {
        if !self.bank_ranges.is_empty() {
            return self.bank_ranges.len();
        }
        if self.match_mode.is_prefix_based() {
            return 1;
        }
        self.next_hops
            .values()
            .map(|info| info.bank as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// Removes a member IP from its tracked link's member list.
    pub fn unlink_next_hop(&mut self, ip: &IpAddress) {
        let link = self.next_hops.get(ip).and_then(|info| info.link.clone());
        if let Some(link) = link {
            if let Some(ips) = self.links.get_mut(&link) {
                ips.retain(|candidate| candidate != ip);
                if ips.is_empty() {
                    self.links.remove(&link);
                }
            }
        }
    }

    /// Partitions `[0, real_bucket_size)` into contiguous per-bank
    /// ranges proportional to each bank's member count.
    ///
    /// With base share `q = floor(B/M)` and remainder `r`, every bank
    /// gets `floor(r/k)` extra buckets and the first `r mod k` banks one
    /// more, so bucket shares stay uniform to within one even when `B`
    /// is not divisible by `M`.
    pub fn calculate_bank_ranges(&mut self) {
        let mut memb_per_bank: Vec<u32> = Vec::new();
        let buckets_per_nexthop: u32;
        let mut extra_buckets: u32;

        match self.match_mode {
            FgMatchMode::PrefixBased { max_next_hops } => {
                // Prefix-based groups have no bank configuration; a
                // single bank holds max_next_hops slots.
                memb_per_bank.push(max_next_hops);
                buckets_per_nexthop = self.real_bucket_size / max_next_hops;
                extra_buckets =
                    self.real_bucket_size - buckets_per_nexthop * max_next_hops;
            }
            _ => {
                for info in self.next_hops.values() {
                    while memb_per_bank.len() <= info.bank as usize {
                        memb_per_bank.push(0);
                    }
                    memb_per_bank[info.bank as usize] += 1;
                }
                let total = self.next_hops.len() as u32;
                if total == 0 {
                    self.bank_ranges.clear();
                    return;
                }
                buckets_per_nexthop = self.real_bucket_size / total;
                extra_buckets = self.real_bucket_size - buckets_per_nexthop * total;
            }
        }

        let num_banks = memb_per_bank.len() as u32;
        let split_extra_among_banks = extra_buckets / num_banks;
        extra_buckets -= split_extra_among_banks * num_banks;

        self.bank_ranges.clear();
        let mut prev_idx = 0u32;
        for members in memb_per_bank {
            let mut width = buckets_per_nexthop * members + split_extra_among_banks;
            if extra_buckets > 0 {
                width += 1;
                extra_buckets -= 1;
            }
            let range = if width == 0 {
                BankIndexRange {
                    start_index: prev_idx.max(1),
                    end_index: prev_idx.max(1) - 1,
                }
            } else {
                BankIndexRange {
                    start_index: prev_idx,
                    end_index: prev_idx + width - 1,
                }
            };
            info!(
                "Bank range for {}: bank {}, si {}, ei {}",
                self.name,
                self.bank_ranges.len(),
                range.start_index,
                range.end_index
            );
            self.bank_ranges.push(range);
            prev_idx += width;
        }
    }
}

/// Per-bank membership delta feeding one distributor pass.
#[derive(Debug, Clone, Default)]
pub struct BankMemberChanges {
    /// Members of this bank already placed in buckets and staying.
    pub active_nhs: Vec<NextHopKey>,
    /// Members of this bank becoming eligible.
    pub nhs_to_add: Vec<NextHopKey>,
    /// Members of this bank ceasing to be eligible.
    pub nhs_to_del: Vec<NextHopKey>,
}

/// Bank-local map from next-hop to the bucket indices it owns.
pub type BankBucketMap = HashMap<NextHopKey, Vec<u32>>;

/// Shadow of what has been pushed to the HAL for one (VRF, prefix).
#[derive(Debug, Clone, Default)]
pub struct FgNextHopGroupEntry {
    /// The requesting next-hop group key.
    pub nhg_key: NextHopGroupKey,
    /// HAL group handle; `None` while the route points at a RIF.
    pub group_id: Option<NextHopGroupOid>,
    /// RIF handle the route falls back to; `Some` iff `points_to_rif`.
    pub rif_id: Option<RouterInterfaceOid>,
    /// HAL member handles, indexed by bucket.
    pub nhopgroup_members: Vec<NextHopGroupMemberOid>,
    /// Per-bank bucket ownership.
    pub bucket_map: Vec<BankBucketMap>,
    /// Next-hops currently placed in some bucket.
    pub active_nexthops: HashSet<NextHopKey>,
    /// Inactive bank -> active bank whose members fill its range.
    pub inactive_to_active: HashMap<u32, u32>,
    /// True while the route is programmed to the router interface.
    pub points_to_rif: bool,
}

impl FgNextHopGroupEntry {
    /// Creates a shadow entry programmed to the router interface.
    pub fn new_rif(nhg_key: NextHopGroupKey, rif_id: RouterInterfaceOid) -> Self {
        Self {
            nhg_key,
            group_id: None,
            rif_id: Some(rif_id),
            points_to_rif: true,
            ..Default::default()
        }
    }

    /// The next-hop object the route is programmed with: the group when
    /// HAL-backed, the RIF otherwise.
    pub fn next_hop_id(&self) -> RawSaiObjectId {
        if self.points_to_rif {
            self.rif_id.map(|rif| rif.as_raw()).unwrap_or(0)
        } else {
            self.group_id.map(|group| group.as_raw()).unwrap_or(0)
        }
    }

    /// Drops all HAL-backed state, leaving the entry pointing at a RIF.
    pub fn collapse_to_rif(&mut self, rif_id: RouterInterfaceOid) {
        self.points_to_rif = true;
        self.rif_id = Some(rif_id);
        self.group_id = None;
        self.nhopgroup_members.clear();
        self.bucket_map.clear();
        self.active_nexthops.clear();
        self.inactive_to_active.clear();
    }

    /// Total bucket count a next-hop owns across all banks.
    pub fn bucket_count_of(&self, nexthop: &NextHopKey) -> usize {
        self.bucket_map
            .iter()
            .filter_map(|bank| bank.get(nexthop))
            .map(|buckets| buckets.len())
            .sum()
    }

    /// All bucket indices a next-hop owns, sorted.
    pub fn buckets_of(&self, nexthop: &NextHopKey) -> Vec<u32> {
        let mut buckets: Vec<u32> = self
            .bucket_map
            .iter()
            .filter_map(|bank| bank.get(nexthop))
            .flatten()
            .copied()
            .collect();
        buckets.sort_unstable();
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry_with_banks(bucket_size: u32, members_per_bank: &[u32]) -> FgNhgEntry {
        let mut entry = FgNhgEntry::new("fgnhg_v4", bucket_size, FgMatchMode::RouteBased);
        entry.real_bucket_size = bucket_size;
        let mut host = 1u8;
        for (bank, count) in members_per_bank.iter().enumerate() {
            for _ in 0..*count {
                let ip: IpAddress = format!("10.0.0.{}", host).parse().unwrap();
                entry
                    .next_hops
                    .insert(ip, FgNextHopInfo::new(bank as u32));
                host += 1;
            }
        }
        entry
    }

    #[test]
    fn test_bank_ranges_even_split() {
        let mut entry = entry_with_banks(60, &[3, 3]);
        entry.calculate_bank_ranges();

        assert_eq!(
            entry.bank_ranges,
            vec![
                BankIndexRange {
                    start_index: 0,
                    end_index: 29
                },
                BankIndexRange {
                    start_index: 30,
                    end_index: 59
                },
            ]
        );
    }

    #[test]
    fn test_bank_ranges_proportional() {
        // Bank0: 6 nh, Bank1: 3 nh, 30 buckets -> 0-19 and 20-29
        let mut entry = entry_with_banks(30, &[6, 3]);
        entry.calculate_bank_ranges();

        assert_eq!(entry.bank_ranges[0].start_index, 0);
        assert_eq!(entry.bank_ranges[0].end_index, 19);
        assert_eq!(entry.bank_ranges[1].start_index, 20);
        assert_eq!(entry.bank_ranges[1].end_index, 29);
    }

    #[test]
    fn test_bank_ranges_with_remainder() {
        // 64 buckets over 6 members in two banks: q=10, r=4, e=2 per
        // bank, no spill -> 32 + 32
        let mut entry = entry_with_banks(64, &[3, 3]);
        entry.calculate_bank_ranges();

        assert_eq!(entry.bank_ranges[0].len(), 32);
        assert_eq!(entry.bank_ranges[1].len(), 32);
        assert_eq!(entry.bank_ranges[1].end_index, 63);
    }

    #[test]
    fn test_bank_ranges_with_spill() {
        // 65 buckets over 6 members in two banks: q=10, r=5, e=2, s=1
        // -> bank 0 gets the spill bucket
        let mut entry = entry_with_banks(65, &[3, 3]);
        entry.calculate_bank_ranges();

        assert_eq!(entry.bank_ranges[0].len(), 33);
        assert_eq!(entry.bank_ranges[1].len(), 32);
        assert_eq!(entry.bank_ranges[1].end_index, 64);
    }

    #[test]
    fn test_bank_ranges_prefix_based() {
        let mut entry = FgNhgEntry::new(
            "fgnhg_prefix",
            100,
            FgMatchMode::PrefixBased { max_next_hops: 8 },
        );
        entry.real_bucket_size = 100;
        entry.calculate_bank_ranges();

        // Single bank spanning the whole array
        assert_eq!(entry.bank_ranges.len(), 1);
        assert_eq!(entry.bank_ranges[0].start_index, 0);
        assert_eq!(entry.bank_ranges[0].end_index, 99);
    }

    #[test]
    fn test_bank_count_hint() {
        let entry = entry_with_banks(60, &[3, 3]);
        assert_eq!(entry.bank_count_hint(), 2);

        let prefix_entry = FgNhgEntry::new(
            "fgnhg_prefix",
            100,
            FgMatchMode::PrefixBased { max_next_hops: 8 },
        );
        assert_eq!(prefix_entry.bank_count_hint(), 1);

        let empty = FgNhgEntry::new("empty", 60, FgMatchMode::RouteBased);
        assert_eq!(empty.bank_count_hint(), 0);
    }

    #[test]
    fn test_shadow_next_hop_id() {
        let rif = RouterInterfaceOid::from_raw(0x61).unwrap();
        let mut shadow = FgNextHopGroupEntry::new_rif(NextHopGroupKey::new(), rif);
        assert_eq!(shadow.next_hop_id(), 0x61);

        let group = NextHopGroupOid::from_raw(0x42).unwrap();
        shadow.points_to_rif = false;
        shadow.rif_id = None;
        shadow.group_id = Some(group);
        assert_eq!(shadow.next_hop_id(), 0x42);
    }

    #[test]
    fn test_collapse_to_rif_clears_state() {
        let mut shadow = FgNextHopGroupEntry::default();
        shadow.group_id = NextHopGroupOid::from_raw(0x42);
        shadow.nhopgroup_members = vec![Default::default(); 4];
        shadow.bucket_map = vec![BankBucketMap::new()];
        shadow
            .active_nexthops
            .insert("10.0.0.1@Ethernet0".parse().unwrap());
        shadow.inactive_to_active.insert(0, 1);

        let rif = RouterInterfaceOid::from_raw(0x61).unwrap();
        shadow.collapse_to_rif(rif);

        assert!(shadow.points_to_rif);
        assert!(shadow.group_id.is_none());
        assert!(shadow.nhopgroup_members.is_empty());
        assert!(shadow.bucket_map.is_empty());
        assert!(shadow.active_nexthops.is_empty());
        assert!(shadow.inactive_to_active.is_empty());
    }
}
