//! Reference-counted object tables.
//!
//! The neighbor and router-interface layers hand out HAL handles that
//! group buckets and routes then point at. Two rules keep those layers
//! honest: a handle must not be torn down while something in the HAL
//! still references it, and a reference must never attach to an entry
//! that does not exist (the C++ orchagent's `map[key].ref_count++`
//! silently mints a half-initialized entry when the key is wrong).
//!
//! `RefTable` makes both rules structural: the count lives in the table
//! rather than in each value, [`RefTable::acquire`]/[`RefTable::release`]
//! fail on missing keys, and [`RefTable::remove`] refuses while
//! references remain.

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Error type for reference-table operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefTableError {
    #[error("entry not found")]
    NotFound,

    #[error("reference count underflow")]
    Underflow,

    #[error("entry still referenced")]
    StillReferenced,
}

#[derive(Debug, Clone)]
struct RefEntry<V> {
    value: V,
    ref_count: u32,
}

/// A map whose entries carry a table-managed reference count.
#[derive(Debug, Clone)]
pub struct RefTable<K, V> {
    entries: HashMap<K, RefEntry<V>>,
}

impl<K, V> RefTable<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the table holds the key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the value for a key. Never creates entries.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Returns the value for a key mutably. Never creates entries.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|entry| &mut entry.value)
    }

    /// Inserts an entry, starting unreferenced.
    ///
    /// Replacing an existing entry keeps its reference count: a
    /// re-resolved neighbor does not lose the buckets pointing at it.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entries.get_mut(&key) {
            Some(entry) => Some(std::mem::replace(&mut entry.value, value)),
            None => {
                self.entries.insert(
                    key,
                    RefEntry {
                        value,
                        ref_count: 0,
                    },
                );
                None
            }
        }
    }

    /// Removes an entry that has no outstanding references.
    ///
    /// Returns `Ok(None)` for a missing key (idempotent), and refuses
    /// with [`RefTableError::StillReferenced`] while the count is
    /// non-zero.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>, RefTableError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(entry) if entry.ref_count > 0 => Err(RefTableError::StillReferenced),
            Some(_) => Ok(self.entries.remove(key).map(|entry| entry.value)),
        }
    }

    /// Takes a reference on an existing entry and returns the new count.
    ///
    /// A missing key is an error, never a fresh entry.
    pub fn acquire(&mut self, key: &K) -> Result<u32, RefTableError> {
        let entry = self.entries.get_mut(key).ok_or(RefTableError::NotFound)?;
        entry.ref_count = entry.ref_count.saturating_add(1);
        Ok(entry.ref_count)
    }

    /// Drops a reference and returns the new count.
    pub fn release(&mut self, key: &K) -> Result<u32, RefTableError> {
        let entry = self.entries.get_mut(key).ok_or(RefTableError::NotFound)?;
        if entry.ref_count == 0 {
            return Err(RefTableError::Underflow);
        }
        entry.ref_count -= 1;
        Ok(entry.ref_count)
    }

    /// Returns the reference count for a key.
    pub fn ref_count(&self, key: &K) -> Option<u32> {
        self.entries.get(key).map(|entry| entry.ref_count)
    }

    /// Iterates over key-value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, entry)| (key, &entry.value))
    }

    /// Iterates over keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Iterates over values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|entry| &entry.value)
    }
}

impl<K, V> Default for RefTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_acquire_never_mints_entries() {
        // A typo'd key must surface as an error, not a phantom neighbor
        let mut table: RefTable<String, u64> = RefTable::new();
        assert_eq!(
            table.acquire(&"10.0.0.99@Ethernet0".to_string()),
            Err(RefTableError::NotFound)
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_refuses_while_referenced() {
        let mut table: RefTable<String, u64> = RefTable::new();
        let key = "Ethernet0".to_string();
        table.insert(key.clone(), 0x61);

        table.acquire(&key).unwrap();
        assert_eq!(table.remove(&key), Err(RefTableError::StillReferenced));

        table.release(&key).unwrap();
        assert_eq!(table.remove(&key), Ok(Some(0x61)));
        // Removing again is idempotent
        assert_eq!(table.remove(&key), Ok(None));
    }

    #[test]
    fn test_release_underflow() {
        let mut table: RefTable<String, u64> = RefTable::new();
        let key = "Ethernet0".to_string();
        table.insert(key.clone(), 0x61);

        assert_eq!(table.release(&key), Err(RefTableError::Underflow));

        table.acquire(&key).unwrap();
        assert_eq!(table.release(&key), Ok(0));
        assert_eq!(table.release(&key), Err(RefTableError::Underflow));
    }

    #[test]
    fn test_reinsert_keeps_references() {
        // Re-resolution refreshes the value without dropping the
        // references already placed on the old one
        let mut table: RefTable<String, u64> = RefTable::new();
        let key = "10.0.0.1@Ethernet0".to_string();
        table.insert(key.clone(), 0x100);
        table.acquire(&key).unwrap();

        assert_eq!(table.insert(key.clone(), 0x200), Some(0x100));
        assert_eq!(table.ref_count(&key), Some(1));
        assert_eq!(table.get(&key), Some(&0x200));
    }
}
