//! In-memory STATE_DB-style hash table.
//!
//! `StateTable` mirrors the verb set of a swss `Table` (hset/hget/del/keys)
//! so that durable projections such as the warm-restart journal read the
//! same whether they are backed by this in-memory store or by a database
//! connector.

use std::collections::BTreeMap;

/// A named table of hash entries: key -> (field -> value).
///
/// Keys and fields iterate in sorted order, which keeps dumps and
/// recovery passes deterministic.
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    name: String,
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl StateTable {
    /// Creates an empty table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets a single field of an entry, creating the entry if needed.
    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.entries
            .entry(key.into())
            .or_default()
            .insert(field.into(), value.into());
    }

    /// Returns the value of a single field, if present.
    pub fn hget(&self, key: &str, field: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    /// Returns all field-value pairs of an entry in field order.
    pub fn get(&self, key: &str) -> Vec<(String, String)> {
        self.entries
            .get(key)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(f, v)| (f.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Removes a single field from an entry; drops the entry when its
    /// last field goes.
    pub fn hdel(&mut self, key: &str, field: &str) {
        if let Some(fields) = self.entries.get_mut(key) {
            fields.remove(field);
            if fields.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    /// Removes an entire entry. Idempotent on missing keys.
    pub fn del(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Returns all entry keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hset_hget() {
        let mut table = StateTable::new("FG_ROUTE_TABLE");
        table.hset("10.0.0.0/24", "0", "10.0.0.1@Ethernet0");
        table.hset("10.0.0.0/24", "1", "10.0.0.2@Ethernet4");

        assert_eq!(table.hget("10.0.0.0/24", "0"), Some("10.0.0.1@Ethernet0"));
        assert_eq!(table.hget("10.0.0.0/24", "2"), None);
        assert_eq!(table.keys(), vec!["10.0.0.0/24".to_string()]);
    }

    #[test]
    fn test_get_returns_sorted_fields() {
        let mut table = StateTable::new("t");
        table.hset("k", "b", "2");
        table.hset("k", "a", "1");

        let fvs = table.get("k");
        assert_eq!(
            fvs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_del_idempotent() {
        let mut table = StateTable::new("t");
        table.hset("k", "f", "v");
        table.del("k");
        table.del("k");
        assert!(table.is_empty());
    }

    #[test]
    fn test_hdel_drops_empty_entry() {
        let mut table = StateTable::new("t");
        table.hset("k", "f", "v");
        table.hdel("k", "f");
        assert!(table.is_empty());
    }
}
