//! Per-table entry queues for the configuration and route pipelines.
//!
//! A consumer buffers the entries published to one table between
//! dispatch passes. Because the dispatcher is single-threaded and a
//! handler either consumes an entry or defers it whole, what is pending
//! for a key always collapses to one of three shapes: a SET waiting to
//! be applied, a DEL waiting to be applied, or a DEL followed by a SET
//! (the key is being replaced, as in the fine-grained prefix
//! migration's delete-then-re-add). [`PendingOps`] encodes exactly
//! those shapes, so the merging rules hold by construction: a newer SET
//! folds its fields into the pending SET, and a DEL wipes any SET
//! published before it.
//!
//! Deferred entries re-enter through [`Consumer::retry`], which splices
//! the operation in *ahead* of anything published since, preserving the
//! head-of-line ordering the deferred-retry loop depends on.

use std::collections::BTreeMap;

/// Operation carried by a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Set operation (add or update)
    Set,
    /// Delete operation
    Del,
}

impl Operation {
    /// Returns true if this is a Set operation.
    pub fn is_set(&self) -> bool {
        matches!(self, Operation::Set)
    }

    /// Returns true if this is a Del operation.
    pub fn is_del(&self) -> bool {
        matches!(self, Operation::Del)
    }
}

/// A field-value pair from a table hash entry.
pub type FieldValue = (String, String);

/// Key, operation, and field-values tuple: the unit every table handler
/// consumes.
#[derive(Debug, Clone)]
pub struct KeyOpFieldsValues {
    /// The key (a group name, an IP, a CIDR prefix)
    pub key: String,
    /// The operation (Set or Del)
    pub op: Operation,
    /// Field-value pairs (empty for Del operations)
    pub fvs: Vec<FieldValue>,
}

impl KeyOpFieldsValues {
    /// Creates a Set entry.
    pub fn set(key: impl Into<String>, fvs: Vec<FieldValue>) -> Self {
        Self {
            key: key.into(),
            op: Operation::Set,
            fvs,
        }
    }

    /// Creates a Del entry.
    pub fn del(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op: Operation::Del,
            fvs: Vec::new(),
        }
    }

    /// Returns the value for a field, if present.
    pub fn get_field(&self, field: &str) -> Option<&str> {
        self.fvs
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }
}

/// Folds `newer` field-values over `base`, newer values winning.
fn merge_fields(base: &mut Vec<FieldValue>, newer: Vec<FieldValue>) {
    for (field, value) in newer {
        match base.iter_mut().find(|(f, _)| *f == field) {
            Some(existing) => existing.1 = value,
            None => base.push((field, value)),
        }
    }
}

/// Everything pending for a single key.
#[derive(Debug, Clone)]
enum PendingOps {
    /// A SET waiting to be applied; later SETs have been folded in.
    Set(Vec<FieldValue>),
    /// A DEL waiting to be applied.
    Del,
    /// The key is being replaced: DEL first, then SET.
    DelThenSet(Vec<FieldValue>),
}

impl PendingOps {
    fn entry_count(&self) -> usize {
        match self {
            PendingOps::Set(_) | PendingOps::Del => 1,
            PendingOps::DelThenSet(_) => 2,
        }
    }

    /// Absorbs a newly published operation, which logically lands after
    /// everything already pending.
    fn publish(self, op: Operation, fvs: Vec<FieldValue>) -> PendingOps {
        match (self, op) {
            (PendingOps::Set(mut pending), Operation::Set) => {
                merge_fields(&mut pending, fvs);
                PendingOps::Set(pending)
            }
            (PendingOps::DelThenSet(mut pending), Operation::Set) => {
                merge_fields(&mut pending, fvs);
                PendingOps::DelThenSet(pending)
            }
            (PendingOps::Del, Operation::Set) => PendingOps::DelThenSet(fvs),
            // A DEL wipes every unapplied SET before it
            (_, Operation::Del) => PendingOps::Del,
        }
    }

    /// Absorbs a deferred operation, which logically lands before
    /// everything pending (head-of-line retry).
    fn requeue(self, op: Operation, fvs: Vec<FieldValue>) -> PendingOps {
        match (self, op) {
            (PendingOps::Set(newer), Operation::Set) => {
                // The deferred SET came first; newer fields win over it
                let mut fields = fvs;
                merge_fields(&mut fields, newer);
                PendingOps::Set(fields)
            }
            // The deferred DEL precedes the pending SET: replacement
            (PendingOps::Set(pending), Operation::Del) => PendingOps::DelThenSet(pending),
            // A DEL published after the deferred op wipes it either way
            (PendingOps::Del, _) => PendingOps::Del,
            // The pending DEL wipes the deferred SET; a deferred DEL
            // before a DEL is redundant
            (PendingOps::DelThenSet(pending), _) => PendingOps::DelThenSet(pending),
        }
    }

    fn into_entries(self, key: String) -> Vec<KeyOpFieldsValues> {
        match self {
            PendingOps::Set(fvs) => vec![KeyOpFieldsValues::set(key, fvs)],
            PendingOps::Del => vec![KeyOpFieldsValues::del(key)],
            PendingOps::DelThenSet(fvs) => vec![
                KeyOpFieldsValues::del(key.clone()),
                KeyOpFieldsValues::set(key, fvs),
            ],
        }
    }
}

/// Entry queue for one table.
///
/// Keys drain in sorted order; within a key, a replacement drains as
/// DEL before SET.
pub struct Consumer {
    table_name: String,
    pending: BTreeMap<String, PendingOps>,
}

impl Consumer {
    /// Creates an empty consumer for the named table.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            pending: BTreeMap::new(),
        }
    }

    /// Returns the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns true if there are pending entries.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of entries a drain would currently yield.
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(PendingOps::entry_count).sum()
    }

    /// Absorbs newly published entries.
    pub fn add_to_sync(&mut self, entries: Vec<KeyOpFieldsValues>) {
        for entry in entries {
            self.absorb(entry, false);
        }
    }

    /// Re-queues a deferred entry at the head of its key's pending ops.
    pub fn retry(&mut self, entry: KeyOpFieldsValues) {
        self.absorb(entry, true);
    }

    fn absorb(&mut self, entry: KeyOpFieldsValues, deferred: bool) {
        let KeyOpFieldsValues { key, op, fvs } = entry;
        let next = match self.pending.remove(&key) {
            None => match op {
                Operation::Set => PendingOps::Set(fvs),
                Operation::Del => PendingOps::Del,
            },
            Some(state) if deferred => state.requeue(op, fvs),
            Some(state) => state.publish(op, fvs),
        };
        self.pending.insert(key, next);
    }

    /// Takes all pending entries, ordered by key.
    pub fn drain(&mut self) -> Vec<KeyOpFieldsValues> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .flat_map(|(key, state)| state.into_entries(key))
            .collect()
    }

    /// Describes pending entries for debugging.
    pub fn dump(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|(key, state)| match state {
                PendingOps::Set(fvs) => format!("{}: SET {:?}", key, fvs),
                PendingOps::Del => format!("{}: DEL", key),
                PendingOps::DelThenSet(fvs) => format!("{}: DEL then SET {:?}", key, fvs),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(field: &str, value: &str) -> FieldValue {
        (field.to_string(), value.to_string())
    }

    #[test]
    fn test_newer_set_fields_win() {
        let mut consumer = Consumer::new("FG_NHG");
        consumer.add_to_sync(vec![KeyOpFieldsValues::set(
            "fgnhg_v4",
            vec![fv("bucket_size", "120")],
        )]);
        consumer.add_to_sync(vec![KeyOpFieldsValues::set(
            "fgnhg_v4",
            vec![fv("bucket_size", "60"), fv("match_mode", "nexthop-based")],
        )]);

        assert_eq!(consumer.pending_count(), 1);
        let entries = consumer.drain();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get_field("bucket_size"), Some("60"));
        assert_eq!(entries[0].get_field("match_mode"), Some("nexthop-based"));
        assert!(!consumer.has_pending());
    }

    #[test]
    fn test_del_wipes_unapplied_set() {
        let mut consumer = Consumer::new("FG_NHG_MEMBER");
        consumer.add_to_sync(vec![
            KeyOpFieldsValues::set("10.0.0.1", vec![fv("FG_NHG", "fgnhg_v4")]),
            KeyOpFieldsValues::del("10.0.0.1"),
        ]);

        let entries = consumer.drain();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].op.is_del());
    }

    #[test]
    fn test_replacement_drains_del_before_set() {
        let mut consumer = Consumer::new("FG_NHG_PREFIX");
        consumer.add_to_sync(vec![
            KeyOpFieldsValues::del("10.50.0.0/16"),
            KeyOpFieldsValues::set("10.50.0.0/16", vec![fv("FG_NHG", "fgnhg_v4")]),
        ]);

        assert_eq!(consumer.pending_count(), 2);
        let entries = consumer.drain();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].op.is_del());
        assert!(entries[1].op.is_set());
        assert_eq!(entries[1].get_field("FG_NHG"), Some("fgnhg_v4"));
    }

    #[test]
    fn test_deferred_set_is_wiped_by_later_del() {
        let mut consumer = Consumer::new("FG_NHG_MEMBER");
        consumer.add_to_sync(vec![KeyOpFieldsValues::set(
            "10.0.0.1",
            vec![fv("FG_NHG", "fgnhg_v4")],
        )]);

        let mut entries = consumer.drain();
        consumer.retry(entries.remove(0));
        consumer.add_to_sync(vec![KeyOpFieldsValues::del("10.0.0.1")]);

        // The DEL was published after the deferred SET, so it wins
        let entries = consumer.drain();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].op.is_del());
    }

    #[test]
    fn test_deferred_del_precedes_pending_set() {
        let mut consumer = Consumer::new("ROUTE_TABLE");
        consumer.add_to_sync(vec![KeyOpFieldsValues::del("10.50.0.0/16")]);

        let mut entries = consumer.drain();
        consumer.add_to_sync(vec![KeyOpFieldsValues::set(
            "10.50.0.0/16",
            vec![fv("nexthop", "10.0.0.1")],
        )]);
        consumer.retry(entries.remove(0));

        // The deferred DEL still runs before the newly published SET
        let entries = consumer.drain();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].op.is_del());
        assert!(entries[1].op.is_set());
    }

    #[test]
    fn test_deferred_set_merges_under_newer_set() {
        let mut consumer = Consumer::new("FG_NHG");
        consumer.add_to_sync(vec![KeyOpFieldsValues::set(
            "fgnhg_v4",
            vec![fv("bucket_size", "120"), fv("match_mode", "route-based")],
        )]);

        let mut entries = consumer.drain();
        consumer.add_to_sync(vec![KeyOpFieldsValues::set(
            "fgnhg_v4",
            vec![fv("bucket_size", "60")],
        )]);
        consumer.retry(entries.remove(0));

        // The re-queued SET is older: its fields only fill gaps
        let entries = consumer.drain();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get_field("bucket_size"), Some("60"));
        assert_eq!(entries[0].get_field("match_mode"), Some("route-based"));
    }
}
