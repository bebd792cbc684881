//! Base Orch trait.
//!
//! An Orch owns one or more table [`crate::Consumer`]s and is driven by
//! the single-threaded dispatcher: every dispatch pass calls
//! [`Orch::do_task`], which drains whatever is pending, consuming each
//! entry or deferring it head-of-line. Nothing suspends mid-entry; an
//! entry either completes or goes back whole.
//!
//! On a warm restart the dispatcher calls [`Orch::bake`] exactly once
//! before the first pass, giving the Orch a chance to reload durable
//! state (for the fine-grained manager, the per-bucket journal) before
//! any new event can touch it.

use async_trait::async_trait;

/// An orchestration agent driven by the dispatch loop.
#[async_trait]
pub trait Orch: Send + Sync {
    /// Returns the name of this Orch (for logging and debugging).
    fn name(&self) -> &str;

    /// Processes pending entries from this Orch's consumers.
    ///
    /// Entries whose dependencies are not met are re-queued at the head
    /// of their key's pending ops and re-examined on a later pass.
    async fn do_task(&mut self);

    /// Recovers state saved before a warm restart.
    ///
    /// Returns `true` if recovery was successful.
    fn bake(&mut self) -> bool {
        true
    }

    /// Returns true if this Orch has entries waiting (fresh or
    /// deferred).
    fn has_pending_tasks(&self) -> bool {
        false
    }

    /// Dumps pending entries for debugging.
    fn dump_pending_tasks(&self) -> Vec<String> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Consumer, KeyOpFieldsValues, StateTable, TaskStatus};

    /// Exercises the trait the way the fine-grained manager does: a
    /// member table drained with head-of-line retry against a parent
    /// dependency, and a journal consumed by bake().
    struct MemberTableOrch {
        consumer: Consumer,
        known_groups: Vec<String>,
        applied: Vec<String>,
        journal: StateTable,
        recovered_prefixes: Vec<String>,
    }

    impl MemberTableOrch {
        fn new() -> Self {
            Self {
                consumer: Consumer::new("FG_NHG_MEMBER"),
                known_groups: Vec::new(),
                applied: Vec::new(),
                journal: StateTable::new("FG_ROUTE_TABLE"),
                recovered_prefixes: Vec::new(),
            }
        }

        fn handle(&mut self, entry: &KeyOpFieldsValues) -> TaskStatus {
            match entry.get_field("FG_NHG") {
                Some(group) if !self.known_groups.iter().any(|g| g == group) => {
                    TaskStatus::Retry
                }
                _ => {
                    self.applied.push(entry.key.clone());
                    TaskStatus::Handled
                }
            }
        }
    }

    #[async_trait]
    impl Orch for MemberTableOrch {
        fn name(&self) -> &str {
            "MemberTableOrch"
        }

        async fn do_task(&mut self) {
            for entry in self.consumer.drain() {
                if self.handle(&entry).needs_retry() {
                    self.consumer.retry(entry);
                }
            }
        }

        fn bake(&mut self) -> bool {
            for key in self.journal.keys() {
                self.recovered_prefixes.push(key.clone());
                self.journal.del(&key);
            }
            true
        }

        fn has_pending_tasks(&self) -> bool {
            self.consumer.has_pending()
        }

        fn dump_pending_tasks(&self) -> Vec<String> {
            self.consumer.dump()
        }
    }

    #[tokio::test]
    async fn test_entry_defers_until_its_group_appears() {
        let mut orch = MemberTableOrch::new();
        orch.consumer.add_to_sync(vec![KeyOpFieldsValues::set(
            "10.0.0.1",
            vec![("FG_NHG".to_string(), "fgnhg_v4".to_string())],
        )]);

        orch.do_task().await;
        assert!(orch.applied.is_empty());
        assert!(orch.has_pending_tasks());
        assert_eq!(orch.dump_pending_tasks().len(), 1);

        // The dependency shows up; the deferred entry completes on the
        // next pass
        orch.known_groups.push("fgnhg_v4".to_string());
        orch.do_task().await;
        assert_eq!(orch.applied, vec!["10.0.0.1".to_string()]);
        assert!(!orch.has_pending_tasks());
    }

    #[tokio::test]
    async fn test_bake_consumes_the_journal_once() {
        let mut orch = MemberTableOrch::new();
        orch.journal.hset("10.50.0.0/16", "0", "10.0.0.1@Ethernet0");
        orch.journal.hset("10.60.0.0/16", "0", "10.0.0.2@Ethernet4");

        assert!(orch.bake());
        assert_eq!(
            orch.recovered_prefixes,
            vec!["10.50.0.0/16".to_string(), "10.60.0.0/16".to_string()]
        );
        // Records are deleted as they are consumed
        assert!(orch.journal.is_empty());
    }
}
