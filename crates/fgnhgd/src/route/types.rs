//! Route pipeline plumbing types.

use sonic_orch_common::KeyOpFieldsValues;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Producer handle for the application route table.
///
/// Models the producer side of the route pipeline: entries written here
/// are drained by the dispatcher back into the route consumer, so a
/// route delete issued by the fine-grained prefix handlers completes
/// through the same event loop as any other route update.
#[derive(Clone, Default)]
pub struct RouteTableProducer {
    queue: Arc<Mutex<VecDeque<KeyOpFieldsValues>>>,
}

impl RouteTableProducer {
    /// Creates an empty producer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a SET for the given route key.
    pub fn set(&self, key: impl Into<String>, fvs: Vec<(String, String)>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(KeyOpFieldsValues::set(key, fvs));
        }
    }

    /// Publishes a DEL for the given route key.
    pub fn del(&self, key: impl Into<String>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(KeyOpFieldsValues::del(key));
        }
    }

    /// Drains all published entries in publication order.
    pub fn drain(&self) -> Vec<KeyOpFieldsValues> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().map(|q| q.is_empty()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_fifo() {
        let producer = RouteTableProducer::new();
        producer.del("10.50.0.0/16");
        producer.set(
            "10.50.0.0/16",
            vec![("nexthop".to_string(), "10.0.0.1".to_string())],
        );

        let drained = producer.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained[0].op.is_del());
        assert!(drained[1].op.is_set());
        assert!(producer.is_empty());
    }
}
