//! Global aggregate maps shared by one ingestion pass.
//!
//! Holds the four global rollup maps while a load is running. Each batch is
//! folded into a private `Aggregates` first and merged here under a single
//! lock acquisition, so the lock is taken once per batch rather than per row.
//! Merges are serialized on the reducer thread, so the lock is uncontended
//! during a pass.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::aggregate::Aggregates;

#[derive(Debug, Default, Clone)]
pub struct GlobalTracker {
    pub(crate) aggregates: Arc<Mutex<Aggregates>>,
}

impl GlobalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock global aggregates with poison recovery
    fn lock_aggregates(&self) -> MutexGuard<'_, Aggregates> {
        match self.aggregates.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("aggregation lock poisoned by a panicked thread, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Merge one batch's local aggregates into the global maps.
    pub fn merge_batch(&self, local: Aggregates) {
        let distinct = local.distinct_keys();
        let mut global = self.lock_aggregates();
        global.merge(local);
        log::trace!(
            "merged {} keys, {} records total",
            distinct,
            global.record_count
        );
    }

    /// Valid records folded in so far
    pub fn record_count(&self) -> u64 {
        self.lock_aggregates().record_count
    }

    /// Take the accumulated maps, leaving the tracker empty.
    pub fn take(&self) -> Aggregates {
        std::mem::take(&mut *self.lock_aggregates())
    }
}
