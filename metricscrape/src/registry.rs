use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::FxHashMap;
use time::OffsetDateTime;

use crate::{
    labels::{canonical_key, Labels},
    value::Metric,
};

/// Latest value of every (name, labels) identity seen so far.
///
/// Shared by the scrape loops (writers) and the query surfaces (readers).
/// Each operation holds the lock only for its own duration, so a reader never
/// sees a partially applied [`register`](Self::register).
#[derive(Debug, Default)]
pub struct MetricRegistry {
    /// key — canonical key of name and labels; value — latest metric
    metrics: RwLock<FxHashMap<String, Metric>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `metric`, or replaces the metric with the same name and labels.
    /// The timestamp is set to the time of registration.
    pub fn register(&self, mut metric: Metric) {
        let key = canonical_key(&metric.name, &metric.labels);
        metric.timestamp = Some(OffsetDateTime::now_utc());
        self.write().insert(key, metric);
    }

    pub fn get(&self, name: &str, labels: &Labels) -> Option<Metric> {
        self.read().get(&canonical_key(name, labels)).cloned()
    }

    /// Returns a copy of every metric, in no particular order.
    pub fn get_all(&self) -> Vec<Metric> {
        self.read().values().cloned().collect()
    }

    /// Returns a copy of every metric named `name`; an empty name matches all.
    pub fn query(&self, name: &str) -> Vec<Metric> {
        if name.is_empty() {
            return self.get_all();
        }
        self.read()
            .values()
            .filter(|metric| metric.name == name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    // Every critical section leaves the map consistent, so a poisoned lock is
    // still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, FxHashMap<String, Metric>> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FxHashMap<String, Metric>> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }
}
