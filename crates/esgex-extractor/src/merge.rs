//! Composite record assembly
//!
//! Per-schema results are unioned key by key. When two schemas produce the
//! same top-level key the later one wins and the collision is reported to a
//! [`CollisionHook`].

use esgex_domain::CompositeRecord;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Observer for key collisions during merging
///
/// Hooks observe only; the merge result is the same whatever they do.
pub trait CollisionHook: Send + Sync {
    /// Called when `schema` overwrites a key already present in the record
    fn on_collision(&self, key: &str, schema: &str, previous: &Value, incoming: &Value);
}

/// Default hook: log a warning
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCollisions;

impl CollisionHook for LogCollisions {
    fn on_collision(&self, key: &str, schema: &str, _previous: &Value, _incoming: &Value) {
        warn!("Schema {} overwrote key '{}' set by an earlier schema", schema, key);
    }
}

/// Accumulates per-schema results into one composite record
pub struct RecordMerger {
    record: CompositeRecord,
    hook: Arc<dyn CollisionHook>,
}

impl RecordMerger {
    /// Create a merger reporting collisions to `hook`
    pub fn new(hook: Arc<dyn CollisionHook>) -> Self {
        Self {
            record: CompositeRecord::new(),
            hook,
        }
    }

    /// Merge one schema's object, returning the number of collisions
    pub fn merge(&mut self, schema: &str, object: Map<String, Value>) -> usize {
        let mut collisions = 0;

        for (key, value) in object {
            if let Some(previous) = self.record.get(&key) {
                self.hook.on_collision(&key, schema, previous, &value);
                collisions += 1;
            }
            self.record.insert(key, value);
        }

        collisions
    }

    /// Record merged so far
    pub fn record(&self) -> &CompositeRecord {
        &self.record
    }

    /// Finish merging
    pub fn into_record(self) -> CompositeRecord {
        self.record
    }
}

impl Default for RecordMerger {
    fn default() -> Self {
        Self::new(Arc::new(LogCollisions))
    }
}
