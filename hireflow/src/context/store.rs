//! The per-run context store shared by every stage.

use super::{ContextEntry, ContextKey, ContextSnapshot, RunIdentity};
use crate::events::{EventSink, NoOpEventSink};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Producer id recorded for values seeded by the caller.
pub const CALLER: &str = "caller";

/// Mapping from context name to JSON value, scoped to one workflow run.
///
/// Writes overwrite unconditionally. Concurrent writers are expected to use
/// disjoint names; the lock only guards memory, not that contract.
pub struct RunContext {
    identity: RunIdentity,
    entries: RwLock<HashMap<ContextKey, ContextEntry>>,
    event_sink: Arc<dyn EventSink>,
    sealed: AtomicBool,
}

impl RunContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new(identity: RunIdentity) -> Self {
        Self {
            identity,
            entries: RwLock::new(HashMap::new()),
            event_sink: Arc::new(NoOpEventSink),
            sealed: AtomicBool::new(false),
        }
    }

    /// Creates a context seeded with the caller's two inputs.
    #[must_use]
    pub fn seeded(
        identity: RunIdentity,
        profile_path: impl Into<String>,
        job_description: serde_json::Value,
    ) -> Self {
        let ctx = Self::new(identity);
        ctx.set(
            ContextKey::ProfilePath,
            serde_json::Value::String(profile_path.into()),
            CALLER,
        );
        ctx.set(ContextKey::JobDescription, job_description, CALLER);
        ctx
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Emits an event tagged with this run's id.
    pub fn try_emit_event(&self, event_type: &str, data: serde_json::Value) {
        let mut payload = match data {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        payload.insert(
            "run_id".to_string(),
            serde_json::json!(self.identity.run_id.to_string()),
        );
        self.event_sink
            .try_emit(event_type, Some(serde_json::Value::Object(payload)));
    }

    /// Stores a value, replacing any earlier value under the same name.
    ///
    /// Once the context is sealed the write is dropped and logged.
    pub fn set(&self, key: ContextKey, value: serde_json::Value, produced_by: &str) {
        if self.is_sealed() {
            warn!(
                run_id = %self.identity.run_id,
                key = %key,
                produced_by,
                "write to sealed run context ignored"
            );
            return;
        }

        let previous = self
            .entries
            .write()
            .insert(key, ContextEntry::new(key, value, produced_by));

        if let Some(previous) = previous {
            debug!(
                run_id = %self.identity.run_id,
                key = %key,
                previous_producer = %previous.produced_by,
                produced_by,
                "context value overwritten"
            );
        }
    }

    /// Gets a value. Returns `None` when absent or `null`.
    #[must_use]
    pub fn get(&self, key: ContextKey) -> Option<serde_json::Value> {
        self.entries
            .read()
            .get(&key)
            .map(|e| e.value.clone())
            .filter(|v| !v.is_null())
    }

    /// Gets the full entry, including the producer.
    #[must_use]
    pub fn entry(&self, key: ContextKey) -> Option<ContextEntry> {
        self.entries.read().get(&key).cloned()
    }

    /// Checks if an entry exists.
    #[must_use]
    pub fn contains(&self, key: ContextKey) -> bool {
        self.entries.read().contains_key(&key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the context holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns an immutable copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot::from_entries(
            Some(self.identity.run_id),
            self.entries.read().values().cloned(),
        )
    }

    /// Marks the context read-only.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Returns true once the context has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.identity.run_id)
            .field("keys", &self.snapshot().keys())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
