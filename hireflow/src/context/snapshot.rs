//! Immutable copies of a run context.

use super::ContextKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One live value in a run context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// The name the value is stored under.
    pub name: ContextKey,
    /// The stored JSON value.
    pub value: serde_json::Value,
    /// Id of the stage (or "caller") that wrote the value.
    pub produced_by: String,
}

impl ContextEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(name: ContextKey, value: serde_json::Value, produced_by: impl Into<String>) -> Self {
        Self {
            name,
            value,
            produced_by: produced_by.into(),
        }
    }
}

/// A read-only copy of every entry in a run context.
///
/// Entries are ordered by key, so two snapshots of the same state compare and
/// serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// The run the snapshot was taken from.
    pub run_id: Option<Uuid>,
    entries: BTreeMap<ContextKey, ContextEntry>,
}

impl ContextSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a snapshot from entries.
    #[must_use]
    pub fn from_entries(run_id: Option<Uuid>, entries: impl IntoIterator<Item = ContextEntry>) -> Self {
        Self {
            run_id,
            entries: entries.into_iter().map(|e| (e.name, e)).collect(),
        }
    }

    /// Creates a snapshot from plain values, attributing them to `produced_by`.
    #[must_use]
    pub fn from_values(
        values: impl IntoIterator<Item = (ContextKey, serde_json::Value)>,
        produced_by: &str,
    ) -> Self {
        Self::from_entries(
            None,
            values
                .into_iter()
                .map(|(key, value)| ContextEntry::new(key, value, produced_by)),
        )
    }

    /// Gets a value. JSON `null` is reported as absent.
    #[must_use]
    pub fn get(&self, key: ContextKey) -> Option<&serde_json::Value> {
        self.entries
            .get(&key)
            .map(|e| &e.value)
            .filter(|v| !v.is_null())
    }

    /// Gets the full entry, including `null` values.
    #[must_use]
    pub fn entry(&self, key: ContextKey) -> Option<&ContextEntry> {
        self.entries.get(&key)
    }

    /// Returns true if an entry exists for the key.
    #[must_use]
    pub fn contains(&self, key: ContextKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Returns all keys, in key order.
    #[must_use]
    pub fn keys(&self) -> Vec<ContextKey> {
        self.entries.keys().copied().collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the values as a JSON object keyed by wire name.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, e)| (k.as_str().to_string(), e.value.clone()))
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_absent_for_get() {
        let snapshot = ContextSnapshot::from_values(
            [
                (ContextKey::EnrichedProfile, serde_json::Value::Null),
                (ContextKey::SemanticMatch, json!({"semantic_score": 80})),
            ],
            "test",
        );

        assert!(snapshot.get(ContextKey::EnrichedProfile).is_none());
        assert!(snapshot.contains(ContextKey::EnrichedProfile));
        assert_eq!(snapshot.get(ContextKey::SemanticMatch), Some(&json!({"semantic_score": 80})));
    }

    #[test]
    fn test_keys_are_ordered() {
        let snapshot = ContextSnapshot::from_values(
            [
                (ContextKey::FlaggedGaps, json!({})),
                (ContextKey::ProfilePath, json!("a.pdf")),
            ],
            "test",
        );
        assert_eq!(snapshot.keys(), vec![ContextKey::ProfilePath, ContextKey::FlaggedGaps]);
    }

    #[test]
    fn test_to_json_uses_wire_names() {
        let snapshot =
            ContextSnapshot::from_values([(ContextKey::ExtractedText, json!("hello"))], "extract");
        assert_eq!(snapshot.to_json(), json!({"extracted_text": "hello"}));
    }
}
