//! The flat record produced by the merge engine.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Mapping from field name to value, with no fixed schema.
///
/// Fields are kept in key order, which makes serialization deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedRecord {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl MergedRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }

    /// Gets a field that holds a string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(serde_json::Value::as_str)
    }

    /// Checks if a field exists.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Sets a field, returning the value it replaced.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.fields.insert(field.into(), value)
    }

    /// Copies every field of `source`, overwriting same-named fields.
    pub fn extend_overwriting(&mut self, source: serde_json::Map<String, serde_json::Value>) {
        for (field, value) in source {
            self.fields.insert(field, value);
        }
    }

    /// Returns the field names, in key order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the record as a JSON object row.
    #[must_use]
    pub fn to_row(&self) -> serde_json::Value {
        serde_json::Value::Object(self.fields.clone())
    }

    /// SHA-256 of the canonical JSON encoding, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let encoded = self.to_row().to_string();
        hex::encode(Sha256::digest(encoded.as_bytes()))
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for MergedRecord {
    fn from(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_overwrite() {
        let mut record = MergedRecord::new();
        assert!(record.insert("name", json!("Ada")).is_none());
        assert_eq!(record.insert("name", json!("Grace")), Some(json!("Ada")));
        assert_eq!(record.get_str("name"), Some("Grace"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_field_names_are_sorted() {
        let mut record = MergedRecord::new();
        record.insert("skills", json!("SQL"));
        record.insert("email", json!("a@b.c"));
        assert_eq!(record.field_names(), vec!["email", "skills"]);
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let mut a = MergedRecord::new();
        a.insert("x", json!(1));
        a.insert("y", json!(2));
        let mut b = MergedRecord::new();
        b.insert("y", json!(2));
        b.insert("x", json!(1));

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        b.insert("x", json!(3));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let mut record = MergedRecord::new();
        record.insert("overall_fit", json!(82));
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"overall_fit":82}"#);
    }
}
