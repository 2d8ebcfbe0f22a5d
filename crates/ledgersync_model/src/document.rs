//! Schemaless JSON document payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A schemaless JSON object.
///
/// `Document` is the shape of everything that crosses the engine's
/// persistence and remote boundaries: queue payloads, remote store
/// documents, and cached collection elements. It serializes transparently
/// as a JSON object.
///
/// The engine's conflict rule only ever inspects two well-known fields,
/// [`Document::ID`] and [`Document::UPDATED_AT`]; all other fields are
/// carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Field holding the entity id.
    pub const ID: &'static str = "id";
    /// Field holding the last-write timestamp (millis since epoch).
    pub const UPDATED_AT: &'static str = "updatedAt";
    /// Field marking a document that was produced by conflict resolution.
    pub const CONFLICT_RESOLVED: &'static str = "conflictResolved";
    /// Field stamped with the time of the last successful remote write.
    pub const LAST_SYNCED_AT: &'static str = "lastSyncedAt";
    /// Field holding the owning identity on remote documents.
    pub const OWNER_ID: &'static str = "ownerId";

    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets `field` to `value`, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow-merges `overlay` into this document; overlay fields win.
    pub fn merge_from(&mut self, overlay: &Document) {
        for (field, value) in &overlay.0 {
            self.0.insert(field.clone(), value.clone());
        }
    }

    /// Returns the entity id, if present and a string.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get(Self::ID).and_then(Value::as_str)
    }

    /// Sets the entity id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.insert(Self::ID, Value::String(id.into()));
    }

    /// Returns the last-write timestamp, if present.
    ///
    /// Accepts integer or float encodings; documents written by other
    /// clients are not guaranteed to use integers.
    #[must_use]
    pub fn updated_at(&self) -> Option<i64> {
        self.get(Self::UPDATED_AT).and_then(as_millis)
    }

    /// Stamps the last-write timestamp.
    pub fn set_updated_at(&mut self, millis: i64) {
        self.insert(Self::UPDATED_AT, Value::from(millis));
    }

    /// Consumes the document into its underlying map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn as_millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn merge_overlay_wins() {
        let mut base = doc(json!({"a": 1, "b": "old"}));
        let overlay = doc(json!({"b": "new", "c": true}));

        base.merge_from(&overlay);

        assert_eq!(base, doc(json!({"a": 1, "b": "new", "c": true})));
    }

    #[test]
    fn merge_from_empty_is_noop() {
        let mut base = doc(json!({"a": 1}));
        base.merge_from(&Document::new());
        assert_eq!(base, doc(json!({"a": 1})));
    }

    #[test]
    fn updated_at_accepts_integer_and_float() {
        assert_eq!(doc(json!({"updatedAt": 100})).updated_at(), Some(100));
        assert_eq!(doc(json!({"updatedAt": 100.0})).updated_at(), Some(100));
        assert_eq!(doc(json!({"updatedAt": "100"})).updated_at(), None);
        assert_eq!(Document::new().updated_at(), None);
    }

    #[test]
    fn stamp_and_read_back() {
        let mut d = Document::new();
        d.set_updated_at(42);
        d.set_id("entry-1");

        assert_eq!(d.updated_at(), Some(42));
        assert_eq!(d.id(), Some("entry-1"));
    }

    #[test]
    fn transparent_serialization() {
        let d = doc(json!({"title": "Lunch", "amount": 9.5}));
        let text = serde_json::to_string(&d).unwrap();
        let back: Document = serde_json::from_str(&text).unwrap();
        assert_eq!(back, d);
    }
}
