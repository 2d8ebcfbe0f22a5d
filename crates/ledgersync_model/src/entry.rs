//! The ledger entry entity and its untyped input form.

use crate::document::Document;
use crate::validate::{validate_entry, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Category tag of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Money going out.
    Spending,
    /// Money set aside.
    Saving,
}

impl Category {
    /// Parses a category tag as it appears in drafts and documents.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "spending" => Some(Category::Spending),
            "saving" => Some(Category::Saving),
            _ => None,
        }
    }

    /// Returns the wire tag for this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Spending => "spending",
            Category::Saving => "saving",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry owned by exactly one identity.
///
/// Entries are constructed from an [`EntryDraft`] after validation, so a
/// `LedgerEntry` value is always structurally valid. `updated_at` is the
/// sole conflict-resolution signal: whichever copy of an entry carries the
/// greater value wins a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Stable entity id.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Amount; always finite and greater than zero.
    pub amount: f64,
    /// Category tag.
    pub category: Category,
    /// When the underlying event happened (millis since epoch).
    pub occurred_at: i64,
    /// Last local write time (millis since epoch); the conflict signal.
    #[serde(default)]
    pub updated_at: i64,
}

impl LedgerEntry {
    /// Serializes the entry into a schemaless [`Document`].
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be represented as JSON
    /// (a non-finite amount).
    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        serde_json::to_value(self).map(|value| match value {
            serde_json::Value::Object(map) => Document::from(map),
            // Serializing a struct always yields an object.
            _ => Document::new(),
        })
    }

    /// Deserializes an entry from a cached or remote [`Document`].
    ///
    /// Unknown fields are ignored; a missing `updatedAt` reads as 0.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or mistyped.
    pub fn from_document(document: &Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(document.clone().into_inner()))
    }
}

/// Untyped entry input, as captured by a form.
///
/// A draft carries raw strings and optional fields; it becomes a
/// [`LedgerEntry`] only after passing validation via
/// [`EntryDraft::into_entry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    /// Existing entity id; `None` for a brand-new entry.
    #[serde(default)]
    pub id: Option<String>,
    /// Raw title text.
    #[serde(default)]
    pub title: String,
    /// Raw amount text; must parse to a number greater than zero.
    #[serde(default)]
    pub amount: String,
    /// Raw category tag; must be a recognized [`Category`].
    #[serde(default)]
    pub category: String,
    /// When the underlying event happened (millis since epoch).
    #[serde(default)]
    pub occurred_at: Option<i64>,
}

impl EntryDraft {
    /// Validates this draft against the entry rules.
    #[must_use]
    pub fn validate(&self) -> Validation {
        validate_entry(self)
    }

    /// Consumes the draft into a typed entry, stamping `updated_at = now`.
    ///
    /// A draft without an id receives a fresh one.
    ///
    /// # Errors
    ///
    /// Returns the failed [`Validation`] when the draft is invalid.
    pub fn into_entry(self, now: i64) -> Result<LedgerEntry, Validation> {
        let validation = self.validate();
        if !validation.is_valid() {
            return Err(validation);
        }

        // validate() guarantees these parse.
        let amount = self.amount.trim().parse::<f64>().unwrap_or_default();
        let category = Category::parse(self.category.trim()).unwrap_or(Category::Spending);
        let occurred_at = self.occurred_at.unwrap_or_default();

        Ok(LedgerEntry {
            id: self
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: self.title,
            amount,
            category,
            occurred_at,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EntryDraft {
        EntryDraft {
            id: None,
            title: "Lunch".to_string(),
            amount: "12.50".to_string(),
            category: "spending".to_string(),
            occurred_at: Some(1_000),
        }
    }

    #[test]
    fn category_parse_and_display() {
        assert_eq!(Category::parse("spending"), Some(Category::Spending));
        assert_eq!(Category::parse("saving"), Some(Category::Saving));
        assert_eq!(Category::parse("splurging"), None);
        assert_eq!(Category::Saving.to_string(), "saving");
    }

    #[test]
    fn draft_into_entry_stamps_id_and_updated_at() {
        let entry = draft().into_entry(42).unwrap();
        assert!(!entry.id.is_empty());
        assert_eq!(entry.updated_at, 42);
        assert_eq!(entry.amount, 12.5);
        assert_eq!(entry.category, Category::Spending);
    }

    #[test]
    fn draft_keeps_existing_id() {
        let mut d = draft();
        d.id = Some("entry-7".to_string());
        let entry = d.into_entry(42).unwrap();
        assert_eq!(entry.id, "entry-7");
    }

    #[test]
    fn invalid_draft_is_rejected() {
        let mut d = draft();
        d.title = "   ".to_string();
        let validation = d.into_entry(42).unwrap_err();
        assert!(!validation.is_valid());
    }

    #[test]
    fn entry_document_roundtrip() {
        let entry = draft().into_entry(42).unwrap();
        let document = entry.to_document().unwrap();

        assert_eq!(document.id(), Some(entry.id.as_str()));
        assert_eq!(document.updated_at(), Some(42));

        let back = LedgerEntry::from_document(&document).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn from_document_tolerates_extra_fields() {
        let mut document = draft().into_entry(42).unwrap().to_document().unwrap();
        document.insert("ownerId", serde_json::Value::String("alice".into()));

        let entry = LedgerEntry::from_document(&document).unwrap();
        assert_eq!(entry.title, "Lunch");
    }
}
