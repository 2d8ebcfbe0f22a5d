//! Entry validation.
//!
//! Validation runs synchronously before any local write or enqueue;
//! failures are returned to the caller and never reach the queue.

use crate::entry::{Category, EntryDraft};

/// Outcome of validating an [`EntryDraft`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Human-readable descriptions of every rule the draft broke.
    pub errors: Vec<String>,
}

impl Validation {
    /// Returns true if the draft broke no rules.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates an entry draft against the structural rules.
///
/// Checks: title is non-empty, amount parses to a finite number greater
/// than zero, category is a recognized tag, and an occurred-at timestamp
/// is present. All rules are checked; `errors` reports every failure, not
/// just the first.
#[must_use]
pub fn validate_entry(draft: &EntryDraft) -> Validation {
    let mut errors = Vec::new();

    if draft.title.trim().is_empty() {
        errors.push("title is required and must be a non-empty string".to_string());
    }

    match draft.amount.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => {}
        _ => errors.push("amount must be a number greater than zero".to_string()),
    }

    if Category::parse(draft.category.trim()).is_none() {
        errors.push("category must be one of: spending, saving".to_string());
    }

    if draft.occurred_at.is_none() {
        errors.push("date is required".to_string());
    }

    Validation { errors }
}
