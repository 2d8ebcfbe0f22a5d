//! Queued mutation records.

use crate::document::Document;
use crate::time::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    /// A new document should exist remotely.
    Create,
    /// An existing document should be merge-written remotely.
    Update,
    /// The document should be removed remotely.
    Delete,
}

impl OperationKind {
    /// Returns true for Delete operations (which carry no payload).
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, OperationKind::Delete)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => f.write_str("CREATE"),
            OperationKind::Update => f.write_str("UPDATE"),
            OperationKind::Delete => f.write_str("DELETE"),
        }
    }
}

/// A queued, persisted mutation awaiting remote application.
///
/// Operations are created by the write API, mutated only by queue
/// admission (payload merge) and the drain processor (retry accounting),
/// and destroyed on successful remote application or at the retry ceiling.
///
/// Serialized as camelCase JSON; this is the persisted queue's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Unique operation id, generated at admission.
    pub id: Uuid,
    /// Mutation kind.
    pub kind: OperationKind,
    /// Logical collection name.
    pub resource_type: String,
    /// Remote document id.
    pub resource_id: String,
    /// Entity fields plus an `updatedAt` stamp; absent for Delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Document>,
    /// When the operation was admitted (millis since epoch).
    pub enqueued_at: i64,
    /// Failed drain attempts so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Message from the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Operation {
    /// Creates a Create operation for a document that is new remotely.
    #[must_use]
    pub fn create(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Document,
    ) -> Self {
        Self::new(OperationKind::Create, resource_type, resource_id, Some(payload))
    }

    /// Creates an Update operation carrying the fields to merge-write.
    #[must_use]
    pub fn update(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Document,
    ) -> Self {
        Self::new(OperationKind::Update, resource_type, resource_id, Some(payload))
    }

    /// Creates a Delete operation; deletes carry no payload.
    #[must_use]
    pub fn delete(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self::new(OperationKind::Delete, resource_type, resource_id, None)
    }

    fn new(
        kind: OperationKind,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Option<Document>,
    ) -> Self {
        let now = now_millis();
        let payload = payload.map(|mut p| {
            if p.updated_at().is_none() {
                p.set_updated_at(now);
            }
            p
        });

        Self {
            id: Uuid::new_v4(),
            kind,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            payload,
            enqueued_at: now,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Returns true if this operation targets the given resource.
    #[must_use]
    pub fn targets(&self, resource_type: &str, resource_id: &str) -> bool {
        self.resource_type == resource_type && self.resource_id == resource_id
    }

    /// Shape check used when sanitizing a loaded queue.
    ///
    /// The kind and id are already enforced by deserialization; this
    /// checks the cross-field rules: non-empty resource coordinates, an
    /// admission timestamp, and a payload present unless the kind is
    /// Delete.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.resource_type.is_empty()
            && !self.resource_id.is_empty()
            && self.enqueued_at > 0
            && (self.kind.is_delete() || self.payload.is_some())
    }
}

/// Lifecycle of a queued operation.
///
/// `Pending → (Applied | Retrying(n) → Pending | Failed)`. Applied and
/// Failed are terminal; the operation leaves the queue in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Waiting for a drain pass.
    Pending,
    /// Failed `n` times; still queued for the next drain.
    Retrying(u32),
    /// Applied remotely and removed from the queue.
    Applied,
    /// Reached the retry ceiling and was dropped from the queue.
    Failed,
}

impl OperationStatus {
    /// Returns true once the operation has left the queue.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Applied | OperationStatus::Failed)
    }
}
