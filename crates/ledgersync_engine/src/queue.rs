//! The persisted operation queue.

use ledgersync_model::time::now_millis;
use ledgersync_model::{Operation, OperationKind, OperationStatus};
use ledgersync_store::KeyValueStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// An ordered, persisted queue of pending mutations.
///
/// The queue owns admission (dedup and merge), persistence, corruption
/// recovery, and retry accounting. Every structural change re-persists
/// the full queue as a JSON array under the configured store key; a
/// persist failure is logged and does not fail the mutation, since the
/// caller's write has already succeeded locally.
///
/// Locks are never held across a store await: mutations run under the
/// lock, then a snapshot is persisted.
pub struct OperationQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    items: Mutex<Vec<Operation>>,
}

impl OperationQueue {
    /// Creates an empty queue persisted under `key`.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            items: Mutex::new(Vec::new()),
        }
    }

    /// Reconstructs the queue from the store.
    ///
    /// A missing value loads an empty queue. A value that is not a
    /// well-formed JSON array resets the queue; an element that fails the
    /// shape check (or reuses an id) is dropped. The sanitized queue is
    /// re-persisted immediately so corruption cannot recur on the next
    /// load. Never propagates an error.
    pub async fn load(&self) {
        let raw = match self.store.get(&self.key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted queue");
                return;
            }
        };
        let Some(raw) = raw else {
            return;
        };

        let sanitized = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(elements)) => {
                let total = elements.len();
                let mut seen = HashSet::new();
                let ops: Vec<Operation> = elements
                    .into_iter()
                    .filter_map(|element| serde_json::from_value::<Operation>(element).ok())
                    .filter(|op| op.is_well_formed() && seen.insert(op.id))
                    .collect();
                if ops.len() < total {
                    tracing::warn!(
                        dropped = total - ops.len(),
                        kept = ops.len(),
                        "dropped malformed queue entries"
                    );
                }
                ops
            }
            Ok(_) => {
                tracing::warn!("persisted queue is not an array, resetting");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "persisted queue is unreadable, resetting");
                Vec::new()
            }
        };

        *self.items.lock() = sanitized;
        self.persist().await;
    }

    /// Admits an operation, returning the id of the queued entry.
    ///
    /// A duplicate Create for an already-queued resource is discarded and
    /// the existing entry's id is returned. An Update targeting a queued
    /// Create or Update merges into the existing entry. Anything else
    /// appends.
    pub async fn enqueue(&self, op: Operation) -> Uuid {
        let (id, changed) = {
            let mut items = self.items.lock();
            admit(&mut items, op)
        };
        if changed {
            self.persist().await;
        }
        id
    }

    /// Returns an ordered snapshot of the queue.
    pub fn list(&self) -> Vec<Operation> {
        self.items.lock().clone()
    }

    /// Returns the number of pending operations.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Removes a successfully-applied operation and persists.
    pub async fn dequeue_applied(&self, id: Uuid) {
        {
            let mut items = self.items.lock();
            items.retain(|op| op.id != id);
        }
        self.persist().await;
    }

    /// Records a failed attempt against a queued operation.
    ///
    /// Increments the retry count and stores the error message. At
    /// `retry_limit` the operation is evicted and returned alongside
    /// [`OperationStatus::Failed`]; otherwise it stays queued as
    /// [`OperationStatus::Retrying`]. An id that is no longer queued
    /// (cleared mid-drain) records nothing and reports
    /// [`OperationStatus::Pending`]. Persistence is the caller's
    /// responsibility at the end of the drain pass.
    pub fn record_failure(
        &self,
        id: Uuid,
        error: impl Into<String>,
        retry_limit: u32,
    ) -> (OperationStatus, Option<Operation>) {
        let mut items = self.items.lock();
        let Some(index) = items.iter().position(|op| op.id == id) else {
            return (OperationStatus::Pending, None);
        };

        let op = &mut items[index];
        op.retry_count += 1;
        op.last_error = Some(error.into());

        if op.retry_count >= retry_limit {
            let evicted = items.remove(index);
            (OperationStatus::Failed, Some(evicted))
        } else {
            (OperationStatus::Retrying(op.retry_count), None)
        }
    }

    /// Persists the current queue; a failure is logged, not propagated.
    pub async fn persist(&self) {
        let snapshot = self.list();
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                if let Err(e) = self.store.set(&self.key, &json).await {
                    tracing::warn!(error = %e, "failed to persist queue");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize queue"),
        }
    }

    /// Empties the queue and persists.
    pub async fn clear(&self) {
        self.items.lock().clear();
        self.persist().await;
    }
}

/// Applies the admission rules to an in-memory queue.
///
/// Returns the id of the entry now covering the operation and whether the
/// queue changed structurally (a discarded duplicate Create does not).
fn admit(items: &mut Vec<Operation>, op: Operation) -> (Uuid, bool) {
    if op.kind == OperationKind::Create {
        if let Some(existing) = items.iter().find(|queued| {
            queued.kind == OperationKind::Create
                && queued.targets(&op.resource_type, &op.resource_id)
        }) {
            tracing::debug!(
                resource_type = %op.resource_type,
                resource_id = %op.resource_id,
                "duplicate create suppressed"
            );
            return (existing.id, false);
        }
    }

    if op.kind == OperationKind::Update {
        if let Some(existing) = items.iter_mut().find(|queued| {
            !queued.kind.is_delete() && queued.targets(&op.resource_type, &op.resource_id)
        }) {
            // Merge into the queued entry; its id, kind, and position stay.
            if let (Some(base), Some(overlay)) = (existing.payload.as_mut(), op.payload.as_ref()) {
                base.merge_from(overlay);
                base.set_updated_at(now_millis());
            }
            return (existing.id, true);
        }
    }

    let id = op.id;
    items.push(op);
    (id, true)
}
