//! The sync engine instance and its drain processor.

use crate::config::EngineConfig;
use crate::connectivity::ConnectivityState;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, Subscription};
use crate::queue::OperationQueue;
use crate::remote::DocumentStore;
use ledgersync_model::time::now_millis;
use ledgersync_model::{Document, Operation, OperationKind, OperationStatus, SyncEvent};
use ledgersync_store::KeyValueStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Point-in-time engine status, for status indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    /// Effective online state.
    pub is_online: bool,
    /// Whether a drain pass is in flight.
    pub is_syncing: bool,
    /// Whether the manual-offline override is enabled.
    pub manual_offline: bool,
    /// Number of queued operations.
    pub pending_operations: usize,
    /// Per-operation summaries, in queue order.
    pub pending: Vec<PendingOperation>,
}

/// Summary of one queued operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Operation id.
    pub id: Uuid,
    /// Mutation kind.
    pub kind: OperationKind,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Admission time (millis since epoch).
    pub enqueued_at: i64,
}

/// A local-first sync engine instance.
///
/// The engine owns the operation queue, connectivity state, event bus,
/// and in-flight drain flag, and borrows its local store and remote store
/// through trait objects. Construct one per authenticated profile and
/// pass it by reference to consumers; there is no global instance.
///
/// # Lifecycle
///
/// ```no_run
/// use ledgersync_engine::{EngineConfig, MockDocumentStore, SyncEngine};
/// use ledgersync_store::MemoryStore;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let engine = SyncEngine::new(
///     EngineConfig::new(),
///     Arc::new(MemoryStore::new()),
///     Arc::new(MockDocumentStore::new()),
/// );
/// engine.load().await;            // hydrate queue + offline flag
/// engine.set_identity(Some("alice".to_string()));
/// engine.initial_sync("alice").await.ok();
/// # }
/// ```
pub struct SyncEngine {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) remote: Arc<dyn DocumentStore>,
    pub(crate) queue: OperationQueue,
    pub(crate) connectivity: ConnectivityState,
    pub(crate) events: EventBus,
    identity: RwLock<Option<String>>,
    draining: AtomicBool,
}

impl SyncEngine {
    /// Creates an engine over the given stores.
    ///
    /// The physical signal starts as connected until the platform reports
    /// otherwise; call [`SyncEngine::load`] before first use to hydrate
    /// persisted state.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn DocumentStore>,
    ) -> Self {
        let queue = OperationQueue::new(Arc::clone(&store), config.queue_key.clone());
        Self {
            config,
            store,
            remote,
            queue,
            connectivity: ConnectivityState::new(true),
            events: EventBus::new(),
            identity: RwLock::new(None),
            draining: AtomicBool::new(false),
        }
    }

    /// Hydrates persisted state: the operation queue (with corruption
    /// recovery) and the manual-offline flag.
    pub async fn load(&self) {
        self.queue.load().await;

        match self.store.get(&self.config.offline_flag_key).await {
            Ok(Some(flag)) if flag == "true" => {
                self.connectivity.set_manual_offline(true);
                tracing::info!("manual offline mode restored from store");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read manual offline flag"),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers an event listener.
    pub fn subscribe(
        &self,
        listener: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.subscribe(listener)
    }

    /// Returns the effective online state.
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Sets or clears the authenticated identity.
    ///
    /// Without an identity, writes stay local-only and are not enqueued;
    /// they are not retroactively enqueued when an identity appears later.
    pub fn set_identity(&self, identity: Option<String>) {
        *self.identity.write() = identity;
    }

    /// Returns the authenticated identity, if any.
    pub fn identity(&self) -> Option<String> {
        self.identity.read().clone()
    }

    /// Returns a point-in-time status snapshot.
    pub fn status(&self) -> SyncStatus {
        let pending: Vec<PendingOperation> = self
            .queue
            .list()
            .iter()
            .map(|op| PendingOperation {
                id: op.id,
                kind: op.kind,
                retry_count: op.retry_count,
                enqueued_at: op.enqueued_at,
            })
            .collect();

        SyncStatus {
            is_online: self.is_online(),
            is_syncing: self.draining.load(Ordering::SeqCst),
            manual_offline: self.connectivity.manual_offline(),
            pending_operations: pending.len(),
            pending,
        }
    }

    /// Records a physical connectivity signal from the platform.
    ///
    /// Emits a connectivity-changed event on an actual transition and
    /// triggers exactly one drain on the offline-to-online edge (unless
    /// the manual override is enabled).
    pub async fn handle_connectivity_change(&self, connected: bool) {
        let transition = self.connectivity.update_physical(connected);
        if transition.changed {
            tracing::info!(online = transition.online, "connectivity changed");
            self.events.publish(&SyncEvent::ConnectivityChanged {
                online: transition.online,
                manual_offline: self.connectivity.manual_offline(),
            });
        }
        if transition.should_drain {
            self.drain().await;
        }
    }

    /// Enables or disables the manual-offline override and persists it.
    ///
    /// Disabling re-checks the physical state and, if connected, triggers
    /// one drain.
    pub async fn set_manual_offline(&self, enabled: bool) -> SyncResult<()> {
        let transition = self.connectivity.set_manual_offline(enabled);
        self.store
            .set(
                &self.config.offline_flag_key,
                if enabled { "true" } else { "false" },
            )
            .await?;

        if transition.changed {
            tracing::info!(enabled, "manual offline mode changed");
            self.events.publish(&SyncEvent::ConnectivityChanged {
                online: transition.online,
                manual_offline: enabled,
            });
        }
        if transition.should_drain {
            self.drain().await;
        }
        Ok(())
    }

    /// Runs one drain pass on demand.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`] when the engine is offline.
    pub async fn manual_sync(&self) -> SyncResult<()> {
        if !self.is_online() {
            return Err(SyncError::Offline);
        }
        self.drain().await;
        Ok(())
    }

    /// Empties the queue without draining and emits a queue-reset event.
    pub async fn clear_queue(&self) {
        self.queue.clear().await;
        self.events.publish(&SyncEvent::QueueReset);
    }

    /// Drains the queue against the remote store.
    ///
    /// Idempotent and non-reentrant: a drain requested while one is in
    /// flight is dropped (newly admitted operations ride the next drain),
    /// and draining while offline is a no-op. Works over a snapshot taken
    /// at drain start; emits drain-started/-completed even when the queue
    /// is empty.
    pub async fn drain(&self) {
        if !self.is_online() {
            return;
        }
        if self.draining.swap(true, Ordering::SeqCst) {
            tracing::debug!("drain already in flight, dropping request");
            return;
        }

        self.events.publish(&SyncEvent::DrainStarted);
        let snapshot = self.queue.list();
        tracing::debug!(pending = snapshot.len(), "drain started");

        let mut failed = 0usize;
        for op in snapshot {
            match self.apply_operation(&op).await {
                Ok(()) => {
                    self.queue.dequeue_applied(op.id).await;
                    tracing::debug!(id = %op.id, kind = %op.kind, "operation applied");
                    self.events
                        .publish(&SyncEvent::OperationApplied { operation: op });
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(id = %op.id, error = %message, "operation failed");
                    let (status, evicted) =
                        self.queue
                            .record_failure(op.id, message.clone(), self.config.retry_limit);
                    if status == OperationStatus::Failed {
                        failed += 1;
                        if let Some(operation) = evicted {
                            self.events.publish(&SyncEvent::OperationFailed {
                                operation,
                                error: message,
                            });
                        }
                    }
                }
            }
        }

        self.queue.persist().await;
        self.draining.store(false, Ordering::SeqCst);
        tracing::debug!(failed, "drain completed");
        self.events.publish(&SyncEvent::DrainCompleted { failed });
    }

    /// Applies one operation remotely, using the conflict rule.
    async fn apply_operation(&self, op: &Operation) -> SyncResult<()> {
        match op.kind {
            OperationKind::Create => {
                let payload = required_payload(op)?;
                let existing = self.remote.get(&op.resource_type, &op.resource_id).await?;
                if existing.is_some() {
                    // The document already exists (a half-applied retry or
                    // another device won the race): merge instead of failing.
                    tracing::debug!(id = %op.id, "create target exists, merging");
                    let mut data = payload.clone();
                    data.set_updated_at(now_millis());
                    self.remote
                        .upsert(&op.resource_type, &op.resource_id, data, true)
                        .await
                } else {
                    self.remote
                        .upsert(&op.resource_type, &op.resource_id, payload.clone(), false)
                        .await
                }
            }
            OperationKind::Update => {
                let payload = required_payload(op)?;
                let remote_doc = self.remote.get(&op.resource_type, &op.resource_id).await?;
                match remote_doc {
                    Some(server) => {
                        let server_ts = server.updated_at().unwrap_or(0);
                        let local_ts = payload.updated_at().unwrap_or(0);
                        if server_ts > local_ts {
                            // Server is newer: remote base, queued overlay,
                            // fresh stamp.
                            tracing::debug!(
                                id = %op.id,
                                server_ts,
                                local_ts,
                                "conflict detected, merging"
                            );
                            let now = now_millis();
                            let mut merged = server;
                            merged.merge_from(payload);
                            merged.set_updated_at(now);
                            merged.insert(Document::CONFLICT_RESOLVED, Value::Bool(true));
                            merged.insert(Document::LAST_SYNCED_AT, Value::from(now));
                            self.remote
                                .upsert(&op.resource_type, &op.resource_id, merged, true)
                                .await
                        } else {
                            let mut data = payload.clone();
                            data.insert(Document::LAST_SYNCED_AT, Value::from(now_millis()));
                            self.remote
                                .upsert(&op.resource_type, &op.resource_id, data, true)
                                .await
                        }
                    }
                    None => {
                        self.remote
                            .upsert(&op.resource_type, &op.resource_id, payload.clone(), false)
                            .await
                    }
                }
            }
            OperationKind::Delete => self.remote.delete(&op.resource_type, &op.resource_id).await,
        }
    }

    /// Reads a cached document array from the store; missing reads empty.
    pub(crate) async fn read_documents(&self, key: &str) -> SyncResult<Vec<Document>> {
        match self.store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Writes a cached document array to the store.
    pub(crate) async fn write_documents(&self, key: &str, docs: &[Document]) -> SyncResult<()> {
        let json = serde_json::to_string(docs)?;
        self.store.set(key, &json).await?;
        Ok(())
    }
}

fn required_payload(op: &Operation) -> SyncResult<&Document> {
    op.payload
        .as_ref()
        .ok_or_else(|| SyncError::MalformedOperation(format!("{} without payload", op.kind)))
}

/// Store key of a cached collection.
pub(crate) fn collection_key(resource_type: &str, owner_id: &str) -> String {
    format!("{resource_type}_{owner_id}")
}

/// Store key of the cached settings document.
pub(crate) fn settings_key(owner_id: &str) -> String {
    format!("settings_{owner_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockDocumentStore;
    use ledgersync_store::MemoryStore;
    use parking_lot::Mutex;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    struct Harness {
        engine: SyncEngine,
        remote: Arc<MockDocumentStore>,
        events: Arc<Mutex<Vec<SyncEvent>>>,
        _subscription: crate::events::Subscription,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(MockDocumentStore::new());
        let engine = SyncEngine::new(
            EngineConfig::new(),
            store,
            Arc::clone(&remote) as Arc<dyn DocumentStore>,
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = engine.subscribe(move |event| sink.lock().push(event.clone()));

        Harness {
            engine,
            remote,
            events,
            _subscription: subscription,
        }
    }

    fn event_kinds(events: &Arc<Mutex<Vec<SyncEvent>>>) -> Vec<&'static str> {
        events.lock().iter().map(SyncEvent::kind).collect()
    }

    #[tokio::test]
    async fn update_with_stale_payload_merges_remote_base() {
        let h = harness();
        h.remote.insert(
            "entries",
            "alice_e1",
            doc(json!({"title": "Server title", "note": "server-only", "updatedAt": 100})),
        );

        let mut payload = doc(json!({"title": "Client title"}));
        payload.set_updated_at(50);
        h.engine
            .queue
            .enqueue(Operation::update("entries", "alice_e1", payload))
            .await;

        h.engine.drain().await;

        let written = h.remote.document("entries", "alice_e1").unwrap();
        // Queued overlay wins on shared fields, remote base survives
        assert_eq!(written.get("title"), Some(&json!("Client title")));
        assert_eq!(written.get("note"), Some(&json!("server-only")));
        assert_eq!(written.get(Document::CONFLICT_RESOLVED), Some(&json!(true)));
        assert!(written.get(Document::LAST_SYNCED_AT).is_some());
        // Fresh stamp, not either input's
        let stamp = written.updated_at().unwrap();
        assert!(stamp > 100);
        assert!(h.engine.queue.is_empty());
    }

    #[tokio::test]
    async fn update_with_fresh_payload_writes_as_is() {
        let h = harness();
        h.remote.insert(
            "entries",
            "alice_e1",
            doc(json!({"title": "Server title", "updatedAt": 100})),
        );

        let mut payload = doc(json!({"title": "Client title"}));
        payload.set_updated_at(150);
        h.engine
            .queue
            .enqueue(Operation::update("entries", "alice_e1", payload))
            .await;

        h.engine.drain().await;

        let written = h.remote.document("entries", "alice_e1").unwrap();
        assert_eq!(written.get("title"), Some(&json!("Client title")));
        assert_eq!(written.updated_at(), Some(150));
        assert_eq!(written.get(Document::CONFLICT_RESOLVED), None);
        assert!(written.get(Document::LAST_SYNCED_AT).is_some());
    }

    #[tokio::test]
    async fn update_without_remote_document_creates_it() {
        let h = harness();

        let mut payload = doc(json!({"title": "New"}));
        payload.set_updated_at(50);
        h.engine
            .queue
            .enqueue(Operation::update("entries", "alice_e1", payload))
            .await;

        h.engine.drain().await;

        let written = h.remote.document("entries", "alice_e1").unwrap();
        assert_eq!(written.get("title"), Some(&json!("New")));
        // A plain create, not a merge
        assert!(!h.remote.upserts().last().unwrap().merge);
    }

    #[tokio::test]
    async fn create_against_existing_document_converts_to_merge() {
        let h = harness();
        h.remote.insert(
            "entries",
            "alice_e1",
            doc(json!({"title": "Already there", "note": "keep", "updatedAt": 100})),
        );

        let mut payload = doc(json!({"title": "Retried create"}));
        payload.set_updated_at(50);
        h.engine
            .queue
            .enqueue(Operation::create("entries", "alice_e1", payload))
            .await;

        h.engine.drain().await;

        let written = h.remote.document("entries", "alice_e1").unwrap();
        assert_eq!(written.get("title"), Some(&json!("Retried create")));
        assert_eq!(written.get("note"), Some(&json!("keep")));
        assert!(written.updated_at().unwrap() > 100);
        assert!(h.remote.upserts().last().unwrap().merge);
    }

    #[tokio::test]
    async fn delete_removes_remote_document() {
        let h = harness();
        h.remote.insert("entries", "alice_e1", doc(json!({})));

        h.engine
            .queue
            .enqueue(Operation::delete("entries", "alice_e1"))
            .await;
        h.engine.drain().await;

        assert!(h.remote.is_empty());
        assert!(h.engine.queue.is_empty());
    }

    #[tokio::test]
    async fn drain_on_empty_queue_emits_lifecycle_events_only() {
        let h = harness();

        h.engine.drain().await;
        h.engine.drain().await;

        assert_eq!(
            event_kinds(&h.events),
            vec![
                "drain_started",
                "drain_completed",
                "drain_started",
                "drain_completed"
            ]
        );
        let completions: Vec<_> = h
            .events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SyncEvent::DrainCompleted { failed } => Some(*failed),
                _ => None,
            })
            .collect();
        assert_eq!(completions, vec![0, 0]);
    }

    #[tokio::test]
    async fn drain_while_offline_is_a_noop() {
        let h = harness();
        h.engine.handle_connectivity_change(false).await;
        h.events.lock().clear();

        h.engine
            .queue
            .enqueue(Operation::delete("entries", "alice_e1"))
            .await;
        h.engine.drain().await;

        assert_eq!(h.engine.queue.len(), 1);
        assert!(event_kinds(&h.events).is_empty());
    }

    #[tokio::test]
    async fn failure_below_ceiling_keeps_operation_queued() {
        let h = harness();
        h.remote.fail_next(1);

        h.engine
            .queue
            .enqueue(Operation::delete("entries", "alice_e1"))
            .await;
        h.engine.drain().await;

        let items = h.engine.queue.list();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].retry_count, 1);
        assert!(items[0].last_error.is_some());
        assert_eq!(
            event_kinds(&h.events),
            vec!["drain_started", "drain_completed"]
        );
    }

    #[tokio::test]
    async fn status_reflects_queue_and_connectivity() {
        let h = harness();
        h.engine.handle_connectivity_change(false).await;
        h.engine
            .queue
            .enqueue(Operation::delete("entries", "alice_e1"))
            .await;

        let status = h.engine.status();
        assert!(!status.is_online);
        assert!(!status.is_syncing);
        assert_eq!(status.pending_operations, 1);
        assert_eq!(status.pending[0].kind, OperationKind::Delete);
        assert_eq!(status.pending[0].retry_count, 0);
    }

    #[tokio::test]
    async fn manual_sync_fails_offline() {
        let h = harness();
        h.engine.handle_connectivity_change(false).await;

        let result = h.engine.manual_sync().await;
        assert!(matches!(result, Err(SyncError::Offline)));
    }

    #[tokio::test]
    async fn clear_queue_emits_reset() {
        let h = harness();
        h.engine
            .queue
            .enqueue(Operation::delete("entries", "alice_e1"))
            .await;

        h.engine.clear_queue().await;

        assert!(h.engine.queue.is_empty());
        assert!(event_kinds(&h.events).contains(&"queue_reset"));
    }
}
