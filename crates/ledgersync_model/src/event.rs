//! Lifecycle events published by the engine.

use crate::operation::Operation;

/// A lifecycle notification published to subscribers.
///
/// Events describe what the engine did; they carry no control authority.
/// Consumers typically feed a status indicator (pending count,
/// online/offline) rather than per-event dialogs.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Effective connectivity changed (physical transition or manual
    /// override toggle).
    ConnectivityChanged {
        /// Effective online state (physical AND not manually offline).
        online: bool,
        /// Whether the manual offline override is enabled.
        manual_offline: bool,
    },
    /// A drain pass started.
    DrainStarted,
    /// An operation was applied remotely and left the queue.
    OperationApplied {
        /// The applied operation.
        operation: Operation,
    },
    /// An operation hit the retry ceiling and was dropped.
    OperationFailed {
        /// The dropped operation.
        operation: Operation,
        /// The final attempt's error message.
        error: String,
    },
    /// A drain pass finished.
    DrainCompleted {
        /// Operations permanently failed during this pass.
        failed: usize,
    },
    /// A collection was bulk-merged with the remote store.
    CollectionReconciled {
        /// The reconciled collection.
        resource_type: String,
        /// Entity count after the merge.
        merged: usize,
    },
    /// The cached settings document was refreshed from the remote store.
    SettingsReconciled,
    /// The queue was emptied without draining.
    QueueReset,
}

impl SyncEvent {
    /// Short tag for logging and test assertions.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::ConnectivityChanged { .. } => "connectivity_changed",
            SyncEvent::DrainStarted => "drain_started",
            SyncEvent::OperationApplied { .. } => "operation_applied",
            SyncEvent::OperationFailed { .. } => "operation_failed",
            SyncEvent::DrainCompleted { .. } => "drain_completed",
            SyncEvent::CollectionReconciled { .. } => "collection_reconciled",
            SyncEvent::SettingsReconciled => "settings_reconciled",
            SyncEvent::QueueReset => "queue_reset",
        }
    }
}
