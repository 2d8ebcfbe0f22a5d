//! Error types for the sync engine.

use ledgersync_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in the sync engine.
///
/// Validation failures are the only errors returned synchronously from the
/// write API; remote failures surface through retry accounting and events,
/// and queue corruption is recovered internally without ever reaching a
/// caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote document store failed.
    #[error("remote store error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The engine is offline (physically or by manual override).
    #[error("engine is offline")]
    Offline,

    /// No authenticated identity is set.
    #[error("no authenticated identity")]
    IdentityMissing,

    /// An operation in the queue is structurally unusable.
    #[error("malformed operation: {0}")]
    MalformedOperation(String),

    /// An entry draft broke one or more validation rules.
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

impl SyncError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { retryable, .. } => *retryable,
            SyncError::Offline => true,
            _ => false,
        }
    }
}
