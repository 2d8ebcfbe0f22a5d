//! Key-value store trait definition.

use crate::error::StoreResult;
use async_trait::async_trait;

/// A local persistent key-value store.
///
/// Stores are **opaque string stores**. They provide whole-value reads and
/// writes keyed by short string names. The sync engine owns all format
/// interpretation - stores do not understand the operation queue, cached
/// collections, or flag encodings they hold.
///
/// # Invariants
///
/// - `get` returns exactly the value last passed to `set` for that key
/// - `set` replaces the whole value; there are no partial writes
/// - `remove` on a missing key is a no-op
/// - Implementations must be `Send + Sync` for shared access
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `None` if the key has never been set or has been removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// After this returns successfully, the value is durable to the extent
    /// the implementation supports (in-memory stores are not durable).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid for this store or an I/O
    /// error occurs.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    async fn remove(&self, key: &str) -> StoreResult<()>;
}
