//! # LedgerSync Store
//!
//! Local persistent key-value cache for LedgerSync.
//!
//! This crate provides the lowest-level persistence abstraction for the
//! sync engine. Stores are **opaque string stores** - they do not interpret
//! the values they hold. The engine owns all format interpretation (the
//! serialized operation queue, cached collections, flags).
//!
//! ## Design Principles
//!
//! - Stores hold whole values per key (get, set, remove); no partial writes
//! - No knowledge of queue layout, entity collections, or flag encodings
//! - All I/O is async; implementations must be `Send + Sync`
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral state
//! - [`FileStore`] - For persistent storage, one file per key
//!
//! ## Example
//!
//! ```rust
//! use ledgersync_store::{KeyValueStore, MemoryStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! store.set("greeting", "hello").await.unwrap();
//! assert_eq!(store.get("greeting").await.unwrap().as_deref(), Some("hello"));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::KeyValueStore;
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
