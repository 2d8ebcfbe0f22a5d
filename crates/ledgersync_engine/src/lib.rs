//! # LedgerSync Engine
//!
//! Offline-first synchronization engine for LedgerSync.
//!
//! This crate provides:
//! - [`OperationQueue`] - persisted, deduplicating operation queue with
//!   corruption recovery
//! - [`SyncEngine`] - drain processor with last-write-wins conflict
//!   resolution and retry accounting
//! - Reconciliation - bulk collection merge and the initial startup sync
//! - [`ConnectivityState`] - physical signal plus manual-offline override
//! - [`EventBus`] - synchronous pub/sub with isolated subscribers
//! - [`DocumentStore`] - the remote store abstraction, with
//!   [`MockDocumentStore`] for tests
//!
//! ## Architecture
//!
//! Writes are **local-first**: a write is complete once applied to the
//! local cache, and remote propagation happens asynchronously through the
//! queue. On a cold start the reconciler pulls and merges remote state
//! before the drain processor flushes any carried-over queue.
//!
//! ## Key Invariants
//!
//! - At most one queued Create per resource; a second Update merges into
//!   the queued entry instead of appending
//! - Conflicts resolve by recency: the greater `updatedAt` wins
//! - An operation is dropped after the configured number of failed drains
//! - Queue corruption is recovered on load and never surfaces to callers
//! - Drains never overlap; a drain requested mid-drain is dropped
//!
//! ## Example
//!
//! ```no_run
//! use ledgersync_engine::{EngineConfig, MockDocumentStore, SyncEngine};
//! use ledgersync_model::EntryDraft;
//! use ledgersync_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = SyncEngine::new(
//!     EngineConfig::new(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MockDocumentStore::new()),
//! );
//! engine.load().await;
//! engine.set_identity(Some("alice".to_string()));
//!
//! let draft = EntryDraft {
//!     title: "Lunch".to_string(),
//!     amount: "12.50".to_string(),
//!     category: "spending".to_string(),
//!     occurred_at: Some(1_700_000_000_000),
//!     ..EntryDraft::default()
//! };
//! engine.save_entry(draft, "alice").await.unwrap();
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod connectivity;
mod engine;
mod error;
mod events;
mod queue;
mod reconcile;
mod remote;

pub use config::EngineConfig;
pub use connectivity::{ConnectivityState, Transition};
pub use engine::{PendingOperation, SyncEngine, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use events::{EventBus, Subscription};
pub use queue::OperationQueue;
pub use remote::{DocumentStore, MockDocumentStore, UpsertRecord};
