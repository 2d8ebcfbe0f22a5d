//! # LedgerSync Model
//!
//! Domain types for LedgerSync.
//!
//! This crate provides:
//! - [`Document`] - schemaless JSON object payloads with merge helpers
//! - [`Operation`] - queued mutation records with kind-specific constructors
//! - [`OperationStatus`] - the explicit per-operation lifecycle
//! - [`LedgerEntry`] / [`EntryDraft`] - the typed entity and its untyped input
//! - [`SyncEvent`] - lifecycle notifications consumed by subscribers
//! - the entry validator
//!
//! This is a pure types crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod entry;
mod event;
mod operation;
pub mod time;
mod validate;

pub use document::Document;
pub use entry::{Category, EntryDraft, LedgerEntry};
pub use event::SyncEvent;
pub use operation::{Operation, OperationKind, OperationStatus};
pub use validate::{validate_entry, Validation};
