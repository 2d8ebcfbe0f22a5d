//! The caller-facing write API.
//!
//! Writes are local-first: the cache write completes before anything is
//! queued, and remote propagation is asynchronous and event-based.
//! Validation failures are the only errors a caller sees synchronously.

use crate::engine::{collection_key, settings_key, SyncEngine};
use crate::error::{SyncError, SyncResult};
use ledgersync_model::time::now_millis;
use ledgersync_model::{Document, EntryDraft, LedgerEntry, Operation};
use serde_json::Value;

impl SyncEngine {
    /// Saves an entry: validate, write locally, queue for sync.
    ///
    /// A draft without an id creates a new entry; a draft with the id of
    /// a cached entry updates it. When an identity is set, the matching
    /// Create/Update is enqueued under the remote document id
    /// `{identity}_{entry_id}` and a drain is attempted immediately if
    /// online; without an identity the write stays local-only and is not
    /// retroactively enqueued later.
    ///
    /// Returns the updated cached collection.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the draft is invalid, or a
    /// store/serialization error when the local write itself fails.
    pub async fn save_entry(
        &self,
        draft: EntryDraft,
        owner_id: &str,
    ) -> SyncResult<Vec<LedgerEntry>> {
        let entry = draft
            .into_entry(now_millis())
            .map_err(|validation| SyncError::Validation(validation.errors))?;

        // Local-first: the cache write decides success.
        let key = collection_key(&self.config.entries_collection, owner_id);
        let mut collection = self.read_documents(&key).await?;
        let entry_doc = entry.to_document()?;
        let existed = match collection
            .iter()
            .position(|doc| doc.id() == Some(entry.id.as_str()))
        {
            Some(index) => {
                collection[index] = entry_doc.clone();
                true
            }
            None => {
                collection.push(entry_doc.clone());
                false
            }
        };
        self.write_documents(&key, &collection).await?;
        tracing::debug!(id = %entry.id, existed, "entry saved locally");

        if let Some(identity) = self.identity() {
            let mut payload = entry_doc;
            payload.insert(Document::OWNER_ID, Value::String(identity.clone()));
            let doc_id = format!("{identity}_{}", entry.id);
            let collection_name = self.config.entries_collection.clone();
            let op = if existed {
                Operation::update(collection_name, doc_id, payload)
            } else {
                Operation::create(collection_name, doc_id, payload)
            };
            self.queue.enqueue(op).await;
            if self.is_online() {
                self.drain().await;
            }
        } else {
            tracing::debug!("no identity set, write kept local-only");
        }

        Ok(entries_from(&collection))
    }

    /// Deletes an entry locally and queues the remote removal.
    ///
    /// Returns the updated cached collection. Deleting an id that is not
    /// cached still queues the remote removal, mirroring the local state.
    ///
    /// # Errors
    ///
    /// Returns a store/serialization error when the local write fails.
    pub async fn delete_entry(
        &self,
        entry_id: &str,
        owner_id: &str,
    ) -> SyncResult<Vec<LedgerEntry>> {
        let key = collection_key(&self.config.entries_collection, owner_id);
        let mut collection = self.read_documents(&key).await?;
        collection.retain(|doc| doc.id() != Some(entry_id));
        self.write_documents(&key, &collection).await?;
        tracing::debug!(id = %entry_id, "entry deleted locally");

        if let Some(identity) = self.identity() {
            let doc_id = format!("{identity}_{entry_id}");
            self.queue
                .enqueue(Operation::delete(
                    self.config.entries_collection.clone(),
                    doc_id,
                ))
                .await;
            if self.is_online() {
                self.drain().await;
            }
        }

        Ok(entries_from(&collection))
    }

    /// Returns the cached entries for `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns a store/serialization error when the cache is unreadable.
    pub async fn entries(&self, owner_id: &str) -> SyncResult<Vec<LedgerEntry>> {
        let key = collection_key(&self.config.entries_collection, owner_id);
        Ok(entries_from(&self.read_documents(&key).await?))
    }

    /// Saves one settings field locally and queues a field-level update
    /// of the owner's settings document.
    ///
    /// # Errors
    ///
    /// Returns a store/serialization error when the local write fails.
    pub async fn save_setting(
        &self,
        field: &str,
        value: Value,
        owner_id: &str,
    ) -> SyncResult<()> {
        let key = settings_key(owner_id);
        let mut settings = self.read_settings(&key).await;
        let now = now_millis();
        settings.insert(field, value.clone());
        settings.set_updated_at(now);

        let json = serde_json::to_string(&settings)?;
        self.store.set(&key, &json).await?;
        tracing::debug!(field, "setting saved locally");

        if let Some(identity) = self.identity() {
            let mut payload = Document::new();
            payload.insert(field, value);
            payload.set_updated_at(now);
            self.queue
                .enqueue(Operation::update(
                    self.config.settings_collection.clone(),
                    identity,
                    payload,
                ))
                .await;
            if self.is_online() {
                self.drain().await;
            }
        }

        Ok(())
    }
}

/// Maps cached documents to typed entries, skipping elements that do not
/// parse (a reconciled collection may carry foreign fields or stray
/// documents from older clients).
fn entries_from(collection: &[Document]) -> Vec<LedgerEntry> {
    collection
        .iter()
        .filter_map(|doc| LedgerEntry::from_document(doc).ok())
        .collect()
}
