//! Bulk reconciliation between the remote store and the local cache.

use crate::engine::{collection_key, settings_key, SyncEngine};
use crate::error::{SyncError, SyncResult};
use ledgersync_model::{Document, SyncEvent};
use std::collections::HashMap;

impl SyncEngine {
    /// Fetches all remote documents owned by `owner_id` and merges them
    /// into the local collection, last write wins.
    ///
    /// The merge is keyed by entity id: a remote entity absent locally is
    /// inserted; when both sides hold an entity, the greater `updatedAt`
    /// wins and ties favor local (local-first writes are assumed freshest
    /// in the common case). The merged collection is written back to the
    /// cache. Returns the merged entity count.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`] when the engine is offline,
    /// [`SyncError::IdentityMissing`] without an authenticated identity,
    /// or a store/remote/serialization error.
    pub async fn pull_and_merge(
        &self,
        resource_type: &str,
        owner_id: &str,
    ) -> SyncResult<usize> {
        if !self.is_online() {
            return Err(SyncError::Offline);
        }
        if self.identity().is_none() {
            return Err(SyncError::IdentityMissing);
        }

        let remote_docs = self.remote.query_by_owner(resource_type, owner_id).await?;
        tracing::debug!(
            resource_type,
            remote = remote_docs.len(),
            "pulled remote collection"
        );

        let key = collection_key(resource_type, owner_id);
        let mut merged = self.read_documents(&key).await?;

        // Index local entities by id; unidentifiable elements keep their
        // slot but never conflict with a remote entity.
        let mut by_id: HashMap<String, usize> = HashMap::new();
        for (index, doc) in merged.iter().enumerate() {
            if let Some(id) = doc.id() {
                by_id.insert(id.to_string(), index);
            }
        }

        for (doc_id, mut doc) in remote_docs {
            // Remote document ids carry an owner prefix; recover the
            // entity id from the document itself when present.
            let entity_id = match doc.id() {
                Some(id) => id.to_string(),
                None => strip_owner_prefix(&doc_id, owner_id).to_string(),
            };
            doc.set_id(entity_id.clone());

            match by_id.get(&entity_id) {
                None => {
                    by_id.insert(entity_id, merged.len());
                    merged.push(doc);
                }
                Some(&index) => {
                    let local_ts = merged[index].updated_at().unwrap_or(0);
                    let remote_ts = doc.updated_at().unwrap_or(0);
                    if remote_ts > local_ts {
                        merged[index] = doc;
                    }
                }
            }
        }

        self.write_documents(&key, &merged).await?;
        tracing::info!(resource_type, merged = merged.len(), "collection reconciled");
        self.events.publish(&SyncEvent::CollectionReconciled {
            resource_type: resource_type.to_string(),
            merged: merged.len(),
        });

        Ok(merged.len())
    }

    /// Refreshes the cached settings document from the remote store.
    ///
    /// Remote fields overlay the cached document; fields the remote does
    /// not carry are preserved. A missing remote document leaves the
    /// cache untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`] when the engine is offline,
    /// [`SyncError::IdentityMissing`] without an authenticated identity,
    /// or a store/remote/serialization error.
    pub async fn reconcile_settings(&self, owner_id: &str) -> SyncResult<()> {
        if !self.is_online() {
            return Err(SyncError::Offline);
        }
        if self.identity().is_none() {
            return Err(SyncError::IdentityMissing);
        }

        let remote_doc = self
            .remote
            .get(&self.config.settings_collection, owner_id)
            .await?;
        let Some(remote_doc) = remote_doc else {
            return Ok(());
        };

        let key = settings_key(owner_id);
        let mut local = self.read_settings(&key).await;
        local.merge_from(&remote_doc);

        let json = serde_json::to_string(&local)?;
        self.store.set(&key, &json).await?;

        tracing::info!("settings reconciled");
        self.events.publish(&SyncEvent::SettingsReconciled);
        Ok(())
    }

    /// Full startup sync: pull-and-merge the entries collection, refresh
    /// settings, then run one drain to flush a carried-over queue.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`] when the engine is offline, or the
    /// first pull/reconcile error.
    pub async fn initial_sync(&self, owner_id: &str) -> SyncResult<()> {
        if !self.is_online() {
            tracing::debug!("offline, skipping initial sync");
            return Err(SyncError::Offline);
        }

        let entries = self.config.entries_collection.clone();
        self.pull_and_merge(&entries, owner_id).await?;
        self.reconcile_settings(owner_id).await?;

        // Flush anything queued before the pull (e.g. a previous offline
        // session).
        self.drain().await;
        tracing::info!("initial sync complete");
        Ok(())
    }

    /// Reads the cached settings document; missing or unreadable reads
    /// as empty.
    pub(crate) async fn read_settings(&self, key: &str) -> Document {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Document>(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(error = %e, "cached settings unreadable, resetting");
                    Document::new()
                }
            },
            Ok(None) => Document::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cached settings");
                Document::new()
            }
        }
    }
}

fn strip_owner_prefix<'a>(doc_id: &'a str, owner_id: &str) -> &'a str {
    doc_id
        .strip_prefix(owner_id)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(doc_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_prefix_stripping() {
        assert_eq!(strip_owner_prefix("alice_entry-1", "alice"), "entry-1");
        assert_eq!(strip_owner_prefix("entry-1", "alice"), "entry-1");
        assert_eq!(strip_owner_prefix("alice", "alice"), "alice");
        assert_eq!(strip_owner_prefix("bob_entry-1", "alice"), "bob_entry-1");
    }
}
