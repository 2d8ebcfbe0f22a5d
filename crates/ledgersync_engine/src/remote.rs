//! Remote document store abstraction.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use ledgersync_model::Document;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// A remote document store.
///
/// This trait abstracts the shared backend, allowing different
/// implementations (hosted document databases, an in-process mock for
/// testing). The engine assumes idempotent server-side upsert: applying
/// the same operation twice must converge on the same document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document, or `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Document>>;

    /// Writes a document.
    ///
    /// With `merge` set, `data`'s fields are merged into the existing
    /// document (missing fields are preserved); otherwise the document is
    /// replaced wholesale. Upserting a missing document creates it either
    /// way.
    async fn upsert(&self, collection: &str, id: &str, data: Document, merge: bool)
        -> SyncResult<()>;

    /// Removes a document; removing a missing document is a no-op.
    async fn delete(&self, collection: &str, id: &str) -> SyncResult<()>;

    /// Fetches all documents in `collection` whose `ownerId` field equals
    /// `owner_id`, as `(document id, document)` pairs.
    async fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> SyncResult<Vec<(String, Document)>>;
}

/// A recorded upsert, for asserting on merge semantics in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRecord {
    /// Target collection.
    pub collection: String,
    /// Target document id.
    pub id: String,
    /// Whether the write was a merge.
    pub merge: bool,
}

/// An in-memory document store for testing.
///
/// Mutating calls (`upsert`, `delete`) can be scripted to fail with
/// [`MockDocumentStore::fail_next`]; reads never fail, so one failed
/// operation application consumes exactly one scripted failure.
#[derive(Debug, Default)]
pub struct MockDocumentStore {
    docs: Mutex<HashMap<(String, String), Document>>,
    fail_remaining: AtomicU32,
    upserts: Mutex<Vec<UpsertRecord>>,
}

impl MockDocumentStore {
    /// Creates an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document.
    pub fn insert(&self, collection: impl Into<String>, id: impl Into<String>, doc: Document) {
        self.docs
            .lock()
            .insert((collection.into(), id.into()), doc);
    }

    /// Returns a document, if present.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.docs
            .lock()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Returns the total number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    /// Returns true if the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.docs.lock().is_empty()
    }

    /// Scripts the next `n` mutating calls to fail with a retryable error.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Returns the upserts observed so far, oldest first.
    pub fn upserts(&self) -> Vec<UpsertRecord> {
        self.upserts.lock().clone()
    }

    fn check_failure(&self) -> SyncResult<()> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::remote_retryable("injected remote failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> SyncResult<Option<Document>> {
        Ok(self.document(collection, id))
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        merge: bool,
    ) -> SyncResult<()> {
        self.check_failure()?;
        self.upserts.lock().push(UpsertRecord {
            collection: collection.to_string(),
            id: id.to_string(),
            merge,
        });

        let key = (collection.to_string(), id.to_string());
        let mut docs = self.docs.lock();
        match docs.get_mut(&key) {
            Some(existing) if merge => existing.merge_from(&data),
            _ => {
                docs.insert(key, data);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> SyncResult<()> {
        self.check_failure()?;
        self.docs
            .lock()
            .remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }

    async fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> SyncResult<Vec<(String, Document)>> {
        let docs = self.docs.lock();
        let mut results: Vec<(String, Document)> = docs
            .iter()
            .filter(|((c, _), doc)| {
                c == collection
                    && doc
                        .get(Document::OWNER_ID)
                        .and_then(serde_json::Value::as_str)
                        == Some(owner_id)
            })
            .map(|((_, id), doc)| (id.clone(), doc.clone()))
            .collect();
        // HashMap iteration order is arbitrary; callers get a stable view
        results.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn upsert_replace_and_get() {
        let store = MockDocumentStore::new();
        store
            .upsert("entries", "e1", doc(json!({"a": 1})), false)
            .await
            .unwrap();

        assert_eq!(store.get("entries", "e1").await.unwrap(), Some(doc(json!({"a": 1}))));
        assert_eq!(store.get("entries", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn merge_upsert_preserves_missing_fields() {
        let store = MockDocumentStore::new();
        store.insert("entries", "e1", doc(json!({"a": 1, "b": 2})));

        store
            .upsert("entries", "e1", doc(json!({"b": 3})), true)
            .await
            .unwrap();

        assert_eq!(
            store.document("entries", "e1"),
            Some(doc(json!({"a": 1, "b": 3})))
        );
    }

    #[tokio::test]
    async fn merge_upsert_creates_missing_document() {
        let store = MockDocumentStore::new();
        store
            .upsert("entries", "e1", doc(json!({"a": 1})), true)
            .await
            .unwrap();

        assert_eq!(store.document("entries", "e1"), Some(doc(json!({"a": 1}))));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MockDocumentStore::new();
        store.insert("entries", "e1", doc(json!({})));

        store.delete("entries", "e1").await.unwrap();
        store.delete("entries", "e1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn scripted_failures_apply_to_mutations_only() {
        let store = MockDocumentStore::new();
        store.fail_next(1);

        assert!(store.get("entries", "e1").await.is_ok());
        let err = store
            .upsert("entries", "e1", Document::new(), false)
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        // Budget consumed; the next mutation succeeds
        assert!(store.upsert("entries", "e1", Document::new(), false).await.is_ok());
    }

    #[tokio::test]
    async fn query_by_owner_filters_and_sorts() {
        let store = MockDocumentStore::new();
        store.insert("entries", "alice_2", doc(json!({"ownerId": "alice"})));
        store.insert("entries", "alice_1", doc(json!({"ownerId": "alice"})));
        store.insert("entries", "bob_1", doc(json!({"ownerId": "bob"})));
        store.insert("users", "alice", doc(json!({"ownerId": "alice"})));

        let results = store.query_by_owner("entries", "alice").await.unwrap();
        let ids: Vec<_> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["alice_1", "alice_2"]);
    }
}
