//! In-process document store backed by DashMap.
//!
//! Mirrors the MongoDB collection semantics the migration relies on, plus
//! fault injection so that partial failures can be exercised in tests.

use crate::documents::*;
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use dashmap::{DashMap, DashSet};
use offerwall_core::{OfferError, OfferResult};
use offerwall_offers::SCHEMA_VERSION;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<String, Document>,
    indexes: DashMap<String, IndexSpec>,
    failing_indexes: DashSet<String>,
    failing_documents: DashSet<String>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw document, assigning an `ObjectId` when `_id` is absent.
    pub fn insert(&self, mut doc: Document) -> Bson {
        let key = match doc.get("_id") {
            Some(key) => key.clone(),
            None => {
                let key = Bson::ObjectId(ObjectId::new());
                doc.insert("_id", key.clone());
                key
            }
        };
        self.documents.insert(document_key(&key), doc);
        key
    }

    pub fn get(&self, key: &Bson) -> Option<Document> {
        self.documents.get(&document_key(key)).map(|r| r.value().clone())
    }

    pub fn documents(&self) -> Vec<Document> {
        self.documents.iter().map(|r| r.value().clone()).collect()
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Make every creation of index `name` fail.
    pub fn fail_index(&self, name: &str) {
        self.failing_indexes.insert(name.to_string());
    }

    /// Make every update addressed to `key` fail.
    pub fn fail_updates_for(&self, key: &Bson) {
        self.failing_documents.insert(document_key(key));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> OfferResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(OfferError::Connection("in-memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn is_migrated(doc: &Document) -> bool {
    doc.contains_key("schedule")
        && doc.contains_key("smartRules")
        && doc.get_str("schemaVersion").ok() == Some(SCHEMA_VERSION)
}

#[async_trait]
impl OfferDocumentStore for MemoryDocumentStore {
    async fn ping(&self) -> OfferResult<()> {
        self.check_online()
    }

    async fn count_all(&self) -> OfferResult<u64> {
        self.check_online()?;
        Ok(self.documents.len() as u64)
    }

    async fn find_unmigrated(&self) -> OfferResult<Vec<Document>> {
        self.check_online()?;
        Ok(self
            .documents
            .iter()
            .filter(|r| !r.value().contains_key("schedule") || !r.value().contains_key("smartRules"))
            .map(|r| r.value().clone())
            .collect())
    }

    async fn apply_updates(&self, updates: Vec<DocumentUpdate>) -> OfferResult<BulkWriteOutcome> {
        self.check_online()?;
        let mut outcome = BulkWriteOutcome::default();
        for update in updates {
            let key = document_key(&update.key);
            if self.failing_documents.contains(&key) {
                outcome.failures.push(DocumentFailure {
                    key,
                    reason: "write rejected by store".to_string(),
                });
                continue;
            }
            match self.documents.get_mut(&key) {
                Some(mut entry) => {
                    let doc = entry.value_mut();
                    for (field, value) in update.set {
                        doc.insert(field, value);
                    }
                    for field in &update.unset {
                        doc.remove(field);
                    }
                    outcome.applied += 1;
                }
                None => outcome.failures.push(DocumentFailure {
                    key,
                    reason: "document no longer exists".to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    async fn create_index(&self, spec: &IndexSpec) -> OfferResult<IndexOutcome> {
        self.check_online()?;
        if self.failing_indexes.contains(spec.name) {
            return Err(OfferError::IndexCreation {
                index: spec.name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        if self.indexes.contains_key(spec.name) {
            return Ok(IndexOutcome::AlreadyExists);
        }
        self.indexes.insert(spec.name.to_string(), *spec);
        Ok(IndexOutcome::Created)
    }

    async fn count_migrated(&self) -> OfferResult<u64> {
        self.check_online()?;
        Ok(self.documents.iter().filter(|r| is_migrated(r.value())).count() as u64)
    }

    async fn rollback_migrated(&self) -> OfferResult<u64> {
        self.check_online()?;
        let mut reverted = 0;
        for mut entry in self.documents.iter_mut() {
            let doc = entry.value_mut();
            if doc.get_str("schemaVersion").ok() != Some(SCHEMA_VERSION) {
                continue;
            }
            for field in MIGRATED_FIELDS {
                doc.remove(field);
            }
            reverted += 1;
        }
        Ok(reverted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn test_selection_uses_either_missing_field() {
        let store = MemoryDocumentStore::new();
        store.insert(doc! { "_id": "legacy", "offer_id": "A" });
        store.insert(doc! { "_id": "half", "offer_id": "B", "schedule": {} });
        store.insert(doc! { "_id": "done", "offer_id": "C", "schedule": {}, "smartRules": [] });

        let mut ids: Vec<String> = store
            .find_unmigrated()
            .await
            .unwrap()
            .iter()
            .map(|d| d.get_str("_id").unwrap().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["half", "legacy"]);
    }

    #[tokio::test]
    async fn test_update_isolation() {
        let store = MemoryDocumentStore::new();
        let a = store.insert(doc! { "offer_id": "A", "start_date": "2024-01-01" });
        let b = store.insert(doc! { "offer_id": "B" });
        store.fail_updates_for(&b);

        let updates = vec![
            DocumentUpdate {
                key: a.clone(),
                set: doc! { "schemaVersion": "2.0" },
                unset: vec!["start_date".into()],
            },
            DocumentUpdate {
                key: b.clone(),
                set: doc! { "schemaVersion": "2.0" },
                unset: vec![],
            },
            DocumentUpdate {
                key: Bson::String("gone".into()),
                set: doc! { "schemaVersion": "2.0" },
                unset: vec![],
            },
        ];
        let outcome = store.apply_updates(updates).await.unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.failures.len(), 2);

        let a = store.get(&a).unwrap();
        assert_eq!(a.get_str("schemaVersion").unwrap(), "2.0");
        assert!(!a.contains_key("start_date"));
        assert!(!store.get(&b).unwrap().contains_key("schemaVersion"));
    }

    #[tokio::test]
    async fn test_index_creation_is_idempotent() {
        let store = MemoryDocumentStore::new();
        assert_eq!(store.create_index(&OFFER_ID_INDEX).await.unwrap(), IndexOutcome::Created);
        assert_eq!(store.create_index(&OFFER_ID_INDEX).await.unwrap(), IndexOutcome::AlreadyExists);
        assert_eq!(store.index_names(), vec!["offer_id_1".to_string()]);
    }

    #[tokio::test]
    async fn test_offline_store_reports_connection_error() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        assert!(matches!(store.ping().await, Err(OfferError::Connection(_))));
        assert!(store.count_all().await.unwrap_err().is_fatal());
    }
}
