//! Raw-document primitives over the offer collection.
//!
//! The migration works on documents that predate the typed `Offer` layout,
//! so it talks to the store through this trait instead of `OfferRepository`.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use offerwall_core::OfferResult;
use offerwall_offers::SCHEMA_VERSION;

/// Fields a forward migration adds and a rollback removes.
pub const MIGRATED_FIELDS: [&str; 4] = ["schedule", "smartRules", "migratedAt", "schemaVersion"];

/// One per-document `$set` / `$unset` pair addressed by `_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpdate {
    pub key: Bson,
    pub set: Document,
    pub unset: Vec<String>,
}

impl DocumentUpdate {
    pub fn modifications(&self) -> Document {
        let mut m = Document::new();
        if !self.set.is_empty() {
            m.insert("$set", self.set.clone());
        }
        if !self.unset.is_empty() {
            let fields: Document = self
                .unset
                .iter()
                .map(|f| (f.clone(), Bson::String(String::new())))
                .collect();
            m.insert("$unset", fields);
        }
        m
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BulkWriteOutcome {
    pub applied: u64,
    pub failures: Vec<DocumentFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub keys: &'static [(&'static str, i32)],
    pub unique: bool,
}

impl IndexSpec {
    pub fn keys_document(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, order)| (field.to_string(), Bson::Int32(*order)))
            .collect()
    }
}

pub const OFFER_ID_INDEX: IndexSpec = IndexSpec {
    name: "offer_id_1",
    keys: &[("offer_id", 1)],
    unique: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait OfferDocumentStore: Send + Sync {
    /// Fails with `OfferError::Connection` when the store is unreachable.
    async fn ping(&self) -> OfferResult<()>;

    async fn count_all(&self) -> OfferResult<u64>;

    /// Documents missing `schedule` or `smartRules`.
    async fn find_unmigrated(&self) -> OfferResult<Vec<Document>>;

    /// Apply each update independently. A failed document is reported in
    /// the outcome and does not stop the others.
    async fn apply_updates(&self, updates: Vec<DocumentUpdate>) -> OfferResult<BulkWriteOutcome>;

    async fn create_index(&self, spec: &IndexSpec) -> OfferResult<IndexOutcome>;

    /// Documents carrying `schedule`, `smartRules` and the current schema version.
    async fn count_migrated(&self) -> OfferResult<u64>;

    /// Strip the migrated fields from every current-version document.
    /// Returns the number of documents changed.
    async fn rollback_migrated(&self) -> OfferResult<u64>;
}

pub fn unmigrated_filter() -> Document {
    doc! {
        "$or": [
            { "schedule": { "$exists": false } },
            { "smartRules": { "$exists": false } },
        ]
    }
}

pub fn migrated_filter() -> Document {
    doc! {
        "schedule": { "$exists": true },
        "smartRules": { "$exists": true },
        "schemaVersion": SCHEMA_VERSION,
    }
}

/// Printable form of a document `_id`.
pub fn document_key(key: &Bson) -> String {
    match key {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}
