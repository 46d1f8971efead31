//! MongoDB-backed offer store.
//!
//! Serves both the raw-document primitives used by the migration and the
//! typed `OfferRepository` used by the admin API, over one collection.

use crate::codec::{decode_offer, encode_offer};
use crate::documents::*;
use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use offerwall_core::config::StoreConfig;
use offerwall_core::{OfferError, OfferResult};
use offerwall_offers::{Offer, OfferRepository, SCHEMA_VERSION};
use std::time::Duration;
use tracing::{debug, info, warn};

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_NOT_FOUND: i32 = 26;
// IndexAlreadyExists, IndexOptionsConflict, IndexKeySpecsConflict
const INDEX_EXISTS_CODES: [i32; 3] = [68, 85, 86];

pub struct MongoStore {
    client: Client,
    database: String,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect and verify the server answers a ping.
    pub async fn connect(config: &StoreConfig) -> OfferResult<Self> {
        info!(database = %config.database, collection = %config.collection, "Connecting to MongoDB");

        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| OfferError::Connection(e.to_string()))?;
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some("offerwall".to_string());

        let client = Client::with_options(options).map_err(|e| OfferError::Connection(e.to_string()))?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        let store = Self {
            client,
            database: config.database.clone(),
            collection,
        };
        store.ping().await?;
        info!("MongoDB connection established");
        Ok(store)
    }

    /// Ensure the unique `offer_id` index the repository relies on.
    pub async fn ensure_offer_indexes(&self) -> OfferResult<()> {
        match self.create_index(&OFFER_ID_INDEX).await {
            Ok(_) | Err(OfferError::IndexExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn error_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        _ => None,
    }
}

/// Network-level failures become `Connection`, everything else `Store`.
fn store_error(err: mongodb::error::Error) -> OfferError {
    match err.kind.as_ref() {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => OfferError::Connection(err.to_string()),
        _ => OfferError::Store(err.to_string()),
    }
}

#[async_trait]
impl OfferDocumentStore for MongoStore {
    async fn ping(&self) -> OfferResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(|e| OfferError::Connection(e.to_string()))
    }

    async fn count_all(&self) -> OfferResult<u64> {
        self.collection
            .count_documents(doc! {}, None)
            .await
            .map_err(store_error)
    }

    async fn find_unmigrated(&self) -> OfferResult<Vec<Document>> {
        let cursor = self
            .collection
            .find(unmigrated_filter(), None)
            .await
            .map_err(store_error)?;
        cursor.try_collect().await.map_err(store_error)
    }

    async fn apply_updates(&self, updates: Vec<DocumentUpdate>) -> OfferResult<BulkWriteOutcome> {
        let mut outcome = BulkWriteOutcome::default();
        for update in updates {
            let key = document_key(&update.key);
            let result = self
                .collection
                .update_one(doc! { "_id": update.key.clone() }, update.modifications(), None)
                .await;
            match result {
                Ok(r) if r.matched_count == 0 => outcome.failures.push(DocumentFailure {
                    key,
                    reason: "document no longer exists".to_string(),
                }),
                Ok(_) => {
                    debug!(key = %key, "Document updated");
                    outcome.applied += 1;
                }
                Err(e) => match store_error(e) {
                    fatal @ OfferError::Connection(_) => return Err(fatal),
                    other => outcome.failures.push(DocumentFailure {
                        key,
                        reason: other.to_string(),
                    }),
                },
            }
        }
        Ok(outcome)
    }

    async fn create_index(&self, spec: &IndexSpec) -> OfferResult<IndexOutcome> {
        let existing = match self.collection.list_index_names().await {
            Ok(names) => names,
            Err(e) if error_code(&e) == Some(NAMESPACE_NOT_FOUND) => Vec::new(),
            Err(e) => return Err(store_error(e)),
        };
        if existing.iter().any(|n| n == spec.name) {
            return Ok(IndexOutcome::AlreadyExists);
        }

        let options = IndexOptions::builder()
            .name(spec.name.to_string())
            .unique(spec.unique)
            .build();
        let model = IndexModel::builder()
            .keys(spec.keys_document())
            .options(options)
            .build();

        match self.collection.create_index(model, None).await {
            Ok(_) => Ok(IndexOutcome::Created),
            Err(e) => match error_code(&e) {
                Some(code) if INDEX_EXISTS_CODES.contains(&code) => {
                    Err(OfferError::IndexExists(spec.name.to_string()))
                }
                _ => Err(OfferError::IndexCreation {
                    index: spec.name.to_string(),
                    reason: e.to_string(),
                }),
            },
        }
    }

    async fn count_migrated(&self) -> OfferResult<u64> {
        self.collection
            .count_documents(migrated_filter(), None)
            .await
            .map_err(store_error)
    }

    async fn rollback_migrated(&self) -> OfferResult<u64> {
        let unset: Document = MIGRATED_FIELDS
            .iter()
            .map(|f| (f.to_string(), bson::Bson::String(String::new())))
            .collect();
        let result = self
            .collection
            .update_many(doc! { "schemaVersion": SCHEMA_VERSION }, doc! { "$unset": unset }, None)
            .await
            .map_err(store_error)?;
        Ok(result.modified_count)
    }
}

#[async_trait]
impl OfferRepository for MongoStore {
    async fn insert(&self, offer: Offer) -> OfferResult<Offer> {
        let document = encode_offer(&offer)?;
        match self.collection.insert_one(document, None).await {
            Ok(_) => Ok(offer),
            Err(e) if error_code(&e) == Some(DUPLICATE_KEY) => Err(OfferError::DuplicateOfferId(offer.offer_id)),
            Err(e) => Err(store_error(e)),
        }
    }

    async fn get(&self, offer_id: &str) -> OfferResult<Option<Offer>> {
        let found = self
            .collection
            .find_one(doc! { "offer_id": offer_id }, None)
            .await
            .map_err(store_error)?;
        found.map(decode_offer).transpose()
    }

    async fn list(&self) -> OfferResult<Vec<Offer>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .collection
            .find(doc! {}, options)
            .await
            .map_err(store_error)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(store_error)?;

        let mut offers = Vec::with_capacity(documents.len());
        for document in documents {
            match decode_offer(document) {
                Ok(offer) => offers.push(offer),
                // Legacy documents that have not been migrated yet.
                Err(e) => warn!(error = %e, "Skipping undecodable offer document"),
            }
        }
        Ok(offers)
    }

    async fn replace(&self, offer: Offer, read_at: DateTime<Utc>) -> OfferResult<Offer> {
        let document = encode_offer(&offer)?;
        let filter = doc! {
            "offer_id": offer.offer_id.as_str(),
            "updated_at": bson::DateTime::from_chrono(read_at),
        };
        let result = self
            .collection
            .replace_one(filter, document, None)
            .await
            .map_err(store_error)?;
        if result.matched_count > 0 {
            return Ok(offer);
        }

        let exists = self
            .collection
            .count_documents(doc! { "offer_id": offer.offer_id.as_str() }, None)
            .await
            .map_err(store_error)?;
        if exists == 0 {
            Err(OfferError::NotFound(format!("offer {}", offer.offer_id)))
        } else {
            debug!(offer_id = %offer.offer_id, "Stale offer write rejected");
            Err(OfferError::Conflict(format!(
                "offer {} changed since {read_at}",
                offer.offer_id
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Requires a MongoDB server on localhost (run with --ignored).
    #[tokio::test]
    #[ignore]
    async fn test_round_trip_against_local_server() {
        let config = StoreConfig {
            database: format!("offerwall_test_{}", uuid::Uuid::new_v4().simple()),
            ..StoreConfig::default()
        };
        let store = MongoStore::connect(&config).await.unwrap();
        store.ensure_offer_indexes().await.unwrap();
        assert_eq!(
            store.create_index(&OFFER_ID_INDEX).await.unwrap(),
            IndexOutcome::AlreadyExists
        );
        assert_eq!(OfferDocumentStore::count_all(&store).await.unwrap(), 0);
        store.client.database(&config.database).drop(None).await.unwrap();
    }
}
