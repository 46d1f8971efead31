//! Offer persistence seam.
//!
//! `OfferService` only ever talks to an `Arc<dyn OfferRepository>`. The
//! MongoDB implementation lives in `offerwall-store`; `MemoryOfferRepository`
//! backs development mode and tests.

use crate::models::Offer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use offerwall_core::{OfferError, OfferResult};
use tracing::info;

#[async_trait]
pub trait OfferRepository: Send + Sync {
    /// Insert a new offer. Fails with `DuplicateOfferId` if the id is taken.
    async fn insert(&self, offer: Offer) -> OfferResult<Offer>;

    async fn get(&self, offer_id: &str) -> OfferResult<Option<Offer>>;

    /// All offers, newest first.
    async fn list(&self) -> OfferResult<Vec<Offer>>;

    /// Replace an existing offer, but only if its stored `updated_at` still
    /// equals `read_at`. Fails with `NotFound` if absent and `Conflict` if
    /// another writer got there first.
    async fn replace(&self, offer: Offer, read_at: DateTime<Utc>) -> OfferResult<Offer>;
}

/// Thread-safe in-memory repository keyed by `offer_id`.
#[derive(Default)]
pub struct MemoryOfferRepository {
    offers: DashMap<String, Offer>,
}

impl MemoryOfferRepository {
    pub fn new() -> Self {
        info!("Offer repository initialized (in-memory, development mode)");
        Self {
            offers: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

#[async_trait]
impl OfferRepository for MemoryOfferRepository {
    async fn insert(&self, offer: Offer) -> OfferResult<Offer> {
        match self.offers.entry(offer.offer_id.clone()) {
            Entry::Occupied(_) => Err(OfferError::DuplicateOfferId(offer.offer_id)),
            Entry::Vacant(slot) => {
                slot.insert(offer.clone());
                Ok(offer)
            }
        }
    }

    async fn get(&self, offer_id: &str) -> OfferResult<Option<Offer>> {
        Ok(self.offers.get(offer_id).map(|r| r.value().clone()))
    }

    async fn list(&self) -> OfferResult<Vec<Offer>> {
        let mut offers: Vec<Offer> = self.offers.iter().map(|r| r.value().clone()).collect();
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(offers)
    }

    async fn replace(&self, offer: Offer, read_at: DateTime<Utc>) -> OfferResult<Offer> {
        match self.offers.get_mut(&offer.offer_id) {
            Some(entry) if entry.updated_at != read_at => Err(OfferError::Conflict(format!(
                "offer {} changed since {read_at}",
                offer.offer_id
            ))),
            Some(mut entry) => {
                *entry.value_mut() = offer.clone();
                Ok(offer)
            }
            None => Err(OfferError::NotFound(format!("offer {}", offer.offer_id))),
        }
    }
}
