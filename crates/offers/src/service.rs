//! Admin operations on offers. Every write is validated before it reaches
//! the repository.

use crate::models::*;
use crate::repository::OfferRepository;
use crate::rules;
use crate::schedule;
use crate::validate::{normalize_countries, validate, validate_schedule};
use chrono::{DateTime, Duration, DurationRound, Utc};
use offerwall_core::{OfferError, OfferResult};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

pub struct OfferService {
    repo: Arc<dyn OfferRepository>,
}

impl OfferService {
    pub fn new(repo: Arc<dyn OfferRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_offer(&self, req: CreateOfferRequest) -> OfferResult<Offer> {
        let now = Utc::now();
        let offer = Offer {
            offer_id: required("offer_id", req.offer_id)?,
            campaign_id: required("campaign_id", req.campaign_id)?,
            name: required("name", req.name)?,
            description: req.description,
            network: required("network", req.network)?,
            status: OfferStatus::Active,
            countries: normalize_countries(&req.countries),
            devices: req.devices,
            os: req.os,
            browsers: req.browsers,
            carriers: req.carriers,
            timezone: req.timezone.unwrap_or_else(default_timezone),
            payout: req
                .payout
                .ok_or_else(|| OfferError::validation("payout", "is required"))?,
            currency: req.currency.unwrap_or_else(|| "USD".to_string()),
            daily_cap: req.daily_cap,
            weekly_cap: req.weekly_cap,
            monthly_cap: req.monthly_cap,
            target_url: required("target_url", req.target_url)?,
            postback_url: req.postback_url,
            conversion_window: req.conversion_window.unwrap_or(30),
            duplicate_conversion_rule: req.duplicate_conversion_rule.unwrap_or_default(),
            schedule: req.schedule.unwrap_or_default(),
            smart_rules: Vec::new(),
            created_by: required("created_by", req.created_by)?,
            is_active: true,
            hits: 0,
            created_at: now,
            updated_at: now,
            migrated_at: None,
            schema_version: Some(SCHEMA_VERSION.to_string()),
        };

        let offer = self.repo.insert(validate(offer)?).await?;
        metrics::counter!("offers.created").increment(1);
        info!(offer_id = %offer.offer_id, created_by = %offer.created_by, "Offer created");
        Ok(offer)
    }

    pub async fn get_offer(&self, offer_id: &str) -> OfferResult<Offer> {
        self.repo
            .get(offer_id)
            .await?
            .ok_or_else(|| OfferError::NotFound(format!("offer {offer_id}")))
    }

    pub async fn list_offers(&self) -> OfferResult<Vec<Offer>> {
        self.repo.list().await
    }

    pub async fn update_schedule(&self, offer_id: &str, schedule: Schedule) -> OfferResult<Offer> {
        validate_schedule(&schedule)?;
        self.update_with(offer_id, |mut offer| {
            offer.schedule = schedule.clone();
            Ok(offer)
        })
        .await
    }

    pub async fn set_schedule_status(
        &self,
        offer_id: &str,
        status: ScheduleStatus,
    ) -> OfferResult<Offer> {
        let offer = self
            .update_with(offer_id, |mut offer| {
                offer.schedule.status = status;
                Ok(offer)
            })
            .await?;
        info!(offer_id, status = status.as_str(), "Schedule status changed");
        Ok(offer)
    }

    /// Soft-disable. Offers are never hard-deleted.
    pub async fn deactivate_offer(&self, offer_id: &str) -> OfferResult<Offer> {
        let offer = self
            .update_with(offer_id, |mut offer| {
                offer.is_active = false;
                offer.status = OfferStatus::Inactive;
                Ok(offer)
            })
            .await?;
        info!(offer_id, "Offer deactivated");
        Ok(offer)
    }

    pub async fn add_smart_rule(&self, offer_id: &str, req: SmartRuleRequest) -> OfferResult<Offer> {
        let rule = rules::new_rule(req, Utc::now());
        let offer = self
            .update_with(offer_id, |offer| rules::add_smart_rule(offer, rule.clone()))
            .await?;
        metrics::counter!("offers.rules.added").increment(1);
        Ok(offer)
    }

    pub async fn remove_smart_rule(&self, offer_id: &str, rule_id: &str) -> OfferResult<Offer> {
        let offer = self
            .update_with(offer_id, |offer| rules::remove_smart_rule(offer, rule_id))
            .await?;
        metrics::counter!("offers.rules.removed").increment(1);
        Ok(offer)
    }

    pub async fn record_hit(&self, offer_id: &str) -> OfferResult<Offer> {
        self.update_with(offer_id, |mut offer| {
            offer.hits += 1;
            Ok(offer)
        })
        .await
    }

    pub async fn is_currently_active(&self, offer_id: &str, now: DateTime<Utc>) -> OfferResult<bool> {
        let offer = self.get_offer(offer_id).await?;
        Ok(schedule::is_currently_active(&offer, now))
    }

    pub async fn resolve_redirect(
        &self,
        offer_id: &str,
        country: &str,
        now: DateTime<Utc>,
    ) -> OfferResult<Option<String>> {
        let offer = self.get_offer(offer_id).await?;
        let roll = rand::thread_rng().gen_range(0.0..100.0);
        let url = rules::resolve_redirect(&offer, country, now, roll);
        debug!(offer_id, country, roll, url = ?url, "Redirect resolved");
        Ok(url)
    }

    /// Read, apply `change`, validate and write back, conditional on nobody
    /// having written in between. A lost race re-reads and re-applies.
    async fn update_with<F>(&self, offer_id: &str, mut change: F) -> OfferResult<Offer>
    where
        F: FnMut(Offer) -> OfferResult<Offer> + Send,
    {
        let mut attempt = 1;
        loop {
            let current = self.get_offer(offer_id).await?;
            let read_at = current.updated_at;
            let mut offer = change(current)?;
            offer.updated_at = next_stamp(read_at);

            match self.repo.replace(validate(offer)?, read_at).await {
                Err(OfferError::Conflict(reason)) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(offer_id, attempt, reason = %reason, "Retrying offer write");
                    metrics::counter!("offers.write_conflicts").increment(1);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

const MAX_WRITE_ATTEMPTS: u32 = 8;

/// Millisecond precision (what the store keeps), strictly after `previous`
/// so that every write moves the stamp a conditional replace keys on.
fn next_stamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    let now = now.duration_trunc(Duration::milliseconds(1)).unwrap_or(now);
    now.max(previous + Duration::milliseconds(1))
}

fn required(field: &str, value: Option<String>) -> OfferResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| OfferError::validation(field, "is required"))
}
