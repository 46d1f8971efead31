//! BSON encoding for offers.
//!
//! Timestamps are stored as BSON dates, which is what the migration writes
//! and what the date indexes expect. Decoding turns them back into RFC 3339
//! strings before handing the document to serde.

use bson::{doc, Bson, Document};
use offerwall_core::{OfferError, OfferResult};
use offerwall_offers::{Offer, Schedule, SmartRule};

pub fn schedule_document(schedule: &Schedule) -> Document {
    let mut d = Document::new();
    if let Some(start) = schedule.start_at {
        d.insert("startAt", bson::DateTime::from_chrono(start));
    }
    if let Some(end) = schedule.end_at {
        d.insert("endAt", bson::DateTime::from_chrono(end));
    }
    let days: Vec<Bson> = schedule
        .recurring_days
        .iter()
        .map(|day| Bson::String(day.as_str().to_string()))
        .collect();
    d.insert("recurringDays", days);
    d.insert("status", schedule.status.as_str());
    d.insert("timezone", schedule.timezone.as_str());
    d.insert("isRecurring", schedule.is_recurring);
    d
}

/// Fails when `cap` does not fit the signed 64-bit integer BSON stores.
pub fn smart_rule_document(rule: &SmartRule) -> OfferResult<Document> {
    let cap = i64::try_from(rule.cap)
        .map_err(|_| OfferError::Bson(format!("smart rule {} cap {} exceeds i64", rule.id, rule.cap)))?;
    Ok(doc! {
        "_id": rule.id.as_str(),
        "type": rule.rule_type.as_str(),
        "url": rule.url.as_str(),
        "geo": rule.geo.clone(),
        "percentage": i32::from(rule.percentage),
        "cap": cap,
        "priority": i64::from(rule.priority),
        "active": rule.active,
        "createdAt": bson::DateTime::from_chrono(rule.created_at),
    })
}

pub fn smart_rules_bson(rules: &[SmartRule]) -> OfferResult<Bson> {
    rules
        .iter()
        .map(|r| smart_rule_document(r).map(Bson::Document))
        .collect::<OfferResult<Vec<Bson>>>()
        .map(Bson::Array)
}

pub fn encode_offer(offer: &Offer) -> OfferResult<Document> {
    let mut d = bson::to_document(offer).map_err(|e| OfferError::Bson(e.to_string()))?;
    d.insert("schedule", schedule_document(&offer.schedule));
    d.insert("smartRules", smart_rules_bson(&offer.smart_rules)?);
    d.insert("created_at", bson::DateTime::from_chrono(offer.created_at));
    d.insert("updated_at", bson::DateTime::from_chrono(offer.updated_at));
    if let Some(migrated) = offer.migrated_at {
        d.insert("migratedAt", bson::DateTime::from_chrono(migrated));
    }
    Ok(d)
}

pub fn decode_offer(doc: Document) -> OfferResult<Offer> {
    let normalized: Document = doc
        .into_iter()
        .map(|(k, v)| (k, dates_to_strings(v)))
        .collect();
    bson::from_document(normalized).map_err(|e| OfferError::Bson(e.to_string()))
}

fn dates_to_strings(value: Bson) -> Bson {
    match value {
        Bson::DateTime(dt) => Bson::String(dt.to_chrono().to_rfc3339()),
        Bson::Document(d) => Bson::Document(
            d.into_iter()
                .map(|(k, v)| (k, dates_to_strings(v)))
                .collect(),
        ),
        Bson::Array(items) => Bson::Array(items.into_iter().map(dates_to_strings).collect()),
        other => other,
    }
}
