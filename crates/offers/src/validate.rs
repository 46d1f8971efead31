//! Offer invariants, checked before anything is persisted.

use crate::models::{Offer, Schedule, SmartRule};
use chrono_tz::Tz;
use offerwall_core::{OfferError, OfferResult};
use std::collections::HashSet;

/// Validate a complete offer, returning it unchanged when every invariant
/// holds. The error names the first offending field.
pub fn validate(offer: Offer) -> OfferResult<Offer> {
    require("offer_id", &offer.offer_id)?;
    require("campaign_id", &offer.campaign_id)?;
    require("name", &offer.name)?;
    require("network", &offer.network)?;
    require("target_url", &offer.target_url)?;
    require("created_by", &offer.created_by)?;

    if !offer.payout.is_finite() || offer.payout < 0.0 {
        return Err(OfferError::validation("payout", "must be a non-negative number"));
    }

    validate_url("target_url", &offer.target_url)?;
    validate_country_codes("countries", &offer.countries)?;
    validate_schedule(&offer.schedule)?;

    let mut priorities = HashSet::with_capacity(offer.smart_rules.len());
    for (i, rule) in offer.smart_rules.iter().enumerate() {
        validate_smart_rule(&format!("smartRules[{i}]"), rule)?;
        if !priorities.insert(rule.priority) {
            return Err(OfferError::validation(
                format!("smartRules[{i}].priority"),
                format!("priority {} is used by another rule", rule.priority),
            ));
        }
    }

    Ok(offer)
}

/// `endAt` must be strictly after `startAt` when both are set.
pub fn validate_schedule(schedule: &Schedule) -> OfferResult<()> {
    if let (Some(start), Some(end)) = (schedule.start_at, schedule.end_at) {
        if end <= start {
            return Err(OfferError::validation(
                "schedule.endAt",
                format!("must be after schedule.startAt ({start})"),
            ));
        }
    }
    let timezone = schedule.timezone.trim();
    if timezone.is_empty() {
        return Err(OfferError::validation("schedule.timezone", "is required"));
    }
    if timezone.parse::<Tz>().is_err() {
        return Err(OfferError::validation(
            "schedule.timezone",
            format!("`{timezone}` is not an IANA time zone"),
        ));
    }
    Ok(())
}

/// Field-level checks for one rule. Priority uniqueness is a property of
/// the whole list and is checked by the caller.
pub fn validate_smart_rule(path: &str, rule: &SmartRule) -> OfferResult<()> {
    validate_url(&format!("{path}.url"), &rule.url)?;
    validate_country_codes(&format!("{path}.geo"), &rule.geo)?;
    if rule.percentage > 100 {
        return Err(OfferError::validation(
            format!("{path}.percentage"),
            "must be between 0 and 100",
        ));
    }
    if i64::try_from(rule.cap).is_err() {
        return Err(OfferError::validation(
            format!("{path}.cap"),
            format!("must not exceed {}", i64::MAX),
        ));
    }
    if rule.priority == 0 {
        return Err(OfferError::validation(
            format!("{path}.priority"),
            "must be a positive integer",
        ));
    }
    Ok(())
}

/// Accepts anything shaped like `^https?://.+`.
pub fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest.and_then(|r| r.chars().next()), Some(c) if c != '\n')
}

/// Two upper-case ASCII letters. Inputs are normalized before they get here.
pub fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// Upper-case and trim a list of country codes.
pub fn normalize_countries(codes: &[String]) -> Vec<String> {
    codes.iter().map(|c| c.trim().to_ascii_uppercase()).collect()
}

fn require(field: &str, value: &str) -> OfferResult<()> {
    if value.trim().is_empty() {
        Err(OfferError::validation(field, "is required"))
    } else {
        Ok(())
    }
}

fn validate_url(field: &str, url: &str) -> OfferResult<()> {
    if is_http_url(url) {
        Ok(())
    } else {
        Err(OfferError::validation(
            field,
            format!("`{url}` is not an http(s) URL"),
        ))
    }
}

fn validate_country_codes(field: &str, codes: &[String]) -> OfferResult<()> {
    match codes.iter().find(|c| !is_country_code(c)) {
        Some(bad) => Err(OfferError::validation(
            field,
            format!("`{bad}` is not a two-letter country code"),
        )),
        None => Ok(()),
    }
}
