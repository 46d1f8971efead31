//! Smart-rule mutators and redirect resolution.
//!
//! Mutators take an offer by value and hand back the updated offer, so a
//! rejected change leaves the caller's copy untouched.

use crate::models::{Offer, SmartRule, SmartRuleRequest, SmartRuleType};
use crate::schedule::is_currently_active;
use crate::validate::{normalize_countries, validate_smart_rule};
use chrono::{DateTime, Utc};
use offerwall_core::{OfferError, OfferResult};
use uuid::Uuid;

/// Build a rule from an admin request, assigning its identity.
pub fn new_rule(req: SmartRuleRequest, now: DateTime<Utc>) -> SmartRule {
    SmartRule {
        id: Uuid::new_v4().to_string(),
        rule_type: req.rule_type,
        url: req.url,
        geo: normalize_countries(&req.geo),
        percentage: req.percentage,
        cap: req.cap,
        priority: req.priority,
        active: req.active,
        created_at: now,
    }
}

/// Append `rule`, rejecting a priority that another rule already holds.
pub fn add_smart_rule(mut offer: Offer, rule: SmartRule) -> OfferResult<Offer> {
    if offer.smart_rules.iter().any(|r| r.priority == rule.priority) {
        return Err(OfferError::DuplicatePriority(rule.priority));
    }
    validate_smart_rule("smartRules[new]", &rule)?;
    offer.smart_rules.push(rule);
    Ok(offer)
}

pub fn remove_smart_rule(mut offer: Offer, rule_id: &str) -> OfferResult<Offer> {
    let before = offer.smart_rules.len();
    offer.smart_rules.retain(|r| r.id != rule_id);
    if offer.smart_rules.len() == before {
        return Err(OfferError::NotFound(format!(
            "smart rule {rule_id} on offer {}",
            offer.offer_id
        )));
    }
    Ok(offer)
}

/// Pick the destination URL for a visitor from `country`.
///
/// `roll` is a uniform draw in `[0, 100)` used to split rotation traffic.
/// Returns `None` when the offer is disabled or outside its schedule.
pub fn resolve_redirect(
    offer: &Offer,
    country: &str,
    now: DateTime<Utc>,
    roll: f64,
) -> Option<String> {
    if !offer.is_active || !is_currently_active(offer, now) {
        return None;
    }

    let country = country.trim().to_ascii_uppercase();
    let mut candidates: Vec<&SmartRule> = offer
        .smart_rules
        .iter()
        .filter(|r| r.active)
        .filter(|r| r.geo.is_empty() || r.geo.iter().any(|g| *g == country))
        .collect();
    candidates.sort_by_key(|r| r.priority);

    if let Some(rule) = candidates
        .iter()
        .find(|r| matches!(r.rule_type, SmartRuleType::Geo | SmartRuleType::Time))
    {
        return Some(rule.url.clone());
    }

    let mut cumulative = 0.0;
    for rule in candidates
        .iter()
        .filter(|r| r.rule_type == SmartRuleType::Rotation)
    {
        cumulative += f64::from(rule.percentage);
        if roll < cumulative {
            return Some(rule.url.clone());
        }
    }

    if let Some(rule) = candidates
        .iter()
        .find(|r| r.rule_type == SmartRuleType::Backup)
    {
        return Some(rule.url.clone());
    }

    Some(offer.target_url.clone())
}
