//! Pure legacy-to-current transform for one offer document.

use bson::{Bson, Document};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use offerwall_core::{OfferError, OfferResult};
use offerwall_offers::validate::{normalize_countries, validate_schedule, validate_smart_rule};
use offerwall_offers::{Schedule, ScheduleStatus, SmartRule, SmartRuleType, SCHEMA_VERSION};
use offerwall_store::codec::{schedule_document, smart_rules_bson};
use offerwall_store::documents::document_key;
use offerwall_store::DocumentUpdate;
use uuid::Uuid;

/// Flat fields folded into `schedule`.
pub const LEGACY_SCHEDULE_FIELDS: [&str; 2] = ["start_date", "expiration_date"];

/// Flat routing fields folded into `smartRules`.
pub const LEGACY_ROUTING_FIELDS: [&str; 6] = [
    "random_redirect",
    "redirect_urls",
    "geo_redirect_rules",
    "rotation_enabled",
    "leads_filter_enabled",
    "rotation_rules",
];

/// What the migration will write for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    pub key: Bson,
    /// Built only when the document had no `schedule`.
    pub schedule: Option<Schedule>,
    /// Built only when the document had no `smartRules`.
    pub smart_rules: Option<Vec<SmartRule>>,
    /// Legacy fields that were present and are now consumed.
    pub dropped_fields: Vec<String>,
    pub migrated_at: DateTime<Utc>,
}

impl MigrationPlan {
    pub fn describe_key(&self) -> String {
        document_key(&self.key)
    }

    pub fn into_update(self) -> OfferResult<DocumentUpdate> {
        let mut set = Document::new();
        if let Some(schedule) = &self.schedule {
            set.insert("schedule", schedule_document(schedule));
        }
        if let Some(rules) = &self.smart_rules {
            set.insert("smartRules", smart_rules_bson(rules)?);
        }
        set.insert("migratedAt", bson::DateTime::from_chrono(self.migrated_at));
        set.insert("schemaVersion", SCHEMA_VERSION);
        Ok(DocumentUpdate {
            key: self.key,
            set,
            unset: self.dropped_fields,
        })
    }
}

/// Compute the replacement fields for a legacy document. Either half of the
/// new layout that already exists is left alone, so a document left behind
/// by an interrupted run is completed rather than rebuilt.
pub fn plan_migration(doc: &Document, now: DateTime<Utc>) -> OfferResult<MigrationPlan> {
    let key = doc
        .get("_id")
        .cloned()
        .ok_or_else(|| OfferError::validation("_id", "document has no _id"))?;
    let mut dropped_fields = Vec::new();

    let schedule = if doc.contains_key("schedule") {
        None
    } else {
        let schedule = legacy_schedule(doc)?;
        validate_schedule(&schedule)?;
        dropped_fields.extend(present_fields(doc, &LEGACY_SCHEDULE_FIELDS));
        Some(schedule)
    };

    let smart_rules = if doc.contains_key("smartRules") {
        None
    } else {
        let rules = legacy_smart_rules(doc, now)?;
        for (i, rule) in rules.iter().enumerate() {
            validate_smart_rule(&format!("smartRules[{i}]"), rule)?;
        }
        dropped_fields.extend(present_fields(doc, &LEGACY_ROUTING_FIELDS));
        Some(rules)
    };

    Ok(MigrationPlan {
        key,
        schedule,
        smart_rules,
        dropped_fields,
        migrated_at: now,
    })
}

fn legacy_schedule(doc: &Document) -> OfferResult<Schedule> {
    let timezone = match doc.get_str("timezone") {
        Ok(tz) if !tz.trim().is_empty() => tz.to_string(),
        _ => "UTC".to_string(),
    };
    Ok(Schedule {
        start_at: legacy_date(doc, "start_date")?,
        end_at: legacy_date(doc, "expiration_date")?,
        recurring_days: Vec::new(),
        status: ScheduleStatus::Active,
        timezone,
        is_recurring: false,
    })
}

/// Rotation rules first, then GEO rules, then a single backup rule, with
/// priorities counting up from 1 across all three.
fn legacy_smart_rules(doc: &Document, now: DateTime<Utc>) -> OfferResult<Vec<SmartRule>> {
    let countries = normalize_countries(&string_list(doc, "countries")?);
    let mut rules: Vec<SmartRule> = Vec::new();

    if doc.get("random_redirect").is_some_and(truthy) {
        let urls = string_list(doc, "redirect_urls")?;
        if !urls.is_empty() {
            let share = (100 / urls.len()) as u8;
            for url in urls {
                let priority = next_priority(&rules);
                rules.push(rule(SmartRuleType::Rotation, url, countries.clone(), share, priority, now));
            }
        }
    }

    match doc.get("geo_redirect_rules") {
        None | Some(Bson::Null) => {}
        Some(Bson::Document(mapping)) => {
            // Stored field order decides priority.
            for (country, url) in mapping {
                let url = match url {
                    Bson::String(url) => url.clone(),
                    _ => {
                        return Err(OfferError::validation(
                            format!("geo_redirect_rules.{country}"),
                            "redirect target must be a string",
                        ))
                    }
                };
                let geo = vec![country.trim().to_ascii_uppercase()];
                let priority = next_priority(&rules);
                rules.push(rule(SmartRuleType::Geo, url, geo, 100, priority, now));
            }
        }
        Some(_) => {
            return Err(OfferError::validation(
                "geo_redirect_rules",
                "must map country codes to URLs",
            ))
        }
    }

    match doc.get("target_url") {
        None | Some(Bson::Null) => {}
        Some(Bson::String(url)) if url.is_empty() => {}
        Some(Bson::String(url)) => {
            let priority = next_priority(&rules);
            rules.push(rule(SmartRuleType::Backup, url.clone(), countries, 100, priority, now));
        }
        Some(_) => return Err(OfferError::validation("target_url", "must be a string")),
    }

    Ok(rules)
}

fn next_priority(rules: &[SmartRule]) -> u32 {
    rules.len() as u32 + 1
}

fn rule(
    rule_type: SmartRuleType,
    url: String,
    geo: Vec<String>,
    percentage: u8,
    priority: u32,
    now: DateTime<Utc>,
) -> SmartRule {
    SmartRule {
        id: Uuid::new_v4().to_string(),
        rule_type,
        url,
        geo,
        percentage,
        cap: 0,
        priority,
        active: true,
        created_at: now,
    }
}

/// Accepts BSON dates, RFC 3339 strings and `YYYY-MM-DD` (midnight UTC).
fn legacy_date(doc: &Document, field: &str) -> OfferResult<Option<DateTime<Utc>>> {
    match doc.get(field) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::DateTime(dt)) => Ok(Some(dt.to_chrono())),
        Some(Bson::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Bson::String(s)) => parse_date(s.trim())
            .map(Some)
            .ok_or_else(|| OfferError::validation(field, format!("`{s}` is not a date"))),
        Some(other) => Err(OfferError::validation(
            field,
            format!("unsupported date value {other}"),
        )),
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
}

fn string_list(doc: &Document, field: &str) -> OfferResult<Vec<String>> {
    match doc.get(field) {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Bson::String(s) => Ok(s.clone()),
                _ => Err(OfferError::validation(format!("{field}[{i}]"), "must be a string")),
            })
            .collect(),
        Some(_) => Err(OfferError::validation(field, "must be a list of strings")),
    }
}

/// Document-store truthiness.
fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(f) => *f != 0.0 && !f.is_nan(),
        Bson::String(s) => !s.is_empty(),
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn present_fields(doc: &Document, fields: &[&str]) -> Vec<String> {
    fields
        .iter()
        .filter(|f| doc.contains_key(**f))
        .map(|f| f.to_string())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bson::doc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn summary(rules: &[SmartRule]) -> Vec<(SmartRuleType, &str, u8, u32)> {
        rules
            .iter()
            .map(|r| (r.rule_type, r.url.as_str(), r.percentage, r.priority))
            .collect()
    }

    #[test]
    fn test_rotation_example() {
        let legacy = doc! {
            "_id": "offer-1",
            "start_date": "2024-01-01",
            "expiration_date": "2024-12-31",
            "random_redirect": true,
            "redirect_urls": ["https://a.com", "https://b.com"],
            "countries": ["US"],
            "target_url": "https://main.com",
        };
        let plan = plan_migration(&legacy, now()).unwrap();

        let schedule = plan.schedule.clone().unwrap();
        assert_eq!(schedule.start_at, Some(day(2024, 1, 1)));
        assert_eq!(schedule.end_at, Some(day(2024, 12, 31)));
        assert_eq!(schedule.status, ScheduleStatus::Active);
        assert!(!schedule.is_recurring);
        assert!(schedule.recurring_days.is_empty());
        assert_eq!(schedule.timezone, "UTC");

        let rules = plan.smart_rules.clone().unwrap();
        assert_eq!(
            summary(&rules),
            vec![
                (SmartRuleType::Rotation, "https://a.com", 50, 1),
                (SmartRuleType::Rotation, "https://b.com", 50, 2),
                (SmartRuleType::Backup, "https://main.com", 100, 3),
            ]
        );
        assert!(rules.iter().all(|r| r.geo == vec!["US".to_string()] && r.cap == 0 && r.active));

        let mut dropped = plan.dropped_fields.clone();
        dropped.sort();
        assert_eq!(
            dropped,
            vec!["expiration_date", "random_redirect", "redirect_urls", "start_date"]
        );

        let update = plan.into_update().unwrap();
        assert_eq!(update.set.get_str("schemaVersion").unwrap(), "2.0");
        assert!(update.set.contains_key("migratedAt"));
        assert_eq!(update.set.get_array("smartRules").unwrap().len(), 3);
    }

    #[test]
    fn test_geo_rules_follow_rotation_in_stored_order() {
        let legacy = doc! {
            "_id": "offer-2",
            "random_redirect": 1,
            "redirect_urls": ["https://a.com", "https://b.com", "https://c.com"],
            "geo_redirect_rules": { "de": "https://de.com", "fr": "https://fr.com" },
            "countries": ["us", "ca"],
        };
        let rules = plan_migration(&legacy, now()).unwrap().smart_rules.unwrap();
        assert_eq!(
            summary(&rules),
            vec![
                (SmartRuleType::Rotation, "https://a.com", 33, 1),
                (SmartRuleType::Rotation, "https://b.com", 33, 2),
                (SmartRuleType::Rotation, "https://c.com", 33, 3),
                (SmartRuleType::Geo, "https://de.com", 100, 4),
                (SmartRuleType::Geo, "https://fr.com", 100, 5),
            ]
        );
        assert_eq!(rules[0].geo, vec!["US".to_string(), "CA".to_string()]);
        assert_eq!(rules[3].geo, vec!["DE".to_string()]);
        assert_eq!(rules[4].geo, vec!["FR".to_string()]);
    }

    #[test]
    fn test_rotation_requires_truthy_flag_and_urls() {
        let legacy = doc! {
            "_id": "offer-3",
            "random_redirect": false,
            "redirect_urls": ["https://a.com"],
            "rotation_enabled": true,
        };
        let plan = plan_migration(&legacy, now()).unwrap();
        assert!(plan.smart_rules.as_ref().unwrap().is_empty());
        let mut dropped = plan.dropped_fields;
        dropped.sort();
        assert_eq!(dropped, vec!["random_redirect", "redirect_urls", "rotation_enabled"]);

        let legacy = doc! { "_id": "offer-4", "random_redirect": "yes", "redirect_urls": [] };
        assert!(plan_migration(&legacy, now()).unwrap().smart_rules.unwrap().is_empty());
    }

    #[test]
    fn test_partially_migrated_document_is_completed() {
        let legacy = doc! {
            "_id": "offer-5",
            "schedule": { "status": "Paused" },
            "start_date": "2024-01-01",
            "target_url": "https://main.com",
        };
        let plan = plan_migration(&legacy, now()).unwrap();
        assert!(plan.schedule.is_none());
        assert_eq!(plan.smart_rules.as_ref().unwrap().len(), 1);
        // start_date belongs to the schedule half, which was not rebuilt.
        assert!(plan.dropped_fields.is_empty());

        let update = plan.into_update().unwrap();
        assert!(!update.set.contains_key("schedule"));
        assert!(update.unset.is_empty());
    }

    #[test]
    fn test_dates_accept_bson_and_rfc3339() {
        let legacy = doc! {
            "_id": "offer-6",
            "start_date": bson::DateTime::from_chrono(day(2024, 2, 1)),
            "expiration_date": "2024-03-01T12:00:00+02:00",
            "timezone": "Europe/Berlin",
        };
        let schedule = plan_migration(&legacy, now()).unwrap().schedule.unwrap();
        assert_eq!(schedule.start_at, Some(day(2024, 2, 1)));
        assert_eq!(
            schedule.end_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(schedule.timezone, "Europe/Berlin");
    }

    #[test]
    fn test_invalid_documents_are_rejected() {
        let backwards = doc! {
            "_id": "offer-7",
            "start_date": "2024-12-31",
            "expiration_date": "2024-01-01",
        };
        assert!(matches!(
            plan_migration(&backwards, now()),
            Err(OfferError::SchemaValidation { field, .. }) if field == "schedule.endAt"
        ));

        let bad_url = doc! {
            "_id": "offer-8",
            "random_redirect": true,
            "redirect_urls": ["a.com"],
        };
        assert!(matches!(
            plan_migration(&bad_url, now()),
            Err(OfferError::SchemaValidation { field, .. }) if field == "smartRules[0].url"
        ));

        let bad_date = doc! { "_id": "offer-9", "start_date": "next tuesday" };
        assert!(plan_migration(&bad_date, now()).is_err());

        assert!(plan_migration(&doc! { "offer_id": "no-key" }, now()).is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(truthy(&Bson::Boolean(true)));
        assert!(truthy(&Bson::Int32(2)));
        assert!(truthy(&Bson::String("true".into())));
        assert!(!truthy(&Bson::String(String::new())));
        assert!(!truthy(&Bson::Double(0.0)));
        assert!(!truthy(&Bson::Null));
    }
}
