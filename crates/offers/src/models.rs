//! Offer domain types: the offer record, its schedule and smart rules, and API requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker stamped on documents that carry the schedule/smart-rules layout.
pub const SCHEMA_VERSION: &str = "2.0";

// ─── Offer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub offer_id: String,
    pub campaign_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub network: String,
    #[serde(default)]
    pub status: OfferStatus,

    // Targeting
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub os: Vec<String>,
    #[serde(default)]
    pub browsers: Vec<String>,
    #[serde(default)]
    pub carriers: Vec<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,

    // Payout
    pub payout: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub daily_cap: Option<u64>,
    #[serde(default)]
    pub weekly_cap: Option<u64>,
    #[serde(default)]
    pub monthly_cap: Option<u64>,

    // Tracking
    pub target_url: String,
    #[serde(default)]
    pub postback_url: Option<String>,
    #[serde(default = "default_conversion_window")]
    pub conversion_window: u32,
    #[serde(default)]
    pub duplicate_conversion_rule: DuplicateConversionRule,

    #[serde(default)]
    pub schedule: Schedule,
    #[serde(rename = "smartRules", default)]
    pub smart_rules: Vec<SmartRule>,

    // System / audit
    pub created_by: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub hits: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "migratedAt", default, skip_serializing_if = "Option::is_none")]
    pub migrated_at: Option<DateTime<Utc>>,
    #[serde(rename = "schemaVersion", default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OfferStatus {
    #[default]
    Active,
    Inactive,
    Paused,
    Hidden,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateConversionRule {
    Allow,
    Deny,
    #[default]
    Unique,
}

pub(crate) fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_currency() -> String {
    "USD".to_string()
}
fn default_conversion_window() -> u32 {
    30
}
fn default_true() -> bool {
    true
}

// ─── Schedule ──────────────────────────────────────────────────────────────

/// Time window and recurrence that decide whether an offer is live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurring_days: Vec<Weekday>,
    #[serde(default)]
    pub status: ScheduleStatus,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub is_recurring: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            start_at: None,
            end_at: None,
            recurring_days: Vec::new(),
            status: ScheduleStatus::Active,
            timezone: default_timezone(),
            is_recurring: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScheduleStatus {
    #[default]
    Active,
    Paused,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "Active",
            ScheduleStatus::Paused => "Paused",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

// ─── Smart Rules ───────────────────────────────────────────────────────────

/// Prioritized redirect policy attached to an offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmartRule {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub rule_type: SmartRuleType,
    pub url: String,
    #[serde(default)]
    pub geo: Vec<String>,
    #[serde(default = "default_percentage")]
    pub percentage: u8,
    #[serde(default)]
    pub cap: u64,
    pub priority: u32,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_percentage() -> u8 {
    100
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmartRuleType {
    Backup,
    Rotation,
    #[serde(rename = "GEO")]
    Geo,
    Time,
}

impl SmartRuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmartRuleType::Backup => "Backup",
            SmartRuleType::Rotation => "Rotation",
            SmartRuleType::Geo => "GEO",
            SmartRuleType::Time => "Time",
        }
    }
}

// ─── API Request/Response types ────────────────────────────────────────────

/// Wire shape of an offer creation call. Required fields are optional here
/// so that a missing one is reported by name instead of as a parse error.
#[derive(Debug, Default, Deserialize)]
pub struct CreateOfferRequest {
    pub offer_id: Option<String>,
    pub campaign_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub network: Option<String>,
    pub payout: Option<f64>,
    pub target_url: Option<String>,
    pub created_by: Option<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub os: Vec<String>,
    #[serde(default)]
    pub browsers: Vec<String>,
    #[serde(default)]
    pub carriers: Vec<String>,
    pub timezone: Option<String>,
    pub currency: Option<String>,
    pub daily_cap: Option<u64>,
    pub weekly_cap: Option<u64>,
    pub monthly_cap: Option<u64>,
    pub postback_url: Option<String>,
    pub conversion_window: Option<u32>,
    pub duplicate_conversion_rule: Option<DuplicateConversionRule>,
    pub schedule: Option<Schedule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmartRuleRequest {
    #[serde(rename = "type")]
    pub rule_type: SmartRuleType,
    pub url: String,
    #[serde(default)]
    pub geo: Vec<String>,
    #[serde(default = "default_percentage")]
    pub percentage: u8,
    #[serde(default)]
    pub cap: u64,
    pub priority: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_defaults_from_empty_object() {
        let schedule: Schedule = serde_json::from_str("{}").unwrap();
        assert_eq!(schedule, Schedule::default());
        assert_eq!(schedule.status, ScheduleStatus::Active);
        assert_eq!(schedule.timezone, "UTC");
    }

    #[test]
    fn test_smart_rule_wire_names() {
        let rule: SmartRule = serde_json::from_value(serde_json::json!({
            "_id": "r-1",
            "type": "GEO",
            "url": "https://de.example.com",
            "geo": ["DE"],
            "priority": 2,
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(rule.id, "r-1");
        assert_eq!(rule.rule_type, SmartRuleType::Geo);
        assert_eq!(rule.percentage, 100);
        assert!(rule.active);

        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["type"], "GEO");
        assert!(value.get("createdAt").is_some());
    }
}
