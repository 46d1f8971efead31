//! Offer record model and admin operations.
//!
//! Validation, schedule activity and smart-rule mutation are plain
//! functions over `Offer` values; `OfferService` wires them to an injected
//! `OfferRepository` and `offer_router` exposes them over HTTP.

#![warn(clippy::unwrap_used)]

pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod rules;
pub mod schedule;
pub mod service;
pub mod validate;

pub use models::{Offer, Schedule, ScheduleStatus, SmartRule, SmartRuleType, Weekday, SCHEMA_VERSION};
pub use repository::{MemoryOfferRepository, OfferRepository};
pub use router::offer_router;
pub use rules::{add_smart_rule, remove_smart_rule, resolve_redirect};
pub use schedule::is_currently_active;
pub use service::OfferService;
pub use validate::validate;
