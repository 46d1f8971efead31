//! One-shot migration of offers from the flat legacy layout
//! (`start_date`, `redirect_urls`, `geo_redirect_rules`, ...) to the nested
//! `schedule` + `smartRules` layout, and its destructive rollback.

#![warn(clippy::unwrap_used)]

pub mod migrator;
pub mod report;
pub mod transform;

pub use migrator::{Migrator, MIGRATION_INDEXES};
pub use report::{MigrationReport, RollbackReport};
pub use transform::{plan_migration, MigrationPlan};
