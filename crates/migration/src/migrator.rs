//! Legacy-to-current schema migration over an offer document store.
//!
//! One pass: ping, count, select, transform, batch apply, build indexes,
//! validate. Re-running is safe because migrated documents drop out of the
//! selection.

use crate::report::{MigrationReport, RollbackReport};
use crate::transform::plan_migration;
use chrono::{DateTime, Utc};
use offerwall_core::{OfferError, OfferResult};
use offerwall_store::documents::document_key;
use offerwall_store::{DocumentFailure, IndexOutcome, IndexSpec, OfferDocumentStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Indexes supporting schedule and smart-rule queries.
pub const MIGRATION_INDEXES: [IndexSpec; 8] = [
    IndexSpec { name: "schedule_startAt_1", keys: &[("schedule.startAt", 1)], unique: false },
    IndexSpec { name: "schedule_endAt_1", keys: &[("schedule.endAt", 1)], unique: false },
    IndexSpec { name: "schedule_status_1", keys: &[("schedule.status", 1)], unique: false },
    IndexSpec { name: "smartRules_active_1", keys: &[("smartRules.active", 1)], unique: false },
    IndexSpec { name: "smartRules_type_1", keys: &[("smartRules.type", 1)], unique: false },
    IndexSpec { name: "smartRules_priority_1", keys: &[("smartRules.priority", 1)], unique: false },
    IndexSpec {
        name: "status_1_schedule_status_1",
        keys: &[("status", 1), ("schedule.status", 1)],
        unique: false,
    },
    IndexSpec {
        name: "schedule_startAt_1_schedule_endAt_1",
        keys: &[("schedule.startAt", 1), ("schedule.endAt", 1)],
        unique: false,
    },
];

pub struct Migrator {
    store: Arc<dyn OfferDocumentStore>,
}

#[derive(Debug, Default)]
struct IndexSummary {
    created: usize,
    existing: usize,
    warnings: Vec<String>,
}

impl Migrator {
    pub fn new(store: Arc<dyn OfferDocumentStore>) -> Self {
        Self { store }
    }

    pub async fn migrate(&self) -> OfferResult<MigrationReport> {
        self.migrate_at(Utc::now()).await
    }

    /// Run the forward migration, stamping documents with `now`.
    ///
    /// Only connection-level failures are returned as errors. Per-document
    /// and per-index failures end up in the report.
    pub async fn migrate_at(&self, now: DateTime<Utc>) -> OfferResult<MigrationReport> {
        self.store.ping().await?;

        let total_documents = self.store.count_all().await?;
        let documents = self.store.find_unmigrated().await?;
        info!(total = total_documents, selected = documents.len(), "Selected offers to migrate");

        let mut failures = Vec::new();
        let mut updates = Vec::with_capacity(documents.len());
        for doc in &documents {
            let planned = plan_migration(doc, now).and_then(|plan| {
                debug!(
                    key = %plan.describe_key(),
                    schedule = plan.schedule.is_some(),
                    rules = plan.smart_rules.as_ref().map_or(0, Vec::len),
                    "Planned offer migration"
                );
                plan.into_update()
            });
            match planned {
                Ok(update) => updates.push(update),
                Err(e) => {
                    let key = doc.get("_id").map(document_key).unwrap_or_else(|| "<no _id>".to_string());
                    warn!(key = %key, error = %e, "Offer failed transform");
                    failures.push(DocumentFailure {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let outcome = if updates.is_empty() {
            Default::default()
        } else {
            self.store.apply_updates(updates).await?
        };
        for failure in &outcome.failures {
            warn!(key = %failure.key, reason = %failure.reason, "Offer update rejected");
        }
        failures.extend(outcome.failures);
        metrics::counter!("migration.documents.migrated").increment(outcome.applied);
        metrics::counter!("migration.documents.failed").increment(failures.len() as u64);

        let indexes = self.ensure_indexes().await;

        let validated = self.store.count_migrated().await?;
        let report = MigrationReport {
            total_documents,
            selected: documents.len(),
            migrated: outcome.applied,
            failures,
            indexes_created: indexes.created,
            indexes_existing: indexes.existing,
            index_warnings: indexes.warnings,
            validated,
        };

        if report.is_complete() {
            info!(validated, rate = report.success_rate(), "Migration complete");
        } else {
            warn!(
                validated,
                total = total_documents,
                rate = report.success_rate(),
                "Migration left documents on the legacy layout"
            );
        }
        Ok(report)
    }

    async fn ensure_indexes(&self) -> IndexSummary {
        let mut summary = IndexSummary::default();
        for spec in &MIGRATION_INDEXES {
            match self.store.create_index(spec).await {
                Ok(IndexOutcome::Created) => {
                    info!(index = spec.name, "Index created");
                    summary.created += 1;
                }
                Ok(IndexOutcome::AlreadyExists) | Err(OfferError::IndexExists(_)) => {
                    debug!(index = spec.name, "Index already exists");
                    summary.existing += 1;
                }
                Err(e) => {
                    warn!(index = spec.name, error = %e, "Index creation failed, continuing");
                    metrics::counter!("migration.indexes.failed").increment(1);
                    summary.warnings.push(format!("{}: {e}", spec.name));
                }
            }
        }
        summary
    }

    /// Strip `schedule`, `smartRules`, `migratedAt` and `schemaVersion` from
    /// every migrated document. The consumed legacy fields are gone for good.
    pub async fn rollback(&self) -> OfferResult<RollbackReport> {
        self.store.ping().await?;
        let reverted = self.store.rollback_migrated().await?;
        warn!(reverted, "Rolled back offers; legacy fields were not restored");
        Ok(RollbackReport { reverted })
    }
}
