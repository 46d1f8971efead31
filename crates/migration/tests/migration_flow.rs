//! End-to-end migration and rollback runs against the in-memory store.

use bson::{doc, Bson, Document};
use chrono::{TimeZone, Utc};
use offerwall_migration::Migrator;
use offerwall_store::codec::decode_offer;
use offerwall_store::MemoryDocumentStore;
use std::sync::Arc;

fn legacy_offer(offer_id: &str) -> Document {
    doc! {
        "offer_id": offer_id,
        "campaign_id": "CMP-100",
        "name": "Survey Rewards",
        "network": "cpx",
        "payout": 1.2,
        "currency": "USD",
        "countries": ["US"],
        "target_url": "https://main.com",
        "created_by": "admin",
        "created_at": bson::DateTime::from_chrono(Utc.with_ymd_and_hms(2023, 11, 2, 0, 0, 0).unwrap()),
        "updated_at": bson::DateTime::from_chrono(Utc.with_ymd_and_hms(2023, 11, 2, 0, 0, 0).unwrap()),
        "start_date": "2024-01-01",
        "expiration_date": "2024-12-31",
        "random_redirect": true,
        "redirect_urls": ["https://a.com", "https://b.com"],
    }
}

fn sorted_documents(store: &MemoryDocumentStore) -> Vec<Document> {
    let mut docs = store.documents();
    docs.sort_by_key(|d| d.get_str("offer_id").unwrap_or_default().to_string());
    docs
}

#[tokio::test]
async fn migrates_legacy_offer_into_schedule_and_rules() {
    let store = Arc::new(MemoryDocumentStore::new());
    let key = store.insert(legacy_offer("ML-1"));

    let report = Migrator::new(store.clone()).migrate().await.unwrap();
    assert_eq!(report.total_documents, 1);
    assert_eq!(report.migrated, 1);
    assert!(report.failures.is_empty());
    assert_eq!(report.indexes_created, 8);
    assert_eq!(report.success_rate(), 100.0);

    let migrated = store.get(&key).unwrap();
    for legacy in ["start_date", "expiration_date", "random_redirect", "redirect_urls"] {
        assert!(!migrated.contains_key(legacy), "{legacy} should be dropped");
    }
    assert_eq!(migrated.get_str("schemaVersion").unwrap(), "2.0");
    assert!(matches!(migrated.get("migratedAt"), Some(Bson::DateTime(_))));

    let offer = decode_offer(migrated).unwrap();
    assert_eq!(
        offer.schedule.start_at,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        offer.schedule.end_at,
        Some(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap())
    );
    let rules: Vec<(&str, u8, u32)> = offer
        .smart_rules
        .iter()
        .map(|r| (r.url.as_str(), r.percentage, r.priority))
        .collect();
    assert_eq!(
        rules,
        vec![
            ("https://a.com", 50, 1),
            ("https://b.com", 50, 2),
            ("https://main.com", 100, 3),
        ]
    );
    assert!(offerwall_offers::validate(offer).is_ok());
}

#[tokio::test]
async fn second_run_selects_nothing_and_changes_nothing() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.insert(legacy_offer("ML-1"));
    store.insert(legacy_offer("ML-2"));
    let migrator = Migrator::new(store.clone());

    migrator.migrate().await.unwrap();
    let after_first = sorted_documents(&store);

    let second = migrator.migrate().await.unwrap();
    assert_eq!(second.selected, 0);
    assert_eq!(second.migrated, 0);
    assert_eq!(sorted_documents(&store), after_first);
}

#[tokio::test]
async fn failed_documents_are_reported_and_resumed_later() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.insert(legacy_offer("ML-1"));
    let mut broken = legacy_offer("ML-2");
    broken.insert("redirect_urls", vec!["not-a-url"]);
    let broken_key = store.insert(broken);

    let migrator = Migrator::new(store.clone());
    let first = migrator.migrate().await.unwrap();
    assert_eq!(first.migrated, 1);
    assert_eq!(first.failures.len(), 1);
    assert!(first.failures[0].reason.contains("smartRules[0].url"));
    assert_eq!(first.success_rate(), 50.0);

    let mut repaired = store.get(&broken_key).unwrap();
    repaired.insert("redirect_urls", vec!["https://c.com"]);
    store.insert(repaired);

    let second = migrator.migrate().await.unwrap();
    assert_eq!(second.selected, 1);
    assert_eq!(second.migrated, 1);
    assert_eq!(second.success_rate(), 100.0);
}

#[tokio::test]
async fn reports_success_rate_against_pre_run_total() {
    let store = Arc::new(MemoryDocumentStore::new());
    let keys: Vec<Bson> = (0..10)
        .map(|i| store.insert(legacy_offer(&format!("ML-{i}"))))
        .collect();
    for key in &keys[..3] {
        store.fail_updates_for(key);
    }

    let report = Migrator::new(store).migrate().await.unwrap();
    assert_eq!(report.total_documents, 10);
    assert_eq!(report.migrated, 7);
    assert_eq!(report.failures.len(), 3);
    assert_eq!(report.validated, 7);
    assert_eq!(report.success_rate(), 70.0);
}

#[tokio::test]
async fn rollback_strips_new_layout_without_restoring_legacy_fields() {
    let store = Arc::new(MemoryDocumentStore::new());
    let key = store.insert(legacy_offer("ML-1"));
    let migrator = Migrator::new(store.clone());
    migrator.migrate().await.unwrap();

    let report = migrator.rollback().await.unwrap();
    assert_eq!(report.reverted, 1);

    let reverted = store.get(&key).unwrap();
    for field in ["schedule", "smartRules", "migratedAt", "schemaVersion"] {
        assert!(!reverted.contains_key(field));
    }
    assert!(!reverted.contains_key("redirect_urls"));
    assert!(!reverted.contains_key("start_date"));
    assert_eq!(reverted.get_str("target_url").unwrap(), "https://main.com");

    // Re-migration only sees what survived: target_url becomes the backup rule.
    let again = migrator.migrate().await.unwrap();
    assert_eq!(again.selected, 1);
    assert_eq!(again.migrated, 1);
    let offer = decode_offer(store.get(&key).unwrap()).unwrap();
    assert_eq!(offer.schedule.start_at, None);
    assert_eq!(offer.smart_rules.len(), 1);
    assert_eq!(offer.smart_rules[0].url, "https://main.com");
}
