//! Integration tests for esgex-store
//!
//! These tests verify the tri-state upsert and the read paths for company
//! documents.

use esgex_domain::traits::ReportStore;
use esgex_domain::{CompositeRecord, PersistStatus};
use esgex_store::SqliteReportStore;
use serde_json::{json, Value};

fn record(value: Value) -> CompositeRecord {
    match value {
        Value::Object(map) => CompositeRecord::from(map),
        other => panic!("test record must be an object, got {}", other),
    }
}

fn acme_2023() -> CompositeRecord {
    record(json!({
        "report_metadata": {"company_legal_name": "Acme Corp", "reporting_year": 2023},
        "emissions": {"scope_1_tco2e": 1200.5}
    }))
}

#[tokio::test]
async fn test_store_initialization() {
    let store = SqliteReportStore::in_memory();
    assert!(store.is_ok(), "Store should initialize successfully");
    assert!(store.unwrap().list_companies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_write_is_inserted() {
    let store = SqliteReportStore::in_memory().unwrap();

    let result = store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();

    assert_eq!(PersistStatus::from(result), PersistStatus::Inserted);
    let stored = store.find_report("Acme Corp", "2023").await.unwrap();
    assert_eq!(stored, Some(acme_2023()));
}

#[tokio::test]
async fn test_identical_write_is_unchanged() {
    let store = SqliteReportStore::in_memory().unwrap();
    store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();

    let second = store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();
    let third = store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();

    assert_eq!(PersistStatus::from(second), PersistStatus::Unchanged);
    assert_eq!(PersistStatus::from(third), PersistStatus::Unchanged);
}

#[tokio::test]
async fn test_key_order_does_not_count_as_change() {
    let store = SqliteReportStore::in_memory().unwrap();
    store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();

    let reordered = record(json!({
        "emissions": {"scope_1_tco2e": 1200.5},
        "report_metadata": {"reporting_year": 2023, "company_legal_name": "Acme Corp"}
    }));
    let result = store.upsert_report("Acme Corp", "2023", &reordered).await.unwrap();

    assert_eq!(PersistStatus::from(result), PersistStatus::Unchanged);
}

#[tokio::test]
async fn test_rewrite_with_extreme_floats_is_unchanged() {
    let store = SqliteReportStore::in_memory().unwrap();
    let extracted: Value = serde_json::from_str(
        r#"{"emissions": {"scope_1": 3.0582846136230975e+181, "scope_2": 4.9406564584124654e-324}}"#,
    )
    .unwrap();
    let report = record(extracted);

    let first = store.upsert_report("Acme Corp", "2023", &report).await.unwrap();
    let second = store.upsert_report("Acme Corp", "2023", &report).await.unwrap();

    assert_eq!(PersistStatus::from(first), PersistStatus::Inserted);
    assert_eq!(PersistStatus::from(second), PersistStatus::Unchanged);
    assert_eq!(store.find_report("Acme Corp", "2023").await.unwrap(), Some(report));
}

#[tokio::test]
async fn test_different_content_is_updated() {
    let store = SqliteReportStore::in_memory().unwrap();
    store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();

    let revised = record(json!({
        "report_metadata": {"company_legal_name": "Acme Corp", "reporting_year": 2023},
        "emissions": {"scope_1_tco2e": 1100.0}
    }));
    let result = store.upsert_report("Acme Corp", "2023", &revised).await.unwrap();

    assert_eq!(PersistStatus::from(result), PersistStatus::Updated);
    assert_eq!(store.find_report("Acme Corp", "2023").await.unwrap(), Some(revised));
}

#[tokio::test]
async fn test_new_year_on_existing_company_is_updated() {
    let store = SqliteReportStore::in_memory().unwrap();
    store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();

    let report_2022 = record(json!({"emissions": {"scope_1_tco2e": 1400.0}}));
    let result = store.upsert_report("Acme Corp", "2022", &report_2022).await.unwrap();

    assert_eq!(PersistStatus::from(result), PersistStatus::Updated);
}

#[tokio::test]
async fn test_year_slots_are_isolated() {
    let store = SqliteReportStore::in_memory().unwrap();
    let report_2022 = record(json!({"emissions": {"scope_1_tco2e": 1400.0}}));

    store.upsert_report("Acme Corp", "2022", &report_2022).await.unwrap();
    store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();
    store
        .upsert_report("Acme Corp", "2023", &record(json!({"emissions": {}})))
        .await
        .unwrap();

    let company = store.find_company("Acme Corp").await.unwrap().unwrap();
    assert_eq!(company.years(), vec!["2022", "2023"]);
    assert_eq!(company.reports.get("2022"), Some(&report_2022));
    assert!(company.created_at <= company.updated_at);
}

#[tokio::test]
async fn test_company_identity_is_verbatim() {
    let store = SqliteReportStore::in_memory().unwrap();

    store.upsert_report("Acme", "2023", &acme_2023()).await.unwrap();
    let result = store.upsert_report("acme", "2023", &acme_2023()).await.unwrap();

    // Differently cased names are different companies
    assert_eq!(PersistStatus::from(result), PersistStatus::Inserted);
    assert_eq!(store.list_companies().await.unwrap(), vec!["Acme", "acme"]);
}

#[tokio::test]
async fn test_missing_lookups() {
    let store = SqliteReportStore::in_memory().unwrap();
    store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();

    assert!(store.find_company("Globex").await.unwrap().is_none());
    assert!(store.find_report("Acme Corp", "1999").await.unwrap().is_none());
    assert!(store.find_report("Globex", "2023").await.unwrap().is_none());
}

#[tokio::test]
async fn test_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports.db");

    {
        let store = SqliteReportStore::new(&path).unwrap();
        store.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();
    }

    let reopened = SqliteReportStore::new(&path).unwrap();
    let result = reopened.upsert_report("Acme Corp", "2023", &acme_2023()).await.unwrap();

    assert_eq!(PersistStatus::from(result), PersistStatus::Unchanged);
    assert_eq!(reopened.list_companies().await.unwrap(), vec!["Acme Corp"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_upserts_for_distinct_companies() {
    let store = SqliteReportStore::in_memory().unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let company = format!("Company {:02}", i);
            store.upsert_report(&company, "2023", &acme_2023()).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(PersistStatus::from(result), PersistStatus::Inserted);
    }

    assert_eq!(store.list_companies().await.unwrap().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_slot_creates_one_document() {
    let store = SqliteReportStore::in_memory().unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.upsert_report("Acme Corp", "2023", &acme_2023()).await
        }));
    }

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(PersistStatus::from(handle.await.unwrap().unwrap()));
    }

    let inserted = statuses.iter().filter(|s| **s == PersistStatus::Inserted).count();
    assert_eq!(inserted, 1);
    assert!(statuses
        .iter()
        .all(|s| matches!(s, PersistStatus::Inserted | PersistStatus::Unchanged)));
}
