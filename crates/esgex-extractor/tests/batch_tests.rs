//! Batch processing tests for esgex-extractor
//!
//! These tests drive several documents through one shared Extractor and a
//! file-backed store.

use async_trait::async_trait;
use esgex_domain::traits::{BackendResponse, ExtractionBackend, ReportStore};
use esgex_domain::{DocumentHandle, PersistStatus, SchemaDescriptor};
use esgex_extractor::{
    DocumentIngestor, Extractor, ExtractorConfig, ExtractorError, SchemaCatalog,
};
use esgex_gatekeeper::Gatekeeper;
use esgex_llm::{LlmError, MockFileStore};
use esgex_store::SqliteReportStore;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers with an identity derived from the document name and tracks
/// how many calls are in flight at once
#[derive(Default)]
struct PerDocumentBackend {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl ExtractionBackend for PerDocumentBackend {
    type Error = LlmError;

    async fn generate(
        &self,
        document: &DocumentHandle,
        _instruction: &str,
        schema: &SchemaDescriptor,
    ) -> Result<BackendResponse, Self::Error> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let company = document.name.trim_start_matches("files/");
        if company.starts_with("broken") {
            return Ok(BackendResponse::empty(None));
        }

        let body = if schema.name == "ReportMetadata" {
            json!({"report_metadata": {"company_legal_name": company, "reporting_year": 2024}})
        } else {
            json!({})
        };
        Ok(BackendResponse::new(body.to_string(), None))
    }
}

fn extractor(
    backend: Arc<PerDocumentBackend>,
    store: SqliteReportStore,
    max_concurrent: usize,
) -> Arc<Extractor<SharedBackend, MockFileStore, SqliteReportStore>> {
    let catalog = SchemaCatalog::new(
        SchemaCatalog::esg_default()
            .iter()
            .take(3)
            .cloned()
            .collect(),
    )
    .unwrap();

    let config = ExtractorConfig {
        max_retries: 2,
        retry_base_delay_secs: 0,
        max_concurrent_documents: max_concurrent,
        ..ExtractorConfig::default()
    };

    Arc::new(
        Extractor::new(
            DocumentIngestor::new(MockFileStore::new()),
            SharedBackend(backend),
            store,
            Gatekeeper::default_config(),
            catalog,
            config,
        )
        .unwrap(),
    )
}

/// Lets the test keep a handle on the backend's counters
struct SharedBackend(Arc<PerDocumentBackend>);

#[async_trait]
impl ExtractionBackend for SharedBackend {
    type Error = LlmError;

    async fn generate(
        &self,
        document: &DocumentHandle,
        instruction: &str,
        schema: &SchemaDescriptor,
    ) -> Result<BackendResponse, Self::Error> {
        self.0.generate(document, instruction, schema).await
    }
}

fn write_documents(dir: &std::path::Path, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(format!("{}.pdf", name));
            std::fs::write(&path, b"%PDF-1.7").unwrap();
            path.to_string_lossy().into_owned()
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_respects_concurrency_bound() {
    let dir = tempfile::tempdir().unwrap();
    let references = write_documents(
        dir.path(),
        &["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"],
    );

    let backend = Arc::new(PerDocumentBackend::default());
    let store = SqliteReportStore::new(dir.path().join("reports.db")).unwrap();
    let extractor = extractor(backend.clone(), store.clone(), 2);

    let items = extractor.process_batch(references.clone()).await;

    assert_eq!(items.len(), 6);
    for (item, reference) in items.iter().zip(&references) {
        assert_eq!(&item.reference, reference);
        let outcome = item.result.as_ref().unwrap();
        assert_eq!(outcome.status, PersistStatus::Inserted);
        assert_eq!(outcome.year, "2024");
    }

    assert!(backend.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(store.list_companies().await.unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_failures_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let mut references = write_documents(dir.path(), &["alpha", "broken-report", "charlie"]);
    references.push(dir.path().join("missing.pdf").to_string_lossy().into_owned());

    let backend = Arc::new(PerDocumentBackend::default());
    let store = SqliteReportStore::in_memory().unwrap();
    let extractor = extractor(backend, store.clone(), 3);

    let items = extractor.process_batch(references).await;

    assert!(items[0].result.is_ok());
    assert!(matches!(
        items[1].result,
        Err(ExtractorError::Exhausted { attempts: 2, .. })
    ));
    assert!(items[2].result.is_ok());
    assert!(matches!(items[3].result, Err(ExtractorError::Ingestion(_))));

    assert_eq!(
        store.list_companies().await.unwrap(),
        vec!["alpha".to_string(), "charlie".to_string()]
    );
}

#[tokio::test]
async fn test_rerun_of_batch_is_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let references = write_documents(dir.path(), &["alpha", "bravo"]);

    let backend = Arc::new(PerDocumentBackend::default());
    let store = SqliteReportStore::in_memory().unwrap();
    let extractor = extractor(backend, store, 2);

    extractor.process_batch(references.clone()).await;
    let items = extractor.process_batch(references).await;

    for item in items {
        assert_eq!(item.result.unwrap().status, PersistStatus::Unchanged);
    }
}
