//! Core Extractor implementation

use crate::catalog::SchemaCatalog;
use crate::config::ExtractorConfig;
use crate::error::{ExtractorError, TransientError};
use crate::ingest::{DocumentIngestor, HttpFetcher, SourceFetcher};
use crate::merge::{CollisionHook, LogCollisions, RecordMerger};
use crate::metrics::RunMetrics;
use crate::parser::parse_extraction;
use crate::retry::{RetryPolicy, RetryState};
use esgex_domain::traits::{ExtractionBackend, FileStore, ReportStore};
use esgex_domain::{
    AttemptOutcome, DocumentHandle, DocumentSource, ExtractionAttempt, ExtractionReport,
    PersistOutcome, PersistStatus, RunId, SchemaDescriptor, TokenUsage,
};
use esgex_gatekeeper::Gatekeeper;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Outcome of one document in [`Extractor::process_batch`]
#[derive(Debug)]
pub struct BatchItem {
    /// Reference as given to the batch
    pub reference: String,

    /// Persist outcome, or why the document failed
    pub result: Result<PersistOutcome, ExtractorError>,
}

/// The Extractor turns a report document into a persisted composite record
///
/// Collaborators are injected at construction. A single Extractor can serve
/// many concurrent runs: every run owns its handle, merger, attempt counters
/// and token tally.
pub struct Extractor<B, F, S, H = HttpFetcher>
where
    B: ExtractionBackend,
    F: FileStore,
    S: ReportStore,
    H: SourceFetcher,
{
    ingestor: DocumentIngestor<F, H>,
    backend: B,
    store: S,
    gatekeeper: Gatekeeper,
    catalog: SchemaCatalog,
    config: ExtractorConfig,
    retry: RetryPolicy,
    collision_hook: Arc<dyn CollisionHook>,
}

impl<B, F, S, H> Extractor<B, F, S, H>
where
    B: ExtractionBackend,
    F: FileStore,
    S: ReportStore,
    H: SourceFetcher,
{
    /// Create a new Extractor
    ///
    /// Fails with `ExtractorError::Config` when the configuration or the
    /// gatekeeper configuration is invalid.
    pub fn new(
        ingestor: DocumentIngestor<F, H>,
        backend: B,
        store: S,
        gatekeeper: Gatekeeper,
        catalog: SchemaCatalog,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        gatekeeper
            .config()
            .validate()
            .map_err(|e| ExtractorError::Config(e.to_string()))?;

        for (key, schemas) in catalog.overlapping_keys() {
            warn!(
                "Key '{}' is declared by several schemas ({}); the last one will win",
                key,
                schemas.join(", ")
            );
        }

        Ok(Self {
            ingestor,
            backend,
            store,
            gatekeeper,
            catalog,
            retry: RetryPolicy::from_config(&config),
            config,
            collision_hook: Arc::new(LogCollisions),
        })
    }

    /// Replace the collision hook
    pub fn with_collision_hook(mut self, hook: Arc<dyn CollisionHook>) -> Self {
        self.collision_hook = hook;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Schema catalog in use
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Report store in use
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Extract a composite record from a path or `http(s)://` URL
    pub async fn run_extraction(&self, reference: &str) -> Result<ExtractionReport, ExtractorError> {
        self.run_source(&DocumentSource::from_reference(reference))
            .await
    }

    /// Extract a composite record from any document source
    pub async fn run_source(
        &self,
        source: &DocumentSource,
    ) -> Result<ExtractionReport, ExtractorError> {
        let (result, _) = self.run_with_metrics(source).await;
        result
    }

    /// Extract and also return the run's metrics, which survive failed runs
    pub async fn run_with_metrics(
        &self,
        source: &DocumentSource,
    ) -> (Result<ExtractionReport, ExtractorError>, RunMetrics) {
        let run_id = RunId::new();
        let mut metrics = RunMetrics::new();

        let result = self
            .run_inner(run_id, source, &mut metrics)
            .instrument(info_span!("extraction", run_id = %run_id))
            .await;

        (result, metrics)
    }

    async fn run_inner(
        &self,
        run_id: RunId,
        source: &DocumentSource,
        metrics: &mut RunMetrics,
    ) -> Result<ExtractionReport, ExtractorError> {
        info!(
            "Starting extraction of {} with {} schemas",
            source,
            self.catalog.len()
        );

        let ingested = self.ingestor.ingest(source).await.map_err(|e| {
            error!("Ingestion failed: {}", e);
            e
        })?;
        let handle = ingested.handle;

        let mut merger = RecordMerger::new(Arc::clone(&self.collision_hook));

        for schema in self.catalog.iter() {
            let object = match self.extract_schema(&handle, schema, metrics).await {
                Ok(object) => object,
                Err(e) => {
                    info!("Token usage before abort: {}", metrics.usage);
                    return Err(e);
                }
            };
            let collisions = merger.merge(&schema.name, object);
            metrics.record_collisions(collisions);
        }

        let record = merger.into_record();

        let identity = self.gatekeeper.validate(&record).map_err(|e| {
            warn!("Composite record rejected: {}", e);
            info!("Token usage: {}", metrics.usage);
            ExtractorError::Validation(e)
        })?;

        info!(
            "Extraction complete for '{}' {}: {} keys, {} attempts, tokens {}",
            identity.company,
            identity.year,
            record.len(),
            metrics.total_attempts(),
            metrics.usage
        );

        Ok(ExtractionReport {
            run_id,
            year: identity.year_key(),
            identity_key: identity.company,
            record,
            token_usage: metrics.usage,
        })
    }

    /// Run one schema through the retry state machine
    async fn extract_schema(
        &self,
        handle: &DocumentHandle,
        schema: &SchemaDescriptor,
        metrics: &mut RunMetrics,
    ) -> Result<Map<String, Value>, ExtractorError> {
        let mut state = RetryState::start();

        loop {
            state = match state {
                RetryState::Attempting(attempt) => {
                    let (usage, result) = self.attempt(handle, schema).await;

                    metrics.record_attempt(ExtractionAttempt {
                        schema_name: schema.name.clone(),
                        attempt_number: attempt,
                        outcome: match &result {
                            Ok(_) => AttemptOutcome::Succeeded,
                            Err(cause) => AttemptOutcome::Failed(cause.to_string()),
                        },
                        usage,
                    });

                    match result {
                        Ok(value) => RetryState::Succeeded {
                            attempts: attempt,
                            value,
                        },
                        Err(cause) => {
                            warn!(
                                "Schema {} attempt {}/{} failed: {}",
                                schema.name,
                                attempt,
                                self.retry.max_attempts(),
                                cause
                            );
                            self.retry.after_failure(attempt, cause)
                        }
                    }
                }
                RetryState::Retrying { attempt, delay, .. } => {
                    info!(
                        "Retrying schema {} in {}s",
                        schema.name,
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                    RetryState::Attempting(attempt + 1)
                }
                RetryState::Succeeded { attempts, value } => {
                    debug!(
                        "Schema {} extracted {} keys after {} attempt(s)",
                        schema.name,
                        value.len(),
                        attempts
                    );
                    return Ok(value);
                }
                RetryState::Exhausted { attempts, cause } => {
                    error!(
                        "Schema {} exhausted after {} attempts: {}",
                        schema.name, attempts, cause
                    );
                    return Err(ExtractorError::Exhausted {
                        schema: schema.name.clone(),
                        attempts,
                        cause,
                    });
                }
            };
        }
    }

    /// One bounded call to the backend
    async fn attempt(
        &self,
        handle: &DocumentHandle,
        schema: &SchemaDescriptor,
    ) -> (Option<TokenUsage>, Result<Map<String, Value>, TransientError>) {
        let call = self
            .backend
            .generate(handle, &self.config.instruction_text, schema);

        match timeout(self.config.attempt_timeout(), call).await {
            Err(_) => (
                None,
                Err(TransientError::Timeout(self.config.attempt_timeout_secs)),
            ),
            Ok(Err(e)) => (None, Err(TransientError::Backend(e.to_string()))),
            Ok(Ok(response)) => (
                response.usage,
                parse_extraction(response.text.as_deref()),
            ),
        }
    }

    /// Store a validated report under `reports.<year>` of its company
    pub async fn persist(&self, report: &ExtractionReport) -> Result<PersistOutcome, ExtractorError> {
        let result = self
            .store
            .upsert_report(&report.identity_key, &report.year, &report.record)
            .await
            .map_err(|e| {
                error!(
                    "Persisting '{}' {} failed: {}",
                    report.identity_key, report.year, e
                );
                ExtractorError::Persistence {
                    identity_key: report.identity_key.clone(),
                    year: report.year.clone(),
                    cause: e.to_string(),
                }
            })?;

        let status = PersistStatus::from(result);
        info!(
            "Report for '{}' {} {}",
            report.identity_key, report.year, status
        );

        Ok(PersistOutcome {
            status,
            identity_key: report.identity_key.clone(),
            year: report.year.clone(),
            report_keys: report.record.keys().cloned().collect(),
        })
    }

    /// Extract then persist; nothing is stored if extraction fails
    pub async fn run_and_persist(
        &self,
        reference: &str,
    ) -> Result<(ExtractionReport, PersistOutcome), ExtractorError> {
        let report = self.run_extraction(reference).await?;
        let outcome = self
            .persist(&report)
            .instrument(info_span!("persist", run_id = %report.run_id))
            .await?;
        Ok((report, outcome))
    }
}

impl<B, F, S, H> Extractor<B, F, S, H>
where
    B: ExtractionBackend + 'static,
    F: FileStore + 'static,
    S: ReportStore + 'static,
    H: SourceFetcher + 'static,
{
    /// Extract and persist many documents, at most
    /// `max_concurrent_documents` at a time
    ///
    /// Results come back in input order. Each document is independent: one
    /// failure never affects the others.
    pub async fn process_batch(self: &Arc<Self>, references: Vec<String>) -> Vec<BatchItem> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_documents));
        let mut tasks = JoinSet::new();

        info!(
            "Processing batch of {} documents ({} at a time)",
            references.len(),
            self.config.max_concurrent_documents
        );

        for (index, reference) in references.into_iter().enumerate() {
            let extractor = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = extractor
                    .run_and_persist(&reference)
                    .await
                    .map(|(_, outcome)| outcome);
                (index, BatchItem { reference, result })
            });
        }

        let mut items = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(item) => items.push(item),
                Err(e) => error!("Batch task failed: {}", e),
            }
        }

        items.sort_by_key(|(index, _)| *index);
        let items: Vec<BatchItem> = items.into_iter().map(|(_, item)| item).collect();

        let failed = items.iter().filter(|i| i.result.is_err()).count();
        info!(
            "Batch complete: {} succeeded, {} failed",
            items.len() - failed,
            failed
        );

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esgex_llm::{MockBackend, MockFileStore, MockReply};
    use esgex_store::SqliteReportStore;

    const METADATA: &str =
        r#"{"report_metadata": {"company_legal_name": "Acme Corp", "reporting_year": 2023}}"#;

    fn create_test_extractor(
        backend: MockBackend,
    ) -> Extractor<MockBackend, MockFileStore, SqliteReportStore> {
        let config = ExtractorConfig {
            retry_base_delay_secs: 0,
            ..ExtractorConfig::default()
        };

        Extractor::new(
            DocumentIngestor::new(MockFileStore::new()),
            backend,
            SqliteReportStore::in_memory().unwrap(),
            Gatekeeper::default_config(),
            SchemaCatalog::esg_default(),
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_extract_minimal_report() {
        let backend = MockBackend::default();
        backend.set_reply("ReportMetadata", MockReply::text(METADATA));
        let extractor = create_test_extractor(backend.clone());

        let report = extractor
            .run_source(&DocumentSource::bytes("acme.pdf", vec![0u8]))
            .await
            .unwrap();

        assert_eq!(report.identity_key, "Acme Corp");
        assert_eq!(report.year, "2023");
        assert_eq!(backend.call_count(), 8);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = ExtractorConfig {
            max_retries: 0,
            ..ExtractorConfig::default()
        };

        let result = Extractor::new(
            DocumentIngestor::new(MockFileStore::new()),
            MockBackend::default(),
            SqliteReportStore::in_memory().unwrap(),
            Gatekeeper::default_config(),
            SchemaCatalog::esg_default(),
            config,
        );

        assert!(matches!(result, Err(ExtractorError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_identity_fails_validation() {
        let extractor = create_test_extractor(MockBackend::default());

        let result = extractor
            .run_source(&DocumentSource::bytes("acme.pdf", vec![0u8]))
            .await;

        assert!(matches!(result, Err(ExtractorError::Validation(_))));
    }
}
