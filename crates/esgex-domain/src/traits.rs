//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and the services it
//! talks to. Implementations live in other crates (`esgex-llm`, `esgex-store`)
//! and are injected explicitly, so every pipeline instance can be built with
//! its own collaborators.

use crate::{CompanyReports, CompositeRecord, DocumentHandle, SchemaDescriptor, TokenUsage, UpsertResult};
use async_trait::async_trait;

/// Normalized reply from the extraction backend
///
/// Adapters translate whatever the backend returns into this fixed shape, so
/// the pipeline never inspects backend-specific response objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendResponse {
    /// Generated text, expected to be a JSON object
    pub text: Option<String>,

    /// Usage metadata, when the backend reported it
    pub usage: Option<TokenUsage>,
}

impl BackendResponse {
    /// Response carrying text and usage
    pub fn new(text: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        Self {
            text: Some(text.into()),
            usage,
        }
    }

    /// Response with no text at all
    pub fn empty(usage: Option<TokenUsage>) -> Self {
        Self { text: None, usage }
    }
}

/// Generative extraction service
///
/// Implemented by the adapter layer (esgex-llm)
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Error type for transport or API failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Extract one schema's worth of data from an uploaded document
    async fn generate(
        &self,
        document: &DocumentHandle,
        instruction: &str,
        schema: &SchemaDescriptor,
    ) -> Result<BackendResponse, Self::Error>;
}

/// Registry of documents uploaded to the extraction backend
///
/// Implemented by the adapter layer (esgex-llm)
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Error type for registry operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up a previously uploaded document by its remote name
    async fn find(&self, name: &str) -> Result<Option<DocumentHandle>, Self::Error>;

    /// Upload a document under the given remote name
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<DocumentHandle, Self::Error>;
}

/// Versioned document store, one document per company
///
/// Implemented by the infrastructure layer (esgex-store). Implementations must
/// tolerate concurrent use from independent pipeline runs.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Set `reports.<year>` on the document keyed by `company_id`,
    /// creating the document if absent
    async fn upsert_report(
        &self,
        company_id: &str,
        year: &str,
        report: &CompositeRecord,
    ) -> Result<UpsertResult, Self::Error>;

    /// Get the whole document for a company
    async fn find_company(&self, company_id: &str) -> Result<Option<CompanyReports>, Self::Error>;

    /// Get one year's report for a company
    async fn find_report(
        &self,
        company_id: &str,
        year: &str,
    ) -> Result<Option<CompositeRecord>, Self::Error>;

    /// All company identities in the store, sorted
    async fn list_companies(&self) -> Result<Vec<String>, Self::Error>;
}
