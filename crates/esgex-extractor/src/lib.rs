//! Esgex Extractor
//!
//! Turns an ESG report document into one validated composite record and
//! stores it under its company and reporting year.
//!
//! # Architecture
//!
//! ```text
//! Source → Ingestor → (for each schema: Retry → Backend → Merger) → Gatekeeper → ReportStore
//! ```
//!
//! # Key Features
//!
//! - **Idempotent ingestion**: a document is uploaded once per sanitized name
//! - **Schema-sequenced extraction**: one backend call per catalog schema, in order
//! - **Bounded retries**: linear backoff, the run aborts once a schema is exhausted
//! - **All-or-nothing**: no partial record is ever returned or stored
//! - **Tri-state persistence**: inserted, updated or unchanged
//! - **Batch processing**: many documents with bounded concurrency
//!
//! # Example Usage
//!
//! ```no_run
//! use esgex_extractor::{DocumentIngestor, Extractor, ExtractorConfig, SchemaCatalog};
//! use esgex_gatekeeper::Gatekeeper;
//! use esgex_llm::GeminiBackend;
//! use esgex_store::SqliteReportStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gemini = GeminiBackend::default_model("api-key");
//! let extractor = Extractor::new(
//!     DocumentIngestor::new(gemini.clone()),
//!     gemini,
//!     SqliteReportStore::new("esg.db")?,
//!     Gatekeeper::default_config(),
//!     SchemaCatalog::esg_default(),
//!     ExtractorConfig::default(),
//! )?;
//!
//! let (report, outcome) = extractor
//!     .run_and_persist("https://example.com/acme-esg-2023.pdf")
//!     .await?;
//!
//! println!("{} {}: {}", report.identity_key, report.year, outcome.status);
//! println!("Tokens: {}", report.token_usage);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod catalog;
mod config;
mod error;
mod extractor;
mod ingest;
mod merge;
mod metrics;
mod parser;
mod prompt;
mod retry;


pub use catalog::SchemaCatalog;
pub use config::ExtractorConfig;
pub use error::{ExtractorError, IngestError, TransientError};
pub use extractor::{BatchItem, Extractor};
pub use ingest::{
    infer_mime_type, remote_name_for, sanitize_document_name, DocumentIngestor, HttpFetcher,
    Ingested, SourceFetcher, DEFAULT_MIME_TYPE, MAX_NAME_LENGTH,
};
pub use merge::{CollisionHook, LogCollisions, RecordMerger};
pub use metrics::RunMetrics;
pub use parser::{parse_extraction, strip_code_fence};
pub use prompt::DEFAULT_INSTRUCTION;
pub use retry::{RetryPolicy, RetryState};
