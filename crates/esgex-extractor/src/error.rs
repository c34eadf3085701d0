//! Error types for the Extractor

use esgex_gatekeeper::GatekeeperError;
use thiserror::Error;

/// Errors that can occur while turning a source reference into a document handle
///
/// Always fatal: the pipeline aborts without retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// No usable remote name could be derived from the source
    #[error("Invalid document name: {0}")]
    InvalidName(String),

    /// Local file could not be read
    #[error("Failed to read '{path}': {reason}")]
    Read {
        /// Path that was read
        path: String,
        /// Description of the I/O failure
        reason: String,
    },

    /// Remote source could not be downloaded
    #[error("Failed to download '{url}': {reason}")]
    Download {
        /// URL that was requested
        url: String,
        /// Description of the failure
        reason: String,
    },

    /// The backend's file registry rejected a lookup or upload
    #[error("File registry error: {0}")]
    Registry(String),
}

/// Retryable failure of one extraction attempt
///
/// Never escapes the retry controller except as the cause of
/// [`ExtractorError::Exhausted`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransientError {
    /// Backend returned no text
    #[error("Empty response")]
    EmptyResponse,

    /// Text was not valid JSON
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    /// Text was valid JSON but not an object
    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// Transport or API failure reported by the backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Attempt did not finish in time
    #[error("Attempt timed out after {0}s")]
    Timeout(u64),
}

/// Errors that can occur during a pipeline run
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Document could not be ingested
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestError),

    /// A schema failed on every allowed attempt
    #[error("Extraction exhausted for schema '{schema}' after {attempts} attempts: {cause}")]
    Exhausted {
        /// Schema that could not be extracted
        schema: String,
        /// Number of attempts made
        attempts: u32,
        /// Failure of the last attempt
        #[source]
        cause: TransientError,
    },

    /// Composite record failed identity validation
    #[error("Validation error: {0}")]
    Validation(#[from] GatekeeperError),

    /// Report store rejected the write
    #[error("Persistence error for '{identity_key}' year {year}: {cause}")]
    Persistence {
        /// Company identity being written
        identity_key: String,
        /// Year slot being written
        year: String,
        /// Store error description
        cause: String,
    },

    /// Invalid configuration or schema catalog
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractorError {
    /// Short category name, used in logs and batch summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractorError::Ingestion(_) => "ingestion",
            ExtractorError::Exhausted { .. } => "exhausted",
            ExtractorError::Validation(_) => "validation",
            ExtractorError::Persistence { .. } => "persistence",
            ExtractorError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_display_includes_cause() {
        let err = ExtractorError::Exhausted {
            schema: "ReportMetadata".to_string(),
            attempts: 3,
            cause: TransientError::EmptyResponse,
        };
        let message = err.to_string();
        assert!(message.contains("ReportMetadata"));
        assert!(message.contains("3 attempts"));
        assert!(message.contains("Empty response"));
        assert_eq!(err.kind(), "exhausted");
    }

    #[test]
    fn test_ingest_error_converts() {
        let err: ExtractorError = IngestError::InvalidName("---".to_string()).into();
        assert!(matches!(err, ExtractorError::Ingestion(_)));
    }
}
