//! Document ingestion
//!
//! Turns a [`DocumentSource`] into a [`DocumentHandle`] at the backend's file
//! registry. The remote name is derived from the source's file name alone, so
//! ingesting the same source twice finds the earlier upload instead of
//! uploading again.

use crate::error::IngestError;
use async_trait::async_trait;
use esgex_domain::traits::FileStore;
use esgex_domain::{DocumentHandle, DocumentSource};
use reqwest::header::USER_AGENT;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest sanitized identifier the file registry accepts
pub const MAX_NAME_LENGTH: usize = 40;

/// MIME type used when the extension is unknown
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// Some report hosts refuse requests without a browser-like agent
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Downloads remote documents
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the full body at `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IngestError>;
}

/// `SourceFetcher` over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(120))
    }

    /// Create a fetcher whose requests time out after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    "Download client with a {:?} timeout could not be built ({}); using reqwest defaults",
                    timeout, e
                );
                reqwest::Client::new()
            });
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IngestError> {
        let download_error = |reason: String| IngestError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(|e| download_error(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.without_url().to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Result of ingesting one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    /// Handle to pass to the extraction backend
    pub handle: DocumentHandle,

    /// False when an earlier upload was reused
    pub uploaded: bool,
}

/// Uploads documents to the backend's file registry, at most once per name
pub struct DocumentIngestor<F, H = HttpFetcher> {
    files: F,
    fetcher: H,
}

impl<F: FileStore> DocumentIngestor<F, HttpFetcher> {
    /// Create an ingestor that downloads URLs over HTTP
    pub fn new(files: F) -> Self {
        Self::with_fetcher(files, HttpFetcher::new())
    }
}

impl<F: FileStore, H: SourceFetcher> DocumentIngestor<F, H> {
    /// Create an ingestor with a custom fetcher
    pub fn with_fetcher(files: F, fetcher: H) -> Self {
        Self { files, fetcher }
    }

    /// The underlying file registry
    pub fn files(&self) -> &F {
        &self.files
    }

    /// Find or upload the document behind `source`
    pub async fn ingest(&self, source: &DocumentSource) -> Result<Ingested, IngestError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| IngestError::InvalidName(format!("no file name in '{}'", source)))?;
        let remote_name = remote_name_for(&file_name)?;

        let existing = self
            .files
            .find(&remote_name)
            .await
            .map_err(|e| IngestError::Registry(e.to_string()))?;

        if let Some(handle) = existing {
            info!("Document already uploaded: {}", remote_name);
            return Ok(Ingested {
                handle,
                uploaded: false,
            });
        }

        let bytes = self.read_source(source).await?;
        let mime_type = infer_mime_type(&file_name);

        debug!(
            "Uploading {} ({} bytes, {}) as {}",
            file_name,
            bytes.len(),
            mime_type,
            remote_name
        );

        let handle = self
            .files
            .upload(&remote_name, bytes, mime_type)
            .await
            .map_err(|e| IngestError::Registry(e.to_string()))?;

        info!("Uploaded document: {}", handle.name);

        Ok(Ingested {
            handle,
            uploaded: true,
        })
    }

    async fn read_source(&self, source: &DocumentSource) -> Result<Vec<u8>, IngestError> {
        match source {
            DocumentSource::Path(path) => tokio::fs::read(path).await.map_err(|e| IngestError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
            DocumentSource::Bytes { data, .. } => Ok(data.clone()),
            DocumentSource::Url(url) => self.fetcher.fetch(url).await,
        }
    }
}

/// Remote registry name for a file name: `files/<sanitized stem>`
pub fn remote_name_for(file_name: &str) -> Result<String, IngestError> {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    Ok(format!("files/{}", sanitize_document_name(&stem)?))
}

/// Sanitize a name into a registry identifier
///
/// Lowercases, collapses every run of characters outside `[a-z0-9]` into a
/// single `-`, strips leading and trailing dashes, and truncates to
/// [`MAX_NAME_LENGTH`] characters without leaving a trailing dash.
///
/// # Examples
///
/// ```
/// use esgex_extractor::sanitize_document_name;
///
/// assert_eq!(sanitize_document_name("Acme ESG Report_2023").unwrap(), "acme-esg-report-2023");
/// assert!(sanitize_document_name("___").is_err());
/// ```
pub fn sanitize_document_name(name: &str) -> Result<String, IngestError> {
    let mut sanitized = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !sanitized.is_empty() {
                sanitized.push('-');
            }
            pending_dash = false;
            sanitized.push(c);
        } else {
            pending_dash = true;
        }
    }

    sanitized.truncate(MAX_NAME_LENGTH);
    let sanitized = sanitized.trim_end_matches('-').to_string();

    if sanitized.is_empty() {
        return Err(IngestError::InvalidName(format!(
            "'{}' is empty after sanitization",
            name
        )));
    }

    Ok(sanitized)
}

/// MIME type for a file name, by extension
pub fn infer_mime_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());

    match extension.as_deref() {
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        _ => DEFAULT_MIME_TYPE,
    }
}
