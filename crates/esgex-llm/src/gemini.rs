//! Gemini Backend Implementation
//!
//! Talks to Google's Generative Language REST API.
//!
//! # Features
//!
//! - Files API: listing (to reuse earlier uploads) and resumable upload
//! - `generateContent` with a JSON response MIME type and the schema passed
//!   as `responseSchema`, temperature 0
//! - Response normalization into `BackendResponse`
//!
//! Retries are not performed here; the pipeline owns retry policy.
//!
//! # Examples
//!
//! ```no_run
//! use esgex_llm::GeminiBackend;
//!
//! let backend = GeminiBackend::new("api-key", "gemini-2.0-flash");
//! ```

use crate::LlmError;
use async_trait::async_trait;
use esgex_domain::traits::{BackendResponse, ExtractionBackend, FileStore};
use esgex_domain::{DocumentHandle, SchemaDescriptor, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Generative Language API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default model for extraction
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default timeout for a single HTTP request (5 minutes; large PDFs are slow)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const LIST_PAGE_SIZE: u32 = 100;

/// Gemini API backend
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct GeminiBackend {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

/// Request body for `models/{model}:generateContent`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    File {
        #[serde(rename = "fileData")]
        file_data: FileData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
    temperature: f32,
}

/// Response from `generateContent`
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}

/// File resource as returned by the files API
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    uri: Option<String>,
    mime_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesResponse {
    #[serde(default)]
    files: Vec<RemoteFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    file: UploadFile<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadFile<'a> {
    name: &'a str,
    display_name: &'a str,
}

impl GeminiBackend {
    /// Create a new Gemini backend against the public endpoint
    ///
    /// # Parameters
    ///
    /// - `api_key`: Generative Language API key
    /// - `model`: Model to use (e.g., "gemini-2.0-flash")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Create a backend using [`DEFAULT_MODEL`]
    pub fn default_model(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEFAULT_MODEL)
    }

    /// Point the backend at another endpoint (proxies, test servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    /// Model this backend generates with
    pub fn model(&self) -> &str {
        &self.model
    }

    /// List every file name currently registered with the backend
    pub async fn list_files(&self) -> Result<Vec<DocumentHandle>, LlmError> {
        let url = format!("{}/{}/files", self.endpoint, API_VERSION);
        let mut handles = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, self.api_key.as_str())
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_error("Request failed", e))?;
            let response = check_status(response)?;
            let page: ListFilesResponse = response
                .json()
                .await
                .map_err(|e| decode_error("file list", e))?;

            handles.extend(page.files.into_iter().map(RemoteFile::into_handle));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(handles)
    }

    fn file_uri(&self, document: &DocumentHandle) -> String {
        document
            .uri
            .clone()
            .unwrap_or_else(|| format!("{}/{}/{}", self.endpoint, API_VERSION, document.name))
    }
}

#[async_trait]
impl ExtractionBackend for GeminiBackend {
    type Error = LlmError;

    async fn generate(
        &self,
        document: &DocumentHandle,
        instruction: &str,
        schema: &SchemaDescriptor,
    ) -> Result<BackendResponse, Self::Error> {
        let url = format!(
            "{}/{}/models/{}:generateContent",
            self.endpoint, API_VERSION, self.model
        );
        let file_uri = self.file_uri(document);
        let body = build_generate_request(document, &file_uri, instruction, schema);

        debug!("Calling {} for schema '{}'", self.model, schema.name);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Request failed", e))?;
        let response = check_status(response)?;

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| decode_error("response", e))?;

        Ok(parsed.normalize())
    }
}

#[async_trait]
impl FileStore for GeminiBackend {
    type Error = LlmError;

    async fn find(&self, name: &str) -> Result<Option<DocumentHandle>, Self::Error> {
        let files = self.list_files().await?;
        Ok(files.into_iter().find(|handle| handle.name == name))
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<DocumentHandle, Self::Error> {
        let start_url = format!("{}/upload/{}/files", self.endpoint, API_VERSION);
        let display_name = name.strip_prefix("files/").unwrap_or(name);
        let metadata = UploadMetadata {
            file: UploadFile { name, display_name },
        };

        // Resumable protocol: start a session, then send the bytes and finalize
        let start = self
            .client
            .post(&start_url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| transport_error("Upload start failed", e))?;
        let start = check_status(start)?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("Missing upload URL".to_string()))?;

        let finish = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error("Upload failed", e))?;
        let finish = check_status(finish)?;

        let uploaded: UploadResponse = finish
            .json()
            .await
            .map_err(|e| decode_error("upload response", e))?;

        Ok(uploaded.file.into_handle())
    }
}

impl GenerateContentResponse {
    /// Collapse the candidate structure into plain text + usage
    fn normalize(self) -> BackendResponse {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|text| !text.trim().is_empty());

        let usage = self.usage_metadata.map(|u| {
            TokenUsage::new(
                u.prompt_token_count.unwrap_or(0),
                u.candidates_token_count.unwrap_or(0),
                u.total_token_count.unwrap_or(0),
            )
        });

        BackendResponse { text, usage }
    }
}

impl RemoteFile {
    fn into_handle(self) -> DocumentHandle {
        DocumentHandle::new(
            self.name,
            self.uri,
            self.mime_type.unwrap_or_else(|| "application/pdf".to_string()),
        )
    }
}

fn build_generate_request<'a>(
    document: &'a DocumentHandle,
    file_uri: &'a str,
    instruction: &'a str,
    schema: &'a SchemaDescriptor,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part::File {
                    file_data: FileData {
                        mime_type: &document.mime_type,
                        file_uri,
                    },
                },
                Part::Text { text: instruction },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: &schema.shape,
            temperature: 0.0,
        },
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(
                "HTTP client with a {:?} timeout could not be built ({}); using reqwest defaults",
                timeout, e
            );
            reqwest::Client::new()
        })
}

/// Request URLs are stripped so upload session URLs never reach error text
fn transport_error(context: &str, error: reqwest::Error) -> LlmError {
    LlmError::Communication(format!("{}: {}", context, error.without_url()))
}

fn decode_error(what: &str, error: reqwest::Error) -> LlmError {
    LlmError::InvalidResponse(format!("Failed to parse {}: {}", what, error.without_url()))
}

/// Map HTTP failures onto error kinds without echoing the response body
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            LlmError::Unauthorized(format!("HTTP {}", status))
        }
        reqwest::StatusCode::NOT_FOUND => LlmError::NotFound(format!("HTTP {}", status)),
        reqwest::StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded,
        _ => LlmError::Communication(format!("HTTP {}", status)),
    })
}
