//! Esgex Extraction Backend Layer
//!
//! Pluggable implementations of the `ExtractionBackend` and `FileStore` traits
//! from `esgex-domain`.
//!
//! # Backends
//!
//! - `MockBackend` / `MockFileStore`: deterministic, scriptable doubles for testing
//! - `GeminiBackend`: Google Generative Language REST API (files + generateContent)
//!
//! Every backend normalizes its replies into `BackendResponse { text, usage }`
//! so the pipeline never branches on backend-specific response shapes.
//!
//! # Examples
//!
//! ```
//! use esgex_llm::{MockBackend, MockReply};
//!
//! let backend = MockBackend::new(r#"{"report_metadata": {}}"#);
//! backend.push_reply("EnvironmentalEmissionsEnergy", MockReply::Empty(None));
//! assert_eq!(backend.call_count(), 0);
//! ```

#![warn(missing_docs)]

pub mod gemini;

use async_trait::async_trait;
use esgex_domain::traits::{BackendResponse, ExtractionBackend, FileStore};
use esgex_domain::{DocumentHandle, SchemaDescriptor, TokenUsage};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub use gemini::GeminiBackend;

/// Errors that can occur while talking to an extraction backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Credentials rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource or model not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error
    #[error("Backend error: {0}")]
    Other(String),
}

/// One scripted reply of the [`MockBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Return this text with optional usage metadata
    Text(String, Option<TokenUsage>),

    /// Return no text at all (optionally still reporting usage)
    Empty(Option<TokenUsage>),

    /// Fail the call with a communication error
    Error(String),
}

impl MockReply {
    /// Text reply without usage metadata
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into(), None)
    }

    /// Text reply with usage metadata
    pub fn text_with_usage(text: impl Into<String>, usage: TokenUsage) -> Self {
        MockReply::Text(text.into(), Some(usage))
    }
}

/// Mock extraction backend for deterministic testing
///
/// Replies are chosen per schema name: queued one-shot replies first
/// ([`push_reply`](Self::push_reply)), then a fixed reply for that schema
/// ([`set_reply`](Self::set_reply)), then the default reply. Every call is
/// logged by schema name. Clones share state.
///
/// # Examples
///
/// ```
/// use esgex_llm::{MockBackend, MockReply};
///
/// let backend = MockBackend::default();
/// backend.set_reply("ReportMetadata", MockReply::text(r#"{"report_metadata": {}}"#));
/// backend.push_reply("ReportMetadata", MockReply::Error("flaky".into()));
/// ```
#[derive(Debug, Clone)]
pub struct MockBackend {
    default_reply: MockReply,
    fixed: Arc<Mutex<HashMap<String, MockReply>>>,
    queued: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Create a MockBackend that answers every schema with the same text
    pub fn new(response: impl Into<String>) -> Self {
        Self::from_reply(MockReply::text(response))
    }

    /// Create a MockBackend with an arbitrary default reply
    pub fn from_reply(reply: MockReply) -> Self {
        Self {
            default_reply: reply,
            fixed: Arc::new(Mutex::new(HashMap::new())),
            queued: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always reply for `schema` with `reply`
    pub fn set_reply(&self, schema: impl Into<String>, reply: MockReply) {
        lock(&self.fixed).insert(schema.into(), reply);
    }

    /// Queue a one-shot reply for `schema`, consumed before the fixed reply
    pub fn push_reply(&self, schema: impl Into<String>, reply: MockReply) {
        lock(&self.queued)
            .entry(schema.into())
            .or_default()
            .push_back(reply);
    }

    /// Total number of generate calls
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of generate calls for one schema
    pub fn calls_for(&self, schema: &str) -> usize {
        lock(&self.calls).iter().filter(|s| *s == schema).count()
    }

    /// Schema names in call order
    pub fn call_log(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Reset the call log
    pub fn reset_call_count(&self) {
        lock(&self.calls).clear();
    }

    fn next_reply(&self, schema: &str) -> MockReply {
        if let Some(reply) = lock(&self.queued).get_mut(schema).and_then(VecDeque::pop_front) {
            return reply;
        }
        lock(&self.fixed)
            .get(schema)
            .cloned()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("{}")
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    type Error = LlmError;

    async fn generate(
        &self,
        _document: &DocumentHandle,
        _instruction: &str,
        schema: &SchemaDescriptor,
    ) -> Result<BackendResponse, Self::Error> {
        lock(&self.calls).push(schema.name.clone());

        match self.next_reply(&schema.name) {
            MockReply::Text(text, usage) => Ok(BackendResponse::new(text, usage)),
            MockReply::Empty(usage) => Ok(BackendResponse::empty(usage)),
            MockReply::Error(message) => Err(LlmError::Communication(message)),
        }
    }
}

/// In-memory stand-in for the backend's file registry
///
/// Clones share state, so a test can keep one clone to inspect uploads.
#[derive(Debug, Clone, Default)]
pub struct MockFileStore {
    files: Arc<Mutex<HashMap<String, DocumentHandle>>>,
    upload_count: Arc<Mutex<usize>>,
    failure: Arc<Mutex<Option<LlmError>>>,
}

impl MockFileStore {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `error`
    pub fn fail_with(&self, error: LlmError) {
        *lock(&self.failure) = Some(error);
    }

    /// Number of uploads performed
    pub fn upload_count(&self) -> usize {
        *lock(&self.upload_count)
    }

    /// Number of distinct documents held
    pub fn len(&self) -> usize {
        lock(&self.files).len()
    }

    /// True when nothing has been uploaded
    pub fn is_empty(&self) -> bool {
        lock(&self.files).is_empty()
    }

    fn check_failure(&self) -> Result<(), LlmError> {
        match lock(&self.failure).clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    type Error = LlmError;

    async fn find(&self, name: &str) -> Result<Option<DocumentHandle>, Self::Error> {
        self.check_failure()?;
        Ok(lock(&self.files).get(name).cloned())
    }

    async fn upload(
        &self,
        name: &str,
        _bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<DocumentHandle, Self::Error> {
        self.check_failure()?;

        let handle = DocumentHandle::new(name, Some(format!("mock://{}", name)), mime_type);
        lock(&self.files).insert(name.to_string(), handle.clone());
        *lock(&self.upload_count) += 1;
        Ok(handle)
    }
}

/// Mock state stays usable even if a test panicked while holding a lock
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle() -> DocumentHandle {
        DocumentHandle::new("files/acme", None, "application/pdf")
    }

    fn schema(name: &str) -> SchemaDescriptor {
        SchemaDescriptor::new(name, json!({"type": "object"}))
    }

    #[tokio::test]
    async fn test_mock_backend_default() {
        let backend = MockBackend::new(r#"{"a": 1}"#);
        let response = backend.generate(&handle(), "extract", &schema("A")).await.unwrap();
        assert_eq!(response.text.as_deref(), Some(r#"{"a": 1}"#));
        assert_eq!(response.usage, None);
    }

    #[tokio::test]
    async fn test_mock_backend_queued_before_fixed() {
        let backend = MockBackend::default();
        backend.set_reply("A", MockReply::text("fixed"));
        backend.push_reply("A", MockReply::Empty(Some(TokenUsage::new(5, 0, 5))));
        backend.push_reply("A", MockReply::Error("boom".to_string()));

        let first = backend.generate(&handle(), "", &schema("A")).await.unwrap();
        assert_eq!(first, BackendResponse::empty(Some(TokenUsage::new(5, 0, 5))));

        let second = backend.generate(&handle(), "", &schema("A")).await;
        assert!(matches!(second, Err(LlmError::Communication(_))));

        let third = backend.generate(&handle(), "", &schema("A")).await.unwrap();
        assert_eq!(third.text.as_deref(), Some("fixed"));

        let other = backend.generate(&handle(), "", &schema("B")).await.unwrap();
        assert_eq!(other.text.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_mock_backend_call_log() {
        let backend = MockBackend::default();
        let shared = backend.clone();

        backend.generate(&handle(), "", &schema("A")).await.unwrap();
        backend.generate(&handle(), "", &schema("B")).await.unwrap();
        backend.generate(&handle(), "", &schema("A")).await.unwrap();

        // Clones share the same log
        assert_eq!(shared.call_count(), 3);
        assert_eq!(shared.calls_for("A"), 2);
        assert_eq!(shared.call_log(), vec!["A", "B", "A"]);

        shared.reset_call_count();
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_file_store_upload_and_find() {
        let files = MockFileStore::new();
        assert!(files.find("files/acme").await.unwrap().is_none());

        let uploaded = files.upload("files/acme", vec![1, 2, 3], "application/pdf").await.unwrap();
        let found = files.find("files/acme").await.unwrap();

        assert_eq!(found, Some(uploaded));
        assert_eq!(files.upload_count(), 1);
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_file_store_failure() {
        let files = MockFileStore::new();
        files.fail_with(LlmError::Unauthorized("bad key".to_string()));

        let result = files.find("files/acme").await;
        assert_eq!(result, Err(LlmError::Unauthorized("bad key".to_string())));
        assert!(files.is_empty());
    }
}
