//! Document references and the handles the backend hands back for them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A file on the local filesystem
    Path(PathBuf),

    /// An in-memory byte stream with the file name it should be known by
    Bytes {
        /// File name used to derive the remote identifier
        name: String,
        /// Raw document bytes
        data: Vec<u8>,
    },

    /// A remote document reachable over HTTP(S)
    Url(String),
}

impl DocumentSource {
    /// Interpret a plain string reference
    ///
    /// `http://` and `https://` prefixes select [`DocumentSource::Url`];
    /// anything else is treated as a local path.
    ///
    /// # Examples
    ///
    /// ```
    /// use esgex_domain::DocumentSource;
    ///
    /// assert!(matches!(
    ///     DocumentSource::from_reference("https://acme.com/esg-2023.pdf"),
    ///     DocumentSource::Url(_)
    /// ));
    /// assert!(matches!(
    ///     DocumentSource::from_reference("reports/acme.pdf"),
    ///     DocumentSource::Path(_)
    /// ));
    /// ```
    pub fn from_reference(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            DocumentSource::Url(reference.to_string())
        } else {
            DocumentSource::Path(PathBuf::from(reference))
        }
    }

    /// Create a byte-stream source
    pub fn bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        DocumentSource::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    /// File name of the source (last path segment, query string removed)
    ///
    /// Returns `None` when no name can be inferred, e.g. a URL ending in `/`.
    pub fn file_name(&self) -> Option<String> {
        let name = match self {
            DocumentSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            DocumentSource::Bytes { name, .. } => Some(name.clone()),
            DocumentSource::Url(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query.rsplit('/').next().map(str::to_string)
            }
        };
        name.filter(|n| !n.is_empty())
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(path) => write!(f, "{}", path.display()),
            DocumentSource::Bytes { name, data } => write!(f, "{} ({} bytes)", name, data.len()),
            DocumentSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Stable reference to a document that lives at the extraction backend
///
/// Uploading the same source twice yields the same handle: the `name` is
/// derived deterministically from the source's file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// Remote resource name, `files/<sanitized-id>`
    pub name: String,

    /// Backend URI used when referencing the file in a request
    pub uri: Option<String>,

    /// MIME type the document was uploaded with
    pub mime_type: String,
}

impl DocumentHandle {
    /// Create a new handle
    pub fn new(name: impl Into<String>, uri: Option<String>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri,
            mime_type: mime_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reference() {
        assert_eq!(
            DocumentSource::from_reference("http://example.com/a.pdf"),
            DocumentSource::Url("http://example.com/a.pdf".to_string())
        );
        assert_eq!(
            DocumentSource::from_reference("/tmp/a.pdf"),
            DocumentSource::Path(PathBuf::from("/tmp/a.pdf"))
        );
    }

    #[test]
    fn test_file_name_from_url_strips_query() {
        let source = DocumentSource::Url(
            "https://cdn.acme.com/reports/Acme_ESG_2023.pdf?token=abc#page=2".to_string(),
        );
        assert_eq!(source.file_name().as_deref(), Some("Acme_ESG_2023.pdf"));
    }

    #[test]
    fn test_file_name_missing() {
        let source = DocumentSource::Url("https://acme.com/".to_string());
        assert_eq!(source.file_name(), None);
    }

    #[test]
    fn test_file_name_from_path_and_bytes() {
        let path = DocumentSource::Path(PathBuf::from("data/reports/acme-2022.pdf"));
        assert_eq!(path.file_name().as_deref(), Some("acme-2022.pdf"));

        let bytes = DocumentSource::bytes("upload.pdf", vec![1u8, 2, 3]);
        assert_eq!(bytes.file_name().as_deref(), Some("upload.pdf"));
        assert_eq!(bytes.to_string(), "upload.pdf (3 bytes)");
    }
}
