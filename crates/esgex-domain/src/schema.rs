//! Schema descriptors - one per semantic facet of a report

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes the JSON shape the backend must produce for one facet
///
/// The `shape` is an OpenAPI-style object schema. Schemas in a catalog are
/// designed so that their top-level `properties` never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Human-readable schema name (e.g. `EnvironmentalEmissionsEnergy`)
    pub name: String,

    /// Expected JSON shape, passed to the backend verbatim
    pub shape: Value,
}

impl SchemaDescriptor {
    /// Create a new schema descriptor
    ///
    /// # Examples
    ///
    /// ```
    /// use esgex_domain::SchemaDescriptor;
    /// use serde_json::json;
    ///
    /// let schema = SchemaDescriptor::new(
    ///     "ReportMetadata",
    ///     json!({"type": "object", "properties": {"report_metadata": {"type": "object"}}}),
    /// );
    /// assert_eq!(schema.top_level_keys(), vec!["report_metadata".to_string()]);
    /// ```
    pub fn new(name: impl Into<String>, shape: Value) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Top-level keys this schema contributes to the composite record
    ///
    /// Read from the shape's `properties` object. A shape without
    /// `properties` contributes no known keys.
    pub fn top_level_keys(&self) -> Vec<String> {
        self.shape
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}
