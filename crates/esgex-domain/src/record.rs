//! Composite records and the identity that addresses them

use crate::{RunId, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Merged JSON object assembled from every per-schema result of one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeRecord(Map<String, Value>);

impl CompositeRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether a top-level key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a top-level key, returning the value it replaced
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Top-level keys
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of top-level keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no schema has contributed anything yet
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying JSON map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into a JSON object value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for CompositeRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Identity fields that decide where a record is stored
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportIdentity {
    /// Company name exactly as extracted; used verbatim as the primary key
    pub company: String,

    /// Reporting year, always positive
    pub year: u32,
}

impl ReportIdentity {
    /// Year slot key used in the persisted entity
    pub fn year_key(&self) -> String {
        self.year.to_string()
    }
}

/// Success value of one extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Run that produced this report
    pub run_id: RunId,

    /// Company identity (primary key of the persisted entity)
    pub identity_key: String,

    /// Reporting year as a string slot key
    pub year: String,

    /// Complete, validated composite record
    pub record: CompositeRecord,

    /// Tokens consumed across every attempt of the run
    pub token_usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_reports_replaced_value() {
        let mut record = CompositeRecord::new();
        assert!(record.insert("emissions", json!({"scope_1": 10})).is_none());

        let previous = record.insert("emissions", json!({"scope_1": 12}));
        assert_eq!(previous, Some(json!({"scope_1": 10})));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let mut record = CompositeRecord::new();
        record.insert("report_metadata", json!({"company_legal_name": "Acme"}));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"report_metadata": {"company_legal_name": "Acme"}}));

        let back: CompositeRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_year_key() {
        let identity = ReportIdentity {
            company: "Acme Corp".to_string(),
            year: 2023,
        };
        assert_eq!(identity.year_key(), "2023");
    }
}
