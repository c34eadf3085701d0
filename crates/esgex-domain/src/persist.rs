//! Persistence outcomes and the persisted company entity

use crate::CompositeRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What a single `update_one`-style upsert did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertResult {
    /// A new document was created
    pub upserted: bool,

    /// Number of existing documents matched by the primary key (0 or 1)
    pub matched: u64,

    /// Number of documents whose content actually changed (0 or 1)
    pub modified: u64,
}

impl UpsertResult {
    /// Result for a freshly created document
    pub fn inserted() -> Self {
        Self {
            upserted: true,
            matched: 0,
            modified: 0,
        }
    }

    /// Result for an existing document whose slot changed
    pub fn modified() -> Self {
        Self {
            upserted: false,
            matched: 1,
            modified: 1,
        }
    }

    /// Result for an existing document left as it was
    pub fn unchanged() -> Self {
        Self {
            upserted: false,
            matched: 1,
            modified: 0,
        }
    }
}

/// Tri-state outcome of persisting one report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistStatus {
    /// The company document did not exist and was created
    Inserted,

    /// The year slot was written with different content
    Updated,

    /// The year slot already held identical content
    Unchanged,
}

impl PersistStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistStatus::Inserted => "inserted",
            PersistStatus::Updated => "updated",
            PersistStatus::Unchanged => "unchanged",
        }
    }
}

impl From<UpsertResult> for PersistStatus {
    fn from(result: UpsertResult) -> Self {
        if result.upserted {
            PersistStatus::Inserted
        } else if result.modified > 0 {
            PersistStatus::Updated
        } else {
            PersistStatus::Unchanged
        }
    }
}

impl fmt::Display for PersistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `persist()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistOutcome {
    /// What happened to the stored document
    pub status: PersistStatus,

    /// Company identity the report was stored under
    pub identity_key: String,

    /// Year slot that was written
    pub year: String,

    /// Top-level keys of the stored report
    pub report_keys: Vec<String>,
}

/// One persisted document: every known year of one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyReports {
    /// Company identity, verbatim
    pub company_id: String,

    /// Year string → that year's composite record
    pub reports: BTreeMap<String, CompositeRecord>,

    /// When the document was first created (Unix seconds)
    pub created_at: u64,

    /// When any slot last changed (Unix seconds)
    pub updated_at: u64,
}

impl CompanyReports {
    /// Years with a stored report, ascending
    pub fn years(&self) -> Vec<&str> {
        self.reports.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_upsert_result() {
        assert_eq!(PersistStatus::from(UpsertResult::inserted()), PersistStatus::Inserted);
        assert_eq!(PersistStatus::from(UpsertResult::modified()), PersistStatus::Updated);
        assert_eq!(PersistStatus::from(UpsertResult::unchanged()), PersistStatus::Unchanged);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&PersistStatus::Unchanged).unwrap();
        assert_eq!(json, "\"unchanged\"");
        assert_eq!(PersistStatus::Inserted.to_string(), "inserted");
    }
}
