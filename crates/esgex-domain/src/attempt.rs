//! Extraction attempts - ephemeral, exist only during a run

use crate::TokenUsage;

/// How one attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The backend returned a usable JSON object
    Succeeded,

    /// Retryable failure, with a short description of the cause
    Failed(String),
}

/// One call to the extraction backend for one schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionAttempt {
    /// Schema the attempt was for
    pub schema_name: String,

    /// 1-based attempt number within the schema
    pub attempt_number: u32,

    /// Result of the attempt
    pub outcome: AttemptOutcome,

    /// Usage reported by the backend, if any
    pub usage: Option<TokenUsage>,
}

impl ExtractionAttempt {
    /// Whether this attempt succeeded
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Succeeded)
    }
}
