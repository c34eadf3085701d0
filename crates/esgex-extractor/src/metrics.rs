//! Metrics collected during one pipeline run

use esgex_domain::{AttemptOutcome, ExtractionAttempt, TokenUsage};
use std::collections::BTreeMap;

/// Per-run record of attempts, collisions and token usage
///
/// Owned by a single run; concurrent runs never share one.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Every attempt in the order it was made
    pub attempts: Vec<ExtractionAttempt>,

    /// Key collisions seen while merging
    pub collisions: usize,

    /// Usage summed over every attempt that reported it
    pub usage: TokenUsage,
}

impl RunMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt and add its usage to the tally
    pub fn record_attempt(&mut self, attempt: ExtractionAttempt) {
        if let Some(usage) = &attempt.usage {
            self.usage.record(usage);
        }
        self.attempts.push(attempt);
    }

    /// Record merge collisions
    pub fn record_collisions(&mut self, count: usize) {
        self.collisions += count;
    }

    /// Number of attempts made for one schema
    pub fn attempts_for(&self, schema: &str) -> u32 {
        self.attempts
            .iter()
            .filter(|a| a.schema_name == schema)
            .count() as u32
    }

    /// Total attempts across all schemas
    pub fn total_attempts(&self) -> usize {
        self.attempts.len()
    }

    /// Attempts that did not succeed
    pub fn failed_attempts(&self) -> usize {
        self.attempts.iter().filter(|a| !a.succeeded()).count()
    }

    /// Schemas that eventually succeeded, in run order
    pub fn succeeded_schemas(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| a.succeeded())
            .map(|a| a.schema_name.as_str())
            .collect()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        self.attempts.clear();
        self.collisions = 0;
        self.usage = TokenUsage::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut per_schema: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
        for attempt in &self.attempts {
            let entry = per_schema.entry(attempt.schema_name.as_str()).or_insert((0, 0));
            entry.0 += 1;
            if let AttemptOutcome::Failed(_) = attempt.outcome {
                entry.1 += 1;
            }
        }

        let mut lines = vec![
            "Run Metrics Summary".to_string(),
            "===================".to_string(),
            format!(
                "Attempts: {} ({} failed)",
                self.total_attempts(),
                self.failed_attempts()
            ),
            format!("Collisions: {}", self.collisions),
            format!("Tokens: {}", self.usage),
        ];

        if !per_schema.is_empty() {
            lines.push(String::new());
            lines.push("Attempts by schema:".to_string());
            for (schema, (attempts, failed)) in per_schema {
                lines.push(format!("  {}: {} ({} failed)", schema, attempts, failed));
            }
        }

        lines.join("\n")
    }
}
