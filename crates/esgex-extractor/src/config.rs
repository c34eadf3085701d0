//! Configuration for the Extractor

use crate::prompt::DEFAULT_INSTRUCTION;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum attempts per schema before the run aborts (at least 1)
    pub max_retries: u32,

    /// Base backoff delay; attempt `n` waits `n * base` before retrying (seconds)
    pub retry_base_delay_secs: u64,

    /// Maximum time for a single extraction call (seconds)
    pub attempt_timeout_secs: u64,

    /// Instruction sent with every schema
    pub instruction_text: String,

    /// Maximum documents processed at once by `process_batch`
    pub max_concurrent_documents: usize,
}

impl ExtractorConfig {
    /// Get the base retry delay as a Duration
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_secs(self.retry_base_delay_secs)
    }

    /// Get the per-attempt timeout as a Duration
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        if self.attempt_timeout_secs == 0 {
            return Err("attempt_timeout_secs must be greater than 0".to_string());
        }
        if self.max_concurrent_documents == 0 {
            return Err("max_concurrent_documents must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_secs: 60,
            attempt_timeout_secs: 300,
            instruction_text: DEFAULT_INSTRUCTION.to_string(),
            max_concurrent_documents: 4,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: fewer, quicker attempts
    pub fn aggressive() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay_secs: 5,
            attempt_timeout_secs: 60,
            max_concurrent_documents: 8,
            ..Self::default()
        }
    }

    /// Lenient preset: more attempts with longer waits, for rate-limited keys
    pub fn lenient() -> Self {
        Self {
            max_retries: 5,
            retry_base_delay_secs: 120,
            attempt_timeout_secs: 600,
            max_concurrent_documents: 2,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ExtractorConfig::aggressive().validate().is_ok());
        assert!(ExtractorConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = ExtractorConfig {
            max_retries: 0,
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ExtractorConfig {
            attempt_timeout_secs: 0,
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_delay_allowed() {
        let config = ExtractorConfig {
            retry_base_delay_secs: 0,
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig::lenient();
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractorConfig::from_toml("max_retries = 5\n").unwrap();
        assert_eq!(parsed.max_retries, 5);
        assert_eq!(parsed.retry_base_delay_secs, 60);
        assert_eq!(parsed.instruction_text, DEFAULT_INSTRUCTION);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(ExtractorConfig::from_toml("max_retries = 0\n").is_err());
        assert!(ExtractorConfig::from_toml("max_retries = \"three\"\n").is_err());
    }
}
