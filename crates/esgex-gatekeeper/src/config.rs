//! Gatekeeper configuration

use crate::GatekeeperError;
use serde::{Deserialize, Serialize};

/// Where the identity fields live inside a composite record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Top-level key of the identity block
    pub identity_block: String,

    /// Field inside the identity block holding the company name
    pub company_field: String,

    /// Field inside the identity block holding the reporting year
    pub year_field: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            identity_block: "report_metadata".to_string(),
            company_field: "company_legal_name".to_string(),
            year_field: "reporting_year".to_string(),
        }
    }
}

impl ValidationConfig {
    /// Check that every field name is usable
    pub fn validate(&self) -> Result<(), GatekeeperError> {
        let fields = [
            ("identity_block", &self.identity_block),
            ("company_field", &self.company_field),
            ("year_field", &self.year_field),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(GatekeeperError::Config(format!("{} must not be empty", name)));
            }
        }

        if self.company_field == self.year_field {
            return Err(GatekeeperError::Config(
                "company_field and year_field must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from a TOML string; missing fields take defaults
    pub fn from_toml(s: &str) -> Result<Self, GatekeeperError> {
        let config: Self =
            toml::from_str(s).map_err(|e| GatekeeperError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML string
    pub fn to_toml(&self) -> Result<String, GatekeeperError> {
        toml::to_string_pretty(self).map_err(|e| GatekeeperError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert_eq!(config.identity_block, "report_metadata");
        assert_eq!(config.company_field, "company_legal_name");
        assert_eq!(config.year_field, "reporting_year");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = ValidationConfig::from_toml(r#"identity_block = "metadata""#).unwrap();
        assert_eq!(config.identity_block, "metadata");
        assert_eq!(config.company_field, "company_legal_name");
    }

    #[test]
    fn test_from_toml_rejects_empty_field() {
        let result = ValidationConfig::from_toml(r#"year_field = "  ""#);
        assert!(matches!(result, Err(GatekeeperError::Config(_))));
    }

    #[test]
    fn test_same_company_and_year_field_rejected() {
        let config = ValidationConfig {
            year_field: "company_legal_name".to_string(),
            ..ValidationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ValidationConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(ValidationConfig::from_toml(&text).unwrap(), config);
    }
}
