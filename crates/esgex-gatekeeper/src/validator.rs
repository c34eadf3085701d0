//! Identity validation logic

use crate::{GatekeeperError, ValidationConfig};
use esgex_domain::{CompositeRecord, ReportIdentity};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Reasons for rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// The identity block is absent or not a JSON object
    MissingIdentityBlock(String),

    /// No company name field (or it is null)
    MissingCompanyName,

    /// Company name is not a string
    InvalidCompanyName(String),

    /// Company name is the empty string
    EmptyCompanyName,

    /// No reporting year field (or it is null)
    MissingReportingYear,

    /// Reporting year does not coerce to a positive integer
    InvalidReportingYear(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::MissingIdentityBlock(block) => {
                write!(f, "identity block '{}' is missing or not an object", block)
            }
            RejectionReason::MissingCompanyName => write!(f, "company name is missing"),
            RejectionReason::InvalidCompanyName(kind) => {
                write!(f, "company name must be a string, found {}", kind)
            }
            RejectionReason::EmptyCompanyName => write!(f, "company name is empty"),
            RejectionReason::MissingReportingYear => write!(f, "reporting year is missing"),
            RejectionReason::InvalidReportingYear(raw) => {
                write!(f, "reporting year {} is not a positive integer", raw)
            }
        }
    }
}

/// The Gatekeeper validates composite records before persistence
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    config: ValidationConfig,
}

impl Gatekeeper {
    /// Create a new Gatekeeper with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Create a Gatekeeper with default configuration
    pub fn default_config() -> Self {
        Self::new(ValidationConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Extract and check the identity of a composite record
    ///
    /// # Returns
    ///
    /// The company name exactly as extracted and the coerced year, or
    /// `GatekeeperError::Rejected` listing every failed check.
    pub fn validate(&self, record: &CompositeRecord) -> Result<ReportIdentity, GatekeeperError> {
        let block = match record.get(&self.config.identity_block) {
            Some(Value::Object(block)) => block,
            _ => {
                return Err(GatekeeperError::Rejected(vec![
                    RejectionReason::MissingIdentityBlock(self.config.identity_block.clone()),
                ]))
            }
        };

        let mut reasons = Vec::new();

        let company = match self.check_company(block) {
            Ok(company) => Some(company),
            Err(reason) => {
                reasons.push(reason);
                None
            }
        };

        let year = match block.get(&self.config.year_field) {
            None | Some(Value::Null) => {
                reasons.push(RejectionReason::MissingReportingYear);
                None
            }
            Some(raw) => match coerce_year(raw) {
                Some(year) => Some(year),
                None => {
                    reasons.push(RejectionReason::InvalidReportingYear(raw.to_string()));
                    None
                }
            },
        };

        match (company, year) {
            (Some(company), Some(year)) => {
                debug!("Identity accepted: '{}' {}", company, year);
                Ok(ReportIdentity { company, year })
            }
            _ => Err(GatekeeperError::Rejected(reasons)),
        }
    }

    fn check_company(&self, block: &Map<String, Value>) -> Result<String, RejectionReason> {
        match block.get(&self.config.company_field) {
            None | Some(Value::Null) => Err(RejectionReason::MissingCompanyName),
            Some(Value::String(name)) if name.is_empty() => Err(RejectionReason::EmptyCompanyName),
            Some(Value::String(name)) => Ok(name.clone()),
            Some(other) => Err(RejectionReason::InvalidCompanyName(json_kind(other).to_string())),
        }
    }
}

/// Coerce a JSON value into a positive reporting year
///
/// Accepts integers, floats without a fractional part, and strings holding
/// either after trimming whitespace.
///
/// # Examples
///
/// ```
/// use esgex_gatekeeper::coerce_year;
/// use serde_json::json;
///
/// assert_eq!(coerce_year(&json!(2023)), Some(2023));
/// assert_eq!(coerce_year(&json!(" 2023 ")), Some(2023));
/// assert_eq!(coerce_year(&json!(2023.5)), None);
/// assert_eq!(coerce_year(&json!(0)), None);
/// ```
pub fn coerce_year(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                positive_u32(i)
            } else if n.is_i64() {
                None
            } else {
                n.as_f64().and_then(whole_positive)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<u64>() {
                positive_u32(i)
            } else {
                trimmed.parse::<f64>().ok().and_then(whole_positive)
            }
        }
        _ => None,
    }
}

fn positive_u32(i: u64) -> Option<u32> {
    u32::try_from(i).ok().filter(|y| *y > 0)
}

fn whole_positive(f: f64) -> Option<u32> {
    if f.is_finite() && f.fract() == 0.0 && f > 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
