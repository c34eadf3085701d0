//! Esgex Gatekeeper
//!
//! Validates the identity block of a merged composite record before it is
//! allowed anywhere near the report store.
//!
//! The Gatekeeper checks:
//! - The identity block is present and is a JSON object
//! - The company name is a non-empty string (kept verbatim)
//! - The reporting year coerces to a positive integer
//!
//! Every failed check is collected, so a rejection lists all of its reasons.
//!
//! # Examples
//!
//! ```
//! use esgex_domain::CompositeRecord;
//! use esgex_gatekeeper::{Gatekeeper, ValidationConfig};
//! use serde_json::json;
//!
//! let gatekeeper = Gatekeeper::new(ValidationConfig::default());
//!
//! let mut record = CompositeRecord::new();
//! record.insert(
//!     "report_metadata",
//!     json!({"company_legal_name": "Acme Corp", "reporting_year": "2023"}),
//! );
//!
//! let identity = gatekeeper.validate(&record).unwrap();
//! assert_eq!(identity.company, "Acme Corp");
//! assert_eq!(identity.year, 2023);
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod validator;

pub use config::ValidationConfig;
pub use error::GatekeeperError;
pub use validator::{coerce_year, Gatekeeper, RejectionReason};
