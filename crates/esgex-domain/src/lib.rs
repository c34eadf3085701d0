//! Esgex Domain Layer
//!
//! Core value objects and collaborator traits for the ESG extraction pipeline.
//! Every other crate in the workspace depends on this one; it carries no I/O.
//!
//! ## Key Concepts
//!
//! - **Schema Descriptor**: one semantic facet of an ESG report (metadata,
//!   emissions, water/waste, workforce, governance, materiality)
//! - **Document Handle**: stable reference to a document uploaded to the backend
//! - **Composite Record**: the union of every per-schema extraction result
//! - **Token Usage**: additive accounting across every extraction attempt
//! - **Company Reports**: the persisted entity, one per company, keyed by year
//!
//! ## Architecture
//!
//! - Pure data types, serde-serializable where they cross a boundary
//! - Trait definitions for the extraction backend, the remote file registry
//!   and the report store; implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attempt;
pub mod document;
pub mod persist;
pub mod record;
pub mod run;
pub mod schema;
pub mod traits;
pub mod usage;

// Re-exports for convenience
pub use attempt::{AttemptOutcome, ExtractionAttempt};
pub use document::{DocumentHandle, DocumentSource};
pub use persist::{CompanyReports, PersistOutcome, PersistStatus, UpsertResult};
pub use record::{CompositeRecord, ExtractionReport, ReportIdentity};
pub use run::RunId;
pub use schema::SchemaDescriptor;
pub use usage::TokenUsage;
