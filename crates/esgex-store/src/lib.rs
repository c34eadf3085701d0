//! Esgex Storage Layer
//!
//! Implements the `ReportStore` trait on SQLite.
//!
//! # Data model
//!
//! One document per company identity, holding a map from year string to that
//! year's composite record. `upsert_report` behaves like a document-store
//! `update_one({_id: company}, {$set: {"reports.<year>": report}}, upsert=true)`:
//!
//! | Situation | Result |
//! |-----------|--------|
//! | company unknown | `upserted = true` |
//! | slot missing or different | `matched = 1, modified = 1` |
//! | slot holds an equal JSON value | `matched = 1, modified = 0` |
//!
//! Equality is structural (`serde_json::Value`), so key order in the incoming
//! record never turns a no-op into an update. Other year slots are never read
//! or written by an upsert.
//!
//! # Concurrency
//!
//! A single connection is guarded by a mutex and every operation runs on the
//! blocking thread pool. Clones share the connection, so one store can serve
//! many concurrent pipeline runs. Concurrent writes to the same slot are
//! last-write-wins.
//!
//! # Examples
//!
//! ```no_run
//! use esgex_store::SqliteReportStore;
//!
//! let store = SqliteReportStore::new("esgex.db").unwrap();
//! // Store is now ready for report operations
//! ```

#![warn(missing_docs)]

use async_trait::async_trait;
use esgex_domain::traits::ReportStore;
use esgex_domain::{CompanyReports, CompositeRecord, UpsertResult};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored or incoming JSON could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection mutex was poisoned by a panicking writer
    #[error("Connection lock poisoned: {0}")]
    Lock(String),

    /// Blocking task failed to complete
    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// SQLite-based implementation of ReportStore
#[derive(Clone)]
pub struct SqliteReportStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReportStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use esgex_store::SqliteReportStore;
    ///
    /// let store = SqliteReportStore::new("esgex.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a fresh in-memory store
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    /// Initialize the database schema
    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        conn.execute_batch(schema)?;
        Ok(())
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Lock(e.to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn upsert_blocking(
        conn: &mut Connection,
        company_id: &str,
        year: &str,
        report: &Value,
    ) -> Result<UpsertResult, StoreError> {
        let now = current_timestamp();
        let report_text = serde_json::to_string(report)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let company_exists = tx
            .query_row(
                "SELECT 1 FROM company_reports WHERE company_id = ?1",
                params![company_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if !company_exists {
            tx.execute(
                "INSERT INTO company_reports (company_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![company_id, now],
            )?;
            tx.execute(
                "INSERT INTO report_slots (company_id, year, report, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![company_id, year, &report_text, now],
            )?;
            tx.commit()?;
            return Ok(UpsertResult::inserted());
        }

        let existing: Option<String> = tx
            .query_row(
                "SELECT report FROM report_slots WHERE company_id = ?1 AND year = ?2",
                params![company_id, year],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(existing_text) = existing {
            // Stored text is canonical (sorted keys); parsing is the fallback for
            // rows written with another key order
            if existing_text == report_text
                || serde_json::from_str::<Value>(&existing_text)? == *report
            {
                // Nothing to write; leave updated_at untouched as well
                tx.commit()?;
                return Ok(UpsertResult::unchanged());
            }
        }

        tx.execute(
            "INSERT INTO report_slots (company_id, year, report, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(company_id, year) DO UPDATE SET
             report = excluded.report, updated_at = excluded.updated_at",
            params![company_id, year, &report_text, now],
        )?;
        tx.execute(
            "UPDATE company_reports SET updated_at = ?2 WHERE company_id = ?1",
            params![company_id, now],
        )?;
        tx.commit()?;

        Ok(UpsertResult::modified())
    }

    fn find_company_blocking(
        conn: &Connection,
        company_id: &str,
    ) -> Result<Option<CompanyReports>, StoreError> {
        let header: Option<(i64, i64)> = conn
            .query_row(
                "SELECT created_at, updated_at FROM company_reports WHERE company_id = ?1",
                params![company_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((created_at, updated_at)) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT year, report FROM report_slots WHERE company_id = ?1 ORDER BY year",
        )?;
        let rows = stmt
            .query_map(params![company_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut reports = BTreeMap::new();
        for (year, text) in rows {
            reports.insert(year, parse_report(&text)?);
        }

        Ok(Some(CompanyReports {
            company_id: company_id.to_string(),
            reports,
            created_at: created_at as u64,
            updated_at: updated_at as u64,
        }))
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    type Error = StoreError;

    async fn upsert_report(
        &self,
        company_id: &str,
        year: &str,
        report: &CompositeRecord,
    ) -> Result<UpsertResult, Self::Error> {
        let company_id = company_id.to_string();
        let year = year.to_string();
        let report = report.clone().into_value();

        debug!("Upserting report for '{}' year {}", company_id, year);

        self.with_conn(move |conn| Self::upsert_blocking(conn, &company_id, &year, &report))
            .await
    }

    async fn find_company(&self, company_id: &str) -> Result<Option<CompanyReports>, Self::Error> {
        let company_id = company_id.to_string();
        self.with_conn(move |conn| Self::find_company_blocking(conn, &company_id))
            .await
    }

    async fn find_report(
        &self,
        company_id: &str,
        year: &str,
    ) -> Result<Option<CompositeRecord>, Self::Error> {
        let company_id = company_id.to_string();
        let year = year.to_string();
        self.with_conn(move |conn| {
            let text: Option<String> = conn
                .query_row(
                    "SELECT report FROM report_slots WHERE company_id = ?1 AND year = ?2",
                    params![company_id, year],
                    |row| row.get(0),
                )
                .optional()?;
            text.map(|t| parse_report(&t)).transpose()
        })
        .await
    }

    async fn list_companies(&self) -> Result<Vec<String>, Self::Error> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT company_id FROM company_reports ORDER BY company_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
    }
}

fn parse_report(text: &str) -> Result<CompositeRecord, StoreError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(CompositeRecord::from(map)),
        other => Err(StoreError::InvalidData(format!(
            "Stored report is not a JSON object (found {})",
            json_kind(&other)
        ))),
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

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
