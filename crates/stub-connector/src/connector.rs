use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use probe_core::model::{Dialect, QueryStats, Row, SelectOutput};
use probe_core::Connector;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::plans::canned_plan;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StubError {
    #[error("stub refused statement: not a single select")]
    NotReadOnly,
}

/// In-memory warehouse stand-in for development and demos. Serves canned
/// plans and rows, keeps call counters, and holds its own read-only line
/// like a real adapter would even though every statement it sees has
/// already been screened.
pub struct StubConnector {
    dialect: Dialect,
    estimated_mb: u64,
    rows: Vec<Row>,
    select_failure: Option<String>,
    explain_calls: AtomicUsize,
    select_calls: AtomicUsize,
}

impl StubConnector {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            estimated_mb: 500,
            rows: default_rows(),
            select_failure: None,
            explain_calls: AtomicUsize::new(0),
            select_calls: AtomicUsize::new(0),
        }
    }

    /// Scan estimate the canned plan reports, in megabytes.
    pub fn with_estimated_mb(mut self, estimated_mb: u64) -> Self {
        self.estimated_mb = estimated_mb;
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Scripts the next selects to fail, for exercising execution errors.
    pub fn with_select_failure(mut self, message: impl Into<String>) -> Self {
        self.select_failure = Some(message.into());
        self
    }

    pub fn explain_calls(&self) -> usize {
        self.explain_calls.load(Ordering::SeqCst)
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// The stub's own second net: a bare statement-shape check, independent
    /// of the pipeline's validator.
    fn guard_read_only(sql: &str) -> Result<(), StubError> {
        let trimmed = sql.trim();
        let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
        if trimmed.contains(';') {
            return Err(StubError::NotReadOnly);
        }
        let leading: String = trimmed
            .chars()
            .take_while(|ch| ch.is_ascii_alphabetic())
            .collect();
        let leading = leading.to_ascii_uppercase();
        if leading != "SELECT" && leading != "WITH" {
            return Err(StubError::NotReadOnly);
        }
        Ok(())
    }
}

fn default_rows() -> Vec<Row> {
    let row = [
        ("ORDER_ID".to_string(), json!(12345)),
        ("ORDER_TOTAL".to_string(), json!(100.50)),
        ("CUSTOMER_ID".to_string(), json!(1001)),
    ];
    vec![row.into_iter().collect()]
}

impl Connector for StubConnector {
    fn explain(&self, sql: &str) -> anyhow::Result<String> {
        self.explain_calls.fetch_add(1, Ordering::SeqCst);
        Self::guard_read_only(sql)?;
        debug!(dialect = self.dialect.as_str(), "stub served plan");
        Ok(canned_plan(self.dialect, self.estimated_mb))
    }

    fn select(&self, sql: &str, timeout_seconds: u64) -> anyhow::Result<SelectOutput> {
        let call = self.select_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Self::guard_read_only(sql)?;
        if let Some(message) = &self.select_failure {
            bail!("{message}");
        }
        debug!(
            dialect = self.dialect.as_str(),
            timeout_seconds, "stub served rows"
        );
        Ok(SelectOutput {
            stats: QueryStats {
                bytes_scanned: self.estimated_mb * 1_048_576,
                elapsed_ms: 42,
                rows_returned: self.rows.len() as u64,
                query_id: format!("stub-q-{call}"),
            },
            rows: self.rows.clone(),
        })
    }
}
