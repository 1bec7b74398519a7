use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::bail;
use probe_core::model::{QueryStats, Row, SelectOutput};
use probe_core::Connector;

/// Scriptable warehouse stand-in. Records every statement it is handed so
/// tests can assert exactly what crossed the connector seam, and how often.
pub struct MockConnector {
    plan_text: String,
    rows: Vec<Row>,
    explain_failure: Option<String>,
    select_failure: Option<String>,
    explain_calls: AtomicUsize,
    select_calls: AtomicUsize,
    seen_sql: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(plan_text: impl Into<String>) -> Self {
        Self {
            plan_text: plan_text.into(),
            rows: Vec::new(),
            explain_failure: None,
            select_failure: None,
            explain_calls: AtomicUsize::new(0),
            select_calls: AtomicUsize::new(0),
            seen_sql: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    #[allow(dead_code)]
    pub fn with_explain_failure(mut self, message: impl Into<String>) -> Self {
        self.explain_failure = Some(message.into());
        self
    }

    #[allow(dead_code)]
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

    #[allow(dead_code)]
    pub fn seen_sql(&self) -> Vec<String> {
        self.seen_sql.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    fn explain(&self, sql: &str) -> anyhow::Result<String> {
        self.explain_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_sql.lock().unwrap().push(sql.to_string());
        if let Some(message) = &self.explain_failure {
            bail!("{message}");
        }
        Ok(self.plan_text.clone())
    }

    fn select(&self, sql: &str, _timeout_seconds: u64) -> anyhow::Result<SelectOutput> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_sql.lock().unwrap().push(sql.to_string());
        if let Some(message) = &self.select_failure {
            bail!("{message}");
        }
        Ok(SelectOutput {
            stats: QueryStats {
                bytes_scanned: 4096,
                elapsed_ms: 12,
                rows_returned: self.rows.len() as u64,
                query_id: "mock-query-1".to_string(),
            },
            rows: self.rows.clone(),
        })
    }
}
