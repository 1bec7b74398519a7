use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ============================================================================
// Execution policy
// ============================================================================

/// Operator-supplied guardrail settings for one execution. The executor
/// treats this as read-only; nothing in the pipeline mutates policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// `DATABASE.SCHEMA` prefixes queries may read from, compared
    /// case-insensitively. Empty means no schema restriction.
    #[serde(default)]
    pub allowed_schemas: BTreeSet<String>,

    /// Upper bound on the estimated scan size, in bytes. Zero or negative
    /// disables the budget gate.
    #[serde(default)]
    pub scan_budget_bytes: i64,

    /// Per-statement timeout handed to the connector.
    #[serde(default = "default_statement_timeout_seconds")]
    pub statement_timeout_seconds: u64,

    /// When set, result rows pass through PII redaction before release.
    #[serde(default = "default_true")]
    pub pii_redaction_enabled: bool,

    /// Maximum result rows kept per execution; the rest are dropped.
    #[serde(default = "default_sample_row_limit")]
    pub sample_row_limit: usize,
}

fn default_statement_timeout_seconds() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_sample_row_limit() -> usize {
    1000
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            allowed_schemas: BTreeSet::new(),
            scan_budget_bytes: 0,
            statement_timeout_seconds: default_statement_timeout_seconds(),
            pii_redaction_enabled: default_true(),
            sample_row_limit: default_sample_row_limit(),
        }
    }
}

impl ExecutionPolicy {
    /// Whether the budget gate participates in execution at all.
    pub fn budget_enabled(&self) -> bool {
        self.scan_budget_bytes > 0
    }

    pub fn with_allowed_schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_schemas = schemas.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scan_budget(mut self, budget_bytes: i64) -> Self {
        self.scan_budget_bytes = budget_bytes;
        self
    }

    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.pii_redaction_enabled = enabled;
        self
    }
}
