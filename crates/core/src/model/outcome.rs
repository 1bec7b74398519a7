use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Result rows and connector stats
// ============================================================================

/// One result row, keyed by column name. JSON values keep warehouse typing
/// loose without inventing a cell type of our own.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Engine-reported statistics for one executed statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub bytes_scanned: u64,
    pub elapsed_ms: u64,
    pub rows_returned: u64,
    /// Engine-assigned query id, empty when the engine reports none.
    #[serde(default)]
    pub query_id: String,
}

/// What a connector hands back for a successful SELECT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOutput {
    pub rows: Vec<Row>,
    pub stats: QueryStats,
}

// ============================================================================
// Outcome
// ============================================================================

/// Pipeline stage at which an execution was refused. Later stages never run
/// once an earlier stage rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectStage {
    Ir,
    Compile,
    SqlValidation,
    Budget,
    Execution,
}

impl RejectStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectStage::Ir => "ir",
            RejectStage::Compile => "compile",
            RejectStage::SqlValidation => "sql_validation",
            RejectStage::Budget => "budget",
            RejectStage::Execution => "execution",
        }
    }
}

impl std::fmt::Display for RejectStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one guarded execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// A guardrail stage refused the request. `reason` is a stable machine
    /// code; `detail` is the human-readable explanation.
    Rejected {
        stage: RejectStage,
        reason: String,
        detail: String,
    },
    /// All gates passed and the statement ran. Rows are already truncated
    /// and redacted per policy.
    Success {
        rows: Vec<Row>,
        stats: QueryStats,
        sql_text: String,
        plan_text: String,
    },
}

/// Audit record of one execution, rejected or successful. Serialized shape
/// keeps the status fields inline so log pipelines can filter on `status`
/// and `stage` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub execution_time_ms: u64,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl Outcome {
    pub(crate) fn rejected(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        stage: RejectStage,
        reason: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let ended_at = Utc::now();
        Self {
            run_id,
            started_at,
            ended_at,
            execution_time_ms: elapsed_ms(started_at, ended_at),
            status: OutcomeStatus::Rejected {
                stage,
                reason: reason.into(),
                detail: detail.into(),
            },
        }
    }

    pub(crate) fn success(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        rows: Vec<Row>,
        stats: QueryStats,
        sql_text: impl Into<String>,
        plan_text: impl Into<String>,
    ) -> Self {
        let ended_at = Utc::now();
        Self {
            run_id,
            started_at,
            ended_at,
            execution_time_ms: elapsed_ms(started_at, ended_at),
            status: OutcomeStatus::Success {
                rows,
                stats,
                sql_text: sql_text.into(),
                plan_text: plan_text.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    /// The rejecting stage, or `None` on success.
    pub fn stage(&self) -> Option<RejectStage> {
        match &self.status {
            OutcomeStatus::Rejected { stage, .. } => Some(*stage),
            OutcomeStatus::Success { .. } => None,
        }
    }
}

fn elapsed_ms(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> u64 {
    (ended_at - started_at).num_milliseconds().max(0) as u64
}
