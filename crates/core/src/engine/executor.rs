use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::budget::{check_budget, PlanBytesExtractor};
use crate::engine::connector::Connector;
use crate::model::{ExecutionPolicy, Ir, Outcome, RejectStage};
use crate::redaction::{built_in_rules, redact_rows};
use crate::sql::{compile, validate_sql};

/// Drives one IR through the full guardrail pipeline: IR validation,
/// compilation, SQL screening, plan budget, execution, then truncation and
/// redaction of the result rows. Stages run in that order and the first
/// refusal ends the run; the connector is never touched before the SQL
/// screen passes.
pub struct GuardedExecutor {
    policy: ExecutionPolicy,
    extractor: Arc<dyn PlanBytesExtractor>,
}

impl GuardedExecutor {
    pub fn new(policy: ExecutionPolicy, extractor: Arc<dyn PlanBytesExtractor>) -> Self {
        Self { policy, extractor }
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Runs one assertion end to end. Never panics and never returns an
    /// error: every failure mode is an [`Outcome`] tagged with the stage
    /// that refused it.
    pub fn run(&self, ir: &Ir, connector: &dyn Connector) -> Outcome {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();

        if let Err(err) = ir.validate() {
            debug!(%run_id, code = err.code(), "ir rejected");
            return Outcome::rejected(run_id, started_at, RejectStage::Ir, err.code(), err.to_string());
        }

        let compiled = match compile(ir) {
            Ok(compiled) => compiled,
            Err(err) => {
                debug!(%run_id, code = err.code(), "compile rejected");
                return Outcome::rejected(
                    run_id,
                    started_at,
                    RejectStage::Compile,
                    err.code(),
                    err.to_string(),
                );
            }
        };

        let verdict = validate_sql(&compiled.sql_text, &self.policy.allowed_schemas);
        if let Some(reason) = verdict.reason {
            // Security event: a compiled statement failed the read-only
            // screen. Log the code, never the statement text.
            warn!(
                %run_id,
                stage = RejectStage::SqlValidation.as_str(),
                code = reason.code(),
                ir_hash = %compiled.source_ir_hash,
                "sql validation rejected compiled statement"
            );
            return Outcome::rejected(
                run_id,
                started_at,
                RejectStage::SqlValidation,
                reason.code(),
                reason.to_string(),
            );
        }

        let plan_text = match connector.explain(&compiled.sql_text) {
            Ok(plan_text) => plan_text,
            Err(err) => {
                debug!(%run_id, "explain failed");
                return Outcome::rejected(
                    run_id,
                    started_at,
                    RejectStage::Execution,
                    "explain_failed",
                    format!("{err:#}"),
                );
            }
        };

        let budget = check_budget(&plan_text, self.policy.scan_budget_bytes, &*self.extractor);
        if !budget.within_budget {
            let detail = if budget.estimated_bytes_scanned < 0 {
                format!(
                    "plan carried no scan estimate; budget is {} bytes",
                    budget.budget_bytes
                )
            } else {
                format!(
                    "estimated {} bytes exceeds budget {} bytes",
                    budget.estimated_bytes_scanned, budget.budget_bytes
                )
            };
            debug!(%run_id, plan_hash = %budget.plan_hash, "budget rejected");
            return Outcome::rejected(
                run_id,
                started_at,
                RejectStage::Budget,
                "budget_exceeded",
                detail,
            );
        }

        let output = match connector.select(&compiled.sql_text, self.policy.statement_timeout_seconds)
        {
            Ok(output) => output,
            Err(err) => {
                debug!(%run_id, "select failed");
                return Outcome::rejected(
                    run_id,
                    started_at,
                    RejectStage::Execution,
                    "execution_failed",
                    format!("{err:#}"),
                );
            }
        };

        let mut rows = output.rows;
        rows.truncate(self.policy.sample_row_limit);
        let rows = redact_rows(&rows, built_in_rules(), self.policy.pii_redaction_enabled);

        info!(
            %run_id,
            dialect = compiled.dialect.as_str(),
            ir_hash = %compiled.source_ir_hash,
            rows = rows.len(),
            bytes_scanned = output.stats.bytes_scanned,
            "assertion executed"
        );

        Outcome::success(
            run_id,
            started_at,
            rows,
            output.stats,
            compiled.sql_text,
            plan_text,
        )
    }
}
