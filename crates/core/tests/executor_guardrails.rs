//! End-to-end pipeline behavior: stage ordering, fail-closed gates, and the
//! result hygiene applied to rows that make it through.

#[path = "fixtures/mock_connector.rs"]
mod mock_connector;

use std::sync::Arc;

use mock_connector::MockConnector;
use probe_core::model::{Assertion, Dialect, Ir, OutcomeStatus, RejectStage, Row};
use probe_core::{ExecutionPolicy, GuardedExecutor, ScanEstimateExtractor};
use serde_json::json;

const PLAN_500_MB: &str = "TableScan PROD_DB.RAW.ORDERS estimated: 500 MB";

fn orders_uniqueness() -> Ir {
    Ir::new(
        "PROD_DB.RAW.ORDERS",
        Assertion::Uniqueness {
            keys: vec!["ORDER_ID".to_string()],
        },
        Dialect::Snowflake,
    )
}

fn executor(policy: ExecutionPolicy) -> GuardedExecutor {
    GuardedExecutor::new(policy, Arc::new(ScanEstimateExtractor))
}

fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn rejection(outcome: &probe_core::Outcome) -> (RejectStage, String, String) {
    match &outcome.status {
        OutcomeStatus::Rejected {
            stage,
            reason,
            detail,
        } => (*stage, reason.clone(), detail.clone()),
        OutcomeStatus::Success { .. } => panic!("expected rejection, got success"),
    }
}

// ============================================================================
// Happy path
// ============================================================================

#[test]
fn all_gates_pass_and_the_statement_runs() {
    let connector = MockConnector::new(PLAN_500_MB).with_rows(vec![row(&[
        ("ORDER_ID", json!(12345)),
        ("duplicate_count", json!(2)),
    ])]);
    let policy = ExecutionPolicy::default()
        .with_allowed_schemas(["PROD_DB.RAW"])
        .with_scan_budget(1_073_741_824);

    let outcome = executor(policy).run(&orders_uniqueness(), &connector);

    assert!(outcome.is_success(), "outcome: {:?}", outcome.status);
    assert_eq!(connector.explain_calls(), 1);
    assert_eq!(connector.select_calls(), 1);
    assert!(outcome.ended_at >= outcome.started_at);

    let OutcomeStatus::Success {
        rows,
        stats,
        sql_text,
        plan_text,
    } = &outcome.status
    else {
        unreachable!()
    };
    assert_eq!(rows.len(), 1);
    assert!(sql_text.contains("GROUP BY \"ORDER_ID\""));
    assert_eq!(plan_text, PLAN_500_MB);
    assert_eq!(stats.rows_returned, 1);
}

#[test]
fn connector_receives_exactly_the_compiled_statement() {
    let connector = MockConnector::new(PLAN_500_MB);
    let outcome = executor(ExecutionPolicy::default()).run(&orders_uniqueness(), &connector);

    assert!(outcome.is_success());
    let seen = connector.seen_sql();
    assert_eq!(seen.len(), 2, "expected one explain and one select");
    assert_eq!(seen[0], seen[1]);
    assert!(seen[0].starts_with("SELECT \"ORDER_ID\", COUNT(*) AS duplicate_count"));
}

// ============================================================================
// Stage ordering and fail-closed gates
// ============================================================================

#[test]
fn structurally_invalid_ir_never_reaches_the_connector() {
    let mut ir = orders_uniqueness();
    ir.assertions = vec![Assertion::Uniqueness { keys: vec![] }];
    let connector = MockConnector::new(PLAN_500_MB);

    let outcome = executor(ExecutionPolicy::default()).run(&ir, &connector);

    let (stage, reason, _) = rejection(&outcome);
    assert_eq!(stage, RejectStage::Ir);
    assert_eq!(reason, "invalid_reference");
    assert_eq!(connector.explain_calls(), 0);
    assert_eq!(connector.select_calls(), 0);
}

#[test]
fn multiple_assertions_reject_at_the_ir_stage() {
    let mut ir = orders_uniqueness();
    ir.assertions.push(Assertion::NotNull {
        columns: vec!["ORDER_ID".to_string()],
    });
    let connector = MockConnector::new(PLAN_500_MB);

    let (stage, reason, _) = rejection(&executor(ExecutionPolicy::default()).run(&ir, &connector));
    assert_eq!(stage, RejectStage::Ir);
    assert_eq!(reason, "multiple_assertions");
}

#[test]
fn unknown_dialect_rejects_before_compilation() {
    let mut ir = orders_uniqueness();
    ir.dialect = "oracle".to_string();
    let connector = MockConnector::new(PLAN_500_MB);

    let (stage, reason, _) = rejection(&executor(ExecutionPolicy::default()).run(&ir, &connector));
    assert_eq!(stage, RejectStage::Ir);
    assert_eq!(reason, "unknown_dialect");
    assert_eq!(connector.explain_calls(), 0);
}

#[test]
fn unsupported_assertion_rejects_at_the_compile_stage() {
    let ir = Ir::new(
        "PROD_DB.RAW.EVENTS",
        Assertion::JsonPathExists {
            column: "PAYLOAD".to_string(),
            path: "meta.source".to_string(),
        },
        Dialect::Ansi,
    );
    let connector = MockConnector::new(PLAN_500_MB);

    let (stage, reason, _) = rejection(&executor(ExecutionPolicy::default()).run(&ir, &connector));
    assert_eq!(stage, RejectStage::Compile);
    assert_eq!(reason, "unsupported_assertion");
    assert_eq!(connector.explain_calls(), 0);
}

#[test]
fn schema_violation_stops_before_any_connector_call() {
    let ir = Ir::new(
        "PROD_DB.MART.SUMMARY",
        Assertion::NotNull {
            columns: vec!["ID".to_string()],
        },
        Dialect::Snowflake,
    );
    let connector = MockConnector::new(PLAN_500_MB);
    let policy = ExecutionPolicy::default().with_allowed_schemas(["PROD_DB.RAW"]);

    let outcome = executor(policy).run(&ir, &connector);

    let (stage, reason, detail) = rejection(&outcome);
    assert_eq!(stage, RejectStage::SqlValidation);
    assert_eq!(reason, "schema_not_allowed");
    assert!(detail.contains("PROD_DB.MART"));
    assert_eq!(connector.explain_calls(), 0);
    assert_eq!(connector.select_calls(), 0);
}

#[test]
fn over_budget_plan_stops_before_select() {
    let connector = MockConnector::new("Scan: 2 GB");
    let policy = ExecutionPolicy::default().with_scan_budget(500 * 1_048_576);

    let outcome = executor(policy).run(&orders_uniqueness(), &connector);

    let (stage, reason, detail) = rejection(&outcome);
    assert_eq!(stage, RejectStage::Budget);
    assert_eq!(reason, "budget_exceeded");
    assert!(detail.contains("exceeds budget"));
    assert_eq!(connector.explain_calls(), 1);
    assert_eq!(connector.select_calls(), 0);
}

#[test]
fn unreadable_plan_with_a_budget_set_fails_closed() {
    let connector = MockConnector::new("Seq Scan on orders  (cost=0.00..445.00)");
    let policy = ExecutionPolicy::default().with_scan_budget(1_048_576);

    let outcome = executor(policy).run(&orders_uniqueness(), &connector);

    let (stage, _, detail) = rejection(&outcome);
    assert_eq!(stage, RejectStage::Budget);
    assert!(detail.contains("no scan estimate"));
    assert_eq!(connector.select_calls(), 0);
}

#[test]
fn disabled_budget_skips_the_gate_entirely() {
    let connector = MockConnector::new("Seq Scan on orders");
    let outcome = executor(ExecutionPolicy::default()).run(&orders_uniqueness(), &connector);
    assert!(outcome.is_success());
}

#[test]
fn explain_failure_is_an_execution_rejection() {
    let connector = MockConnector::new(PLAN_500_MB).with_explain_failure("warehouse unreachable");

    let outcome = executor(ExecutionPolicy::default()).run(&orders_uniqueness(), &connector);

    let (stage, reason, detail) = rejection(&outcome);
    assert_eq!(stage, RejectStage::Execution);
    assert_eq!(reason, "explain_failed");
    assert!(detail.contains("warehouse unreachable"));
    assert_eq!(connector.select_calls(), 0);
}

#[test]
fn select_failure_is_an_execution_rejection() {
    let connector = MockConnector::new(PLAN_500_MB).with_select_failure("statement timed out");

    let outcome = executor(ExecutionPolicy::default()).run(&orders_uniqueness(), &connector);

    let (stage, reason, detail) = rejection(&outcome);
    assert_eq!(stage, RejectStage::Execution);
    assert_eq!(reason, "execution_failed");
    assert!(detail.contains("statement timed out"));
    assert_eq!(connector.explain_calls(), 1);
    assert_eq!(connector.select_calls(), 1);
}

// ============================================================================
// Result hygiene
// ============================================================================

#[test]
fn result_rows_are_redacted_by_default() {
    let connector = MockConnector::new(PLAN_500_MB).with_rows(vec![row(&[
        ("CUSTOMER_EMAIL", json!("john@example.com")),
        ("NOTES", json!("call 555-123-4567")),
        ("ORDER_ID", json!(12345)),
    ])]);

    let outcome = executor(ExecutionPolicy::default()).run(&orders_uniqueness(), &connector);

    let OutcomeStatus::Success { rows, .. } = &outcome.status else {
        panic!("expected success");
    };
    assert_eq!(rows[0]["CUSTOMER_EMAIL"], json!("joh**********com"));
    assert_eq!(rows[0]["NOTES"], json!("call ********4567"));
    assert_eq!(rows[0]["ORDER_ID"], json!(12345));
}

#[test]
fn redaction_can_be_disabled_by_policy() {
    let connector = MockConnector::new(PLAN_500_MB)
        .with_rows(vec![row(&[("CUSTOMER_EMAIL", json!("john@example.com"))])]);
    let policy = ExecutionPolicy::default().with_redaction(false);

    let outcome = executor(policy).run(&orders_uniqueness(), &connector);

    let OutcomeStatus::Success { rows, .. } = &outcome.status else {
        panic!("expected success");
    };
    assert_eq!(rows[0]["CUSTOMER_EMAIL"], json!("john@example.com"));
}

#[test]
fn rows_are_truncated_to_the_sample_limit() {
    let many: Vec<Row> = (0..5)
        .map(|n| row(&[("ORDER_ID", json!(n))]))
        .collect();
    let connector = MockConnector::new(PLAN_500_MB).with_rows(many);
    let mut policy = ExecutionPolicy::default();
    policy.sample_row_limit = 2;

    let outcome = executor(policy).run(&orders_uniqueness(), &connector);

    let OutcomeStatus::Success { rows, .. } = &outcome.status else {
        panic!("expected success");
    };
    assert_eq!(rows.len(), 2);
}

#[test]
fn run_ids_are_unique_per_run() {
    let connector = MockConnector::new(PLAN_500_MB);
    let executor = executor(ExecutionPolicy::default());
    let first = executor.run(&orders_uniqueness(), &connector);
    let second = executor.run(&orders_uniqueness(), &connector);
    assert_ne!(first.run_id, second.run_id);
}
