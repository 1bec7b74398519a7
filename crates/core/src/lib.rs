pub mod budget;
pub mod engine;
pub mod error;
pub mod model;
pub mod redaction;
pub mod sql;

pub use budget::{check_budget, BudgetCheck, PlanBytesExtractor, ScanEstimateExtractor};
pub use engine::{Connector, GuardedExecutor};
pub use error::{CoreError, Result};
pub use model::{
    Assertion, Dialect, ExecutionPolicy, Ir, IrError, Outcome, OutcomeStatus, QueryStats,
    RejectStage, Row, SelectOutput,
};
pub use redaction::{built_in_rules, redact_rows, redact_text, MaskStrategy, RedactionRule};
pub use sql::{compile, validate_sql, CompileError, CompiledQuery, RejectReason, Verdict};
