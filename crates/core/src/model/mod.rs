//! Data Model
//!
//! Value objects shared across the pipeline: the dialect-agnostic test IR,
//! the execution policy, and the outcome records the executor emits. All of
//! them serialize cleanly so documents and audit logs share one shape.

pub mod dialect;
pub mod ir;
pub mod outcome;
pub mod policy;

pub use dialect::Dialect;
pub use ir::{
    AggFunction, Aggregation, Assertion, CountExpectation, DatasetRef, Filter, Ir, IrError, Join,
    JoinType, JsonType, ScalarValue,
};
pub use outcome::{Outcome, OutcomeStatus, QueryStats, RejectStage, Row, SelectOutput};
pub use policy::ExecutionPolicy;
