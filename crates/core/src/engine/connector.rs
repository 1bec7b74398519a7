use crate::model::SelectOutput;

/// Warehouse adapter the executor drives. Implementations receive exactly
/// the SQL the pipeline already validated, and are still expected to hold
/// their own read-only line as a second net (session flags, a restricted
/// role, or a text check of their own).
pub trait Connector: Send + Sync {
    /// Returns the engine's plan text for the statement without running it.
    fn explain(&self, sql: &str) -> anyhow::Result<String>;

    /// Runs the statement and returns rows plus engine stats.
    /// `timeout_seconds` is the per-statement ceiling; an adapter that
    /// cannot enforce it should fail rather than hang.
    fn select(&self, sql: &str, timeout_seconds: u64) -> anyhow::Result<SelectOutput>;
}
