use probe_core::model::Dialect;

/// Canned EXPLAIN output phrased the way each engine reports scan sizes.
/// Every variant carries a figure the default plan extractor can read.
pub fn canned_plan(dialect: Dialect, estimated_mb: u64) -> String {
    match dialect {
        Dialect::Snowflake => format!(
            "GlobalStats:\n  partitionsTotal=12\n  partitionsAssigned=4\n\
             Operator: TableScan\n  estimated: {estimated_mb} MB"
        ),
        Dialect::Postgres => format!(
            "Seq Scan on orders  (cost=0.00..445.00 rows=120000 width=48)\n\
               estimated scan: {estimated_mb} MB"
        ),
        Dialect::Bigquery => format!(
            "Stage 00:\n  READ orders\n  estimatedBytesProcessed: {estimated_mb} MB"
        ),
        Dialect::Ansi => format!("TableScan orders estimated: {estimated_mb} MB"),
    }
}
