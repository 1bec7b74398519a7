//! Assertion-to-SQL compiler.
//!
//! Turns a validated IR into exactly one read-only SELECT for the target
//! dialect. Output is deterministic: same IR, same text, byte for byte.
//! Generated SQL is single-line with single spaces, and every identifier
//! goes through the quoting layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::ir::{
    Aggregation, Assertion, CountExpectation, Filter, Ir, IrError, JoinType, JsonType,
};
use crate::model::Dialect;
use crate::sql::ident::{check_identifier, quote_column, quote_table, scalar_literal, string_literal};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("assertion {assertion} is not supported for dialect {dialect}")]
    UnsupportedAssertionForDialect {
        assertion: &'static str,
        dialect: Dialect,
    },

    #[error("invalid identifier '{identifier}': {detail}")]
    InvalidIdentifier { identifier: String, detail: String },

    #[error(transparent)]
    InvalidIr(#[from] IrError),
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnsupportedAssertionForDialect { .. } => "unsupported_assertion",
            CompileError::InvalidIdentifier { .. } => "invalid_identifier",
            CompileError::InvalidIr(inner) => inner.code(),
        }
    }
}

// ============================================================================
// Compiled query
// ============================================================================

/// The compiler's output: one statement plus the provenance fields audit
/// records carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub sql_text: String,
    pub dialect: Dialect,
    /// Truncated SHA-256 of the source IR, linking query to input.
    pub source_ir_hash: String,
}

/// Compiles the IR's single assertion into SQL for its target dialect.
/// Validates structure first, so no partially checked IR reaches a builder.
pub fn compile(ir: &Ir) -> Result<CompiledQuery, CompileError> {
    ir.validate()?;
    let dialect = ir.target_dialect()?;
    let assertion = ir.assertion()?;

    let sql_text = match assertion {
        Assertion::Uniqueness { keys } => build_uniqueness(ir, dialect, keys)?,
        Assertion::NotNull { columns } => build_not_null(ir, dialect, columns)?,
        Assertion::ForeignKey {
            columns,
            ref_table,
            ref_columns,
        } => build_foreign_key(ir, dialect, columns, ref_table.as_str(), ref_columns)?,
        Assertion::RowCountReconciliation { expected, .. } => {
            build_row_count(ir, dialect, expected)?
        }
        Assertion::EqualityWithTolerance {
            left_expr,
            right_expr,
            ..
        } => build_equality(ir, dialect, left_expr, right_expr)?,
        Assertion::JsonPathExists { column, path } => {
            build_json_path_exists(ir, dialect, column, path)?
        }
        Assertion::JsonTypeCheck {
            column,
            path,
            expected_type,
        } => build_json_type_check(ir, dialect, column, path, *expected_type)?,
        Assertion::FlattenCardinality {
            array_column,
            expected_count_expr,
        } => build_flatten_cardinality(ir, dialect, array_column, expected_count_expr)?,
        Assertion::Freshness {
            column,
            max_age_hours,
        } => build_freshness(ir, dialect, column, *max_age_hours)?,
    };

    debug!(
        dialect = dialect.as_str(),
        assertion = assertion.kind_name(),
        ir_hash = %ir.ir_hash(),
        "compiled assertion"
    );

    Ok(CompiledQuery {
        sql_text,
        dialect,
        source_ir_hash: ir.ir_hash(),
    })
}

// ============================================================================
// Assertion builders
// ============================================================================

fn build_uniqueness(ir: &Ir, dialect: Dialect, keys: &[String]) -> Result<String, CompileError> {
    let quoted: Vec<String> = keys
        .iter()
        .map(|key| quote_column(key, dialect))
        .collect::<Result<_, _>>()?;
    let key_list = quoted.join(", ");
    let from = build_from_clause(ir, dialect)?;

    let mut sql = format!("SELECT {key_list}, COUNT(*) AS duplicate_count FROM {from}");
    append_where(&mut sql, build_where(ir, dialect, None)?);
    sql.push_str(&format!(" GROUP BY {key_list} HAVING COUNT(*) > 1"));
    Ok(sql)
}

fn build_not_null(ir: &Ir, dialect: Dialect, columns: &[String]) -> Result<String, CompileError> {
    let null_checks: Vec<String> = columns
        .iter()
        .map(|column| Ok(format!("{} IS NULL", quote_column(column, dialect)?)))
        .collect::<Result<_, CompileError>>()?;
    let from = build_from_clause(ir, dialect)?;

    let mut predicates = render_filters(ir, dialect, None)?;
    predicates.push(format!("({})", null_checks.join(" OR ")));

    Ok(format!(
        "SELECT COUNT(*) AS null_count FROM {from} WHERE {}",
        predicates.join(" AND ")
    ))
}

fn build_foreign_key(
    ir: &Ir,
    dialect: Dialect,
    columns: &[String],
    ref_table: &str,
    ref_columns: &[String],
) -> Result<String, CompileError> {
    let dataset = quote_table(ir.dataset.as_str(), dialect)?;
    let reference = quote_table(ref_table, dialect)?;

    let mut on_terms = Vec::with_capacity(columns.len());
    for (column, ref_column) in columns.iter().zip(ref_columns) {
        on_terms.push(format!(
            "t.{} = r.{}",
            quote_column(column, dialect)?,
            quote_column(ref_column, dialect)?
        ));
    }

    let mut predicates = render_filters(ir, dialect, Some("t"))?;
    for column in columns {
        predicates.push(format!("t.{} IS NOT NULL", quote_column(column, dialect)?));
    }
    predicates.push(format!(
        "r.{} IS NULL",
        quote_column(&ref_columns[0], dialect)?
    ));

    Ok(format!(
        "SELECT COUNT(*) AS orphan_count FROM {dataset} AS t LEFT JOIN {reference} AS r ON {} WHERE {}",
        on_terms.join(" AND "),
        predicates.join(" AND ")
    ))
}

fn build_row_count(
    ir: &Ir,
    dialect: Dialect,
    expected: &CountExpectation,
) -> Result<String, CompileError> {
    let mut projection = vec!["COUNT(*) AS actual_count".to_string()];
    if let CountExpectation::Fixed(count) = expected {
        projection.push(format!("{count} AS expected_count"));
    }
    projection.extend(render_aggregations(ir, dialect)?);

    let from = build_from_clause(ir, dialect)?;
    let mut sql = format!("SELECT {} FROM {from}", projection.join(", "));
    append_where(&mut sql, build_where(ir, dialect, None)?);
    Ok(sql)
}

fn build_equality(
    ir: &Ir,
    dialect: Dialect,
    left_expr: &str,
    right_expr: &str,
) -> Result<String, CompileError> {
    let mut projection = vec![
        format!("({left_expr}) AS left_value"),
        format!("({right_expr}) AS right_value"),
        format!("ABS(({left_expr}) - ({right_expr})) AS abs_diff"),
    ];
    projection.extend(render_aggregations(ir, dialect)?);

    let from = build_from_clause(ir, dialect)?;
    let mut sql = format!("SELECT {} FROM {from}", projection.join(", "));
    append_where(&mut sql, build_where(ir, dialect, None)?);
    Ok(sql)
}

fn build_json_path_exists(
    ir: &Ir,
    dialect: Dialect,
    column: &str,
    path: &str,
) -> Result<String, CompileError> {
    let extract = json_path_extract(dialect, column, path, "json_path_exists")?;
    let from = build_from_clause(ir, dialect)?;

    let mut sql = format!(
        "SELECT COUNT(*) AS total_count, SUM(CASE WHEN {extract} IS NOT NULL THEN 1 ELSE 0 END) AS present_count FROM {from}"
    );
    append_where(&mut sql, build_where(ir, dialect, None)?);
    Ok(sql)
}

fn build_json_type_check(
    ir: &Ir,
    dialect: Dialect,
    column: &str,
    path: &str,
    expected_type: JsonType,
) -> Result<String, CompileError> {
    let quoted = quote_column(column, dialect)?;
    let condition = match dialect {
        Dialect::Snowflake => {
            let typeof_expr = format!(
                "TYPEOF(GET_PATH({quoted}, {}))",
                string_literal(path)
            );
            match expected_type {
                JsonType::String => format!("{typeof_expr} = 'VARCHAR'"),
                JsonType::Number => format!("{typeof_expr} IN ('INTEGER', 'DECIMAL', 'DOUBLE')"),
                JsonType::Boolean => format!("{typeof_expr} = 'BOOLEAN'"),
                JsonType::Object => format!("{typeof_expr} = 'OBJECT'"),
                JsonType::Array => format!("{typeof_expr} = 'ARRAY'"),
                JsonType::Null => format!("{typeof_expr} = 'NULL_VALUE'"),
            }
        }
        Dialect::Postgres => {
            let braced = string_literal(&format!("{{{}}}", path.split('.').collect::<Vec<_>>().join(",")));
            format!(
                "jsonb_typeof({quoted} #> {braced}) = '{}'",
                lowercase_json_type_name(expected_type)
            )
        }
        Dialect::Bigquery => {
            let dollar = string_literal(&format!("$.{path}"));
            format!(
                "JSON_TYPE(JSON_QUERY({quoted}, {dollar})) = '{}'",
                lowercase_json_type_name(expected_type)
            )
        }
        Dialect::Ansi => {
            return Err(CompileError::UnsupportedAssertionForDialect {
                assertion: "json_type_check",
                dialect,
            });
        }
    };

    let from = build_from_clause(ir, dialect)?;
    let mut sql = format!(
        "SELECT COUNT(*) AS total_count, SUM(CASE WHEN {condition} THEN 1 ELSE 0 END) AS matching_count FROM {from}"
    );
    append_where(&mut sql, build_where(ir, dialect, None)?);
    Ok(sql)
}

fn build_flatten_cardinality(
    ir: &Ir,
    dialect: Dialect,
    array_column: &str,
    expected_count_expr: &str,
) -> Result<String, CompileError> {
    let dataset = quote_table(ir.dataset.as_str(), dialect)?;
    let quoted = quote_column(array_column, dialect)?;
    let lateral = match dialect {
        Dialect::Snowflake => format!(", LATERAL FLATTEN(input => {quoted}) AS f"),
        Dialect::Postgres => format!(", jsonb_array_elements({quoted}) AS elem"),
        Dialect::Bigquery => format!(", UNNEST(JSON_EXTRACT_ARRAY({quoted})) AS elem"),
        Dialect::Ansi => {
            return Err(CompileError::UnsupportedAssertionForDialect {
                assertion: "flatten_cardinality",
                dialect,
            });
        }
    };

    let mut sql = format!(
        "SELECT COUNT(*) AS flattened_count, ({expected_count_expr}) AS expected_count FROM {dataset}{lateral}"
    );
    append_where(&mut sql, build_where(ir, dialect, None)?);
    Ok(sql)
}

fn build_freshness(
    ir: &Ir,
    dialect: Dialect,
    column: &str,
    max_age_hours: u32,
) -> Result<String, CompileError> {
    let quoted = quote_column(column, dialect)?;
    let from = build_from_clause(ir, dialect)?;

    let mut predicates = render_filters(ir, dialect, None)?;
    predicates.push(format!(
        "{quoted} >= {}",
        current_timestamp_minus(dialect, max_age_hours, TimeUnit::Hour)
    ));

    Ok(format!(
        "SELECT COUNT(*) AS fresh_count FROM {from} WHERE {}",
        predicates.join(" AND ")
    ))
}

// ============================================================================
// Shared clause builders
// ============================================================================

/// Primary dataset plus any IR-level joins. Join columns are qualified by
/// their full table reference, so no alias bookkeeping is needed.
fn build_from_clause(ir: &Ir, dialect: Dialect) -> Result<String, CompileError> {
    let dataset = quote_table(ir.dataset.as_str(), dialect)?;
    let mut from = dataset.clone();
    for join in &ir.joins {
        let right = quote_table(join.right_table.as_str(), dialect)?;
        let keyword = match join.join_type {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        };
        from.push_str(&format!(
            " {keyword} {right} ON {dataset}.{} = {right}.{}",
            quote_column(&join.left_column, dialect)?,
            quote_column(&join.right_column, dialect)?
        ));
    }
    Ok(from)
}

fn append_where(sql: &mut String, clause: Option<String>) {
    if let Some(clause) = clause {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
}

fn build_where(
    ir: &Ir,
    dialect: Dialect,
    qualifier: Option<&str>,
) -> Result<Option<String>, CompileError> {
    let predicates = render_filters(ir, dialect, qualifier)?;
    if predicates.is_empty() {
        Ok(None)
    } else {
        Ok(Some(predicates.join(" AND ")))
    }
}

fn render_filters(
    ir: &Ir,
    dialect: Dialect,
    qualifier: Option<&str>,
) -> Result<Vec<String>, CompileError> {
    ir.filters
        .iter()
        .map(|filter| render_filter(filter, dialect, qualifier))
        .collect()
}

fn render_filter(
    filter: &Filter,
    dialect: Dialect,
    qualifier: Option<&str>,
) -> Result<String, CompileError> {
    let qualified = |column: &str| -> Result<String, CompileError> {
        let quoted = quote_column(column, dialect)?;
        Ok(match qualifier {
            Some(alias) => format!("{alias}.{quoted}"),
            None => quoted,
        })
    };

    Ok(match filter {
        Filter::TimeWindow { column, last_days } => format!(
            "{} >= {}",
            qualified(column)?,
            current_timestamp_minus(dialect, *last_days, TimeUnit::Day)
        ),
        Filter::Equals { column, value } => {
            format!("{} = {}", qualified(column)?, scalar_literal(value))
        }
        Filter::Range { column, low, high } => format!(
            "({} BETWEEN {} AND {})",
            qualified(column)?,
            scalar_literal(low),
            scalar_literal(high)
        ),
        // Verbatim predicate text; the SQL validator downstream still
        // screens the full statement.
        Filter::CustomPredicate { expression } => format!("({expression})"),
    })
}

fn render_aggregations(ir: &Ir, dialect: Dialect) -> Result<Vec<String>, CompileError> {
    ir.aggregations
        .iter()
        .map(|aggregation| render_aggregation(aggregation, dialect))
        .collect()
}

fn render_aggregation(aggregation: &Aggregation, dialect: Dialect) -> Result<String, CompileError> {
    use crate::model::ir::AggFunction;

    // Plain column names get quoted; anything else is expression text and
    // rides through verbatim.
    let operand = if check_identifier(&aggregation.expression).is_ok() {
        quote_column(&aggregation.expression, dialect)?
    } else {
        format!("({})", aggregation.expression)
    };
    let alias = quote_column(&aggregation.alias, dialect)?;

    let call = match aggregation.function {
        AggFunction::Sum => format!("SUM({operand})"),
        AggFunction::Count => format!("COUNT({operand})"),
        AggFunction::Min => format!("MIN({operand})"),
        AggFunction::Max => format!("MAX({operand})"),
        AggFunction::Avg => format!("AVG({operand})"),
        AggFunction::DistinctCount => format!("COUNT(DISTINCT {operand})"),
    };
    Ok(format!("{call} AS {alias}"))
}

// ============================================================================
// Dialect helpers
// ============================================================================

#[derive(Clone, Copy)]
enum TimeUnit {
    Day,
    Hour,
}

fn current_timestamp_minus(dialect: Dialect, quantity: u32, unit: TimeUnit) -> String {
    match (dialect, unit) {
        (Dialect::Snowflake, TimeUnit::Day) => {
            format!("DATEADD('day', -{quantity}, CURRENT_TIMESTAMP())")
        }
        (Dialect::Snowflake, TimeUnit::Hour) => {
            format!("DATEADD('hour', -{quantity}, CURRENT_TIMESTAMP())")
        }
        (Dialect::Postgres, TimeUnit::Day) => format!("NOW() - INTERVAL '{quantity} days'"),
        (Dialect::Postgres, TimeUnit::Hour) => format!("NOW() - INTERVAL '{quantity} hours'"),
        (Dialect::Bigquery, TimeUnit::Day) => {
            format!("TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL {quantity} DAY)")
        }
        (Dialect::Bigquery, TimeUnit::Hour) => {
            format!("TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL {quantity} HOUR)")
        }
        (Dialect::Ansi, TimeUnit::Day) => format!("CURRENT_TIMESTAMP - INTERVAL '{quantity}' DAY"),
        (Dialect::Ansi, TimeUnit::Hour) => {
            format!("CURRENT_TIMESTAMP - INTERVAL '{quantity}' HOUR")
        }
    }
}

fn json_path_extract(
    dialect: Dialect,
    column: &str,
    path: &str,
    assertion: &'static str,
) -> Result<String, CompileError> {
    let quoted = quote_column(column, dialect)?;
    match dialect {
        Dialect::Snowflake => Ok(format!("GET_PATH({quoted}, {})", string_literal(path))),
        Dialect::Postgres => {
            let braced = format!("{{{}}}", path.split('.').collect::<Vec<_>>().join(","));
            Ok(format!("{quoted} #>> {}", string_literal(&braced)))
        }
        Dialect::Bigquery => Ok(format!(
            "JSON_EXTRACT({quoted}, {})",
            string_literal(&format!("$.{path}"))
        )),
        Dialect::Ansi => Err(CompileError::UnsupportedAssertionForDialect { assertion, dialect }),
    }
}

fn lowercase_json_type_name(expected_type: JsonType) -> &'static str {
    match expected_type {
        JsonType::String => "string",
        JsonType::Number => "number",
        JsonType::Boolean => "boolean",
        JsonType::Object => "object",
        JsonType::Array => "array",
        JsonType::Null => "null",
    }
}
