//! Identifier quoting and literal rendering.
//!
//! Every identifier that reaches generated SQL comes through here, and every
//! helper rejects text that could break out of its quoted position. This is
//! the compiler's own guard; the downstream SQL validator stays in place as
//! the second net.

use crate::model::{Dialect, ScalarValue};
use crate::sql::compiler::CompileError;

/// Rejects anything that is not a plain dotted identifier. Quote characters,
/// statement separators, whitespace, and control characters never survive.
pub fn check_identifier(identifier: &str) -> Result<(), CompileError> {
    let invalid = |detail: &str| CompileError::InvalidIdentifier {
        identifier: identifier.to_string(),
        detail: detail.to_string(),
    };

    if identifier.is_empty() {
        return Err(invalid("must not be empty"));
    }
    for ch in identifier.chars() {
        match ch {
            '\'' | '"' | '`' => return Err(invalid("contains a quote character")),
            ';' => return Err(invalid("contains a statement separator")),
            ch if ch.is_whitespace() => return Err(invalid("contains whitespace")),
            ch if ch.is_control() => return Err(invalid("contains a control character")),
            _ => {}
        }
    }
    Ok(())
}

/// Quotes a dotted table reference for the dialect. ANSI, Snowflake, and
/// Postgres double-quote each segment; BigQuery wraps the whole dotted path
/// in a single backtick pair.
pub fn quote_table(reference: &str, dialect: Dialect) -> Result<String, CompileError> {
    check_identifier(reference)?;
    match dialect {
        Dialect::Bigquery => Ok(format!("`{reference}`")),
        Dialect::Ansi | Dialect::Snowflake | Dialect::Postgres => Ok(reference
            .split('.')
            .map(|segment| format!("\"{segment}\""))
            .collect::<Vec<_>>()
            .join(".")),
    }
}

/// Quotes a column name (possibly dotted) segment by segment.
pub fn quote_column(column: &str, dialect: Dialect) -> Result<String, CompileError> {
    check_identifier(column)?;
    let quoted = column
        .split('.')
        .map(|segment| match dialect {
            Dialect::Bigquery => format!("`{segment}`"),
            Dialect::Ansi | Dialect::Snowflake | Dialect::Postgres => format!("\"{segment}\""),
        })
        .collect::<Vec<_>>()
        .join(".");
    Ok(quoted)
}

/// Renders a single-quoted string literal. Embedded quotes are doubled;
/// backslashes pass through untouched so no dialect can reinterpret them.
pub fn string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Renders a scalar as a SQL literal.
pub fn scalar_literal(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Bool(true) => "TRUE".to_string(),
        ScalarValue::Bool(false) => "FALSE".to_string(),
        ScalarValue::Int(n) => n.to_string(),
        ScalarValue::Float(x) => x.to_string(),
        ScalarValue::Text(s) => string_literal(s),
    }
}
