use std::fmt;

use serde::{Deserialize, Serialize};

/// Target SQL dialect. Dialects differ in identifier quoting, JSON path
/// extraction, array expansion, and interval arithmetic; everything else the
/// compiler emits is plain ANSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Generic ANSI SQL. No JSON or array-expansion rules.
    Ansi,
    Snowflake,
    Postgres,
    Bigquery,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::Ansi,
        Dialect::Snowflake,
        Dialect::Postgres,
        Dialect::Bigquery,
    ];

    /// Parses a dialect name as carried in IR documents. Case-insensitive;
    /// accepts the common aliases `generic` and `postgresql`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ansi" | "generic" => Some(Dialect::Ansi),
            "snowflake" => Some(Dialect::Snowflake),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "bigquery" => Some(Dialect::Bigquery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Ansi => "ansi",
            Dialect::Snowflake => "snowflake",
            Dialect::Postgres => "postgres",
            Dialect::Bigquery => "bigquery",
        }
    }

    /// Whether the dialect has JSON path-extraction rules.
    pub fn supports_json(&self) -> bool {
        !matches!(self, Dialect::Ansi)
    }

    /// Whether the dialect has an array-expansion construct.
    pub fn supports_flatten(&self) -> bool {
        !matches!(self, Dialect::Ansi)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
