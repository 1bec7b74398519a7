//! Read-only SQL validator.
//!
//! Deny-list gate applied to every statement after compilation and before
//! anything touches a warehouse. Pure text analysis over the lexer's
//! stripped form; no parsing, no I/O, and any doubt resolves to deny.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::sql::lexer::strip_comments_and_strings;

/// Write, DDL, and session-control keywords that never belong in a
/// read-only statement. Matched as whole words on stripped text, so
/// column names like `CREATED_AT` and functions like `GET_PATH` pass.
pub const FORBIDDEN_KEYWORDS: [&str; 20] = [
    "INSERT", "UPDATE", "DELETE", "MERGE", "CREATE", "ALTER", "DROP", "TRUNCATE", "GRANT",
    "REVOKE", "CALL", "USE", "COPY", "PUT", "GET", "BEGIN", "COMMIT", "ROLLBACK", "SET", "UNSET",
];

lazy_static! {
    static ref FORBIDDEN_RE: Regex = Regex::new(&format!(
        r"\b({})\b",
        FORBIDDEN_KEYWORDS.join("|")
    ))
    .expect("forbidden keyword pattern");

    /// Table references after FROM/JOIN, in bare, per-segment-quoted, or
    /// backtick-wrapped form. Quote characters are stripped before the
    /// schema prefix is compared.
    static ref TABLE_REF_RE: Regex =
        Regex::new(r#"\b(?:FROM|JOIN)\s+([A-Za-z0-9_"`.]+)"#).expect("table ref pattern");
}

// ============================================================================
// Verdict
// ============================================================================

/// Why a statement was refused. `code` is the stable field in serialized
/// verdicts; the display form is the operator-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("expected exactly one complete sql statement")]
    MultiStatement,

    #[error("forbidden keyword {keyword}")]
    ForbiddenKeyword { keyword: String },

    #[error("statement must start with SELECT or WITH")]
    NotASelect,

    #[error("schema '{reference}' is not in the allowed list")]
    SchemaNotAllowed { reference: String },
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MultiStatement => "multi_statement",
            RejectReason::ForbiddenKeyword { .. } => "forbidden_keyword",
            RejectReason::NotASelect => "not_a_select",
            RejectReason::SchemaNotAllowed { .. } => "schema_not_allowed",
        }
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl Verdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: RejectReason) -> Self {
        debug!(code = reason.code(), %reason, "sql rejected");
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    /// The forbidden keyword that tripped the deny, if that was the cause.
    pub fn matched_keyword(&self) -> Option<&str> {
        match &self.reason {
            Some(RejectReason::ForbiddenKeyword { keyword }) => Some(keyword),
            _ => None,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validates one statement against the read-only rules. Checks run in a
/// fixed order and the first failure wins: statement count, forbidden
/// keywords, statement form, then schema allow-list. An empty allow-list
/// imposes no schema restriction.
pub fn validate_sql(sql: &str, allowed_schemas: &BTreeSet<String>) -> Verdict {
    let stripped = strip_comments_and_strings(sql);
    if !stripped.terminated {
        return Verdict::deny(RejectReason::MultiStatement);
    }

    let text = stripped.text.trim();
    let text = text.strip_suffix(';').unwrap_or(text);
    if text.contains(';') {
        return Verdict::deny(RejectReason::MultiStatement);
    }

    let upper = text.to_ascii_uppercase();

    if let Some(found) = FORBIDDEN_RE.captures(&upper) {
        return Verdict::deny(RejectReason::ForbiddenKeyword {
            keyword: found[1].to_string(),
        });
    }

    let leading: String = upper
        .trim_start()
        .chars()
        .take_while(|ch| ch.is_ascii_alphabetic())
        .collect();
    if leading != "SELECT" && leading != "WITH" {
        return Verdict::deny(RejectReason::NotASelect);
    }

    if !allowed_schemas.is_empty() {
        let allowed: BTreeSet<String> = allowed_schemas
            .iter()
            .map(|schema| schema.trim().to_ascii_uppercase())
            .collect();
        for captures in TABLE_REF_RE.captures_iter(&upper) {
            let cleaned: String = captures[1]
                .chars()
                .filter(|ch| *ch != '"' && *ch != '`')
                .collect();
            let segments: Vec<&str> = cleaned.split('.').filter(|s| !s.is_empty()).collect();
            if segments.len() < 3 {
                continue;
            }
            let prefix = format!("{}.{}", segments[0], segments[1]);
            if !allowed.contains(&prefix) {
                return Verdict::deny(RejectReason::SchemaNotAllowed { reference: prefix });
            }
        }
    }

    Verdict::allow()
}
