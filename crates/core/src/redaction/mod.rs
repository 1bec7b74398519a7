//! PII Redaction
//!
//! Result rows pass through here before anyone sees them. Two nets: column
//! names that look like PII get their values structure-masked outright, and
//! every remaining string, plus the decimal rendering of every number, is
//! scrubbed against the pattern rules. Redaction is idempotent, so a row
//! can safely travel the pipeline twice.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::model::Row;

// ============================================================================
// Rules
// ============================================================================

/// How a matched value is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskStrategy {
    /// Replace with a truncated SHA-256 tag. Equal inputs stay correlatable
    /// across rows without exposing the value.
    Hash,
    /// Star out everything but the last four characters.
    PartialMask,
    /// Replace the whole match with a named placeholder.
    FullMask,
}

/// One pattern rule. Rules apply in list order and every rule runs over the
/// full text.
#[derive(Debug, Clone)]
pub struct RedactionRule {
    pub name: String,
    pub pattern: Regex,
    pub strategy: MaskStrategy,
}

impl RedactionRule {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        strategy: MaskStrategy,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            strategy,
        })
    }
}

lazy_static! {
    static ref BUILT_IN_RULES: Vec<RedactionRule> = vec![
        RedactionRule::new(
            "email",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            MaskStrategy::Hash,
        )
        .expect("email pattern"),
        RedactionRule::new(
            "phone",
            r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
            MaskStrategy::PartialMask,
        )
        .expect("phone pattern"),
        RedactionRule::new("ssn", r"\b\d{3}-?\d{2}-?\d{4}\b", MaskStrategy::FullMask)
            .expect("ssn pattern"),
        RedactionRule::new(
            "credit_card",
            r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
            MaskStrategy::PartialMask,
        )
        .expect("credit card pattern"),
        RedactionRule::new(
            "ip_address",
            r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b",
            MaskStrategy::FullMask,
        )
        .expect("ip address pattern"),
    ];

    /// Column names treated as PII regardless of content.
    static ref PII_COLUMN_RE: Regex = Regex::new(
        r"(?i)(email|phone|ssn|social_security|credit_card|card_number|address|dob|birth_date|password|secret|token)"
    )
    .expect("pii column pattern");
}

/// The standard rule set, in application order.
pub fn built_in_rules() -> &'static [RedactionRule] {
    &BUILT_IN_RULES
}

// ============================================================================
// Redaction passes
// ============================================================================

/// Applies every rule to the text, in order. With `enabled` off the text
/// passes through untouched.
pub fn redact_text(text: &str, rules: &[RedactionRule], enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }
    let mut current = text.to_string();
    for rule in rules {
        current = rule
            .pattern
            .replace_all(&current, |caps: &Captures| apply_strategy(rule, &caps[0]))
            .into_owned();
    }
    current
}

/// Pattern-redacts every string nested anywhere inside the value. Numbers
/// are scanned through their decimal rendering: one that trips a rule comes
/// back as a masked string, the rest stay numeric.
pub fn redact_value(value: &Value, rules: &[RedactionRule]) -> Value {
    match value {
        Value::String(text) => Value::String(redact_text(text, rules, true)),
        Value::Number(number) => {
            let text = number.to_string();
            let redacted = redact_text(&text, rules, true);
            if redacted == text {
                value.clone()
            } else {
                Value::String(redacted)
            }
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| redact_value(item, rules)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), redact_value(item, rules)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Redacts one result row. PII-named columns are structure-masked whole;
/// everything else gets the pattern pass.
pub fn redact_row(row: &Row, rules: &[RedactionRule], enabled: bool) -> Row {
    if !enabled {
        return row.clone();
    }
    row.iter()
        .map(|(column, value)| {
            let redacted = if PII_COLUMN_RE.is_match(column) {
                match value {
                    Value::String(text) => Value::String(structure_mask(text)),
                    Value::Number(number) => Value::String(structure_mask(&number.to_string())),
                    other => redact_value(other, rules),
                }
            } else {
                redact_value(value, rules)
            };
            (column.clone(), redacted)
        })
        .collect()
}

pub fn redact_rows(rows: &[Row], rules: &[RedactionRule], enabled: bool) -> Vec<Row> {
    rows.iter().map(|row| redact_row(row, rules, enabled)).collect()
}

// ============================================================================
// Masking
// ============================================================================

fn apply_strategy(rule: &RedactionRule, matched: &str) -> String {
    match rule.strategy {
        MaskStrategy::Hash => {
            let digest = Sha256::digest(matched.as_bytes());
            let hex: String = digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect();
            format!("[SHA256_{hex}]")
        }
        MaskStrategy::PartialMask => partial_mask(matched),
        MaskStrategy::FullMask => format!("[REDACTED_{}]", rule.name.to_ascii_uppercase()),
    }
}

fn partial_mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let n = chars.len();
    if n <= 4 {
        return "*".repeat(n);
    }
    let tail: String = chars[n - 4..].iter().collect();
    format!("{}{tail}", "*".repeat(n - 4))
}

/// Length-preserving mask used for PII-named columns. Being a fixed point
/// of itself keeps repeated redaction harmless.
fn structure_mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let n = chars.len();
    if n <= 4 {
        return "*".repeat(n);
    }
    if n <= 8 {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[n - 2..].iter().collect();
        return format!("{head}{}{tail}", "*".repeat(n - 4));
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[n - 3..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(n - 6))
}
