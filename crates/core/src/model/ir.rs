use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::dialect::Dialect;

// ============================================================================
// Errors
// ============================================================================

/// Structural problems in an IR document. These are producer mistakes and are
/// always surfaced to the caller, never defaulted away.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("ir carries no assertion; exactly one is required")]
    MissingAssertion,

    #[error("ir carries {count} assertions; exactly one is required")]
    MultipleAssertions { count: usize },

    #[error("unknown dialect '{dialect}' (supported: ansi, snowflake, postgres, bigquery)")]
    UnknownDialect { dialect: String },

    #[error("invalid reference '{reference}': {detail}")]
    InvalidReference { reference: String, detail: String },
}

impl IrError {
    /// Stable machine-readable code for outcome records and audit logs.
    pub fn code(&self) -> &'static str {
        match self {
            IrError::MissingAssertion => "missing_assertion",
            IrError::MultipleAssertions { .. } => "multiple_assertions",
            IrError::UnknownDialect { .. } => "unknown_dialect",
            IrError::InvalidReference { .. } => "invalid_reference",
        }
    }
}

// ============================================================================
// Dataset reference
// ============================================================================

/// Fully qualified dataset reference (`database.schema.table`, or fewer
/// segments where the dialect allows it). Immutable once the IR is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetRef(String);

impl DatasetRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `database.schema` prefix, present only on three-segment names.
    pub fn schema_prefix(&self) -> Option<&str> {
        let mut dots = self.0.match_indices('.');
        dots.next()?;
        let (second, _) = dots.next()?;
        Some(&self.0[..second])
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl std::fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatasetRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DatasetRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Filters, joins, aggregations
// ============================================================================

/// A literal usable in filter comparisons. Untagged so documents write plain
/// scalars (`value: 42`, `value: "shipped"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// One conjunctive WHERE-clause term. List order shapes the generated text
/// but not the semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    /// Rows whose `column` falls in the trailing window of `last_days` days.
    TimeWindow { column: String, last_days: u32 },
    Equals { column: String, value: ScalarValue },
    /// Inclusive range on both ends.
    Range {
        column: String,
        low: ScalarValue,
        high: ScalarValue,
    },
    /// Raw predicate text, compiled verbatim inside parentheses. The SQL
    /// validator downstream stays the safety net for its content.
    CustomPredicate { expression: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    /// Column on the IR's primary dataset.
    pub left_column: String,
    /// Joined dataset; must itself be a valid dataset reference.
    pub right_table: DatasetRef,
    pub right_column: String,
    #[serde(default)]
    pub join_type: JoinType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunction {
    Sum,
    Count,
    Min,
    Max,
    Avg,
    DistinctCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggFunction,
    /// Column name or SQL expression the function applies to.
    pub expression: String,
    pub alias: String,
}

// ============================================================================
// Assertions
// ============================================================================

/// Expected row count for reconciliation: a fixed number, or the name of an
/// externally resolved metric. Only the fixed form is echoed into SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountExpectation {
    Fixed(i64),
    Metric { from: String },
}

/// JSON value type names as used by `json_type_check`. The compiler maps
/// these onto each dialect's own type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

/// The payload of a test: exactly one per IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    /// No duplicate combinations of `keys`.
    Uniqueness { keys: Vec<String> },

    /// No NULL in any of `columns`.
    NotNull { columns: Vec<String> },

    /// Every non-null child key resolves in the referenced table.
    ForeignKey {
        columns: Vec<String>,
        ref_table: DatasetRef,
        ref_columns: Vec<String>,
    },

    /// Actual row count vs an expected figure, within tolerance.
    RowCountReconciliation {
        expected: CountExpectation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance_abs: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance_pct: Option<f64>,
    },

    /// Two expressions expected equal within tolerance, evaluated in one row.
    EqualityWithTolerance {
        left_expr: String,
        right_expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance_abs: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance_pct: Option<f64>,
    },

    /// Every row has a value at `path` inside the JSON column.
    JsonPathExists { column: String, path: String },

    /// The value at `path` has the expected JSON type in every row.
    JsonTypeCheck {
        column: String,
        path: String,
        expected_type: JsonType,
    },

    /// Flattened element count of an array column vs an expected expression.
    FlattenCardinality {
        array_column: String,
        expected_count_expr: String,
    },

    /// At least one row inside the trailing freshness window.
    Freshness { column: String, max_age_hours: u32 },
}

impl Assertion {
    /// The document-form kind name, also used in logs and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Assertion::Uniqueness { .. } => "uniqueness",
            Assertion::NotNull { .. } => "not_null",
            Assertion::ForeignKey { .. } => "foreign_key",
            Assertion::RowCountReconciliation { .. } => "row_count_reconciliation",
            Assertion::EqualityWithTolerance { .. } => "equality_with_tolerance",
            Assertion::JsonPathExists { .. } => "json_path_exists",
            Assertion::JsonTypeCheck { .. } => "json_type_check",
            Assertion::FlattenCardinality { .. } => "flatten_cardinality",
            Assertion::Freshness { .. } => "freshness",
        }
    }
}

// ============================================================================
// IR
// ============================================================================

/// Dialect-agnostic description of one data test. Value object: produced by
/// an external front-end (AI compiler, UI cards, hand-authored YAML),
/// consumed once by the dialect compiler, never mutated.
///
/// Producers are not trusted; call [`Ir::validate`] before compiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ir {
    #[serde(default = "default_ir_version")]
    pub ir_version: String,

    /// Primary dataset the assertion runs against.
    pub dataset: DatasetRef,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<Join>,

    /// Extra aggregate columns projected into reconciliation-style queries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<Aggregation>,

    /// Assertion payload. Exactly one is required; zero or several fail
    /// validation before any compilation happens.
    #[serde(default)]
    pub assertions: Vec<Assertion>,

    /// Target dialect name. Carried as text because documents arrive from
    /// untrusted producers; resolved via [`Ir::target_dialect`].
    pub dialect: String,
}

fn default_ir_version() -> String {
    "1.0".to_string()
}

impl Ir {
    pub fn new(dataset: impl Into<DatasetRef>, assertion: Assertion, dialect: Dialect) -> Self {
        Self {
            ir_version: default_ir_version(),
            dataset: dataset.into(),
            filters: Vec::new(),
            joins: Vec::new(),
            aggregations: Vec::new(),
            assertions: vec![assertion],
            dialect: dialect.as_str().to_string(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    /// The single assertion, or the exactly-one violation.
    pub fn assertion(&self) -> Result<&Assertion, IrError> {
        match self.assertions.as_slice() {
            [one] => Ok(one),
            [] => Err(IrError::MissingAssertion),
            many => Err(IrError::MultipleAssertions { count: many.len() }),
        }
    }

    /// Resolves the dialect text to a supported [`Dialect`].
    pub fn target_dialect(&self) -> Result<Dialect, IrError> {
        Dialect::parse(&self.dialect).ok_or_else(|| IrError::UnknownDialect {
            dialect: self.dialect.clone(),
        })
    }

    /// Structural validation: exactly one assertion, a known dialect, and
    /// identifier-shaped references throughout. Performs no I/O and never
    /// checks that referenced objects exist; that is the catalog's job.
    pub fn validate(&self) -> Result<(), IrError> {
        let assertion = self.assertion()?;
        self.target_dialect()?;

        check_reference(self.dataset.as_str())?;

        for filter in &self.filters {
            match filter {
                Filter::TimeWindow { column, .. }
                | Filter::Equals { column, .. }
                | Filter::Range { column, .. } => check_reference(column)?,
                Filter::CustomPredicate { .. } => {}
            }
        }

        for join in &self.joins {
            check_reference(&join.left_column)?;
            check_reference(join.right_table.as_str())?;
            check_reference(&join.right_column)?;
        }

        for aggregation in &self.aggregations {
            check_reference(&aggregation.alias)?;
        }

        match assertion {
            Assertion::Uniqueness { keys } => {
                check_column_list("uniqueness.keys", keys)?;
            }
            Assertion::NotNull { columns } => {
                check_column_list("not_null.columns", columns)?;
            }
            Assertion::ForeignKey {
                columns,
                ref_table,
                ref_columns,
            } => {
                check_column_list("foreign_key.columns", columns)?;
                check_column_list("foreign_key.ref_columns", ref_columns)?;
                check_reference(ref_table.as_str())?;
                if columns.len() != ref_columns.len() {
                    return Err(IrError::InvalidReference {
                        reference: "foreign_key.ref_columns".to_string(),
                        detail: format!(
                            "expected {} columns to pair with foreign_key.columns, found {}",
                            columns.len(),
                            ref_columns.len()
                        ),
                    });
                }
            }
            Assertion::JsonPathExists { column, .. }
            | Assertion::JsonTypeCheck { column, .. }
            | Assertion::Freshness { column, .. } => {
                check_reference(column)?;
            }
            Assertion::FlattenCardinality { array_column, .. } => {
                check_reference(array_column)?;
            }
            Assertion::RowCountReconciliation { .. }
            | Assertion::EqualityWithTolerance { .. } => {}
        }

        Ok(())
    }

    /// Parses an IR document from YAML. Parse errors are carried as plain
    /// messages; structural checks stay with [`Ir::validate`].
    pub fn from_yaml_str(document: &str) -> crate::Result<Self> {
        serde_yaml::from_str(document)
            .map_err(|err| crate::CoreError::Message(format!("invalid ir document: {err}")))
    }

    /// Parses an IR document from JSON.
    pub fn from_json_str(document: &str) -> crate::Result<Self> {
        serde_json::from_str(document)
            .map_err(|err| crate::CoreError::Message(format!("invalid ir document: {err}")))
    }

    /// SHA-256 of the canonical JSON form, truncated to 16 hex characters.
    /// Compiled queries carry this as `source_ir_hash` for audit trails.
    pub fn ir_hash(&self) -> String {
        let canonical =
            serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        let digest = Sha256::digest(&canonical);
        digest
            .iter()
            .take(8)
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

// ============================================================================
// Reference shape checks
// ============================================================================

fn check_column_list(field: &str, columns: &[String]) -> Result<(), IrError> {
    if columns.is_empty() {
        return Err(IrError::InvalidReference {
            reference: field.to_string(),
            detail: "must name at least one column".to_string(),
        });
    }
    for column in columns {
        check_reference(column)?;
    }
    Ok(())
}

/// Basic identifier-syntax check: dot-separated segments, each starting with
/// a letter or underscore and continuing with letters, digits, underscores.
fn check_reference(reference: &str) -> Result<(), IrError> {
    let invalid = |detail: &str| IrError::InvalidReference {
        reference: reference.to_string(),
        detail: detail.to_string(),
    };

    if reference.is_empty() {
        return Err(invalid("must not be empty"));
    }

    for segment in reference.split('.') {
        if segment.is_empty() {
            return Err(invalid("contains an empty segment"));
        }
        let mut chars = segment.chars();
        let first = chars.next().unwrap_or('.');
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(invalid("segments must start with a letter or underscore"));
        }
        if !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(invalid(
                "segments may only contain letters, digits, and underscores",
            ));
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
