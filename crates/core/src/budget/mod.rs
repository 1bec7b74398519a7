//! Plan Budget Gate
//!
//! Pre-execution cost control. An EXPLAIN plan's estimated scan size is
//! compared against the policy budget before any real query runs. The plan
//! format is engine-specific, so byte extraction hides behind a trait; the
//! bundled extractor handles the common `N bytes` / `N MB` / `N GB` plan
//! phrasing. A budget that is set but cannot be verified denies execution.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Pulls an estimated scan size in bytes out of engine plan text. `None`
/// means the plan carried no usable figure.
pub trait PlanBytesExtractor: Send + Sync {
    fn extract_bytes(&self, plan_text: &str) -> Option<u64>;
}

/// Decision record for one budget evaluation. `estimated_bytes_scanned` is
/// `-1` when the plan offered no figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub estimated_bytes_scanned: i64,
    pub budget_bytes: i64,
    pub within_budget: bool,
    pub plan_text: String,
    /// Truncated SHA-256 of the plan text, for audit correlation.
    pub plan_hash: String,
}

/// Evaluates a plan against the byte budget. A budget of zero or less
/// disables the gate entirely; otherwise an unreadable estimate counts as
/// over budget.
pub fn check_budget(
    plan_text: &str,
    budget_bytes: i64,
    extractor: &dyn PlanBytesExtractor,
) -> BudgetCheck {
    let plan_hash = short_sha256(plan_text.as_bytes());
    let extracted = extractor.extract_bytes(plan_text);
    let estimated_bytes_scanned = extracted
        .map(|bytes| i64::try_from(bytes).unwrap_or(i64::MAX))
        .unwrap_or(-1);

    let within_budget = if budget_bytes <= 0 {
        true
    } else {
        extracted.is_some() && estimated_bytes_scanned <= budget_bytes
    };

    if !within_budget {
        debug!(
            estimated = estimated_bytes_scanned,
            budget = budget_bytes,
            plan_hash = %plan_hash,
            "plan over budget"
        );
    }

    BudgetCheck {
        estimated_bytes_scanned,
        budget_bytes,
        within_budget,
        plan_text: plan_text.to_string(),
        plan_hash,
    }
}

fn short_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

// ============================================================================
// Default extractor
// ============================================================================

lazy_static! {
    static ref BYTES_RE: Regex = Regex::new(r"(?i)(\d+)\s*bytes").expect("bytes pattern");
    static ref MEGABYTES_RE: Regex = Regex::new(r"(?i)(\d+)\s*MB").expect("megabytes pattern");
    static ref GIGABYTES_RE: Regex = Regex::new(r"(?i)(\d+)\s*GB").expect("gigabytes pattern");
}

/// Extractor for plans that state scan sizes as `N bytes`, `N MB`, or
/// `N GB`. Every figure found is summed; binary multipliers throughout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanEstimateExtractor;

impl PlanBytesExtractor for ScanEstimateExtractor {
    fn extract_bytes(&self, plan_text: &str) -> Option<u64> {
        let mut total: u64 = 0;
        let mut matched = false;

        for (pattern, multiplier) in [
            (&*BYTES_RE, 1u64),
            (&*MEGABYTES_RE, 1_048_576),
            (&*GIGABYTES_RE, 1_073_741_824),
        ] {
            for captures in pattern.captures_iter(plan_text) {
                matched = true;
                let quantity: u64 = captures[1].parse().unwrap_or(u64::MAX);
                total = total.saturating_add(quantity.saturating_mul(multiplier));
            }
        }

        matched.then_some(total)
    }
}
