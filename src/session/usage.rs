//! Token usage accounting
//!
//! Upstream servers report usage in slightly different ways (missing fields,
//! numbers encoded as strings, nulls). Everything is normalized into a
//! `UsageReport` before being summed into the session's `UsageTotals`.

use serde::{Deserialize, Serialize};

const USAGE_FIELDS: [&str; 3] = ["prompt_tokens", "completion_tokens", "total_tokens"];

/// Running token totals for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Usable usage fields from one completion
///
/// A field is `None` when it was absent or could not be coerced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl UsageReport {
    /// Whether no field carried a usable value
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.total_tokens.is_none()
    }

    fn set(&mut self, field: &str, value: u64) {
        match field {
            "prompt_tokens" => self.prompt_tokens = Some(value),
            "completion_tokens" => self.completion_tokens = Some(value),
            "total_tokens" => self.total_tokens = Some(value),
            _ => {}
        }
    }
}

/// Anything that can report token usage fields
///
/// Implemented for raw JSON mappings as returned by the endpoint and for the
/// typed totals, so both shapes feed the same accumulator.
pub trait UsageSource {
    /// Value of a usage field, if present and coercible
    fn usage_field(&self, field: &str) -> Option<u64>;
}

impl UsageSource for serde_json::Value {
    fn usage_field(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(coerce_token_count)
    }
}

impl UsageSource for serde_json::Map<String, serde_json::Value> {
    fn usage_field(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(coerce_token_count)
    }
}

impl UsageSource for UsageTotals {
    fn usage_field(&self, field: &str) -> Option<u64> {
        match field {
            "prompt_tokens" => Some(self.prompt_tokens),
            "completion_tokens" => Some(self.completion_tokens),
            "total_tokens" => Some(self.total_tokens),
            _ => None,
        }
    }
}

impl UsageSource for UsageReport {
    fn usage_field(&self, field: &str) -> Option<u64> {
        match field {
            "prompt_tokens" => self.prompt_tokens,
            "completion_tokens" => self.completion_tokens,
            "total_tokens" => self.total_tokens,
            _ => None,
        }
    }
}

/// Coerce a JSON value into a token count
///
/// Accepts non-negative integers, floats (truncated), numeric strings and
/// booleans. Negative or non-numeric values yield `None`.
///
/// # Examples
///
/// ```
/// use parley::session::usage::coerce_token_count;
/// use serde_json::json;
///
/// assert_eq!(coerce_token_count(&json!(12)), Some(12));
/// assert_eq!(coerce_token_count(&json!("12")), Some(12));
/// assert_eq!(coerce_token_count(&json!(12.9)), Some(12));
/// assert_eq!(coerce_token_count(&json!(null)), None);
/// assert_eq!(coerce_token_count(&json!(-3)), None);
/// ```
pub fn coerce_token_count(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        serde_json::Value::String(text) => text.trim().parse::<u64>().ok(),
        serde_json::Value::Bool(flag) => Some(u64::from(*flag)),
        _ => None,
    }
}

/// Extract the usable usage fields from a source
///
/// Returns `None` when the source is absent or carries no usable field.
pub fn normalize_usage<S: UsageSource + ?Sized>(usage: Option<&S>) -> Option<UsageReport> {
    let usage = usage?;
    let mut report = UsageReport::default();
    for field in USAGE_FIELDS {
        if let Some(value) = usage.usage_field(field) {
            report.set(field, value);
        }
    }
    (!report.is_empty()).then_some(report)
}

/// Add a usage report into optional running totals
///
/// Totals are created at zero on first use. Absent fields leave the
/// corresponding total untouched. Returns the updated totals, or `None`
/// when the report had nothing usable (in which case `totals` is unchanged).
///
/// # Examples
///
/// ```
/// use parley::session::usage::{record_usage, UsageTotals};
/// use serde_json::json;
///
/// let mut totals: Option<UsageTotals> = None;
/// record_usage(&mut totals, Some(&json!({"prompt_tokens": 5, "total_tokens": 7})));
/// record_usage(&mut totals, Some(&json!({"completion_tokens": 2})));
/// let totals = totals.unwrap();
/// assert_eq!(totals.prompt_tokens, 5);
/// assert_eq!(totals.completion_tokens, 2);
/// assert_eq!(totals.total_tokens, 7);
/// ```
pub fn record_usage<S: UsageSource + ?Sized>(
    totals: &mut Option<UsageTotals>,
    usage: Option<&S>,
) -> Option<UsageTotals> {
    let report = normalize_usage(usage)?;
    let current = totals.get_or_insert_with(UsageTotals::default);
    if let Some(value) = report.prompt_tokens {
        current.prompt_tokens = current.prompt_tokens.saturating_add(value);
    }
    if let Some(value) = report.completion_tokens {
        current.completion_tokens = current.completion_tokens.saturating_add(value);
    }
    if let Some(value) = report.total_tokens {
        current.total_tokens = current.total_tokens.saturating_add(value);
    }
    Some(*current)
}
