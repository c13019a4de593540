//! Cron expression evaluation.
//!
//! Only standard 5-field expressions (minute, hour, day of month, month,
//! day of week) are accepted. Occurrences are computed with `croner` and are
//! always strictly after the reference instant.

use chrono::{DateTime, Utc};

/// Errors from cron evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CronError {
    #[error("invalid cron expression: '{0}'")]
    InvalidExpression(String),
}

/// Number of occurrences shown by previews.
pub const PREVIEW_COUNT: usize = 5;

fn parse(expr: &str) -> Result<croner::Cron, CronError> {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() != 5 {
        return Err(CronError::InvalidExpression(expr.to_string()));
    }
    trimmed
        .parse::<croner::Cron>()
        .map_err(|_| CronError::InvalidExpression(expr.to_string()))
}

/// True iff `expr` is a valid 5-field cron expression.
pub fn validate(expr: &str) -> bool {
    parse(expr).is_ok()
}

/// Smallest matching instant strictly greater than `from`.
pub fn next_after(expr: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
    let cron = parse(expr)?;
    cron.iter_after(from)
        .next()
        .ok_or_else(|| CronError::InvalidExpression(expr.to_string()))
}

/// First `n` occurrences after `from`, each chained from the previous one.
///
/// Returns an empty vector for an invalid expression; call [`validate`] first
/// to tell "invalid" apart from "no occurrences".
pub fn next_n(expr: &str, from: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
    let mut out = Vec::with_capacity(n);
    let mut cursor = from;
    for _ in 0..n {
        match next_after(expr, cursor) {
            Ok(next) => {
                out.push(next);
                cursor = next;
            }
            Err(_) => break,
        }
    }
    out
}
