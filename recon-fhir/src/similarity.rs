//! String and date proximity primitives used by the matching rules.

use chrono::{DateTime, Utc};

/// Normalised Levenshtein similarity of two labels in `0.0..=1.0`.
///
/// Compares lower-cased, trimmed text. Either side empty scores `0.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let longest = a.chars().count().max(b.chars().count()) as f64;
    1.0 - strsim::levenshtein(&a, &b) as f64 / longest
}

/// Both timestamps present and on the same UTC calendar day.
pub fn same_day(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.date_naive() == b.date_naive(),
        _ => false,
    }
}

/// Both timestamps present and at most `days` apart.
pub fn within_days(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, days: i64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).num_seconds().abs() <= days * 86_400,
        _ => false,
    }
}

/// Closed ranges `[a_start, a_end]` and `[b_start, b_end]` intersect. A
/// missing end is treated as an instant at the start.
pub fn ranges_overlap(
    a_start: Option<DateTime<Utc>>,
    a_end: Option<DateTime<Utc>>,
    b_start: Option<DateTime<Utc>>,
    b_end: Option<DateTime<Utc>>,
) -> bool {
    let (Some(a_start), Some(b_start)) = (a_start, b_start) else {
        return false;
    };
    let a_end = a_end.unwrap_or(a_start).max(a_start);
    let b_end = b_end.unwrap_or(b_start).max(b_start);
    a_start <= b_end && b_start <= a_end
}

/// Relative difference of two numbers against their average.
pub fn within_relative(a: f64, b: f64, tolerance: f64) -> bool {
    let average = (a + b) / 2.0;
    if average == 0.0 {
        return a == b;
    }
    ((a - b) / average).abs() <= tolerance
}
