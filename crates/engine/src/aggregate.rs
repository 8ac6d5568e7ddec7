//! Category aggregation for chart series.
//!
//! Buckets visible data rows by a category column, counting rows or
//! summing a numeric column, then ranks buckets and collapses the long
//! tail. All derivations are pure and return fresh values per call.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::cell::CellValue;
use crate::grid::Row;

/// At most this many named buckets; anything beyond collapses into
/// "Others" (or is dropped, see `aggregate`).
const TOP_CATEGORIES: usize = 8;

/// "Others" is emitted only while it stays below this share of the grand
/// total; a heavier tail is dropped from the output entirely.
const OTHERS_MAX_SHARE: f64 = 0.5;

/// A column qualifies as numeric when at least this share of its cells
/// parse to finite non-zero numbers.
const NUMERIC_COLUMN_THRESHOLD: f64 = 0.6;

pub const OTHERS_LABEL: &str = "Others";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
    Count,
    Sum,
}

/// One chart bucket. `display_label` is shortened for axes and legends;
/// `full_label` keeps the untruncated key for tooltips.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEntry {
    pub key: String,
    pub display_label: String,
    pub full_label: String,
    pub value: f64,
}

/// Bucket `rows` by the stringified category cell.
///
/// A row qualifies only if its category cell is non-empty; in sum mode the
/// parsed value at `numeric_col` must additionally be finite and non-zero.
/// A legitimate zero reading is therefore indistinguishable from a
/// non-numeric cell and is excluded from sums — a known limitation kept
/// for fidelity with the persisted behavior.
///
/// Buckets sort descending by value (key ascending as the deterministic
/// tie-break). With more than eight distinct keys, the top eight are kept
/// and the remainder collapses into "Others" — unless the remainder is at
/// least half the grand total, in which case the tail is dropped outright.
pub fn aggregate(
    rows: &[Row],
    category_col: usize,
    numeric_col: usize,
    mode: AggregateMode,
) -> Vec<SeriesEntry> {
    let mut totals: HashMap<String, f64> = HashMap::new();

    for row in rows {
        let Some(category) = row.get(category_col) else {
            continue;
        };
        if !category.is_non_empty() {
            continue;
        }
        let key = category.to_display_string();

        match mode {
            AggregateMode::Count => {
                *totals.entry(key).or_insert(0.0) += 1.0;
            }
            AggregateMode::Sum => {
                let value = row.get(numeric_col).map(cell_numeric).unwrap_or(0.0);
                if !value.is_finite() || value == 0.0 {
                    continue;
                }
                *totals.entry(key).or_insert(0.0) += value;
            }
        }
    }

    if totals.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<(String, f64)> = totals.into_iter().collect();
    sorted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let grand_total: f64 = sorted.iter().map(|(_, v)| v).sum();
    if sorted.len() > TOP_CATEGORIES {
        let tail: f64 = sorted[TOP_CATEGORIES..].iter().map(|(_, v)| v).sum();
        sorted.truncate(TOP_CATEGORIES);
        if tail > 0.0 && grand_total > 0.0 && tail / grand_total < OTHERS_MAX_SHARE {
            sorted.push((OTHERS_LABEL.to_string(), tail));
        }
    }

    sorted
        .into_iter()
        .map(|(key, value)| SeriesEntry {
            display_label: to_display_label(&key),
            full_label: key.clone(),
            key,
            value,
        })
        .collect()
}

/// Numeric coercion for aggregation: numbers pass through, booleans map
/// to 1/0, datetimes to epoch milliseconds, text through the heuristic
/// parse below.
pub fn cell_numeric(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Empty => 0.0,
        CellValue::Number(n) => *n,
        CellValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        CellValue::DateTime(dt) => dt.and_utc().timestamp_millis() as f64,
        CellValue::Text(s) => parse_numeric(s),
    }
}

/// Heuristic numeric parse for locale-ambiguous text.
///
/// Everything but digits, comma, dot, and minus is stripped. When both
/// separators appear, the rightmost one is the decimal point; a lone comma
/// is decimal only when it is the single comma within three characters of
/// the end; multiple dots with no comma are thousands separators. Minus
/// signs survive only in the leading position. Unparseable input is 0.
pub fn parse_numeric(input: &str) -> f64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let mut s: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    match (s.rfind(','), s.rfind('.')) {
        (Some(last_comma), Some(last_dot)) => {
            if last_comma > last_dot {
                // Comma is the decimal separator, dots are thousands.
                s = s.replace('.', "");
                s = s.replacen(',', ".", 1);
            } else {
                s = s.replace(',', "");
            }
        }
        (Some(last_comma), None) => {
            let decimal = s.matches(',').count() == 1 && s.len() - last_comma <= 3;
            if decimal {
                s = s.replace(',', ".");
            } else {
                s = s.replace(',', "");
            }
        }
        (None, Some(_)) => {
            if s.matches('.').count() > 1 {
                s = s.replace('.', "");
            }
        }
        (None, None) => {}
    }

    let s: String = s
        .chars()
        .enumerate()
        .filter(|&(i, c)| c != '-' || i == 0)
        .map(|(_, c)| c)
        .collect();

    match s.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Shorten a category key for axis/legend display: ten or more consecutive
/// digits keep only the last five behind an ellipsis; any other string
/// over twenty characters keeps the first seventeen.
pub fn to_display_label(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() >= 10 && chars.iter().all(|c| c.is_ascii_digit()) {
        let tail: String = chars[chars.len() - 5..].iter().collect();
        return format!("…{tail}");
    }
    if chars.len() > 20 {
        let head: String = chars[..17].iter().collect();
        return format!("{head}…");
    }
    trimmed.to_string()
}

/// Pick a numeric column for sum charts: the preferred column when it is
/// numeric-rich enough, else the first qualifying column after the
/// category column 0, else the preferred fallback.
pub fn detect_numeric_column(rows: &[Row], prefer: usize) -> usize {
    let is_mostly_numeric = |col: usize| {
        let mut numeric = 0usize;
        let mut total = 0usize;
        for row in rows {
            let Some(cell) = row.get(col) else {
                continue;
            };
            total += 1;
            let parsed = cell_numeric(cell);
            if parsed.is_finite() && parsed != 0.0 {
                numeric += 1;
            }
        }
        total > 0 && numeric as f64 / total as f64 >= NUMERIC_COLUMN_THRESHOLD
    };

    if is_mostly_numeric(prefer) {
        return prefer;
    }
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    (1..width).find(|&c| is_mostly_numeric(c)).unwrap_or(prefer)
}

/// Per-column summary over finite non-zero parsed values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Column statistics for every header column that has at least one
/// qualifying numeric value.
pub fn column_stats(headers: &[CellValue], rows: &[Row]) -> Vec<ColumnStats> {
    headers
        .iter()
        .enumerate()
        .filter_map(|(col, header)| {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|row| row.get(col).map(cell_numeric))
                .filter(|v| v.is_finite() && *v != 0.0)
                .collect();
            if values.is_empty() {
                return None;
            }
            let sum: f64 = values.iter().sum();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let column = if header.is_non_empty() {
                header.to_display_string()
            } else {
                format!("Column {}", col + 1)
            };
            Some(ColumnStats {
                column,
                count: values.len(),
                sum,
                avg: sum / values.len() as f64,
                min,
                max,
            })
        })
        .collect()
}

/// Axis-style number shortening: 1500 -> "1.5K", 2000000 -> "2M".
pub fn format_axis_number(n: f64) -> String {
    let abs = n.abs();
    let sign = if n < 0.0 { -1.0 } else { 1.0 };
    let fmt = |val: f64| {
        if val.fract() == 0.0 {
            format!("{}", val as i64)
        } else {
            let s = format!("{:.1}", val);
            s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
        }
    };
    if abs >= 1e12 {
        return format!("{}T", fmt(sign * abs / 1e12));
    }
    if abs >= 1e9 {
        return format!("{}B", fmt(sign * abs / 1e9));
    }
    if abs >= 1e6 {
        return format!("{}M", fmt(sign * abs / 1e6));
    }
    if abs >= 1e3 {
        return format!("{}K", fmt(sign * abs / 1e3));
    }
    fmt(n)
}
