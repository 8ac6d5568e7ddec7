use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Wire/storage encoding for datetime cells. Strings matching this exact
/// shape are revived back into `CellValue::DateTime` on read, which keeps
/// the JSON encoding reversible.
pub const DATETIME_ENCODING: &str = "%Y-%m-%dT%H:%M:%S";

/// Text values that count as empty regardless of surrounding whitespace.
const EMPTY_SENTINELS: &[&str] = &[
    "null",
    "undefined",
    "N/A",
    "n/a",
    "#N/A",
    "#VALUE!",
    "#REF!",
];

/// Excel day serials count from 1899-12-30 in the 1900 date system.
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    base.checked_add_signed(Duration::days(serial as i64))
}

/// A canonical cell value. After `normalize` a grid contains only these
/// kinds; there is no raw null and dates are true datetimes, not serials.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl CellValue {
    /// Parse free text (CSV fields, CLI input) into a typed cell.
    pub fn from_raw_text(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }

        if let Ok(num) = trimmed.parse::<f64>() {
            return CellValue::Number(num);
        }

        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, DATETIME_ENCODING) {
            return CellValue::DateTime(dt);
        }

        CellValue::Text(trimmed.to_string())
    }

    /// Canonicalize a cell. Idempotent: normalizing an already-normal cell
    /// returns it unchanged.
    ///
    /// Known-lossy heuristic: an integer-valued number in (1, 100000) is
    /// treated as an Excel day serial when the resulting year falls
    /// strictly inside (1900, 2100). The thresholds are load-bearing; do
    /// not tune them.
    pub fn normalize(self) -> Self {
        match self {
            CellValue::Empty => CellValue::Empty,
            CellValue::Bool(b) => CellValue::Bool(b),
            CellValue::DateTime(dt) => CellValue::DateTime(dt),
            CellValue::Number(n) => {
                if !n.is_finite() {
                    return CellValue::Empty;
                }
                if n > 1.0 && n < 100_000.0 && n.fract() == 0.0 {
                    if let Some(dt) = serial_to_datetime(n) {
                        if dt.year() > 1900 && dt.year() < 2100 {
                            return CellValue::DateTime(dt);
                        }
                    }
                }
                CellValue::Number(n)
            }
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || EMPTY_SENTINELS.contains(&trimmed) {
                    return CellValue::Empty;
                }
                if trimmed.starts_with('#') && trimmed.contains('!') {
                    return CellValue::Text(format!("Error: {trimmed}"));
                }
                if trimmed.starts_with('=') {
                    return CellValue::Text(format!("Formula: {trimmed}"));
                }
                CellValue::Text(trimmed.to_string())
            }
        }
    }

    /// The canonical non-empty rule: sentinel text and non-finite numbers
    /// count as empty; booleans and datetimes never do.
    pub fn is_non_empty(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                !trimmed.is_empty() && !EMPTY_SENTINELS.contains(&trimmed)
            }
            CellValue::Number(n) => n.is_finite(),
            CellValue::Bool(_) | CellValue::DateTime(_) => true,
        }
    }

    /// Stringification used for display, search, filter membership, and
    /// CSV export. Integer-valued numbers render without decimals.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::DateTime(dt) => dt.format(DATETIME_ENCODING).to_string(),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::DateTime(dt) => {
                serializer.serialize_str(&dt.format(DATETIME_ENCODING).to_string())
            }
        }
    }
}

/// Untagged wire shape; strings go through datetime revival.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireCell {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match WireCell::deserialize(deserializer)? {
            WireCell::Bool(b) => Ok(CellValue::Bool(b)),
            WireCell::Number(n) => Ok(CellValue::Number(n)),
            WireCell::Text(s) => {
                if s.is_empty() {
                    return Ok(CellValue::Empty);
                }
                if let Ok(dt) = NaiveDateTime::parse_from_str(&s, DATETIME_ENCODING) {
                    return Ok(CellValue::DateTime(dt));
                }
                Ok(CellValue::Text(s))
            }
        }
    }
}
