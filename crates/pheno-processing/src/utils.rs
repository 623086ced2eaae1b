//! Shared value-parsing helpers used across the cleaning stages.

use polars::prelude::DataType;

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 4] = [',', '%', '\u{a0}', ' '];

/// Common error/missing value markers in exported spreadsheets.
pub const ERROR_MARKERS: [&str; 9] = [
    "error", "unknown", "n/a", "na", "null", "none", "missing", "nan", "#n/a",
];

/// Clean a string for numeric parsing by removing formatting characters.
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is an error/missing value marker.
pub fn is_error_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    ERROR_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles thousands separators and stray percent signs; returns `None`
/// for empty strings, error markers, and anything else that will not parse.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || is_error_marker(trimmed) {
        return None;
    }
    let cleaned = clean_numeric_string(trimmed);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}
