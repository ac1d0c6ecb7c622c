//! Lenient scalar coercion for tabular cells.
//!
//! Nothing here fails: unparsable numbers become `NaN` and unparsable dates
//! fall back to the raw text, so a single bad cell never sinks a row.

use chrono::{Days, NaiveDate};
use serde_json::Value;

/// Serial 60 is the phantom 1900-02-29 of the legacy spreadsheet calendar.
const PHANTOM_LEAP_DAY: i64 = 60;

/// Render a scalar the way a spreadsheet user would read it.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Parse a float from a cell, reading the longest numeric prefix.
///
/// `"12.5abc"` gives 12.5, `"abc"` gives `NaN`. Numbers pass through.
pub fn safe_parse_float(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_float_prefix(s),
        _ => f64::NAN,
    }
}

/// Parse an integer from a cell, truncating toward zero.
///
/// Returned as `f64` so that a failed parse can be carried as `NaN`.
pub fn safe_parse_int(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(f64::trunc).unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_int_prefix(s),
        _ => f64::NAN,
    }
}

/// Convert a spreadsheet serial date to `YYYY-MM-DD`.
///
/// Serials count days from 1899-12-31, and the spreadsheet calendar has a
/// 1900-02-29 that never existed, so every serial after it is one day late.
/// Anything that is not a usable serial comes back as its own text.
pub fn excel_date_to_string(value: &Value) -> String {
    let serial = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    serial
        .and_then(serial_to_date)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| scalar_to_string(value))
}

fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial.abs() > i64::MAX as f64 {
        return None;
    }
    let days = serial.trunc() as i64;

    let epoch = if days < PHANTOM_LEAP_DAY {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };

    if days >= 0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// Length of the leading `[+-]digits[.digits]` run, starting at `start`.
fn scan_decimal(bytes: &[u8], start: usize, allow_fraction: bool) -> (usize, bool) {
    let mut end = start;
    let mut seen_digit = false;

    if matches!(bytes.get(end), Some(b'+' | b'-')) {
        end += 1;
    }
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
        seen_digit = true;
    }
    if allow_fraction && bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
            seen_digit = true;
        }
    }

    (end, seen_digit)
}

fn parse_float_prefix(input: &str) -> f64 {
    let s = input.trim_start();
    let unsigned = s.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") && s.len() - unsigned.len() <= 1 {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let bytes = s.as_bytes();
    let (mut end, seen_digit) = scan_decimal(bytes, 0, true);
    if !seen_digit {
        return f64::NAN;
    }

    // Exponent only counts when digits follow it.
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let (exp_end, exp_digits) = scan_decimal(bytes, end + 1, false);
        if exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

fn parse_int_prefix(input: &str) -> f64 {
    let s = input.trim_start();
    let (end, seen_digit) = scan_decimal(s.as_bytes(), 0, false);
    if !seen_digit {
        return f64::NAN;
    }
    s[..end].parse::<f64>().map(f64::trunc).unwrap_or(f64::NAN)
}
