//! `fdate`: time formatting
//!
//! Layouts are either strftime patterns (anything containing `%`) or
//! reference-time layouts written against `Mon Jan 2 15:04:05 MST 2006`,
//! e.g. `02.01.2006 15:04`.
//!
//! Notes:
//! - Times without an offset are taken as UTC.
//! - Numbers are unix seconds.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::{ExprError, ExprResult};
use crate::value::{as_float, as_integer, type_name};

/// Reference-layout tokens and their strftime equivalents, longest first
/// where one token is a prefix of another
const LAYOUT_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Jan", "%b"),
    ("Monday", "%A"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("2006", "%Y"),
    ("-07:00:00", "%::z"),
    ("-07:00", "%:z"),
    ("-0700", "%z"),
    ("Z07:00", "%:z"),
    ("Z0700", "%z"),
    (".000000000", "%.9f"),
    (".000000", "%.6f"),
    (".000", "%.3f"),
    ("01", "%m"),
    ("02", "%d"),
    ("_2", "%e"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%P"),
    ("1", "%-m"),
    ("2", "%-d"),
    ("3", "%-I"),
    ("4", "%-M"),
    ("5", "%-S"),
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Translate a reference-time layout into a strftime pattern
pub fn layout_to_strftime(layout: &str) -> String {
    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    'outer: while let Some(c) = rest.chars().next() {
        for (token, spec) in LAYOUT_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}

/// Format a time with either layout flavour
pub fn format_time(layout: &str, time: &DateTime<FixedOffset>) -> ExprResult<String> {
    let pattern = if layout.contains('%') {
        layout.to_string()
    } else {
        layout_to_strftime(layout)
    };

    let items: Vec<Item<'_>> = StrftimeItems::new(&pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(ExprError::Argument(format!("invalid date layout {:?}", layout)));
    }

    let mut out = String::new();
    write!(out, "{}", time.format_with_items(items.iter()))
        .map_err(|_| ExprError::Evaluation(format!("cannot format time with {:?}", layout)))?;
    Ok(out)
}

/// Interpret a data value as a point in time
pub fn parse_time(value: &Value) -> ExprResult<DateTime<FixedOffset>> {
    match value {
        Value::String(s) => parse_time_str(s.trim()),
        Value::Number(_) => {
            let (secs, nanos) = match as_integer(value) {
                Some(secs) => (secs, 0),
                None => {
                    let f = as_float(value).unwrap_or(0.0);
                    let secs = f.floor();
                    (secs as i64, ((f - secs) * 1e9) as u32)
                }
            };
            Utc.timestamp_opt(secs, nanos)
                .single()
                .map(|t| t.fixed_offset())
                .ok_or_else(|| ExprError::Argument(format!("timestamp {} out of range", secs)))
        }
        other => Err(ExprError::Argument(format!(
            "fdate expects a time, got {}",
            type_name(other)
        ))),
    }
}

fn parse_time_str(s: &str) -> ExprResult<DateTime<FixedOffset>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t);
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| ExprError::Argument(format!("cannot parse time {:?}", s)))?;

    let utc = FixedOffset::east_opt(0)
        .ok_or_else(|| ExprError::Evaluation("zero offset unavailable".into()))?;
    Ok(utc.from_utc_datetime(&naive))
}

/// FDATE: `fdate layout time`
pub fn fn_fdate(args: &[Value]) -> ExprResult<Value> {
    let layout = match args.first() {
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(ExprError::Argument(format!(
                "fdate layout must be a string, got {}",
                type_name(other)
            )))
        }
        None => return Err(ExprError::Argument("fdate requires a layout".into())),
    };
    let time = parse_time(args.get(1).unwrap_or(&Value::Null))?;
    Ok(Value::String(format_time(layout, &time)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_layout_translation() {
        assert_eq!(layout_to_strftime("02.01.2006 15:04:05"), "%d.%m.%Y %H:%M:%S");
        assert_eq!(layout_to_strftime("Jan 2, 2006"), "%b %-d, %Y");
        assert_eq!(layout_to_strftime("Monday 3PM"), "%A %-I%p");
        assert_eq!(
            layout_to_strftime("2006-01-02T15:04:05.000-07:00"),
            "%Y-%m-%dT%H:%M:%S%.3f%:z"
        );
        assert_eq!(layout_to_strftime("at 02%"), "at %d%%");
    }

    #[test]
    fn test_fdate_reference_layout() {
        let out = fn_fdate(&[
            json!("02.01.2006 15:04:05"),
            json!("2023-07-04T09:05:03+03:00"),
        ])
        .unwrap();
        assert_eq!(out, json!("04.07.2023 09:05:03"));

        let out = fn_fdate(&[json!("January 2, 2006"), json!("2024-02-29")]).unwrap();
        assert_eq!(out, json!("February 29, 2024"));
    }

    #[test]
    fn test_fdate_strftime_layout() {
        let out = fn_fdate(&[json!("%Y/%m/%d %H:%M"), json!("15.03.2022 18:30:00")])
            .unwrap();
        assert_eq!(out, json!("2022/03/15 18:30"));
    }

    #[test]
    fn test_fdate_unix_seconds() {
        let out = fn_fdate(&[json!("2006-01-02 15:04:05"), json!(86_400)]).unwrap();
        assert_eq!(out, json!("1970-01-02 00:00:00"));
    }

    #[test]
    fn test_fdate_errors() {
        assert!(fn_fdate(&[json!("02.01.2006"), json!("yesterday")]).is_err());
        assert!(fn_fdate(&[json!("02.01.2006"), Value::Null]).is_err());
        assert!(fn_fdate(&[json!(1), json!("2024-01-01")]).is_err());
        assert!(fn_fdate(&[json!("%Q"), json!("2024-01-01")]).is_err());
    }
}
