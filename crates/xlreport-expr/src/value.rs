//! Data values as seen by templates
//!
//! Templates run over `serde_json::Value` trees. This module holds the
//! printing, truth and comparison rules.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::{ExprError, ExprResult};

/// Text an action prints for a value
///
/// Strings are printed verbatim, integers without a fraction, floats in
/// shortest form, `null` as nothing, arrays as `[a b]` and objects as
/// `map[k:v]` with sorted keys.
pub fn print_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&i.to_string());
            } else if let Some(u) = n.as_u64() {
                out.push_str(&u.to_string());
            } else if let Some(f) = n.as_f64() {
                out.push_str(&format_float(f));
            }
        }
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push_str("map[");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_value(out, v);
                }
            }
            out.push(']');
        }
    }
}

/// Shortest representation of a float; exponent form outside `1e-4..1e21`
pub fn format_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    if !f.is_finite() {
        return if f.is_nan() {
            "NaN".to_string()
        } else if f > 0.0 {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        };
    }

    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if (-4..21).contains(&exp) {
        format!("{}", f)
    } else {
        format!(
            "{}e{}{:02}",
            mantissa,
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        )
    }
}

/// Whether a value counts as true in `if`, `with`, `and`, `or` and `not`
///
/// `false`, `0`, `null` and empty strings, arrays and objects are false.
pub fn truth(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float64",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// Integer value of a number; floats only when they have no fraction
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n,
        _ => return None,
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

pub(crate) fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Number value for a float result
pub(crate) fn float_value(f: f64) -> ExprResult<Value> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ExprError::Evaluation(format!("result {} is not a finite number", f)))
}

/// `eq` semantics for two basic values
pub(crate) fn values_equal(a: &Value, b: &Value) -> ExprResult<bool> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::Number(_), Value::Number(_)) => Ok(compare(a, b)? == Ordering::Equal),
        (Value::Array(_), _) | (Value::Object(_), _) | (_, Value::Array(_)) | (_, Value::Object(_)) => {
            Err(ExprError::Evaluation(format!(
                "non-comparable type {}",
                if matches!(a, Value::Array(_) | Value::Object(_)) {
                    type_name(a)
                } else {
                    type_name(b)
                }
            )))
        }
        _ => Err(ExprError::Evaluation(format!(
            "incompatible types for comparison: {} and {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

/// Ordering of two numbers or two strings
pub(crate) fn compare(a: &Value, b: &Value) -> ExprResult<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
                return Ok(i.cmp(&j));
            }
            let (f, g) = (x.as_f64(), y.as_f64());
            f.zip(g)
                .and_then(|(f, g)| f.partial_cmp(&g))
                .ok_or_else(|| ExprError::Evaluation("invalid number for comparison".into()))
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            Err(ExprError::Evaluation(format!(
                "incompatible types for comparison: {} and {}",
                type_name(a),
                type_name(b)
            )))
        }
        _ => Err(ExprError::Evaluation(format!(
            "invalid type for comparison: {}",
            if matches!(a, Value::Number(_) | Value::String(_)) {
                type_name(b)
            } else {
                type_name(a)
            }
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_print_value() {
        assert_eq!(print_value(&json!("text")), "text");
        assert_eq!(print_value(&json!(42)), "42");
        assert_eq!(print_value(&json!(-7)), "-7");
        assert_eq!(print_value(&json!(2.0)), "2");
        assert_eq!(print_value(&json!(1.25)), "1.25");
        assert_eq!(print_value(&json!(true)), "true");
        assert_eq!(print_value(&Value::Null), "");
        assert_eq!(print_value(&json!([1, "a", null])), "[1 a ]");
        assert_eq!(print_value(&json!({"b": 2, "a": [1]})), "map[a:[1] b:2]");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(123456789.5), "123456789.5");
        assert_eq!(format_float(1e21), "1e+21");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(0.0001), "0.0001");
    }

    #[test]
    fn test_truth() {
        assert!(!truth(&Value::Null));
        assert!(!truth(&json!(0)));
        assert!(!truth(&json!(0.0)));
        assert!(!truth(&json!("")));
        assert!(!truth(&json!([])));
        assert!(!truth(&json!({})));
        assert!(truth(&json!("0")));
        assert!(truth(&json!([0])));
        assert!(truth(&json!(-1)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(1), &json!(2)).unwrap(), Ordering::Less);
        assert_eq!(compare(&json!(2), &json!(1.5)).unwrap(), Ordering::Greater);
        assert_eq!(compare(&json!("b"), &json!("a")).unwrap(), Ordering::Greater);
        assert!(compare(&json!(1), &json!("1")).is_err());
        assert!(compare(&json!(true), &json!(false)).is_err());

        assert!(values_equal(&json!(1), &json!(1.0)).unwrap());
        assert!(values_equal(&Value::Null, &Value::Null).unwrap());
        assert!(!values_equal(&Value::Null, &json!("x")).unwrap());
        assert!(values_equal(&json!(1), &json!("1")).is_err());
        assert!(values_equal(&json!([1]), &json!([1])).is_err());
    }

    #[test]
    fn test_as_integer() {
        assert_eq!(as_integer(&json!(5)), Some(5));
        assert_eq!(as_integer(&json!(5.0)), Some(5));
        assert_eq!(as_integer(&json!(5.5)), None);
        assert_eq!(as_integer(&json!("5")), None);
    }
}
