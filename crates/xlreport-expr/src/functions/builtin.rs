//! Language builtins: logic, lookup, comparison and printing

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::{ExprError, ExprResult};
use crate::functions::printf::sprintf;
use crate::value::{as_integer, compare, print_value, truth, type_name, values_equal};

/// AND: the first false argument, or the last one
pub fn fn_and(args: &[Value]) -> ExprResult<Value> {
    for arg in args {
        if !truth(arg) {
            return Ok(arg.clone());
        }
    }
    Ok(args.last().cloned().unwrap_or(Value::Null))
}

/// OR: the first true argument, or the last one
pub fn fn_or(args: &[Value]) -> ExprResult<Value> {
    for arg in args {
        if truth(arg) {
            return Ok(arg.clone());
        }
    }
    Ok(args.last().cloned().unwrap_or(Value::Null))
}

pub fn fn_not(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::Bool(!args.first().map_or(false, truth)))
}

/// LEN of a string (in bytes), array or map
pub fn fn_len(args: &[Value]) -> ExprResult<Value> {
    let value = args
        .first()
        .ok_or_else(|| ExprError::Argument("len requires 1 argument".into()))?;
    match value {
        Value::String(s) => Ok(Value::from(s.len())),
        Value::Array(a) => Ok(Value::from(a.len())),
        Value::Object(m) => Ok(Value::from(m.len())),
        other => Err(ExprError::Argument(format!(
            "len of type {}",
            type_name(other)
        ))),
    }
}

/// INDEX: `index x 1 2` is `x[1][2]`; map keys are strings
pub fn fn_index(args: &[Value]) -> ExprResult<Value> {
    let (item, indexes) = args
        .split_first()
        .ok_or_else(|| ExprError::Argument("index requires an item".into()))?;

    let mut current = item;
    for index in indexes {
        current = match current {
            Value::Array(items) => {
                let i = as_integer(index).ok_or_else(|| {
                    ExprError::Argument(format!(
                        "cannot index array with {}",
                        type_name(index)
                    ))
                })?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .ok_or_else(|| ExprError::Evaluation(format!("index out of range: {}", i)))?
            }
            Value::Object(map) => match index {
                Value::String(key) => match map.get(key) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                },
                other => {
                    return Err(ExprError::Argument(format!(
                        "cannot index map with {}",
                        type_name(other)
                    )))
                }
            },
            Value::Null => return Err(ExprError::Evaluation("index of untyped nil".into())),
            other => {
                return Err(ExprError::Evaluation(format!(
                    "can't index item of type {}",
                    type_name(other)
                )))
            }
        };
    }
    Ok(current.clone())
}

/// EQ: whether the first argument equals any of the others
pub fn fn_eq(args: &[Value]) -> ExprResult<Value> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| ExprError::Argument("eq requires 2 arguments".into()))?;
    for other in rest {
        if values_equal(first, other)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

pub fn fn_ne(args: &[Value]) -> ExprResult<Value> {
    let (a, b) = pair(args, "ne")?;
    Ok(Value::Bool(!values_equal(a, b)?))
}

pub fn fn_lt(args: &[Value]) -> ExprResult<Value> {
    ordered(args, "lt", |o| o == Ordering::Less)
}

pub fn fn_le(args: &[Value]) -> ExprResult<Value> {
    ordered(args, "le", |o| o != Ordering::Greater)
}

pub fn fn_gt(args: &[Value]) -> ExprResult<Value> {
    ordered(args, "gt", |o| o == Ordering::Greater)
}

pub fn fn_ge(args: &[Value]) -> ExprResult<Value> {
    ordered(args, "ge", |o| o != Ordering::Less)
}

fn pair<'a>(args: &'a [Value], name: &str) -> ExprResult<(&'a Value, &'a Value)> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(ExprError::Argument(format!("{} requires 2 arguments", name))),
    }
}

fn ordered(args: &[Value], name: &str, test: fn(Ordering) -> bool) -> ExprResult<Value> {
    let (a, b) = pair(args, name)?;
    Ok(Value::Bool(test(compare(a, b)?)))
}

/// PRINT: operands printed back to back, with a space between two
/// operands when neither is a string
pub fn fn_print(args: &[Value]) -> ExprResult<Value> {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !args[i - 1].is_string() && !arg.is_string() {
            out.push(' ');
        }
        out.push_str(&print_value(arg));
    }
    Ok(Value::String(out))
}

pub fn fn_printf(args: &[Value]) -> ExprResult<Value> {
    let (format, rest) = args
        .split_first()
        .ok_or_else(|| ExprError::Argument("printf requires a format".into()))?;
    let format = format.as_str().ok_or_else(|| {
        ExprError::Argument(format!(
            "printf format must be a string, got {}",
            type_name(format)
        ))
    })?;
    Ok(Value::String(sprintf(format, rest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_and_or_not() {
        assert_eq!(fn_and(&[json!(1), json!(""), json!(2)]).unwrap(), json!(""));
        assert_eq!(fn_and(&[json!(1), json!(2)]).unwrap(), json!(2));
        assert_eq!(fn_or(&[json!(0), json!("x"), json!(2)]).unwrap(), json!("x"));
        assert_eq!(fn_or(&[json!(0), json!(null)]).unwrap(), json!(null));
        assert_eq!(fn_not(&[json!([])]).unwrap(), json!(true));
    }

    #[test]
    fn test_len() {
        assert_eq!(fn_len(&[json!("héllo")]).unwrap(), json!(6));
        assert_eq!(fn_len(&[json!([1, 2, 3])]).unwrap(), json!(3));
        assert_eq!(fn_len(&[json!({"a": 1})]).unwrap(), json!(1));
        assert!(fn_len(&[json!(5)]).is_err());
        assert!(fn_len(&[Value::Null]).is_err());
    }

    #[test]
    fn test_index() {
        let data = json!({"Rows": [[1, 2], [3, 4]], "Names": {"a": "x"}});
        assert_eq!(
            fn_index(&[data.clone(), json!("Rows"), json!(1), json!(0)]).unwrap(),
            json!(3)
        );
        assert_eq!(
            fn_index(&[data.clone(), json!("Names"), json!("a")]).unwrap(),
            json!("x")
        );
        assert_eq!(
            fn_index(&[data.clone(), json!("Nope")]).unwrap(),
            Value::Null
        );
        assert!(fn_index(&[json!([1]), json!(1)]).is_err());
        assert!(fn_index(&[json!([1]), json!(-1)]).is_err());
        assert!(fn_index(&[Value::Null, json!(0)]).is_err());
        assert_eq!(fn_index(&[json!(7)]).unwrap(), json!(7));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(fn_eq(&[json!(1), json!(2), json!(1)]).unwrap(), json!(true));
        assert_eq!(fn_eq(&[json!("a"), json!("b")]).unwrap(), json!(false));
        assert_eq!(fn_ne(&[json!("a"), json!("b")]).unwrap(), json!(true));
        assert_eq!(fn_lt(&[json!(1), json!(2.5)]).unwrap(), json!(true));
        assert_eq!(fn_le(&[json!(2), json!(2)]).unwrap(), json!(true));
        assert_eq!(fn_gt(&[json!("b"), json!("a")]).unwrap(), json!(true));
        assert_eq!(fn_ge(&[json!(1), json!(2)]).unwrap(), json!(false));
        assert!(fn_lt(&[json!(1), json!("2")]).is_err());
    }

    #[test]
    fn test_print() {
        assert_eq!(
            fn_print(&[json!("a"), json!(1), json!(2), json!("b")]).unwrap(),
            json!("a1 2b")
        );
        assert_eq!(fn_print(&[]).unwrap(), json!(""));
    }

    #[test]
    fn test_printf_requires_string_format() {
        assert!(fn_printf(&[json!(1)]).is_err());
        assert_eq!(
            fn_printf(&[json!("%s-%d"), json!("a"), json!(3)]).unwrap(),
            json!("a-3")
        );
    }
}
