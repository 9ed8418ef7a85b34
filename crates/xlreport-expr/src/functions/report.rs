//! Unit and money helpers for report cells
//!
//! Amounts arrive in base units (millimetres, grams, kopecks) and leave as
//! fixed-point text so the cell writer can store them as numbers.

use serde_json::Value;

use crate::error::{ExprError, ExprResult};
use crate::value::{as_float, float_value, type_name};

/// Round half away from zero to `decimals` places; never returns `-0`
pub fn round_half_away(v: f64, decimals: u32) -> f64 {
    let pow = 10f64.powi(decimals as i32);
    (v * pow).round() / pow + 0.0
}

fn number_arg(args: &[Value], position: usize, function: &str) -> ExprResult<f64> {
    let value = args.get(position).unwrap_or(&Value::Null);
    as_float(value).ok_or_else(|| {
        ExprError::Argument(format!(
            "{} expects a number, got {}",
            function,
            type_name(value)
        ))
    })
}

fn scaled(value: f64, divisor: f64, decimals: u32) -> Value {
    let rounded = round_half_away(value / divisor, decimals);
    Value::String(format!("{:.*}", decimals as usize, rounded))
}

/// NFMT: `value / base` as a float
pub fn fn_nfmt(args: &[Value]) -> ExprResult<Value> {
    let value = number_arg(args, 0, "nfmt")?;
    let base = number_arg(args, 1, "nfmt")?;
    if base == 0.0 {
        return Err(ExprError::Argument("nfmt base must not be zero".into()));
    }
    float_value(value / base)
}

/// Millimetres to metres, 2 places
pub fn fn_to_meters(args: &[Value]) -> ExprResult<Value> {
    Ok(scaled(number_arg(args, 0, "toMeters")?, 1_000.0, 2))
}

/// Kilograms to tonnes, 3 places
pub fn fn_to_tonnes(args: &[Value]) -> ExprResult<Value> {
    Ok(scaled(number_arg(args, 0, "toTonnes")?, 1_000.0, 3))
}

/// Millimetres to kilometres, 3 places
pub fn fn_to_kmeters(args: &[Value]) -> ExprResult<Value> {
    Ok(scaled(number_arg(args, 0, "toKMeters")?, 1_000_000.0, 3))
}

/// Kopecks to roubles, 2 places
pub fn fn_to_rubles(args: &[Value]) -> ExprResult<Value> {
    Ok(scaled(number_arg(args, 0, "toRubles")?, 100.0, 2))
}
