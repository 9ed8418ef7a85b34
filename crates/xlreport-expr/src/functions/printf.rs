//! `printf` formatting
//!
//! Supports the verbs `v s q d f F e E g G t x X o b c` with the flags
//! `- + 0 space`, width and precision. Verb/argument mismatches and argument
//! count mismatches are reported inline (`%!d(string=x)`, `%!d(MISSING)`,
//! `%!(EXTRA int=1)`) rather than failing. A width above 1e6 or a precision
//! above `u16::MAX` is dropped and reported as `%!(BADWIDTH)` / `%!(BADPREC)`.

use serde_json::Value;

use crate::value::{as_float, as_integer, format_float, print_value, type_name};

const MAX_WIDTH: usize = 1_000_000;
/// Largest precision the std formatter accepts
const MAX_PRECISION: usize = u16::MAX as usize;

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    minus: bool,
    plus: bool,
    zero: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len() + 16);
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                '0' => spec.zero = true,
                ' ' => spec.space = true,
                '#' => {}
                _ => break,
            }
            chars.next();
        }
        spec.width = digits(&mut chars);
        if spec.width.is_some_and(|w| w > MAX_WIDTH) {
            out.push_str("%!(BADWIDTH)");
            spec.width = None;
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let precision = digits(&mut chars).unwrap_or(0);
            if precision > MAX_PRECISION {
                out.push_str("%!(BADPREC)");
            } else {
                spec.precision = Some(precision);
            }
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }

        match args.get(next_arg) {
            Some(arg) => {
                next_arg += 1;
                out.push_str(&format_arg(verb, &spec, arg));
            }
            None => out.push_str(&format!("%!{}(MISSING)", verb)),
        }
    }

    if next_arg < args.len() {
        out.push_str("%!(EXTRA ");
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|a| format!("{}={}", type_name(a), print_value(a)))
            .collect();
        out.push_str(&extra.join(", "));
        out.push(')');
    }

    out
}

fn digits<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(d as usize));
        chars.next();
    }
    value
}

fn format_arg(verb: char, spec: &Spec, arg: &Value) -> String {
    let body = match verb {
        'v' => truncate(print_value(arg), spec.precision),
        's' => truncate(print_value(arg), spec.precision),
        'q' => match arg {
            Value::String(s) => format!("{:?}", s),
            other => format!("{:?}", print_value(other)),
        },
        't' => match arg {
            Value::Bool(b) => b.to_string(),
            _ => return bad_verb(verb, arg),
        },
        'd' | 'x' | 'X' | 'o' | 'b' | 'c' => match (as_integer(arg), arg) {
            (Some(n), _) => {
                let magnitude = n.unsigned_abs();
                let digits = match verb {
                    'd' => magnitude.to_string(),
                    'x' => format!("{:x}", magnitude),
                    'X' => format!("{:X}", magnitude),
                    'o' => format!("{:o}", magnitude),
                    'b' => format!("{:b}", magnitude),
                    _ => {
                        return match u32::try_from(n).ok().and_then(char::from_u32) {
                            Some(c) => pad(c.to_string(), spec, false),
                            None => bad_verb(verb, arg),
                        }
                    }
                };
                return pad(signed(n < 0, digits, spec), spec, true);
            }
            (None, Value::String(s)) if verb == 'x' || verb == 'X' => {
                let hex: String = s.bytes().map(|b| format!("{:02x}", b)).collect();
                if verb == 'X' {
                    hex.to_uppercase()
                } else {
                    hex
                }
            }
            _ => return bad_verb(verb, arg),
        },
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => match as_float(arg) {
            Some(f) => {
                let digits = float_body(verb, f.abs(), spec.precision);
                return pad(signed(f.is_sign_negative() && f != 0.0, digits, spec), spec, true);
            }
            None => return bad_verb(verb, arg),
        },
        _ => return bad_verb(verb, arg),
    };
    pad(body, spec, false)
}

fn float_body(verb: char, f: f64, precision: Option<usize>) -> String {
    match verb {
        'f' | 'F' => format!("{:.*}", precision.unwrap_or(6), f),
        'e' | 'E' => {
            let s = go_exponent(&format!("{:.*e}", precision.unwrap_or(6), f));
            if verb == 'E' {
                s.to_uppercase()
            } else {
                s
            }
        }
        _ => {
            let rounded = match precision {
                Some(p) => format!("{:.*e}", p.max(1) - 1, f).parse().unwrap_or(f),
                None => f,
            };
            let s = format_float(rounded);
            if verb == 'G' {
                s.to_uppercase()
            } else {
                s
            }
        }
    }
}

/// `1.5e3` -> `1.5e+03`
fn go_exponent(s: &str) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s.to_string(),
    }
}

fn signed(negative: bool, digits: String, spec: &Spec) -> String {
    if negative {
        format!("-{}", digits)
    } else if spec.plus {
        format!("+{}", digits)
    } else if spec.space {
        format!(" {}", digits)
    } else {
        digits
    }
}

fn truncate(s: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s,
    }
}

fn pad(s: String, spec: &Spec, numeric: bool) -> String {
    let width = match spec.width {
        Some(w) => w,
        None => return s,
    };
    let len = s.chars().count();
    if len >= width {
        return s;
    }
    let fill = width - len;

    if spec.minus {
        format!("{}{}", s, " ".repeat(fill))
    } else if spec.zero && numeric {
        let sign_len = if s.starts_with(|c| c == '-' || c == '+' || c == ' ') {
            1
        } else {
            0
        };
        format!("{}{}{}", &s[..sign_len], "0".repeat(fill), &s[sign_len..])
    } else {
        format!("{}{}", " ".repeat(fill), s)
    }
}

fn bad_verb(verb: char, arg: &Value) -> String {
    format!("%!{}({}={})", verb, type_name(arg), print_value(arg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_basic_verbs() {
        assert_eq!(
            sprintf("%s/%v/%d", &[json!("a"), json!(1.5), json!(7)]),
            "a/1.5/7"
        );
        assert_eq!(sprintf("%t %q", &[json!(true), json!("x\"y")]), "true \"x\\\"y\"");
        assert_eq!(
            sprintf(
                "%x %X %o %b %c",
                &[json!(255), json!(255), json!(8), json!(5), json!(65)]
            ),
            "ff FF 10 101 A"
        );
        assert_eq!(sprintf("100%%", &[]), "100%");
    }

    #[test]
    fn test_floats() {
        assert_eq!(sprintf("%.2f", &[json!(12.346)]), "12.35");
        assert_eq!(sprintf("%f", &[json!(1)]), "1.000000");
        assert_eq!(sprintf("%.3e", &[json!(1234.56)]), "1.235e+03");
        assert_eq!(sprintf("%g", &[json!(0.5)]), "0.5");
        assert_eq!(sprintf("%.2f", &[json!(-0.5)]), "-0.50");
    }

    #[test]
    fn test_width_and_flags() {
        assert_eq!(
            sprintf("%5d|%-5d|%05d", &[json!(42), json!(42), json!(-42)]),
            "   42|42   |-0042"
        );
        assert_eq!(sprintf("%+d % d", &[json!(3), json!(3)]), "+3  3");
        assert_eq!(sprintf("%8.2f", &[json!(3.14159)]), "    3.14");
        assert_eq!(sprintf("%.3s", &[json!("abcdef")]), "abc");
        assert_eq!(sprintf("%-4s|", &[json!("ab")]), "ab  |");
    }

    #[test]
    fn test_mismatches() {
        assert_eq!(sprintf("%d", &[json!("x")]), "%!d(string=x)");
        assert_eq!(sprintf("%d %d", &[json!(1)]), "1 %!d(MISSING)");
        assert_eq!(sprintf("%d", &[json!(1), json!("a")]), "1%!(EXTRA string=a)");
        assert_eq!(sprintf("%d", &[json!(2.5)]), "%!d(float64=2.5)");
    }

    #[test]
    fn test_oversized_width_and_precision() {
        assert_eq!(sprintf("%.70000f", &[json!(1.5)]), "%!(BADPREC)1.500000");
        assert_eq!(sprintf("%.70000e|", &[json!(1.5)]), "%!(BADPREC)1.500000e+00|");
        assert_eq!(sprintf("%99999999999d", &[json!(7)]), "%!(BADWIDTH)7");
        assert_eq!(
            sprintf("%-99999999999s|%d", &[json!("a"), json!(2)]),
            "%!(BADWIDTH)a|2"
        );
        assert_eq!(sprintf("%.65535s", &[json!("ab")]), "ab");
        assert_eq!(sprintf("%12.3f", &[json!(2.0)]).len(), 12);
    }
}
