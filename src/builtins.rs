//! Built-in validators and manipulators.
//!
//! Everything here is registered through the same public
//! [`Registry::add_validator`] / [`Registry::add_manipulator`] calls available
//! to callers; the chain engine has no knowledge of these names.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Number, Value};

use crate::format::display_value;
use crate::operation::{FailWhen, ManipulatorOptions, ValidatorOptions};
use crate::registry::Registry;

type Predicate = fn(&Value, &[Value]) -> bool;
type Transform = fn(&Value, &[Value]) -> Value;

const VALIDATORS: &[(&str, Predicate, usize, &str)] = &[
    ("string", |v, _| v.is_string(), 0, "be a string"),
    ("number", |v, _| to_f64(v).is_some(), 0, "be numeric"),
    ("strict_number", |v, _| v.is_number(), 0, "be a number"),
    ("integer", |v, _| is_integer(v), 0, "be an integer"),
    ("strict_boolean", |v, _| v.is_boolean(), 0, "be true or false"),
    ("object", |v, _| v.is_object() || v.is_array(), 0, "be an object"),
    ("literal_object", |v, _| v.is_object(), 0, "be an object literal"),
    ("array", |v, _| v.is_array(), 0, "be an array"),
    ("null", |v, _| v.is_null(), 0, "be null"),
    ("empty", |v, _| is_empty(v), 0, "be empty"),
    (
        "less_than",
        |v, a| compare(v, a, |o| o == Ordering::Less),
        1,
        "be less than {1}",
    ),
    (
        "less_than_equal",
        |v, a| compare(v, a, |o| o != Ordering::Greater),
        1,
        "be less than or equal to {1}",
    ),
    (
        "greater_than",
        |v, a| compare(v, a, |o| o == Ordering::Greater),
        1,
        "be greater than {1}",
    ),
    (
        "greater_than_equal",
        |v, a| compare(v, a, |o| o != Ordering::Less),
        1,
        "be greater than or equal to {1}",
    ),
    ("between", |v, a| range(v, a, false), 2, "be between {1} and {2}"),
    ("within", |v, a| range(v, a, true), 2, "be within {1} and {2}"),
    ("equal", |v, a| a.first().is_some_and(|e| loose_equal(v, e)), 1, "equal {1}"),
    ("strict_equal", |v, a| a.first() == Some(v), 1, "equal {1}"),
    ("inside", inside, 1, "be inside an array"),
    ("have_property", have_property, 1, "have a `{1}` property"),
    ("have_own_property", have_own_property, 1, "have a `{1}` property"),
    ("date", |v, _| parse_date(v).is_some(), 0, "be a valid date"),
    ("match", matches_pattern, 1, "match an expression"),
    (
        "min_length",
        |v, a| length_against(v, a, |len, limit| len >= limit),
        1,
        "have a length of at least {1}",
    ),
    (
        "max_length",
        |v, a| length_against(v, a, |len, limit| len <= limit),
        1,
        "have a length of at most {1}",
    ),
];

/// Registers every built-in operation on `registry`.
///
/// Names already taken on the registry are skipped.
pub fn install(registry: &Registry) {
    for &(name, predicate, arity, message) in VALIDATORS {
        let options = ValidatorOptions::new(arity).fail_message(message);
        if let Err(error) = registry.add_validator(name, predicate, options) {
            tracing::debug!(%error, "skipping built-in validator");
        }
    }

    let manipulators: [(&str, Transform, ManipulatorOptions); 13] = [
        ("to_string", |v, _| Value::String(text(v)), ManipulatorOptions::new()),
        ("trim", |v, a| trim(v, a, true, true), ManipulatorOptions::new()),
        ("left_trim", |v, a| trim(v, a, true, false), ManipulatorOptions::new()),
        ("right_trim", |v, a| trim(v, a, false, true), ManipulatorOptions::new()),
        ("to_number", to_number, failing("be a number")),
        ("to_integer", to_integer, failing("be an integer")),
        ("to_float", to_float, failing("be a floating point number")),
        ("to_date", to_date, failing("be a valid date")),
        ("to_reg_exp", to_reg_exp, failing("be a regular expression")),
        ("to_boolean", |v, _| Value::Bool(truthy(v)), ManipulatorOptions::new()),
        ("lower_case", |v, _| map_str(v, str::to_lowercase), ManipulatorOptions::new()),
        ("upper_case", |v, _| map_str(v, str::to_uppercase), ManipulatorOptions::new()),
        ("default", default_to, ManipulatorOptions::new()),
    ];

    for (name, transform, options) in manipulators {
        if let Err(error) = registry.add_manipulator(name, transform, options) {
            tracing::debug!(%error, "skipping built-in manipulator");
        }
    }
}

fn failing(message: &str) -> ManipulatorOptions {
    ManipulatorOptions::new()
        .fail_when(FailWhen::value(Value::Null))
        .fail_message(message)
}

// ----- validator helpers -----

/// Numbers, and strings holding a finite number. Booleans never count.
fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => to_f64(left)?.partial_cmp(&to_f64(right)?),
    }
}

fn compare(value: &Value, args: &[Value], accept: impl Fn(Ordering) -> bool) -> bool {
    args.first()
        .and_then(|limit| ordering(value, limit))
        .is_some_and(accept)
}

fn range(value: &Value, args: &[Value], inclusive: bool) -> bool {
    let (Some(lower), Some(upper)) = (args.first(), args.get(1)) else {
        return false;
    };
    let (Some(low), Some(high)) = (ordering(value, lower), ordering(value, upper)) else {
        return false;
    };
    if inclusive {
        low != Ordering::Less && high != Ordering::Greater
    } else {
        low == Ordering::Greater && high == Ordering::Less
    }
}

fn inside(value: &Value, args: &[Value]) -> bool {
    match args.first() {
        Some(Value::Array(items)) => items.contains(value),
        _ => false,
    }
}

fn have_property(value: &Value, args: &[Value]) -> bool {
    let Some(key) = args.first() else {
        return false;
    };
    match (value, key) {
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        (Value::Array(items), key) => key
            .as_u64()
            .or_else(|| key.as_str().and_then(|s| s.parse().ok()))
            .is_some_and(|i| (i as usize) < items.len()),
        _ => false,
    }
}

/// Object keys only; array indices are not own properties here.
fn have_own_property(value: &Value, args: &[Value]) -> bool {
    match (value, args.first()) {
        (Value::Object(map), Some(Value::String(key))) => map.contains_key(key),
        _ => false,
    }
}

/// Deep equality where numbers and numeric strings compare by value.
fn loose_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| loose_equal(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(key, a)| r.get(key).is_some_and(|b| loose_equal(a, b)))
        }
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        _ if left == right => true,
        _ => matches!((to_f64(left), to_f64(right)), (Some(l), Some(r)) if l == r),
    }
}

/// Numbers are epoch milliseconds. Strings may be RFC 3339, RFC 2822, a
/// bare date, or a date and time without an offset (read as UTC).
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .or_else(|_| DateTime::parse_from_rfc2822(s))
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    DATE_TIME_FORMATS
                        .iter()
                        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                        .map(|naive| naive.and_utc())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                })
        }
        _ => None,
    }
}

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn matches_pattern(value: &Value, args: &[Value]) -> bool {
    let Some(pattern) = args.first().and_then(Value::as_str) else {
        return false;
    };
    let subject = match value {
        Value::String(s) => s.clone(),
        Value::Number(_) | Value::Bool(_) => display_value(value),
        _ => return false,
    };
    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(&subject),
        Err(error) => {
            tracing::warn!(pattern, %error, "invalid pattern never matches");
            false
        }
    }
}

fn length_against(value: &Value, args: &[Value], accept: impl Fn(u64, u64) -> bool) -> bool {
    let Some(limit) = args.first().and_then(Value::as_u64) else {
        return false;
    };
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => return false,
    };
    accept(len as u64, limit)
}

// ----- manipulator helpers -----

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => display_value(other),
    }
}

fn trim(value: &Value, args: &[Value], left: bool, right: bool) -> Value {
    let source = text(value);
    let chars: Option<Vec<char>> = args.first().and_then(Value::as_str).map(|s| s.chars().collect());
    let strip = |c: char| match &chars {
        Some(set) => set.contains(&c),
        None => c.is_whitespace(),
    };

    let mut out = source.as_str();
    if left {
        out = out.trim_start_matches(strip);
    }
    if right {
        out = out.trim_end_matches(strip);
    }
    Value::String(out.to_string())
}

/// Whole numbers become integers, everything else a float, NaN and
/// infinities `null`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn to_number(value: &Value, _: &[Value]) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::Bool(b) => Value::from(u8::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Value::from(i)
            } else {
                s.parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map_or(Value::Null, number_value)
            }
        }
        _ => Value::Null,
    }
}

fn to_integer(value: &Value, args: &[Value]) -> Value {
    let radix = match args.first() {
        None | Some(Value::Null) => 10,
        Some(arg) => match arg.as_u64().and_then(|r| u32::try_from(r).ok()) {
            Some(radix) if (2..=36).contains(&radix) => radix,
            _ => return Value::Null,
        },
    };
    match value {
        Value::Number(n) if radix == 10 => match n.as_i64() {
            Some(i) => Value::from(i),
            None => n.as_f64().map_or(Value::Null, |f| number_value(f.trunc())),
        },
        Value::Number(_) => integer_prefix(&display_value(value), radix),
        Value::String(s) => integer_prefix(s, radix),
        _ => Value::Null,
    }
}

/// Parses the longest leading integer in `radix`, ignoring leading
/// whitespace and trailing garbage.
fn integer_prefix(source: &str, radix: u32) -> Value {
    let s = source.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return Value::Null;
    }
    match i64::from_str_radix(&digits[..end], radix) {
        Ok(n) if negative => Value::from(-n),
        Ok(n) => Value::from(n),
        Err(_) => Value::Null,
    }
}

fn to_float(value: &Value, _: &[Value]) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => float_prefix(s.trim_start()).map_or(Value::Null, number_value),
        _ => Value::Null,
    }
}

/// Dates normalize to an RFC 3339 string in UTC; `null`, booleans, and
/// unparseable input fail.
fn to_date(value: &Value, _: &[Value]) -> Value {
    match value {
        Value::Null | Value::Bool(_) => Value::Null,
        other => parse_date(other).map_or(Value::Null, |date| {
            Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))
        }),
    }
}

/// Accepts a bare pattern or `/pattern/flags`. The `i`, `m`, and `s` flags
/// become inline flags; `g` and `y` have no regex counterpart and are
/// dropped. Patterns that fail to compile yield `null`.
fn to_reg_exp(value: &Value, _: &[Value]) -> Value {
    let Some(source) = value.as_str() else {
        return Value::Null;
    };
    let pattern = match slash_delimited(source) {
        Some((body, flags)) => {
            let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
            if inline.is_empty() {
                body.to_string()
            } else {
                format!("(?{}){}", inline, body)
            }
        }
        None => source.to_string(),
    };
    match Regex::new(&pattern) {
        Ok(_) => Value::String(pattern),
        Err(error) => {
            tracing::debug!(pattern = %pattern, %error, "not a regular expression");
            Value::Null
        }
    }
}

/// Splits `/body/flags` where flags are drawn from `gimsy`.
fn slash_delimited(source: &str) -> Option<(&str, &str)> {
    let inner = source.strip_prefix('/')?;
    let close = inner.rfind('/')?;
    let (body, flags) = (&inner[..close], &inner[close + 1..]);
    flags
        .chars()
        .all(|c| matches!(c, 'g' | 'i' | 'm' | 's' | 'y'))
        .then_some((body, flags))
}

/// Parses the longest leading decimal number, exponent included.
fn float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut has_digits = end > int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        if frac_end > frac_start || has_digits {
            has_digits = has_digits || frac_end > frac_start;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn map_str(value: &Value, f: fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        other => other.clone(),
    }
}

/// `default(fallback)` replaces `null`; `default(fallback, when)` replaces
/// values equal to `when`.
fn default_to(value: &Value, args: &[Value]) -> Value {
    let Some(fallback) = args.first() else {
        return value.clone();
    };
    let replace = match args.get(1) {
        Some(when) => when == value,
        None => value.is_null(),
    };
    if replace {
        fallback.clone()
    } else {
        value.clone()
    }
}
