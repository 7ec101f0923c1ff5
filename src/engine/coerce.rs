//! Best-effort type coercion
//!
//! Only consulted when `coerce_types` is set and a value matches none of a
//! node's kinds. A `None` return means the original type error stands.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Number, Value};

use crate::schema::{Kind, StringRules};

fn number_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?\s*$").expect("valid number regex"))
}

fn integer_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-+]?\d+(\.\d*)?\s*$").expect("valid integer regex"))
}

/// Convert `value` into the shape of `kind`, if a rule covers the pair
pub fn coerce(value: &Value, kind: &Kind) -> Option<Value> {
    match kind {
        Kind::String(rules) => to_string(value, rules),
        Kind::Number(_) => to_number(value),
        Kind::Integer(_) => to_integer(value),
        Kind::Boolean => to_boolean(value),
        Kind::Array(_) => to_array(value),
        Kind::Object(_) => to_object(value),
        Kind::Null | Kind::Custom(_) => None,
    }
}

fn to_string(value: &Value, rules: &StringRules) -> Option<Value> {
    match value {
        Value::Number(n) => match rules.format.as_deref() {
            Some("date-time") => epoch_millis(n).map(|dt| Value::String(dt.to_rfc3339())),
            Some("date") => epoch_millis(n).map(|dt| Value::String(dt.format("%Y-%m-%d").to_string())),
            _ => Some(Value::String(n.to_string())),
        },
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

/// Numbers headed for date formats are read as epoch milliseconds
fn epoch_millis(n: &Number) -> Option<DateTime<Utc>> {
    let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp_millis(millis)
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if number_literal().is_match(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
        }
        Value::Bool(b) => Some(Value::from(u8::from(*b))),
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if integer_literal().is_match(s) => {
            let truncated = s.trim().parse::<f64>().ok()?.trunc();
            if truncated.abs() > i64::MAX as f64 {
                return None;
            }
            Some(Value::from(truncated as i64))
        }
        Value::Bool(b) => Some(Value::from(u8::from(*b))),
        _ => None,
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
        _ => None,
    }
}

fn to_array(value: &Value) -> Option<Value> {
    let Value::String(s) = value else { return None };
    if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(s) {
        return Some(parsed);
    }
    if s.trim().is_empty() {
        return Some(Value::Array(Vec::new()));
    }
    Some(Value::Array(
        s.split(',').map(|part| Value::String(part.trim().to_string())).collect(),
    ))
}

fn to_object(value: &Value) -> Option<Value> {
    let Value::String(s) = value else { return None };
    match serde_json::from_str::<Value>(s) {
        Ok(parsed @ Value::Object(_)) => Some(parsed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArrayRules, NumberRules, ObjectRules};
    use serde_json::json;

    fn string_kind(format: Option<&str>) -> Kind {
        Kind::String(StringRules {
            format: format.map(str::to_string),
            ..StringRules::default()
        })
    }

    #[test]
    fn test_string_to_numbers() {
        let number = Kind::Number(NumberRules::default());
        let integer = Kind::Integer(NumberRules::default());
        assert_eq!(coerce(&json!("42"), &number), Some(json!(42)));
        assert_eq!(coerce(&json!(" 2.5 "), &number), Some(json!(2.5)));
        assert_eq!(coerce(&json!("1e3"), &number), Some(json!(1000.0)));
        assert_eq!(coerce(&json!("abc"), &number), None);
        assert_eq!(coerce(&json!("42"), &integer), Some(json!(42)));
        assert_eq!(coerce(&json!("42.9"), &integer), Some(json!(42)));
        assert_eq!(coerce(&json!("-3"), &integer), Some(json!(-3)));
        assert_eq!(coerce(&json!("4x"), &integer), None);
        assert_eq!(coerce(&json!(true), &integer), Some(json!(1)));
    }

    #[test]
    fn test_booleans() {
        assert_eq!(coerce(&json!("YES"), &Kind::Boolean), Some(json!(true)));
        assert_eq!(coerce(&json!("0"), &Kind::Boolean), Some(json!(false)));
        assert_eq!(coerce(&json!("maybe"), &Kind::Boolean), None);
        assert_eq!(coerce(&json!(2), &Kind::Boolean), Some(json!(true)));
        assert_eq!(coerce(&json!(false), &string_kind(None)), Some(json!("false")));
    }

    #[test]
    fn test_structured_strings() {
        let array = Kind::Array(ArrayRules::default());
        let object = Kind::Object(ObjectRules::default());
        assert_eq!(coerce(&json!("[1, 2]"), &array), Some(json!([1, 2])));
        assert_eq!(coerce(&json!("a, b,c"), &array), Some(json!(["a", "b", "c"])));
        assert_eq!(coerce(&json!(""), &array), Some(json!([])));
        assert_eq!(coerce(&json!("{\"a\": 1}"), &object), Some(json!({ "a": 1 })));
        assert_eq!(coerce(&json!("[1]"), &object), None);
    }

    #[test]
    fn test_dates_from_epoch_millis() {
        assert_eq!(
            coerce(&json!(0), &string_kind(Some("date-time"))),
            Some(json!("1970-01-01T00:00:00+00:00"))
        );
        assert_eq!(
            coerce(&json!(86_400_000), &string_kind(Some("date"))),
            Some(json!("1970-01-02"))
        );
        assert_eq!(coerce(&json!(12), &string_kind(None)), Some(json!("12")));
    }

    #[test]
    fn test_uncovered_pairs() {
        assert_eq!(coerce(&json!({}), &Kind::Boolean), None);
        assert_eq!(coerce(&json!("x"), &Kind::Null), None);
        assert_eq!(coerce(&json!("x"), &Kind::Custom("money".into())), None);
    }
}
