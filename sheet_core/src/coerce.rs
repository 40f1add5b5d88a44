//! Defensive coercion of schemaless record fields
//!
//! Records come from a host document store that does not enforce a schema.
//! Every numeric read goes through [`coerce_number`]:
//! - missing / null -> 0
//! - numbers -> themselves
//! - strings -> leading number (`"+3 ranks"` -> 3), otherwise 0
//! - objects -> their `value` field (the `{value, max}` pool shape)
//!
//! Nothing here fails; unparseable input is logged at trace level and read as 0.

use serde_json::Value;

/// Extract the leading number of a string, returning it with the unparsed remainder.
///
/// Accepts an optional sign, digits and an optional fractional part.
/// Leading whitespace is skipped.
pub fn leading_number(s: &str) -> Option<(f64, &str)> {
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            has_digits = true;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }

    let number = trimmed[..end].parse::<f64>().ok()?;
    Some((number, &trimmed[end..]))
}

/// Coerce an optional record field to a number
pub fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => match leading_number(s) {
            Some((n, _)) if n.is_finite() => n,
            _ => {
                tracing::trace!(raw = %s, "non-numeric string coerced to 0");
                0.0
            }
        },
        Some(Value::Object(map)) => coerce_number(map.get("value")),
        Some(other) => {
            tracing::trace!(raw = %other, "non-numeric value coerced to 0");
            0.0
        }
    }
}

/// Coerce a named field of an object record
pub fn number_field(record: &Value, field: &str) -> f64 {
    coerce_number(record.get(field))
}

/// Coerce a field to a boolean. Strings `"true"`/`"1"`/`"yes"` and non-zero numbers are true.
pub fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        Some(Value::Object(map)) => coerce_bool(map.get("value")),
        _ => false,
    }
}

/// Read a field as a string, accepting numbers as well
pub fn string_field(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_leading_number_variants() {
        assert_eq!(leading_number("12"), Some((12.0, "")));
        assert_eq!(leading_number(" +3 ranks"), Some((3.0, " ranks")));
        assert_eq!(leading_number("-2.5abc"), Some((-2.5, "abc")));
        assert_eq!(leading_number(".5"), Some((0.5, "")));
        assert_eq!(leading_number("7."), Some((7.0, ".")));
        assert_eq!(leading_number("abc"), None);
        assert_eq!(leading_number("-"), None);
        assert_eq!(leading_number(""), None);
    }

    #[test]
    fn test_coerce_missing_and_null() {
        assert_eq!(coerce_number(None), 0.0);
        assert_eq!(coerce_number(Some(&Value::Null)), 0.0);
    }

    #[test]
    fn test_coerce_strings_and_pools() {
        assert_eq!(coerce_number(Some(&json!("4d"))), 4.0);
        assert_eq!(coerce_number(Some(&json!("none"))), 0.0);
        assert_eq!(coerce_number(Some(&json!({"value": "9", "max": 12}))), 9.0);
        assert_eq!(coerce_number(Some(&json!([1, 2]))), 0.0);
        assert_eq!(coerce_number(Some(&json!(true))), 0.0);
    }

    #[test]
    fn test_coerce_bool() {
        assert!(coerce_bool(Some(&json!(true))));
        assert!(coerce_bool(Some(&json!("Yes"))));
        assert!(coerce_bool(Some(&json!(1))));
        assert!(!coerce_bool(Some(&json!("no"))));
        assert!(!coerce_bool(None));
    }

    proptest! {
        #[test]
        fn coerce_never_panics(s in ".*") {
            let v = coerce_number(Some(&Value::String(s)));
            prop_assert!(v.is_finite());
        }

        #[test]
        fn integers_round_trip_through_strings(n in -100_000i64..100_000) {
            let v = coerce_number(Some(&Value::String(format!("{n} points"))));
            prop_assert_eq!(v, n as f64);
        }
    }
}
