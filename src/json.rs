//! Document-model helpers for the canonical JSON codec.
//!
//! Fragments are built and read through `serde_json::Value`. The crate is
//! compiled with serde_json's `preserve_order` feature, so objects keep the
//! insertion order the writers use; identical trees therefore serialize to
//! byte-identical text.
//!
//! Non-finite scalars have no JSON number form. They are written as the
//! strings `"nan"`, `"inf"`, `"-inf"`, and the readers accept both those
//! strings and plain numbers everywhere a float is expected.

use serde_json::{Map, Number, Value};

use crate::error::{HgError, HgResult};

pub(crate) fn float_to_json(x: f64) -> Value {
    if x.is_nan() {
        Value::String("nan".to_string())
    } else if x.is_infinite() {
        if x > 0.0 {
            Value::String("inf".to_string())
        } else {
            Value::String("-inf".to_string())
        }
    } else {
        Number::from_f64(x)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String("nan".to_string()))
    }
}

pub(crate) fn float_from_json(value: &Value, context: &str) -> HgResult<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| HgError::json_format(format!("{} (number out of f64 range)", context))),
        Value::String(s) => match s.as_str() {
            "nan" => Ok(f64::NAN),
            "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            _ => Err(HgError::json_format(format!(
                "{} (expected a number or \"nan\"/\"inf\"/\"-inf\", got {:?})",
                context, s
            ))),
        },
        other => Err(HgError::json_format(format!(
            "{} (expected a number, got {})",
            context,
            kind_of(other)
        ))),
    }
}

pub(crate) fn usize_from_json(value: &Value, context: &str) -> HgResult<usize> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| HgError::json_format(format!("{} (expected a non-negative integer)", context)))
}

pub(crate) fn object<'a>(value: &'a Value, context: &str) -> HgResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| HgError::json_format(format!("{} (expected an object)", context)))
}

pub(crate) fn array<'a>(value: &'a Value, context: &str) -> HgResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| HgError::json_format(format!("{} (expected an array)", context)))
}

pub(crate) fn get<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    context: &str,
) -> HgResult<&'a Value> {
    obj.get(key)
        .ok_or_else(|| HgError::json_format(format!("{} (missing key {:?})", context, key)))
}

pub(crate) fn get_f64(obj: &Map<String, Value>, key: &str, context: &str) -> HgResult<f64> {
    float_from_json(get(obj, key, context)?, &format!("{}.{}", context, key))
}

pub(crate) fn get_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    context: &str,
) -> HgResult<&'a str> {
    get(obj, key, context)?
        .as_str()
        .ok_or_else(|| HgError::json_format(format!("{}.{} (expected a string)", context, key)))
}

/// Read the optional `"name"` key: absent or a string.
pub(crate) fn get_opt_name(obj: &Map<String, Value>, context: &str) -> HgResult<Option<String>> {
    get_opt_str(obj, "name", context)
}

pub(crate) fn get_opt_str(
    obj: &Map<String, Value>,
    key: &str,
    context: &str,
) -> HgResult<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(HgError::json_format(format!(
            "{}.{} (expected a string, got {})",
            context,
            key,
            kind_of(other)
        ))),
    }
}

/// Verify that an object holds all of `required` and nothing outside
/// `required` plus `optional`. Readers stay tolerant of key order but not of
/// stray keys.
pub(crate) fn check_keys(
    obj: &Map<String, Value>,
    required: &[&str],
    optional: &[&str],
    context: &str,
) -> HgResult<()> {
    for key in required {
        if !obj.contains_key(*key) {
            return Err(HgError::json_format(format!(
                "{} (missing key {:?})",
                context, key
            )));
        }
    }
    for key in obj.keys() {
        if !required.contains(&key.as_str()) && !optional.contains(&key.as_str()) {
            return Err(HgError::json_format(format!(
                "{} (unexpected key {:?})",
                context, key
            )));
        }
    }
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_finite_floats_round_trip_through_string_literals() {
        for (x, text) in [
            (f64::NAN, "nan"),
            (f64::INFINITY, "inf"),
            (f64::NEG_INFINITY, "-inf"),
        ] {
            let v = float_to_json(x);
            assert_eq!(v, Value::String(text.to_string()));
            let back = float_from_json(&v, "test").expect("parse literal");
            assert!(back.is_nan() == x.is_nan() && back.is_infinite() == x.is_infinite());
        }

        let v = float_to_json(3.5);
        assert_eq!(v, json!(3.5));
        assert_eq!(float_from_json(&v, "test").expect("parse number"), 3.5);
    }

    #[test]
    fn float_reader_rejects_arbitrary_strings_and_non_numbers() {
        assert!(float_from_json(&json!("wat"), "test").is_err());
        assert!(float_from_json(&json!(true), "test").is_err());
        assert!(float_from_json(&json!([1.0]), "test").is_err());
    }

    #[test]
    fn check_keys_flags_missing_and_stray_keys() {
        let value = json!({"entries": 1.0, "sum": 2.0});
        let obj = object(&value, "test").expect("object");
        assert!(check_keys(obj, &["entries", "sum"], &["name"], "Sum").is_ok());
        assert!(check_keys(obj, &["entries", "sum", "mean"], &[], "Sum").is_err());
        assert!(check_keys(obj, &["entries"], &[], "Sum").is_err());
    }
}
