//! Shallow, override-wins merging of configuration objects.
//!
//! Every top-level key present in the override replaces the default value
//! wholesale. Nested objects (margins, viewports) are never merged
//! recursively, so `{"margin": {"top": "10mm"}}` replaces all four sides.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Merge `overrides` onto `defaults`, returning the effective object.
pub fn merge(defaults: &Map<String, Value>, overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut effective = defaults.clone();
    for (key, value) in overrides {
        effective.insert(key.clone(), value.clone());
    }
    effective
}

/// Apply a JSON override object to a typed default value.
///
/// `Value::Null` counts as "no overrides". Any other non-object override is
/// rejected.
pub fn merge_typed<T>(defaults: &T, overrides: &Value) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let overrides = match overrides {
        Value::Null => return round_trip(defaults),
        Value::Object(map) => map,
        other => {
            return Err(Error::InvalidParameter(format!(
                "expected an object of overrides, got {}",
                type_name(other)
            )))
        }
    };

    let base = match serde_json::to_value(defaults)? {
        Value::Object(map) => map,
        _ => return Err(Error::Other("defaults did not serialize to an object".into())),
    };

    let effective = merge(&base, overrides);
    Ok(serde_json::from_value(Value::Object(effective))?)
}

fn round_trip<T>(value: &T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
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

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn empty_override_keeps_defaults() {
        let defaults = object(json!({"scale": 1, "format": "a4", "margin": {"top": "0mm"}}));
        assert_eq!(merge(&defaults, &Map::new()), defaults);
    }

    #[test]
    fn override_wins_per_top_level_key() {
        let defaults = object(json!({"scale": 1, "format": "a4"}));
        let effective = merge(&defaults, &object(json!({"scale": 0.5})));
        assert_eq!(Value::Object(effective), json!({"scale": 0.5, "format": "a4"}));
    }

    #[test]
    fn nested_objects_are_replaced_not_merged() {
        let defaults = object(json!({
            "margin": {"top": "0mm", "right": "0mm", "bottom": "0mm", "left": "0mm"}
        }));
        let effective = merge(&defaults, &object(json!({"margin": {"top": "10mm"}})));
        assert_eq!(effective["margin"], json!({"top": "10mm"}));
    }

    #[test]
    fn typed_merge_rejects_non_objects() {
        #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Sample {
            a: u32,
        }
        let err = merge_typed(&Sample { a: 1 }, &json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(merge_typed(&Sample { a: 1 }, &Value::Null).unwrap(), Sample { a: 1 });
        assert_eq!(merge_typed(&Sample { a: 1 }, &json!({"a": 7})).unwrap(), Sample { a: 7 });
    }
}
