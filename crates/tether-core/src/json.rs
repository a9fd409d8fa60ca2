#![forbid(unsafe_code)]

//! Conversions between [`serde_json::Value`] and store [`Value`]s.
//!
//! JSON arrays become keyed lists with fresh keys; objects keep their key
//! order (`preserve_order`). Going the other way, functions have no JSON
//! form and become `null`, and integral numbers are written as integers.

use serde_json::{Map, Number};

use crate::value::{Record, Value};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::from(items.into_iter().map(Self::from).collect::<Vec<_>>())
            }
            serde_json::Value::Object(map) => Self::Record(map.into_iter().collect::<Record>()),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null | Value::Function(_) => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => number(*n),
            Value::String(s) => Self::String(s.clone()),
            Value::Record(r) => Self::Object(
                r.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect::<Map<_, _>>(),
            ),
            Value::List(l) => Self::Array(l.iter().map(Self::from).collect()),
        }
    }
}

fn number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_keep_order_and_arrays_get_keys() {
        let v = Value::from(json!({"b": 1, "a": [true, "x"]}));
        let record = v.as_record().unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), ["b", "a"]);
        let list = v.resolve("a").and_then(Value::as_list).unwrap();
        assert_eq!(list.keys().len(), 2);
    }

    #[test]
    fn back_to_json() {
        let v = Value::from(json!({"n": 3, "f": 1.5, "s": "x"}));
        assert_eq!(serde_json::Value::from(&v), json!({"n": 3, "f": 1.5, "s": "x"}));
    }

    #[test]
    fn functions_and_nan_become_null() {
        let f = Value::from(crate::value::Function::new(|_| Value::Null));
        assert_eq!(serde_json::Value::from(&f), serde_json::Value::Null);
        assert_eq!(serde_json::Value::from(&Value::Number(f64::NAN)), serde_json::Value::Null);
    }
}
