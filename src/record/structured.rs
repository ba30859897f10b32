use serde_json::{Map, Number, Value as Json};

use crate::core::error::{Error, Result};
use crate::core::types::Value;
use crate::record::Record;
use crate::schema::field::FieldKind;

/// Generic JSON-like form of a record. Meta-only fields are included,
/// missing values are left out.
pub fn to_structured<R: Record>(record: &R) -> Result<Map<String, Json>> {
    let schema = R::schema();
    let mut map = Map::new();

    for field in schema.fields() {
        if let Some(value) = record.get_value(&field.name) {
            map.insert(field.name.clone(), to_json(&field.name, &value)?);
        }
    }
    Ok(map)
}

/// Builds a record from its structured form. Meta-only fields and nulls are
/// ignored; timestamps arrive as RFC 3339 strings.
pub fn from_structured<R: Record>(map: &Map<String, Json>) -> Result<R> {
    let schema = R::schema();
    let mut record = R::default();

    for field in schema.fields() {
        if !field.is_indexed() {
            continue;
        }
        let Some(json) = map.get(&field.name) else {
            continue;
        };

        let value = if field.has_kind(FieldKind::Vector) {
            to_vector(json)
        } else {
            from_json(json)
        };
        if let Some(value) = value {
            record.set_value(&field.name, value)?;
        }
    }
    Ok(record)
}

fn to_json(field: &str, value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Str(s) => Json::String(s.clone()),
        Value::Int(n) => Json::from(*n),
        Value::Float(n) => Number::from_f64(*n)
            .map(Json::Number)
            .ok_or_else(|| Error::encoding(field, format!("{} is not a finite number", n)))?,
        Value::Bool(b) => Json::Bool(*b),
        Value::Timestamp(ts) => Json::String(ts.to_rfc3339()),
        Value::Vector(v) => Json::Array(
            v.iter()
                .map(|x| {
                    Number::from_f64(f64::from(*x))
                        .map(Json::Number)
                        .ok_or_else(|| Error::encoding(field, "vector holds a non-finite number"))
                })
                .collect::<Result<_>>()?,
        ),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|item| to_json(field, item))
                .collect::<Result<_>>()?,
        ),
        Value::Json(json) => json.clone(),
    })
}

fn from_json(json: &Json) -> Option<Value> {
    match json {
        Json::Null => None,
        Json::Bool(b) => Some(Value::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float)),
        Json::String(s) => Some(Value::Str(s.clone())),
        Json::Array(items) => Some(Value::List(items.iter().filter_map(from_json).collect())),
        Json::Object(_) => Some(Value::Json(json.clone())),
    }
}

fn to_vector(json: &Json) -> Option<Value> {
    let Json::Array(items) = json else {
        return from_json(json);
    };
    items
        .iter()
        .map(|item| item.as_f64().map(|x| x as f32))
        .collect::<Option<Vec<f32>>>()
        .map(Value::Vector)
        .or_else(|| from_json(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_prefer_integers() {
        assert_eq!(from_json(&serde_json::json!(3)), Some(Value::Int(3)));
        assert_eq!(from_json(&serde_json::json!(2.5)), Some(Value::Float(2.5)));
        assert_eq!(from_json(&Json::Null), None);
    }

    #[test]
    fn test_arrays_become_lists_or_vectors() {
        let json = serde_json::json!([1.5, 2, -3]);
        assert_eq!(to_vector(&json), Some(Value::Vector(vec![1.5, 2.0, -3.0])));
        assert!(matches!(from_json(&json), Some(Value::List(items)) if items.len() == 3));

        let words = serde_json::json!(["a", "b"]);
        assert_eq!(to_vector(&words), Some(Value::string_list(["a", "b"])));
    }

    #[test]
    fn test_objects_stay_structured() {
        let json = serde_json::json!({"k": [1, 2]});
        assert_eq!(from_json(&json), Some(Value::Json(json.clone())));
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        assert!(to_json("weight", &Value::Float(f64::NAN)).is_err());
        assert_eq!(
            to_json("tags", &Value::string_list(["x"])).unwrap(),
            serde_json::json!(["x"])
        );
    }
}
