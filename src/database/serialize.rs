use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use serde_json::{Map, Number, Value};

use super::DatabaseError;

/// Convert a stored document into API JSON: `_id` becomes `id`, ObjectIds
/// become hex strings and datetimes RFC 3339 strings.
pub fn document_to_json(document: Document) -> Value {
    let mut map = Map::new();
    for (key, value) in document {
        let key = if key == "_id" { "id".to_string() } else { key };
        map.insert(key, bson_to_json(value));
    }
    Value::Object(map)
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or_else(|_| Value::from(dt.timestamp_millis())),
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

pub fn parse_object_id(id: &str) -> Result<ObjectId, DatabaseError> {
    ObjectId::parse_str(id.trim()).map_err(|_| DatabaseError::InvalidObjectId(id.to_string()))
}

pub fn now() -> bson::DateTime {
    bson::DateTime::now()
}

pub fn to_bson_datetime(value: chrono::DateTime<chrono::Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(value.timestamp_millis())
}
