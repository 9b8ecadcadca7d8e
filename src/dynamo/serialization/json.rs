//! JSON codec
//!
//! One record per line as a JSON object; object keys follow the record's
//! declaration order. Decoding assigns by name against the schema, so
//! re-ordered input is accepted; missing fields decode to null.

use super::{CodecError, RecordCodec};
use crate::dynamo::record::{FieldKind, FieldValue, Record, RecordSchema};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        JsonCodec
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn field_value_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Integer(i) => Value::Number((*i).into()),
        FieldValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Timestamp(ts) => {
            Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        FieldValue::Null => Value::Null,
    }
}

pub(crate) fn json_to_field_value(
    format: &'static str,
    field: &str,
    kind: FieldKind,
    value: &Value,
) -> Result<FieldValue, CodecError> {
    let mismatch = |value: &Value| {
        CodecError::decode(
            format,
            format!("field {} does not decode as {:?}: {}", field, kind, value),
        )
    };

    match (kind, value) {
        (_, Value::Null) => Ok(FieldValue::Null),
        (FieldKind::String, Value::String(s)) => Ok(FieldValue::String(s.clone())),
        (FieldKind::Integer, Value::Number(n)) => {
            n.as_i64().map(FieldValue::Integer).ok_or_else(|| mismatch(value))
        }
        (FieldKind::Float, Value::Number(n)) => {
            n.as_f64().map(FieldValue::Float).ok_or_else(|| mismatch(value))
        }
        (FieldKind::Boolean, Value::Bool(b)) => Ok(FieldValue::Boolean(*b)),
        (FieldKind::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|_| mismatch(value)),
        _ => Err(mismatch(value)),
    }
}

impl RecordCodec for JsonCodec {
    fn format_name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, record: &Record, _schema: &RecordSchema) -> Result<Vec<u8>, CodecError> {
        let mut object = Map::new();
        for (name, value) in record.iter() {
            object.insert(name.to_string(), field_value_to_json(value));
        }

        serde_json::to_vec(&Value::Object(object))
            .map_err(|e| CodecError::encode(self.format_name(), e.to_string()))
    }

    fn decode(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Record, CodecError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::decode(self.format_name(), e.to_string()))?;

        let object = value.as_object().ok_or_else(|| {
            CodecError::decode(self.format_name(), "expected a JSON object")
        })?;

        let mut record = Record::new();
        for spec in &schema.fields {
            let field = match object.get(&spec.name) {
                Some(v) => json_to_field_value(self.format_name(), &spec.name, spec.kind, v)?,
                None => FieldValue::Null,
            };
            record.push(spec.name.clone(), field);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamo::record::FieldSpec;
    use chrono::TimeZone;

    fn event_schema() -> RecordSchema {
        RecordSchema::new(
            "Event",
            vec![
                FieldSpec::new("id", FieldKind::Integer),
                FieldSpec::new("name", FieldKind::String),
                FieldSpec::new("at", FieldKind::Timestamp),
            ],
        )
    }

    #[test]
    fn test_encode_preserves_declaration_order() {
        let codec = JsonCodec::new();
        let record = Record::new()
            .with("id", FieldValue::Integer(1))
            .with("name", FieldValue::String("ada".into()));

        let bytes = codec.encode(&record, &event_schema()).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"id":1,"name":"ada"}"#);
    }

    #[test]
    fn test_round_trip() {
        let codec = JsonCodec::new();
        let at = Utc.with_ymd_and_hms(2021, 6, 15, 13, 0, 0).unwrap();
        let record = Record::new()
            .with("id", FieldValue::Integer(9))
            .with("name", FieldValue::String("grace".into()))
            .with("at", FieldValue::Timestamp(at));

        let bytes = codec.encode(&record, &event_schema()).unwrap();
        let decoded = codec.decode(&bytes, &event_schema()).unwrap();

        assert_eq!(decoded, record);
    }

    #[test]
    fn test_missing_field_decodes_to_null() {
        let codec = JsonCodec::new();
        let decoded = codec.decode(br#"{"id":3}"#, &event_schema()).unwrap();

        assert_eq!(decoded.get("id"), Some(&FieldValue::Integer(3)));
        assert_eq!(decoded.get("name"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_non_object_rejected() {
        let codec = JsonCodec::new();
        assert!(codec.decode(b"[1,2,3]", &event_schema()).is_err());
        assert!(codec.decode(b"{ invalid", &event_schema()).is_err());
    }
}
