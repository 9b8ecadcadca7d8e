//! Avro codec
//!
//! Message sinks carry the raw datum encoding (no embedded schema); file
//! sinks write the object container format with the Snappy codec. The
//! Avro schema is loaded from `Serialization.SchemaFile` when configured,
//! otherwise derived from the record type's declared fields with every
//! field nullable.

use super::{CodecError, RecordCodec};
use crate::dynamo::config::Config;
use crate::dynamo::record::{FieldKind, FieldValue, Record, RecordSchema};
use apache_avro::types::Value as AvroValue;
use apache_avro::{Codec, Schema, Writer};
use chrono::Utc;
use serde_json::json;
use std::path::Path;
use std::sync::Mutex;

pub struct AvroCodec {
    /// Schema loaded from configuration, if any
    configured: Option<Schema>,
    /// Schema derived from the record type's declaration
    derived: Mutex<Option<Schema>>,
}

impl AvroCodec {
    pub fn new() -> Self {
        AvroCodec {
            configured: None,
            derived: Mutex::new(None),
        }
    }

    pub fn with_schema(schema: Schema) -> Self {
        AvroCodec {
            configured: Some(schema),
            derived: Mutex::new(None),
        }
    }

    /// Load the schema named by `Serialization.SchemaFile`, or defer to
    /// deriving one from the record type when the key is absent.
    pub fn from_config(config: &Config) -> Result<Self, CodecError> {
        match config.get("Serialization.SchemaFile") {
            None => Ok(Self::new()),
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    CodecError::Schema(format!("Failed to read schema file {}: {}", path, e))
                })?;
                let schema = Schema::parse_str(&raw).map_err(|e| {
                    CodecError::Schema(format!("Failed to parse schema file {}: {}", path, e))
                })?;
                Ok(Self::with_schema(schema))
            }
        }
    }

    /// The Avro schema for records of the declared type: the configured
    /// schema when present, otherwise one derived from the declaration and
    /// cached.
    pub fn schema_for(&self, declaration: &RecordSchema) -> Result<Schema, CodecError> {
        if let Some(schema) = &self.configured {
            return Ok(schema.clone());
        }

        let mut derived = self.derived.lock().expect("schema cache poisoned");
        if let Some(schema) = &*derived {
            return Ok(schema.clone());
        }

        let schema = derive_schema(declaration)?;
        *derived = Some(schema.clone());
        Ok(schema)
    }

    /// Read every record in an object container file. Replay uses this
    /// path instead of datum decoding; block framing delimits the records
    /// natively and the file header carries the writer schema.
    pub fn read_container(
        &self,
        path: &Path,
        declaration: &RecordSchema,
    ) -> Result<Vec<Record>, CodecError> {
        let file = std::fs::File::open(path).map_err(|e| {
            CodecError::decode("avro", format!("Failed to open {}: {}", path.display(), e))
        })?;
        let reader = apache_avro::Reader::new(file)
            .map_err(|e| CodecError::decode("avro", e.to_string()))?;

        let mut records = Vec::new();
        for value in reader {
            let value = value.map_err(|e| CodecError::decode("avro", e.to_string()))?;
            records.push(value_to_record(&value, declaration)?);
        }
        Ok(records)
    }
}

impl Default for AvroCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCodec for AvroCodec {
    fn format_name(&self) -> &'static str {
        "avro"
    }

    fn encode(&self, record: &Record, schema: &RecordSchema) -> Result<Vec<u8>, CodecError> {
        let avro_schema = self.schema_for(schema)?;
        let value = record_to_value(record);

        apache_avro::to_avro_datum(&avro_schema, value)
            .map_err(|e| CodecError::encode(self.format_name(), e.to_string()))
    }

    fn decode(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Record, CodecError> {
        let avro_schema = self.schema_for(schema)?;
        let mut reader = bytes;
        let value = apache_avro::from_avro_datum(&avro_schema, &mut reader, None)
            .map_err(|e| CodecError::decode(self.format_name(), e.to_string()))?;

        value_to_record(&value, schema)
    }

    /// Container framing delimits records; no separator bytes.
    fn record_separator(&self) -> &'static [u8] {
        b""
    }
}

/// Append-only writer over one object container file. The file sink holds
/// one per output path for the engine's lifetime.
pub struct AvroFileWriter {
    writer: Writer<'static, std::fs::File>,
}

impl AvroFileWriter {
    /// Create the container file, writing the header with the Snappy codec.
    pub fn create(path: &Path, schema: &'static Schema) -> Result<Self, CodecError> {
        let file = std::fs::File::create(path).map_err(|e| {
            CodecError::encode("avro", format!("Failed to create {}: {}", path.display(), e))
        })?;

        Ok(AvroFileWriter {
            writer: Writer::with_codec(schema, file, Codec::Snappy),
        })
    }

    pub fn append(&mut self, record: &Record) -> Result<(), CodecError> {
        self.writer
            .append(record_to_value(record))
            .map(|_| ())
            .map_err(|e| CodecError::encode("avro", e.to_string()))
    }

    pub fn flush(&mut self) -> Result<(), CodecError> {
        self.writer
            .flush()
            .map(|_| ())
            .map_err(|e| CodecError::encode("avro", e.to_string()))
    }
}

/// Build a record schema from the declared fields with every field
/// nullable, the analog of the original's reflect-with-nulls inference.
fn derive_schema(declaration: &RecordSchema) -> Result<Schema, CodecError> {
    let field_docs: Vec<serde_json::Value> = declaration
        .fields
        .iter()
        .map(|spec| {
            let avro_type = match spec.kind {
                FieldKind::String => json!("string"),
                FieldKind::Integer => json!("long"),
                FieldKind::Float => json!("double"),
                FieldKind::Boolean => json!("boolean"),
                FieldKind::Timestamp => json!({
                    "type": "long",
                    "logicalType": "timestamp-millis"
                }),
            };
            json!({
                "name": spec.name,
                "type": ["null", avro_type],
                "default": null
            })
        })
        .collect();

    let name = if declaration.name.is_empty() {
        "Record"
    } else {
        declaration.name.as_str()
    };
    let doc = json!({
        "type": "record",
        "name": name,
        "fields": field_docs
    });

    Schema::parse_str(&doc.to_string()).map_err(|e| CodecError::Schema(e.to_string()))
}

/// Convert a record to an Avro value. Plain values are emitted; schema
/// resolution wraps them into the nullable unions where needed.
pub(crate) fn record_to_value(record: &Record) -> AvroValue {
    let fields = record
        .iter()
        .map(|(name, value)| {
            let avro = match value {
                FieldValue::String(s) => AvroValue::String(s.clone()),
                FieldValue::Integer(i) => AvroValue::Long(*i),
                FieldValue::Float(f) => AvroValue::Double(*f),
                FieldValue::Boolean(b) => AvroValue::Boolean(*b),
                FieldValue::Timestamp(ts) => AvroValue::TimestampMillis(ts.timestamp_millis()),
                FieldValue::Null => AvroValue::Null,
            };
            (name.to_string(), avro)
        })
        .collect();

    AvroValue::Record(fields)
}

fn value_to_record(
    value: &AvroValue,
    declaration: &RecordSchema,
) -> Result<Record, CodecError> {
    let fields = match value {
        AvroValue::Record(fields) => fields,
        other => {
            return Err(CodecError::decode(
                "avro",
                format!("expected a record value, got {:?}", other),
            ));
        }
    };

    let mut record = Record::new();
    for (name, value) in fields {
        let kind = declaration.field(name).map(|spec| spec.kind);
        record.push(name.clone(), avro_to_field(name, kind, value)?);
    }
    Ok(record)
}

fn avro_to_field(
    name: &str,
    kind: Option<FieldKind>,
    value: &AvroValue,
) -> Result<FieldValue, CodecError> {
    // Unions from the nullable-field encoding carry the payload inside
    let value = match value {
        AvroValue::Union(_, inner) => inner.as_ref(),
        other => other,
    };

    let field = match value {
        AvroValue::Null => FieldValue::Null,
        AvroValue::Boolean(b) => FieldValue::Boolean(*b),
        AvroValue::Int(i) => FieldValue::Integer(*i as i64),
        AvroValue::Long(l) if kind == Some(FieldKind::Timestamp) => {
            timestamp_from_millis(name, *l)?
        }
        AvroValue::Long(l) => FieldValue::Integer(*l),
        AvroValue::Float(f) => FieldValue::Float(*f as f64),
        AvroValue::Double(d) => FieldValue::Float(*d),
        AvroValue::String(s) => FieldValue::String(s.clone()),
        AvroValue::TimestampMillis(ms) => timestamp_from_millis(name, *ms)?,
        other => {
            return Err(CodecError::decode(
                "avro",
                format!("field {} has unsupported value {:?}", name, other),
            ));
        }
    };

    Ok(field)
}

fn timestamp_from_millis(name: &str, millis: i64) -> Result<FieldValue, CodecError> {
    chrono::DateTime::<Utc>::from_timestamp_millis(millis)
        .map(FieldValue::Timestamp)
        .ok_or_else(|| {
            CodecError::decode(
                "avro",
                format!("field {} timestamp {} out of range", name, millis),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamo::record::FieldSpec;
    use chrono::TimeZone;

    fn declaration() -> RecordSchema {
        RecordSchema::new(
            "Event",
            vec![
                FieldSpec::new("id", FieldKind::Integer),
                FieldSpec::new("name", FieldKind::String),
                FieldSpec::new("at", FieldKind::Timestamp),
            ],
        )
    }

    fn sample_record() -> Record {
        Record::new()
            .with("id", FieldValue::Integer(42))
            .with("name", FieldValue::String("ada".into()))
            .with(
                "at",
                FieldValue::Timestamp(Utc.with_ymd_and_hms(2021, 6, 15, 13, 0, 0).unwrap()),
            )
    }

    #[test]
    fn test_datum_round_trip_with_derived_schema() {
        let codec = AvroCodec::new();
        let declaration = declaration();
        let record = sample_record();

        let bytes = codec.encode(&record, &declaration).unwrap();
        assert!(!bytes.is_empty());

        let decoded = codec.decode(&bytes, &declaration).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_null_fields_encode() {
        let codec = AvroCodec::new();
        let record = Record::new()
            .with("id", FieldValue::Integer(1))
            .with("name", FieldValue::Null)
            .with(
                "at",
                FieldValue::Timestamp(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
            );

        let bytes = codec.encode(&record, &declaration()).unwrap();
        let decoded = codec.decode(&bytes, &declaration()).unwrap();
        assert_eq!(decoded.get("name"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_container_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.avro");

        let codec = AvroCodec::new();
        let record = sample_record();
        let schema: &'static Schema =
            Box::leak(Box::new(codec.schema_for(&declaration()).unwrap()));

        let mut writer = AvroFileWriter::create(&path, schema).unwrap();
        writer.append(&record).unwrap();
        writer.append(&record).unwrap();
        writer.flush().unwrap();

        let records = codec.read_container(&path, &declaration()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record);
    }

    #[test]
    fn test_derived_schema_is_cached() {
        let codec = AvroCodec::new();

        let first = codec.schema_for(&declaration()).unwrap();
        let second = codec.schema_for(&declaration()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_truncated_datum_rejected() {
        let codec = AvroCodec::new();
        let declaration = declaration();

        let bytes = codec.encode(&sample_record(), &declaration).unwrap();
        assert!(codec.decode(&bytes[..bytes.len() - 1], &declaration).is_err());
    }
}
