//! Delimited-text codec
//!
//! Encoding joins the record's fields in declaration order, each followed
//! by the delimiter (the trailing delimiter is part of the wire form).
//! Decoding splits on the delimiter and assigns positionally against the
//! schema, coercing each raw field to its declared kind.

use super::{coerce_field, CodecError, RecordCodec};
use crate::dynamo::record::{Record, RecordSchema};

pub struct DelimitedTextCodec {
    delimiter: String,
}

impl DelimitedTextCodec {
    pub fn new(delimiter: impl Into<String>) -> Self {
        DelimitedTextCodec {
            delimiter: delimiter.into(),
        }
    }

    pub fn tab() -> Self {
        Self::new("\t")
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }
}

impl RecordCodec for DelimitedTextCodec {
    fn format_name(&self) -> &'static str {
        "text"
    }

    fn encode(&self, record: &Record, _schema: &RecordSchema) -> Result<Vec<u8>, CodecError> {
        let mut out = String::new();

        for (_, value) in record.iter() {
            out.push_str(&value.to_string());
            out.push_str(&self.delimiter);
        }

        Ok(out.into_bytes())
    }

    fn decode(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Record, CodecError> {
        let line = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::decode(self.format_name(), e.to_string()))?;
        let mut parts: Vec<&str> = line.split(self.delimiter.as_str()).collect();

        // The encoder always emits a trailing delimiter; drop the empty
        // segment it produces so positional assignment lines up.
        if parts.last() == Some(&"") {
            parts.pop();
        }

        if parts.len() > schema.fields.len() {
            return Err(CodecError::decode(
                self.format_name(),
                format!(
                    "{} fields in line but {} declares {}",
                    parts.len(),
                    schema.name,
                    schema.fields.len()
                ),
            ));
        }

        let mut record = Record::new();
        for (raw, spec) in parts.iter().zip(schema.fields.iter()) {
            record.push(
                spec.name.clone(),
                coerce_field(self.format_name(), raw, spec)?,
            );
        }

        Ok(record)
    }
}
