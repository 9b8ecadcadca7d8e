//! XML codec
//!
//! One record per line as `<TypeName><field>value</field>…</TypeName>`,
//! with the element name taken from the record type's schema. Files
//! created by appendable sinks receive a one-time literal
//! `<xml version="1.0">` header line on creation.

use super::{coerce_field, CodecError, RecordCodec};
use crate::dynamo::record::{FieldValue, Record, RecordSchema};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

const FILE_HEADER: &str = "<xml version=\"1.0\">";

pub struct XmlCodec;

impl XmlCodec {
    pub fn new() -> Self {
        XmlCodec
    }
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCodec for XmlCodec {
    fn format_name(&self) -> &'static str {
        "xml"
    }

    fn encode(&self, record: &Record, schema: &RecordSchema) -> Result<Vec<u8>, CodecError> {
        let root = schema.name.as_str();
        let mut writer = Writer::new(Vec::new());

        writer
            .write_event(Event::Start(BytesStart::new(root)))
            .map_err(|e| CodecError::encode(self.format_name(), e.to_string()))?;

        for (name, value) in record.iter() {
            let field_err =
                |e: String| CodecError::encode_field(self.format_name(), name, e);

            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(|e| field_err(e.to_string()))?;
            writer
                .write_event(Event::Text(BytesText::new(&value.to_string())))
                .map_err(|e| field_err(e.to_string()))?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(|e| field_err(e.to_string()))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(root)))
            .map_err(|e| CodecError::encode(self.format_name(), e.to_string()))?;

        Ok(writer.into_inner())
    }

    fn decode(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Record, CodecError> {
        let line = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::decode(self.format_name(), e.to_string()))?;

        // The first line of an appendable file carries the header fused
        // with the first record
        let line = line.strip_prefix(FILE_HEADER).unwrap_or(line);

        let mut reader = Reader::from_str(line);
        reader.trim_text(true);

        let mut values: HashMap<String, String> = HashMap::new();
        let mut current: Option<String> = None;
        let mut depth = 0usize;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    depth += 1;
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if depth == 1 {
                        if name != schema.name {
                            return Err(CodecError::decode(
                                self.format_name(),
                                format!(
                                    "root element {} does not match record type {}",
                                    name, schema.name
                                ),
                            ));
                        }
                    } else if depth == 2 {
                        values.entry(name.clone()).or_default();
                        current = Some(name);
                    }
                }
                Ok(Event::Empty(e)) => {
                    if depth == 1 {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        values.entry(name).or_default();
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(field) = &current {
                        let text = e
                            .unescape()
                            .map_err(|err| {
                                CodecError::decode(self.format_name(), err.to_string())
                            })?
                            .into_owned();
                        values.insert(field.clone(), text);
                    }
                }
                Ok(Event::End(_)) => {
                    if depth == 2 {
                        current = None;
                    }
                    depth = depth.saturating_sub(1);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(CodecError::decode(self.format_name(), e.to_string()));
                }
            }
        }

        let mut record = Record::new();
        for spec in &schema.fields {
            match values.get(&spec.name) {
                Some(raw) => {
                    record.push(
                        spec.name.clone(),
                        coerce_field(self.format_name(), raw, spec)?,
                    );
                }
                None => record.push(spec.name.clone(), FieldValue::Null),
            }
        }

        Ok(record)
    }

    fn file_header(&self) -> Option<&'static [u8]> {
        Some(FILE_HEADER.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamo::record::{FieldKind, FieldSpec, FieldValue};

    fn schema() -> RecordSchema {
        RecordSchema::new(
            "Event",
            vec![
                FieldSpec::new("id", FieldKind::Integer),
                FieldSpec::new("name", FieldKind::String),
            ],
        )
    }

    #[test]
    fn test_encode_uses_type_name_for_root() {
        let codec = XmlCodec::new();
        let record = Record::new()
            .with("id", FieldValue::Integer(42))
            .with("name", FieldValue::String("ada".into()));

        let bytes = codec.encode(&record, &schema()).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "<Event><id>42</id><name>ada</name></Event>"
        );
    }

    #[test]
    fn test_round_trip() {
        let codec = XmlCodec::new();
        let record = Record::new()
            .with("id", FieldValue::Integer(7))
            .with("name", FieldValue::String("grace".into()));

        let bytes = codec.encode(&record, &schema()).unwrap();
        assert_eq!(codec.decode(&bytes, &schema()).unwrap(), record);
    }

    #[test]
    fn test_escaped_text_round_trips() {
        let codec = XmlCodec::new();
        let record = Record::new()
            .with("id", FieldValue::Integer(1))
            .with("name", FieldValue::String("a<b&c".into()));

        let bytes = codec.encode(&record, &schema()).unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("&lt;"));
        assert_eq!(codec.decode(&bytes, &schema()).unwrap(), record);
    }

    #[test]
    fn test_header_prefixed_first_line_decodes() {
        let codec = XmlCodec::new();
        let decoded = codec
            .decode(
                b"<xml version=\"1.0\"><Event><id>42</id><name>ada</name></Event>",
                &schema(),
            )
            .unwrap();
        assert_eq!(decoded.get("id"), Some(&FieldValue::Integer(42)));
        assert_eq!(decoded.get("name"), Some(&FieldValue::String("ada".into())));
    }

    #[test]
    fn test_mismatched_root_rejected() {
        let codec = XmlCodec::new();
        let err = codec
            .decode(b"<Other><id>3</id></Other>", &schema())
            .unwrap_err();
        assert!(err.to_string().contains("does not match record type"));
    }

    #[test]
    fn test_missing_field_decodes_to_null() {
        let codec = XmlCodec::new();
        let decoded = codec
            .decode(b"<Event><id>3</id></Event>", &schema())
            .unwrap();
        assert_eq!(decoded.get("name"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_file_header_is_literal() {
        assert_eq!(
            XmlCodec::new().file_header(),
            Some(b"<xml version=\"1.0\">".as_slice())
        );
    }
}
