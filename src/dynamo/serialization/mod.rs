//! Pluggable record codecs
//!
//! Every codec converts between [`Record`]s and bytes. Text-family codecs
//! (delimited text, JSON, XML) treat one line as one logical record and
//! separate appended records with CRLF; the Avro codec uses the object
//! container format for files, where block framing handles boundaries
//! natively.

pub mod avro;
pub mod json;
pub mod text;
pub mod xml;

pub use avro::AvroCodec;
pub use json::JsonCodec;
pub use text::DelimitedTextCodec;
pub use xml::XmlCodec;

use crate::dynamo::config::Config;
use crate::dynamo::error::ErrorKind;
use crate::dynamo::record::{FieldKind, FieldSpec, FieldValue, Record, RecordSchema};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;

/// Codec failure. Encoding failures are always terminal for the record in
/// flight; format/extension failures are configuration errors.
#[derive(Debug)]
pub enum CodecError {
    Encode {
        format: &'static str,
        field: Option<String>,
        message: String,
    },
    Decode {
        format: &'static str,
        message: String,
    },
    Schema(String),
    UnsupportedFormat(String),
    UnsupportedExtension(String),
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::Encode { .. } | CodecError::Decode { .. } => ErrorKind::Encoding,
            CodecError::Schema(_)
            | CodecError::UnsupportedFormat(_)
            | CodecError::UnsupportedExtension(_) => ErrorKind::Configuration,
        }
    }

    pub(crate) fn encode(format: &'static str, message: impl Into<String>) -> Self {
        CodecError::Encode {
            format,
            field: None,
            message: message.into(),
        }
    }

    pub(crate) fn encode_field(
        format: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CodecError::Encode {
            format,
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub(crate) fn decode(format: &'static str, message: impl Into<String>) -> Self {
        CodecError::Decode {
            format,
            message: message.into(),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode {
                format,
                field: Some(field),
                message,
            } => write!(f, "{} encode error on field {}: {}", format, field, message),
            CodecError::Encode {
                format,
                field: None,
                message,
            } => write!(f, "{} encode error: {}", format, message),
            CodecError::Decode { format, message } => {
                write!(f, "{} decode error: {}", format, message)
            }
            CodecError::Schema(msg) => write!(f, "Schema error: {}", msg),
            CodecError::UnsupportedFormat(name) => {
                write!(f, "Unsupported serialization format: {}", name)
            }
            CodecError::UnsupportedExtension(ext) => {
                write!(f, "Unsupported file format: {}", ext)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Bidirectional converter between records and bytes.
///
/// `encode` must succeed for any record whose fields the codec understands;
/// failures are terminal and name the failing field when possible. The
/// record type's schema travels with every call: encoders that need the
/// type name or declared kinds (XML tags, Avro schemas) read it there.
/// `decode` takes the bytes of one logical record (one line for text
/// codecs, one datum for binary) and the schema that declares the field
/// order and kinds.
pub trait RecordCodec: Send + Sync {
    fn format_name(&self) -> &'static str;

    fn encode(&self, record: &Record, schema: &RecordSchema) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Record, CodecError>;

    /// Bytes placed between appended records in file-like sinks.
    fn record_separator(&self) -> &'static [u8] {
        b"\r\n"
    }

    /// Bytes written once when a file-like sink creates a new file.
    fn file_header(&self) -> Option<&'static [u8]> {
        None
    }
}

/// The configured wire format, resolved once and used to build codecs and
/// filename extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationFormat {
    Text { delimiter: String },
    Json,
    Xml,
    Avro,
}

impl SerializationFormat {
    /// Resolve the format from `Serialization.Format` /
    /// `Serialization.Delimiter`. Defaults to tab-delimited text.
    pub fn from_config(config: &Config) -> Result<Self, CodecError> {
        let name = config.get("Serialization.Format").unwrap_or("text");

        match name.to_lowercase().as_str() {
            "avro" => Ok(SerializationFormat::Avro),
            "json" => Ok(SerializationFormat::Json),
            "xml" => Ok(SerializationFormat::Xml),
            "text" => {
                let delimiter = config
                    .get("Serialization.Delimiter")
                    .unwrap_or("\t")
                    .to_string();
                Ok(SerializationFormat::Text { delimiter })
            }
            other => Err(CodecError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Choose the format for a replayed file from its extension.
    pub fn for_path(path: &Path) -> Result<Self, CodecError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match ext.as_str() {
            "avro" => Ok(SerializationFormat::Avro),
            "csv" => Ok(SerializationFormat::Text {
                delimiter: ",".to_string(),
            }),
            "tsv" => Ok(SerializationFormat::Text {
                delimiter: "\t".to_string(),
            }),
            "json" => Ok(SerializationFormat::Json),
            "xml" => Ok(SerializationFormat::Xml),
            _ => Err(CodecError::UnsupportedExtension(
                path.display().to_string(),
            )),
        }
    }

    /// Filename extension for output files of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            SerializationFormat::Text { delimiter } => match delimiter.as_str() {
                "\t" => "tsv",
                "," => "csv",
                _ => "txt",
            },
            SerializationFormat::Json => "json",
            SerializationFormat::Xml => "xml",
            SerializationFormat::Avro => "avro",
        }
    }

    /// Build the codec for this format.
    pub fn codec(&self, config: &Config) -> Result<Box<dyn RecordCodec>, CodecError> {
        match self {
            SerializationFormat::Text { delimiter } => {
                Ok(Box::new(DelimitedTextCodec::new(delimiter.clone())))
            }
            SerializationFormat::Json => Ok(Box::new(JsonCodec::new())),
            SerializationFormat::Xml => Ok(Box::new(XmlCodec::new())),
            SerializationFormat::Avro => Ok(Box::new(AvroCodec::from_config(config)?)),
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationFormat::Text { .. } => write!(f, "text"),
            SerializationFormat::Json => write!(f, "json"),
            SerializationFormat::Xml => write!(f, "xml"),
            SerializationFormat::Avro => write!(f, "avro"),
        }
    }
}

/// Coerce one raw text field to its declared kind. Empty input becomes
/// `Null` for non-string kinds.
pub(crate) fn coerce_field(
    format: &'static str,
    raw: &str,
    spec: &FieldSpec,
) -> Result<FieldValue, CodecError> {
    if raw.is_empty() && spec.kind != FieldKind::String {
        return Ok(FieldValue::Null);
    }

    match spec.kind {
        FieldKind::String => Ok(FieldValue::String(raw.to_string())),
        FieldKind::Integer => raw
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|e| decode_field(format, &spec.name, raw, e)),
        FieldKind::Float => raw
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|e| decode_field(format, &spec.name, raw, e)),
        FieldKind::Boolean => raw
            .parse::<bool>()
            .map(FieldValue::Boolean)
            .map_err(|e| decode_field(format, &spec.name, raw, e)),
        FieldKind::Timestamp => DateTime::parse_from_rfc3339(raw)
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|e| decode_field(format, &spec.name, raw, e)),
    }
}

fn decode_field(
    format: &'static str,
    field: &str,
    raw: &str,
    err: impl fmt::Display,
) -> CodecError {
    CodecError::decode(
        format,
        format!("field {} value {:?}: {}", field, raw, err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping_for_replay() {
        assert_eq!(
            SerializationFormat::for_path(Path::new("events.csv")).unwrap(),
            SerializationFormat::Text {
                delimiter: ",".into()
            }
        );
        assert_eq!(
            SerializationFormat::for_path(Path::new("events.tsv")).unwrap(),
            SerializationFormat::Text {
                delimiter: "\t".into()
            }
        );
        assert_eq!(
            SerializationFormat::for_path(Path::new("events.json")).unwrap(),
            SerializationFormat::Json
        );
        assert_eq!(
            SerializationFormat::for_path(Path::new("events.xml")).unwrap(),
            SerializationFormat::Xml
        );
        assert_eq!(
            SerializationFormat::for_path(Path::new("events.avro")).unwrap(),
            SerializationFormat::Avro
        );
        assert!(SerializationFormat::for_path(Path::new("events.parquet")).is_err());
    }

    #[test]
    fn test_text_extension_follows_delimiter() {
        let tab = SerializationFormat::Text {
            delimiter: "\t".into(),
        };
        let comma = SerializationFormat::Text {
            delimiter: ",".into(),
        };
        let pipe = SerializationFormat::Text {
            delimiter: "|".into(),
        };

        assert_eq!(tab.extension(), "tsv");
        assert_eq!(comma.extension(), "csv");
        assert_eq!(pipe.extension(), "txt");
    }

    #[test]
    fn test_format_from_config() {
        let config = Config::from_pairs([("Serialization.Format", "json")]);
        assert_eq!(
            SerializationFormat::from_config(&config).unwrap(),
            SerializationFormat::Json
        );

        let config = Config::from_pairs([
            ("Serialization.Format", "text"),
            ("Serialization.Delimiter", "|"),
        ]);
        assert_eq!(
            SerializationFormat::from_config(&config).unwrap(),
            SerializationFormat::Text {
                delimiter: "|".into()
            }
        );

        let config = Config::from_pairs([("Serialization.Format", "parquet")]);
        assert!(SerializationFormat::from_config(&config).is_err());
    }
}
