//! File sink
//!
//! Writes records to files under a configured base path with
//! append-or-create semantics: missing files get their intermediate
//! directories, the file, and any codec header; existing content gets the
//! codec's record separator before each appended record. One append handle
//! is held open per resolved path for the engine's lifetime and closed by
//! `close`. Writes to the same path serialize on a per-path lock so record
//! bytes never interleave.

use super::{DataSink, SinkError};
use crate::dynamo::config::Config;
use crate::dynamo::record::{Record, RecordSchema};
use crate::dynamo::serialization::avro::AvroFileWriter;
use crate::dynamo::serialization::{AvroCodec, RecordCodec, SerializationFormat};
use apache_avro::Schema as AvroSchema;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

enum FileCodec {
    Line(Box<dyn RecordCodec>),
    /// Container schema resolved at construction; leaked so writers can
    /// borrow it for the process lifetime.
    Avro { container_schema: &'static AvroSchema },
}

enum Appender {
    Line {
        file: std::fs::File,
        needs_separator: bool,
    },
    Avro(AvroFileWriter),
}

pub struct FileSink {
    base_path: PathBuf,
    filename: String,
    extension: &'static str,
    schema: RecordSchema,
    codec: FileCodec,
    appenders: Mutex<HashMap<PathBuf, Arc<Mutex<Appender>>>>,
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("base_path", &self.base_path)
            .field("filename", &self.filename)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl FileSink {
    /// Build from `Handlers.File.{Path,Filename}`, the configured
    /// serialization format, and the record type's schema. The filename
    /// gets the format's extension when it has none.
    pub fn from_config(config: &Config, schema: RecordSchema) -> Result<Self, SinkError> {
        let base_path = config
            .require("Handlers.File.Path")
            .map_err(|e| SinkError::Configuration(e.to_string()))?
            .to_string();
        let mut filename = config
            .require("Handlers.File.Filename")
            .map_err(|e| SinkError::Configuration(e.to_string()))?
            .to_string();

        let format = SerializationFormat::from_config(config)
            .map_err(|e| SinkError::Configuration(e.to_string()))?;

        if !filename.contains('.') {
            filename = format!("{}.{}", filename, format.extension());
        }

        let codec = match &format {
            SerializationFormat::Avro => {
                let avro = AvroCodec::from_config(config)
                    .map_err(|e| SinkError::Configuration(e.to_string()))?;
                let container_schema: &'static AvroSchema = Box::leak(Box::new(
                    avro.schema_for(&schema)
                        .map_err(|e| SinkError::Configuration(e.to_string()))?,
                ));
                FileCodec::Avro { container_schema }
            }
            other => FileCodec::Line(
                other
                    .codec(config)
                    .map_err(|e| SinkError::Configuration(e.to_string()))?,
            ),
        };

        Ok(FileSink {
            base_path: PathBuf::from(base_path),
            filename,
            extension: format.extension(),
            schema,
            codec,
            appenders: Mutex::new(HashMap::new()),
        })
    }

    fn open_appender(&self, path: &Path) -> Result<Appender, SinkError> {
        let existing_len = match std::fs::metadata(path) {
            Ok(meta) => Some(meta.len()),
            Err(_) => None,
        };

        if existing_len.is_none() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match &self.codec {
            FileCodec::Line(codec) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;

                let needs_separator = existing_len.unwrap_or(0) > 0;
                if existing_len.is_none() {
                    if let Some(header) = codec.file_header() {
                        file.write_all(header)?;
                    }
                }

                Ok(Appender::Line {
                    file,
                    needs_separator,
                })
            }
            FileCodec::Avro { container_schema } => {
                if existing_len.unwrap_or(0) > 0 {
                    return Err(SinkError::Configuration(format!(
                        "Avro container {} already exists; appending across runs is not supported",
                        path.display()
                    )));
                }

                Ok(Appender::Avro(AvroFileWriter::create(
                    path,
                    *container_schema,
                )?))
            }
        }
    }

    fn write_to(&self, relative: &str, record: &Record) -> Result<(), SinkError> {
        let path = self.base_path.join(relative);

        let appender = {
            let mut appenders = self.appenders.lock().expect("appender registry poisoned");
            match appenders.get(&path) {
                Some(appender) => Arc::clone(appender),
                None => {
                    let opened = Arc::new(Mutex::new(self.open_appender(&path)?));
                    appenders.insert(path.clone(), Arc::clone(&opened));
                    opened
                }
            }
        };

        let mut appender = appender.lock().expect("appender poisoned");
        match &mut *appender {
            Appender::Line {
                file,
                needs_separator,
            } => {
                let codec = match &self.codec {
                    FileCodec::Line(codec) => codec,
                    FileCodec::Avro { .. } => unreachable!("line appender under avro codec"),
                };

                let bytes = codec.encode(record, &self.schema)?;
                if *needs_separator {
                    file.write_all(codec.record_separator())?;
                }
                file.write_all(&bytes)?;
                *needs_separator = true;
                Ok(())
            }
            Appender::Avro(writer) => {
                writer.append(record)?;
                Ok(())
            }
        }
    }

    fn flush_all(&self) -> Result<(), SinkError> {
        let appenders: Vec<Arc<Mutex<Appender>>> = {
            let registry = self.appenders.lock().expect("appender registry poisoned");
            registry.values().cloned().collect()
        };

        for appender in appenders {
            let mut appender = appender.lock().expect("appender poisoned");
            match &mut *appender {
                Appender::Line { file, .. } => file.flush()?,
                Appender::Avro(writer) => writer.flush()?,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataSink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn send(&self, record: &Record) -> Result<(), SinkError> {
        self.write_to(&self.filename, record)
    }

    async fn send_partitioned(&self, record: &Record, partition: &str) -> Result<(), SinkError> {
        let relative = format!("{}.{}", partition, self.extension);
        self.write_to(&relative, record)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.flush_all()
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.flush_all()?;
        self.appenders
            .lock()
            .expect("appender registry poisoned")
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamo::record::{FieldKind, FieldSpec, FieldValue};

    fn sink_config(dir: &Path, format: &str, filename: &str) -> Config {
        Config::from_pairs([
            ("Handlers.File.Path", dir.to_str().unwrap()),
            ("Handlers.File.Filename", filename),
            ("Serialization.Format", format),
        ])
    }

    fn pair_schema() -> RecordSchema {
        RecordSchema::new(
            "Event",
            vec![
                FieldSpec::new("id", FieldKind::String),
                FieldSpec::new("name", FieldKind::String),
            ],
        )
    }

    fn sink(dir: &Path, format: &str, filename: &str) -> FileSink {
        FileSink::from_config(&sink_config(dir, format, filename), pair_schema()).unwrap()
    }

    fn record(id: &str, name: &str) -> Record {
        Record::new()
            .with("id", FieldValue::String(id.into()))
            .with("name", FieldValue::String(name.into()))
    }

    #[tokio::test]
    async fn test_extension_appended_from_format() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), "json", "events");

        sink.send(&record("1", "ada")).await.unwrap();
        sink.close().await.unwrap();

        assert!(dir.path().join("events.json").exists());
    }

    #[tokio::test]
    async fn test_missing_path_key_is_configuration_error() {
        let config = Config::from_pairs([("Handlers.File.Filename", "events")]);
        let err = FileSink::from_config(&config, pair_schema()).unwrap_err();
        assert!(matches!(err, SinkError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_records_separated_by_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), "json", "events");

        sink.send(&record("1", "ada")).await.unwrap();
        sink.send(&record("2", "grace")).await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("events.json")).unwrap();
        assert_eq!(
            contents,
            "{\"id\":\"1\",\"name\":\"ada\"}\r\n{\"id\":\"2\",\"name\":\"grace\"}"
        );
    }

    #[tokio::test]
    async fn test_partitioned_write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), "json", "events");

        sink.send_partitioned(&record("1", "ada"), "2021/06/15/1300")
            .await
            .unwrap();
        sink.close().await.unwrap();

        assert!(dir.path().join("2021/06/15/1300.json").exists());
    }

    #[tokio::test]
    async fn test_avro_container_written() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), "avro", "events");

        sink.send(&record("1", "ada")).await.unwrap();
        sink.send(&record("2", "grace")).await.unwrap();
        sink.close().await.unwrap();

        let path = dir.path().join("events.avro");
        let file = std::fs::File::open(&path).unwrap();
        let reader = apache_avro::Reader::new(file).unwrap();
        assert_eq!(reader.count(), 2);
    }
}
