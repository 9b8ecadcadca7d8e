//! Stdout sink for debugging and demos
//!
//! Writes one encoded record per line to standard output.

use super::{DataSink, SinkError};
use crate::dynamo::config::Config;
use crate::dynamo::record::{Record, RecordSchema};
use crate::dynamo::serialization::{RecordCodec, SerializationFormat};
use async_trait::async_trait;
use std::io::Write;

pub struct StdoutSink {
    schema: RecordSchema,
    codec: Box<dyn RecordCodec>,
}

impl StdoutSink {
    pub fn from_config(config: &Config, schema: RecordSchema) -> Result<Self, SinkError> {
        let format = SerializationFormat::from_config(config)
            .map_err(|e| SinkError::Configuration(e.to_string()))?;
        let codec = format
            .codec(config)
            .map_err(|e| SinkError::Configuration(e.to_string()))?;

        Ok(StdoutSink { schema, codec })
    }

    pub fn with_codec(codec: Box<dyn RecordCodec>, schema: RecordSchema) -> Self {
        StdoutSink { schema, codec }
    }
}

#[async_trait]
impl DataSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn send(&self, record: &Record) -> Result<(), SinkError> {
        let bytes = self.codec.encode(record, &self.schema)?;

        let mut out = std::io::stdout().lock();
        out.write_all(&bytes)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}
