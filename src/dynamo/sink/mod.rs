//! Data sinks
//!
//! A sink accepts one record per `send` call, encodes it with its codec,
//! and delivers the bytes to a destination. Sinks classify their own
//! failures: configuration errors surface at construction, delivery
//! failures are transient (retryable) or permanent (fail fast). Sinks are
//! shared across all workers and must be safe for concurrent `send`.

pub mod file;
pub mod kafka;
pub mod stdout;

pub use file::FileSink;
pub use kafka::KafkaSink;
pub use stdout::StdoutSink;

use crate::dynamo::error::ErrorKind;
use crate::dynamo::record::Record;
use crate::dynamo::serialization::CodecError;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

/// Delivery failure, classified for the retry executor.
#[derive(Debug)]
pub enum SinkError {
    /// Invalid or missing sink configuration; aborts startup
    Configuration(String),
    /// The codec rejected the record; never retried
    Encoding(CodecError),
    /// Expected to clear on retry (timeout, connection reset, 5xx)
    Transient {
        message: String,
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    /// Will not clear on retry (4xx, schema mismatch)
    Permanent {
        message: String,
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    /// Local filesystem failure
    Io(std::io::Error),
}

impl SinkError {
    pub fn transient(message: impl Into<String>) -> Self {
        SinkError::Transient {
            message: message.into(),
            source: None,
        }
    }

    pub fn transient_with(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        SinkError::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        SinkError::Permanent {
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent_with(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        SinkError::Permanent {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classification used by the retry executor's kind matching.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SinkError::Configuration(_) => ErrorKind::Configuration,
            SinkError::Encoding(err) => err.kind(),
            SinkError::Transient { .. } => ErrorKind::Transient,
            SinkError::Permanent { .. } => ErrorKind::Permanent,
            SinkError::Io(_) => ErrorKind::Io,
        }
    }

    /// Flatten the cause chain into one `a; b; c` line for logs that
    /// suppress full error chains.
    pub fn message_chain(&self) -> String {
        let mut text = self.to_string();
        let mut source = Error::source(self);
        while let Some(err) = source {
            text.push_str("; ");
            text.push_str(&err.to_string());
            source = err.source();
        }
        text
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Configuration(msg) => write!(f, "Sink configuration error: {}", msg),
            SinkError::Encoding(err) => write!(f, "{}", err),
            SinkError::Transient { message, .. } => {
                write!(f, "Transient delivery error: {}", message)
            }
            SinkError::Permanent { message, .. } => {
                write!(f, "Permanent delivery error: {}", message)
            }
            SinkError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for SinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SinkError::Encoding(err) => Some(err),
            SinkError::Transient { source, .. } | SinkError::Permanent { source, .. } => {
                source.as_deref().map(|e| e as &(dyn Error + 'static))
            }
            SinkError::Io(err) => Some(err),
            SinkError::Configuration(_) => None,
        }
    }
}

impl From<CodecError> for SinkError {
    fn from(err: CodecError) -> Self {
        SinkError::Encoding(err)
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

/// Destination for encoded records.
#[async_trait]
pub trait DataSink: Send + Sync {
    /// Stable sink name, used in log lines and the registry.
    fn name(&self) -> &'static str;

    /// Encode and deliver one record.
    async fn send(&self, record: &Record) -> Result<(), SinkError>;

    /// Deliver one record under a partition path. File-capable sinks place
    /// the partition under their base path; everything else ignores it.
    async fn send_partitioned(&self, record: &Record, _partition: &str) -> Result<(), SinkError> {
        self.send(record).await
    }

    /// Flush buffered deliveries; the engine calls this before teardown.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Release held resources; called on every success and failure path.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
