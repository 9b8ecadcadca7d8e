//! Error taxonomy shared across sinks, codecs, and the retry executor

use std::fmt;

/// Classification of a failure, used by the retry executor's allow/deny
/// matching. `Any` matches every kind; `Delivery` matches both transient
/// and permanent delivery failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Matches every error kind
    Any,
    /// Matches `Transient` and `Permanent`
    Delivery,
    /// Invalid or missing configuration, surfaced at construction
    Configuration,
    /// Codec failure on a record; never retryable
    Encoding,
    /// Delivery failure expected to clear on retry (timeout, 5xx)
    Transient,
    /// Delivery failure that will not clear on retry (4xx, schema mismatch)
    Permanent,
    /// Local I/O failure
    Io,
}

impl ErrorKind {
    /// True when `thrown` is this kind or a sub-kind of it.
    pub fn matches(self, thrown: ErrorKind) -> bool {
        match self {
            ErrorKind::Any => true,
            ErrorKind::Delivery => {
                matches!(thrown, ErrorKind::Delivery | ErrorKind::Transient | ErrorKind::Permanent)
            }
            other => other == thrown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Any => "any",
            ErrorKind::Delivery => "delivery",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Io => "io",
        };
        write!(f, "{}", name)
    }
}

/// Top-level error for the launcher boundary. Construction failures abort
/// startup; everything below the engine is logged where it happens.
#[derive(Debug)]
pub enum DynamoError {
    /// No constructor registered under the given name
    UnknownName { role: &'static str, name: String },
    /// Component construction failed
    Construction(String),
    /// Configuration could not be loaded or parsed
    Configuration(String),
    /// The engine run itself failed
    Engine(String),
}

impl fmt::Display for DynamoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamoError::UnknownName { role, name } => {
                write!(f, "Unknown {} name: {}", role, name)
            }
            DynamoError::Construction(msg) => write!(f, "Construction error: {}", msg),
            DynamoError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            DynamoError::Engine(msg) => write!(f, "Engine error: {}", msg),
        }
    }
}

impl std::error::Error for DynamoError {}
