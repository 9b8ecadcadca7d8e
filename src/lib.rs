//! Synthetic data generation and replay pipeline.
//!
//! A `dynamo` run wires three subsystems together: an *engine* decides how
//! many records to produce and on what schedule, a *codec* turns each
//! record into bytes, and a *sink* delivers those bytes to a destination.
//! Every delivery runs under a configurable retry executor.

pub mod dynamo;

// Re-export the main API surface
pub use dynamo::config::Config;
pub use dynamo::engine::{DataEngine, EngineError};
pub use dynamo::record::{FieldValue, Record, RecordFactory, RecordSchema};
pub use dynamo::retry::{BackoffPolicy, FaultTolerant};
pub use dynamo::serialization::{RecordCodec, SerializationFormat};
pub use dynamo::sink::{DataSink, SinkError};
