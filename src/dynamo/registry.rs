//! Name-based registries for engines, record types, and sinks
//!
//! The launcher resolves its three positional arguments here. The record
//! type resolves first (a factory constructs without creating records or
//! reading configuration), then the sink binds that type's schema, so
//! sink configuration errors still abort before any record exists; the
//! engine receives the shared sink and the factory last.

use crate::dynamo::config::Config;
use crate::dynamo::engine::{DataEngine, HourlyRangeEngine, QuantityEngine, ReplayEngine};
use crate::dynamo::error::DynamoError;
use crate::dynamo::record::{GameEventFactory, ObjectFactory, RecordFactory, RecordSchema};
use crate::dynamo::sink::{DataSink, FileSink, KafkaSink, StdoutSink};
use std::sync::Arc;

/// Registered engine names.
pub const ENGINE_NAMES: &[&str] = &["quantity", "hourly-range", "replay"];

/// Registered record-type names. `object` is the blank-record sentinel.
pub const RECORD_TYPE_NAMES: &[&str] = &["game-event", "object"];

/// Registered sink names.
pub const SINK_NAMES: &[&str] = &["file", "kafka", "stdout"];

pub fn create_sink(
    name: &str,
    config: &Config,
    schema: &RecordSchema,
) -> Result<Arc<dyn DataSink>, DynamoError> {
    let sink: Arc<dyn DataSink> = match name.to_lowercase().as_str() {
        "file" => Arc::new(
            FileSink::from_config(config, schema.clone())
                .map_err(|e| DynamoError::Construction(e.to_string()))?,
        ),
        "kafka" => Arc::new(
            KafkaSink::from_config(config, schema.clone())
                .map_err(|e| DynamoError::Construction(e.to_string()))?,
        ),
        "stdout" => Arc::new(
            StdoutSink::from_config(config, schema.clone())
                .map_err(|e| DynamoError::Construction(e.to_string()))?,
        ),
        _ => {
            return Err(DynamoError::UnknownName {
                role: "sink",
                name: name.to_string(),
            });
        }
    };

    Ok(sink)
}

pub fn create_factory(name: &str) -> Result<Arc<dyn RecordFactory>, DynamoError> {
    let factory: Arc<dyn RecordFactory> = match name.to_lowercase().as_str() {
        "game-event" | "gameevent" => Arc::new(GameEventFactory::new()),
        "object" => Arc::new(ObjectFactory::new()),
        _ => {
            return Err(DynamoError::UnknownName {
                role: "record type",
                name: name.to_string(),
            });
        }
    };

    Ok(factory)
}

pub fn create_engine(
    name: &str,
    factory: Arc<dyn RecordFactory>,
    sink: Arc<dyn DataSink>,
    config: &Config,
) -> Result<Box<dyn DataEngine>, DynamoError> {
    let engine: Box<dyn DataEngine> = match name.to_lowercase().as_str() {
        "quantity" => Box::new(
            QuantityEngine::from_config(factory, sink, config)
                .map_err(|e| DynamoError::Construction(e.to_string()))?,
        ),
        "hourly-range" | "hourlyrange" => Box::new(
            HourlyRangeEngine::from_config(factory, sink, config)
                .map_err(|e| DynamoError::Construction(e.to_string()))?,
        ),
        "replay" => Box::new(
            ReplayEngine::from_config(factory, sink, config)
                .map_err(|e| DynamoError::Construction(e.to_string()))?,
        ),
        _ => {
            return Err(DynamoError::UnknownName {
                role: "engine",
                name: name.to_string(),
            });
        }
    };

    Ok(engine)
}
