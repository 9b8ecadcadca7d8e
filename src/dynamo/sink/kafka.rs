//! Kafka sink
//!
//! Sends one encoded record per call to a configured topic. The producer
//! acknowledges each send within a bounded timeout, so nothing is held
//! across `send` returns that a shutdown could lose; `flush` drains
//! whatever librdkafka still has queued.

use super::{DataSink, SinkError};
use crate::dynamo::config::Config;
use crate::dynamo::record::{Record, RecordSchema};
use crate::dynamo::serialization::{RecordCodec, SerializationFormat};
use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
    schema: RecordSchema,
    codec: Box<dyn RecordCodec>,
}

impl std::fmt::Debug for KafkaSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSink")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl KafkaSink {
    /// Build from `Handlers.Kafka.{Brokers,Topic}`, the configured
    /// serialization format, and the record type's schema.
    pub fn from_config(config: &Config, schema: RecordSchema) -> Result<Self, SinkError> {
        let brokers = config
            .require("Handlers.Kafka.Brokers")
            .map_err(|e| SinkError::Configuration(e.to_string()))?;
        let topic = config
            .require("Handlers.Kafka.Topic")
            .map_err(|e| SinkError::Configuration(e.to_string()))?
            .to_string();

        let format = SerializationFormat::from_config(config)
            .map_err(|e| SinkError::Configuration(e.to_string()))?;
        let codec = format
            .codec(config)
            .map_err(|e| SinkError::Configuration(e.to_string()))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("queue.buffering.max.messages", "100000")
            .set("queue.buffering.max.ms", "100")
            .set("batch.num.messages", "1000")
            .create()
            .map_err(|e| SinkError::Configuration(format!("Kafka producer: {}", e)))?;

        Ok(KafkaSink {
            producer,
            topic,
            schema,
            codec,
        })
    }
}

/// Sort a producer failure into the retry taxonomy. Queueing and transport
/// failures clear on retry; anything the broker rejected outright does not.
fn classify(err: KafkaError) -> SinkError {
    let transient = match &err {
        KafkaError::MessageProduction(code) => matches!(
            code,
            RDKafkaErrorCode::QueueFull
                | RDKafkaErrorCode::MessageTimedOut
                | RDKafkaErrorCode::RequestTimedOut
                | RDKafkaErrorCode::BrokerTransportFailure
                | RDKafkaErrorCode::AllBrokersDown
        ),
        _ => true,
    };

    if transient {
        SinkError::transient_with("Kafka delivery failed", err)
    } else {
        SinkError::permanent_with("Kafka rejected the record", err)
    }
}

#[async_trait]
impl DataSink for KafkaSink {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn send(&self, record: &Record) -> Result<(), SinkError> {
        let payload = self.codec.encode(record, &self.schema)?;

        let message: FutureRecord<'_, (), Vec<u8>> =
            FutureRecord::to(&self.topic).payload(&payload);

        match self.producer.send(message, SEND_TIMEOUT).await {
            Ok(_) => Ok(()),
            Err((err, _)) => Err(classify(err)),
        }
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.producer
            .flush(FLUSH_TIMEOUT)
            .map_err(|e| SinkError::transient_with("Kafka flush failed", e))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamo::error::ErrorKind;

    #[test]
    fn test_queue_full_is_transient() {
        let err = classify(KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull));
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_broker_rejection_is_permanent() {
        let err = classify(KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageSizeTooLarge,
        ));
        assert_eq!(err.kind(), ErrorKind::Permanent);
    }

    #[test]
    fn test_missing_brokers_is_configuration_error() {
        let config = Config::from_pairs([("Handlers.Kafka.Topic", "events")]);
        let schema = RecordSchema::new("Event", Vec::new());
        let err = KafkaSink::from_config(&config, schema).unwrap_err();
        assert!(matches!(err, SinkError::Configuration(_)));
    }
}
