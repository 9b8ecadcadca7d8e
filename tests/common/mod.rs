#![allow(dead_code)]

use async_trait::async_trait;
use dynamo::dynamo::record::Record;
use dynamo::dynamo::sink::{DataSink, SinkError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Sink that records every delivery along with its partition, if any.
#[derive(Default)]
pub struct CountingSink {
    sent: AtomicU64,
    captured: Mutex<Vec<(Option<String>, Record)>>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn captured(&self) -> Vec<(Option<String>, Record)> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSink for CountingSink {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn send(&self, record: &Record) -> Result<(), SinkError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.captured.lock().unwrap().push((None, record.clone()));
        Ok(())
    }

    async fn send_partitioned(&self, record: &Record, partition: &str) -> Result<(), SinkError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.captured
            .lock()
            .unwrap()
            .push((Some(partition.to_string()), record.clone()));
        Ok(())
    }
}

/// How a [`FlakySink`] fails.
pub enum FlakyMode {
    AlwaysTransient,
    AlwaysConfiguration,
    TransientUntil(u64),
}

/// Sink that fails according to its mode, counting every call.
pub struct FlakySink {
    calls: AtomicU64,
    mode: FlakyMode,
}

impl FlakySink {
    pub fn new(mode: FlakyMode) -> Self {
        FlakySink {
            calls: AtomicU64::new(0),
            mode,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSink for FlakySink {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn send(&self, _record: &Record) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        match self.mode {
            FlakyMode::AlwaysTransient => Err(SinkError::transient("connection reset")),
            FlakyMode::AlwaysConfiguration => {
                Err(SinkError::Configuration("bad credentials".to_string()))
            }
            FlakyMode::TransientUntil(successes_after) => {
                if call < successes_after {
                    Err(SinkError::transient("connection reset"))
                } else {
                    Ok(())
                }
            }
        }
    }
}
