//! Quantity engine
//!
//! Generates a fixed number of records using a multi-threaded loop. An
//! optional inter-submission sleep throttles how fast work enters the
//! pool; delivery itself is never throttled.

use super::{available_cpus, DataEngine, EngineError, WorkerPool, SHUTDOWN_GRACE};
use crate::dynamo::config::Config;
use crate::dynamo::record::RecordFactory;
use crate::dynamo::retry::FaultTolerant;
use crate::dynamo::sink::DataSink;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_QUANTITY: u64 = 100_000;

pub struct QuantityEngine {
    factory: Arc<dyn RecordFactory>,
    sink: Arc<dyn DataSink>,
    quantity: u64,
    threads: usize,
    sleepy_time: Duration,
}

impl QuantityEngine {
    /// Defaults: 100 000 records, 2×CPU workers, no throttle.
    pub fn new(factory: Arc<dyn RecordFactory>, sink: Arc<dyn DataSink>) -> Self {
        QuantityEngine {
            factory,
            sink,
            quantity: DEFAULT_QUANTITY,
            threads: available_cpus() * 2,
            sleepy_time: Duration::ZERO,
        }
    }

    /// Apply `Engines.Quantity.{Quantity,Threads,SleepyTime}` on top of the
    /// defaults.
    pub fn from_config(
        factory: Arc<dyn RecordFactory>,
        sink: Arc<dyn DataSink>,
        config: &Config,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(factory, sink);

        engine.quantity = config.get_or("Engines.Quantity.Quantity", engine.quantity)?;
        engine.threads = config.get_or("Engines.Quantity.Threads", engine.threads)?;
        let sleepy_ms: u64 = config.get_or("Engines.Quantity.SleepyTime", 0)?;
        engine.sleepy_time = Duration::from_millis(sleepy_ms);

        Ok(engine)
    }

    pub fn with_quantity(mut self, quantity: u64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_sleepy_time(mut self, sleepy_time: Duration) -> Self {
        self.sleepy_time = sleepy_time;
        self
    }
}

#[async_trait]
impl DataEngine for QuantityEngine {
    async fn produce(&mut self) -> Result<(), EngineError> {
        let pool = WorkerPool::new(self.threads);
        let fault_tolerant = Arc::new(
            FaultTolerant::builder()
                .cancel_flag(pool.cancel_flag())
                .build(),
        );

        log::info!(
            "Producing {} records with {} workers",
            self.quantity,
            self.threads
        );

        for _ in 0..self.quantity {
            let factory = Arc::clone(&self.factory);
            let sink = Arc::clone(&self.sink);
            let fault_tolerant = Arc::clone(&fault_tolerant);

            pool.submit(async move {
                let record = factory.create();
                if let Err(err) = fault_tolerant.deliver(sink.as_ref(), &record).await {
                    log::error!("{}", err);
                }
            })
            .await?;

            if !self.sleepy_time.is_zero() {
                tokio::time::sleep(self.sleepy_time).await;
            }
        }

        pool.shutdown(SHUTDOWN_GRACE).await;

        if let Err(err) = self.sink.flush().await {
            log::error!("Sink flush failed: {}", err);
        }

        Ok(())
    }
}
