//! Hourly-range engine
//!
//! Walks a date range in one-hour steps and generates a random quantity of
//! records per hour, each stamped with its bucket timestamp. Under a
//! file-capable sink the bucket also becomes a date-partitioned output
//! path (`YYYY/MM/DD/HH00`), computed inside the task and passed through
//! the partition-aware send so no shared sink state ever mutates.

use super::{available_cpus, DataEngine, EngineError, WorkerPool, SHUTDOWN_GRACE};
use crate::dynamo::config::Config;
use crate::dynamo::record::RecordFactory;
use crate::dynamo::retry::FaultTolerant;
use crate::dynamo::sink::DataSink;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_LOWER_QUANTITY: u64 = 100_000;
const DEFAULT_UPPER_QUANTITY: u64 = 500_000;
const DATE_FORMAT: &str = "%Y/%m/%d";

pub struct HourlyRangeEngine {
    factory: Arc<dyn RecordFactory>,
    sink: Arc<dyn DataSink>,
    lower_quantity: u64,
    upper_quantity: u64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    threads: usize,
    sleepy_time: Duration,
}

impl HourlyRangeEngine {
    /// Defaults: 100 000–500 000 records per hour over the last 30 days,
    /// 2×CPU workers.
    pub fn new(factory: Arc<dyn RecordFactory>, sink: Arc<dyn DataSink>) -> Self {
        let now = Utc::now();
        HourlyRangeEngine {
            factory,
            sink,
            lower_quantity: DEFAULT_LOWER_QUANTITY,
            upper_quantity: DEFAULT_UPPER_QUANTITY,
            start_date: now - chrono::Duration::days(30),
            end_date: now,
            threads: available_cpus() * 2,
            sleepy_time: Duration::ZERO,
        }
    }

    /// Apply `Engines.HourlyRange.{LowerQuantity,UpperQuantity,StartDate,
    /// EndDate}` on top of the defaults. Thread and throttle knobs share
    /// the quantity engine's keys.
    pub fn from_config(
        factory: Arc<dyn RecordFactory>,
        sink: Arc<dyn DataSink>,
        config: &Config,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(factory, sink);

        engine.lower_quantity =
            config.get_or("Engines.HourlyRange.LowerQuantity", engine.lower_quantity)?;
        engine.upper_quantity =
            config.get_or("Engines.HourlyRange.UpperQuantity", engine.upper_quantity)?;

        if let Some(raw) = config.get("Engines.HourlyRange.StartDate") {
            engine.start_date = parse_date("Engines.HourlyRange.StartDate", raw)?;
        }
        if let Some(raw) = config.get("Engines.HourlyRange.EndDate") {
            engine.end_date = parse_date("Engines.HourlyRange.EndDate", raw)?;
        }

        engine.threads = config.get_or("Engines.Quantity.Threads", engine.threads)?;
        let sleepy_ms: u64 = config.get_or("Engines.Quantity.SleepyTime", 0)?;
        engine.sleepy_time = Duration::from_millis(sleepy_ms);

        engine.validate()?;
        Ok(engine)
    }

    pub fn with_quantity_range(mut self, lower: u64, upper: u64) -> Self {
        self.lower_quantity = lower;
        self.upper_quantity = upper;
        self
    }

    pub fn with_date_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.upper_quantity <= self.lower_quantity {
            return Err(EngineError::Configuration(format!(
                "Upper quantity {} must exceed lower quantity {}",
                self.upper_quantity, self.lower_quantity
            )));
        }
        if self.end_date <= self.start_date {
            return Err(EngineError::Configuration(format!(
                "End date {} must be after start date {}",
                self.end_date, self.start_date
            )));
        }
        Ok(())
    }
}

fn parse_date(key: &str, raw: &str) -> Result<DateTime<Utc>, EngineError> {
    let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        EngineError::Configuration(format!("{} value {:?}: {}", key, raw, e))
    })?;

    Ok(DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0).expect("midnight is valid"),
        Utc,
    ))
}

#[async_trait]
impl DataEngine for HourlyRangeEngine {
    async fn produce(&mut self) -> Result<(), EngineError> {
        self.validate()?;

        let pool = WorkerPool::new(self.threads);
        let fault_tolerant = Arc::new(
            FaultTolerant::builder()
                .cancel_flag(pool.cancel_flag())
                .build(),
        );

        log::info!(
            "Producing {}..{} records per hour from {} to {}",
            self.lower_quantity,
            self.upper_quantity,
            self.start_date,
            self.end_date
        );

        let mut current = self.start_date;
        while current < self.end_date {
            let bucket = current;
            let quantity =
                rand::thread_rng().gen_range(self.lower_quantity..self.upper_quantity);
            let partition = bucket.format("%Y/%m/%d/%H00").to_string();

            let factory = Arc::clone(&self.factory);
            let sink = Arc::clone(&self.sink);
            let fault_tolerant = Arc::clone(&fault_tolerant);

            pool.submit(async move {
                for _ in 0..quantity {
                    let mut record = factory.create();
                    record.stamp(bucket);

                    if let Err(err) = fault_tolerant
                        .deliver_partitioned(sink.as_ref(), &record, &partition)
                        .await
                    {
                        log::error!("{}", err);
                    }
                }
            })
            .await?;

            if !self.sleepy_time.is_zero() {
                tokio::time::sleep(self.sleepy_time).await;
            }

            current += chrono::Duration::seconds(3600);
        }

        pool.shutdown(SHUTDOWN_GRACE).await;

        if let Err(err) = self.sink.flush().await {
            log::error!("Sink flush failed: {}", err);
        }

        Ok(())
    }
}
