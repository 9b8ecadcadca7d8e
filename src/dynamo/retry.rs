//! Fault-tolerant delivery executor
//!
//! Wraps a sink call with bounded retries under a backoff policy and an
//! allow/deny error-kind filter. An error retries only when it matches the
//! retry list and not the fail list; anything else propagates immediately.
//! The executor is immutable after construction and shared freely across
//! workers. Cancellation is observed between attempts, never mid-sleep.

use crate::dynamo::error::ErrorKind;
use crate::dynamo::record::Record;
use crate::dynamo::sink::{DataSink, SinkError};
use rand::rngs::OsRng;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sleep growth between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Constant sleep
    Static,
    /// `sleep × n` on the n-th failure
    Linear,
    /// `sleep × n²` on the n-th failure
    Exponential,
    /// `sleep × U[0, 2^(n+1))`, drawn from the OS entropy source
    Random,
}

/// Retries an operation in the event of failure, with configurable wait
/// time between attempts and error kinds that fail fast.
#[derive(Debug, Clone)]
pub struct FaultTolerant {
    attempts: u32,
    backoff: BackoffPolicy,
    fail_kinds: Vec<ErrorKind>,
    retry_kinds: Vec<ErrorKind>,
    show_cause_chain: bool,
    sleep: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for FaultTolerant {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FaultTolerant {
    pub fn builder() -> FaultTolerantBuilder {
        FaultTolerantBuilder::new()
    }

    /// Run `op` until it succeeds, fails fast, or exhausts the attempt
    /// budget. `target` names the wrapped sink in log lines.
    pub async fn run<F, Fut>(&self, target: &str, mut op: F) -> Result<(), SinkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), SinkError>>,
    {
        let mut failures = 0u32;

        loop {
            let err = match op().await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            let kind = err.kind();
            if matches_any(&self.fail_kinds, kind) || !matches_any(&self.retry_kinds, kind) {
                return Err(err);
            }

            failures += 1;

            if self.show_cause_chain {
                log::warn!("{}: {:?}", target, err);
            } else {
                log::warn!("{}: {}", target, err.message_chain());
            }

            if failures >= self.attempts {
                log::warn!("Maximum attempts of {} reached. Bailing.", self.attempts);
                return Err(err);
            }

            if !self.sleep.is_zero() {
                let sleepy_time = self.backoff_sleep(failures);
                log::warn!("Retrying in {:?}.", sleepy_time);
                tokio::time::sleep(sleepy_time).await;
            }

            if let Some(cancel) = &self.cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Err(err);
                }
            }
        }
    }

    /// Deliver one record through the sink under this retry policy.
    pub async fn deliver(&self, sink: &dyn DataSink, record: &Record) -> Result<(), SinkError> {
        self.run(sink.name(), || sink.send(record)).await
    }

    /// Partition-aware variant of [`deliver`](FaultTolerant::deliver).
    pub async fn deliver_partitioned(
        &self,
        sink: &dyn DataSink,
        record: &Record,
        partition: &str,
    ) -> Result<(), SinkError> {
        self.run(sink.name(), || sink.send_partitioned(record, partition))
            .await
    }

    /// Sleep duration after the n-th failure (n starting at 1).
    pub fn backoff_sleep(&self, failures: u32) -> Duration {
        match self.backoff {
            BackoffPolicy::Static => self.sleep,
            BackoffPolicy::Linear => self.sleep * failures,
            BackoffPolicy::Exponential => self.sleep * (failures * failures),
            BackoffPolicy::Random => {
                let bound: u32 = 2u32 << failures;
                self.sleep * OsRng.gen_range(0..bound)
            }
        }
    }
}

fn matches_any(kinds: &[ErrorKind], thrown: ErrorKind) -> bool {
    kinds.iter().any(|kind| kind.matches(thrown))
}

/// Builder for [`FaultTolerant`]. Defaults: 3 attempts, exponential
/// backoff, retry every kind, fail fast on none, 3 second base sleep.
pub struct FaultTolerantBuilder {
    attempts: u32,
    backoff: BackoffPolicy,
    fail_kinds: Vec<ErrorKind>,
    retry_kinds: Vec<ErrorKind>,
    show_cause_chain: bool,
    sleep: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl FaultTolerantBuilder {
    fn new() -> Self {
        FaultTolerantBuilder {
            attempts: 3,
            backoff: BackoffPolicy::Exponential,
            fail_kinds: Vec::new(),
            retry_kinds: vec![ErrorKind::Any],
            show_cause_chain: true,
            sleep: Duration::from_secs(3),
            cancel: None,
        }
    }

    /// Maximum number of calls, including the first.
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Error kinds that always fail fast, even when a retry kind matches.
    pub fn fail_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.fail_kinds = kinds.into_iter().collect();
        self
    }

    /// Error kinds eligible for retry; anything unmatched fails fast.
    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retry_kinds = kinds.into_iter().collect();
        self
    }

    /// Log the full error chain on failure, or just the flattened message.
    pub fn show_cause_chain(mut self, show: bool) -> Self {
        self.show_cause_chain = show;
        self
    }

    /// Base sleep between attempts; zero disables sleeping entirely.
    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Cancellation flag checked between attempts.
    pub fn cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> FaultTolerant {
        FaultTolerant {
            attempts: self.attempts,
            backoff: self.backoff,
            fail_kinds: self.fail_kinds,
            retry_kinds: self.retry_kinds,
            show_cause_chain: self.show_cause_chain,
            sleep: self.sleep,
            cancel: self.cancel,
        }
    }
}
