//! Record-producing engines
//!
//! An engine owns a fixed-size worker pool, drives its record factory
//! according to a quantity/time policy, and hands every record to the
//! retry executor wrapping the shared sink. Task failures are logged at
//! the task boundary and never escape the pool; ordering across workers is
//! not guaranteed.

pub mod hourly;
pub mod quantity;
pub mod replay;

pub use hourly::HourlyRangeEngine;
pub use quantity::QuantityEngine;
pub use replay::ReplayEngine;

use crate::dynamo::config::ConfigError;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Ceiling on waiting for in-flight deliveries once production ends.
pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_secs(12 * 60 * 60);

/// Top-level driver that produces records until its termination condition.
#[async_trait]
pub trait DataEngine: Send {
    /// Run to completion: produce, drain the pool, flush the sink.
    async fn produce(&mut self) -> Result<(), EngineError>;
}

#[derive(Debug)]
pub enum EngineError {
    /// Invalid or missing engine configuration
    Configuration(String),
    /// Filesystem failure while listing or reading replay input
    Io(std::io::Error),
    /// The worker pool stopped accepting tasks
    PoolClosed,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Configuration(msg) => write!(f, "Engine configuration error: {}", msg),
            EngineError::Io(err) => write!(f, "Engine I/O error: {}", err),
            EngineError::PoolClosed => write!(f, "Worker pool is no longer accepting tasks"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err)
    }
}

/// Number of CPUs, for thread-count defaults.
pub(crate) fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fixed-size pool of worker tasks draining one bounded queue.
///
/// The queue bound (2× the worker count) is the backpressure surface:
/// submission blocks while every worker is busy and the queue is full.
/// Within one worker, jobs run in the order they were pulled.
pub(crate) struct WorkerPool {
    tx: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Job>(size * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let cancel = Arc::new(AtomicBool::new(false));

        let workers = (0..size)
            .map(|_| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        match job {
                            Some(job) => job.await,
                            None => break,
                        }
                    }
                })
            })
            .collect();

        WorkerPool {
            tx: Some(tx),
            workers,
            cancel,
        }
    }

    /// Queue one job; blocks when the pool is saturated.
    pub async fn submit<F>(&self, job: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tx = self.tx.as_ref().ok_or(EngineError::PoolClosed)?;
        tx.send(Box::pin(job))
            .await
            .map_err(|_| EngineError::PoolClosed)
    }

    /// Flag observed by in-flight retries between attempts.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Two-phase shutdown: stop accepting tasks, then await termination up
    /// to `grace`. On timeout the cancel flag is raised and the pool is
    /// abandoned.
    pub async fn shutdown(mut self, grace: Duration) {
        self.tx.take();

        let workers = std::mem::take(&mut self.workers);
        let drain = async {
            for worker in workers {
                let _ = worker.await;
            }
        };

        if tokio::time::timeout(grace, drain).await.is_err() {
            self.cancel.store(true, Ordering::Relaxed);
            log::warn!(
                "Worker pool did not terminate within {:?}; exiting anyway",
                grace
            );
        }
    }
}
