//! Replay engine
//!
//! Re-drives previously generated data: lists the files under the
//! configured path whose names contain the configured substring, chooses a
//! codec from each file's extension, and delivers every decoded record.
//! One task per file; an empty line terminates reading for that file.

use super::{available_cpus, DataEngine, EngineError, WorkerPool, SHUTDOWN_GRACE};
use crate::dynamo::config::Config;
use crate::dynamo::record::{Record, RecordFactory};
use crate::dynamo::retry::FaultTolerant;
use crate::dynamo::serialization::{AvroCodec, SerializationFormat};
use crate::dynamo::sink::DataSink;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

pub struct ReplayEngine {
    factory: Arc<dyn RecordFactory>,
    sink: Arc<dyn DataSink>,
    path: PathBuf,
    file_pattern: String,
    threads: usize,
    config: Config,
}

impl ReplayEngine {
    /// Build from `Engines.Replay.{Path,Files,Threads}`. A missing path or
    /// empty file pattern aborts construction; the thread default is ½×CPU.
    pub fn from_config(
        factory: Arc<dyn RecordFactory>,
        sink: Arc<dyn DataSink>,
        config: &Config,
    ) -> Result<Self, EngineError> {
        let path = config
            .require("Engines.Replay.Path")
            .map_err(|_| EngineError::Configuration("Replay path is empty".to_string()))?
            .to_string();
        let file_pattern = config
            .require("Engines.Replay.Files")
            .map_err(|_| EngineError::Configuration("Replay files are empty".to_string()))?
            .to_string();

        let threads = config.get_or("Engines.Replay.Threads", (available_cpus() / 2).max(1))?;

        Ok(ReplayEngine {
            factory,
            sink,
            path: PathBuf::from(path),
            file_pattern,
            threads,
            config: config.clone(),
        })
    }

    /// Files under the replay path whose names contain the pattern.
    fn matching_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.contains(&self.file_pattern))
                        .unwrap_or(false)
            })
            .collect();

        files.sort();
        Ok(files)
    }
}

async fn replay_file(
    path: &Path,
    factory: &dyn RecordFactory,
    sink: &dyn DataSink,
    fault_tolerant: &FaultTolerant,
    config: &Config,
) {
    let display = path.display();
    log::info!("Replaying from file: {}", display);

    let format = match SerializationFormat::for_path(path) {
        Ok(format) => format,
        Err(err) => {
            log::error!("{}", err);
            return;
        }
    };

    let schema = factory.schema();

    if format == SerializationFormat::Avro {
        // Container framing carries its own record boundaries and schema
        let codec = AvroCodec::new();
        match codec.read_container(path, schema) {
            Ok(records) => {
                for record in records {
                    deliver(sink, fault_tolerant, &record).await;
                }
            }
            Err(err) => log::error!("{}: {}", display, err),
        }
        return;
    }

    let codec = match format.codec(config) {
        Ok(codec) => codec,
        Err(err) => {
            log::error!("{}: {}", display, err);
            return;
        }
    };

    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            log::error!("{}: {}", display, err);
            return;
        }
    };

    let mut lines = tokio::io::BufReader::new(file).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.is_empty() {
                    break;
                }
                match codec.decode(line.as_bytes(), schema) {
                    Ok(record) => deliver(sink, fault_tolerant, &record).await,
                    Err(err) => log::error!("{}: {}", display, err),
                }
            }
            Ok(None) => break,
            Err(err) => {
                log::error!("{}: {}", display, err);
                break;
            }
        }
    }
}

async fn deliver(sink: &dyn DataSink, fault_tolerant: &FaultTolerant, record: &Record) {
    if let Err(err) = fault_tolerant.deliver(sink, record).await {
        log::error!("{}", err);
    }
}

#[async_trait]
impl DataEngine for ReplayEngine {
    async fn produce(&mut self) -> Result<(), EngineError> {
        let files = self.matching_files()?;
        log::info!(
            "Replaying {} files matching {:?} under {}",
            files.len(),
            self.file_pattern,
            self.path.display()
        );

        let pool = WorkerPool::new(self.threads);
        let fault_tolerant = Arc::new(
            FaultTolerant::builder()
                .cancel_flag(pool.cancel_flag())
                .build(),
        );

        for file in files {
            let factory = Arc::clone(&self.factory);
            let sink = Arc::clone(&self.sink);
            let fault_tolerant = Arc::clone(&fault_tolerant);
            let config = self.config.clone();

            pool.submit(async move {
                replay_file(
                    &file,
                    factory.as_ref(),
                    sink.as_ref(),
                    fault_tolerant.as_ref(),
                    &config,
                )
                .await;
            })
            .await?;
        }

        pool.shutdown(SHUTDOWN_GRACE).await;

        if let Err(err) = self.sink.flush().await {
            log::error!("Sink flush failed: {}", err);
        }

        Ok(())
    }
}
