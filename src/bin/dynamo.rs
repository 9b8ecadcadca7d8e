//! dynamo: synthetic data generation and replay
//!
//! ## Usage:
//! ```bash
//! dynamo <engine> <record-type> <sink>
//! dynamo quantity game-event file
//! dynamo replay game-event kafka
//! ```
//!
//! Settings are read from `dynamo.properties` in the working directory.

use clap::Parser;
use dynamo::dynamo::config::{Config, DEFAULT_PROPERTIES_FILE};
use dynamo::dynamo::error::DynamoError;
use dynamo::dynamo::record::RecordFactory;
use dynamo::dynamo::registry;
use log::{error, info};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dynamo")]
#[command(about = "Generate or replay synthetic data into a configured sink")]
#[command(version)]
struct Cli {
    /// Engine that drives production (quantity, hourly-range, replay)
    engine: String,

    /// Record type to generate (game-event, object)
    record_type: String,

    /// Destination sink (file, kafka, stdout)
    sink: String,
}

async fn run(cli: Cli) -> Result<(), DynamoError> {
    let config = Config::load(DEFAULT_PROPERTIES_FILE)
        .map_err(|e| DynamoError::Configuration(e.to_string()))?;

    // The record type resolves first (no records are created by that);
    // the sink binds its schema next, so sink configuration errors still
    // abort before any record exists
    let factory = registry::create_factory(&cli.record_type)?;
    let sink = registry::create_sink(&cli.sink, &config, factory.schema())?;
    let mut engine =
        registry::create_engine(&cli.engine, factory, sink.clone(), &config)?;

    info!(
        "🚀 Starting {} engine producing {} records into {}",
        cli.engine, cli.record_type, cli.sink
    );

    let outcome = engine
        .produce()
        .await
        .map_err(|e| DynamoError::Engine(e.to_string()));

    // The sink closes on success and failure paths alike
    if let Err(err) = sink.close().await {
        error!("Sink close failed: {}", err);
    }

    outcome?;
    info!("✅ Production complete");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
