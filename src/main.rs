//! # Queue Latency Bench - Main Entry Point
//!
//! One binary, four roles:
//! - `serve`: run the in-memory FIFO broker until ctrl-c
//! - `produce`: push timestamp tokens to the broker
//! - `consume`: pull tokens back and write latency samples
//! - `analyze`: read sample files for every backend and print the
//!   comparison report
//!
//! The broker and the analyzer never run together; the sample files are
//! the only thing they share.
//!
//! ## Error Handling
//!
//! Failing to bind the broker socket or to create an output file ends the
//! process with an error. Everything the analyzer can skip (bad lines,
//! empty files, missing backends) is logged and skipped instead.

use anyhow::Result;
use clap::Parser;
use queue_latency_bench::{
    benchmark::{ConsumerConfig, ConsumerRunner, ProducerConfig, ProducerRunner},
    broker::{BrokerConfig, BrokerServer},
    cli::{AnalyzeArgs, AnalyzerConfig, Args, Commands},
    logging,
    results::{render_report, ResultsAnalyzer},
};
use std::io::Write;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The log level can be controlled via RUST_LOG, e.g. RUST_LOG=debug
    logging::init(args.verbose);

    match &args.command {
        Commands::Serve(serve) => serve_broker(BrokerConfig::from(serve)).await,
        Commands::Produce(produce) => {
            ProducerRunner::new(ProducerConfig::from(produce)).run().await?;
            Ok(())
        }
        Commands::Consume(consume) => {
            ConsumerRunner::new(ConsumerConfig::from(consume)).run().await?;
            Ok(())
        }
        Commands::Analyze(analyze) => analyze_results(analyze),
    }
}

async fn serve_broker(config: BrokerConfig) -> Result<()> {
    let server = BrokerServer::from_config(&config).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };
    server.run_until(shutdown).await;
    Ok(())
}

fn analyze_results(args: &AnalyzeArgs) -> Result<()> {
    let config = AnalyzerConfig::from(args);
    info!(
        "Analyzing results for: {}",
        config
            .backends
            .iter()
            .map(|b| b.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let report = ResultsAnalyzer::new(config.backends).run();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render_report(&report, &mut out)?;
    out.flush()?;

    if let Some(path) = &config.json_output {
        report.write_json(path)?;
    }
    Ok(())
}
