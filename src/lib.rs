//! # Queue Latency Benchmark Library
//!
//! A small message broker and latency analysis suite for comparing the
//! end-to-end latency of messaging backends.
//!
//! ## Components
//!
//! - **Broker**: a single in-memory FIFO queue of opaque string tokens,
//!   served over a newline-delimited TCP protocol (`PUSH`/`PULL`)
//! - **Clients**: producer and consumer roles that drive the broker and
//!   record round-trip latency samples
//! - **Sample store**: plain text files with one microsecond latency per line
//! - **Analysis**: per-file percentile statistics, per-system aggregation and
//!   a cross-system ranking
//!
//! The broker and the analyzer never talk to each other. The only coupling
//! is the sample file format, so results recorded by external clients
//! (Kafka, MQTT, RabbitMQ) are analyzed the same way as the built-in broker.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use queue_latency_bench::broker::BrokerServer;
//! use queue_latency_bench::client::QueueClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = BrokerServer::bind("127.0.0.1:0").await?;
//!     let addr = server.local_addr();
//!     tokio::spawn(server.run());
//!
//!     let mut client = QueueClient::connect(&addr.to_string()).await?;
//!     client.push("42").await?;
//!     assert_eq!(client.pull().await?, Some("42".to_string()));
//!     Ok(())
//! }
//! ```

/// Producer and consumer roles for the built-in broker
///
/// The producer pushes nanosecond timestamps, the consumer pulls them back
/// and records `now - sent` as a microsecond sample.
pub mod benchmark;

/// The in-memory FIFO queue and its TCP server
pub mod broker;

/// Command-line interface and configuration
///
/// Provides argument parsing using clap and converts CLI options into the
/// internal configuration structures used by each role.
pub mod cli;

/// Async client for the broker's line protocol
pub mod client;

/// Colorized log formatting for user-facing diagnostics
pub mod logging;

/// Per-file latency statistics
///
/// Sorting, percentile interpolation and the `TestResult` summary for a
/// single sample file.
pub mod metrics;

/// The line protocol spoken between clients and the broker
pub mod protocol;

/// Multi-file aggregation, ranking and report output
///
/// Discovers sample files for each configured backend, aggregates them per
/// system and renders the human-readable comparison report.
pub mod results;

/// Reading and writing sample files
pub mod samples;

pub mod utils;

pub use broker::{BrokerServer, MessageQueue};
pub use cli::{Args, Backend};
pub use client::QueueClient;
pub use metrics::{analyze_file, percentile, TestResult};
pub use protocol::{Command, Response};
pub use results::{AnalysisReport, BackendDescriptor, ResultsAnalyzer};

/// The current version of the benchmark suite
///
/// Populated from Cargo.toml and recorded in JSON exports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Address the broker listens on
    pub const LISTEN_ADDR: &str = "0.0.0.0:9000";

    /// Address clients connect to
    pub const BROKER_ADDR: &str = "127.0.0.1:9000";

    /// Number of messages the producer publishes
    pub const PRODUCER_MSG_COUNT: usize = 1000;

    /// Number of messages the consumer waits for before exiting
    pub const CONSUMER_MSG_COUNT: usize = 10000;

    /// Delay before the consumer polls again after an `EMPTY` response
    pub const EMPTY_BACKOFF: Duration = Duration::from_micros(100);

    /// Root directory holding one sub-directory of sample files per backend
    pub const RESULTS_DIR: &str = "results";

    /// File name pattern for sample files inside a backend directory
    pub const SAMPLE_FILE_PATTERN: &str = "test_*.txt";

    /// Socket send/receive buffer size for client connections
    pub const BUFFER_SIZE: usize = 8192;
}
