use crate::benchmark::{ConsumerConfig, ProducerConfig};
use crate::broker::BrokerConfig;
use crate::results::BackendDescriptor;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Queue Latency Bench - a minimal FIFO broker and latency analyzer
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[clap(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the queue broker
    Serve(ServeArgs),
    /// Publish timestamp tokens to the broker
    Produce(ProduceArgs),
    /// Pull tokens from the broker and record latency samples
    Consume(ConsumeArgs),
    /// Analyze recorded sample files and rank backends
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[clap(short = 'a', long, default_value = crate::defaults::LISTEN_ADDR)]
    pub addr: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ProduceArgs {
    /// Queue server <host:port>
    #[clap(short = 'a', long, default_value = crate::defaults::BROKER_ADDR)]
    pub addr: String,

    /// Number of messages to publish
    #[clap(short = 'n', long, default_value_t = crate::defaults::PRODUCER_MSG_COUNT)]
    pub msg_count: usize,

    /// Socket buffer size for the broker connection
    #[clap(long, default_value_t = crate::defaults::BUFFER_SIZE)]
    pub buffer_size: usize,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConsumeArgs {
    /// Queue server <host:port>
    #[clap(short = 'a', long, default_value = crate::defaults::BROKER_ADDR)]
    pub addr: String,

    /// Number of messages to expect before exiting
    #[clap(short = 'n', long, default_value_t = crate::defaults::CONSUMER_MSG_COUNT)]
    pub msg_count: usize,

    /// Output file for latency samples (default: <results-dir>/simplified/test_<unixtime>.txt)
    #[clap(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Root directory for the default output file
    #[clap(long, default_value = crate::defaults::RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Back-off before polling again after an EMPTY reply (e.g. "100us", "1ms")
    #[clap(long, value_parser = parse_duration, default_value = "100us")]
    pub backoff: Duration,

    /// Socket buffer size for the broker connection
    #[clap(long, default_value_t = crate::defaults::BUFFER_SIZE)]
    pub buffer_size: usize,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Root directory holding one sub-directory per backend
    #[clap(short = 'r', long, default_value = crate::defaults::RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Backends to analyze (space-separated; default: all known backends)
    #[clap(short = 'b', long = "backend", value_enum, num_args = 1..)]
    pub backends: Vec<Backend>,

    /// File name pattern for sample files inside each backend directory
    #[clap(long, default_value = crate::defaults::SAMPLE_FILE_PATTERN)]
    pub pattern: String,

    /// Also write the full analysis as JSON to this file
    #[clap(long)]
    pub json: Option<PathBuf>,
}

/// Messaging backends whose results can be analyzed
///
/// Only `simplified` (the built-in broker) has producer and consumer roles
/// in this crate; the others are recorded by external clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Backend {
    /// The built-in queue broker
    #[clap(name = "simplified")]
    Simplified,

    /// RabbitMQ (AMQP)
    #[clap(name = "rabbitmq")]
    RabbitMq,

    /// MQTT broker
    #[clap(name = "mqtt")]
    Mqtt,

    /// Apache Kafka
    #[clap(name = "kafka")]
    Kafka,
}

impl Backend {
    /// Every known backend, in report order
    pub const ALL: [Backend; 4] = [
        Backend::Simplified,
        Backend::RabbitMq,
        Backend::Mqtt,
        Backend::Kafka,
    ];

    /// Name used for directories and report labels
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Simplified => "simplified",
            Backend::RabbitMq => "rabbitmq",
            Backend::Mqtt => "mqtt",
            Backend::Kafka => "kafka",
        }
    }

    /// Descriptors for the given backends under `root`; all known backends
    /// when `selected` is empty
    pub fn descriptors(selected: &[Backend], root: &Path, pattern: &str) -> Vec<BackendDescriptor> {
        let backends: &[Backend] = if selected.is_empty() {
            &Backend::ALL
        } else {
            selected
        };
        backends
            .iter()
            .map(|b| BackendDescriptor::new(b.name(), root.join(b.name()), pattern))
            .collect()
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Configuration for an analysis run
#[derive(Clone, Debug)]
pub struct AnalyzerConfig {
    pub backends: Vec<BackendDescriptor>,
    pub json_output: Option<PathBuf>,
}

impl From<&AnalyzeArgs> for AnalyzerConfig {
    fn from(args: &AnalyzeArgs) -> Self {
        Self {
            backends: Backend::descriptors(&args.backends, &args.results_dir, &args.pattern),
            json_output: args.json.clone(),
        }
    }
}

impl From<&ServeArgs> for BrokerConfig {
    fn from(args: &ServeArgs) -> Self {
        Self {
            listen_addr: args.addr.clone(),
        }
    }
}

impl From<&ProduceArgs> for ProducerConfig {
    fn from(args: &ProduceArgs) -> Self {
        Self {
            addr: args.addr.clone(),
            msg_count: args.msg_count,
            buffer_size: args.buffer_size,
        }
    }
}

impl From<&ConsumeArgs> for ConsumerConfig {
    fn from(args: &ConsumeArgs) -> Self {
        let output = args.output.clone().unwrap_or_else(|| {
            crate::samples::default_sample_path(
                &args.results_dir,
                Backend::Simplified.name(),
                crate::utils::unix_time_secs(),
            )
        });
        Self {
            addr: args.addr.clone(),
            msg_count: args.msg_count,
            output,
            backoff: args.backoff,
            buffer_size: args.buffer_size,
        }
    }
}

/// Parse duration from string (e.g., "100us", "10ms", "2s", "5m")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("us") {
        (stripped, "us")
    } else if let Some(stripped) = s.strip_suffix("µs") {
        (stripped, "us")
    } else if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else {
        (s, "us") // Bare numbers are microseconds
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a non-negative number: {}", s));
    }

    let micros = match unit {
        "us" => num,
        "ms" => num * 1_000.0,
        "s" => num * 1_000_000.0,
        "m" => num * 60_000_000.0,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(Duration::from_micros(micros as u64))
}
