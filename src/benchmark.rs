//! # Producer and Consumer Roles
//!
//! These roles exercise the built-in broker end to end:
//!
//! 1. The producer pushes `N` tokens, each the current wall-clock time in
//!    nanoseconds, and waits for the `OK` after every push so it never runs
//!    ahead of the socket buffers.
//! 2. The consumer polls with `PULL` until it has received `N` messages,
//!    sleeping briefly on `EMPTY`. For each `MSG` it records
//!    `(now - sent) / 1000` microseconds as one sample line.
//!
//! Producer and consumer are normally separate processes; they share the
//! wall clock, not memory.

use crate::client::{ClientError, QueueClient};
use crate::samples::SampleWriter;
use crate::utils::{current_timestamp_ns, latency_micros};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for a producer run
#[derive(Clone, Debug)]
pub struct ProducerConfig {
    pub addr: String,
    pub msg_count: usize,
    pub buffer_size: usize,
}

/// Configuration for a consumer run
#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    pub addr: String,
    pub msg_count: usize,
    /// Sample file to create
    pub output: PathBuf,
    /// Sleep between polls that returned `EMPTY`
    pub backoff: Duration,
    pub buffer_size: usize,
}

/// Outcome of a producer run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProducerSummary {
    pub published: usize,
    pub elapsed: Duration,
}

/// Outcome of a consumer run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub received: usize,
    /// Messages whose token was not a nanosecond timestamp
    pub skipped_tokens: usize,
    pub empty_polls: usize,
    pub output: PathBuf,
    pub elapsed: Duration,
}

pub struct ProducerRunner {
    config: ProducerConfig,
}

impl ProducerRunner {
    pub fn new(config: ProducerConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<ProducerSummary> {
        let mut client = QueueClient::connect_with_buffer(&self.config.addr, self.config.buffer_size)
            .await
            .with_context(|| format!("dial {}", self.config.addr))?;

        let start = Instant::now();
        for i in 0..self.config.msg_count {
            let token = current_timestamp_ns().to_string();
            client
                .push(&token)
                .await
                .with_context(|| format!("push of message {} failed", i + 1))?;
        }

        let summary = ProducerSummary {
            published: self.config.msg_count,
            elapsed: start.elapsed(),
        };
        info!(
            "Published {} messages to {} in {:?}",
            summary.published, self.config.addr, summary.elapsed
        );
        Ok(summary)
    }
}

pub struct ConsumerRunner {
    config: ConsumerConfig,
}

impl ConsumerRunner {
    pub fn new(config: ConsumerConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<ConsumerSummary> {
        let mut writer = SampleWriter::create(&self.config.output)
            .with_context(|| format!("create output file {:?}", self.config.output))?;
        let mut client = QueueClient::connect_with_buffer(&self.config.addr, self.config.buffer_size)
            .await
            .with_context(|| format!("dial {}", self.config.addr))?;

        let start = Instant::now();
        let mut skipped_tokens = 0;
        let mut empty_polls = 0;

        while writer.written() < self.config.msg_count {
            let pulled = match client.pull().await {
                Ok(pulled) => pulled,
                Err(
                    e @ (ClientError::Rejected(_)
                    | ClientError::UnexpectedReply { .. }
                    | ClientError::Protocol(_)),
                ) => {
                    warn!("unexpected response: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match pulled {
                Some(token) => {
                    let received_ns = current_timestamp_ns();
                    match token.parse::<i64>() {
                        Ok(sent_ns) => writer.record(latency_micros(sent_ns, received_ns))?,
                        Err(_) => {
                            warn!("invalid timestamp format: {}", token);
                            skipped_tokens += 1;
                        }
                    }
                }
                None => {
                    empty_polls += 1;
                    tokio::time::sleep(self.config.backoff).await;
                }
            }
        }

        let output = writer.path().to_path_buf();
        let received = writer.finish()?;
        debug!("Consumer saw {} empty polls", empty_polls);
        info!(
            "Received {} messages, latencies written to {}",
            received,
            output.display()
        );

        Ok(ConsumerSummary {
            received,
            skipped_tokens,
            empty_polls,
            output,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerServer;
    use crate::samples::read_samples;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_consumer_skips_non_timestamp_tokens() {
        let server = BrokerServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().to_string();
        let queue = server.queue();
        tokio::spawn(server.run());

        let now = current_timestamp_ns();
        queue.push("not-a-timestamp".to_string());
        queue.push(now.to_string());
        queue.push(now.to_string());

        let dir = TempDir::new().unwrap();
        let output = dir.path().join("simplified").join("test_1.txt");
        let consumer = ConsumerRunner::new(ConsumerConfig {
            addr,
            msg_count: 2,
            output: output.clone(),
            backoff: Duration::from_micros(100),
            buffer_size: 8192,
        });

        let summary = consumer.run().await.unwrap();
        assert_eq!(summary.received, 2);
        assert_eq!(summary.skipped_tokens, 1);
        assert_eq!(summary.output, output);

        let set = read_samples(&output).unwrap();
        assert_eq!(set.samples.len(), 2);
        assert!(set.samples.iter().all(|&s| s >= 0));
    }

    #[tokio::test]
    async fn test_consumer_skips_unexpected_replies() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::TcpListener;

        // A broker stand-in that answers the first PULL with an error and
        // the second with a fresh timestamp.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let mut replies = vec![
                "ERR busy\n".to_string(),
                format!("MSG {}\n", current_timestamp_ns()),
            ]
            .into_iter();
            while let Ok(Some(_)) = lines.next_line().await {
                let reply = replies.next().unwrap_or_else(|| "EMPTY\n".to_string());
                write_half.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        let dir = TempDir::new().unwrap();
        let output = dir.path().join("test_1.txt");
        let consumer = ConsumerRunner::new(ConsumerConfig {
            addr,
            msg_count: 1,
            output: output.clone(),
            backoff: Duration::from_micros(100),
            buffer_size: 8192,
        });

        let summary = consumer.run().await.unwrap();
        assert_eq!(summary.received, 1);
        assert_eq!(read_samples(&output).unwrap().samples.len(), 1);
    }

    #[tokio::test]
    async fn test_producer_fails_without_broker() {
        // Bind then drop to get a port with nothing listening.
        let addr = {
            let server = BrokerServer::bind("127.0.0.1:0").await.unwrap();
            server.local_addr().to_string()
        };
        let producer = ProducerRunner::new(ProducerConfig {
            addr,
            msg_count: 1,
            buffer_size: 8192,
        });
        assert!(producer.run().await.is_err());
    }
}
