use super::{describe_peer, BrokerConfig, BrokerError, BrokerStats, MessageQueue};
use crate::protocol::{Command, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the accept loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// TCP front end for the shared [`MessageQueue`].
///
/// Every accepted connection gets its own task. Connections share nothing
/// but the queue, and a failing connection only ends its own task.
pub struct BrokerServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    queue: Arc<MessageQueue>,
    connections_accepted: Arc<AtomicU64>,
}

impl BrokerServer {
    /// Bind the listening socket.
    ///
    /// This is the only fatal broker error: without a listener there is
    /// nothing to serve.
    pub async fn bind(addr: &str) -> Result<Self, BrokerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BrokerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(BrokerError::LocalAddr)?;

        Ok(Self {
            listener,
            local_addr,
            queue: Arc::new(MessageQueue::new()),
            connections_accepted: Arc::new(AtomicU64::new(0)),
        })
    }

    pub async fn from_config(config: &BrokerConfig) -> Result<Self, BrokerError> {
        Self::bind(&config.listen_addr).await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the shared queue, mainly for inspection in tests
    pub fn queue(&self) -> Arc<MessageQueue> {
        Arc::clone(&self.queue)
    }

    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            queued_tokens: self.queue.len(),
        }
    }

    /// Serve until the process exits
    pub async fn run(self) -> BrokerStats {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes, then stop accepting.
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> BrokerStats
    where
        F: Future<Output = ()>,
    {
        info!("Queue broker listening on {}", self.local_addr);
        info!("Protocol: PUSH <token> | PULL -> MSG <token> | EMPTY");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => {
                        warn!("accept: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            "Broker stopped after {} connections with {} tokens still queued",
            stats.connections_accepted, stats.queued_tokens
        );
        stats
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
        }
        debug!("Client connected: {}", peer);

        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            match handle_connection(stream, queue).await {
                Ok(()) => debug!("Client disconnected: {}", peer),
                Err(e) => warn!("Connection {} closed with error: {}", peer, e),
            }
        });
    }
}

/// Apply one received line to the queue and produce the reply.
pub fn handle_command(queue: &MessageQueue, line: &str) -> Response {
    match Command::parse(line) {
        Ok(Command::Push(token)) => {
            queue.push(token);
            Response::Ok
        }
        Ok(Command::Pull) => match queue.pop() {
            Some(token) => Response::Msg(token),
            None => Response::Empty,
        },
        Err(e) => {
            debug!("Rejecting command: {}", e);
            Response::unknown_command()
        }
    }
}

/// Strict request/response loop for one connection.
///
/// Returns `Ok(())` when the peer closes the connection. A trailing line
/// without a terminating newline is treated as a close and not applied.
async fn handle_connection(stream: TcpStream, queue: Arc<MessageQueue>) -> std::io::Result<()> {
    let peer = describe_peer(stream.peer_addr().ok());
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);
    let mut line = Vec::with_capacity(64);

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 || line.last() != Some(&b'\n') {
            return Ok(());
        }

        let text = String::from_utf8_lossy(&line);
        let response = handle_command(&queue, &text);
        if let Response::Err(_) = response {
            debug!("Unknown command from {}: {:?}", peer, text.trim());
        }

        writer.write_all(response.to_line().as_bytes()).await?;
        writer.flush().await?;
    }
}
