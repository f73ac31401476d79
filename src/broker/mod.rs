use std::net::SocketAddr;
use thiserror::Error;

pub mod queue;
pub mod server;

pub use queue::MessageQueue;
pub use server::BrokerServer;

/// Broker configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub listen_addr: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen_addr: crate::defaults::LISTEN_ADDR.to_string(),
        }
    }
}

/// Errors that stop the broker from serving
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The listening socket could not be bound; nothing can be served
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Snapshot of broker activity, logged on shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub connections_accepted: u64,
    pub queued_tokens: usize,
}

/// Identifier used only for log correlation
pub(crate) fn describe_peer(peer: Option<SocketAddr>) -> String {
    peer.map(|p| p.to_string())
        .unwrap_or_else(|| "unknown peer".to_string())
}
