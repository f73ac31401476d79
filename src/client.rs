use crate::protocol::{Command, ProtocolError, Response};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

/// Errors seen by a protocol client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error talking to broker: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("broker closed the connection")]
    ConnectionClosed,

    #[error("broker rejected command: {0}")]
    Rejected(String),

    #[error("unexpected reply to {command}: {response}")]
    UnexpectedReply { command: String, response: String },
}

/// A single persistent connection to the broker.
///
/// Each call writes one command and waits for its one reply, matching the
/// broker's strict request/response pairing.
pub struct QueueClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    line: String,
}

impl QueueClient {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        Self::connect_with_buffer(addr, crate::defaults::BUFFER_SIZE).await
    }

    /// Connect with `TCP_NODELAY` and the given socket buffer sizes
    pub async fn connect_with_buffer(addr: &str, buffer_size: usize) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;

        // Configure socket options for low latency
        let std_stream = stream.into_std()?;
        let socket = socket2::Socket::from(std_stream.try_clone()?);
        socket.set_nodelay(true)?;
        socket.set_recv_buffer_size(buffer_size)?;
        socket.set_send_buffer_size(buffer_size)?;
        let stream = TcpStream::from_std(std_stream)?;

        debug!("Connected to broker at {}", addr);
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            line: String::new(),
        })
    }

    /// Send one command and read its reply
    pub async fn request(&mut self, command: &Command) -> Result<Response, ClientError> {
        self.writer.write_all(command.to_line().as_bytes()).await?;
        self.writer.flush().await?;

        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(Response::parse(&self.line)?)
    }

    /// Push a token and wait for the acknowledgement
    pub async fn push(&mut self, token: &str) -> Result<(), ClientError> {
        let command = Command::push(token)?;
        match self.request(&command).await? {
            Response::Ok => Ok(()),
            Response::Err(reason) => Err(ClientError::Rejected(reason)),
            other => Err(unexpected(&command, &other)),
        }
    }

    /// Pull the head token, or `None` when the queue is empty
    pub async fn pull(&mut self) -> Result<Option<String>, ClientError> {
        match self.request(&Command::Pull).await? {
            Response::Msg(token) => Ok(Some(token)),
            Response::Empty => Ok(None),
            Response::Err(reason) => Err(ClientError::Rejected(reason)),
            other => Err(unexpected(&Command::Pull, &other)),
        }
    }
}

fn unexpected(command: &Command, response: &Response) -> ClientError {
    ClientError::UnexpectedReply {
        command: command.to_string(),
        response: response.to_string(),
    }
}
