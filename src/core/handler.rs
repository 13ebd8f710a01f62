use crate::core::link::RotatorLink;
use crate::core::translator::{self, Translation};
use crate::domain::command::{decode_ascii, ClientResponse};
use crate::domain::config::MalformedReply;
use crate::domain::error::{BridgeError, BridgeResult};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

/// Largest chunk taken from the client socket in one receive.
pub const RECV_BUFFER_SIZE: usize = 256;

/// Totals reported when a connection ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub commands: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

/// Live byte counters for one connection, readable while it is served.
#[derive(Debug, Default)]
pub struct TrafficCounters {
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
}

impl TrafficCounters {
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

enum Flow {
    Continue,
    Close,
}

/// Serves one rotctld client until it disconnects or sends `Q`.
pub struct ConnectionHandler<S> {
    stream: S,
    peer: String,
    link: Arc<dyn RotatorLink>,
    malformed_reply: MalformedReply,
    summary: ConnectionSummary,
    traffic: Arc<TrafficCounters>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: impl Into<String>, link: Arc<dyn RotatorLink>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            link,
            malformed_reply: MalformedReply::default(),
            summary: ConnectionSummary::default(),
            traffic: Arc::new(TrafficCounters::default()),
        }
    }

    pub fn with_malformed_reply(mut self, policy: MalformedReply) -> Self {
        self.malformed_reply = policy;
        self
    }

    /// Report traffic into shared counters as it happens.
    pub fn with_traffic(mut self, traffic: Arc<TrafficCounters>) -> Self {
        self.traffic = traffic;
        self
    }

    /// Read, translate and answer requests until the connection closes.
    ///
    /// Peer disconnects end the loop normally; only an unexpected socket
    /// failure is returned as an error.
    pub async fn run(mut self) -> BridgeResult<ConnectionSummary> {
        info!("Handler started for {}", self.peer);
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        loop {
            let n = match self.stream.read(&mut buffer).await {
                Ok(0) => {
                    info!("No data from {}; closing handler", self.peer);
                    break;
                }
                Ok(n) => n,
                Err(e) if is_disconnect(&e) => {
                    info!("Connection closed by {}: {}", self.peer, e);
                    break;
                }
                Err(e) => {
                    return Err(BridgeError::Connection {
                        message: format!("Read from {} failed: {}", self.peer, e),
                    });
                }
            };

            self.summary.bytes_received += n as u64;
            self.traffic.record_received(n);
            let text = decode_ascii(&buffer[..n]);
            debug!("Received {} bytes from {}: {:?}", n, self.peer, text);

            let mut closing = false;
            for line in request_lines(&text) {
                if let Flow::Close = self.handle_line(line).await? {
                    closing = true;
                    break;
                }
            }
            if closing {
                break;
            }
        }

        info!(
            "Handler exited for {} ({} commands, {} bytes in, {} bytes out)",
            self.peer, self.summary.commands, self.summary.bytes_received, self.summary.bytes_sent
        );
        Ok(self.summary)
    }

    async fn handle_line(&mut self, line: &str) -> BridgeResult<Flow> {
        info!("-> rotctld command: '{}'", line);
        self.summary.commands += 1;

        match self.dispatch(line).await {
            Ok(flow) => Ok(flow),
            Err(e) if e.is_request_scoped() => {
                error!("Request '{}' from {} failed: {}", line, self.peer, e);
                if matches!(e, BridgeError::Parse { .. })
                    && self.malformed_reply == MalformedReply::Nak
                {
                    self.respond(ClientResponse::Nak).await?;
                }
                Ok(Flow::Continue)
            }
            Err(e) => Err(e),
        }
    }

    async fn dispatch(&mut self, line: &str) -> BridgeResult<Flow> {
        let command = translator::parse_command(line)?;

        match translator::translate(&command) {
            Translation::Query { azimuth, elevation } => {
                let (azimuth_line, elevation_line) =
                    self.link.exchange_pair(azimuth, elevation).await?;
                self.respond(translator::position_response(&azimuth_line, &elevation_line))
                    .await?;
            }
            Translation::Move {
                azimuth,
                elevation,
                reply,
            } => {
                self.link.exchange_pair(azimuth, elevation).await?;
                self.respond(reply).await?;
            }
            Translation::Reply(reply) => self.respond(reply).await?,
            Translation::Close(notice) => {
                info!("Received quit from {}; forwarding to rotator", self.peer);
                if let Err(e) = self.link.notify(notice).await {
                    debug!("Ignoring failed quit notification: {}", e);
                }
                return Ok(Flow::Close);
            }
        }

        Ok(Flow::Continue)
    }

    async fn respond(&mut self, response: ClientResponse) -> BridgeResult<()> {
        let Some(wire) = response.to_wire() else {
            return Ok(());
        };

        self.stream
            .write_all(wire.as_bytes())
            .await
            .map_err(|e| BridgeError::Connection {
                message: format!("Write to {} failed: {}", self.peer, e),
            })?;
        self.stream.flush().await.map_err(|e| BridgeError::Connection {
            message: format!("Flush to {} failed: {}", self.peer, e),
        })?;

        self.summary.bytes_sent += wire.len() as u64;
        self.traffic.record_sent(wire.len());
        info!("<- response to {}: {:?}", self.peer, wire);
        Ok(())
    }
}

/// Non-empty lines of a received chunk, split on any `\r`/`\n` run.
pub fn request_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == '\r' || c == '\n').filter(|line| !line.is_empty())
}

fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
