use crate::core::handler::{ConnectionHandler, TrafficCounters};
use crate::core::link::RotatorLink;
use crate::domain::config::{ListenConfig, MalformedReply};
use crate::domain::error::{BridgeError, BridgeResult};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, info_span, warn, Instrument};

/// Pending connections the kernel may queue before `accept`.
const LISTEN_BACKLOG: u32 = 16;

/// Pause after a failed `accept` so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Snapshot of a connected client.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub id: String,
    pub addr: SocketAddr,
    pub connected_at: std::time::SystemTime,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

struct TrackedClient {
    id: String,
    addr: SocketAddr,
    connected_at: std::time::SystemTime,
    traffic: Arc<TrafficCounters>,
}

impl TrackedClient {
    fn snapshot(&self) -> ClientConnection {
        ClientConnection {
            id: self.id.clone(),
            addr: self.addr,
            connected_at: self.connected_at,
            bytes_received: self.traffic.bytes_received(),
            bytes_sent: self.traffic.bytes_sent(),
        }
    }
}

/// Accepts rotctld clients and gives each its own connection handler.
pub struct BridgeServer {
    listener: Option<TcpListener>,
    bind_addr: SocketAddr,
    link: Arc<dyn RotatorLink>,
    malformed_reply: MalformedReply,
    clients: Arc<Mutex<Vec<TrackedClient>>>,
    shutdown_sender: mpsc::Sender<()>,
    shutdown_receiver: Option<mpsc::Receiver<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl BridgeServer {
    /// Bind the listening socket with address reuse enabled.
    pub async fn bind(
        listen: &ListenConfig,
        link: Arc<dyn RotatorLink>,
        malformed_reply: MalformedReply,
    ) -> BridgeResult<Self> {
        let addr = resolve(listen).await?;
        let listener = listen_on(addr).map_err(|e| BridgeError::Startup {
            message: format!("Failed to bind to {}: {}", addr, e),
        })?;

        let bind_addr = listener.local_addr().map_err(|e| BridgeError::Startup {
            message: format!("Failed to get local address: {}", e),
        })?;

        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

        info!("Bridge listening on {}", bind_addr);

        Ok(Self {
            listener: Some(listener),
            bind_addr,
            link,
            malformed_reply,
            clients: Arc::new(Mutex::new(Vec::new())),
            shutdown_sender,
            shutdown_receiver: Some(shutdown_receiver),
            server_handle: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Spawn the accept loop. A server can only be started once.
    pub fn start(&mut self) -> BridgeResult<()> {
        let (listener, mut shutdown_receiver) =
            match (self.listener.take(), self.shutdown_receiver.take()) {
                (Some(listener), Some(receiver)) => (listener, receiver),
                _ => {
                    return Err(BridgeError::Connection {
                        message: "Server has already been started".to_string(),
                    })
                }
            };

        let link = Arc::clone(&self.link);
        let clients = Arc::clone(&self.clients);
        let malformed_reply = self.malformed_reply;

        let server_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                spawn_handler(stream, addr, &link, &clients, malformed_reply).await;
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {}", e);
                                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                            }
                        }
                    }

                    _ = shutdown_receiver.recv() => {
                        info!("Received shutdown signal, no longer accepting clients");
                        break;
                    }
                }
            }
        });

        self.server_handle = Some(server_handle);
        Ok(())
    }

    /// Stop accepting and close the listening socket. Connected clients are
    /// left to finish on their own.
    pub async fn stop(&mut self) -> BridgeResult<()> {
        if let Some(handle) = self.server_handle.take() {
            info!("Stopping bridge listener on {}", self.bind_addr);

            if let Err(e) = self.shutdown_sender.send(()).await {
                warn!("Failed to send shutdown signal: {}", e);
            }

            if let Err(e) = handle.await {
                warn!("Accept loop completed with error: {}", e);
            }

            info!("Bridge listener stopped");
        }

        Ok(())
    }

    pub async fn get_connected_clients(&self) -> Vec<ClientConnection> {
        self.clients.lock().await.iter().map(TrackedClient::snapshot).collect()
    }

    pub async fn get_client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub fn is_running(&self) -> bool {
        self.server_handle.is_some()
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            warn!("BridgeServer dropped while running; aborting accept loop");
            handle.abort();
        }
    }
}

/// Track a newly accepted client and serve it on its own task.
async fn spawn_handler(
    stream: TcpStream,
    addr: SocketAddr,
    link: &Arc<dyn RotatorLink>,
    clients: &Arc<Mutex<Vec<TrackedClient>>>,
    malformed_reply: MalformedReply,
) {
    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    info!("Client {} connected from {}", id, addr);

    let traffic = Arc::new(TrafficCounters::default());
    clients.lock().await.push(TrackedClient {
        id: id.clone(),
        addr,
        connected_at: std::time::SystemTime::now(),
        traffic: Arc::clone(&traffic),
    });

    let handler = ConnectionHandler::new(stream, addr.to_string(), Arc::clone(link))
        .with_malformed_reply(malformed_reply)
        .with_traffic(traffic);
    let clients = Arc::clone(clients);
    let span = info_span!("connection", id = %id);

    tokio::spawn(
        async move {
            if let Err(e) = handler.run().await {
                error!("Error handling client {}: {}", addr, e);
            }

            clients.lock().await.retain(|c| c.id != id);
            info!("Client disconnected: {}", addr);
        }
        .instrument(span),
    );
}

async fn resolve(listen: &ListenConfig) -> BridgeResult<SocketAddr> {
    let address = listen.address();
    let resolved = tokio::net::lookup_host(&address)
        .await
        .map_err(|e| BridgeError::Startup {
            message: format!("Cannot resolve listen address {}: {}", address, e),
        })?
        .next()
        .ok_or_else(|| BridgeError::Startup {
            message: format!("Listen address {} resolved to nothing", address),
        });
    resolved
}

fn listen_on(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}
