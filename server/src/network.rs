//! Server network layer: WebSocket accept loop, per-connection tasks and the
//! hub loop that owns the gateway

use crate::client_manager::OUTBOUND_QUEUE_CAPACITY;
use crate::gateway::Gateway;
use crate::registry::RoomRegistry;
use crate::room::Outbound;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientEnvelope, ClientId};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks to the hub loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        client_id: ClientId,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    },
    Received {
        client_id: ClientId,
        envelope: ClientEnvelope,
    },
    Disconnected {
        client_id: ClientId,
    },
}

/// Main server: accepts sockets and routes their traffic through one gateway
pub struct Server {
    listener: TcpListener,
    tick_duration: Duration,
}

impl Server {
    pub async fn bind(addr: &str, tick_duration: Duration) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on ws://{}", listener.local_addr()?);

        Ok(Server {
            listener,
            tick_duration,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the acceptor and the hub until the task is dropped
    pub async fn run(self) {
        let (server_tx, mut server_rx) = mpsc::unbounded_channel::<ServerMessage>();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let mut gateway = Gateway::new(RoomRegistry::new(self.tick_duration, outbound_tx));

        // Owns the listener, so dropping the hub also stops accepting
        let _acceptor = AbortOnDrop(tokio::spawn(accept_loop(self.listener, server_tx)));

        info!("Server started successfully");

        loop {
            tokio::select! {
                Some(message) = server_rx.recv() => match message {
                    ServerMessage::Connected { client_id, addr, sender } => {
                        gateway.connect(client_id, addr, sender);
                    }
                    ServerMessage::Received { client_id, envelope } => {
                        gateway.handle_envelope(client_id, envelope);
                    }
                    ServerMessage::Disconnected { client_id } => {
                        gateway.disconnect(client_id);
                    }
                },

                Some(outbound) = outbound_rx.recv() => {
                    gateway.dispatch(outbound);
                },

                else => break,
            }
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Accepts sockets and hands each one to its own connection task. Ids are
/// assigned in accept order starting at 1.
async fn accept_loop(listener: TcpListener, server_tx: mpsc::UnboundedSender<ServerMessage>) {
    let mut next_client_id: ClientId = 1;

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let client_id = next_client_id;
                next_client_id = next_client_id.wrapping_add(1).max(1);
                tokio::spawn(handle_connection(stream, addr, client_id, server_tx.clone()));
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Drives one socket: performs the handshake, spawns its writer and feeds
/// decoded envelopes to the hub until the socket closes
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    client_id: ClientId,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (sender, mut receiver) = mpsc::channel::<Message>(OUTBOUND_QUEUE_CAPACITY);

    if server_tx
        .send(ServerMessage::Connected {
            client_id,
            addr,
            sender,
        })
        .is_err()
    {
        return;
    }

    // Ends once the gateway drops the sender for this client
    let writer = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(e) = write.send(message).await {
                debug!("Failed to write to client {}: {}", client_id, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEnvelope>(&text) {
                Ok(envelope) => {
                    if server_tx
                        .send(ServerMessage::Received {
                            client_id,
                            envelope,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Dropping undecodable frame from client {}: {}", client_id, e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(_) => {
                debug!("Ignoring non-text frame from client {}", client_id);
            }
            Err(e) => {
                debug!("Connection error for client {}: {}", client_id, e);
                break;
            }
        }
    }

    let _ = server_tx.send(ServerMessage::Disconnected { client_id });
    if let Err(e) = writer.await {
        error!("Writer task for client {} panicked: {}", client_id, e);
    }
}
