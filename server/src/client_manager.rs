//! Connection tracking for the gateway
//!
//! This module keeps the server-side record of every open WebSocket:
//! - Connection lifecycle (accepted, closed)
//! - The outbound queue used to write frames back to each socket
//! - Address bookkeeping for logging
//!
//! Room membership is not tracked here; that belongs to the room registry.

use log::{debug, info, warn};
use shared::ClientId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

/// Frames a socket may have queued before new ones are dropped, about two
/// seconds of snapshots. Every snapshot is complete, so a slow reader only
/// misses intermediate states.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 48;

/// Represents an open connection and the queue feeding its socket writer
#[derive(Debug)]
pub struct Client {
    /// Identifier assigned by the acceptor
    pub id: ClientId,
    /// Remote address, kept for logging
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Frames queued here are written to the socket in order
    pub sender: mpsc::Sender<Message>,
    /// Frames dropped because the queue was full
    pub dropped: u64,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
            dropped: 0,
        }
    }

    /// Queues a frame for this connection without waiting
    ///
    /// Returns false when the frame was not queued: either the socket is not
    /// keeping up and its queue is full, or the writer has already gone away
    /// while the connection is being torn down.
    pub fn send(&mut self, message: Message) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped == 1 || self.dropped % 100 == 0 {
                    warn!(
                        "Client {} is not reading, dropped {} frames",
                        self.id, self.dropped
                    );
                }
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Client {} writer is gone, dropping frame", self.id);
                false
            }
        }
    }
}

/// Manages all open connections
///
/// The ClientManager is owned by the gateway task, so every change to the
/// connection table happens on one execution context.
#[derive(Default)]
pub struct ClientManager {
    /// Open connections indexed by their identifier
    clients: HashMap<ClientId, Client>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Registers a freshly accepted connection
    pub fn add_client(
        &mut self,
        client_id: ClientId,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    ) {
        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));
    }

    /// Removes a connection
    ///
    /// Returns true if the connection was known. Removing drops the outbound
    /// sender, which lets the socket writer finish.
    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn get(&self, client_id: &ClientId) -> Option<&Client> {
        self.clients.get(client_id)
    }

    /// Queues a frame for one connection, returning false if it is unknown,
    /// backed up or already closing.
    pub fn send_to(&mut self, client_id: ClientId, message: Message) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => client.send(message),
            None => false,
        }
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no connections are open
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
