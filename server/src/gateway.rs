//! Routes inbound envelopes to rooms and fans outbound envelopes out to sockets.
//!
//! The gateway is owned by a single task. Connection events, decoded envelopes
//! and room output are all applied here one at a time, so the registry and the
//! connection table never see concurrent mutation.

use crate::client_manager::ClientManager;
use crate::registry::RoomRegistry;
use crate::room::{Outbound, RoomCommand, Target};
use log::{debug, error};
use shared::protocol::{
    ClientEnvelope, ConnectionNotice, PlayerRequest, RoomRequest, ServerEnvelope, TerrainRequest,
    Welcome,
};
use shared::ClientId;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub struct Gateway {
    clients: ClientManager,
    registry: RoomRegistry,
}

impl Gateway {
    pub fn new(registry: RoomRegistry) -> Self {
        Self {
            clients: ClientManager::new(),
            registry,
        }
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Registers a new socket and tells it which id it was given.
    pub fn connect(
        &mut self,
        client_id: ClientId,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    ) {
        self.clients.add_client(client_id, addr, sender);
        let welcome = ServerEnvelope::Connection(ConnectionNotice::Welcome(Welcome {
            id: client_id,
        }));
        self.emit(Target::Client(client_id), &welcome);
    }

    /// Dispatches one decoded envelope from `client_id`.
    pub fn handle_envelope(&mut self, client_id: ClientId, envelope: ClientEnvelope) {
        match envelope {
            ClientEnvelope::Room(RoomRequest::Join(Some(join))) => {
                self.registry.join(client_id, join.nickname, join.skin);
            }
            ClientEnvelope::Room(RoomRequest::Join(None)) => {
                debug!("Client {} sent a join without payload", client_id);
            }
            ClientEnvelope::Room(RoomRequest::Chat(chat)) => {
                self.forward(
                    client_id,
                    RoomCommand::Chat {
                        client_id,
                        message: chat.message,
                        timestamp: chat.timestamp,
                    },
                );
            }
            ClientEnvelope::Player(PlayerRequest::Move(movement)) => {
                self.forward(
                    client_id,
                    RoomCommand::Move {
                        client_id,
                        angle: movement.angle,
                    },
                );
            }
            ClientEnvelope::Terrain(TerrainRequest::Insert(edit)) => {
                self.forward(client_id, RoomCommand::PlaceTile { client_id, edit });
            }
            ClientEnvelope::Rcon(command) => {
                debug!("Client {} sent rcon command {:?}", client_id, command);
            }
        }
    }

    /// Cleans up after a closed socket: drops the connection and its player,
    /// deleting the room if it was the last one there.
    pub fn disconnect(&mut self, client_id: ClientId) {
        self.clients.remove_client(&client_id);
        self.registry.leave(client_id);
    }

    pub fn dispatch(&mut self, outbound: Outbound) {
        self.emit(outbound.target, &outbound.envelope);
    }

    /// Serializes an envelope once and queues it for every addressed socket.
    /// Returns how many sockets it was queued for.
    pub fn emit(&mut self, target: Target, envelope: &ServerEnvelope) -> usize {
        let text = match serde_json::to_string(envelope) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode outbound envelope: {}", e);
                return 0;
            }
        };

        let recipients: Vec<ClientId> = match target {
            Target::Client(client_id) => vec![client_id],
            Target::Room(room_id) => match self.registry.get(&room_id) {
                Some(room) => room.members().collect(),
                None => Vec::new(),
            },
            Target::Everyone => self.clients.client_ids(),
        };

        let clients = &mut self.clients;
        recipients
            .into_iter()
            .filter(|client_id| clients.send_to(*client_id, Message::Text(text.clone())))
            .count()
    }

    fn forward(&self, client_id: ClientId, command: RoomCommand) {
        if !self.registry.send_to_room_of(client_id, command) {
            debug!("Client {} is not in a room, dropping request", client_id);
        }
    }
}
