//! JSON envelopes exchanged over the WebSocket.
//!
//! Every message is `{"event": ..., "content": {"type": ..., "data": ...}}`.
//! Both layers are modelled as adjacently tagged enums, so an unknown event or
//! type simply fails to decode and the caller decides what to do with it.

use crate::map::{GridPoint, TileMap};
use crate::{ClientId, Heading, Player, Skin};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "content", rename_all = "lowercase")]
pub enum ClientEnvelope {
    Room(RoomRequest),
    Player(PlayerRequest),
    Terrain(TerrainRequest),
    /// Remote console, reserved for administrators.
    Rcon(Option<serde_json::Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RoomRequest {
    /// `None` when the client sent no payload.
    Join(Option<JoinRequest>),
    Chat(ChatRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PlayerRequest {
    Move(MoveRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum TerrainRequest {
    Insert(TileEdit),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub nickname: String,
    pub skin: Skin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Client clock in milliseconds. Fractional values are accepted.
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub angle: Heading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEdit {
    pub tile: u16,
    pub grid: GridPoint,
}

impl ClientEnvelope {
    pub fn join(nickname: impl Into<String>, skin: Skin) -> Self {
        ClientEnvelope::Room(RoomRequest::Join(Some(JoinRequest {
            nickname: nickname.into(),
            skin,
        })))
    }

    pub fn chat(message: impl Into<String>, timestamp: f64) -> Self {
        ClientEnvelope::Room(RoomRequest::Chat(ChatRequest {
            message: message.into(),
            timestamp,
        }))
    }

    pub fn movement(angle: Heading) -> Self {
        ClientEnvelope::Player(PlayerRequest::Move(MoveRequest { angle }))
    }

    pub fn insert_tile(tile: u16, grid: GridPoint) -> Self {
        ClientEnvelope::Terrain(TerrainRequest::Insert(TileEdit { tile, grid }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "content", rename_all = "lowercase")]
pub enum ServerEnvelope {
    Update(Snapshot),
    Room(RoomNotice),
    Connection(ConnectionNotice),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RoomNotice {
    Chat(ChatBroadcast),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ConnectionNotice {
    Welcome(Welcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    pub id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBroadcast {
    pub entity: Player,
    pub message: String,
    pub timestamp: f64,
}

/// Complete state of one room, sent every tick. There is no delta encoding:
/// each snapshot replaces whatever the client held before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub players: BTreeMap<ClientId, Player>,
    pub map: TileMap,
}
