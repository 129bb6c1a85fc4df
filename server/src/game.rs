use log::{debug, info};
use rand::Rng;
use shared::protocol::{ChatBroadcast, TileEdit};
use shared::{
    ClientId, Heading, Player, RoomId, Skin, Snapshot, TerrainError, TileMap, SPAWN_MIN,
    SPAWN_SPREAD,
};
use std::collections::BTreeMap;

/// Authoritative state of a single room: its players and its tile map.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: RoomId,
    pub tick: u64,
    pub players: BTreeMap<ClientId, Player>,
    pub map: TileMap,
}

impl RoomState {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            tick: 0,
            players: BTreeMap::new(),
            map: TileMap::new(),
        }
    }

    pub fn add_player(&mut self, client_id: ClientId, nickname: &str, skin: Skin) -> &Player {
        let (spawn_x, spawn_y) = spawn_point(&mut rand::thread_rng());
        self.add_player_at(client_id, nickname, skin, spawn_x, spawn_y)
    }

    pub fn add_player_at(
        &mut self,
        client_id: ClientId,
        nickname: &str,
        skin: Skin,
        x: f32,
        y: f32,
    ) -> &Player {
        let player = Player::new(client_id, self.id, nickname, skin, x, y);
        info!(
            "Player {} ({}) joined room {} at ({}, {})",
            client_id, player.nickname, self.id, player.x, player.y
        );
        self.players.entry(client_id).or_insert(player)
    }

    pub fn remove_player(&mut self, client_id: &ClientId) -> Option<Player> {
        let removed = self.players.remove(client_id);
        if removed.is_some() {
            info!("Removed player {} from room {}", client_id, self.id);
        }
        removed
    }

    /// Overwrites the heading. The angle is taken as-is, without range checks.
    pub fn set_heading(&mut self, client_id: ClientId, angle: Heading) -> bool {
        match self.players.get_mut(&client_id) {
            Some(player) => {
                player.angle = angle;
                true
            }
            None => false,
        }
    }

    pub fn place_tile(&mut self, edit: &TileEdit) -> Result<usize, TerrainError> {
        let index = self.map.place(edit.grid, edit.tile)?;
        debug!("Room {}: tile {} set to {}", self.id, index, edit.tile);
        Ok(index)
    }

    pub fn chat(&self, client_id: ClientId, message: String, timestamp: f64) -> Option<ChatBroadcast> {
        let entity = self.players.get(&client_id)?.clone();
        Some(ChatBroadcast {
            entity,
            message,
            timestamp,
        })
    }

    /// Advances every moving player by one tick of dead reckoning.
    pub fn advance(&mut self) {
        for player in self.players.values_mut() {
            player.advance();
        }
        self.tick += 1;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            players: self.players.clone(),
            map: self.map.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

pub fn spawn_point<R: Rng>(rng: &mut R) -> (f32, f32) {
    let x = rng.gen_range(0..SPAWN_SPREAD) + SPAWN_MIN;
    let y = rng.gen_range(0..SPAWN_SPREAD) + SPAWN_MIN;
    (x as f32, y as f32)
}
