use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub mod map;
pub mod protocol;

pub use map::{GridPoint, TerrainError, TileMap, TileMapError};
pub use protocol::{ClientEnvelope, ServerEnvelope, Snapshot};

pub const TICK_RATE: u32 = 24;
pub const TICK_DURATION: Duration = Duration::from_nanos(1_000_000_000 / TICK_RATE as u64);
pub const ROOM_CAPACITY: usize = 32;
pub const PLAYER_SPEED: f32 = 3.0;
pub const MAX_NICKNAME_LEN: usize = 24;

pub const TILE_SIZE: i32 = 32;
pub const MAP_COLUMNS: usize = 64;
pub const MAP_ROWS: usize = 64;
pub const MAP_SIZE: usize = MAP_COLUMNS * MAP_ROWS;
pub const DEFAULT_TILE: u16 = 71;
pub const WORLD_WIDTH: f32 = (MAP_COLUMNS as i32 * TILE_SIZE) as f32;
pub const WORLD_HEIGHT: f32 = (MAP_ROWS as i32 * TILE_SIZE) as f32;

/// Spawn coordinates are `SPAWN_MIN + [0, SPAWN_SPREAD)` on each axis.
pub const SPAWN_MIN: u32 = 10;
pub const SPAWN_SPREAD: u32 = 2028;

/// Connection identifier, assigned by the server when a socket is accepted.
pub type ClientId = u32;
pub type RoomId = Uuid;

/// A player's direction of travel in radians; `None` means standing still.
pub type Heading = Option<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skin {
    Black,
    Blue,
    Brown,
    Green,
    Grey,
    LightBlue,
    Orange,
    Pink,
    Purple,
    Red,
    White,
    Yellow,
}

impl Skin {
    pub const ALL: [Skin; 12] = [
        Skin::Black,
        Skin::Blue,
        Skin::Brown,
        Skin::Green,
        Skin::Grey,
        Skin::LightBlue,
        Skin::Orange,
        Skin::Pink,
        Skin::Purple,
        Skin::Red,
        Skin::White,
        Skin::Yellow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Skin::Black => "black",
            Skin::Blue => "blue",
            Skin::Brown => "brown",
            Skin::Green => "green",
            Skin::Grey => "grey",
            Skin::LightBlue => "light_blue",
            Skin::Orange => "orange",
            Skin::Pink => "pink",
            Skin::Purple => "purple",
            Skin::Red => "red",
            Skin::White => "white",
            Skin::Yellow => "yellow",
        }
    }
}

impl fmt::Display for Skin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown skin `{0}`")]
pub struct UnknownSkin(pub String);

impl FromStr for Skin {
    type Err = UnknownSkin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Skin::ALL
            .iter()
            .copied()
            .find(|skin| skin.as_str() == s)
            .ok_or_else(|| UnknownSkin(s.to_string()))
    }
}

/// Authoritative player record, owned by exactly one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: ClientId,
    pub room: RoomId,
    pub nickname: String,
    pub skin: Skin,
    pub x: f32,
    pub y: f32,
    pub angle: Heading,
}

impl Player {
    pub fn new(id: ClientId, room: RoomId, nickname: &str, skin: Skin, x: f32, y: f32) -> Self {
        Self {
            id,
            room,
            nickname: truncate_nickname(nickname),
            skin,
            x,
            y,
            angle: None,
        }
    }

    /// Moves the player one tick along its heading. Stationary players stay put.
    /// No clamping is applied, so players may drift past the map edge.
    pub fn advance(&mut self) {
        if let Some(angle) = self.angle {
            let (dx, dy) = heading_step(angle);
            self.x += dx;
            self.y += dy;
        }
    }
}

/// Per-tick displacement for a heading at `PLAYER_SPEED`.
pub fn heading_step(angle: f32) -> (f32, f32) {
    (angle.cos() * PLAYER_SPEED, angle.sin() * PLAYER_SPEED)
}

pub fn truncate_nickname(nickname: &str) -> String {
    nickname.chars().take(MAX_NICKNAME_LEN).collect()
}

pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * t
}

/// Clamps without panicking when `max < min` (viewport larger than the world).
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.min(max).max(min)
}
