use log::debug;
use shared::protocol::ChatBroadcast;
use shared::{lerp, ClientId, Player, Skin, Snapshot, TileMap, TICK_DURATION};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::time::Instant;

/// Number of chat lines kept for display
pub const CHAT_LOG_LEN: usize = 8;

/// Local copy of a remote player plus the position it is interpolating from
#[derive(Debug, Clone)]
pub struct PlayerMirror {
    pub player: Player,
    pub prev_x: f32,
    pub prev_y: f32,
}

impl PlayerMirror {
    fn seeded(player: Player) -> Self {
        Self {
            prev_x: player.x,
            prev_y: player.y,
            player,
        }
    }

    fn update(&mut self, player: Player) {
        self.prev_x = self.player.x;
        self.prev_y = self.player.y;
        self.player = player;
    }

    /// Position between the previous and the latest snapshot. `fraction` is
    /// deliberately left unclamped, so a late tick overshoots slightly.
    pub fn position_at(&self, fraction: f32) -> (f32, f32) {
        (
            lerp(self.prev_x, self.player.x, fraction),
            lerp(self.prev_y, self.player.y, fraction),
        )
    }
}

/// A player ready to draw: its identity and interpolated position
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPlayer {
    pub id: ClientId,
    pub nickname: String,
    pub skin: Skin,
    pub angle: Option<f32>,
    pub x: f32,
    pub y: f32,
}

pub struct ClientGameState {
    pub local_id: Option<ClientId>,
    players: BTreeMap<ClientId, PlayerMirror>,
    map: TileMap,
    /// Arrival time of the latest snapshot
    epoch: Option<Instant>,
    seen_skins: HashSet<Skin>,
    chat_log: VecDeque<String>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            local_id: None,
            players: BTreeMap::new(),
            map: TileMap::new(),
            epoch: None,
            seen_skins: HashSet::new(),
            chat_log: VecDeque::with_capacity(CHAT_LOG_LEN),
        }
    }

    /// Replaces the mirrored room with a fresh snapshot received at `now`.
    /// Returns the skins that had never been seen before.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, now: Instant) -> Vec<Skin> {
        let present: BTreeSet<ClientId> = snapshot.players.keys().copied().collect();
        self.players.retain(|id, _| {
            let keep = present.contains(id);
            if !keep {
                debug!("Player {} left the room", id);
            }
            keep
        });

        let mut new_skins = Vec::new();
        for (id, player) in snapshot.players {
            if self.seen_skins.insert(player.skin) {
                new_skins.push(player.skin);
            }
            match self.players.get_mut(&id) {
                Some(mirror) => mirror.update(player),
                None => {
                    self.players.insert(id, PlayerMirror::seeded(player));
                }
            }
        }

        self.map = snapshot.map;
        self.epoch = Some(now);
        new_skins
    }

    /// Elapsed time since the last snapshot, in ticks
    pub fn interpolation_fraction(&self, now: Instant) -> f32 {
        match self.epoch {
            Some(epoch) => {
                now.saturating_duration_since(epoch).as_secs_f32() / TICK_DURATION.as_secs_f32()
            }
            None => 0.0,
        }
    }

    pub fn interpolated_position(&self, id: ClientId, now: Instant) -> Option<(f32, f32)> {
        let fraction = self.interpolation_fraction(now);
        self.players
            .get(&id)
            .map(|mirror| mirror.position_at(fraction))
    }

    /// All players at their interpolated positions, sorted by y for drawing
    pub fn render_players(&self, now: Instant) -> Vec<RenderedPlayer> {
        let fraction = self.interpolation_fraction(now);
        let mut players: Vec<RenderedPlayer> = self
            .players
            .values()
            .map(|mirror| {
                let (x, y) = mirror.position_at(fraction);
                RenderedPlayer {
                    id: mirror.player.id,
                    nickname: mirror.player.nickname.clone(),
                    skin: mirror.player.skin,
                    angle: mirror.player.angle,
                    x,
                    y,
                }
            })
            .collect();
        players.sort_by(|a, b| a.y.total_cmp(&b.y));
        players
    }

    /// The local player's latest authoritative record
    pub fn local_player(&self) -> Option<&Player> {
        self.local_id
            .and_then(|id| self.players.get(&id))
            .map(|mirror| &mirror.player)
    }

    pub fn mirror(&self, id: ClientId) -> Option<&PlayerMirror> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    /// Appends a chat line, naming the local player "You"
    pub fn push_chat(&mut self, chat: &ChatBroadcast) {
        if self.chat_log.len() == CHAT_LOG_LEN {
            self.chat_log.pop_front();
        }
        let author = if self.local_id == Some(chat.entity.id) {
            "You"
        } else {
            chat.entity.nickname.as_str()
        };
        self.chat_log
            .push_back(format!("{}: {}", author, chat.message));
    }

    pub fn chat_log(&self) -> impl Iterator<Item = &str> {
        self.chat_log.iter().map(String::as_str)
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}
