//! Per-room simulation task.
//!
//! Each room runs as its own tokio task that owns a [`RoomState`]. The gateway
//! reaches it only through [`RoomCommand`]s, and the task reports snapshots and
//! chat back as [`Outbound`] messages, so no room data is ever shared.
//!
//! The task stops when its command channel closes (the registry deleted the
//! room), when the room is empty at the top of a tick, or when nobody is left
//! to receive its output.

use crate::game::RoomState;
use log::{debug, info, warn};
use shared::protocol::{RoomNotice, ServerEnvelope, TileEdit};
use shared::{ClientId, Heading, RoomId, Skin};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from the gateway to a room task
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        client_id: ClientId,
        nickname: String,
        skin: Skin,
    },
    Leave {
        client_id: ClientId,
    },
    Move {
        client_id: ClientId,
        angle: Heading,
    },
    Chat {
        client_id: ClientId,
        message: String,
        timestamp: f64,
    },
    PlaceTile {
        client_id: ClientId,
        edit: TileEdit,
    },
}

/// Who an outbound envelope is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Client(ClientId),
    Room(RoomId),
    Everyone,
}

/// Messages sent from room tasks back to the gateway
#[derive(Debug, Clone)]
pub struct Outbound {
    pub target: Target,
    pub envelope: ServerEnvelope,
}

pub struct Room {
    state: RoomState,
    tick_duration: Duration,
    commands: mpsc::UnboundedReceiver<RoomCommand>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Room {
    /// Spawns the tick loop for a new, empty room and returns its command
    /// sender together with the task handle.
    pub fn spawn(
        id: RoomId,
        tick_duration: Duration,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> (mpsc::UnboundedSender<RoomCommand>, JoinHandle<()>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let room = Room {
            state: RoomState::new(id),
            tick_duration,
            commands,
            outbound,
        };
        let task = tokio::spawn(room.run());
        (command_tx, task)
    }

    async fn run(mut self) {
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        tick_interval.tick().await;

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("Room {} command channel closed", self.state.id);
                        break;
                    }
                },

                _ = tick_interval.tick() => {
                    if !self.tick() {
                        break;
                    }
                },
            }
        }

        info!("Room {} stopped after {} ticks", self.state.id, self.state.tick);
    }

    fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                client_id,
                nickname,
                skin,
            } => {
                self.state.add_player(client_id, &nickname, skin);
            }
            RoomCommand::Leave { client_id } => {
                self.state.remove_player(&client_id);
            }
            RoomCommand::Move { client_id, angle } => {
                self.state.set_heading(client_id, angle);
            }
            RoomCommand::Chat {
                client_id,
                message,
                timestamp,
            } => {
                if let Some(chat) = self.state.chat(client_id, message, timestamp) {
                    let envelope = ServerEnvelope::Room(RoomNotice::Chat(chat));
                    self.emit(Target::Room(self.state.id), envelope);
                }
            }
            RoomCommand::PlaceTile { client_id, edit } => {
                if let Err(e) = self.state.place_tile(&edit) {
                    warn!(
                        "Rejected terrain edit from client {} in room {}: {}",
                        client_id, self.state.id, e
                    );
                }
            }
        }
    }

    /// Runs one simulation step. Returns false once the room should stop.
    fn tick(&mut self) -> bool {
        if self.state.is_empty() {
            return false;
        }

        self.state.advance();

        let envelope = ServerEnvelope::Update(self.state.snapshot());
        self.emit(Target::Room(self.state.id), envelope)
    }

    fn emit(&self, target: Target, envelope: ServerEnvelope) -> bool {
        if let Err(e) = self.outbound.send(Outbound { target, envelope }) {
            warn!("Room {} lost its gateway: {}", self.state.id, e);
            return false;
        }
        true
    }
}
