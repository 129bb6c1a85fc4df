//! Room registry and matchmaking
//!
//! The registry owns every room handle and is the only place rooms are
//! created or deleted. It keeps its own record of which connection sits in
//! which room, so capacity checks never have to ask a room task for its
//! player count.
//!
//! Matchmaking is a linear scan over rooms in creation order, returning the
//! first one with a free slot. Room counts are expected to stay small, so the
//! O(rooms) scan is an accepted scaling limit.

use crate::room::{Outbound, Room, RoomCommand};
use log::{info, warn};
use shared::{ClientId, RoomId, Skin, ROOM_CAPACITY};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Registry-side view of a running room
#[derive(Debug)]
pub struct RoomHandle {
    pub id: RoomId,
    members: BTreeSet<ClientId>,
    commands: mpsc::UnboundedSender<RoomCommand>,
    task: JoinHandle<()>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().copied()
    }

    fn send(&self, command: RoomCommand) -> bool {
        if let Err(e) = self.commands.send(command) {
            warn!("Room {} is no longer accepting commands: {}", self.id, e);
            return false;
        }
        true
    }
}

pub struct RoomRegistry {
    /// Rooms in creation order
    rooms: Vec<RoomHandle>,
    /// Which room each joined connection belongs to
    membership: HashMap<ClientId, RoomId>,
    capacity: usize,
    tick_duration: Duration,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl RoomRegistry {
    pub fn new(tick_duration: Duration, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self::with_capacity(ROOM_CAPACITY, tick_duration, outbound)
    }

    pub fn with_capacity(
        capacity: usize,
        tick_duration: Duration,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            rooms: Vec::new(),
            membership: HashMap::new(),
            capacity,
            tick_duration,
            outbound,
        }
    }

    /// Returns the first room with a free slot, creating and starting a new
    /// room when every existing one is full.
    pub fn find_or_create(&mut self) -> RoomId {
        if let Some(room) = self
            .rooms
            .iter()
            .find(|room| room.player_count() < self.capacity)
        {
            return room.id;
        }

        let id = Uuid::new_v4();
        let (commands, task) = Room::spawn(id, self.tick_duration, self.outbound.clone());
        self.rooms.push(RoomHandle {
            id,
            members: BTreeSet::new(),
            commands,
            task,
        });

        info!("Created room {} ({} rooms active)", id, self.rooms.len());
        id
    }

    pub fn get(&self, id: &RoomId) -> Option<&RoomHandle> {
        self.rooms.iter().find(|room| room.id == *id)
    }

    /// Removes a room and closes its command channel, which ends its task.
    /// Returns the task handle so callers can wait for it to finish.
    pub fn delete(&mut self, id: &RoomId) -> Option<JoinHandle<()>> {
        let position = self.rooms.iter().position(|room| room.id == *id)?;
        let room = self.rooms.remove(position);
        self.membership.retain(|_, room_id| room_id != id);

        info!("Deleted room {} ({} rooms active)", id, self.rooms.len());
        let RoomHandle { commands, task, .. } = room;
        drop(commands);
        Some(task)
    }

    /// Places a connection in a room and spawns its player there. A connection
    /// that already belongs to a room is left where it is.
    pub fn join(&mut self, client_id: ClientId, nickname: String, skin: Skin) -> Option<RoomId> {
        if let Some(room_id) = self.membership.get(&client_id) {
            warn!(
                "Client {} already joined room {}, ignoring join",
                client_id, room_id
            );
            return None;
        }

        let room_id = self.find_or_create();
        let room = self.room_mut(&room_id)?;
        room.members.insert(client_id);
        room.send(RoomCommand::Join {
            client_id,
            nickname,
            skin,
        });
        self.membership.insert(client_id, room_id);

        Some(room_id)
    }

    /// Removes a connection from its room, deleting the room once it is empty.
    /// Returns the room the connection was in, if any.
    pub fn leave(&mut self, client_id: ClientId) -> Option<RoomId> {
        let room_id = self.membership.remove(&client_id)?;

        let now_empty = match self.room_mut(&room_id) {
            Some(room) => {
                room.members.remove(&client_id);
                room.send(RoomCommand::Leave { client_id });
                room.members.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.delete(&room_id);
        }

        Some(room_id)
    }

    /// Forwards a command to the room the connection belongs to.
    pub fn send_to_room_of(&self, client_id: ClientId, command: RoomCommand) -> bool {
        match self.room_of(client_id).and_then(|room_id| self.get(&room_id)) {
            Some(room) => room.send(command),
            None => false,
        }
    }

    pub fn room_of(&self, client_id: ClientId) -> Option<RoomId> {
        self.membership.get(&client_id).copied()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|room| room.id).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn room_mut(&mut self, id: &RoomId) -> Option<&mut RoomHandle> {
        self.rooms.iter_mut().find(|room| room.id == *id)
    }
}
