//! # Room Server Library
//!
//! This library provides the authoritative server for the multiplayer sandbox.
//! Players connect over WebSocket, are matched into rooms of up to 32, move
//! around a shared tile map, edit that map and chat with their room.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every room advances its players at a fixed 24 Hz. Clients only ever send a
//! heading; positions are computed here and published as full snapshots, so a
//! client can never place itself anywhere the server did not put it.
//!
//! ### Matchmaking
//! A joining player is placed in the oldest room with a free slot. When every
//! room is full a new one is created and started on the spot. Empty rooms are
//! deleted and their simulation task ends.
//!
//! ### State Broadcasting
//! After each tick a room publishes its complete state (players plus the
//! 4096-tile map) to its members. There is no delta encoding.
//!
//! ## Architecture Design
//!
//! ### One Task Per Room
//! Each room is a tokio task that exclusively owns its state. Nothing else
//! touches a room's players or map; the rest of the server talks to it through
//! a command channel and hears back through an outbound channel.
//!
//! ### Single Gateway
//! A single hub task owns the connection table and the room registry. Socket
//! tasks feed it decoded envelopes, rooms feed it outbound envelopes, and it
//! applies both sequentially. Each outbound envelope is serialized once and
//! queued for every recipient.
//!
//! ### WebSocket Transport
//! Text frames carry JSON envelopes of the form
//! `{"event": ..., "content": {"type": ..., "data": ...}}`. Frames that do not
//! decode are dropped without closing the connection.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Tracks open sockets and the queues feeding their writers.
//!
//! ### Game Module (`game`)
//! The authoritative state of one room and its per-tick movement rule.
//!
//! ### Room Module (`room`)
//! The per-room task: command handling, the tick loop and snapshot emission.
//!
//! ### Registry Module (`registry`)
//! Room creation, lookup, deletion and the join/leave bookkeeping.
//!
//! ### Gateway Module (`gateway`)
//! Envelope dispatch and outbound fan-out.
//!
//! ### Network Module (`network`)
//! The TCP listener, WebSocket handshakes and the hub loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::TICK_DURATION;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:3000", TICK_DURATION).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod gateway;
pub mod network;
pub mod registry;
pub mod room;
