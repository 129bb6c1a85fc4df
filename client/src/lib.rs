//! # Room Client Library
//!
//! This library provides the client for the multiplayer sandbox. It connects
//! to the room server over WebSocket, mirrors the room it was placed in,
//! renders it with macroquad and sends the player's heading, chat lines and
//! terrain edits back.
//!
//! ## Architecture Overview
//!
//! The client never simulates movement itself. The server publishes a full
//! snapshot every tick and the client only smooths between the last two.
//!
//! ### Snapshot Interpolation
//! Each mirrored player keeps the position from the previous snapshot. While
//! rendering, the client blends from that position to the latest one by the
//! fraction of a tick that has passed since the snapshot arrived. The fraction
//! is not clamped, so a late snapshot overshoots slightly instead of stalling.
//!
//! ### Change-Only Input
//! Held keys are reduced to a heading once per frame and a move is sent only
//! when that heading changes, including starting and stopping.
//!
//! ### Background Networking
//! The socket lives on a dedicated thread running a tokio runtime. The render
//! loop exchanges envelopes and events with it over channels and never blocks
//! on the network.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Mirrored players, the tile map, interpolation and the chat log.
//!
//! ### Input Module (`input`)
//! Key-to-heading mapping, change detection and the chat line editor.
//!
//! ### Network Module (`network`)
//! The WebSocket session, join metadata and the latency probe.
//!
//! ### Rendering Module (`rendering`)
//! Camera, tile culling, sprite sheets, animation and the HUD.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGameState;
//! use client::network::{player_identity, NetworkClient, NetworkEvent};
//! use std::time::Instant;
//!
//! let identity = player_identity(&mut rand::thread_rng(), None, None);
//! let mut network = NetworkClient::spawn("ws://127.0.0.1:3000".to_string(), identity).unwrap();
//! let mut game = ClientGameState::new();
//!
//! loop {
//!     for event in network.poll() {
//!         match event {
//!             NetworkEvent::Welcome(id) => game.local_id = Some(id),
//!             NetworkEvent::Update(snapshot) => {
//!                 game.apply_snapshot(snapshot, Instant::now());
//!             }
//!             _ => {}
//!         }
//!     }
//!     let _players = game.render_players(Instant::now());
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
