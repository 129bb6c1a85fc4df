//! Integration tests for the room server and client
//!
//! These tests start a real server on an ephemeral port and talk to it over
//! WebSocket, the same way the game client does.

use client::game::ClientGameState;
use client::network::{run_session, NetworkEvent};
use futures_util::{SinkExt, StreamExt};
use server::network::Server;
use shared::protocol::{ConnectionNotice, JoinRequest, RoomNotice};
use shared::{
    ClientEnvelope, ClientId, GridPoint, ServerEnvelope, Skin, Snapshot, DEFAULT_TILE, MAP_SIZE,
    TICK_DURATION,
};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// CONNECTION AND PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests that every connection is greeted with its own id
    #[tokio::test]
    async fn welcome_assigns_distinct_ids() {
        let url = start_server().await;
        let (_first, first_id) = connect(&url).await;
        let (_second, second_id) = connect(&url).await;

        assert_ne!(first_id, second_id);
    }

    /// Tests a hand-written join envelope against the wire format
    #[tokio::test]
    async fn raw_join_envelope_produces_update() {
        let url = start_server().await;
        let (mut socket, id) = connect(&url).await;

        socket
            .send(Message::Text(
                r#"{"event":"room","content":{"type":"join","data":{"nickname":"raw","skin":"light_blue"}}}"#
                    .to_string(),
            ))
            .await
            .unwrap();

        let snapshot = next_update(&mut socket).await;
        let player = &snapshot.players[&id];
        assert_eq!(player.nickname, "raw");
        assert_eq!(player.skin, Skin::LightBlue);
        assert_eq!(player.angle, None);
        assert!((10.0..2038.0).contains(&player.x));
        assert!((10.0..2038.0).contains(&player.y));

        assert_eq!(snapshot.map.len(), MAP_SIZE);
        assert!(snapshot.map.tiles().iter().all(|&tile| tile == DEFAULT_TILE));
    }

    /// Tests that a join without payload leaves the connection out of every room
    #[tokio::test]
    async fn join_without_payload_is_ignored() {
        let url = start_server().await;
        let (mut socket, _) = connect(&url).await;

        socket
            .send(Message::Text(
                r#"{"event":"room","content":{"type":"join"}}"#.to_string(),
            ))
            .await
            .unwrap();

        let silence = timeout(TICK_DURATION * 8, next_envelope(&mut socket)).await;
        assert!(silence.is_err(), "unexpected frame: {:?}", silence);
    }

    /// Tests that malformed and unknown envelopes are dropped without closing
    #[tokio::test]
    async fn malformed_envelopes_are_dropped() {
        let url = start_server().await;
        let (mut socket, id) = connect(&url).await;

        for junk in [
            "{",
            r#"{"event":"weather","content":{"type":"rain","data":{}}}"#,
            r#"{"event":"player","content":{"type":"teleport","data":{"x":1}}}"#,
            r#"{"event":"rcon","content":{"type":"kick","data":{"id":1}}}"#,
        ] {
            socket.send(Message::Text(junk.to_string())).await.unwrap();
        }
        send(&mut socket, &ClientEnvelope::join("after_junk", Skin::Red)).await;

        let snapshot = next_update(&mut socket).await;
        assert_eq!(snapshot.players[&id].nickname, "after_junk");
    }
}

/// ROOM SIMULATION TESTS
mod room_tests {
    use super::*;

    /// Tests that a single move keeps the player walking right at 3 units per tick
    #[tokio::test]
    async fn move_right_advances_every_tick() {
        let url = start_server().await;
        let (mut socket, id) = join(&url, "walker", Skin::Brown).await;

        send(&mut socket, &ClientEnvelope::movement(Some(0.0))).await;
        let mut previous = next_update_where(&mut socket, |s| s.players[&id].angle == Some(0.0))
            .await
            .players[&id]
            .clone();

        for _ in 0..4 {
            let current = next_update(&mut socket).await.players[&id].clone();
            assert!((current.x - previous.x - 3.0).abs() < 1e-3);
            assert_eq!(current.y, previous.y);
            previous = current;
        }

        send(&mut socket, &ClientEnvelope::movement(None)).await;
        let stopped = next_update_where(&mut socket, |s| s.players[&id].angle.is_none())
            .await
            .players[&id]
            .clone();
        let later = next_update(&mut socket).await.players[&id].clone();
        assert_eq!(stopped.x, later.x);
        assert_eq!(stopped.y, later.y);
    }

    /// Tests that two players joining back to back share one room
    #[tokio::test]
    async fn quick_joins_share_a_room() {
        let url = start_server().await;
        let (mut first, first_id) = join(&url, "one", Skin::Black).await;
        let (mut second, second_id) = join(&url, "two", Skin::White).await;

        let seen_by_first = next_update_where(&mut first, |s| s.players.len() == 2).await;
        let seen_by_second = next_update_where(&mut second, |s| s.players.len() == 2).await;

        for snapshot in [seen_by_first, seen_by_second] {
            assert!(snapshot.players.contains_key(&first_id));
            assert!(snapshot.players.contains_key(&second_id));
            assert_eq!(
                snapshot.players[&first_id].room,
                snapshot.players[&second_id].room
            );
        }
    }

    /// Tests chat broadcast to everyone in the room, sender included
    #[tokio::test]
    async fn chat_reaches_room_members() {
        let url = start_server().await;
        let (mut talker, talker_id) = join(&url, "talker", Skin::Green).await;
        let (mut listener, _) = join(&url, "listener", Skin::Pink).await;
        next_update_where(&mut talker, |s| s.players.len() == 2).await;

        send(&mut talker, &ClientEnvelope::chat("hello warren", 1_700_000_000_000.0)).await;

        for socket in [&mut talker, &mut listener] {
            let chat = loop {
                if let ServerEnvelope::Room(RoomNotice::Chat(chat)) = next_envelope(socket).await {
                    break chat;
                }
            };
            assert_eq!(chat.entity.id, talker_id);
            assert_eq!(chat.entity.nickname, "talker");
            assert_eq!(chat.message, "hello warren");
            assert_eq!(chat.timestamp, 1_700_000_000_000.0);
        }
    }

    /// Tests that terrain edits land in the shared map and bad edits are ignored
    #[tokio::test]
    async fn terrain_edits_are_shared() {
        let url = start_server().await;
        let (mut builder, _) = join(&url, "builder", Skin::Orange).await;
        let (mut watcher, _) = join(&url, "watcher", Skin::Purple).await;

        send(&mut builder, &ClientEnvelope::insert_tile(5, GridPoint::new(16, 16))).await;
        send(&mut builder, &ClientEnvelope::insert_tile(6, GridPoint::new(48, 16))).await;
        send(&mut builder, &ClientEnvelope::insert_tile(7, GridPoint::new(16, 48))).await;
        send(&mut builder, &ClientEnvelope::insert_tile(9, GridPoint::new(16, 5000))).await;
        send(&mut builder, &ClientEnvelope::insert_tile(9, GridPoint::new(20, 16))).await;

        let snapshot = next_update_where(&mut watcher, |s| s.map.get(64) == Some(7)).await;
        assert_eq!(snapshot.map.get(0), Some(5));
        assert_eq!(snapshot.map.get(1), Some(6));
        assert_eq!(
            snapshot
                .map
                .tiles()
                .iter()
                .filter(|&&tile| tile != DEFAULT_TILE)
                .count(),
            3
        );
    }

    /// Tests that a closed connection disappears from the room's snapshots
    #[tokio::test]
    async fn disconnect_removes_player() {
        let url = start_server().await;
        let (mut leaver, leaver_id) = join(&url, "leaver", Skin::Grey).await;
        let (mut stayer, stayer_id) = join(&url, "stayer", Skin::Yellow).await;
        next_update_where(&mut stayer, |s| s.players.len() == 2).await;

        leaver.close(None).await.unwrap();

        let snapshot = next_update_where(&mut stayer, |s| s.players.len() == 1).await;
        assert!(snapshot.players.contains_key(&stayer_id));
        assert!(!snapshot.players.contains_key(&leaver_id));
    }

    /// Tests that a room emptied by a disconnect is replaced by a fresh one
    #[tokio::test]
    async fn emptied_room_is_not_reused() {
        let url = start_server().await;
        let (mut first, first_id) = join(&url, "first", Skin::Blue).await;
        let old_room = next_update(&mut first).await.players[&first_id].room;
        first.close(None).await.unwrap();

        // Give the gateway time to process the close
        tokio::time::sleep(TICK_DURATION * 3).await;

        let (mut second, second_id) = join(&url, "second", Skin::Blue).await;
        let snapshot = next_update(&mut second).await;
        assert_ne!(snapshot.players[&second_id].room, old_room);
        assert_eq!(snapshot.players.len(), 1);
    }
}

/// CLIENT SESSION TESTS
mod client_tests {
    use super::*;

    /// Tests the client session end to end: welcome, auto-join, move, close
    #[tokio::test]
    async fn session_joins_and_moves() {
        let url = start_server().await;
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, mut events) = mpsc::unbounded_channel();

        let identity = JoinRequest {
            nickname: "session".to_string(),
            skin: Skin::Red,
        };
        let session = tokio::spawn(async move {
            run_session(&url, identity, outgoing_rx, events_tx)
                .await
                .map_err(|e| e.to_string())
        });

        let id = match next_event(&mut events).await {
            NetworkEvent::Welcome(id) => id,
            other => panic!("expected welcome, got {:?}", other),
        };

        let mut game = ClientGameState::new();
        game.local_id = Some(id);
        loop {
            if let NetworkEvent::Update(snapshot) = next_event(&mut events).await {
                let skins = game.apply_snapshot(snapshot, Instant::now());
                assert_eq!(skins, vec![Skin::Red]);
                break;
            }
        }
        assert_eq!(game.local_player().unwrap().nickname, "session");

        outgoing
            .send(ClientEnvelope::movement(Some(std::f32::consts::FRAC_PI_2)))
            .unwrap();
        let start_y = game.local_player().unwrap().y;
        loop {
            if let NetworkEvent::Update(snapshot) = next_event(&mut events).await {
                game.apply_snapshot(snapshot, Instant::now());
                if game.local_player().unwrap().y > start_y + 5.0 {
                    break;
                }
            }
        }

        let mirror = game.mirror(id).unwrap();
        assert!((mirror.player.y - mirror.prev_y - 3.0).abs() < 1e-3);

        drop(outgoing);
        loop {
            if next_event(&mut events).await == NetworkEvent::Disconnected {
                break;
            }
        }
        assert!(session.await.unwrap().is_ok());
    }

    /// Tests that the latency probe reports a round trip
    #[tokio::test]
    async fn session_reports_latency() {
        let url = start_server().await;
        let (_outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let identity = JoinRequest {
            nickname: "pinger".to_string(),
            skin: Skin::Grey,
        };
        tokio::spawn(async move {
            let _ = run_session(&url, identity, outgoing_rx, events_tx).await;
        });

        loop {
            if let NetworkEvent::Latency(ms) = next_event(&mut events).await {
                assert!(ms <= 999);
                break;
            }
        }
    }
}

async fn start_server() -> String {
    let server = Server::bind("127.0.0.1:0", TICK_DURATION)
        .await
        .expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    format!("ws://{}", addr)
}

/// Opens a socket and consumes the welcome frame
async fn connect(url: &str) -> (Socket, ClientId) {
    let (mut socket, _) = connect_async(url).await.expect("Failed to connect");
    match next_envelope(&mut socket).await {
        ServerEnvelope::Connection(ConnectionNotice::Welcome(welcome)) => (socket, welcome.id),
        other => panic!("expected welcome, got {:?}", other),
    }
}

async fn join(url: &str, nickname: &str, skin: Skin) -> (Socket, ClientId) {
    let (mut socket, id) = connect(url).await;
    send(&mut socket, &ClientEnvelope::join(nickname, skin)).await;
    next_update_where(&mut socket, |s| s.players.contains_key(&id)).await;
    (socket, id)
}

async fn send(socket: &mut Socket, envelope: &ClientEnvelope) {
    let text = serde_json::to_string(envelope).unwrap();
    socket.send(Message::Text(text)).await.unwrap();
}

async fn next_envelope(socket: &mut Socket) -> ServerEnvelope {
    loop {
        let frame = timeout(WAIT, socket.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Socket closed")
            .expect("Socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("Undecodable server frame");
        }
    }
}

async fn next_update(socket: &mut Socket) -> Snapshot {
    next_update_where(socket, |_| true).await
}

async fn next_update_where<F>(socket: &mut Socket, predicate: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    loop {
        if let ServerEnvelope::Update(snapshot) = next_envelope(socket).await {
            if predicate(&snapshot) {
                return snapshot;
            }
        }
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<NetworkEvent>) -> NetworkEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("Timed out waiting for a network event")
        .expect("Session dropped its event channel")
}
