//! Client networking. The WebSocket session runs on its own thread with a
//! tokio runtime; the render loop talks to it through unbounded channels and
//! drains events once per frame.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use rand::Rng;
use shared::protocol::{ChatBroadcast, ConnectionNotice, JoinRequest, RoomNotice, RoomRequest};
use shared::{ClientEnvelope, ClientId, ServerEnvelope, Skin, Snapshot};
use std::error::Error;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_REPORTED_LATENCY_MS: u64 = 999;

/// Events delivered from the session to the render loop
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Welcome(ClientId),
    Update(Snapshot),
    Chat(ChatBroadcast),
    /// Round trip of the last probe in milliseconds
    Latency(u64),
    Disconnected,
}

/// Builds the join metadata: the given nickname or `Guest_NNN`, and the given
/// skin or a random one.
pub fn player_identity<R: Rng>(rng: &mut R, nickname: Option<String>, skin: Option<Skin>) -> JoinRequest {
    let nickname = nickname.unwrap_or_else(|| format!("Guest_{}", rng.gen_range(100..999)));
    let skin = skin.unwrap_or_else(|| Skin::ALL[rng.gen_range(0..Skin::ALL.len())]);
    JoinRequest { nickname, skin }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Probe payload: the send time in milliseconds, big-endian
pub fn encode_probe(sent_at: u64) -> Vec<u8> {
    sent_at.to_be_bytes().to_vec()
}

pub fn decode_probe(payload: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = payload.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

pub fn round_trip_ms(sent_at: u64, now: u64) -> u64 {
    now.saturating_sub(sent_at).min(MAX_REPORTED_LATENCY_MS)
}

/// Handle held by the render loop
pub struct NetworkClient {
    outgoing: mpsc::UnboundedSender<ClientEnvelope>,
    events: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl NetworkClient {
    /// Starts the session thread and returns immediately
    pub fn spawn(url: String, identity: JoinRequest) -> Result<Self, Box<dyn Error>> {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    if let Err(e) = run_session(&url, identity, outgoing_rx, events_tx.clone()).await
                    {
                        error!("Connection to {} failed: {}", url, e);
                        let _ = events_tx.send(NetworkEvent::Disconnected);
                    }
                });
            })?;

        Ok(Self { outgoing, events })
    }

    pub fn send(&self, envelope: ClientEnvelope) {
        if self.outgoing.send(envelope).is_err() {
            debug!("Session closed, dropping outgoing envelope");
        }
    }

    /// Drains every event that arrived since the last frame
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Runs one WebSocket session until either side closes it. Joins a room as
/// soon as the server's welcome arrives and probes latency every second.
pub async fn run_session(
    url: &str,
    identity: JoinRequest,
    mut outgoing: mpsc::UnboundedReceiver<ClientEnvelope>,
    events: mpsc::UnboundedSender<NetworkEvent>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let (ws_stream, _) = connect_async(url).await?;
    info!("Connected to {}", url);

    let (mut write, mut read) = ws_stream.split();
    let join = serde_json::to_string(&ClientEnvelope::Room(RoomRequest::Join(Some(identity))))?;

    let mut probe = interval(PROBE_INTERVAL);
    probe.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    probe.tick().await;

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerEnvelope>(&text) {
                    Ok(ServerEnvelope::Connection(ConnectionNotice::Welcome(welcome))) => {
                        info!("Assigned client id {}", welcome.id);
                        let _ = events.send(NetworkEvent::Welcome(welcome.id));
                        write.send(Message::Text(join.clone())).await?;
                    }
                    Ok(ServerEnvelope::Update(snapshot)) => {
                        let _ = events.send(NetworkEvent::Update(snapshot));
                    }
                    Ok(ServerEnvelope::Room(RoomNotice::Chat(chat))) => {
                        let _ = events.send(NetworkEvent::Chat(chat));
                    }
                    Err(e) => debug!("Dropping undecodable frame: {}", e),
                },
                Some(Ok(Message::Pong(payload))) => {
                    if let Some(sent_at) = decode_probe(&payload) {
                        let _ = events.send(NetworkEvent::Latency(round_trip_ms(sent_at, unix_millis())));
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Connection error: {}", e);
                    break;
                }
            },

            envelope = outgoing.recv() => match envelope {
                Some(envelope) => {
                    write.send(Message::Text(serde_json::to_string(&envelope)?)).await?;
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },

            _ = probe.tick() => {
                write.send(Message::Ping(encode_probe(unix_millis()))).await?;
            },
        }
    }

    let _ = events.send(NetworkEvent::Disconnected);
    Ok(())
}
