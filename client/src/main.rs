use clap::builder::TypedValueParser;
use clap::Parser;
use client::game::ClientGameState;
use client::input::{ChatInput, ChatLine, InputTracker, MovementKeys};
use client::network::{player_identity, unix_millis, NetworkClient, NetworkEvent};
use client::rendering::{
    Renderer, DEFAULT_DRAW_DISTANCE, MAX_DRAW_DISTANCE, MIN_DRAW_DISTANCE,
};
use log::{info, warn};
use macroquad::prelude::*;
use shared::{ClientEnvelope, Skin};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Nickname shown above your bunny (random Guest_NNN if omitted)
    #[arg(short = 'n', long)]
    nickname: Option<String>,

    /// Sprite colour (random if omitted)
    #[arg(long)]
    skin: Option<Skin>,

    /// Radius of drawn terrain, in tiles
    #[arg(short = 'd', long, default_value_t = DEFAULT_DRAW_DISTANCE,
          value_parser = clap::value_parser!(u16)
              .range(MIN_DRAW_DISTANCE as i64..=MAX_DRAW_DISTANCE as i64)
              .map(usize::from))]
    draw_distance: usize,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Warren".to_owned(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let identity = player_identity(&mut ::rand::thread_rng(), args.nickname, args.skin);

    info!("Connecting to {} as {} ({})", args.server, identity.nickname, identity.skin);
    info!("Controls: WASD/arrows to move, Q/E to pick a tile, click to place, Enter to chat");

    let mut network = match NetworkClient::spawn(args.server.clone(), identity) {
        Ok(network) => network,
        Err(e) => {
            log::error!("Failed to start networking: {}", e);
            return;
        }
    };

    let mut game = ClientGameState::new();
    let mut input = InputTracker::new();
    let mut chat = ChatInput::new();
    let mut renderer = Renderer::new(args.draw_distance).await;

    loop {
        let now = Instant::now();

        for event in network.poll() {
            match event {
                NetworkEvent::Welcome(id) => game.local_id = Some(id),
                NetworkEvent::Update(snapshot) => {
                    for skin in game.apply_snapshot(snapshot, now) {
                        renderer.request_sprite(skin);
                    }
                }
                NetworkEvent::Chat(message) => game.push_chat(&message),
                NetworkEvent::Latency(ms) => renderer.state.latency_ms = ms,
                NetworkEvent::Disconnected => warn!("Disconnected from server"),
            }
        }

        if let Some(line) = chat.update() {
            match ChatLine::parse(line) {
                Ok(ChatLine::Message(text)) => {
                    network.send(ClientEnvelope::chat(text, unix_millis() as f64));
                }
                Ok(ChatLine::Command(command)) => {
                    info!("Applying {:?}", command);
                    command.apply(&mut renderer.state);
                }
                Err(e) => warn!("{}", e),
            }
        }

        // Keys typed into chat must not move the player
        let keys = if chat.is_active() {
            MovementKeys::default()
        } else {
            MovementKeys::capture()
        };
        if let Some(heading) = input.sample(keys) {
            network.send(ClientEnvelope::movement(heading));
        }

        if !chat.is_active() {
            if let Some((tile, grid)) = renderer.editing_input() {
                network.send(ClientEnvelope::insert_tile(tile, grid));
            }
        }

        renderer.load_pending_sprites().await;
        renderer.render(&game, chat.is_active().then(|| chat.text()), now);

        next_frame().await;
    }
}
