use crate::game::{ClientGameState, RenderedPlayer};
use log::{info, warn};
use macroquad::prelude::*;
use shared::{
    clamp, lerp, GridPoint, Heading, Skin, DEFAULT_TILE, MAP_COLUMNS, MAP_ROWS, TILE_SIZE,
    WORLD_HEIGHT, WORLD_WIDTH,
};
use std::collections::{HashMap, HashSet};
use std::f32::consts::FRAC_PI_4;
use std::time::Instant;

pub const CAMERA_BLEND: f32 = 0.1;
pub const DEFAULT_DRAW_DISTANCE: usize = 12;
pub const MIN_DRAW_DISTANCE: usize = 4;
pub const MAX_DRAW_DISTANCE: usize = 32;
pub const TILESET_LEN: u16 = 300;
pub const ANIMATION_FRAME_SECS: f32 = 0.2;
pub const ANIMATION_FRAMES: usize = 3;
pub const SPRITE_COLUMNS: usize = 3;
pub const SPRITE_ROWS: usize = 4;
pub const TILESET_PATH: &str = "assets/tileset.png";

const PLAYER_DRAW_SIZE: f32 = 32.0;

/// Sprite sheet rows, top to bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Down = 0,
    Left = 1,
    Right = 2,
    Up = 3,
}

/// Picks the sheet row for a heading by quadrant. Standing still faces down.
pub fn facing(angle: Heading) -> Facing {
    let Some(angle) = angle else {
        return Facing::Down;
    };
    // Normalise into (-PI, PI]
    let angle = angle.sin().atan2(angle.cos());

    if (-FRAC_PI_4..=FRAC_PI_4).contains(&angle) {
        Facing::Right
    } else if angle > FRAC_PI_4 && angle < 3.0 * FRAC_PI_4 {
        Facing::Down
    } else if angle < -FRAC_PI_4 && angle > -3.0 * FRAC_PI_4 {
        Facing::Up
    } else {
        Facing::Left
    }
}

/// Walking animation shared by every sprite
#[derive(Debug, Default)]
pub struct AnimationClock {
    frame: usize,
    elapsed: f32,
}

impl AnimationClock {
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
        while self.elapsed >= ANIMATION_FRAME_SECS {
            self.elapsed -= ANIMATION_FRAME_SECS;
            self.frame = (self.frame + 1) % ANIMATION_FRAMES;
        }
    }

    /// Sheet column for a player; stationary players hold the middle frame
    pub fn column(&self, angle: Heading) -> usize {
        match angle {
            Some(_) => self.frame,
            None => 1,
        }
    }
}

/// Top-left corner of the view in world units
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct WorldCamera {
    pub x: f32,
    pub y: f32,
}

impl WorldCamera {
    /// Blends toward centring `target`, then keeps the view inside the world
    pub fn follow(&mut self, target: (f32, f32), viewport: (f32, f32)) {
        let goal_x = target.0 - viewport.0 / 2.0;
        let goal_y = target.1 - viewport.1 / 2.0;
        self.x = clamp(
            lerp(self.x, goal_x, CAMERA_BLEND),
            0.0,
            WORLD_WIDTH - viewport.0,
        );
        self.y = clamp(
            lerp(self.y, goal_y, CAMERA_BLEND),
            0.0,
            WORLD_HEIGHT - viewport.1,
        );
    }

    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.x, y - self.y)
    }

    pub fn to_world(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.x, y + self.y)
    }
}

/// Map indices whose tile lies within a circle of `radius` tiles around a
/// world position, clipped to the map
pub fn visible_tiles(center: (f32, f32), radius: usize) -> Vec<usize> {
    let column = (center.0 / TILE_SIZE as f32).floor() as i64;
    let row = (center.1 / TILE_SIZE as f32).floor() as i64;
    let radius = radius as i64;

    let first_col = (column - radius).max(0);
    let last_col = (column + radius).min(MAP_COLUMNS as i64 - 1);
    let first_row = (row - radius).max(0);
    let last_row = (row + radius).min(MAP_ROWS as i64 - 1);

    let mut tiles = Vec::new();
    for r in first_row..=last_row {
        for c in first_col..=last_col {
            let (dc, dr) = (c - column, r - row);
            if dc * dc + dr * dr <= radius * radius {
                tiles.push((r * MAP_COLUMNS as i64 + c) as usize);
            }
        }
    }
    tiles
}

/// Tile picked for terrain placement, stepped with Q and E
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSelector {
    pub tile: u16,
}

impl TileSelector {
    pub fn step(&mut self, delta: i32) {
        let len = TILESET_LEN as i32;
        self.tile = (self.tile as i32 + delta).rem_euclid(len) as u16;
    }
}

impl Default for TileSelector {
    fn default() -> Self {
        Self { tile: DEFAULT_TILE }
    }
}

/// Everything the renderer keeps between frames
#[derive(Debug)]
pub struct RenderState {
    pub camera: WorldCamera,
    pub animation: AnimationClock,
    pub draw_distance: usize,
    pub hovered: Option<GridPoint>,
    pub selected: TileSelector,
    pub latency_ms: u64,
}

impl RenderState {
    pub fn new(draw_distance: usize) -> Self {
        Self {
            camera: WorldCamera::default(),
            animation: AnimationClock::default(),
            draw_distance,
            hovered: None,
            selected: TileSelector::default(),
            latency_ms: 0,
        }
    }
}

/// Per-skin sprite sheets, loaded once on first request
#[derive(Default)]
pub struct SpriteCache {
    textures: HashMap<Skin, Texture2D>,
    failed: HashSet<Skin>,
    pending: Vec<Skin>,
}

impl SpriteCache {
    pub fn path(skin: Skin) -> String {
        format!("assets/bunnies/{}.png", skin)
    }

    /// Queues a skin for loading. Returns false if it is already known.
    pub fn request(&mut self, skin: Skin) -> bool {
        if self.textures.contains_key(&skin)
            || self.failed.contains(&skin)
            || self.pending.contains(&skin)
        {
            return false;
        }
        self.pending.push(skin);
        true
    }

    pub async fn load_pending(&mut self) {
        for skin in std::mem::take(&mut self.pending) {
            match load_texture(&Self::path(skin)).await {
                Ok(texture) => {
                    texture.set_filter(FilterMode::Nearest);
                    info!("Loaded sprite sheet for {}", skin);
                    self.textures.insert(skin, texture);
                }
                Err(e) => {
                    warn!("No sprite sheet for {}: {}", skin, e);
                    self.failed.insert(skin);
                }
            }
        }
    }

    pub fn get(&self, skin: Skin) -> Option<&Texture2D> {
        self.textures.get(&skin)
    }
}

/// Fallback colour for players without a sprite sheet
pub fn skin_color(skin: Skin) -> Color {
    match skin {
        Skin::Black => Color::from_rgba(40, 40, 40, 255),
        Skin::Blue => Color::from_rgba(60, 90, 220, 255),
        Skin::Brown => Color::from_rgba(130, 85, 50, 255),
        Skin::Green => Color::from_rgba(60, 180, 75, 255),
        Skin::Grey => Color::from_rgba(140, 140, 140, 255),
        Skin::LightBlue => Color::from_rgba(120, 190, 240, 255),
        Skin::Orange => Color::from_rgba(240, 140, 40, 255),
        Skin::Pink => Color::from_rgba(240, 150, 190, 255),
        Skin::Purple => Color::from_rgba(140, 70, 180, 255),
        Skin::Red => Color::from_rgba(220, 50, 50, 255),
        Skin::White => Color::from_rgba(240, 240, 240, 255),
        Skin::Yellow => Color::from_rgba(240, 220, 60, 255),
    }
}

/// Fallback colour for a tile code when the tileset is missing
fn tile_color(tile: u16) -> Color {
    let shade = (tile % 16) as u8 * 6;
    Color::from_rgba(50 + shade, 110 + shade / 2, 60, 255)
}

pub struct Renderer {
    pub state: RenderState,
    sprites: SpriteCache,
    tileset: Option<Texture2D>,
    last_frame: Instant,
}

impl Renderer {
    pub async fn new(draw_distance: usize) -> Self {
        let tileset = match load_texture(TILESET_PATH).await {
            Ok(texture) => {
                texture.set_filter(FilterMode::Nearest);
                Some(texture)
            }
            Err(e) => {
                warn!("Tileset unavailable, drawing plain tiles: {}", e);
                None
            }
        };

        Renderer {
            state: RenderState::new(draw_distance),
            sprites: SpriteCache::default(),
            tileset,
            last_frame: Instant::now(),
        }
    }

    pub fn request_sprite(&mut self, skin: Skin) {
        self.sprites.request(skin);
    }

    pub async fn load_pending_sprites(&mut self) {
        self.sprites.load_pending().await;
    }

    /// Handles tile selection keys and returns a placement for a left click
    pub fn editing_input(&mut self) -> Option<(u16, GridPoint)> {
        if is_key_pressed(KeyCode::Q) {
            self.state.selected.step(-1);
        }
        if is_key_pressed(KeyCode::E) {
            self.state.selected.step(1);
        }

        let (mouse_x, mouse_y) = mouse_position();
        let (world_x, world_y) = self.state.camera.to_world(mouse_x, mouse_y);
        let hovered = GridPoint::containing(world_x, world_y);
        self.state.hovered = Some(hovered);

        if is_mouse_button_pressed(MouseButton::Left) {
            Some((self.state.selected.tile, hovered))
        } else {
            None
        }
    }

    pub fn render(&mut self, game: &ClientGameState, chat_line: Option<&str>, now: Instant) {
        let dt = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.state.animation.advance(dt);

        let local = game
            .local_id
            .and_then(|id| game.interpolated_position(id, now));
        if let Some(position) = local {
            self.state
                .camera
                .follow(position, (screen_width(), screen_height()));
        }

        clear_background(Color::from_rgba(26, 26, 26, 255));

        // Tiles are culled around the authoritative position, not the drawn one
        if let Some(player) = game.local_player() {
            self.draw_tiles(game, (player.x, player.y));
        }
        self.draw_hover();

        for player in game.render_players(now) {
            self.draw_player(&player, Some(player.id) == game.local_id);
        }

        self.draw_hud(game, chat_line);
    }

    fn draw_tiles(&self, game: &ClientGameState, center: (f32, f32)) {
        let size = TILE_SIZE as f32;
        for index in visible_tiles(center, self.state.draw_distance) {
            let Some(tile) = game.map().get(index) else {
                continue;
            };
            let (x, y) = shared::map::tile_origin(index);
            let (screen_x, screen_y) = self.state.camera.to_screen(x, y);

            match &self.tileset {
                Some(tileset) => {
                    let columns = (tileset.width() / size).max(1.0) as u16;
                    let source = Rect::new(
                        (tile % columns) as f32 * size,
                        (tile / columns) as f32 * size,
                        size,
                        size,
                    );
                    draw_texture_ex(
                        tileset,
                        screen_x,
                        screen_y,
                        WHITE,
                        DrawTextureParams {
                            source: Some(source),
                            dest_size: Some(vec2(size, size)),
                            ..Default::default()
                        },
                    );
                }
                None => draw_rectangle(screen_x, screen_y, size, size, tile_color(tile)),
            }
        }
    }

    fn draw_hover(&self) {
        if let Some(grid) = self.state.hovered {
            let half = TILE_SIZE as f32 / 2.0;
            let (x, y) = self
                .state
                .camera
                .to_screen(grid.x as f32 - half, grid.y as f32 - half);
            draw_rectangle_lines(x, y, TILE_SIZE as f32, TILE_SIZE as f32, 2.0, WHITE);
        }
    }

    fn draw_player(&self, player: &RenderedPlayer, is_local: bool) {
        let (x, y) = self.state.camera.to_screen(player.x, player.y);
        let left = x - PLAYER_DRAW_SIZE / 2.0;
        let top = y - PLAYER_DRAW_SIZE / 2.0;

        match self.sprites.get(player.skin) {
            Some(sheet) => {
                let frame_w = sheet.width() / SPRITE_COLUMNS as f32;
                let frame_h = sheet.height() / SPRITE_ROWS as f32;
                let column = self.state.animation.column(player.angle);
                let row = facing(player.angle) as usize;
                draw_texture_ex(
                    sheet,
                    left,
                    top,
                    WHITE,
                    DrawTextureParams {
                        source: Some(Rect::new(
                            column as f32 * frame_w,
                            row as f32 * frame_h,
                            frame_w,
                            frame_h,
                        )),
                        dest_size: Some(vec2(PLAYER_DRAW_SIZE, PLAYER_DRAW_SIZE)),
                        ..Default::default()
                    },
                );
            }
            None => {
                draw_rectangle(
                    left,
                    top,
                    PLAYER_DRAW_SIZE,
                    PLAYER_DRAW_SIZE,
                    skin_color(player.skin),
                );
            }
        }

        if is_local {
            draw_rectangle_lines(left, top, PLAYER_DRAW_SIZE, PLAYER_DRAW_SIZE, 1.0, WHITE);
        }

        let label = measure_text(&player.nickname, None, 14, 1.0);
        draw_text(
            &player.nickname,
            x - label.width / 2.0,
            top - 4.0,
            14.0,
            WHITE,
        );
    }

    fn draw_hud(&self, game: &ClientGameState, chat_line: Option<&str>) {
        let ping_color = match self.state.latency_ms {
            0..=49 => GREEN,
            50..=99 => YELLOW,
            _ => RED,
        };
        draw_text(
            &format!("{}ms", self.state.latency_ms),
            10.0,
            20.0,
            16.0,
            ping_color,
        );

        if let Some(player) = game.local_player() {
            draw_text(
                &format!("x: {} y: {}", player.x.round(), player.y.round()),
                10.0,
                38.0,
                16.0,
                WHITE,
            );
        }
        draw_text(
            &format!(
                "{} players | tile {}",
                game.player_count(),
                self.state.selected.tile
            ),
            10.0,
            56.0,
            16.0,
            WHITE,
        );

        let bottom = screen_height() - 10.0;
        let lines: Vec<&str> = game.chat_log().collect();
        let offset = if chat_line.is_some() { 1 } else { 0 };
        for (i, line) in lines.iter().rev().enumerate() {
            draw_text(line, 10.0, bottom - (i + offset) as f32 * 16.0, 16.0, WHITE);
        }
        if let Some(typed) = chat_line {
            draw_text(&format!("> {}_", typed), 10.0, bottom, 16.0, YELLOW);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_facing_by_quadrant() {
        assert_eq!(facing(None), Facing::Down);
        assert_eq!(facing(Some(0.0)), Facing::Right);
        assert_eq!(facing(Some(FRAC_PI_2)), Facing::Down);
        assert_eq!(facing(Some(PI)), Facing::Left);
        assert_eq!(facing(Some(-FRAC_PI_2)), Facing::Up);
        assert_eq!(facing(Some(-0.9 * PI)), Facing::Left);
        assert_eq!(facing(Some(0.3)), Facing::Right);
        assert_eq!(facing(Some(2.0 * PI + FRAC_PI_2)), Facing::Down);
    }

    #[test]
    fn test_animation_cycles_every_200ms() {
        let mut clock = AnimationClock::default();
        assert_eq!(clock.column(Some(0.0)), 0);

        clock.advance(0.25);
        assert_eq!(clock.column(Some(0.0)), 1);
        clock.advance(0.2);
        assert_eq!(clock.column(Some(0.0)), 2);
        clock.advance(0.2);
        assert_eq!(clock.column(Some(0.0)), 0);

        assert_eq!(clock.column(None), 1);
    }

    #[test]
    fn test_camera_blends_toward_player() {
        let mut camera = WorldCamera::default();
        camera.follow((1000.0, 1000.0), (800.0, 600.0));
        assert_approx_eq!(camera.x, 60.0, 1e-3);
        assert_approx_eq!(camera.y, 70.0, 1e-3);
    }

    #[test]
    fn test_camera_clamped_to_world() {
        let mut camera = WorldCamera::default();
        for _ in 0..500 {
            camera.follow((0.0, 2048.0), (800.0, 600.0));
        }
        assert_eq!(camera.x, 0.0);
        assert_approx_eq!(camera.y, 2048.0 - 600.0, 1e-2);
    }

    #[test]
    fn test_camera_coordinate_conversion() {
        let camera = WorldCamera { x: 100.0, y: 50.0 };
        assert_eq!(camera.to_screen(150.0, 80.0), (50.0, 30.0));
        assert_eq!(camera.to_world(50.0, 30.0), (150.0, 80.0));
    }

    #[test]
    fn test_visible_tiles_radius() {
        let tiles = visible_tiles((1024.0, 1024.0), 12);
        assert_eq!(tiles.len(), 441);
        assert!(tiles.contains(&(32 * 64 + 32)));
        assert!(tiles.contains(&(32 * 64 + 44)));
        assert!(!tiles.contains(&(32 * 64 + 45)));
    }

    #[test]
    fn test_visible_tiles_exclude_square_corners() {
        let tiles = visible_tiles((1024.0, 1024.0), 4);
        assert_eq!(tiles.len(), 49);
        // Row 28, column 28 is four tiles away on both axes
        assert!(!tiles.contains(&(28 * 64 + 28)));
        assert!(tiles.contains(&(28 * 64 + 32)));
        assert!(tiles.contains(&(30 * 64 + 29)));

        for index in tiles {
            let x = (index % 64) as f32 * 32.0;
            let y = (index / 64) as f32 * 32.0;
            let distance = ((x - 1024.0).powi(2) + (y - 1024.0).powi(2)).sqrt();
            assert!(distance <= 4.0 * 32.0);
        }
    }

    #[test]
    fn test_visible_tiles_clipped_at_corner() {
        let tiles = visible_tiles((0.0, 0.0), 4);
        assert_eq!(tiles.len(), 17);
        assert_eq!(tiles[0], 0);
        assert!(tiles.iter().all(|&i| i < 4096));

        let far = visible_tiles((-5000.0, -5000.0), 4);
        assert!(far.is_empty());
    }

    #[test]
    fn test_tile_selector_wraps() {
        let mut selector = TileSelector::default();
        assert_eq!(selector.tile, DEFAULT_TILE);

        selector.tile = 0;
        selector.step(-1);
        assert_eq!(selector.tile, 299);
        selector.step(1);
        assert_eq!(selector.tile, 0);
    }

    #[test]
    fn test_sprite_requests_are_deduplicated() {
        let mut cache = SpriteCache::default();
        assert!(cache.request(Skin::Grey));
        assert!(!cache.request(Skin::Grey));
        assert!(cache.request(Skin::LightBlue));
        assert_eq!(
            SpriteCache::path(Skin::LightBlue),
            "assets/bunnies/light_blue.png"
        );
    }
}
