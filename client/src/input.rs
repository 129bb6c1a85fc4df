//! Client input: movement keys turned into headings, the chat line editor
//! and the slash commands typed into it

use crate::rendering::{RenderState, MAX_DRAW_DISTANCE, MIN_DRAW_DISTANCE};
use macroquad::prelude::*;
use shared::Heading;
use thiserror::Error;

/// Longest chat line the editor accepts
pub const MAX_CHAT_LEN: usize = 120;

/// Movement keys held during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementKeys {
    /// Samples WASD and the arrow keys
    pub fn capture() -> Self {
        Self {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        }
    }
}

/// Maps held keys to a heading in screen space (y grows downward).
/// Opposite keys cancel; no movement gives `None`.
pub fn heading_for(keys: MovementKeys) -> Heading {
    let dx = keys.right as i32 - keys.left as i32;
    let dy = keys.down as i32 - keys.up as i32;

    if dx == 0 && dy == 0 {
        None
    } else {
        Some((dy as f32).atan2(dx as f32))
    }
}

/// Tracks the last heading sent so a move is only emitted on change
#[derive(Debug, Default)]
pub struct InputTracker {
    last_sent: Heading,
}

impl InputTracker {
    pub fn new() -> Self {
        Self { last_sent: None }
    }

    /// Returns the heading to send, or `None` when it has not changed.
    /// Stopping is a change too and yields `Some(None)`.
    pub fn sample(&mut self, keys: MovementKeys) -> Option<Heading> {
        let heading = heading_for(keys);
        if heading == self.last_sent {
            return None;
        }
        self.last_sent = heading;
        Some(heading)
    }
}

/// Single-line chat editor. Enter opens it, Enter again submits, Escape cancels.
#[derive(Debug, Default)]
pub struct ChatInput {
    active: bool,
    buffer: String,
}

impl ChatInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn open(&mut self) {
        self.active = true;
        self.buffer.clear();
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.buffer.clear();
    }

    pub fn push(&mut self, c: char) {
        if self.active && !c.is_control() && self.buffer.chars().count() < MAX_CHAT_LEN {
            self.buffer.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Closes the editor and returns the typed line, if it has any content
    pub fn submit(&mut self) -> Option<String> {
        self.active = false;
        let line = std::mem::take(&mut self.buffer);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Feeds one frame of keyboard input. Returns a line when one is submitted.
    pub fn update(&mut self) -> Option<String> {
        if !self.active {
            if is_key_pressed(KeyCode::Enter) {
                self.open();
                // Drain the queue so the opening keypress is not typed
                while get_char_pressed().is_some() {}
            }
            return None;
        }

        if is_key_pressed(KeyCode::Escape) {
            self.cancel();
            return None;
        }
        if is_key_pressed(KeyCode::Enter) {
            return self.submit();
        }
        if is_key_pressed(KeyCode::Backspace) {
            self.backspace();
        }
        while let Some(c) = get_char_pressed() {
            self.push(c);
        }
        None
    }
}

/// A submitted chat line. Commands stay on the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    Message(String),
    Command(ChatCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// `/draw N`: terrain draw distance in tiles
    DrawDistance(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("draw distance must be a whole number from {min} to {max}", min = MIN_DRAW_DISTANCE, max = MAX_DRAW_DISTANCE)]
    InvalidDrawDistance,
    #[error("unknown command /{0}")]
    Unknown(String),
}

impl ChatLine {
    /// Lines starting with `/` are commands; everything else is chat
    pub fn parse(line: String) -> Result<Self, CommandError> {
        let Some(command) = line.strip_prefix('/') else {
            return Ok(ChatLine::Message(line));
        };

        let mut words = command.split_whitespace();
        match words.next().unwrap_or_default() {
            "draw" => words
                .next()
                .and_then(|arg| arg.parse::<usize>().ok())
                .filter(|tiles| (MIN_DRAW_DISTANCE..=MAX_DRAW_DISTANCE).contains(tiles))
                .map(|tiles| ChatLine::Command(ChatCommand::DrawDistance(tiles)))
                .ok_or(CommandError::InvalidDrawDistance),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

impl ChatCommand {
    pub fn apply(self, state: &mut RenderState) {
        match self {
            ChatCommand::DrawDistance(tiles) => state.draw_distance = tiles,
        }
    }
}
