//! Keyboard input as seen by the frame driver and by components.
//!
//! Polling the OS is someone else's job: an [`InputSource`] hands over the
//! raw [`InputEvent`]s of one frame and [`InputState`] folds them into the
//! held/pressed key sets that the rest of the engine queries. Keys are plain
//! names (`"LEFT"`, `"X"`, `"SPACE"`); actions map onto keys through the
//! [`ActionMap`] of the engine config.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tessera_object::component::InputQuery;
use tracing::debug;

use crate::config::ActionMap;

// ---------------------------------------------------------------------------
// Events and sources
// ---------------------------------------------------------------------------

/// One raw input event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "key")]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    /// The window was closed or the platform asked the game to exit.
    Quit,
}

/// The platform layer: produces input events and owns the window.
pub trait InputSource {
    /// Events that arrived since the previous call.
    fn poll(&mut self) -> Vec<InputEvent>;

    /// Release the window and platform resources. Called once at teardown.
    fn shutdown(&mut self) {}
}

/// Replays prepared frames of events, one frame per [`poll`](InputSource::poll).
///
/// Once the frames run out it returns nothing, or a single
/// [`InputEvent::Quit`] when built with [`quit_when_exhausted`](Self::quit_when_exhausted).
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    frames: VecDeque<Vec<InputEvent>>,
    quit_when_exhausted: bool,
    shut_down: bool,
}

impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = Vec<InputEvent>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn quit_when_exhausted(mut self) -> Self {
        self.quit_when_exhausted = true;
        self
    }

    /// Append one more frame of events.
    pub fn push_frame(&mut self, events: Vec<InputEvent>) {
        self.frames.push_back(events);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Vec<InputEvent> {
        match self.frames.pop_front() {
            Some(events) => events,
            None if self.quit_when_exhausted => vec![InputEvent::Quit],
            None => Vec::new(),
        }
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

// ---------------------------------------------------------------------------
// InputState
// ---------------------------------------------------------------------------

/// Held keys of the current and previous frame plus the quit flag.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    actions: ActionMap,
    down: BTreeSet<String>,
    previous: BTreeSet<String>,
    quit: bool,
}

impl InputState {
    pub fn new(actions: ActionMap) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    /// Roll the key state forward by one frame and apply `events`.
    ///
    /// Keys held at the end of the previous frame become the "previous"
    /// set, so [`is_key_pressed`](Self::is_key_pressed) is true exactly on
    /// the frame a key goes down.
    pub fn advance(&mut self, events: &[InputEvent]) {
        self.previous.clone_from(&self.down);
        for event in events {
            match event {
                InputEvent::KeyDown(key) => {
                    self.down.insert(key.clone());
                }
                InputEvent::KeyUp(key) => {
                    self.down.remove(key);
                }
                InputEvent::Quit => {
                    debug!("quit requested by input source");
                    self.quit = true;
                }
            }
        }
    }

    pub fn is_key_down(&self, key: &str) -> bool {
        self.down.contains(key)
    }

    /// Held now but not on the previous frame.
    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.down.contains(key) && !self.previous.contains(key)
    }

    /// Held on the previous frame but not now.
    pub fn is_key_released(&self, key: &str) -> bool {
        !self.down.contains(key) && self.previous.contains(key)
    }

    /// Any key bound to `action` is held. Unknown actions are never active.
    pub fn is_action_active(&self, action: &str) -> bool {
        self.keys_of(action).any(|key| self.is_key_down(key))
    }

    /// Some key of `action` went down this frame while none was held before.
    pub fn is_action_pressed(&self, action: &str) -> bool {
        self.is_action_active(action)
            && !self.keys_of(action).any(|key| self.previous.contains(key))
    }

    pub fn is_quit(&self) -> bool {
        self.quit
    }

    /// Names of every action currently active, for behavior scripts.
    pub fn active_actions(&self) -> BTreeSet<String> {
        self.actions
            .keys()
            .filter(|action| self.is_action_active(action))
            .cloned()
            .collect()
    }

    pub fn actions(&self) -> &ActionMap {
        &self.actions
    }

    fn keys_of<'a>(&'a self, action: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.actions
            .get(action)
            .into_iter()
            .flat_map(|keys| keys.iter().map(String::as_str))
    }
}

impl InputQuery for InputState {
    fn is_action_active(&self, action: &str) -> bool {
        InputState::is_action_active(self, action)
    }

    fn is_key_down(&self, key: &str) -> bool {
        InputState::is_key_down(self, key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
