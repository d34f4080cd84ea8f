//! Engine configuration.
//!
//! Everything the frame driver needs to know before the first frame lives in
//! [`EngineConfig`]. It deserializes from JSON with every field optional, so
//! a config file only has to name what it changes:
//!
//! ```
//! use tessera_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "target_fps": 30, "headless": true }"#).unwrap();
//! assert_eq!(config.target_fps, 30);
//! assert_eq!(config.world_width, 720);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_object::factory::LoadPolicy;
use tessera_script::ScriptConfig;

use crate::EngineError;

/// Action name to the keys that trigger it. An action is active while any
/// of its keys is held.
pub type ActionMap = BTreeMap<String, Vec<String>>;

// ---------------------------------------------------------------------------
// StateBinding
// ---------------------------------------------------------------------------

/// Switches objects to `state` on the frame `action` is pressed.
///
/// Only objects that carry `component` and declare `state` are affected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBinding {
    pub action: String,
    pub state: String,
    #[serde(default = "default_binding_component")]
    pub component: String,
}

fn default_binding_component() -> String {
    tessera_components::tags::CONTROLLER.to_owned()
}

impl StateBinding {
    pub fn new(action: &str, state: &str, component: &str) -> Self {
        Self {
            action: action.to_owned(),
            state: state.to_owned(),
            component: component.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Configuration of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// World width in world units. Default: 720.
    pub world_width: u32,
    /// World height in world units. Default: 480.
    pub world_height: u32,
    /// Window width in pixels. Default: 720.
    pub window_width: u32,
    /// Window height in pixels. Default: 480.
    pub window_height: u32,
    /// Frame rate the pacer aims for. Default: 60.
    pub target_fps: u32,
    /// Drive the editor hook, if one is installed. Default: `false`.
    pub run_with_editor: bool,
    /// Use a fixed `1 / target_fps` time step and never sleep. Default: `false`.
    pub headless: bool,
    /// RGBA colour the frame is cleared to. Default: 0.3 grey.
    pub clear_color: [f32; 4],
    /// Level loaded by [`Engine::load_start_level`](crate::engine::Engine::load_start_level).
    /// Default: 0.
    pub start_level: u32,
    /// What a level load does with objects that fail to build or link.
    pub load_policy: LoadPolicy,
    /// Action to key bindings, shared by components and scripts.
    pub actions: ActionMap,
    /// Input-driven state changes checked every frame.
    pub state_bindings: Vec<StateBinding>,
    /// Fuel and memory limits of behavior scripts.
    pub scripts: ScriptConfig,
    /// Fallback `tracing` filter used when `RUST_LOG` is unset. Default: `"info"`.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world_width: 720,
            world_height: 480,
            window_width: 720,
            window_height: 480,
            target_fps: 60,
            run_with_editor: false,
            headless: false,
            clear_color: [0.3, 0.3, 0.3, 0.3],
            start_level: 0,
            load_policy: LoadPolicy::SkipObject,
            actions: default_actions(),
            state_bindings: vec![
                StateBinding::new("walk", "WALK", tessera_components::tags::CONTROLLER),
                StateBinding::new("idle", "IDLE", tessera_components::tags::CONTROLLER),
            ],
            scripts: ScriptConfig::default(),
            log_filter: "info".to_owned(),
        }
    }
}

fn default_actions() -> ActionMap {
    [
        ("left", &["LEFT", "A"][..]),
        ("right", &["RIGHT", "D"][..]),
        ("up", &["UP", "W"][..]),
        ("down", &["DOWN", "S"][..]),
        ("walk", &["X"][..]),
        ("idle", &["Z"][..]),
    ]
    .into_iter()
    .map(|(action, keys)| {
        (
            action.to_owned(),
            keys.iter().map(|k| (*k).to_owned()).collect(),
        )
    })
    .collect()
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check the values serde cannot.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] when the frame rate or world size is zero, a
    /// clear colour channel is outside `0.0..=1.0`, or a state binding names
    /// an action missing from [`actions`](Self::actions).
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.target_fps == 0 {
            return Err(EngineError::Config("target_fps must be positive".to_owned()));
        }
        if self.world_width == 0 || self.world_height == 0 {
            return Err(EngineError::Config(format!(
                "world size must be positive, got {}x{}",
                self.world_width, self.world_height
            )));
        }
        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(EngineError::Config(format!(
                "clear_color channels must be within 0..=1, got {:?}",
                self.clear_color
            )));
        }
        for binding in &self.state_bindings {
            if !self.actions.contains_key(&binding.action) {
                return Err(EngineError::Config(format!(
                    "state binding to '{}' uses unknown action '{}'",
                    binding.state, binding.action
                )));
            }
        }
        Ok(())
    }

    /// Seconds per frame at the target rate.
    pub fn frame_time(&self) -> f32 {
        1.0 / self.target_fps.max(1) as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
