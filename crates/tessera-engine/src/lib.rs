//! Tessera Engine -- the frame driver around the object runtime.
//!
//! This crate wires the pieces together: it owns the
//! [`GameObjectManager`](tessera_object::manager::GameObjectManager), feeds
//! it input, runs behavior scripts and the collision pass, draws through a
//! [`Renderer`](render::Renderer) and paces frames. Platform, renderer,
//! scripts and editor are trait objects handed to the
//! [`EngineBuilder`](engine::EngineBuilder); everything defaults to a
//! headless implementation.
//!
//! # Quick Start
//!
//! ```
//! use tessera_engine::prelude::*;
//!
//! let config = EngineConfig { headless: true, ..EngineConfig::default() };
//! let mut resources = ResourceManager::in_memory();
//! resources.register_texture("hero", 64, 64);
//! resources
//!     .insert_level_json(0, r#"{ "objects": [ {
//!         "name": "hero",
//!         "states": ["IDLE", "WALK"],
//!         "initial_state": "IDLE",
//!         "components": [
//!             { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
//!             { "type": "GLQUAD", "fields": { "texture": "hero" } },
//!             { "type": "MOVEMENT" },
//!             { "type": "CONTROLLER" }
//!         ]
//!     } ] }"#)
//!     .unwrap();
//!
//! let input =
//!     ScriptedInput::new([vec![InputEvent::KeyDown("X".to_owned())]]).quit_when_exhausted();
//! let mut engine = Engine::builder(config)
//!     .resources(resources)
//!     .platform(input)
//!     .build()
//!     .unwrap();
//! engine.load_start_level().unwrap();
//! let frames = engine.run().unwrap();
//!
//! assert_eq!(frames, 2);
//! assert!(engine.is_shut_down());
//! ```

#![deny(unsafe_code)]

pub mod collision;
pub mod config;
pub mod engine;
pub mod frame_rate;
pub mod hooks;
pub mod input;
pub mod logging;
pub mod render;
pub mod resources;

use std::path::PathBuf;

use tessera_object::ObjectError;
use tessera_script::ScriptError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Building, linking or loading objects failed.
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// The script runtime could not be created.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The configuration could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine was already torn down.
    #[error("the engine has shut down")]
    ShutDown,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::collision::{run_collision_pass, CollisionPair, CollisionReport, Hit};
    pub use crate::config::{ActionMap, EngineConfig, StateBinding};
    pub use crate::engine::{Engine, EngineBuilder, EngineContext, FrameSummary, RunStatus};
    pub use crate::frame_rate::FrameRateController;
    pub use crate::hooks::{behavior_bindings, EditorHook, ScriptHook};
    pub use crate::input::{InputEvent, InputSource, InputState, ScriptedInput};
    pub use crate::logging::init_logging;
    pub use crate::render::{HeadlessRenderer, RecordedFrame, Renderer};
    pub use crate::resources::ResourceManager;
    pub use crate::EngineError;
}
