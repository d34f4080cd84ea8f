//! Tessera Script -- sandboxed WASM behavior scripts.
//!
//! A BEHAVIOR component names a script; this crate runs it. Scripts are
//! WebAssembly modules (WAT text or binary) exporting `tick()`, executed once
//! per frame inside a fuel-metered Wasmtime store with no WASI.
//!
//! # Architecture
//!
//! - **`ScriptConfig`**: fuel budget and memory cap.
//! - **`ScriptModule`**: one instance bound to one object.
//! - **`HostState`**: per-instance store data; collects [`ScriptRequest`]s.
//! - **`ScriptRuntime`**: compiled-module cache plus every live instance.
//!
//! # Example
//!
//! ```no_run
//! use tessera_object::id::ObjectId;
//! use tessera_script::{HostState, ScriptConfig, ScriptModule, ScriptRequestKind};
//!
//! let wat = r#"(module
//!     (import "tessera" "destroy_self" (func $destroy))
//!     (func (export "tick") call $destroy))"#;
//! let host = HostState::new(ObjectId::new(1, 0), serde_json::json!({}));
//! let config = ScriptConfig::default();
//! let mut module = ScriptModule::from_bytes(&config, wat.as_bytes(), host).unwrap();
//! module.call_tick().unwrap();
//! assert_eq!(module.drain_requests()[0].kind, ScriptRequestKind::Destroy);
//! ```

#![deny(unsafe_code)]

pub mod host_api;
mod module;
mod runtime;

pub use host_api::{HostState, ScriptRequest, ScriptRequestKind};
pub use module::{compile, metered_engine, ScriptConfig, ScriptModule};
pub use runtime::{ScriptBinding, ScriptFrame, ScriptLoadReport, ScriptRuntime};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while loading or running a behavior script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// No script source is available under this name.
    #[error("behavior script '{name}' not found")]
    MissingScript { name: String },

    /// The bytes are not valid WAT or WASM.
    #[error("script compilation failed: {0}")]
    Compile(String),

    /// The module does not export a required function.
    #[error("missing required export '{name}' -- behavior scripts must export `tick()`")]
    MissingExport { name: String },

    /// The module exhausted its fuel budget during one tick.
    #[error("script ran out of fuel (budget: {budget} units)")]
    OutOfFuel { budget: u64 },

    /// A WASM trap (unreachable, division by zero, out-of-bounds access).
    #[error("script trap: {0}")]
    Trap(String),

    /// The module's initial memory is larger than the configured cap.
    #[error("script exceeds memory limit of {limit_bytes} bytes")]
    MemoryLimitExceeded { limit_bytes: usize },

    /// Any other Wasmtime failure, including unsatisfied imports.
    #[error("script runtime error: {0}")]
    Runtime(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
