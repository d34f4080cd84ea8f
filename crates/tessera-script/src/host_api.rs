//! Host API for behavior scripts.
//!
//! Defines the [`HostState`] that lives inside each script's Wasmtime store
//! and [`register_host_api`], which registers the host functions under the
//! `"tessera"` import namespace.
//!
//! Reads are immediate: a script sees its own object id, the frame's delta
//! time, its behavior parameters and the actions held this frame. Writes are
//! deferred: `change_state` and `destroy_self` only record a
//! [`ScriptRequest`], which the engine turns into a command for the object
//! manager after every script has run.
//!
//! # Host Functions (module `"tessera"`)
//!
//! - `object_id() -> i64`
//! - `delta_time() -> f32`
//! - `frame() -> i64`
//! - `is_action_active(name_ptr: i32, name_len: i32) -> i32`
//! - `param(name_ptr: i32, name_len: i32) -> f64` (`0.0` when absent or not a number)
//! - `change_state(name_ptr: i32, name_len: i32)`
//! - `destroy_self()`
//! - `log(level: i32, msg_ptr: i32, msg_len: i32)`
//!
//! String arguments are read from the module's exported `memory`.

use std::collections::BTreeSet;

use tessera_object::command::{CommandOrigin, CommandQueue};
use tessera_object::id::ObjectId;
use wasmtime::{Caller, Linker, StoreLimits};

/// Import namespace of every host function.
pub const HOST_MODULE: &str = "tessera";

// ---------------------------------------------------------------------------
// ScriptRequest
// ---------------------------------------------------------------------------

/// What a script asked the engine to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRequestKind {
    ChangeState(String),
    Destroy,
}

/// A deferred request made by the script bound to `object`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    pub object: ObjectId,
    pub kind: ScriptRequestKind,
}

impl ScriptRequest {
    /// Queue the request as an object-manager command.
    pub fn enqueue(self, queue: &mut CommandQueue) {
        let origin = CommandOrigin::Script {
            object: self.object,
        };
        match self.kind {
            ScriptRequestKind::ChangeState(state) => {
                queue.change_state(self.object, &state, origin)
            }
            ScriptRequestKind::Destroy => queue.destroy(self.object, origin),
        }
    }
}

// ---------------------------------------------------------------------------
// HostState
// ---------------------------------------------------------------------------

/// Per-instance state held inside the Wasmtime store.
pub struct HostState {
    /// The object this script instance is bound to.
    pub object: ObjectId,
    pub frame: u64,
    pub dt: f32,
    /// Actions held this frame, set by [`begin_frame`](Self::begin_frame).
    pub active_actions: BTreeSet<String>,
    /// Behavior parameters from the level file.
    pub params: serde_json::Value,
    /// Requests accumulated since the last drain.
    pub requests: Vec<ScriptRequest>,
    /// Host calls made during the current frame.
    pub host_call_count: u32,
    pub(crate) limits: StoreLimits,
}

impl HostState {
    pub fn new(object: ObjectId, params: serde_json::Value) -> Self {
        Self {
            object,
            frame: 0,
            dt: 0.0,
            active_actions: BTreeSet::new(),
            params,
            requests: Vec::new(),
            host_call_count: 0,
            limits: StoreLimits::default(),
        }
    }

    /// Set frame metadata before calling `tick()`.
    pub fn begin_frame(&mut self, frame: u64, dt: f32, active_actions: &BTreeSet<String>) {
        self.frame = frame;
        self.dt = dt;
        self.active_actions.clone_from(active_actions);
        self.host_call_count = 0;
    }

    pub fn drain_requests(&mut self) -> Vec<ScriptRequest> {
        std::mem::take(&mut self.requests)
    }

    fn param(&self, name: &str) -> f64 {
        self.params
            .get(name)
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0)
    }
}

impl std::fmt::Debug for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostState")
            .field("object", &self.object)
            .field("frame", &self.frame)
            .field("dt", &self.dt)
            .field("host_call_count", &self.host_call_count)
            .field("pending_requests", &self.requests.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Host function registration
// ---------------------------------------------------------------------------

/// Register every host function under [`HOST_MODULE`].
pub fn register_host_api(linker: &mut Linker<HostState>) -> Result<(), anyhow::Error> {
    linker.func_wrap(HOST_MODULE, "object_id", host_object_id)?;
    linker.func_wrap(HOST_MODULE, "delta_time", host_delta_time)?;
    linker.func_wrap(HOST_MODULE, "frame", host_frame)?;
    linker.func_wrap(HOST_MODULE, "is_action_active", host_is_action_active)?;
    linker.func_wrap(HOST_MODULE, "param", host_param)?;
    linker.func_wrap(HOST_MODULE, "change_state", host_change_state)?;
    linker.func_wrap(HOST_MODULE, "destroy_self", host_destroy_self)?;
    linker.func_wrap(HOST_MODULE, "log", host_log)?;
    Ok(())
}

/// Read a UTF-8 string from the module's exported memory.
fn read_wasm_string(
    caller: &mut Caller<'_,
    HostState>,
    ptr: i32,
    len: i32,
) -> Result<String, String> {
    let memory = caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| "script must export 'memory' to pass strings to the host".to_owned())?;

    let data = memory.data(&caller);
    let (start, len) = match (usize::try_from(ptr), usize::try_from(len)) {
        (Ok(start), Ok(len)) => (start, len),
        _ => return Err(format!("negative string range: ptr={ptr}, len={len}")),
    };
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| {
            format!(
                "string read out of bounds: ptr={ptr}, len={len}, memory_size={}",
                data.len()
            )
        })?;

    String::from_utf8(bytes.to_vec())
        .map_err(|e| format!("string at ptr={ptr} len={len} is not valid UTF-8: {e}"))
}

fn host_object_id(mut caller: Caller<'_, HostState>) -> i64 {
    caller.data_mut().host_call_count += 1;
    caller.data().object.to_raw() as i64
}

fn host_delta_time(mut caller: Caller<'_, HostState>) -> f32 {
    caller.data_mut().host_call_count += 1;
    caller.data().dt
}

fn host_frame(mut caller: Caller<'_, HostState>) -> i64 {
    caller.data_mut().host_call_count += 1;
    caller.data().frame as i64
}

fn host_is_action_active(mut caller: Caller<'_, HostState>, ptr: i32, len: i32) -> i32 {
    caller.data_mut().host_call_count += 1;
    match read_wasm_string(&mut caller, ptr, len) {
        Ok(action) => i32::from(caller.data().active_actions.contains(&action)),
        Err(e) => {
            tracing::warn!(error = %e, "is_action_active: failed to read action name");
            0
        }
    }
}

fn host_param(mut caller: Caller<'_, HostState>, ptr: i32, len: i32) -> f64 {
    caller.data_mut().host_call_count += 1;
    match read_wasm_string(&mut caller, ptr, len) {
        Ok(name) => caller.data().param(&name),
        Err(e) => {
            tracing::warn!(error = %e, "param: failed to read parameter name");
            0.0
        }
    }
}

fn host_change_state(mut caller: Caller<'_, HostState>, ptr: i32, len: i32) {
    caller.data_mut().host_call_count += 1;
    let state = match read_wasm_string(&mut caller, ptr, len) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "change_state: failed to read state name");
            return;
        }
    };
    let host = caller.data_mut();
    let object = host.object;
    host.requests.push(ScriptRequest {
        object,
        kind: ScriptRequestKind::ChangeState(state),
    });
}

fn host_destroy_self(mut caller: Caller<'_, HostState>) {
    let host = caller.data_mut();
    host.host_call_count += 1;
    let object = host.object;
    host.requests.push(ScriptRequest {
        object,
        kind: ScriptRequestKind::Destroy,
    });
}

fn host_log(mut caller: Caller<'_, HostState>, level: i32, ptr: i32, len: i32) {
    caller.data_mut().host_call_count += 1;
    let msg = match read_wasm_string(&mut caller, ptr, len) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "log: failed to read message");
            return;
        }
    };
    let object = caller.data().object;

    match level {
        0 => tracing::trace!(source = "script", %object, "{msg}"),
        1 => tracing::debug!(source = "script", %object, "{msg}"),
        2 => tracing::info!(source = "script", %object, "{msg}"),
        3 => tracing::warn!(source = "script", %object, "{msg}"),
        4 => tracing::error!(source = "script", %object, "{msg}"),
        _ => tracing::info!(source = "script", %object, level = level, "{msg}"),
    }
}
