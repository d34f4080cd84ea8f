//! Script module compilation, instantiation and execution.
//!
//! A behavior script is compiled once per name into a [`wasmtime::Module`]
//! and instantiated once per bound object as a [`ScriptModule`], so every
//! object gets its own globals and linear memory. Execution is fuel metered
//! and memory is capped by [`ScriptConfig`].

use wasmtime::{Engine, ExternType, Instance, Linker, Module, Store, StoreLimitsBuilder};

use crate::host_api::{register_host_api, HostState, ScriptRequest};
use crate::ScriptError;

const WASM_PAGE_BYTES: u64 = 64 * 1024;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sandbox limits shared by every script.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Fuel granted per `tick()` call. Default: 1,000,000.
    pub fuel_per_tick: u64,
    /// Maximum linear memory per instance, in bytes. Default: 16 MiB.
    pub memory_limit_bytes: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            fuel_per_tick: 1_000_000,
            memory_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Build a Wasmtime engine with fuel metering enabled.
pub fn metered_engine() -> Result<Engine, ScriptError> {
    let mut engine_config = wasmtime::Config::new();
    engine_config.consume_fuel(true);
    Engine::new(&engine_config)
        .map_err(|e| ScriptError::Runtime(format!("failed to create Wasmtime engine: {e}")))
}

/// Compile WAT text or WASM binary and check its exports.
///
/// # Errors
///
/// - [`ScriptError::Compile`] if the bytes are not valid WAT/WASM.
/// - [`ScriptError::MissingExport`] if `tick` is not exported.
/// - [`ScriptError::MemoryLimitExceeded`] if an exported memory starts
///   larger than the configured limit.
pub fn compile(
    engine: &Engine,
    config: &ScriptConfig,
    bytes: &[u8],
) -> Result<Module, ScriptError> {
    let module = Module::new(engine, bytes).map_err(|e| ScriptError::Compile(format!("{e}")))?;

    if !module.exports().any(|export| export.name() == "tick") {
        return Err(ScriptError::MissingExport {
            name: "tick".to_owned(),
        });
    }

    for export in module.exports() {
        if let ExternType::Memory(memory) = export.ty() {
            let initial = memory.minimum().saturating_mul(WASM_PAGE_BYTES);
            if initial > config.memory_limit_bytes as u64 {
                return Err(ScriptError::MemoryLimitExceeded {
                    limit_bytes: config.memory_limit_bytes,
                });
            }
        }
    }
    Ok(module)
}

// ---------------------------------------------------------------------------
// ScriptModule
// ---------------------------------------------------------------------------

/// One instantiated script, bound to one object.
///
/// # Sandbox Guarantees
///
/// - No WASI: only the `tessera` host namespace is linked
/// - Fuel metering stops runaway loops
/// - `memory.grow` past [`ScriptConfig::memory_limit_bytes`] fails
pub struct ScriptModule {
    store: Store<HostState>,
    instance: Instance,
    config: ScriptConfig,
}

impl ScriptModule {
    /// Instantiate a compiled module with the host API linked in.
    pub fn instantiate(
        engine: &Engine,
        module: &Module,
        config: &ScriptConfig,
        mut host: HostState,
    ) -> Result<Self, ScriptError> {
        host.limits = StoreLimitsBuilder::new()
            .memory_size(config.memory_limit_bytes)
            .build();
        let mut store = Store::new(engine, host);
        store.limiter(|host| &mut host.limits);
        store
            .set_fuel(config.fuel_per_tick)
            .map_err(|e| ScriptError::Runtime(format!("failed to set fuel: {e}")))?;

        let mut linker = Linker::new(engine);
        register_host_api(&mut linker)
            .map_err(|e| ScriptError::Runtime(format!("failed to register host API: {e}")))?;

        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| ScriptError::Runtime(format!("{e}")))?;

        tracing::debug!(
            object = %store.data().object,
            fuel_per_tick = config.fuel_per_tick,
            memory_limit = config.memory_limit_bytes,
            "script instantiated"
        );

        Ok(Self {
            store,
            instance,
            config: config.clone(),
        })
    }

    /// Compile and instantiate in one step, on a fresh metered engine.
    pub fn from_bytes(
        config: &ScriptConfig,
        bytes: &[u8],
        host: HostState,
    ) -> Result<Self, ScriptError> {
        let engine = metered_engine()?;
        let module = compile(&engine, config, bytes)?;
        Self::instantiate(&engine, &module, config, host)
    }

    /// Run `tick()` with a fresh fuel budget. Returns the fuel consumed.
    ///
    /// # Errors
    ///
    /// - [`ScriptError::OutOfFuel`] if the budget ran out.
    /// - [`ScriptError::Trap`] on any other WASM trap.
    pub fn call_tick(&mut self) -> Result<u64, ScriptError> {
        self.store
            .set_fuel(self.config.fuel_per_tick)
            .map_err(|e| ScriptError::Runtime(format!("failed to set fuel: {e}")))?;

        let tick_fn = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, "tick")
            .map_err(|e| ScriptError::Runtime(format!("failed to resolve tick(): {e}")))?;

        tick_fn
            .call(&mut self.store, ())
            .map_err(|e| self.classify_trap(e))?;

        let remaining = self
            .store
            .get_fuel()
            .map_err(|e| ScriptError::Runtime(format!("failed to read fuel: {e}")))?;
        let consumed = self.config.fuel_per_tick.saturating_sub(remaining);

        tracing::trace!(
            object = %self.store.data().object,
            fuel_consumed = consumed,
            "tick() completed"
        );
        Ok(consumed)
    }

    /// Call a no-argument export returning `i32`. Fuel is not reset.
    pub fn call_i32_export(&mut self, name: &str) -> Result<i32, ScriptError> {
        let func = self
            .instance
            .get_typed_func::<(), i32>(&mut self.store, name)
            .map_err(|e| ScriptError::Runtime(format!("failed to resolve export '{name}': {e}")))?;
        func.call(&mut self.store, ())
            .map_err(|e| self.classify_trap(e))
    }

    pub fn fuel_remaining(&self) -> u64 {
        self.store.get_fuel().unwrap_or(0)
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn host_state(&self) -> &HostState {
        self.store.data()
    }

    pub fn host_state_mut(&mut self) -> &mut HostState {
        self.store.data_mut()
    }

    pub fn drain_requests(&mut self) -> Vec<ScriptRequest> {
        self.store.data_mut().drain_requests()
    }

    fn classify_trap(&self, error: anyhow::Error) -> ScriptError {
        // The trap is usually the root error, but Wasmtime may wrap it in
        // backtrace context.
        let trap = error
            .downcast_ref::<wasmtime::Trap>()
            .or_else(|| error.chain().find_map(|c| c.downcast_ref::<wasmtime::Trap>()));
        match trap {
            Some(wasmtime::Trap::OutOfFuel) => ScriptError::OutOfFuel {
                budget: self.config.fuel_per_tick,
            },
            Some(_) => ScriptError::Trap(format!("{error}")),
            None => ScriptError::Runtime(format!("{error}")),
        }
    }
}

impl std::fmt::Debug for ScriptModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptModule")
            .field("host", self.store.data())
            .field("config", &self.config)
            .field("fuel_remaining", &self.fuel_remaining())
            .finish_non_exhaustive()
    }
}
