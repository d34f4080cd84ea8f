//! Per-level script bookkeeping.
//!
//! [`ScriptRuntime`] owns one metered Wasmtime engine, a cache of compiled
//! modules keyed by script name and one [`ScriptModule`] instance per bound
//! object. After a level is built the engine hands it the BEHAVIOR bindings;
//! from then on [`ScriptRuntime::tick`] runs every instance once per frame
//! and returns the requests they made.

use std::collections::{BTreeSet, HashMap};

use tessera_object::id::ObjectId;
use tessera_object::resource::ResourceProvider;
use tracing::{debug, info, warn};
use wasmtime::{Engine, Module};

use crate::host_api::{HostState, ScriptRequest};
use crate::module::{compile, metered_engine, ScriptConfig, ScriptModule};
use crate::ScriptError;

/// A script attached to an object by a BEHAVIOR component.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptBinding {
    pub object: ObjectId,
    pub script: String,
    pub params: serde_json::Value,
}

/// Per-frame inputs shared by every script.
#[derive(Debug, Clone, Default)]
pub struct ScriptFrame {
    pub frame: u64,
    pub dt: f32,
    pub active_actions: BTreeSet<String>,
}

/// Outcome of [`ScriptRuntime::load_bindings`].
#[derive(Debug, Default)]
pub struct ScriptLoadReport {
    pub loaded: Vec<ObjectId>,
    pub failed: Vec<(ObjectId, ScriptError)>,
}

struct BoundScript {
    script: String,
    module: ScriptModule,
    /// Set after the first failing tick; faulted scripts are not run again.
    faulted: bool,
}

/// Runs behavior scripts for the live objects of a level.
pub struct ScriptRuntime {
    engine: Engine,
    config: ScriptConfig,
    compiled: HashMap<String, Module>,
    bound: Vec<(ObjectId, BoundScript)>,
}

impl ScriptRuntime {
    pub fn new(config: ScriptConfig) -> Result<Self, ScriptError> {
        Ok(Self {
            engine: metered_engine()?,
            config,
            compiled: HashMap::new(),
            bound: Vec::new(),
        })
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Compile `script` unless it is already cached.
    fn compiled(
        &mut self,
        script: &str,
        resources: &dyn ResourceProvider,
    ) -> Result<Module, ScriptError> {
        if let Some(module) = self.compiled.get(script) {
            return Ok(module.clone());
        }
        let bytes = resources.script(script).ok_or_else(|| ScriptError::MissingScript {
            name: script.to_owned(),
        })?;
        let module = compile(&self.engine, &self.config, &bytes)?;
        debug!(script, bytes = bytes.len(), "script compiled");
        self.compiled.insert(script.to_owned(), module.clone());
        Ok(module)
    }

    /// Instantiate one script per binding. Failures are logged and reported;
    /// they never stop the remaining bindings from loading.
    pub fn load_bindings(
        &mut self,
        bindings: &[ScriptBinding],
        resources: &dyn ResourceProvider,
    ) -> ScriptLoadReport {
        let mut report = ScriptLoadReport::default();
        for binding in bindings {
            match self.bind(binding, resources) {
                Ok(()) => report.loaded.push(binding.object),
                Err(error) => {
                    warn!(
                        object = %binding.object,
                        script = %binding.script,
                        error = %error,
                        "failed to load behavior script"
                    );
                    report.failed.push((binding.object, error));
                }
            }
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "behavior scripts loaded"
        );
        report
    }

    fn bind(
        &mut self,
        binding: &ScriptBinding,
        resources: &dyn ResourceProvider,
    ) -> Result<(), ScriptError> {
        let module = self.compiled(&binding.script, resources)?;
        let host = HostState::new(binding.object, binding.params.clone());
        let instance = ScriptModule::instantiate(&self.engine, &module, &self.config, host)?;
        // Rebinding an object replaces its previous script.
        self.bound.retain(|(object, _)| *object != binding.object);
        self.bound.push((
            binding.object,
            BoundScript {
                script: binding.script.clone(),
                module: instance,
                faulted: false,
            },
        ));
        Ok(())
    }

    /// Run `tick()` of every healthy instance, in binding order.
    ///
    /// A script that traps or runs out of fuel is logged once, marked as
    /// faulted and skipped from then on. Requests it made before failing are
    /// discarded.
    pub fn tick(&mut self, frame: &ScriptFrame) -> Vec<ScriptRequest> {
        let mut requests = Vec::new();
        for (object, bound) in &mut self.bound {
            if bound.faulted {
                continue;
            }
            bound
                .module
                .host_state_mut()
                .begin_frame(frame.frame, frame.dt, &frame.active_actions);
            match bound.module.call_tick() {
                Ok(_) => requests.extend(bound.module.drain_requests()),
                Err(error) => {
                    warn!(
                        object = %object,
                        script = %bound.script,
                        frame = frame.frame,
                        error = %error,
                        "behavior script faulted, disabling it"
                    );
                    bound.module.drain_requests();
                    bound.faulted = true;
                }
            }
        }
        requests
    }

    /// Drop the instances of objects for which `keep` returns `false`.
    pub fn retain_objects(&mut self, mut keep: impl FnMut(ObjectId) -> bool) {
        self.bound.retain(|(object, _)| keep(*object));
    }

    pub fn is_bound(&self, object: ObjectId) -> bool {
        self.bound.iter().any(|(o, _)| *o == object)
    }

    pub fn is_faulted(&self, object: ObjectId) -> bool {
        self.bound
            .iter()
            .any(|(o, bound)| *o == object && bound.faulted)
    }

    pub fn instance_count(&self) -> usize {
        self.bound.len()
    }

    /// Drop every instance and compiled module.
    pub fn shutdown(&mut self) {
        let instances = self.bound.len();
        self.bound.clear();
        self.compiled.clear();
        debug!(instances, "script runtime shut down");
    }
}

impl std::fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("config", &self.config)
            .field("compiled", &self.compiled.len())
            .field("instances", &self.bound.len())
            .finish_non_exhaustive()
    }
}
