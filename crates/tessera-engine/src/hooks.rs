//! Optional collaborators the frame driver calls at fixed points.

use tessera_components::behavior::Behavior;
use tessera_components::tags::BEHAVIOR;
use tessera_object::id::ObjectId;
use tessera_object::manager::GameObjectManager;
use tessera_object::resource::ResourceProvider;
use tessera_script::{ScriptBinding, ScriptFrame, ScriptLoadReport, ScriptRequest, ScriptRuntime};

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// An in-process level editor.
///
/// Only driven when [`EngineConfig::run_with_editor`](crate::config::EngineConfig::run_with_editor)
/// is set.
pub trait EditorHook {
    fn init(&mut self) {}

    /// Called after the framebuffer is cleared, before objects draw.
    fn new_frame(&mut self) {}

    /// Called after objects draw, before the frame is presented.
    fn render(&mut self, _objects: &GameObjectManager) {}

    /// Called once at teardown, before anything else is torn down.
    fn cleanup(&mut self) {}
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Runs the scripts named by BEHAVIOR components.
pub trait ScriptHook {
    /// Load one script instance per binding. Called once after a level is
    /// fully built and linked, and again for objects spawned later.
    fn load_behavior_scripts(
        &mut self,
        bindings: &[ScriptBinding],
        resources: &dyn ResourceProvider,
    ) -> ScriptLoadReport;

    /// Run every loaded script once.
    fn tick(&mut self, frame: &ScriptFrame) -> Vec<ScriptRequest>;

    /// Forget the scripts of objects for which `keep` returns `false`.
    fn retain_objects(&mut self, keep: &mut dyn FnMut(ObjectId) -> bool);

    fn shutdown(&mut self);
}

impl ScriptHook for ScriptRuntime {
    fn load_behavior_scripts(
        &mut self,
        bindings: &[ScriptBinding],
        resources: &dyn ResourceProvider,
    ) -> ScriptLoadReport {
        self.load_bindings(bindings, resources)
    }

    fn tick(&mut self, frame: &ScriptFrame) -> Vec<ScriptRequest> {
        ScriptRuntime::tick(self, frame)
    }

    fn retain_objects(&mut self, keep: &mut dyn FnMut(ObjectId) -> bool) {
        ScriptRuntime::retain_objects(self, keep);
    }

    fn shutdown(&mut self) {
        ScriptRuntime::shutdown(self);
    }
}

/// Script bindings of the enabled BEHAVIOR components among `objects`.
/// Ids that are not live are ignored.
pub fn behavior_bindings(manager: &GameObjectManager, objects: &[ObjectId]) -> Vec<ScriptBinding> {
    objects
        .iter()
        .filter_map(|&id| manager.get(id))
        .filter_map(|object| {
            let behavior = object.component::<Behavior>(BEHAVIOR)?;
            behavior.enabled.then(|| ScriptBinding {
                object: object.id(),
                script: behavior.script().to_owned(),
                params: behavior.params().clone(),
            })
        })
        .collect()
}
