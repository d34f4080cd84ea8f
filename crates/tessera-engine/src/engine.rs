//! The frame driver.
//!
//! [`Engine`] owns an [`EngineContext`] holding every subsystem and advances
//! it one frame per [`step`](Engine::step):
//!
//! 1. Poll the platform for input events.
//! 2. Update every live object, then flush the commands they queued.
//! 3. Tick behavior scripts and queue their requests.
//! 4. Roll the input state forward with this frame's events.
//! 5. Switch to [`RunStatus::Quit`] if quit was requested.
//! 6. Queue state changes for pressed [state bindings](crate::config::StateBinding).
//! 7. Run the [collision pass](crate::collision), then flush the commands
//!    queued since step 2.
//! 8. Clear the framebuffer.
//! 9. Start the editor frame.
//! 10. Draw every live object between `use_program` and `unuse_program`.
//! 11. Render the editor.
//! 12. Present.
//! 13. Pace to the target frame rate.
//!
//! Components in step 2 see the input as of the end of the previous frame.
//!
//! Teardown runs once, from [`shutdown`](Engine::shutdown), the end of
//! [`run`](Engine::run) or `Drop`, in reverse creation order: editor
//! cleanup, object cleanup, script shutdown, renderer shutdown, platform
//! shutdown.

use std::time::Duration;

use tessera_components::builtin_components;
use tessera_object::command::CommandOrigin;
use tessera_object::factory::{GameObjectFactory, LevelReport};
use tessera_object::id::ObjectId;
use tessera_object::manager::{FrameReport, FrameServices, GameObjectManager, ObjectFailure};
use tessera_object::registry::ComponentFactory;
use tessera_object::resource::ResourceProvider;
use tessera_script::{ScriptFrame, ScriptRuntime};
use tracing::{debug, info, warn};

use crate::collision::{run_collision_pass, CollisionReport};
use crate::config::{EngineConfig, StateBinding};
use crate::frame_rate::FrameRateController;
use crate::hooks::{behavior_bindings, EditorHook, ScriptHook};
use crate::input::{InputSource, InputState, ScriptedInput};
use crate::render::{HeadlessRenderer, Renderer};
use crate::resources::ResourceManager;
use crate::EngineError;

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// Whether the main loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Running,
    Quit,
}

// ---------------------------------------------------------------------------
// EngineContext
// ---------------------------------------------------------------------------

/// Every subsystem of a running engine, passed explicitly instead of living
/// in globals.
pub struct EngineContext {
    pub config: EngineConfig,
    pub factory: GameObjectFactory,
    pub resources: ResourceManager,
    pub objects: GameObjectManager,
    pub input: InputState,
    pub frame_rate: FrameRateController,
    pub platform: Box<dyn InputSource>,
    pub renderer: Box<dyn Renderer>,
    pub scripts: Box<dyn ScriptHook>,
    /// Present only when the config asks for the editor.
    pub editor: Option<Box<dyn EditorHook>>,
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("objects", &self.objects.len())
            .field("input", &self.input)
            .field("frame_rate", &self.frame_rate)
            .field("editor", &self.editor.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// FrameSummary
// ---------------------------------------------------------------------------

/// What happened during one [`Engine::step`].
#[derive(Debug, Clone, Default)]
pub struct FrameSummary {
    pub frame: u64,
    /// Time step the objects were updated with.
    pub dt: f32,
    /// The object update pass and the flush of component commands.
    pub update: FrameReport,
    /// The flush of script, input and collision commands.
    pub flush: FrameReport,
    pub script_requests: usize,
    /// Script instances created for objects spawned this frame.
    pub scripts_loaded: usize,
    pub state_changes: usize,
    pub collisions: CollisionReport,
    pub draw_failures: Vec<ObjectFailure>,
    pub status: RunStatus,
    /// Wall time of the frame, including pacing.
    pub elapsed: Duration,
}

impl FrameSummary {
    /// Objects whose update or draw failed this frame.
    pub fn failure_count(&self) -> usize {
        self.update.failures.len() + self.draw_failures.len()
    }
}

// ---------------------------------------------------------------------------
// EngineBuilder
// ---------------------------------------------------------------------------

/// Assembles an [`Engine`]. Anything not supplied gets a headless default:
/// the built-in components, an in-memory [`ResourceManager`], a
/// [`ScriptedInput`] with no events, a [`HeadlessRenderer`] and a
/// [`ScriptRuntime`] using the configured limits.
pub struct EngineBuilder {
    config: EngineConfig,
    components: Option<ComponentFactory>,
    resources: Option<ResourceManager>,
    platform: Option<Box<dyn InputSource>>,
    renderer: Option<Box<dyn Renderer>>,
    scripts: Option<Box<dyn ScriptHook>>,
    editor: Option<Box<dyn EditorHook>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            components: None,
            resources: None,
            platform: None,
            renderer: None,
            scripts: None,
            editor: None,
        }
    }

    pub fn components(mut self, components: ComponentFactory) -> Self {
        self.components = Some(components);
        self
    }

    pub fn resources(mut self, resources: ResourceManager) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn platform(mut self, platform: impl InputSource + 'static) -> Self {
        self.platform = Some(Box::new(platform));
        self
    }

    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn scripts(mut self, scripts: impl ScriptHook + 'static) -> Self {
        self.scripts = Some(Box::new(scripts));
        self
    }

    pub fn editor(mut self, editor: impl EditorHook + 'static) -> Self {
        self.editor = Some(Box::new(editor));
        self
    }

    /// Validate the config and bring the subsystems up in order: platform,
    /// renderer, objects, scripts, editor.
    pub fn build(self) -> Result<Engine, EngineError> {
        let config = self.config;
        config.validate()?;

        let platform = self
            .platform
            .unwrap_or_else(|| Box::new(ScriptedInput::default()));
        let renderer = self
            .renderer
            .unwrap_or_else(|| Box::new(HeadlessRenderer::new()));
        let factory = GameObjectFactory::new(self.components.unwrap_or_else(builtin_components));
        let scripts = match self.scripts {
            Some(scripts) => scripts,
            None => Box::new(ScriptRuntime::new(config.scripts.clone())?),
        };
        let mut editor = if config.run_with_editor {
            self.editor
        } else {
            if self.editor.is_some() {
                debug!("editor supplied but run_with_editor is off; ignoring it");
            }
            None
        };
        if let Some(editor) = editor.as_mut() {
            editor.init();
        }

        let frame_rate = if config.headless {
            FrameRateController::fixed(config.target_fps)
        } else {
            FrameRateController::new(config.target_fps)
        };

        info!(
            fps = config.target_fps,
            headless = config.headless,
            editor = editor.is_some(),
            components = factory.components().len(),
            "engine initialised"
        );

        Ok(Engine {
            ctx: EngineContext {
                input: InputState::new(config.actions.clone()),
                resources: self.resources.unwrap_or_default(),
                objects: GameObjectManager::new(),
                config,
                factory,
                frame_rate,
                platform,
                renderer,
                scripts,
                editor,
            },
            status: RunStatus::Running,
            frame: 0,
            torn_down: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The main loop.
///
/// # Example
///
/// ```
/// use tessera_engine::prelude::*;
///
/// let config = EngineConfig { headless: true, ..EngineConfig::default() };
/// let mut resources = ResourceManager::in_memory();
/// resources
///     .insert_level_json(0, r#"{ "objects": [ { "components": [
///         { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
///         { "type": "MOVEMENT", "fields": { "velocity": [60.0, 0.0] } }
///     ] } ] }"#)
///     .unwrap();
///
/// let mut engine = Engine::builder(config).resources(resources).build().unwrap();
/// engine.load_start_level().unwrap();
/// engine.run_frames(60).unwrap();
/// engine.quit();
/// assert_eq!(engine.run().unwrap(), 0);
/// ```
pub struct Engine {
    ctx: EngineContext,
    status: RunStatus,
    frame: u64,
    torn_down: bool,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// An engine with every default collaborator.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        EngineBuilder::new(config).build()
    }

    // -- levels -------------------------------------------------------------

    /// Replace the live objects with level `level_id`, then load the
    /// scripts of its BEHAVIOR components.
    ///
    /// Objects that fail to build or link are handled by the configured
    /// [`LoadPolicy`](tessera_object::factory::LoadPolicy); with `Abort` the
    /// first failure is returned and no object of the level becomes live.
    /// When loading fails the current level and its scripts stay as they
    /// were.
    pub fn load_level(&mut self, level_id: u32) -> Result<LevelReport, EngineError> {
        let ctx = &mut self.ctx;
        // New objects wait in the pending list until the old level is gone.
        let report = ctx.factory.create_level(
            level_id,
            &ctx.resources,
            &mut ctx.objects,
            ctx.config.load_policy,
        )?;
        let retired = ctx.objects.retire_live();
        ctx.scripts.retain_objects(&mut |_| false);
        ctx.objects.commit_pending();
        debug!(level = level_id, retired, "previous level retired");

        let bindings = behavior_bindings(&ctx.objects, &report.loaded);
        let scripts = ctx.scripts.load_behavior_scripts(&bindings, &ctx.resources);
        info!(
            level = level_id,
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            scripts = scripts.loaded.len(),
            script_failures = scripts.failed.len(),
            "level loaded"
        );
        Ok(report)
    }

    /// Load [`EngineConfig::start_level`].
    pub fn load_start_level(&mut self) -> Result<LevelReport, EngineError> {
        self.load_level(self.ctx.config.start_level)
    }

    // -- loop ---------------------------------------------------------------

    /// Advance one frame.
    ///
    /// # Errors
    ///
    /// [`EngineError::ShutDown`] once teardown has run. Failures of
    /// individual objects or scripts never fail the frame; they are reported
    /// in the returned [`FrameSummary`].
    pub fn step(&mut self) -> Result<FrameSummary, EngineError> {
        if self.torn_down {
            return Err(EngineError::ShutDown);
        }
        let frame = self.frame;
        let ctx = &mut self.ctx;
        ctx.frame_rate.begin_frame();
        let dt = ctx.frame_rate.delta_time();

        let events = ctx.platform.poll();

        let services = FrameServices {
            factory: &ctx.factory,
            resources: &ctx.resources,
            input: &ctx.input,
        };
        let update = ctx.objects.update(dt, &services);
        let mut scripts_loaded =
            sync_scripts(ctx.scripts.as_mut(), &ctx.objects, &ctx.resources, &update);

        let script_frame = ScriptFrame {
            frame,
            dt,
            active_actions: ctx.input.active_actions(),
        };
        let requests = ctx.scripts.tick(&script_frame);
        let script_requests = requests.len();
        for request in requests {
            request.enqueue(ctx.objects.commands_mut());
        }

        ctx.input.advance(&events);

        if ctx.input.is_quit() && self.status == RunStatus::Running {
            info!(frame, "quit requested");
            self.status = RunStatus::Quit;
        }

        let state_changes =
            queue_state_bindings(&ctx.config.state_bindings, &ctx.input, &mut ctx.objects);
        let collisions = run_collision_pass(&mut ctx.objects);

        let services = FrameServices {
            factory: &ctx.factory,
            resources: &ctx.resources,
            input: &ctx.input,
        };
        let flush = ctx.objects.flush(&services);
        scripts_loaded += sync_scripts(ctx.scripts.as_mut(), &ctx.objects, &ctx.resources, &flush);

        ctx.renderer.clear(ctx.config.clear_color);
        if let Some(editor) = ctx.editor.as_mut() {
            editor.new_frame();
        }
        let program = ctx.renderer.program();
        program.use_program();
        let draw_failures = ctx.objects.draw(program);
        program.unuse_program();
        if let Some(editor) = ctx.editor.as_mut() {
            editor.render(&ctx.objects);
        }
        ctx.renderer.present();

        ctx.frame_rate.end_frame();
        self.frame += 1;

        let summary = FrameSummary {
            frame,
            dt,
            update,
            flush,
            script_requests,
            scripts_loaded,
            state_changes,
            collisions,
            draw_failures,
            status: self.status,
            elapsed: self.ctx.frame_rate.last_frame_time(),
        };
        if summary.failure_count() > 0 {
            warn!(frame, failures = summary.failure_count(), "frame had object failures");
        }
        Ok(summary)
    }

    /// Step until quit, then tear down. Returns the number of frames run.
    pub fn run(&mut self) -> Result<u64, EngineError> {
        let start = self.frame;
        while self.status == RunStatus::Running {
            self.step()?;
        }
        self.shutdown();
        Ok(self.frame - start)
    }

    /// Step at most `count` frames, stopping early on quit. Does not tear
    /// down. Returns the number of frames run.
    pub fn run_frames(&mut self, count: u64) -> Result<u64, EngineError> {
        let mut ran = 0;
        while ran < count && self.status == RunStatus::Running {
            self.step()?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Stop the loop after the current frame.
    pub fn quit(&mut self) {
        self.status = RunStatus::Quit;
    }

    /// Tear everything down. Returns `false` if teardown already ran.
    pub fn shutdown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.status = RunStatus::Quit;

        let ctx = &mut self.ctx;
        if let Some(editor) = ctx.editor.as_mut() {
            editor.cleanup();
        }
        ctx.objects.cleanup();
        ctx.scripts.shutdown();
        ctx.renderer.shutdown();
        ctx.platform.shutdown();
        info!(frames = self.frame, "engine shut down");
        true
    }

    // -- accessors ----------------------------------------------------------

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn is_shut_down(&self) -> bool {
        self.torn_down
    }

    /// Frames stepped so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn objects(&self) -> &GameObjectManager {
        &self.ctx.objects
    }

    pub fn objects_mut(&mut self) -> &mut GameObjectManager {
        &mut self.ctx.objects
    }

    pub fn input(&self) -> &InputState {
        &self.ctx.input
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// The renderer, if it is a `T`.
    pub fn renderer<T: Renderer + 'static>(&self) -> Option<&T> {
        self.ctx.renderer.as_any().downcast_ref::<T>()
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.ctx
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("status", &self.status)
            .field("frame", &self.frame)
            .field("torn_down", &self.torn_down)
            .field("ctx", &self.ctx)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Frame helpers
// ---------------------------------------------------------------------------

/// Queue a state change for every object affected by a binding whose action
/// was pressed this frame. Objects that do not declare the state are left
/// alone. Returns the number of changes queued.
pub fn queue_state_bindings(
    bindings: &[StateBinding],
    input: &InputState,
    objects: &mut GameObjectManager,
) -> usize {
    let mut queued = 0;
    for binding in bindings {
        if !input.is_action_pressed(&binding.action) {
            continue;
        }
        let targets: Vec<ObjectId> = objects
            .objects()
            .iter()
            .filter(|object| {
                object.has_component(&binding.component).is_some()
                    && object.state_machine().is_declared(&binding.state)
            })
            .map(|object| object.id())
            .collect();
        for target in targets {
            objects.request_state_change(
                target,
                &binding.state,
                CommandOrigin::Input(binding.action.clone()),
            );
            queued += 1;
        }
    }
    queued
}

/// Drop the scripts of destroyed objects and load those of spawned ones.
/// Returns the number of scripts loaded.
fn sync_scripts(
    scripts: &mut dyn ScriptHook,
    objects: &GameObjectManager,
    resources: &dyn ResourceProvider,
    report: &FrameReport,
) -> usize {
    if !report.destroyed.is_empty() {
        scripts.retain_objects(&mut |id| objects.contains(id));
    }
    let bindings = behavior_bindings(objects, &report.spawned);
    if bindings.is_empty() {
        return 0;
    }
    scripts.load_behavior_scripts(&bindings, resources).loaded.len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputEvent;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct LoggingEditor(Log);

    impl EditorHook for LoggingEditor {
        fn init(&mut self) {
            self.0.borrow_mut().push("editor.init");
        }
        fn new_frame(&mut self) {
            self.0.borrow_mut().push("editor.new_frame");
        }
        fn render(&mut self, _objects: &GameObjectManager) {
            self.0.borrow_mut().push("editor.render");
        }
        fn cleanup(&mut self) {
            self.0.borrow_mut().push("editor.cleanup");
        }
    }

    struct LoggingPlatform(Log);

    impl InputSource for LoggingPlatform {
        fn poll(&mut self) -> Vec<InputEvent> {
            self.0.borrow_mut().push("platform.poll");
            Vec::new()
        }
        fn shutdown(&mut self) {
            self.0.borrow_mut().push("platform.shutdown");
        }
    }

    struct LoggingRenderer {
        log: Log,
        inner: HeadlessRenderer,
    }

    impl Renderer for LoggingRenderer {
        fn clear(&mut self, color: [f32; 4]) {
            self.log.borrow_mut().push("renderer.clear");
            self.inner.clear(color);
        }
        fn program(&mut self) -> &mut dyn tessera_object::render::ShaderProgram {
            self.log.borrow_mut().push("renderer.program");
            self.inner.program()
        }
        fn present(&mut self) {
            self.log.borrow_mut().push("renderer.present");
        }
        fn shutdown(&mut self) {
            self.log.borrow_mut().push("renderer.shutdown");
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    struct LoggingScripts(Log);

    impl ScriptHook for LoggingScripts {
        fn load_behavior_scripts(
            &mut self,
            _bindings: &[tessera_script::ScriptBinding],
            _resources: &dyn ResourceProvider,
        ) -> tessera_script::ScriptLoadReport {
            tessera_script::ScriptLoadReport::default()
        }
        fn tick(&mut self, _frame: &ScriptFrame) -> Vec<tessera_script::ScriptRequest> {
            self.0.borrow_mut().push("scripts.tick");
            Vec::new()
        }
        fn retain_objects(&mut self, _keep: &mut dyn FnMut(ObjectId) -> bool) {}
        fn shutdown(&mut self) {
            self.0.borrow_mut().push("scripts.shutdown");
        }
    }

    fn logged_engine(log: &Log, run_with_editor: bool) -> Engine {
        let config = EngineConfig {
            headless: true,
            run_with_editor,
            ..EngineConfig::default()
        };
        Engine::builder(config)
            .platform(LoggingPlatform(Rc::clone(log)))
            .renderer(LoggingRenderer {
                log: Rc::clone(log),
                inner: HeadlessRenderer::new(),
            })
            .scripts(LoggingScripts(Rc::clone(log)))
            .editor(LoggingEditor(Rc::clone(log)))
            .build()
            .unwrap()
    }

    #[test]
    fn frame_phases_run_in_order() {
        let log: Log = Rc::default();
        let mut engine = logged_engine(&log, true);
        engine.step().unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "editor.init",
                "platform.poll",
                "scripts.tick",
                "renderer.clear",
                "editor.new_frame",
                "renderer.program",
                "editor.render",
                "renderer.present",
            ]
        );
    }

    #[test]
    fn teardown_runs_once_in_reverse_order() {
        let log: Log = Rc::default();
        let mut engine = logged_engine(&log, true);
        log.borrow_mut().clear();

        assert!(engine.shutdown());
        assert!(!engine.shutdown());
        drop(engine);
        assert_eq!(
            *log.borrow(),
            vec![
                "editor.cleanup",
                "scripts.shutdown",
                "renderer.shutdown",
                "platform.shutdown",
            ]
        );
    }

    #[test]
    fn editor_is_ignored_unless_enabled() {
        let log: Log = Rc::default();
        let mut engine = logged_engine(&log, false);
        engine.step().unwrap();
        assert!(!log.borrow().iter().any(|entry| entry.starts_with("editor")));
    }

    #[test]
    fn drop_tears_down() {
        let log: Log = Rc::default();
        drop(logged_engine(&log, false));
        assert_eq!(log.borrow().last(), Some(&"platform.shutdown"));
    }

    #[test]
    fn stepping_after_shutdown_fails() {
        let mut engine = Engine::new(EngineConfig {
            headless: true,
            ..EngineConfig::default()
        })
        .unwrap();
        engine.shutdown();
        assert!(matches!(engine.step(), Err(EngineError::ShutDown)));
        assert_eq!(engine.run().unwrap(), 0);
    }

    #[test]
    fn quit_stops_run_frames() {
        let mut engine = Engine::new(EngineConfig {
            headless: true,
            ..EngineConfig::default()
        })
        .unwrap();
        assert_eq!(engine.run_frames(3).unwrap(), 3);
        engine.quit();
        assert_eq!(engine.run_frames(3).unwrap(), 0);
        assert_eq!(engine.status(), RunStatus::Quit);
        assert!(!engine.is_shut_down());
    }

    #[test]
    fn headless_renderer_is_reachable() {
        let mut engine = Engine::new(EngineConfig {
            headless: true,
            clear_color: [0.1, 0.2, 0.3, 1.0],
            ..EngineConfig::default()
        })
        .unwrap();
        engine.step().unwrap();
        let renderer = engine.renderer::<HeadlessRenderer>().unwrap();
        assert_eq!(renderer.frames_presented(), 1);
        assert_eq!(renderer.last_frame().unwrap().clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert!(!renderer.program_in_use());
    }

    #[test]
    fn invalid_config_fails_to_build() {
        let err = Engine::new(EngineConfig {
            target_fps: 0,
            ..EngineConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
