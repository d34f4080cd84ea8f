//! The authoritative list of live game objects and its per-frame dispatch.
//!
//! # Frame protocol
//!
//! 1. Objects handed over with [`add`](GameObjectManager::add) since the last
//!    frame become live.
//! 2. Every live object is updated in insertion order. Components may only
//!    *request* spawns, destroys and state changes through the
//!    [`CommandQueue`] in their context; the list itself is never touched
//!    while it is being iterated.
//! 3. The queue is flushed in FIFO order: a destroy removes the object and
//!    releases its id, a spawn constructs, links and inserts a new object, a
//!    state change runs the exit/enter hooks.
//!
//! A failure inside one object is logged and reported in the
//! [`FrameReport`]; it never stops the frame.

use tracing::{debug, info, warn};

use crate::command::{detect_conflicts, Command, CommandKind, CommandOrigin, CommandQueue};
use crate::component::InputQuery;
use crate::factory::GameObjectFactory;
use crate::id::{ObjectId, ObjectIdAllocator};
use crate::object::GameObject;
use crate::payload::ObjectDescriptor;
use crate::render::ShaderProgram;
use crate::resource::ResourceProvider;
use crate::ObjectError;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Collaborators the manager needs for one frame.
#[derive(Clone, Copy)]
pub struct FrameServices<'a> {
    /// Builds objects for queued spawns.
    pub factory: &'a GameObjectFactory,
    /// Texture and script lookup for linking spawned objects.
    pub resources: &'a dyn ResourceProvider,
    /// Input visible to components.
    pub input: &'a dyn InputQuery,
}

/// One object's update or draw failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFailure {
    pub object: ObjectId,
    pub name: Option<String>,
    pub error: ObjectError,
}

impl ObjectFailure {
    fn of(object: &GameObject, error: ObjectError) -> Self {
        Self {
            object: object.id(),
            name: object.name().map(str::to_owned),
            error,
        }
    }
}

/// Summary of one command flush.
///
/// `conflict_count` counts objects targeted by more than one command of the
/// same kind in a single flush. Conflicts are warnings: commands still apply
/// in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub conflict_count: usize,
    pub failed_count: usize,
    pub success_count: usize,
}

/// Everything that happened in one [`GameObjectManager::update`].
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Frame number, starting at zero.
    pub frame: u64,
    /// Number of objects whose update was dispatched.
    pub updated: usize,
    pub failures: Vec<ObjectFailure>,
    pub applied: ApplyReport,
    pub spawned: Vec<ObjectId>,
    pub destroyed: Vec<ObjectId>,
    /// Every flushed command, successful or not, in application order.
    pub commands: Vec<Command>,
}

// ---------------------------------------------------------------------------
// GameObjectManager
// ---------------------------------------------------------------------------

/// Owns every live game object.
#[derive(Debug, Default)]
pub struct GameObjectManager {
    objects: Vec<GameObject>,
    pending: Vec<GameObject>,
    commands: CommandQueue,
    ids: ObjectIdAllocator,
    frame: u64,
}

impl GameObjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    // -- ids ----------------------------------------------------------------

    /// Reserve an id for an object about to be constructed.
    pub fn allocate_id(&mut self) -> ObjectId {
        self.ids.allocate()
    }

    /// Give back an id whose object never became live.
    pub fn release_id(&mut self, id: ObjectId) -> bool {
        self.ids.release(id)
    }

    /// Number of ids currently handed out, live or pending.
    pub fn live_id_count(&self) -> usize {
        self.ids.alive_count()
    }

    // -- insertion ----------------------------------------------------------

    /// Queue a fully linked object for insertion.
    ///
    /// # Errors
    ///
    /// - [`ObjectError::NotLinked`] if its link pass has not succeeded.
    /// - [`ObjectError::UnknownObject`] if its id was not allocated by this
    ///   manager or is already stale.
    pub fn add(&mut self, object: GameObject) -> Result<(), ObjectError> {
        if !object.is_linked() {
            return Err(ObjectError::NotLinked {
                object: object.id(),
            });
        }
        if !self.ids.is_alive(object.id()) {
            return Err(ObjectError::UnknownObject {
                object: object.id(),
            });
        }
        self.pending.push(object);
        Ok(())
    }

    /// Make every queued object live. Returns how many were moved.
    pub fn commit_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.objects.append(&mut self.pending);
        count
    }

    // -- frame --------------------------------------------------------------

    /// Run one update pass followed by the command flush.
    pub fn update(&mut self, dt: f32, services: &FrameServices<'_>) -> FrameReport {
        self.commit_pending();

        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        for object in &mut self.objects {
            report.updated += 1;
            if let Err(error) = object.update(dt, services.input, &mut self.commands) {
                warn!(
                    frame = self.frame,
                    object = %object.id(),
                    error = %error,
                    "object update failed"
                );
                report.failures.push(ObjectFailure::of(object, error));
            }
        }

        self.apply_commands(services, &mut report);
        self.frame += 1;
        report
    }

    /// Apply queued commands outside of [`update`](Self::update), e.g. after
    /// the engine queued input-driven state changes.
    pub fn flush(&mut self, services: &FrameServices<'_>) -> FrameReport {
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };
        self.apply_commands(services, &mut report);
        report
    }

    /// Dispatch draw to every live object. Returns the objects that failed.
    pub fn draw(&self, program: &mut dyn ShaderProgram) -> Vec<ObjectFailure> {
        let mut failures = Vec::new();
        for object in &self.objects {
            if let Err(error) = object.draw(program) {
                warn!(object = %object.id(), error = %error, "object draw failed");
                failures.push(ObjectFailure::of(object, error));
            }
        }
        failures
    }

    /// Drop the live objects and every queued command, releasing their ids.
    /// Objects waiting in the pending list are kept. Returns how many
    /// objects were dropped.
    pub fn retire_live(&mut self) -> usize {
        let retired = self.objects.len();
        for object in self.objects.drain(..) {
            self.ids.release(object.id());
        }
        self.commands.clear();
        retired
    }

    /// Drop every object and every queued command.
    pub fn cleanup(&mut self) {
        let dropped = self.objects.len() + self.pending.len();
        self.objects.clear();
        self.pending.clear();
        self.commands.clear();
        self.ids.clear();
        info!(dropped, "object manager cleaned up");
    }

    // -- requests -----------------------------------------------------------

    /// Queue removal of `target` at the next flush.
    pub fn request_destroy(&mut self, target: ObjectId, origin: CommandOrigin) {
        self.commands.destroy(target, origin);
    }

    /// Queue construction of a new object at the next flush.
    pub fn request_spawn(&mut self, descriptor: ObjectDescriptor, origin: CommandOrigin) {
        self.commands.spawn(descriptor, origin);
    }

    /// Queue a state change of `target` at the next flush.
    pub fn request_state_change(&mut self, target: ObjectId, state: &str, origin: CommandOrigin) {
        self.commands.change_state(target, state, origin);
    }

    /// Direct access to the pending command queue.
    pub fn commands_mut(&mut self) -> &mut CommandQueue {
        &mut self.commands
    }

    pub fn pending_commands(&self) -> &[Command] {
        self.commands.commands()
    }

    // -- queries ------------------------------------------------------------

    /// Live objects in insertion (and dispatch) order.
    pub fn objects(&self) -> &[GameObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [GameObject] {
        &mut self.objects
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    /// First live object named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.name() == Some(name))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of completed update passes.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // -- flush --------------------------------------------------------------

    fn apply_commands(&mut self, services: &FrameServices<'_>, report: &mut FrameReport) {
        self.commit_pending();

        let mut commands = self.commands.take();
        let mut applied = ApplyReport {
            conflict_count: detect_conflicts(&commands),
            ..ApplyReport::default()
        };

        for cmd in &mut commands {
            let target = cmd.target.unwrap_or(ObjectId::DETACHED);
            let kind = cmd.kind.clone();
            let result = match &kind {
                CommandKind::Spawn { descriptor } => {
                    self.apply_spawn(services, descriptor).map(|id| {
                        cmd.spawned_object = Some(id);
                        report.spawned.push(id);
                    })
                }
                CommandKind::Destroy => self.apply_destroy(target).map(|()| {
                    report.destroyed.push(target);
                }),
                CommandKind::ChangeState { state } => self.apply_state_change(target, state),
            };

            match result {
                Ok(()) => {
                    cmd.applied_successfully = true;
                    applied.success_count += 1;
                }
                Err(error) => {
                    applied.failed_count += 1;
                    warn!(
                        command_index = cmd.command_index,
                        target = %target,
                        origin = ?cmd.origin,
                        error = %error,
                        "command application failed"
                    );
                }
            }
        }

        report.applied = applied;
        report.commands.extend(commands);
    }

    fn apply_spawn(
        &mut self,
        services: &FrameServices<'_>,
        descriptor: &ObjectDescriptor,
    ) -> Result<ObjectId, ObjectError> {
        let id = self.ids.allocate();
        match services
            .factory
            .build_linked(id, descriptor, services.resources)
        {
            Ok(object) => {
                debug!(object = %id, name = ?object.name(), "object spawned");
                self.objects.push(object);
                Ok(id)
            }
            Err(error) => {
                self.ids.release(id);
                Err(error)
            }
        }
    }

    fn apply_destroy(&mut self, target: ObjectId) -> Result<(), ObjectError> {
        let index = self
            .objects
            .iter()
            .position(|o| o.id() == target)
            .ok_or(ObjectError::UnknownObject { object: target })?;
        let object = self.objects.remove(index);
        self.ids.release(target);
        debug!(object = %target, name = ?object.name(), "object destroyed");
        Ok(())
    }

    fn apply_state_change(&mut self, target: ObjectId, state: &str) -> Result<(), ObjectError> {
        let object = self
            .get_mut(target)
            .ok_or(ObjectError::UnknownObject { object: target })?;
        object.change_state(state).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
