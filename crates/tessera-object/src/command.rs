//! Deferred mutations of the live object list.
//!
//! Nothing may add, remove or re-state a live object while the manager is
//! iterating it. Components, scripts and game rules instead queue a
//! [`Command`] in the [`CommandQueue`]; the
//! [`GameObjectManager`](crate::manager::GameObjectManager) applies the whole
//! queue in FIFO order at a single flush point after the update pass.
//!
//! # Example
//!
//! ```
//! use tessera_object::command::{CommandKind, CommandOrigin, CommandQueue};
//! use tessera_object::id::ObjectId;
//!
//! let mut queue = CommandQueue::new();
//! let target = ObjectId::new(4, 0);
//! queue.change_state(target, "WALK", CommandOrigin::Input("X".to_owned()));
//! queue.destroy(target, CommandOrigin::GameRule("fell_off_map".to_owned()));
//!
//! assert_eq!(queue.len(), 2);
//! assert!(matches!(queue.commands()[1].kind, CommandKind::Destroy));
//! assert_eq!(queue.commands()[1].command_index, 1);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::id::ObjectId;
use crate::payload::ObjectDescriptor;

// ---------------------------------------------------------------------------
// CommandOrigin
// ---------------------------------------------------------------------------

/// Who asked for a command. Carried into log lines when it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOrigin {
    /// A component running its update.
    Component {
        object: ObjectId,
        component: String,
    },
    /// A behavior script bound to `object`.
    Script { object: ObjectId },
    /// A key or action binding (e.g. `"X"`).
    Input(String),
    /// An engine-level game rule, e.g. `"hurtbox_depleted"`.
    GameRule(String),
    /// Engine bookkeeping with no finer attribution.
    Engine,
}

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// What mutation to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Construct, link and insert a new object.
    Spawn { descriptor: ObjectDescriptor },
    /// Remove the target and drop its components.
    Destroy,
    /// Move the target into `state`.
    ChangeState { state: String },
}

impl CommandKind {
    fn label(&self) -> &'static str {
        match self {
            CommandKind::Spawn { .. } => "spawn",
            CommandKind::Destroy => "destroy",
            CommandKind::ChangeState { .. } => "change_state",
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single deferred mutation.
///
/// `target` is `None` for spawns; once applied, `spawned_object` holds the id
/// the new object received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub target: Option<ObjectId>,
    pub kind: CommandKind,
    pub origin: CommandOrigin,
    /// Position within the queue, assigned on insertion.
    pub command_index: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spawned_object: Option<ObjectId>,
    /// Set by the manager when the command took effect.
    #[serde(default)]
    pub applied_successfully: bool,
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// FIFO queue of deferred mutations.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
    next_index: u32,
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue construction of a new object from `descriptor`.
    pub fn spawn(&mut self, descriptor: ObjectDescriptor, origin: CommandOrigin) {
        self.push(None, CommandKind::Spawn { descriptor }, origin);
    }

    /// Queue removal of `target`.
    pub fn destroy(&mut self, target: ObjectId, origin: CommandOrigin) {
        self.push(Some(target), CommandKind::Destroy, origin);
    }

    /// Queue a state transition of `target`.
    pub fn change_state(&mut self, target: ObjectId, state: &str, origin: CommandOrigin) {
        self.push(
            Some(target),
            CommandKind::ChangeState {
                state: state.to_owned(),
            },
            origin,
        );
    }

    /// Queued commands in insertion order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drain the queue, returning its commands in insertion order.
    pub fn take(&mut self) -> Vec<Command> {
        self.next_index = 0;
        std::mem::take(&mut self.commands)
    }

    /// Push a pre-built command, e.g. one produced by a behavior script.
    ///
    /// The command index is reassigned to keep ordering within this queue.
    pub fn push_raw(&mut self, mut cmd: Command) {
        cmd.command_index = self.next_index;
        self.next_index += 1;
        self.commands.push(cmd);
    }

    /// Drop every queued command without applying it.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }

    fn push(&mut self, target: Option<ObjectId>, kind: CommandKind, origin: CommandOrigin) {
        let index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command {
            target,
            kind,
            origin,
            command_index: index,
            spawned_object: None,
            applied_successfully: false,
        });
    }
}

/// Count objects targeted by more than one command of the same kind.
///
/// Conflicts are not errors: commands still apply in FIFO order, so the last
/// state change wins and a second destroy simply fails as stale.
pub(crate) fn detect_conflicts(commands: &[Command]) -> usize {
    let mut seen: HashMap<(ObjectId, &'static str), Vec<u32>> = HashMap::new();
    for cmd in commands {
        if let Some(target) = cmd.target {
            seen.entry((target, cmd.kind.label()))
                .or_default()
                .push(cmd.command_index);
        }
    }

    let mut conflicts = 0;
    for ((object, kind), indices) in &seen {
        if indices.len() > 1 {
            conflicts += 1;
            warn!(
                object = %object,
                kind,
                command_indices = ?indices,
                "conflict: {} {kind} commands target the same object this frame",
                indices.len()
            );
        }
    }
    conflicts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
