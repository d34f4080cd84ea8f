//! Tessera Object -- component-based game object runtime.
//!
//! This crate is the spine of the Tessera engine. Game objects own an ordered
//! set of type-erased components that are built from JSON payloads through a
//! tag-keyed [`ComponentFactory`](registry::ComponentFactory), wired to their
//! siblings in a separate link pass, and driven once per frame by the
//! [`GameObjectManager`](manager::GameObjectManager).
//!
//! # Quick Start
//!
//! ```
//! use tessera_object::prelude::*;
//! use std::any::Any;
//!
//! #[derive(Debug)]
//! struct Counter { owner: ObjectId, ticks: u32 }
//!
//! impl Component for Counter {
//!     fn tag(&self) -> &str { "COUNTER" }
//!     fn owner(&self) -> ObjectId { self.owner }
//!     fn set_owner(&mut self, owner: ObjectId) { self.owner = owner; }
//!     fn update(&mut self, _ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
//!         self.ticks += 1;
//!         Ok(())
//!     }
//!     fn fields(&self) -> serde_json::Value { serde_json::json!({ "ticks": self.ticks }) }
//!     fn as_any(&self) -> &dyn Any { self }
//!     fn as_any_mut(&mut self) -> &mut dyn Any { self }
//! }
//!
//! let mut components = ComponentFactory::new();
//! components
//!     .register_fn("COUNTER", |payload: &serde_json::Value| {
//!         let fields = Fields::new("COUNTER", payload)?;
//!         let ticks = fields.optional("ticks", 0u32)?;
//!         Ok(Box::new(Counter { owner: ObjectId::DETACHED, ticks }) as Box<dyn Component>)
//!     })
//!     .unwrap();
//! let factory = GameObjectFactory::new(components);
//!
//! let level: LevelDescriptor = serde_json::from_value(serde_json::json!({
//!     "objects": [ { "components": [ { "type": "COUNTER", "fields": {} } ] } ]
//! }))
//! .unwrap();
//!
//! let mut manager = GameObjectManager::new();
//! let report = factory
//!     .create_objects(0, &level, &EmptyResources, &mut manager, LoadPolicy::Abort)
//!     .unwrap();
//! assert_eq!(report.loaded.len(), 1);
//!
//! let services = FrameServices { factory: &factory, resources: &EmptyResources, input: &NoInput };
//! manager.update(1.0 / 60.0, &services);
//! let counter: &Counter = manager.objects()[0].component("COUNTER").unwrap();
//! assert_eq!(counter.ticks, 1);
//! ```

#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod factory;
pub mod id;
pub mod manager;
pub mod object;
pub mod payload;
pub mod registry;
pub mod render;
pub mod resource;
pub mod snapshot;
pub mod state;

use crate::id::ObjectId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while building, linking and running game objects.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObjectError {
    /// No creator is registered for the requested component tag.
    #[error("component type '{tag}' not registered. Registered components: [{registered}]")]
    UnknownComponentType {
        tag: String,
        registered: String,
    },

    /// A component payload is missing a required field or has a field of the
    /// wrong shape.
    #[error("malformed data for component '{component}': field '{field}' {reason}")]
    MalformedComponentData {
        component: String,
        field: String,
        reason: String,
    },

    /// A state transition named a state the object never declared.
    #[error("object {object} has no state '{state}'. Declared states: [{declared}]")]
    UnknownState {
        object: ObjectId,
        state: String,
        declared: String,
    },

    /// A component's link step could not find something it depends on.
    #[error("object {object}: component '{component}' could not resolve '{dependency}'")]
    LinkResolutionFailure {
        object: ObjectId,
        component: String,
        dependency: String,
    },

    /// A second component with an already-present tag was added to an object.
    #[error("object {object} already has a component tagged '{tag}'")]
    DuplicateComponent {
        object: ObjectId,
        tag: String,
    },

    /// A creator was registered twice for the same tag.
    #[error("a creator for component type '{tag}' is already registered")]
    DuplicateCreator {
        tag: String,
    },

    /// The object id is stale or was never handed out.
    #[error("object {object} does not exist (stale or never allocated)")]
    UnknownObject {
        object: ObjectId,
    },

    /// An object was handed to the manager before its link pass succeeded.
    #[error("object {object} has not completed its link pass")]
    NotLinked {
        object: ObjectId,
    },

    /// A level description could not be obtained or parsed.
    #[error("failed to load level {level}: {details}")]
    LevelLoad {
        level: u32,
        details: String,
    },

    /// A component reported a failure during update or draw.
    #[error("object {object}: component '{component}' failed: {details}")]
    ComponentRuntime {
        object: ObjectId,
        component: String,
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{Command, CommandKind, CommandOrigin, CommandQueue};
    pub use crate::component::{
        Component, DrawContext, InputQuery, LinkContext, NoInput, Sibling, SiblingView, Siblings,
        UpdateContext,
    };
    pub use crate::factory::{GameObjectFactory, LevelReport, LoadPolicy, SkippedObject};
    pub use crate::id::{ObjectId, ObjectIdAllocator};
    pub use crate::manager::{
        ApplyReport, FrameReport, FrameServices, GameObjectManager, ObjectFailure,
    };
    pub use crate::object::GameObject;
    pub use crate::payload::{ComponentEntry, Fields, LevelDescriptor, ObjectDescriptor};
    pub use crate::registry::{ComponentCreator, ComponentFactory};
    pub use crate::render::{QuadDraw, ShaderProgram};
    pub use crate::resource::{EmptyResources, ResourceProvider, TextureHandle, TextureInfo};
    pub use crate::snapshot::{LevelSnapshot, ObjectSnapshot};
    pub use crate::state::{StateMachine, StateTransition};
    pub use crate::ObjectError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
