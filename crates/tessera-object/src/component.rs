//! The component capability trait and the contexts it is driven with.
//!
//! A component is a boxed [`Component`] trait object owned by exactly one
//! [`GameObject`](crate::object::GameObject). Every capability (link, update,
//! draw, state hooks) has a default no-op so each component implements only
//! what it needs.
//!
//! Components never hold references to their siblings. During the link pass a
//! component resolves a typed [`Sibling`] handle (a slot index checked against
//! the concrete type) and later dereferences it through the [`Siblings`] or
//! [`SiblingView`] it is handed. While a component runs, its own slot is
//! vacated, so mutable access to a sibling never aliases the caller.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::command::CommandQueue;
use crate::id::ObjectId;
use crate::render::ShaderProgram;
use crate::resource::ResourceProvider;
use crate::ObjectError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A capability unit attached to a game object.
pub trait Component: Any {
    /// The registered type tag, e.g. `"TRANSFORM"`.
    fn tag(&self) -> &str;

    /// The object that owns this component.
    fn owner(&self) -> ObjectId;

    /// Set by [`GameObject::add_component`](crate::object::GameObject::add_component).
    fn set_owner(&mut self, owner: ObjectId);

    /// Resolve cross-component dependencies once every sibling exists.
    fn link(&mut self, _ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        Ok(())
    }

    /// Per-frame logic.
    fn update(&mut self, _ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
        Ok(())
    }

    /// Whether [`draw`](Self::draw) should be dispatched at all.
    fn is_drawable(&self) -> bool {
        false
    }

    /// Push render data into the active program.
    fn draw(
        &self,
        _ctx: &DrawContext<'_>,
        _program: &mut dyn ShaderProgram,
    ) -> Result<(), ObjectError> {
        Ok(())
    }

    /// Called on every component before the owner leaves `state`.
    fn on_state_exit(&mut self, _state: &str) {}

    /// Called on every component after the owner entered `state`.
    fn on_state_enter(&mut self, _state: &str) {}

    /// Current field values in the same shape the creator accepts.
    fn fields(&self) -> serde_json::Value;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("tag", &self.tag())
            .field("owner", &self.owner())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentSlot
// ---------------------------------------------------------------------------

/// One entry of an object's ordered component list.
///
/// `component` is `None` only while that component is itself executing.
pub(crate) struct ComponentSlot {
    pub(crate) tag: String,
    pub(crate) component: Option<Box<dyn Component>>,
}

fn find_slot(slots: &[ComponentSlot], tag: &str) -> Option<usize> {
    slots.iter().position(|s| s.tag == tag)
}

// ---------------------------------------------------------------------------
// Sibling handles
// ---------------------------------------------------------------------------

/// Typed, non-owning reference to a sibling component, valid for the
/// lifetime of the owning object.
pub struct Sibling<T> {
    slot: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Sibling<T> {
    /// Index of the sibling in its owner's dispatch order.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl<T> Clone for Sibling<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Sibling<T> {}

impl<T> PartialEq for Sibling<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<T> fmt::Debug for Sibling<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sibling<{}>({})", std::any::type_name::<T>(), self.slot)
    }
}

/// Read-only view of an object's components.
#[derive(Clone, Copy)]
pub struct SiblingView<'a> {
    slots: &'a [ComponentSlot],
}

impl<'a> SiblingView<'a> {
    pub(crate) fn new(slots: &'a [ComponentSlot]) -> Self {
        Self { slots }
    }

    /// Resolve a typed handle to the sibling tagged `tag`.
    ///
    /// Returns `None` if no such sibling exists or it is not a `T`.
    pub fn resolve<T: Component>(&self, tag: &str) -> Option<Sibling<T>> {
        let slot = find_slot(self.slots, tag)?;
        let component = self.slots[slot].component.as_deref()?;
        component.as_any().is::<T>().then_some(Sibling {
            slot,
            _marker: PhantomData,
        })
    }

    /// Dereference a handle.
    pub fn get<T: Component>(&self, handle: Sibling<T>) -> Option<&'a T> {
        self.slots
            .get(handle.slot)?
            .component
            .as_deref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Capability lookup by tag.
    pub fn by_tag(&self, tag: &str) -> Option<&'a dyn Component> {
        let slot = find_slot(self.slots, tag)?;
        self.slots[slot].component.as_deref()
    }

    /// Whether a sibling tagged `tag` exists.
    pub fn contains(&self, tag: &str) -> bool {
        find_slot(self.slots, tag).is_some()
    }
}

/// Mutable view of an object's components, excluding the running one.
pub struct Siblings<'a> {
    slots: &'a mut [ComponentSlot],
}

impl<'a> Siblings<'a> {
    pub(crate) fn new(slots: &'a mut [ComponentSlot]) -> Self {
        Self { slots }
    }

    /// Read-only view over the same slots.
    pub fn view(&self) -> SiblingView<'_> {
        SiblingView::new(self.slots)
    }

    /// Dereference a handle.
    pub fn get<T: Component>(&self, handle: Sibling<T>) -> Option<&T> {
        self.view().get(handle)
    }

    /// Dereference a handle mutably.
    pub fn get_mut<T: Component>(&mut self, handle: Sibling<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.slot)?
            .component
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Read-only input queries available to components during update.
pub trait InputQuery {
    /// Whether any key bound to `action` is held this frame.
    fn is_action_active(&self, action: &str) -> bool;

    /// Whether the named key is held this frame.
    fn is_key_down(&self, key: &str) -> bool;
}

/// Input source with nothing pressed. Used headless and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl InputQuery for NoInput {
    fn is_action_active(&self, _action: &str) -> bool {
        false
    }

    fn is_key_down(&self, _key: &str) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Everything a component can see while linking.
pub struct LinkContext<'a> {
    /// The owning object.
    pub object: ObjectId,
    /// The owner's other components.
    pub siblings: SiblingView<'a>,
    /// Texture and script lookup.
    pub resources: &'a dyn ResourceProvider,
}

impl LinkContext<'_> {
    /// Resolve a mandatory sibling, or fail with
    /// [`ObjectError::LinkResolutionFailure`].
    pub fn require<T: Component>(
        &self,
        component: &str,
        dependency: &str,
    ) -> Result<Sibling<T>, ObjectError> {
        self.siblings
            .resolve::<T>(dependency)
            .ok_or_else(|| self.missing(component, dependency))
    }

    /// Build the link failure for a missing dependency.
    pub fn missing(&self, component: &str, dependency: &str) -> ObjectError {
        ObjectError::LinkResolutionFailure {
            object: self.object,
            component: component.to_owned(),
            dependency: dependency.to_owned(),
        }
    }
}

/// Everything a component can see and do while updating.
pub struct UpdateContext<'a> {
    /// The owning object.
    pub object: ObjectId,
    /// Seconds since the previous frame.
    pub dt: f32,
    /// The owner's current behavioral state, if it declares any.
    pub state: Option<&'a str>,
    /// The owner's other components.
    pub siblings: Siblings<'a>,
    /// Input for this frame.
    pub input: &'a dyn InputQuery,
    /// Deferred spawn/destroy/state requests, applied after the update pass.
    pub commands: &'a mut CommandQueue,
}

impl UpdateContext<'_> {
    /// Build a runtime failure attributed to `component` on this object.
    pub fn runtime_error(&self, component: &str, details: &str) -> ObjectError {
        ObjectError::ComponentRuntime {
            object: self.object,
            component: component.to_owned(),
            details: details.to_owned(),
        }
    }
}

/// Everything a component can see while drawing.
pub struct DrawContext<'a> {
    /// The owning object.
    pub object: ObjectId,
    /// All of the owner's components, including the one drawing.
    pub siblings: SiblingView<'a>,
}

impl DrawContext<'_> {
    /// Build a runtime failure attributed to `component` on this object.
    pub fn runtime_error(&self, component: &str, details: &str) -> ObjectError {
        ObjectError::ComponentRuntime {
            object: self.object,
            component: component.to_owned(),
            details: details.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
