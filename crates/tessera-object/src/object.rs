//! The game object: an ordered set of components plus a state machine.
//!
//! Components are stored in construction order, one per tag, and every
//! dispatch (link, update, draw, state hooks) walks them in that order. While
//! a component's `link` or `update` runs it is taken out of its slot, so it
//! can borrow any sibling mutably through [`Siblings`] without aliasing
//! itself.

use tracing::trace;

use crate::command::CommandQueue;
use crate::component::{
    Component, ComponentSlot, DrawContext, InputQuery, LinkContext, SiblingView, Siblings,
    UpdateContext,
};
use crate::id::ObjectId;
use crate::payload::{ComponentEntry, ObjectDescriptor};
use crate::render::ShaderProgram;
use crate::resource::ResourceProvider;
use crate::state::{StateMachine, StateTransition};
use crate::ObjectError;

/// A live (or about to be live) entity in the world.
pub struct GameObject {
    id: ObjectId,
    name: Option<String>,
    slots: Vec<ComponentSlot>,
    state: StateMachine,
    linked: bool,
}

impl GameObject {
    /// An empty object with the given id, optional name and states.
    pub fn new(id: ObjectId, name: Option<String>, state: StateMachine) -> Self {
        Self {
            id,
            name,
            slots: Vec::new(),
            state,
            linked: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether [`link`](Self::link) has completed since the last component
    /// was added.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.state
    }

    pub fn current_state(&self) -> Option<&str> {
        self.state.current()
    }

    /// Number of attached components.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // -- components ---------------------------------------------------------

    /// Attach `component` and make this object its owner.
    ///
    /// Adding invalidates a previous link pass.
    ///
    /// # Errors
    ///
    /// [`ObjectError::DuplicateComponent`] if a component with the same tag
    /// is already attached; the existing one is kept.
    pub fn add_component(&mut self, mut component: Box<dyn Component>) -> Result<(), ObjectError> {
        let tag = component.tag().to_owned();
        if self.slots.iter().any(|s| s.tag == tag) {
            return Err(ObjectError::DuplicateComponent {
                object: self.id,
                tag,
            });
        }
        component.set_owner(self.id);
        self.slots.push(ComponentSlot {
            tag,
            component: Some(component),
        });
        self.linked = false;
        Ok(())
    }

    /// Capability lookup by tag.
    pub fn has_component(&self, tag: &str) -> Option<&dyn Component> {
        SiblingView::new(&self.slots).by_tag(tag)
    }

    /// Typed lookup by tag. `None` if absent or of another type.
    pub fn component<T: Component>(&self, tag: &str) -> Option<&T> {
        self.has_component(tag)?.as_any().downcast_ref::<T>()
    }

    /// Mutable typed lookup by tag.
    pub fn component_mut<T: Component>(&mut self, tag: &str) -> Option<&mut T> {
        self.slots
            .iter_mut()
            .find(|s| s.tag == tag)?
            .component
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Tags in dispatch order.
    pub fn component_tags(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.tag.as_str()).collect()
    }

    // -- lifecycle ----------------------------------------------------------

    /// Run every component's link step in construction order.
    ///
    /// Stops at the first failure and leaves the object unlinked.
    pub fn link(&mut self, resources: &dyn ResourceProvider) -> Result<(), ObjectError> {
        self.linked = false;
        for i in 0..self.slots.len() {
            let Some(mut component) = self.slots[i].component.take() else {
                continue;
            };
            let result = {
                let mut ctx = LinkContext {
                    object: self.id,
                    siblings: SiblingView::new(&self.slots),
                    resources,
                };
                component.link(&mut ctx)
            };
            self.slots[i].component = Some(component);
            result?;
        }
        self.linked = true;
        trace!(object = %self.id, components = self.slots.len(), "object linked");
        Ok(())
    }

    /// Enter the initial state, if the object declares any.
    ///
    /// Only `on_state_enter` runs, since there is no previous state.
    pub fn start(&mut self) -> Result<Option<StateTransition>, ObjectError> {
        match self.state.initial().map(str::to_owned) {
            Some(initial) => self.change_state(&initial).map(Some),
            None => Ok(None),
        }
    }

    /// Dispatch update to every component in construction order.
    ///
    /// Stops at the first component error; components after it are not
    /// updated this frame.
    pub fn update(
        &mut self,
        dt: f32,
        input: &dyn InputQuery,
        commands: &mut CommandQueue,
    ) -> Result<(), ObjectError> {
        for i in 0..self.slots.len() {
            let Some(mut component) = self.slots[i].component.take() else {
                continue;
            };
            let result = {
                let mut ctx = UpdateContext {
                    object: self.id,
                    dt,
                    state: self.state.current(),
                    siblings: Siblings::new(&mut self.slots),
                    input,
                    commands: &mut *commands,
                };
                component.update(&mut ctx)
            };
            self.slots[i].component = Some(component);
            result?;
        }
        Ok(())
    }

    /// Dispatch draw to every drawable component in construction order.
    pub fn draw(&self, program: &mut dyn ShaderProgram) -> Result<(), ObjectError> {
        let ctx = DrawContext {
            object: self.id,
            siblings: SiblingView::new(&self.slots),
        };
        for slot in &self.slots {
            if let Some(component) = slot.component.as_deref() {
                if component.is_drawable() {
                    component.draw(&ctx, program)?;
                }
            }
        }
        Ok(())
    }

    /// Move to `state`, running every component's exit hook for the old
    /// state and then every enter hook for the new one.
    ///
    /// # Errors
    ///
    /// [`ObjectError::UnknownState`] if `state` was never declared. No hook
    /// runs and the current state is unchanged.
    pub fn change_state(&mut self, state: &str) -> Result<StateTransition, ObjectError> {
        let transition = self.state.plan(self.id, state)?;

        if let Some(from) = transition.from.as_deref() {
            for component in self.slots.iter_mut().filter_map(|s| s.component.as_deref_mut()) {
                component.on_state_exit(from);
            }
        }
        self.state.commit(&transition);
        for component in self.slots.iter_mut().filter_map(|s| s.component.as_deref_mut()) {
            component.on_state_enter(&transition.to);
        }

        trace!(
            object = %self.id,
            from = ?transition.from,
            to = %transition.to,
            "state changed"
        );
        Ok(transition)
    }

    /// Describe this object in level format, with current component fields.
    pub fn to_descriptor(&self) -> ObjectDescriptor {
        let components = self
            .slots
            .iter()
            .filter_map(|s| {
                s.component
                    .as_deref()
                    .map(|c| ComponentEntry::new(&s.tag, c.fields()))
            })
            .collect();
        let states = self.state.states().to_vec();
        ObjectDescriptor {
            name: self.name.clone(),
            initial_state: self.state.initial().map(str::to_owned),
            states,
            components,
        }
    }
}

impl std::fmt::Debug for GameObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("components", &self.component_tags())
            .field("state", &self.state.current())
            .field("linked", &self.linked)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
