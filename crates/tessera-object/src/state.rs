//! Per-object behavioral state machine.
//!
//! A game object declares a fixed set of state names at construction. The
//! machine only tracks which one is current; the exit/enter hooks are
//! dispatched by [`GameObject::change_state`](crate::object::GameObject::change_state)
//! in two steps: [`plan`](StateMachine::plan) validates the target, then
//! [`commit`](StateMachine::commit) moves the current pointer between the
//! exit and enter passes.

use serde::{Deserialize, Serialize};

use crate::id::ObjectId;
use crate::ObjectError;

/// A validated transition that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// State being left, `None` for the very first entry.
    pub from: Option<String>,
    pub to: String,
}

/// Declared states plus the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachine {
    states: Vec<String>,
    initial: Option<String>,
    current: Option<String>,
    transitions: u64,
}

impl StateMachine {
    /// A machine with no declared states.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `states`, with `initial` (or the first declared state) as the
    /// state entered on start.
    ///
    /// # Errors
    ///
    /// [`ObjectError::UnknownState`] if `initial` is not among `states`.
    pub fn with_states(
        object: ObjectId,
        states: &[String],
        initial: Option<&str>,
    ) -> Result<Self, ObjectError> {
        let mut machine = Self::new();
        for state in states {
            machine.declare(state);
        }
        machine.initial = match initial {
            Some(name) if !machine.is_declared(name) => {
                return Err(machine.unknown(object, name));
            }
            Some(name) => Some(name.to_owned()),
            None => machine.states.first().cloned(),
        };
        Ok(machine)
    }

    /// Add a state name. Declaring the same name twice has no effect.
    pub fn declare(&mut self, state: &str) {
        if !self.is_declared(state) {
            self.states.push(state.to_owned());
        }
    }

    pub fn is_declared(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }

    /// Declared states in declaration order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn initial(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    /// Number of committed transitions, the initial entry included.
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    /// Validate a transition to `to` without changing anything.
    ///
    /// Transitioning to the current state is allowed and yields a
    /// self-transition.
    pub fn plan(&self, object: ObjectId, to: &str) -> Result<StateTransition, ObjectError> {
        if !self.is_declared(to) {
            return Err(self.unknown(object, to));
        }
        Ok(StateTransition {
            from: self.current.clone(),
            to: to.to_owned(),
        })
    }

    /// Make `transition.to` the current state.
    pub fn commit(&mut self, transition: &StateTransition) {
        self.current = Some(transition.to.clone());
        self.transitions += 1;
    }

    fn unknown(&self, object: ObjectId, state: &str) -> ObjectError {
        ObjectError::UnknownState {
            object,
            state: state.to_owned(),
            declared: self.states.join(", "),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
