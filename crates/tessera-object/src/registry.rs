//! Component creator registration and tag-based construction.
//!
//! Every component type that can appear in level data must have a
//! [`ComponentCreator`] registered in a [`ComponentFactory`] under its tag.
//! The factory is filled once at startup and only read afterwards; adding a
//! component type means registering another creator, never editing an
//! existing one.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::component::Component;
use crate::ObjectError;

// ---------------------------------------------------------------------------
// ComponentCreator
// ---------------------------------------------------------------------------

/// Builds one concrete component type from its JSON payload.
pub trait ComponentCreator: Send + Sync {
    /// Parse `payload` and allocate the component.
    ///
    /// The returned component is detached; its owner is set when it is added
    /// to a game object.
    fn create(&self, payload: &serde_json::Value) -> Result<Box<dyn Component>, ObjectError>;
}

/// Adapter that lets a plain function or closure act as a creator.
pub struct FnCreator<F>(pub F);

impl<F> ComponentCreator for FnCreator<F>
where
    F: Fn(&serde_json::Value) -> Result<Box<dyn Component>, ObjectError> + Send + Sync,
{
    fn create(&self, payload: &serde_json::Value) -> Result<Box<dyn Component>, ObjectError> {
        (self.0)(payload)
    }
}

// ---------------------------------------------------------------------------
// ComponentFactory
// ---------------------------------------------------------------------------

/// Registry mapping component tags to their creators.
#[derive(Default)]
pub struct ComponentFactory {
    creators: HashMap<String, Box<dyn ComponentCreator>>,
}

impl ComponentFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self {
            creators: HashMap::new(),
        }
    }

    /// Register `creator` under `tag`.
    ///
    /// # Errors
    ///
    /// [`ObjectError::DuplicateCreator`] if `tag` already has a creator; the
    /// existing registration is kept.
    pub fn register<C>(&mut self, tag: &str, creator: C) -> Result<(), ObjectError>
    where
        C: ComponentCreator + 'static,
    {
        if self.creators.contains_key(tag) {
            return Err(ObjectError::DuplicateCreator {
                tag: tag.to_owned(),
            });
        }
        debug!(tag, "component creator registered");
        self.creators.insert(tag.to_owned(), Box::new(creator));
        Ok(())
    }

    /// Register a closure as the creator for `tag`.
    pub fn register_fn<F>(&mut self, tag: &str, create: F) -> Result<(), ObjectError>
    where
        F: Fn(&serde_json::Value) -> Result<Box<dyn Component>, ObjectError>
            + Send
            + Sync
            + 'static,
    {
        self.register(tag, FnCreator(create))
    }

    /// Build a new component of type `tag` from `payload`.
    ///
    /// # Errors
    ///
    /// - [`ObjectError::UnknownComponentType`] if nothing is registered
    ///   under `tag`.
    /// - Whatever the creator reports for a bad payload (normally
    ///   [`ObjectError::MalformedComponentData`]).
    pub fn create(
        &self,
        tag: &str,
        payload: &serde_json::Value,
    ) -> Result<Box<dyn Component>, ObjectError> {
        let creator = self
            .creators
            .get(tag)
            .ok_or_else(|| ObjectError::UnknownComponentType {
                tag: tag.to_owned(),
                registered: self.registered_tags().join(", "),
            })?;

        let component = creator.create(payload)?;
        if component.tag() != tag {
            return Err(ObjectError::MalformedComponentData {
                component: tag.to_owned(),
                field: "type".to_owned(),
                reason: format!("creator produced a '{}' component", component.tag()),
            });
        }
        Ok(component)
    }

    /// Whether a creator is registered under `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.creators.contains_key(tag)
    }

    /// All registered tags, sorted.
    pub fn registered_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.creators.keys().map(|s| s.as_str()).collect();
        tags.sort();
        tags
    }

    /// Number of registered creators.
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("tags", &self.registered_tags())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ObjectId;
    use crate::testing::{basic_factory, Pos};

    #[test]
    fn create_known_tag() {
        let factory = basic_factory();
        let component = factory
            .components()
            .create("POS", &serde_json::json!({ "x": 3.0 }))
            .unwrap();
        assert_eq!(component.tag(), "POS");
        assert_eq!(component.owner(), ObjectId::DETACHED);
        let pos = component.as_any().downcast_ref::<Pos>().unwrap();
        assert_eq!(pos.x, 3.0);
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn unknown_tag_is_reported_with_registered_list() {
        let factory = basic_factory();
        let err = factory
            .components()
            .create("SPRITE", &serde_json::json!({}))
            .unwrap_err();
        match err {
            ObjectError::UnknownComponentType { tag, registered } => {
                assert_eq!(tag, "SPRITE");
                assert_eq!(registered, "MOVER, POS");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut components = ComponentFactory::new();
        let make = |_: &serde_json::Value| -> Result<Box<dyn Component>, ObjectError> {
            Ok(Box::new(Pos {
                owner: ObjectId::DETACHED,
                x: 0.0,
                y: 0.0,
            }))
        };
        components.register_fn("POS", make).unwrap();
        let err = components.register_fn("POS", make).unwrap_err();
        assert_eq!(
            err,
            ObjectError::DuplicateCreator {
                tag: "POS".to_owned()
            }
        );
        assert_eq!(components.len(), 1);
    }

    #[test]
    fn creator_producing_wrong_tag_is_rejected() {
        let mut components = ComponentFactory::new();
        components
            .register_fn("TRANSFORM", |_: &serde_json::Value| {
                Ok(Box::new(Pos {
                    owner: ObjectId::DETACHED,
                    x: 0.0,
                    y: 0.0,
                }) as Box<dyn Component>)
            })
            .unwrap();
        let err = components
            .create("TRANSFORM", &serde_json::Value::Null)
            .unwrap_err();
        assert!(matches!(err, ObjectError::MalformedComponentData { .. }));
    }

    #[test]
    fn malformed_payload_propagates() {
        let factory = basic_factory();
        let err = factory
            .components()
            .create("POS", &serde_json::json!({ "y": 1.0 }))
            .unwrap_err();
        assert!(matches!(
            err,
            ObjectError::MalformedComponentData { ref field, .. } if field == "x"
        ));
    }
}
