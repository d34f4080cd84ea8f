//! Building game objects and whole levels from descriptors.
//!
//! Level construction is two-phase. Every object of the level is constructed
//! first, then the link pass runs once over all of them, then each linked
//! object enters its initial state. Only after that are objects handed to the
//! [`GameObjectManager`], so nothing partially linked ever becomes live.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::id::ObjectId;
use crate::manager::GameObjectManager;
use crate::object::GameObject;
use crate::payload::{LevelDescriptor, ObjectDescriptor};
use crate::registry::ComponentFactory;
use crate::resource::ResourceProvider;
use crate::state::StateMachine;
use crate::ObjectError;

// ---------------------------------------------------------------------------
// LoadPolicy
// ---------------------------------------------------------------------------

/// What a level load does when one object fails to build or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Drop the failing object, log a warning and keep loading.
    #[default]
    SkipObject,
    /// Return the first error and insert nothing.
    Abort,
}

// ---------------------------------------------------------------------------
// LevelReport
// ---------------------------------------------------------------------------

/// An object left out of a level load.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedObject {
    /// Position of the object in the level's object list.
    pub index: usize,
    pub name: Option<String>,
    pub error: ObjectError,
}

/// Outcome of a level load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelReport {
    pub level: u32,
    /// Ids of the objects that became live, in level order.
    pub loaded: Vec<ObjectId>,
    pub skipped: Vec<SkippedObject>,
}

impl LevelReport {
    fn skip(&mut self, index: usize, desc: &ObjectDescriptor, error: ObjectError) {
        warn!(
            level = self.level,
            index,
            object = %desc.label(index),
            error = %error,
            "skipping object that failed to load"
        );
        self.skipped.push(SkippedObject {
            index,
            name: desc.name.clone(),
            error,
        });
    }
}

// ---------------------------------------------------------------------------
// GameObjectFactory
// ---------------------------------------------------------------------------

/// Builds objects through a [`ComponentFactory`].
#[derive(Debug)]
pub struct GameObjectFactory {
    components: ComponentFactory,
}

impl GameObjectFactory {
    pub fn new(components: ComponentFactory) -> Self {
        Self { components }
    }

    /// The component registry backing this factory.
    pub fn components(&self) -> &ComponentFactory {
        &self.components
    }

    /// Construct an unlinked object: declare its states and build each
    /// component in payload order.
    pub fn create_game_object(
        &self,
        id: ObjectId,
        desc: &ObjectDescriptor,
    ) -> Result<GameObject, ObjectError> {
        let state = StateMachine::with_states(id, &desc.states, desc.initial_state.as_deref())?;
        let mut object = GameObject::new(id, desc.name.clone(), state);
        for entry in &desc.components {
            let component = self.components.create(&entry.type_tag, &entry.fields)?;
            object.add_component(component)?;
        }
        Ok(object)
    }

    /// Run the link pass of a single object.
    pub fn link_object(
        &self,
        object: &mut GameObject,
        resources: &dyn ResourceProvider,
    ) -> Result<(), ObjectError> {
        object.link(resources)
    }

    /// Construct, link and start one object. Used for runtime spawns.
    pub fn build_linked(
        &self,
        id: ObjectId,
        desc: &ObjectDescriptor,
        resources: &dyn ResourceProvider,
    ) -> Result<GameObject, ObjectError> {
        let mut object = self.create_game_object(id, desc)?;
        self.link_object(&mut object, resources)?;
        object.start()?;
        Ok(object)
    }

    /// Fetch level `level_id` from `resources` and load it into `manager`.
    pub fn create_level(
        &self,
        level_id: u32,
        resources: &dyn ResourceProvider,
        manager: &mut GameObjectManager,
        policy: LoadPolicy,
    ) -> Result<LevelReport, ObjectError> {
        let level = resources.level(level_id)?;
        self.create_objects(level_id, &level, resources, manager, policy)
    }

    /// Load an already parsed level into `manager`.
    ///
    /// With [`LoadPolicy::Abort`] the first failure is returned, every id
    /// allocated so far is released and the manager is left untouched.
    pub fn create_objects(
        &self,
        level_id: u32,
        level: &LevelDescriptor,
        resources: &dyn ResourceProvider,
        manager: &mut GameObjectManager,
        policy: LoadPolicy,
    ) -> Result<LevelReport, ObjectError> {
        let mut report = LevelReport {
            level: level_id,
            ..LevelReport::default()
        };

        // -- Phase 1: construct ---------------------------------------------
        let mut built: Vec<(usize, GameObject)> = Vec::with_capacity(level.objects.len());
        for (index, desc) in level.objects.iter().enumerate() {
            let id = manager.allocate_id();
            match self.create_game_object(id, desc) {
                Ok(object) => built.push((index, object)),
                Err(error) => {
                    manager.release_id(id);
                    if policy == LoadPolicy::Abort {
                        release_all(manager, &built);
                        return Err(error);
                    }
                    report.skip(index, desc, error);
                }
            }
        }

        // -- Phase 2: link --------------------------------------------------
        let mut linked: Vec<(usize, GameObject)> = Vec::with_capacity(built.len());
        let mut remaining = built.into_iter();
        while let Some((index, mut object)) = remaining.next() {
            match self.link_object(&mut object, resources) {
                Ok(()) => linked.push((index, object)),
                Err(error) => {
                    manager.release_id(object.id());
                    if policy == LoadPolicy::Abort {
                        release_all(manager, &remaining.by_ref().collect::<Vec<_>>());
                        release_all(manager, &linked);
                        return Err(error);
                    }
                    report.skip(index, &level.objects[index], error);
                }
            }
        }

        // -- Phase 3: enter initial states ----------------------------------
        let mut started: Vec<GameObject> = Vec::with_capacity(linked.len());
        let mut remaining = linked.into_iter();
        while let Some((index, mut object)) = remaining.next() {
            match object.start() {
                Ok(_) => started.push(object),
                Err(error) => {
                    manager.release_id(object.id());
                    if policy == LoadPolicy::Abort {
                        release_all(manager, &remaining.by_ref().collect::<Vec<_>>());
                        for object in &started {
                            manager.release_id(object.id());
                        }
                        return Err(error);
                    }
                    report.skip(index, &level.objects[index], error);
                }
            }
        }

        // -- Phase 4: hand over ---------------------------------------------
        for object in started {
            let id = object.id();
            manager.add(object)?;
            report.loaded.push(id);
        }
        manager.commit_pending();

        info!(
            level = level_id,
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "level loaded"
        );
        Ok(report)
    }
}

/// Release the ids of objects that will never become live.
fn release_all(manager: &mut GameObjectManager, objects: &[(usize, GameObject)]) {
    for (_, object) in objects {
        manager.release_id(object.id());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ComponentEntry;
    use crate::resource::{EmptyResources, TextureInfo};
    use crate::testing::*;

    fn level(value: serde_json::Value) -> LevelDescriptor {
        serde_json::from_value(value).unwrap()
    }

    struct OneLevel(LevelDescriptor);

    impl ResourceProvider for OneLevel {
        fn level(&self, id: u32) -> Result<LevelDescriptor, ObjectError> {
            if id == 1 {
                Ok(self.0.clone())
            } else {
                EmptyResources.level(id)
            }
        }
        fn texture(&self, _name: &str) -> Option<TextureInfo> {
            None
        }
        fn script(&self, _name: &str) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn create_game_object_preserves_payload_order() {
        let factory = basic_factory();
        let desc = ObjectDescriptor::with_components(vec![
            ComponentEntry::new("MOVER", serde_json::json!({})),
            ComponentEntry::new("POS", serde_json::json!({ "x": 1.0 })),
        ]);
        let object = factory.create_game_object(ObjectId::new(0, 0), &desc).unwrap();
        assert_eq!(object.component_tags(), vec!["MOVER", "POS"]);
        assert!(!object.is_linked());
    }

    #[test]
    fn link_sees_siblings_declared_later() {
        // MOVER precedes POS, so linking must wait for all components.
        let factory = basic_factory();
        let desc = ObjectDescriptor::with_components(vec![
            ComponentEntry::new("MOVER", serde_json::json!({})),
            ComponentEntry::new("POS", serde_json::json!({ "x": 1.0 })),
        ]);
        let object = factory
            .build_linked(ObjectId::new(0, 0), &desc, &EmptyResources)
            .unwrap();
        assert!(object.is_linked());
    }

    #[test]
    fn duplicate_tag_in_payload_is_rejected() {
        let factory = basic_factory();
        let desc = ObjectDescriptor::with_components(vec![
            ComponentEntry::new("POS", serde_json::json!({ "x": 1.0 })),
            ComponentEntry::new("POS", serde_json::json!({ "x": 2.0 })),
        ]);
        let err = factory
            .create_game_object(ObjectId::new(0, 0), &desc)
            .unwrap_err();
        assert!(matches!(err, ObjectError::DuplicateComponent { .. }));
    }

    #[test]
    fn objects_enter_initial_state_when_loaded() {
        let factory = basic_factory();
        let mut manager = GameObjectManager::new();
        let lvl = level(serde_json::json!({ "objects": [
            { "states": ["IDLE", "WALK"], "initial_state": "WALK",
              "components": [ { "type": "POS", "fields": { "x": 0.0 } } ] }
        ]}));
        factory
            .create_objects(0, &lvl, &EmptyResources, &mut manager, LoadPolicy::Abort)
            .unwrap();
        assert_eq!(manager.objects()[0].current_state(), Some("WALK"));
    }

    #[test]
    fn skip_policy_keeps_good_objects() {
        let factory = basic_factory();
        let mut manager = GameObjectManager::new();
        let lvl = level(serde_json::json!({ "objects": [
            { "name": "ok", "components": [ { "type": "POS", "fields": { "x": 0.0 } } ] },
            { "name": "bad-tag", "components": [ { "type": "SPRITE" } ] },
            { "name": "bad-field", "components": [ { "type": "POS", "fields": { "x": "left" } } ] },
            { "name": "ok2", "components": [ { "type": "POS", "fields": { "x": 1.0 } } ] }
        ]}));
        let report = factory
            .create_objects(2, &lvl, &EmptyResources, &mut manager, LoadPolicy::SkipObject)
            .unwrap();

        assert_eq!(report.level, 2);
        assert_eq!(report.loaded.len(), 2);
        let skipped: Vec<usize> = report.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, vec![1, 2]);
        assert!(matches!(
            report.skipped[0].error,
            ObjectError::UnknownComponentType { .. }
        ));
        assert!(matches!(
            report.skipped[1].error,
            ObjectError::MalformedComponentData { ref field, .. } if field == "x"
        ));
        assert_eq!(manager.len(), 2);
        assert!(manager.contains(report.loaded[1]));
    }

    #[test]
    fn abort_policy_inserts_nothing() {
        let factory = basic_factory();
        let mut manager = GameObjectManager::new();
        let lvl = level(serde_json::json!({ "objects": [
            { "components": [ { "type": "POS", "fields": { "x": 0.0 } } ] },
            { "components": [ { "type": "MOVER" } ] }
        ]}));
        let err = factory
            .create_objects(0, &lvl, &EmptyResources, &mut manager, LoadPolicy::Abort)
            .unwrap_err();
        assert!(matches!(err, ObjectError::LinkResolutionFailure { .. }));
        assert!(manager.is_empty());
        assert_eq!(manager.live_id_count(), 0, "ids released");
    }

    #[test]
    fn create_level_fetches_from_provider() {
        let factory = basic_factory();
        let mut manager = GameObjectManager::new();
        let provider = OneLevel(level(serde_json::json!({ "objects": [
            { "components": [ { "type": "POS", "fields": { "x": 0.0 } } ] }
        ]})));
        let report = factory
            .create_level(1, &provider, &mut manager, LoadPolicy::default())
            .unwrap();
        assert_eq!(report.loaded.len(), 1);

        let err = factory
            .create_level(9, &provider, &mut manager, LoadPolicy::default())
            .unwrap_err();
        assert!(matches!(err, ObjectError::LevelLoad { level: 9, .. }));
    }

    #[test]
    fn policy_parses_snake_case() {
        let policy: LoadPolicy = serde_json::from_str("\"skip_object\"").unwrap();
        assert_eq!(policy, LoadPolicy::SkipObject);
        let policy: LoadPolicy = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(policy, LoadPolicy::Abort);
    }
}
