//! End-to-end frames: input, scripts, collisions and deferred commands
//! driven through the engine loop.

use std::any::Any;

use tessera_components::prelude::*;
use tessera_engine::prelude::*;
use tessera_object::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn headless() -> EngineConfig {
    EngineConfig {
        headless: true,
        ..EngineConfig::default()
    }
}

fn key_down(key: &str) -> InputEvent {
    InputEvent::KeyDown(key.to_owned())
}

fn key_up(key: &str) -> InputEvent {
    InputEvent::KeyUp(key.to_owned())
}

fn engine_with(
    level: serde_json::Value,
    resources: ResourceManager,
    input: ScriptedInput,
) -> Engine {
    let mut resources = resources;
    resources.insert_level(0, serde_json::from_value(level).unwrap());
    let mut engine = Engine::builder(headless())
        .resources(resources)
        .platform(input)
        .build()
        .unwrap();
    engine.load_start_level().unwrap();
    engine
}

fn hero_level() -> serde_json::Value {
    serde_json::json!({ "objects": [
        { "name": "hero", "states": ["IDLE", "WALK"], "initial_state": "IDLE", "components": [
            { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
            { "type": "CONTROLLER" },
            { "type": "MOVEMENT" }
        ]},
        { "name": "crate", "states": ["IDLE", "WALK"], "initial_state": "IDLE", "components": [
            { "type": "TRANSFORM", "fields": { "position": [50.0, 0.0] } }
        ]}
    ]})
}

fn hero_x(engine: &Engine) -> f32 {
    engine
        .objects()
        .find_by_name("hero")
        .unwrap()
        .component::<Transform>(tags::TRANSFORM)
        .unwrap()
        .position[0]
}

fn state_of<'a>(engine: &'a Engine, name: &str) -> Option<&'a str> {
    engine.objects().find_by_name(name).unwrap().current_state()
}

// -- 1. Input -----------------------------------------------------------------

#[test]
fn components_see_input_from_the_previous_frame() {
    let input =
        ScriptedInput::new([vec![key_down("RIGHT")], vec![], vec![key_up("RIGHT")], vec![]]);
    let mut engine = engine_with(hero_level(), ResourceManager::in_memory(), input);

    engine.step().unwrap();
    assert_eq!(hero_x(&engine), 0.0);

    engine.step().unwrap();
    let moved = hero_x(&engine);
    assert!((moved - 2.0).abs() < 1e-4, "120 units/s for 1/60 s, got {moved}");

    engine.step().unwrap();
    engine.step().unwrap();
    let stopped = hero_x(&engine);
    engine.step().unwrap();
    assert_eq!(hero_x(&engine), stopped);
}

#[test]
fn state_bindings_apply_in_the_same_frame() {
    let input = ScriptedInput::new([vec![key_down("X")], vec![], vec![key_up("X"), key_down("Z")]]);
    let mut engine = engine_with(hero_level(), ResourceManager::in_memory(), input);
    assert_eq!(state_of(&engine, "hero"), Some("IDLE"));

    let first = engine.step().unwrap();
    assert_eq!(first.state_changes, 1, "only CONTROLLER objects are bound");
    assert_eq!(state_of(&engine, "hero"), Some("WALK"));
    assert_eq!(state_of(&engine, "crate"), Some("IDLE"));
    assert_eq!(
        first.flush.commands[0].origin,
        CommandOrigin::Input("walk".to_owned())
    );

    let held = engine.step().unwrap();
    assert_eq!(held.state_changes, 0, "a held key is not a new press");

    engine.step().unwrap();
    assert_eq!(state_of(&engine, "hero"), Some("IDLE"));
}

#[test]
fn quit_event_ends_run_and_tears_down() {
    let input = ScriptedInput::new([vec![], vec![], vec![InputEvent::Quit]]);
    let mut engine = engine_with(hero_level(), ResourceManager::in_memory(), input);
    assert_eq!(engine.run().unwrap(), 3);
    assert!(engine.is_shut_down());
    assert!(engine.objects().is_empty());
}

// -- 2. Scripts ---------------------------------------------------------------

/// Asks for WALK while "right" is active and destroys itself on frame 3.
const GUARD: &str = r#"(module
    (import "tessera" "is_action_active" (func $active (param i32 i32) (result i32)))
    (import "tessera" "change_state" (func $state (param i32 i32)))
    (import "tessera" "destroy_self" (func $destroy))
    (import "tessera" "frame" (func $frame (result i64)))
    (memory (export "memory") 1)
    (data (i32.const 0) "right")
    (data (i32.const 8) "WALK")
    (func (export "tick")
        (if (call $active (i32.const 0) (i32.const 5))
            (then (call $state (i32.const 8) (i32.const 4))))
        (if (i64.ge_u (call $frame) (i64.const 3))
            (then (call $destroy)))))"#;

fn guard_level() -> serde_json::Value {
    serde_json::json!({ "objects": [
        { "name": "guard", "states": ["IDLE", "WALK"], "initial_state": "IDLE", "components": [
            { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
            { "type": "BEHAVIOR", "fields": { "script": "guard" } }
        ]}
    ]})
}

#[test]
fn script_requests_are_applied_at_the_frame_flush() {
    let mut resources = ResourceManager::in_memory();
    resources.insert_script("guard", GUARD);
    let input = ScriptedInput::new([vec![key_down("RIGHT")]]);
    let mut engine = engine_with(guard_level(), resources, input);

    let first = engine.step().unwrap();
    assert_eq!(first.script_requests, 0);
    assert_eq!(state_of(&engine, "guard"), Some("IDLE"));

    let second = engine.step().unwrap();
    assert_eq!(second.script_requests, 1);
    assert_eq!(state_of(&engine, "guard"), Some("WALK"));

    engine.step().unwrap();
    let guard = engine.objects().find_by_name("guard").unwrap().id();
    let fourth = engine.step().unwrap();
    assert_eq!(fourth.flush.destroyed, vec![guard]);
    assert!(engine.objects().is_empty());

    let after = engine.step().unwrap();
    assert_eq!(after.script_requests, 0, "the destroyed object's script is gone");
}

#[test]
fn objects_whose_script_is_missing_are_skipped() {
    let mut engine = Engine::builder(headless()).build().unwrap();
    engine
        .context_mut()
        .resources
        .insert_level(0, serde_json::from_value(guard_level()).unwrap());
    let report = engine.load_level(0).unwrap();
    assert!(report.loaded.is_empty());
    assert!(matches!(
        report.skipped[0].error,
        ObjectError::LinkResolutionFailure { ref dependency, .. } if dependency == "script 'guard'"
    ));
}

// -- 3. Spawns ----------------------------------------------------------------

/// Spawns one scripted minion on its first update.
#[derive(Debug)]
struct Spawner {
    owner: ObjectId,
    done: bool,
}

impl Component for Spawner {
    fn tag(&self) -> &str {
        "SPAWNER"
    }
    fn owner(&self) -> ObjectId {
        self.owner
    }
    fn set_owner(&mut self, owner: ObjectId) {
        self.owner = owner;
    }
    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
        if !self.done {
            self.done = true;
            let minion: ObjectDescriptor = serde_json::from_value(serde_json::json!({
                "name": "minion",
                "states": ["IDLE", "WALK"],
                "initial_state": "IDLE",
                "components": [
                    { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
                    { "type": "BEHAVIOR", "fields": { "script": "guard" } }
                ]
            }))
            .unwrap();
            ctx.commands.spawn(
                minion,
                CommandOrigin::Component {
                    object: ctx.object,
                    component: "SPAWNER".to_owned(),
                },
            );
        }
        Ok(())
    }
    fn fields(&self) -> serde_json::Value {
        serde_json::json!({})
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn spawned_objects_get_their_scripts() {
    let mut components = builtin_components();
    components
        .register_fn("SPAWNER", |_payload: &serde_json::Value| {
            Ok(Box::new(Spawner {
                owner: ObjectId::DETACHED,
                done: false,
            }) as Box<dyn Component>)
        })
        .unwrap();
    let mut resources = ResourceManager::in_memory();
    resources.insert_script("guard", GUARD);
    resources.insert_level(
        0,
        serde_json::from_value(serde_json::json!({ "objects": [
            { "name": "nest", "components": [ { "type": "SPAWNER" } ] }
        ]}))
        .unwrap(),
    );
    let mut engine = Engine::builder(headless())
        .components(components)
        .resources(resources)
        .platform(ScriptedInput::new([vec![key_down("D")]]))
        .build()
        .unwrap();
    engine.load_start_level().unwrap();

    let first = engine.step().unwrap();
    assert_eq!(first.update.spawned.len(), 1);
    assert_eq!(first.scripts_loaded, 1);

    engine.step().unwrap();
    assert_eq!(state_of(&engine, "minion"), Some("WALK"));
}

// -- 4. Collisions and projectiles -------------------------------------------

#[test]
fn depleted_hurtboxes_are_destroyed_the_same_frame() {
    let level = serde_json::json!({ "objects": [
        { "name": "spikes", "components": [
            { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
            { "type": "HITBOX", "fields": { "size": [16.0, 16.0], "damage": 5 } }
        ]},
        { "name": "slime", "components": [
            { "type": "TRANSFORM", "fields": { "position": [8.0, 0.0] } },
            { "type": "HURTBOX", "fields": { "size": [16.0, 16.0], "health": 3 } },
            { "type": "GLQUAD" }
        ]}
    ]});
    let mut engine = engine_with(level, ResourceManager::in_memory(), ScriptedInput::default());
    let slime = engine.objects().find_by_name("slime").unwrap().id();

    let summary = engine.step().unwrap();
    assert_eq!(summary.collisions.depleted, vec![slime]);
    assert_eq!(summary.flush.destroyed, vec![slime]);
    assert!(engine.objects().find_by_name("slime").is_none());

    let renderer = engine.renderer::<HeadlessRenderer>().unwrap();
    assert!(renderer.last_frame().unwrap().draws.is_empty(), "destroyed before draw");
}

#[test]
fn projectiles_expire_through_the_update_flush() {
    let level = serde_json::json!({ "objects": [
        { "name": "bolt", "components": [
            { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
            { "type": "PROJECTILE", "fields": { "speed": 60.0, "lifetime": 0.04 } },
            { "type": "COLLIDER", "fields": { "size": [2.0, 2.0] } }
        ]},
        { "name": "wall", "components": [
            { "type": "TRANSFORM", "fields": { "position": [1.5, -1.0] } },
            { "type": "COLLIDER", "fields": { "size": [4.0, 4.0] } }
        ]}
    ]});
    let mut engine = engine_with(level, ResourceManager::in_memory(), ScriptedInput::default());
    let bolt = engine.objects().find_by_name("bolt").unwrap().id();

    let first = engine.step().unwrap();
    assert_eq!(first.collisions.pairs.len(), 1);
    engine.step().unwrap();
    assert!(engine.objects().contains(bolt));

    let third = engine.step().unwrap();
    assert_eq!(third.update.destroyed, vec![bolt]);
    let wall = engine.objects().find_by_name("wall").unwrap();
    assert!(wall.component::<Collider>(tags::COLLIDER).unwrap().contacts().is_empty());
}

// -- 5. Drawing and determinism -------------------------------------------------

#[test]
fn every_quad_is_drawn_between_use_and_unuse() {
    let mut resources = ResourceManager::in_memory();
    resources.register_texture("hero", 64, 64);
    let level = serde_json::json!({ "objects": [
        { "name": "back", "components": [
            { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
            { "type": "GLQUAD", "fields": { "layer": 1, "color": [255, 0, 0, 255] } }
        ]},
        { "name": "hero", "components": [
            { "type": "TRANSFORM", "fields": { "position": [10.0, 20.0] } },
            { "type": "GLQUAD", "fields": { "texture": "hero" } }
        ]}
    ]});
    let mut engine = engine_with(level, resources, ScriptedInput::default());
    engine.step().unwrap();

    let renderer = engine.renderer::<HeadlessRenderer>().unwrap();
    assert!(!renderer.program_in_use());
    let frame = renderer.last_frame().unwrap();
    assert_eq!(frame.clear_color, EngineConfig::default().clear_color);
    assert_eq!(frame.draws.len(), 2);
    assert_eq!(frame.draws[0].color, [1.0, 0.0, 0.0, 1.0]);
    assert!(frame.draws[1].texture.is_some());
    let layered: Vec<i32> = frame.layered().iter().map(|q| q.layer).collect();
    assert_eq!(layered, vec![0, 1]);
}

#[test]
fn identical_runs_hash_identically() {
    let level = serde_json::json!({ "objects": [
        { "name": "fountain", "components": [
            { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
            { "type": "PARTICLE_EFFECT", "fields": { "seed": 7, "rate": 120.0 } }
        ]},
        { "name": "hero", "states": ["IDLE", "WALK"], "initial_state": "IDLE", "components": [
            { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
            { "type": "CONTROLLER" },
            { "type": "MOVEMENT" }
        ]}
    ]});
    let run = || {
        let input = ScriptedInput::new([
            vec![key_down("UP"), key_down("X")],
            vec![],
            vec![key_up("UP")],
        ]);
        let mut engine = engine_with(level.clone(), ResourceManager::in_memory(), input);
        engine.run_frames(30).unwrap();
        engine.objects().state_hash()
    };
    assert_eq!(run(), run());
}

// -- 6. Load policy -----------------------------------------------------------

fn broken_level() -> LevelDescriptor {
    serde_json::from_value(serde_json::json!({ "objects": [
        { "name": "ok", "components": [
            { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } }
        ]},
        { "name": "bad", "components": [
            { "type": "TRANSFORM", "fields": { "rotation": 3.0 } }
        ]}
    ]}))
    .unwrap()
}

#[test]
fn skip_policy_keeps_the_good_objects() {
    let mut engine = Engine::new(headless()).unwrap();
    engine.context_mut().resources.insert_level(4, broken_level());
    let report = engine.load_level(4).unwrap();
    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.skipped[0].name.as_deref(), Some("bad"));
    assert_eq!(engine.objects().len(), 1);
}

#[test]
fn abort_policy_loads_nothing() {
    let config = EngineConfig {
        load_policy: LoadPolicy::Abort,
        ..headless()
    };
    let mut engine = Engine::new(config).unwrap();
    engine.context_mut().resources.insert_level(4, broken_level());
    let err = engine.load_level(4).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Object(ObjectError::MalformedComponentData { ref field, .. })
            if field == "position"
    ));
    assert!(engine.objects().is_empty());
}

#[test]
fn loading_a_level_replaces_the_previous_one() {
    let mut engine =
        engine_with(hero_level(), ResourceManager::in_memory(), ScriptedInput::default());
    engine.context_mut().resources.insert_level(4, broken_level());
    let hero = engine.objects().find_by_name("hero").unwrap().id();
    engine.load_level(4).unwrap();
    assert!(engine.objects().find_by_name("hero").is_none());
    let ok = engine.objects().find_by_name("ok").unwrap().id();
    assert_ne!(ok, hero, "ids of the old level must not be handed out again");
    assert!(!engine.objects().contains(hero));
}

#[test]
fn a_failed_load_keeps_the_current_level() {
    let mut resources = ResourceManager::in_memory();
    resources.insert_level(0, serde_json::from_value(hero_level()).unwrap());
    resources.insert_level(4, broken_level());
    let config = EngineConfig {
        load_policy: LoadPolicy::Abort,
        ..headless()
    };
    let mut engine = Engine::builder(config)
        .resources(resources)
        .platform(ScriptedInput::new([vec![key_down("X")]]))
        .build()
        .unwrap();
    engine.load_start_level().unwrap();
    let hero = engine.objects().find_by_name("hero").unwrap().id();

    assert!(engine.load_level(4).is_err());
    assert!(matches!(
        engine.load_level(99).unwrap_err(),
        EngineError::Object(ObjectError::LevelLoad { level: 99, .. })
    ));
    assert_eq!(engine.objects().len(), 2);
    assert!(engine.objects().contains(hero));

    engine.step().unwrap();
    assert_eq!(state_of(&engine, "hero"), Some("WALK"));
}
