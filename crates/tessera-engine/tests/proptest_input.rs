//! Property tests: arbitrary key sequences through the engine loop.

use proptest::prelude::*;

use tessera_components::prelude::*;
use tessera_engine::prelude::*;

const KEYS: [&str; 6] = ["X", "Z", "LEFT", "RIGHT", "UP", "SPACE"];

fn arb_event() -> impl Strategy<Value = InputEvent> {
    (0..KEYS.len(), any::<bool>()).prop_map(|(key, down)| {
        let key = KEYS[key].to_owned();
        if down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    })
}

fn arb_frames() -> impl Strategy<Value = Vec<Vec<InputEvent>>> {
    prop::collection::vec(prop::collection::vec(arb_event(), 0..4), 1..20)
}

const LEVEL: &str = r#"{ "objects": [ {
    "name": "hero",
    "states": ["IDLE", "WALK"],
    "initial_state": "IDLE",
    "components": [
        { "type": "TRANSFORM", "fields": { "position": [0.0, 0.0] } },
        { "type": "CONTROLLER" },
        { "type": "MOVEMENT" }
    ]
} ] }"#;

fn engine(frames: Vec<Vec<InputEvent>>) -> Engine {
    let mut resources = ResourceManager::in_memory();
    resources.insert_level_json(0, LEVEL).unwrap();
    let mut engine = Engine::builder(EngineConfig {
        headless: true,
        ..EngineConfig::default()
    })
    .resources(resources)
    .platform(ScriptedInput::new(frames))
    .build()
    .unwrap();
    engine.load_start_level().unwrap();
    engine
}

proptest! {
    #[test]
    fn hero_stays_in_a_declared_state(frames in arb_frames()) {
        let count = frames.len() as u64;
        let mut engine = engine(frames);
        for _ in 0..count {
            let summary = engine.step().unwrap();
            prop_assert_eq!(summary.failure_count(), 0);
            let hero = engine.objects().find_by_name("hero").unwrap();
            prop_assert!(matches!(hero.current_state(), Some("IDLE" | "WALK")));
        }
        prop_assert_eq!(engine.frame(), count);
        prop_assert_eq!(engine.objects().len(), 1);
    }

    #[test]
    fn hero_moves_at_most_speed_times_elapsed(frames in arb_frames()) {
        let count = frames.len();
        let mut engine = engine(frames);
        engine.run_frames(count as u64).unwrap();
        let hero = engine.objects().find_by_name("hero").unwrap();
        let position = hero.component::<Transform>(tags::TRANSFORM).unwrap().position;
        // Controller speed 120 at a fixed 1/60 step, diagonals included.
        let bound = 2.0 * count as f32 * std::f32::consts::SQRT_2 + 1e-3;
        prop_assert!(position[0].abs() <= bound && position[1].abs() <= bound);
    }

    #[test]
    fn identical_input_gives_identical_state(frames in arb_frames()) {
        let count = frames.len() as u64;
        let mut a = engine(frames.clone());
        let mut b = engine(frames);
        a.run_frames(count).unwrap();
        b.run_frames(count).unwrap();
        prop_assert_eq!(a.objects().state_hash(), b.objects().state_hash());
    }
}
