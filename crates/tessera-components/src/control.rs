//! CONTROLLER: turns input actions into MOVEMENT velocity.
//!
//! Fields: `speed` (`120.0` units/s) and `actions`, the names of the four
//! directional actions (`{"left": "left", "right": "right", "up": "up",
//! "down": "down"}` by default). Actions are resolved to keys by the
//! engine's input configuration.
//!
//! Objects with a CONTROLLER are also the targets of the engine's
//! action-to-state bindings (e.g. X switches them to `WALK`).

use serde::{Deserialize, Serialize};
use tessera_object::component::{Component, LinkContext, Sibling, UpdateContext};
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::ObjectError;

use crate::physics::Movement;
use crate::tags::{CONTROLLER, MOVEMENT};

/// Action names read by a [`Controller`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerActions {
    pub left: String,
    pub right: String,
    pub up: String,
    pub down: String,
}

impl Default for ControllerActions {
    fn default() -> Self {
        Self {
            left: "left".to_owned(),
            right: "right".to_owned(),
            up: "up".to_owned(),
            down: "down".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Controller {
    owner: ObjectId,
    pub speed: f32,
    pub actions: ControllerActions,
    movement: Option<Sibling<Movement>>,
}

impl Controller {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(CONTROLLER, payload)?;
        Ok(Self {
            owner: ObjectId::DETACHED,
            speed: fields.optional("speed", 120.0)?,
            actions: fields.optional("actions", ControllerActions::default())?,
            movement: None,
        })
    }
}

impl Component for Controller {
    component_basics!(CONTROLLER);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        self.movement = Some(ctx.require::<Movement>(CONTROLLER, MOVEMENT)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
        let handle = self
            .movement
            .ok_or_else(|| ctx.runtime_error(CONTROLLER, "movement not linked"))?;

        let axis = |negative: &str, positive: &str| -> f32 {
            let mut value = 0.0;
            if ctx.input.is_action_active(negative) {
                value -= 1.0;
            }
            if ctx.input.is_action_active(positive) {
                value += 1.0;
            }
            value
        };
        let mut direction = [
            axis(&self.actions.left, &self.actions.right),
            axis(&self.actions.down, &self.actions.up),
        ];
        let length = direction[0].hypot(direction[1]);
        if length > 0.0 {
            direction = direction.map(|d| d / length);
        }

        let velocity = direction.map(|d| d * self.speed);
        if let Some(movement) = ctx.siblings.get_mut(handle) {
            movement.velocity = velocity;
        }
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        serde_json::json!({
            "speed": self.speed,
            "actions": self.actions,
        })
    }
}

creator!(
    /// Creator for [`Controller`].
    ControllerCreator => Controller
);
