//! COLLIDER and MOVEMENT.
//!
//! MOVEMENT integrates velocity into its owner's transform every update.
//! COLLIDER only describes a box; contacts are computed once per frame by
//! the engine's collision pass and stored back on the collider.
//!
//! MOVEMENT fields:
//!
//! | Field | Type | Default |
//! |---|---|---|
//! | `velocity` | `[f32; 2]`, units/s | `[0.0, 0.0]` |
//! | `acceleration` | `[f32; 2]`, units/s² | `[0.0, 0.0]` |
//! | `drag` | `f32`, fraction of velocity lost per second | `0.0` |
//! | `max_speed` | `f32` | unbounded |
//!
//! COLLIDER fields: `size` (required), `offset` (`[0, 0]`), `trigger`
//! (`false`).

use tessera_object::component::{Component, LinkContext, Sibling, UpdateContext};
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::ObjectError;

use crate::shape::{Aabb, BoxShape};
use crate::tags::{COLLIDER, MOVEMENT, TRANSFORM};
use crate::transform::Transform;

// ---------------------------------------------------------------------------
// Collider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Collider {
    owner: ObjectId,
    pub shape: BoxShape,
    /// Triggers report contacts but are ignored by solid responses.
    pub trigger: bool,
    contacts: Vec<ObjectId>,
}

impl Collider {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(COLLIDER, payload)?;
        Ok(Self {
            owner: ObjectId::DETACHED,
            shape: BoxShape::from_fields(&fields)?,
            trigger: fields.optional("trigger", false)?,
            contacts: Vec::new(),
        })
    }

    /// The collider's box for a given transform.
    pub fn world_aabb(&self, transform: &Transform) -> Aabb {
        self.shape.world(transform)
    }

    /// Objects overlapping this collider as of the last collision pass.
    pub fn contacts(&self) -> &[ObjectId] {
        &self.contacts
    }

    pub fn set_contacts(&mut self, contacts: Vec<ObjectId>) {
        self.contacts = contacts;
    }
}

impl Component for Collider {
    component_basics!(COLLIDER);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        ctx.require::<Transform>(COLLIDER, TRANSFORM)?;
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        serde_json::json!({
            "size": self.shape.size,
            "offset": self.shape.offset,
            "trigger": self.trigger,
        })
    }
}

creator!(
    /// Creator for [`Collider`].
    ColliderCreator => Collider
);

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Movement {
    owner: ObjectId,
    pub velocity: [f32; 2],
    pub acceleration: [f32; 2],
    pub drag: f32,
    pub max_speed: Option<f32>,
    transform: Option<Sibling<Transform>>,
}

impl Movement {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(MOVEMENT, payload)?;
        let drag: f32 = fields.optional("drag", 0.0)?;
        if drag < 0.0 {
            return Err(fields.malformed("drag", format!("must not be negative, got {drag}")));
        }
        let max_speed: Option<f32> = fields.optional("max_speed", None)?;
        if matches!(max_speed, Some(s) if s < 0.0) {
            return Err(fields.malformed("max_speed", "must not be negative".to_owned()));
        }
        Ok(Self {
            owner: ObjectId::DETACHED,
            velocity: fields.optional("velocity", [0.0, 0.0])?,
            acceleration: fields.optional("acceleration", [0.0, 0.0])?,
            drag,
            max_speed,
            transform: None,
        })
    }

    pub fn speed(&self) -> f32 {
        self.velocity[0].hypot(self.velocity[1])
    }

    fn integrate_velocity(&mut self, dt: f32) {
        self.velocity[0] += self.acceleration[0] * dt;
        self.velocity[1] += self.acceleration[1] * dt;

        if self.drag > 0.0 {
            let keep = (1.0 - self.drag * dt).max(0.0);
            self.velocity = self.velocity.map(|v| v * keep);
        }

        if let Some(max) = self.max_speed {
            let speed = self.speed();
            if speed > max && speed > 0.0 {
                let k = max / speed;
                self.velocity = self.velocity.map(|v| v * k);
            }
        }
    }
}

impl Component for Movement {
    component_basics!(MOVEMENT);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        self.transform = Some(ctx.require::<Transform>(MOVEMENT, TRANSFORM)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
        let handle = self
            .transform
            .ok_or_else(|| ctx.runtime_error(MOVEMENT, "transform not linked"))?;
        self.integrate_velocity(ctx.dt);
        let delta = [self.velocity[0] * ctx.dt, self.velocity[1] * ctx.dt];
        if let Some(transform) = ctx.siblings.get_mut(handle) {
            transform.translate(delta);
        }
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        let mut fields = serde_json::json!({
            "velocity": self.velocity,
            "acceleration": self.acceleration,
            "drag": self.drag,
        });
        if let Some(max) = self.max_speed {
            fields["max_speed"] = serde_json::json!(max);
        }
        fields
    }
}

creator!(
    /// Creator for [`Movement`].
    MovementCreator => Movement
);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
