//! PROJECTILE, HITBOX and HURTBOX.
//!
//! Hits are resolved by the engine's collision pass: every active HITBOX that
//! overlaps a HURTBOX on another object, and is not on the same team, calls
//! [`Hurtbox::apply_damage`]. An object whose hurtbox is depleted is
//! destroyed through the deferred command queue.

use tessera_object::command::CommandOrigin;
use tessera_object::component::{Component, LinkContext, Sibling, UpdateContext};
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::ObjectError;
use tracing::debug;

use crate::shape::{Aabb, BoxShape};
use crate::tags::{HITBOX, HURTBOX, PROJECTILE, TRANSFORM};
use crate::transform::Transform;

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

/// Straight-line mover that destroys its owner when its lifetime runs out.
#[derive(Debug, Clone)]
pub struct Projectile {
    owner: ObjectId,
    pub speed: f32,
    /// Unit vector.
    direction: [f32; 2],
    pub lifetime: f32,
    age: f32,
    expired: bool,
    transform: Option<Sibling<Transform>>,
}

impl Projectile {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(PROJECTILE, payload)?;
        let speed: f32 = fields.required("speed")?;
        if speed < 0.0 {
            return Err(fields.malformed("speed", format!("must not be negative, got {speed}")));
        }
        let [dx, dy]: [f32; 2] = fields.optional("direction", [1.0, 0.0])?;
        let length = dx.hypot(dy);
        if length == 0.0 || !length.is_finite() {
            return Err(fields.malformed("direction", "must be a non-zero vector".to_owned()));
        }
        let lifetime: f32 = fields.optional("lifetime", 2.0)?;
        if lifetime <= 0.0 {
            return Err(fields.malformed("lifetime", format!("must be positive, got {lifetime}")));
        }
        Ok(Self {
            owner: ObjectId::DETACHED,
            speed,
            direction: [dx / length, dy / length],
            lifetime,
            age: 0.0,
            expired: false,
            transform: None,
        })
    }

    pub fn direction(&self) -> [f32; 2] {
        self.direction
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

impl Component for Projectile {
    component_basics!(PROJECTILE);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        self.transform = Some(ctx.require::<Transform>(PROJECTILE, TRANSFORM)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
        if self.expired {
            return Ok(());
        }
        let handle = self
            .transform
            .ok_or_else(|| ctx.runtime_error(PROJECTILE, "transform not linked"))?;
        let step = self.speed * ctx.dt;
        if let Some(transform) = ctx.siblings.get_mut(handle) {
            transform.translate([self.direction[0] * step, self.direction[1] * step]);
        }

        self.age += ctx.dt;
        if self.age >= self.lifetime {
            self.expired = true;
            debug!(object = %ctx.object, lifetime = self.lifetime, "projectile expired");
            ctx.commands.destroy(
                ctx.object,
                CommandOrigin::Component {
                    object: ctx.object,
                    component: PROJECTILE.to_owned(),
                },
            );
        }
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        serde_json::json!({
            "speed": self.speed,
            "direction": self.direction,
            "lifetime": self.lifetime,
        })
    }
}

creator!(
    /// Creator for [`Projectile`].
    ProjectileCreator => Projectile
);

// ---------------------------------------------------------------------------
// Hitbox / Hurtbox
// ---------------------------------------------------------------------------

fn same_team(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// A box that deals `damage` to overlapping hurtboxes.
#[derive(Debug, Clone)]
pub struct Hitbox {
    owner: ObjectId,
    pub shape: BoxShape,
    pub damage: i32,
    pub team: Option<String>,
    pub active: bool,
}

impl Hitbox {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(HITBOX, payload)?;
        let damage: i32 = fields.optional("damage", 1)?;
        if damage < 0 {
            return Err(fields.malformed("damage", format!("must not be negative, got {damage}")));
        }
        Ok(Self {
            owner: ObjectId::DETACHED,
            shape: BoxShape::from_fields(&fields)?,
            damage,
            team: fields.optional("team", None)?,
            active: fields.optional("active", true)?,
        })
    }

    pub fn world_aabb(&self, transform: &Transform) -> Aabb {
        self.shape.world(transform)
    }

    /// Whether this hitbox may damage `hurtbox` at all. Boxes on the same
    /// team never hit each other; unteamed boxes hit everything.
    pub fn can_hit(&self, hurtbox: &Hurtbox) -> bool {
        self.active && !same_team(&self.team, &hurtbox.team)
    }
}

impl Component for Hitbox {
    component_basics!(HITBOX);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        ctx.require::<Transform>(HITBOX, TRANSFORM)?;
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        let mut fields = serde_json::json!({
            "size": self.shape.size,
            "offset": self.shape.offset,
            "damage": self.damage,
            "active": self.active,
        });
        if let Some(team) = &self.team {
            fields["team"] = serde_json::json!(team);
        }
        fields
    }
}

creator!(
    /// Creator for [`Hitbox`].
    HitboxCreator => Hitbox
);

/// A box that takes damage. After a hit it ignores further hits for
/// `cooldown` seconds.
#[derive(Debug, Clone)]
pub struct Hurtbox {
    owner: ObjectId,
    pub shape: BoxShape,
    health: i32,
    pub team: Option<String>,
    pub cooldown: f32,
    invulnerable_for: f32,
}

impl Hurtbox {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(HURTBOX, payload)?;
        let cooldown: f32 = fields.optional("cooldown", 0.0)?;
        if cooldown < 0.0 {
            return Err(fields.malformed(
                "cooldown",
                format!("must not be negative, got {cooldown}"),
            ));
        }
        Ok(Self {
            owner: ObjectId::DETACHED,
            shape: BoxShape::from_fields(&fields)?,
            health: fields.optional("health", 1)?,
            team: fields.optional("team", None)?,
            cooldown,
            invulnerable_for: 0.0,
        })
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_depleted(&self) -> bool {
        self.health <= 0
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_for > 0.0
    }

    /// Subtract `amount` from health. Returns `false` if the hit was ignored
    /// because of the cooldown or because the box is already depleted.
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        if self.is_depleted() || self.is_invulnerable() {
            return false;
        }
        self.health = self.health.saturating_sub(amount);
        self.invulnerable_for = self.cooldown;
        true
    }

    pub fn world_aabb(&self, transform: &Transform) -> Aabb {
        self.shape.world(transform)
    }
}

impl Component for Hurtbox {
    component_basics!(HURTBOX);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        ctx.require::<Transform>(HURTBOX, TRANSFORM)?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
        self.invulnerable_for = (self.invulnerable_for - ctx.dt).max(0.0);
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        let mut fields = serde_json::json!({
            "size": self.shape.size,
            "offset": self.shape.offset,
            "health": self.health,
            "cooldown": self.cooldown,
        });
        if let Some(team) = &self.team {
            fields["team"] = serde_json::json!(team);
        }
        fields
    }
}

creator!(
    /// Creator for [`Hurtbox`].
    HurtboxCreator => Hurtbox
);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
