//! PARTICLE_EFFECT: a seeded emitter of short-lived quads.
//!
//! Particles are spawned at the owner's position, fly in a straight line
//! and fade out over their lifetime. Emission is driven by a [`Pcg32`]
//! seeded from the `seed` field, so the same level replays the same
//! particles.
//!
//! | Field | Type | Default |
//! |---|---|---|
//! | `rate` | particles per second | `20.0` |
//! | `lifetime` | seconds | `1.0` |
//! | `speed` | units/s | `60.0` |
//! | `direction` | degrees, 0 = +x | `90.0` |
//! | `spread` | degrees around `direction` | `360.0` |
//! | `max_particles` | cap on live particles | `64` |
//! | `size` | `[f32; 2]` | `[4.0, 4.0]` |
//! | `color` | `[f32; 4]` in `0..=255` | `[255, 255, 255, 255]` |
//! | `layer` | `i32` | `0` |
//! | `seed` | `u64` | `0` |
//! | `emitting` | `bool` | `true` |

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tessera_object::component::{Component, DrawContext, LinkContext, Sibling, UpdateContext};
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::render::{QuadDraw, ShaderProgram};
use tessera_object::ObjectError;

use crate::tags::{PARTICLE_EFFECT, TRANSFORM};
use crate::transform::Transform;

/// One live particle, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    /// Seconds since spawn.
    pub age: f32,
}

#[derive(Debug, Clone)]
pub struct ParticleEffect {
    owner: ObjectId,
    pub rate: f32,
    pub lifetime: f32,
    pub speed: f32,
    pub direction: f32,
    pub spread: f32,
    pub max_particles: usize,
    pub size: [f32; 2],
    pub color: [f32; 4],
    pub layer: i32,
    pub emitting: bool,
    seed: u64,
    rng: Pcg32,
    /// Fractional particles carried over between frames.
    pending: f32,
    particles: Vec<Particle>,
    transform: Option<Sibling<Transform>>,
}

impl ParticleEffect {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(PARTICLE_EFFECT, payload)?;

        let rate: f32 = fields.optional("rate", 20.0)?;
        if rate < 0.0 {
            return Err(fields.malformed("rate", format!("must not be negative, got {rate}")));
        }
        let lifetime: f32 = fields.optional("lifetime", 1.0)?;
        if lifetime <= 0.0 {
            return Err(fields.malformed("lifetime", format!("must be positive, got {lifetime}")));
        }
        let spread: f32 = fields.optional("spread", 360.0)?;
        if !(0.0..=360.0).contains(&spread) {
            return Err(fields.malformed("spread", format!("must be in 0..=360, got {spread}")));
        }
        let color: [f32; 4] = fields.optional("color", [255.0; 4])?;
        if color.iter().any(|c| !(0.0..=255.0).contains(c)) {
            return Err(fields.malformed(
                "color",
                format!("channels must be in 0..=255, got {color:?}"),
            ));
        }
        let seed: u64 = fields.optional("seed", 0)?;

        Ok(Self {
            owner: ObjectId::DETACHED,
            rate,
            lifetime,
            speed: fields.optional("speed", 60.0)?,
            direction: fields.optional("direction", 90.0)?,
            spread,
            max_particles: fields.optional("max_particles", 64)?,
            size: fields.optional("size", [4.0, 4.0])?,
            color,
            layer: fields.optional("layer", 0)?,
            emitting: fields.optional("emitting", true)?,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            pending: 0.0,
            particles: Vec::new(),
            transform: None,
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Spawn `count` particles at `origin` immediately, ignoring `rate`.
    pub fn burst(&mut self, origin: [f32; 2], count: usize) {
        for _ in 0..count {
            if self.particles.len() >= self.max_particles {
                break;
            }
            self.spawn(origin);
        }
    }

    fn spawn(&mut self, origin: [f32; 2]) {
        let half = self.spread / 2.0;
        let angle = (self.direction + self.rng.gen_range(-half..=half)).to_radians();
        self.particles.push(Particle {
            position: origin,
            velocity: [angle.cos() * self.speed, angle.sin() * self.speed],
            age: 0.0,
        });
    }

    fn step_particles(&mut self, dt: f32) {
        let lifetime = self.lifetime;
        self.particles.retain_mut(|p| {
            p.age += dt;
            p.position[0] += p.velocity[0] * dt;
            p.position[1] += p.velocity[1] * dt;
            p.age < lifetime
        });
    }

    fn emit(&mut self, origin: [f32; 2], dt: f32) {
        if !self.emitting {
            self.pending = 0.0;
            return;
        }
        self.pending += self.rate * dt;
        while self.pending >= 1.0 {
            self.pending -= 1.0;
            if self.particles.len() >= self.max_particles {
                continue;
            }
            self.spawn(origin);
        }
    }
}

impl Component for ParticleEffect {
    component_basics!(PARTICLE_EFFECT);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        self.transform = Some(ctx.require::<Transform>(PARTICLE_EFFECT, TRANSFORM)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
        let origin = self
            .transform
            .and_then(|h| ctx.siblings.get(h))
            .map(|t| t.position)
            .ok_or_else(|| ctx.runtime_error(PARTICLE_EFFECT, "transform not linked"))?;
        self.step_particles(ctx.dt);
        self.emit(origin, ctx.dt);
        Ok(())
    }

    fn is_drawable(&self) -> bool {
        true
    }

    fn draw(
        &self,
        ctx: &DrawContext<'_>,
        program: &mut dyn ShaderProgram,
    ) -> Result<(), ObjectError> {
        let [r, g, b, a] = self.color.map(|c| c / 255.0);
        for particle in &self.particles {
            let fade = (1.0 - particle.age / self.lifetime).clamp(0.0, 1.0);
            program.submit(QuadDraw {
                size: self.size,
                color: [r, g, b, a * fade],
                layer: self.layer,
                ..QuadDraw::at(ctx.object, particle.position)
            });
        }
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        serde_json::json!({
            "rate": self.rate,
            "lifetime": self.lifetime,
            "speed": self.speed,
            "direction": self.direction,
            "spread": self.spread,
            "max_particles": self.max_particles,
            "size": self.size,
            "color": self.color,
            "layer": self.layer,
            "seed": self.seed,
            "emitting": self.emitting,
        })
    }
}

creator!(
    /// Creator for [`ParticleEffect`].
    ParticleEffectCreator => ParticleEffect
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use tessera_object::component::NoInput;
    use tessera_object::object::GameObject;
    use tessera_object::resource::EmptyResources;

    fn emitter(fields: serde_json::Value) -> GameObject {
        object(
            &EmptyResources,
            &[
                (TRANSFORM, serde_json::json!({ "position": [10.0, 10.0] })),
                (PARTICLE_EFFECT, fields),
            ],
        )
        .unwrap()
    }

    fn effect(obj: &GameObject) -> &ParticleEffect {
        obj.component::<ParticleEffect>(PARTICLE_EFFECT).unwrap()
    }

    #[test]
    fn emits_at_rate() {
        let mut obj = emitter(serde_json::json!({ "rate": 10.0, "lifetime": 5.0 }));
        step(&mut obj, &NoInput, 0.25, 4);
        assert_eq!(effect(&obj).particles().len(), 10);
    }

    #[test]
    fn particles_expire() {
        let mut obj = emitter(serde_json::json!({ "rate": 4.0, "lifetime": 0.5 }));
        step(&mut obj, &NoInput, 0.25, 1);
        assert_eq!(effect(&obj).particles().len(), 1);
        obj.component_mut::<ParticleEffect>(PARTICLE_EFFECT)
            .unwrap()
            .emitting = false;
        step(&mut obj, &NoInput, 0.25, 2);
        assert!(effect(&obj).particles().is_empty());
    }

    #[test]
    fn live_particles_are_capped() {
        let mut obj = emitter(serde_json::json!({ "rate": 1000.0, "max_particles": 8 }));
        step(&mut obj, &NoInput, 0.1, 3);
        assert_eq!(effect(&obj).particles().len(), 8);
    }

    #[test]
    fn same_seed_same_particles() {
        let fields = serde_json::json!({ "rate": 30.0, "seed": 42 });
        let mut a = emitter(fields.clone());
        let mut b = emitter(fields);
        step(&mut a, &NoInput, 1.0 / 60.0, 30);
        step(&mut b, &NoInput, 1.0 / 60.0, 30);
        assert!(!effect(&a).particles().is_empty());
        assert_eq!(effect(&a).particles(), effect(&b).particles());
    }

    #[test]
    fn zero_spread_follows_direction() {
        let mut fx = ParticleEffect::from_payload(&serde_json::json!({
            "spread": 0.0, "direction": 0.0, "speed": 10.0
        }))
        .unwrap();
        fx.burst([0.0, 0.0], 3);
        for p in fx.particles() {
            assert!((p.velocity[0] - 10.0).abs() < 1e-4);
            assert!(p.velocity[1].abs() < 1e-4);
        }
    }

    #[test]
    fn draw_fades_with_age() {
        let mut obj = emitter(serde_json::json!({ "rate": 2.0, "lifetime": 1.0, "layer": 3 }));
        step(&mut obj, &NoInput, 0.5, 1);
        let mut program = RecordingProgram::default();
        obj.draw(&mut program).unwrap();
        assert_eq!(program.draws.len(), 1);
        assert_eq!(program.draws[0].color[3], 1.0);
        assert_eq!(program.draws[0].layer, 3);

        obj.component_mut::<ParticleEffect>(PARTICLE_EFFECT)
            .unwrap()
            .emitting = false;
        step(&mut obj, &NoInput, 0.5, 1);
        let mut program = RecordingProgram::default();
        obj.draw(&mut program).unwrap();
        assert_eq!(program.draws[0].color[3], 0.5);
    }

    #[test]
    fn bad_lifetime_is_malformed() {
        let err =
            ParticleEffect::from_payload(&serde_json::json!({ "lifetime": 0.0 })).unwrap_err();
        assert!(matches!(
            err,
            ObjectError::MalformedComponentData { ref field, .. } if field == "lifetime"
        ));
    }
}
