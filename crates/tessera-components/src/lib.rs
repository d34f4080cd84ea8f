//! Tessera Components -- the built-in component types.
//!
//! Every type here is built from a level payload by its creator and
//! registered under the tag listed in [`tags`]:
//!
//! | Tag | Type | Links to |
//! |---|---|---|
//! | `TRANSFORM` | [`Transform`](transform::Transform) | |
//! | `GLQUAD` | [`GlQuad`](quad::GlQuad) | `TRANSFORM`, texture |
//! | `COLLIDER` | [`Collider`](physics::Collider) | `TRANSFORM` |
//! | `MOVEMENT` | [`Movement`](physics::Movement) | `TRANSFORM` |
//! | `CONTROLLER` | [`Controller`](control::Controller) | `MOVEMENT` |
//! | `ANIMATION` | [`Animation`](animation::Animation) | `GLQUAD` |
//! | `PARTICLE_EFFECT` | [`ParticleEffect`](particles::ParticleEffect) | `TRANSFORM` |
//! | `TILEMAP` | [`Tilemap`](tilemap::Tilemap) | `TRANSFORM`, texture |
//! | `BEHAVIOR` | [`Behavior`](behavior::Behavior) | script |
//! | `PROJECTILE` | [`Projectile`](combat::Projectile) | `TRANSFORM` |
//! | `HITBOX` | [`Hitbox`](combat::Hitbox) | `TRANSFORM` |
//! | `HURTBOX` | [`Hurtbox`](combat::Hurtbox) | `TRANSFORM` |
//!
//! # Usage
//!
//! ```
//! use tessera_components::register_builtin_components;
//! use tessera_object::prelude::*;
//!
//! let mut components = ComponentFactory::new();
//! register_builtin_components(&mut components).unwrap();
//! assert_eq!(components.len(), 12);
//!
//! let transform = components
//!     .create("TRANSFORM", &serde_json::json!({ "position": [10.0, 20.0] }))
//!     .unwrap();
//! assert_eq!(transform.fields()["scale"], serde_json::json!([1.0, 1.0]));
//! ```

#![deny(unsafe_code)]

use tessera_object::registry::ComponentFactory;
use tessera_object::ObjectError;

/// Implements the bookkeeping methods every component shares.
macro_rules! component_basics {
    ($tag:expr) => {
        fn tag(&self) -> &str {
            $tag
        }

        fn owner(&self) -> tessera_object::id::ObjectId {
            self.owner
        }

        fn set_owner(&mut self, owner: tessera_object::id::ObjectId) {
            self.owner = owner;
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

/// Declares a stateless creator that parses a payload into `$component`.
macro_rules! creator {
    ($(#[$meta:meta])* $creator:ident => $component:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $creator;

        impl tessera_object::registry::ComponentCreator for $creator {
            fn create(
                &self,
                payload: &serde_json::Value,
            ) -> Result<Box<dyn tessera_object::component::Component>, tessera_object::ObjectError>
            {
                Ok(Box::new(<$component>::from_payload(payload)?))
            }
        }
    };
}

pub mod animation;
pub mod behavior;
pub mod combat;
pub mod control;
pub mod particles;
pub mod physics;
pub mod quad;
pub mod shape;
pub mod tilemap;
pub mod transform;

/// Registered tags of the built-in components.
pub mod tags {
    pub const TRANSFORM: &str = "TRANSFORM";
    pub const GLQUAD: &str = "GLQUAD";
    pub const COLLIDER: &str = "COLLIDER";
    pub const MOVEMENT: &str = "MOVEMENT";
    pub const CONTROLLER: &str = "CONTROLLER";
    pub const ANIMATION: &str = "ANIMATION";
    pub const PARTICLE_EFFECT: &str = "PARTICLE_EFFECT";
    pub const TILEMAP: &str = "TILEMAP";
    pub const BEHAVIOR: &str = "BEHAVIOR";
    pub const PROJECTILE: &str = "PROJECTILE";
    pub const HITBOX: &str = "HITBOX";
    pub const HURTBOX: &str = "HURTBOX";

    /// Every built-in tag, in registration order.
    pub const ALL: [&str; 12] = [
        TRANSFORM,
        GLQUAD,
        COLLIDER,
        MOVEMENT,
        CONTROLLER,
        ANIMATION,
        PARTICLE_EFFECT,
        TILEMAP,
        BEHAVIOR,
        PROJECTILE,
        HITBOX,
        HURTBOX,
    ];
}

/// Register the creator of every built-in component.
///
/// # Errors
///
/// [`ObjectError::DuplicateCreator`] if `components` already has one of the
/// built-in tags.
pub fn register_builtin_components(components: &mut ComponentFactory) -> Result<(), ObjectError> {
    components.register(tags::TRANSFORM, transform::TransformCreator)?;
    components.register(tags::GLQUAD, quad::GlQuadCreator)?;
    components.register(tags::COLLIDER, physics::ColliderCreator)?;
    components.register(tags::MOVEMENT, physics::MovementCreator)?;
    components.register(tags::CONTROLLER, control::ControllerCreator)?;
    components.register(tags::ANIMATION, animation::AnimationCreator)?;
    components.register(tags::PARTICLE_EFFECT, particles::ParticleEffectCreator)?;
    components.register(tags::TILEMAP, tilemap::TilemapCreator)?;
    components.register(tags::BEHAVIOR, behavior::BehaviorCreator)?;
    components.register(tags::PROJECTILE, combat::ProjectileCreator)?;
    components.register(tags::HITBOX, combat::HitboxCreator)?;
    components.register(tags::HURTBOX, combat::HurtboxCreator)?;
    Ok(())
}

/// A component registry holding exactly the built-in components.
pub fn builtin_components() -> ComponentFactory {
    let mut components = ComponentFactory::new();
    // A fresh registry cannot hold duplicates.
    let _ = register_builtin_components(&mut components);
    components
}

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::animation::{Animation, Clip};
    pub use crate::behavior::Behavior;
    pub use crate::combat::{Hitbox, Hurtbox, Projectile};
    pub use crate::control::{Controller, ControllerActions};
    pub use crate::particles::{Particle, ParticleEffect};
    pub use crate::physics::{Collider, Movement};
    pub use crate::quad::GlQuad;
    pub use crate::shape::{Aabb, BoxShape};
    pub use crate::tilemap::Tilemap;
    pub use crate::transform::Transform;
    pub use crate::{builtin_components, register_builtin_components, tags};
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_tag_is_registered() {
        let components = builtin_components();
        for tag in tags::ALL {
            assert!(components.contains(tag), "{tag} missing");
        }
        assert_eq!(components.len(), tags::ALL.len());
    }

    #[test]
    fn registering_twice_is_rejected() {
        let mut components = builtin_components();
        let err = register_builtin_components(&mut components).unwrap_err();
        assert_eq!(
            err,
            ObjectError::DuplicateCreator {
                tag: tags::TRANSFORM.to_owned()
            }
        );
    }
}
