//! The per-frame collision pass.
//!
//! Runs after the update pass on the settled transforms of every live
//! object:
//!
//! 1. COLLIDER boxes are tested pairwise; each collider's contact list is
//!    replaced with the objects it overlaps this frame.
//! 2. Every active HITBOX damages each overlapping HURTBOX of another object
//!    it [can hit](tessera_components::combat::Hitbox::can_hit).
//! 3. Objects whose hurtbox was depleted by this pass are queued for
//!    destruction with a [`CommandOrigin::GameRule`]; they disappear at the
//!    next flush like any other destroy.
//!
//! Pairs are visited in live-list order, so the outcome is deterministic.

use std::collections::HashMap;

use tessera_components::combat::{Hitbox, Hurtbox};
use tessera_components::physics::Collider;
use tessera_components::shape::Aabb;
use tessera_components::tags::{COLLIDER, HITBOX, HURTBOX, TRANSFORM};
use tessera_components::transform::Transform;
use tessera_object::command::CommandOrigin;
use tessera_object::id::ObjectId;
use tessera_object::manager::GameObjectManager;
use tracing::debug;

/// Game rule named by destroy commands the pass queues.
pub const HURTBOX_DEPLETED: &str = "hurtbox_depleted";

/// Two overlapping colliders. `a` precedes `b` in the live list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionPair {
    pub a: ObjectId,
    pub b: ObjectId,
}

/// Damage dealt by one hitbox to one hurtbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub attacker: ObjectId,
    pub target: ObjectId,
    pub damage: i32,
    /// Target health after the hit.
    pub remaining_health: i32,
}

/// Everything one collision pass found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    pub pairs: Vec<CollisionPair>,
    pub hits: Vec<Hit>,
    /// Objects queued for destruction because their hurtbox ran out.
    pub depleted: Vec<ObjectId>,
}

/// Run the collision pass over every live object of `manager`.
pub fn run_collision_pass(manager: &mut GameObjectManager) -> CollisionReport {
    let mut report = CollisionReport::default();
    update_contacts(manager, &mut report);
    apply_hits(manager, &mut report);

    for &object in &report.depleted {
        manager.request_destroy(object, CommandOrigin::GameRule(HURTBOX_DEPLETED.to_owned()));
    }
    if !report.hits.is_empty() || !report.depleted.is_empty() {
        debug!(
            pairs = report.pairs.len(),
            hits = report.hits.len(),
            depleted = report.depleted.len(),
            "collision pass"
        );
    }
    report
}

fn update_contacts(manager: &mut GameObjectManager, report: &mut CollisionReport) {
    let boxes: Vec<(ObjectId, Aabb)> = manager
        .objects()
        .iter()
        .filter_map(|object| {
            let transform = object.component::<Transform>(TRANSFORM)?;
            let collider = object.component::<Collider>(COLLIDER)?;
            Some((object.id(), collider.world_aabb(transform)))
        })
        .collect();

    let mut contacts: HashMap<ObjectId, Vec<ObjectId>> =
        boxes.iter().map(|(id, _)| (*id, Vec::new())).collect();
    for (i, (a, box_a)) in boxes.iter().enumerate() {
        for (b, box_b) in &boxes[i + 1..] {
            if box_a.overlaps(box_b) {
                contacts.entry(*a).or_default().push(*b);
                contacts.entry(*b).or_default().push(*a);
                report.pairs.push(CollisionPair { a: *a, b: *b });
            }
        }
    }

    for object in manager.objects_mut() {
        let Some(list) = contacts.remove(&object.id()) else {
            continue;
        };
        if let Some(collider) = object.component_mut::<Collider>(COLLIDER) {
            collider.set_contacts(list);
        }
    }
}

fn apply_hits(manager: &mut GameObjectManager, report: &mut CollisionReport) {
    let attackers: Vec<(ObjectId, Aabb, Hitbox)> = manager
        .objects()
        .iter()
        .filter_map(|object| {
            let transform = object.component::<Transform>(TRANSFORM)?;
            let hitbox = object.component::<Hitbox>(HITBOX)?;
            hitbox
                .active
                .then(|| (object.id(), hitbox.world_aabb(transform), hitbox.clone()))
        })
        .collect();
    if attackers.is_empty() {
        return;
    }

    for object in manager.objects_mut() {
        let target = object.id();
        let Some(area) = object
            .component::<Transform>(TRANSFORM)
            .zip(object.component::<Hurtbox>(HURTBOX))
            .map(|(transform, hurtbox)| hurtbox.world_aabb(transform))
        else {
            continue;
        };
        let Some(hurtbox) = object.component_mut::<Hurtbox>(HURTBOX) else {
            continue;
        };
        for (attacker, reach, hitbox) in &attackers {
            if *attacker == target || !reach.overlaps(&area) || !hitbox.can_hit(hurtbox) {
                continue;
            }
            if hurtbox.apply_damage(hitbox.damage) {
                report.hits.push(Hit {
                    attacker: *attacker,
                    target,
                    damage: hitbox.damage,
                    remaining_health: hurtbox.health(),
                });
                if hurtbox.is_depleted() {
                    report.depleted.push(target);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
