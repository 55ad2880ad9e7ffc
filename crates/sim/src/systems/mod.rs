//! Concrete gameplay systems that exercise the core's contracts
//! (component reads/writes, tick ordering, hook events). Gameplay *rules*
//! beyond this minimum are out of scope (SPEC_FULL §1); these exist so the
//! rewind/snapshot/hook machinery has real behavior to drive.

pub mod collision;
pub mod health;
pub mod movement;
pub mod weapons;

use std::sync::{Arc, Mutex};

use crate::{RewindHistory, SystemRegistry};

/// Builds the registry in the tick order recommended by SPEC_FULL §4.2:
/// input-apply -> AI/targeting -> movement commit -> weapon fire -> bullet
/// motion -> bullet-vs-entity collision -> health & death cleanup.
pub fn default_registry(rewind: Arc<Mutex<RewindHistory>>) -> SystemRegistry {
    let mut registry = SystemRegistry::new();
    registry.push(movement::input_apply);
    registry.push(movement::ai_targeting);
    registry.push(movement::movement_commit);
    registry.push(weapons::weapon_fire);
    registry.push(weapons::bullet_motion);
    registry.push_boxed(collision::bullet_vs_entity_collision_system(rewind));
    registry.push(health::iframe_decay);
    registry.push_boxed(health::dead_enemy_cleanup_system());
    registry
}
