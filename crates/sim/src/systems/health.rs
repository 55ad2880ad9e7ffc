//! Health/iframe decay and dead-enemy cleanup. Kill/health-changed hooks
//! themselves fire from the collision system at the moment damage lands
//! (SPEC_FULL §4.2 tick order); this module only ages iframes and removes
//! enemies that have lingered one tick after death (SPEC_FULL §3
//! lifecycles: "may linger one tick for kill hooks to fire before
//! removal").

use std::collections::HashSet;

use crate::{EntityId, SystemFn, World};

pub fn iframe_decay(world: &mut World, dt: f32) {
    let ids = world.components.health.ids();
    for eid in ids {
        if let Some(health) = world.components.health.get_mut(eid) {
            if health.iframes > 0.0 {
                health.iframes = (health.iframes - dt).max(0.0);
            }
        }
        let invincible = world
            .components
            .health
            .get(eid)
            .map(|h| h.iframes > 0.0)
            .unwrap_or(false);
        if invincible {
            world.components.invincible.insert(eid, crate::Invincible);
        } else {
            world.components.invincible.remove(eid);
        }
    }
}

/// Removes enemies that were already `Dead` at the start of this tick,
/// giving exactly one tick for kill hooks/presentation to observe the
/// `Dead` flag in a snapshot before the entity disappears.
pub fn dead_enemy_cleanup_system() -> SystemFn {
    let mut seen_dead: HashSet<EntityId> = HashSet::new();
    Box::new(move |world: &mut World, _dt: f32| {
        let dead_enemies: Vec<EntityId> = world
            .components
            .enemy
            .ids()
            .into_iter()
            .filter(|&eid| world.components.dead.has(eid))
            .collect();

        let mut still_pending = HashSet::new();
        for eid in dead_enemies {
            if seen_dead.contains(&eid) {
                world.components.remove_entity(eid);
            } else {
                still_pending.insert(eid);
            }
        }
        seen_dead = still_pending;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{step_world, SystemRegistry};

    #[test]
    fn dead_enemy_lingers_one_tick_then_removed() {
        let mut world = World::new(1, 60);
        let eid = world.spawn_enemy(0, 0, 0.0, 0.0, 5);
        world.components.dead.insert(eid, crate::Dead);

        let mut registry = SystemRegistry::new();
        registry.push(dead_enemy_cleanup_system());
        let dt = world.dt_seconds;

        step_world(&mut world, &mut registry, dt);
        assert!(world.components.is_alive(eid), "should linger one tick");

        step_world(&mut world, &mut registry, dt);
        assert!(!world.components.is_alive(eid), "should be removed by now");
    }

    #[test]
    fn iframes_decay_to_zero() {
        let mut world = World::new(1, 60);
        let eid = world.spawn_player(0);
        world.components.health.get_mut(eid).unwrap().iframes = 0.02;
        iframe_decay(&mut world, 0.5);
        assert_eq!(world.components.health.get(eid).unwrap().iframes, 0.0);
        assert!(!world.components.invincible.has(eid));
    }
}
