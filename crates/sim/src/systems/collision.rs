//! Bullet-vs-entity collision, including the lag-compensation algorithm
//! from SPEC_FULL §4.7. `RewindHistory` (C4) lives outside `World` (C1) by
//! design, so this system is built by a factory that closes over a shared
//! handle to it rather than being wired through `World` directly.

use std::sync::{Arc, Mutex};

use crate::{EntityId, HealthChangedEvent, KillEvent, RewindHistory, SystemFn, Tick, World};

/// Historical hit-test position/radius is expanded by this padding to
/// absorb interpolation jitter, per SPEC_FULL §4.7.
const LAG_COMP_PADDING: f32 = 0.15;

struct HitCandidate {
    eid: EntityId,
    x: f32,
    y: f32,
    radius: f32,
}

/// Builds the bullet-vs-entity collision system. `rewind` is shared with
/// the driver, which records a frame into it before systems run each tick.
pub fn bullet_vs_entity_collision_system(rewind: Arc<Mutex<RewindHistory>>) -> SystemFn {
    Box::new(move |world: &mut World, _dt: f32| {
        let bullet_ids = world.components.bullet_ids();
        let mut hits: Vec<(EntityId, EntityId)> = Vec::new();

        for bullet_eid in bullet_ids {
            let Some(bullet) = world.components.bullet.get(bullet_eid).copied() else {
                continue;
            };
            let Some(bpos) = world.components.position.get(bullet_eid).copied() else {
                continue;
            };
            let bradius = world.components.collider.get(bullet_eid).map_or(0.0, |c| c.radius);

            let shot_tick: Option<Tick> = world
                .lag_comp_shot_tick_by_player
                .get(&bullet.owner_id)
                .copied();

            let candidates = collect_candidates(world, bullet.owner_id, shot_tick, &rewind);

            for candidate in candidates {
                let effective_radius = if shot_tick.is_some() {
                    candidate.radius + LAG_COMP_PADDING
                } else {
                    candidate.radius
                };
                let dx = bpos.x - candidate.x;
                let dy = bpos.y - candidate.y;
                let dist_sq = dx * dx + dy * dy;
                let reach = bradius + effective_radius;
                if dist_sq <= reach * reach {
                    hits.push((bullet_eid, candidate.eid));
                    break;
                }
            }
        }

        for (bullet_eid, target_eid) in hits {
            apply_hit(world, bullet_eid, target_eid);
        }
    })
}

fn collect_candidates(
    world: &World,
    owner_id: EntityId,
    shot_tick: Option<Tick>,
    rewind: &Arc<Mutex<RewindHistory>>,
) -> Vec<HitCandidate> {
    let mut out = Vec::new();

    for eid in world.components.enemy_ids() {
        let present = world.components.position.get(eid).copied();
        let radius = world.components.collider.get(eid).map_or(0.0, |c| c.radius);
        let resolved = match shot_tick {
            Some(tick) => {
                let mut history = rewind.lock().expect("rewind history mutex poisoned");
                match history.get_enemy_state_at_tick(eid, tick) {
                    Some(state) if state.alive => Some((state.x, state.y, state.radius)),
                    Some(_) => None,
                    None => present.map(|p| (p.x, p.y, radius)),
                }
            }
            None => present.map(|p| (p.x, p.y, radius)),
        };
        if let Some((x, y, radius)) = resolved {
            out.push(HitCandidate { eid, x, y, radius });
        }
    }

    for eid in world.components.player_ids() {
        if eid == owner_id || world.components.dead.has(eid) {
            continue;
        }
        let present = world.components.position.get(eid).copied();
        let radius = world.components.collider.get(eid).map_or(0.0, |c| c.radius);
        let resolved = match shot_tick {
            Some(tick) => {
                let mut history = rewind.lock().expect("rewind history mutex poisoned");
                history
                    .get_player_at_tick(eid, tick)
                    .map(|state| (state.x, state.y, radius))
                    .or_else(|| present.map(|p| (p.x, p.y, radius)))
            }
            None => present.map(|p| (p.x, p.y, radius)),
        };
        if let Some((x, y, radius)) = resolved {
            out.push(HitCandidate { eid, x, y, radius });
        }
    }

    out
}

fn apply_hit(world: &mut World, bullet_eid: EntityId, target_eid: EntityId) {
    let Some(bullet) = world.components.bullet.get(bullet_eid).copied() else {
        return;
    };
    let result = world.fire_on_bullet_hit(bullet_eid, target_eid, bullet.damage);

    if let Some(health) = world.components.health.get_mut(target_eid) {
        let previous = health.current;
        health.current = (health.current - result.damage as i16).max(0);
        let current = health.current;
        if current != previous {
            world.fire_on_health_changed(HealthChangedEvent {
                eid: target_eid,
                previous,
                current,
            });
        }
        if current <= 0 && !world.components.dead.has(target_eid) {
            world.components.dead.insert(target_eid, crate::Dead);
            world.fire_on_kill(KillEvent {
                killer_eid: Some(bullet.owner_id),
                victim_eid: target_eid,
            });
        }
    }

    if !result.pierce {
        world.components.remove_entity(bullet_eid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buttons, AppliedPlayerInput, SystemRegistry};

    #[test]
    fn bullet_kills_enemy_in_range() {
        let mut world = World::new(1, 60);
        let rewind = Arc::new(Mutex::new(RewindHistory::new(16)));
        let owner = world.spawn_player(0);
        let enemy = world.spawn_enemy(0, 0, 5.0, 0.0, 5);
        world.spawn_bullet(owner, 4.95, 0.0, 0.0, 0.0, 10, 12.0);

        let mut registry = SystemRegistry::new();
        registry.push(bullet_vs_entity_collision_system(rewind));
        let dt = world.dt_seconds;
        crate::step_world(&mut world, &mut registry, dt);

        assert!(world.components.dead.has(enemy));
    }

    #[test]
    fn lag_compensated_hit_uses_historical_position() {
        let mut world = World::new(1, 60);
        let rewind = Arc::new(Mutex::new(RewindHistory::new(16)));
        let owner = world.spawn_player(0);
        let enemy = world.spawn_enemy(0, 0, 0.0, 0.0, 5);

        {
            let mut history = rewind.lock().unwrap();
            world.tick = 10;
            history.record(&world);
        }
        // enemy has since moved away; only the historical position should hit
        world.components.position.get_mut(enemy).unwrap().x = 50.0;
        world.spawn_bullet(owner, 0.0, 0.0, 0.0, 0.0, 10, 12.0);
        world.lag_comp_shot_tick_by_player.insert(owner, 10);
        world.player_inputs.insert(
            owner,
            AppliedPlayerInput {
                buttons: buttons::SHOOT,
                ..Default::default()
            },
        );

        let mut registry = SystemRegistry::new();
        registry.push(bullet_vs_entity_collision_system(rewind));
        let dt = world.dt_seconds;
        crate::step_world(&mut world, &mut registry, dt);

        assert!(world.components.dead.has(enemy));
    }
}
