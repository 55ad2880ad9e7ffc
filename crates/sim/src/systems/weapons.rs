//! Weapon fire and bullet motion. Minimal real implementation so the
//! collision system below has something to exercise lag compensation
//! against; ability-specific tuning stays out of scope (SPEC_FULL §1).

use crate::{buttons, World};

pub const BULLET_SPEED: f32 = 18.0;
pub const BULLET_DAMAGE: u16 = 10;
pub const BULLET_RANGE: f32 = 12.0;

/// Spawns a bullet for every player whose fresh input carries `SHOOT`.
pub fn weapon_fire(world: &mut World, _dt: f32) {
    let player_ids = world.components.player_ids();
    let mut to_spawn = Vec::new();
    for eid in player_ids {
        let Some(input) = world.player_inputs.get(&eid) else {
            continue;
        };
        if input.is_held || !input.has_button(buttons::SHOOT) {
            continue;
        }
        let Some(pos) = world.components.position.get(eid) else {
            continue;
        };
        let aim = world.components.player.get(eid).map_or(0.0, |p| p.aim_angle);
        to_spawn.push((eid, pos.x, pos.y, aim));
    }

    for (owner, x, y, aim) in to_spawn {
        let vx = aim.cos() * BULLET_SPEED;
        let vy = aim.sin() * BULLET_SPEED;
        world.spawn_bullet(owner, x, y, vx, vy, BULLET_DAMAGE, BULLET_RANGE);
    }
}

/// Integrates bullet position, tracks distance traveled and lifetime, and
/// despawns bullets that exceed range or run out of lifetime.
pub fn bullet_motion(world: &mut World, dt: f32) {
    let bullet_ids = world.components.bullet_ids();
    let mut to_remove = Vec::new();
    for eid in bullet_ids {
        let (vx, vy) = world
            .components
            .velocity
            .get(eid)
            .map(|v| (v.x, v.y))
            .unwrap_or((0.0, 0.0));
        let step = ((vx * dt).powi(2) + (vy * dt).powi(2)).sqrt();

        if let Some(pos) = world.components.position.get_mut(eid) {
            pos.prev_x = pos.x;
            pos.prev_y = pos.y;
            pos.x += vx * dt;
            pos.y += vy * dt;
        }

        let expired = if let Some(bullet) = world.components.bullet.get_mut(eid) {
            bullet.distance_traveled += step;
            bullet.lifetime -= dt;
            bullet.lifetime <= 0.0 || bullet.distance_traveled >= bullet.range
        } else {
            false
        };

        if expired {
            to_remove.push(eid);
        }
    }

    for eid in to_remove {
        world.components.remove_entity(eid);
    }
}
