//! Input-apply and movement-commit systems. Grounded in
//! `flowstate-sim::apply_movement`/`clamp_magnitude` (the teacher's
//! single-character movement step), generalized to the column store and
//! the richer per-player input.

use crate::{buttons, PlayerMotionState, World};

pub const MOVE_SPEED: f32 = 5.0;
pub const ROLL_SPEED_MULTIPLIER: f32 = 2.2;
pub const ROLL_DURATION_SECONDS: f32 = 0.35;

fn clamp_magnitude(x: f32, y: f32, max_magnitude: f32) -> (f32, f32) {
    let mag = (x * x + y * y).sqrt();
    if mag > max_magnitude && mag > 0.0 {
        let scale = max_magnitude / mag;
        (x * scale, y * scale)
    } else {
        (x, y)
    }
}

/// Reads the chosen per-tick input into `Player`/`PlayerState`, starting a
/// roll if requested and not already rolling.
pub fn input_apply(world: &mut World, _dt: f32) {
    let player_ids = world.components.player_ids();
    for eid in player_ids {
        let Some(input) = world.player_inputs.get(&eid).copied() else {
            continue;
        };
        if let Some(player) = world.components.player.get_mut(eid) {
            player.aim_angle = input.aim_angle;
            player.roll_button_was_down = input.has_button(buttons::ROLL);
            player.jump_button_was_down = input.has_button(buttons::JUMP);
        }

        let already_rolling = world.components.roll.has(eid);
        if input.has_button(buttons::ROLL) && !already_rolling {
            let (dir_x, dir_y) = clamp_magnitude(input.move_x, input.move_y, 1.0);
            let pos = world.components.position.get(eid).copied().unwrap_or_default();
            world.components.roll.insert(
                eid,
                crate::Roll {
                    elapsed: 0.0,
                    duration: ROLL_DURATION_SECONDS,
                    direction_x: dir_x,
                    direction_y: dir_y,
                    start_x: pos.x,
                    start_y: pos.y,
                },
            );
            if let Some(state) = world.components.player_state.get_mut(eid) {
                state.state = PlayerMotionState::Rolling;
            }
        }
    }
}

/// Movement intent + collision & movement commit, collapsed into one
/// system: writes `velocity` from input/roll state, integrates `position`,
/// and stores `prev*` for client interpolation (SPEC_FULL §3 Position).
pub fn movement_commit(world: &mut World, dt: f32) {
    let player_ids = world.components.player_ids();
    for eid in player_ids {
        let mut ended_roll = false;
        let (vx, vy) = if let Some(roll) = world.components.roll.get_mut(eid) {
            roll.elapsed += dt;
            if roll.elapsed >= roll.duration {
                ended_roll = true;
            }
            (
                roll.direction_x * MOVE_SPEED * ROLL_SPEED_MULTIPLIER,
                roll.direction_y * MOVE_SPEED * ROLL_SPEED_MULTIPLIER,
            )
        } else if let Some(input) = world.player_inputs.get(&eid) {
            let (mx, my) = clamp_magnitude(input.move_x, input.move_y, 1.0);
            (mx * MOVE_SPEED, my * MOVE_SPEED)
        } else {
            (0.0, 0.0)
        };

        if let Some(velocity) = world.components.velocity.get_mut(eid) {
            velocity.x = vx;
            velocity.y = vy;
        }
        if let Some(pos) = world.components.position.get_mut(eid) {
            pos.prev_x = pos.x;
            pos.prev_y = pos.y;
            pos.x += vx * dt;
            pos.y += vy * dt;
        }

        if ended_roll {
            world.components.roll.remove(eid);
            if let Some(state) = world.components.player_state.get_mut(eid) {
                state.state = PlayerMotionState::Idle;
            }
            world.fire_on_roll_end(eid);
        } else if world.components.roll.has(eid) {
            // still rolling, state already set above
        } else if let Some(state) = world.components.player_state.get_mut(eid) {
            let moving = vx != 0.0 || vy != 0.0;
            state.state = if moving {
                PlayerMotionState::Moving
            } else {
                PlayerMotionState::Idle
            };
        }
    }
}

/// Minimal enemy "AI": drift toward the nearest player. Stands in for the
/// out-of-scope AI system (SPEC_FULL §1) just enough to exercise bullet
/// collision against a moving target.
pub fn ai_targeting(world: &mut World, dt: f32) {
    let enemy_ids = world.components.enemy_ids();
    let player_positions: Vec<(u16, f32, f32)> = world
        .components
        .player_ids()
        .into_iter()
        .filter_map(|eid| world.components.position.get(eid).map(|p| (eid, p.x, p.y)))
        .collect();
    if player_positions.is_empty() {
        return;
    }

    const ENEMY_SPEED: f32 = 2.0;
    for eid in enemy_ids {
        let Some(pos) = world.components.position.get(eid).copied() else {
            continue;
        };
        let (target_eid, tx, ty) = player_positions
            .iter()
            .copied()
            .min_by(|a, b| {
                let da = (a.1 - pos.x).powi(2) + (a.2 - pos.y).powi(2);
                let db = (b.1 - pos.x).powi(2) + (b.2 - pos.y).powi(2);
                da.partial_cmp(&db).unwrap()
            })
            .unwrap();

        if let Some(ai) = world.components.enemy_ai.get_mut(eid) {
            ai.target_eid = Some(target_eid);
        }

        let dx = tx - pos.x;
        let dy = ty - pos.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist > 0.01 {
            let (dirx, diry) = (dx / dist, dy / dist);
            if let Some(p) = world.components.position.get_mut(eid) {
                p.prev_x = p.x;
                p.prev_y = p.y;
                p.x += dirx * ENEMY_SPEED * dt;
                p.y += diry * ENEMY_SPEED * dt;
            }
        }
    }
}
