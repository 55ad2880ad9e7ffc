//! The per-tick simulation driver (SPEC_FULL §4.7, C7) and the
//! fixed-timestep loop with spiral-of-death protection (SPEC_FULL §4.8).
//! No direct teacher analogue — the teacher's `Server::step` advances
//! exactly one tick per external call with no catch-up behavior; this
//! generalizes it into a real-time loop a WebSocket accept loop can poll.

use std::time::Instant;

use flowstate_sim::{buttons, step_world, AppliedPlayerInput, PlayerId};
use flowstate_wire::HudMessage;

use crate::session::Room;
use crate::tick_mapper;

pub const MAX_CATCHUP: u32 = 4;
pub const SNAPSHOT_INTERVAL: u32 = 2;
pub const HUD_INTERVAL: u32 = 6;
pub const TELEMETRY_INTERVAL: u32 = 300;
pub const HOLD_MAX_TICKS: u32 = 3;

/// What one simulation tick produced, for the transport layer to
/// broadcast.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub snapshot: Option<Vec<u8>>,
    pub hud: Vec<(PlayerId, HudMessage)>,
    pub telemetry: Option<crate::telemetry::TelemetryReport>,
}

struct FreshInput {
    client_tick: u64,
    shoot_seq: u64,
    estimated_server_time_ms: f64,
    view_interp_delay_ms: f64,
}

/// Chooses the input to apply this tick. `held_input_shoot_skip` is true
/// when a held input is standing in for a dropped fresh input that had
/// `SHOOT` set — `AppliedPlayerInput::as_held()` strips transient buttons,
/// so the skip must be observed from `slot.last_applied` before that
/// stripping happens (SPEC_FULL §4.7 step 6: "shots carried by held
/// inputs are skipped (counted)").
fn choose_input(slot: &mut crate::session::PlayerSlot) -> (AppliedPlayerInput, Option<FreshInput>, bool) {
    if let Some(raw) = slot.queue.pop_next() {
        let applied = AppliedPlayerInput {
            move_x: raw.move_x,
            move_y: raw.move_y,
            aim_angle: raw.aim_angle,
            buttons: raw.buttons,
            cursor_world_x: raw.cursor_world_x,
            cursor_world_y: raw.cursor_world_y,
            is_held: false,
        };
        slot.last_applied = applied;
        slot.held_input_ticks = 0;
        let fresh = FreshInput {
            client_tick: raw.client_tick,
            shoot_seq: raw.shoot_seq,
            estimated_server_time_ms: raw.estimated_server_time_ms,
            view_interp_delay_ms: raw.view_interp_delay_ms,
        };
        (applied, Some(fresh), false)
    } else if slot.held_input_ticks < HOLD_MAX_TICKS {
        slot.held_input_ticks += 1;
        let held_shoot_skip = slot.last_applied.has_button(buttons::SHOOT);
        (slot.last_applied.as_held(), None, held_shoot_skip)
    } else {
        (AppliedPlayerInput::default(), None, false)
    }
}

/// Runs exactly one simulation tick of `room` (SPEC_FULL §4.7 steps 1-10).
pub fn run_tick(room: &mut Room, server_time_ms: f64) -> TickOutput {
    {
        let mut rewind = room.rewind.lock().expect("rewind history lock poisoned");
        rewind.record(&room.world);
    }
    room.world.ephemeral.clear();
    room.world.lag_comp_shot_tick_by_player.clear();

    for slot in room.slots.values_mut() {
        slot.queue.trim();
    }

    let now_tick = room.world.tick;
    let tick_rate_hz = room.world.tick_rate_hz;
    let max_rewind_ticks = crate::session::MAX_REWIND_TICKS;

    for slot in room.slots.values_mut() {
        let (applied, fresh, held_shoot_skip) = choose_input(slot);
        if held_shoot_skip {
            room.telemetry.record_held_input_shoot_skip();
        }
        if let Some(fresh) = fresh {
            slot.tick_mapper.update_offset(now_tick, fresh.client_tick);
            if applied.has_button(buttons::SHOOT) {
                slot.last_shoot_seq = slot.last_shoot_seq.max(fresh.shoot_seq);
                let estimate = tick_mapper::estimate_shot_tick(
                    now_tick,
                    tick_rate_hz,
                    server_time_ms,
                    fresh.estimated_server_time_ms,
                    fresh.view_interp_delay_ms,
                );
                let (clamped_tick, _clamped) =
                    tick_mapper::clamp_rewind_tick(now_tick, estimate.tick as f32, max_rewind_ticks);
                room.world
                    .lag_comp_shot_tick_by_player
                    .insert(slot.eid, clamped_tick);
                room.telemetry.record_shot(
                    now_tick.saturating_sub(clamped_tick),
                    estimate.latency_ms,
                    estimate.view_interp_delay_ms,
                    estimate.effective_age_ms,
                );
            }
        }
        room.world.player_inputs.insert(slot.eid, applied);
    }

    let dt = room.world.dt_seconds;
    step_world(&mut room.world, &mut room.registry, dt);

    let tick = room.world.tick;
    let snapshot = if tick % SNAPSHOT_INTERVAL == 0 {
        let player_seqs: std::collections::HashMap<_, _> = room
            .slots
            .values()
            .map(|slot| (slot.eid, slot.queue.last_processed_seq().unwrap_or(0) as u32))
            .collect();
        Some(flowstate_wire::encode(
            &room.world,
            server_time_ms as f32,
            &player_seqs,
            &[],
            &[],
        ))
    } else {
        None
    };

    let hud = if tick % HUD_INTERVAL == 0 {
        room.slots
            .keys()
            .filter_map(|&player_id| room.hud_for(player_id, server_time_ms).map(|h| (player_id, h)))
            .collect()
    } else {
        Vec::new()
    };

    let telemetry = if tick % TELEMETRY_INTERVAL == 0 {
        let rate_limited_drops_total: u64 = room.slots.values().map(|slot| slot.queue.rate_limited_drops()).sum();
        let history_misses_total = room.rewind.lock().expect("rewind history lock poisoned").history_misses();
        Some(room.telemetry.drain().report(rate_limited_drops_total, history_misses_total))
    } else {
        None
    };

    TickOutput { snapshot, hud, telemetry }
}

/// Fixed-timestep accumulator with spiral-of-death protection: at most
/// `MAX_CATCHUP` ticks run per call to [`FixedTimestepLoop::advance`], no
/// matter how much wall-clock time has elapsed (SPEC_FULL §4.8).
pub struct FixedTimestepLoop {
    accumulator: f64,
    dt_seconds: f64,
    last_instant: Instant,
}

impl FixedTimestepLoop {
    pub fn new(tick_rate_hz: u32, now: Instant) -> Self {
        Self {
            accumulator: 0.0,
            dt_seconds: 1.0 / tick_rate_hz as f64,
            last_instant: now,
        }
    }

    /// Advances the accumulator by the elapsed wall-clock time and returns
    /// how many ticks `room` should run right now (clamped to
    /// `MAX_CATCHUP`).
    pub fn ticks_due(&mut self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.accumulator += elapsed;

        let mut due = 0;
        while self.accumulator >= self.dt_seconds && due < MAX_CATCHUP {
            self.accumulator -= self.dt_seconds;
            due += 1;
        }
        if due == MAX_CATCHUP {
            self.accumulator = 0.0;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ticks_due_caps_at_max_catchup() {
        let start = Instant::now();
        let mut timestep = FixedTimestepLoop::new(60, start);
        let stalled = start + Duration::from_secs(1);
        assert_eq!(timestep.ticks_due(stalled), MAX_CATCHUP);
    }

    #[test]
    fn ticks_due_is_zero_for_sub_tick_elapsed() {
        let start = Instant::now();
        let mut timestep = FixedTimestepLoop::new(60, start);
        let soon = start + Duration::from_millis(1);
        assert_eq!(timestep.ticks_due(soon), 0);
    }

    #[test]
    fn run_tick_advances_world_and_emits_snapshot_on_interval() {
        let mut room = Room::new(1, 60, 1);
        let now = Instant::now();
        room.join("sheriff".to_string(), now);

        let first = run_tick(&mut room, 0.0);
        assert!(first.snapshot.is_none());
        let second = run_tick(&mut room, 16.0);
        assert!(second.snapshot.is_some());
        assert_eq!(room.world.tick, 2);
    }

    #[test]
    fn held_input_persists_for_hold_max_ticks_then_goes_neutral() {
        let mut room = Room::new(1, 60, 1);
        let now = Instant::now();
        let (player_id, _) = room.join("sheriff".to_string(), now);
        let eid = room.slots[&player_id].eid;

        let input = flowstate_wire::NetworkInput {
            seq: 1.0,
            client_tick: 0.0,
            client_time_ms: Some(0.0),
            estimated_server_time_ms: Some(0.0),
            view_interp_delay_ms: Some(0.0),
            shoot_seq: 0.0,
            buttons: 0.0,
            aim_angle: 0.0,
            move_x: 1.0,
            move_y: 0.0,
            cursor_world_x: 0.0,
            cursor_world_y: 0.0,
        };
        room.handle_input(player_id, &input, now);

        run_tick(&mut room, 0.0);
        assert_eq!(room.world.player_inputs[&eid].move_x, 1.0);
        assert!(!room.world.player_inputs[&eid].is_held);

        for _ in 0..HOLD_MAX_TICKS {
            run_tick(&mut room, 0.0);
            assert_eq!(room.world.player_inputs[&eid].move_x, 1.0);
        }

        run_tick(&mut room, 0.0);
        assert_eq!(room.world.player_inputs[&eid].move_x, 0.0);
    }
}
