//! Field-level input validation and clamping (SPEC_FULL §4.6), generalized
//! from this file's original `validate_input`/`ValidationResult` to the
//! full `NetworkInput` field set.

use flowstate_sim::buttons;
use flowstate_wire::NetworkInput;

/// Result of the per-command validity check, before clamping/enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCheck {
    Ok,
    /// A required field is NaN/Infinite (SPEC_FULL §7 "Protocol invalid").
    DroppedNanInf,
    /// One or more timing fields are absent — the client should be told
    /// once via `incompatible-protocol` (SPEC_FULL §4.6).
    DroppedMissingTiming,
}

pub fn check_fields(input: &NetworkInput) -> FieldCheck {
    if !input.core_fields_finite() {
        return FieldCheck::DroppedNanInf;
    }
    if !input.has_timing_fields() {
        return FieldCheck::DroppedMissingTiming;
    }
    if !input.timing_fields_finite() {
        return FieldCheck::DroppedNanInf;
    }
    FieldCheck::Ok
}

/// A server-side clamped input, ready for the per-slot queue. All fields
/// are the post-clamp values from SPEC_FULL §4.6.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedInput {
    pub seq: u64,
    pub client_tick: u64,
    pub client_time_ms: f64,
    pub estimated_server_time_ms: f64,
    pub view_interp_delay_ms: f64,
    pub shoot_seq: u64,
    pub buttons: u16,
    pub aim_angle: f32,
    pub move_x: f32,
    pub move_y: f32,
    pub cursor_world_x: f32,
    pub cursor_world_y: f32,
}

/// Only the transient action bits are ever legitimately set by a client;
/// anything else (e.g. a hypothetical debug-spawn bit) is masked off
/// (SPEC_FULL §4.6 "server-only bits ... masked off").
const ALLOWED_CLIENT_BUTTONS: u16 = buttons::TRANSIENT_MASK;

fn clamp_f64(v: f64, lo: f64, hi: f64) -> f64 {
    v.clamp(lo, hi)
}

/// Applies every clamp from SPEC_FULL §4.6. Must only be called after
/// [`check_fields`] returns [`FieldCheck::Ok`].
pub fn clamp(input: &NetworkInput) -> QueuedInput {
    let seq = input.seq.max(1.0).trunc() as u64;
    let client_tick = input.client_tick.max(0.0).trunc() as u64;
    let shoot_seq = input.shoot_seq.max(0.0).trunc() as u64;
    let buttons = (input.buttons.trunc() as i64).max(0) as u16 & ALLOWED_CLIENT_BUTTONS;
    let aim_angle =
        clamp_f64(input.aim_angle, -std::f64::consts::PI, std::f64::consts::PI) as f32;
    let move_x = clamp_f64(input.move_x, -1.0, 1.0) as f32;
    let move_y = clamp_f64(input.move_y, -1.0, 1.0) as f32;
    let cursor_world_x = clamp_f64(input.cursor_world_x, -10_000.0, 10_000.0) as f32;
    let cursor_world_y = clamp_f64(input.cursor_world_y, -10_000.0, 10_000.0) as f32;
    let view_interp_delay_ms = clamp_f64(input.view_interp_delay_ms.unwrap_or(0.0), 0.0, 200.0);

    QueuedInput {
        seq,
        client_tick,
        client_time_ms: input.client_time_ms.unwrap_or(0.0),
        estimated_server_time_ms: input.estimated_server_time_ms.unwrap_or(0.0),
        view_interp_delay_ms,
        shoot_seq,
        buttons,
        aim_angle,
        move_x,
        move_y,
        cursor_world_x,
        cursor_world_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> NetworkInput {
        NetworkInput {
            seq: 1.0,
            client_tick: 0.0,
            client_time_ms: Some(0.0),
            estimated_server_time_ms: Some(0.0),
            view_interp_delay_ms: Some(0.0),
            shoot_seq: 0.0,
            buttons: 0.0,
            aim_angle: 0.0,
            move_x: 0.0,
            move_y: 0.0,
            cursor_world_x: 0.0,
            cursor_world_y: 0.0,
        }
    }

    #[test]
    fn nan_move_is_rejected() {
        let mut input = base_input();
        input.move_x = f64::NAN;
        assert_eq!(check_fields(&input), FieldCheck::DroppedNanInf);
    }

    #[test]
    fn missing_timing_is_flagged() {
        let mut input = base_input();
        input.view_interp_delay_ms = None;
        assert_eq!(check_fields(&input), FieldCheck::DroppedMissingTiming);
    }

    #[test]
    fn aim_angle_clamped_to_pi_range() {
        let mut input = base_input();
        input.aim_angle = 10.0;
        let clamped = clamp(&input);
        assert!((clamped.aim_angle - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn move_axes_clamped_to_unit_range() {
        let mut input = base_input();
        input.move_x = 5.0;
        input.move_y = -5.0;
        let clamped = clamp(&input);
        assert_eq!(clamped.move_x, 1.0);
        assert_eq!(clamped.move_y, -1.0);
    }

    #[test]
    fn cursor_clamped_to_arena_bounds() {
        let mut input = base_input();
        input.cursor_world_x = 50_000.0;
        let clamped = clamp(&input);
        assert_eq!(clamped.cursor_world_x, 10_000.0);
    }

    #[test]
    fn view_interp_delay_clamped() {
        let mut input = base_input();
        input.view_interp_delay_ms = Some(999.0);
        let clamped = clamp(&input);
        assert_eq!(clamped.view_interp_delay_ms, 200.0);
    }

    #[test]
    fn server_only_bits_are_masked() {
        let mut input = base_input();
        input.buttons = (buttons::SHOOT | 0x8000) as f64;
        let clamped = clamp(&input);
        assert_eq!(clamped.buttons, buttons::SHOOT);
    }

    #[test]
    fn seq_floors_to_one() {
        let mut input = base_input();
        input.seq = 0.0;
        assert_eq!(clamp(&input).seq, 1);
    }
}
