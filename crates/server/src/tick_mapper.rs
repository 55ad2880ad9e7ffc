//! Per-client tick/time mapping for lag compensation (SPEC_FULL §4.5, C5).
//! No teacher analogue — the teacher's `ADR-0006` target-tick-floor
//! scheme assumed clients target a server-chosen future tick directly;
//! this arena instead estimates, from the client's own clock, which
//! server tick a shot was actually fired on.

use flowstate_sim::Tick;

const BLEND: f32 = 0.15;
const SNAP_THRESHOLD_TICKS: f32 = 12.0;

/// Exponential-smoothing estimator of `server_tick - client_tick`, the
/// clock offset a lag-compensated hit test resolves a client's reported
/// `clientTick` against.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientTickMapper {
    offset_ticks: f32,
    initialized: bool,
}

impl ClientTickMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset_ticks(&self) -> f32 {
        self.offset_ticks
    }

    /// Feeds a fresh (server_tick, client_tick) observation into the
    /// estimator. The first observation initializes the offset exactly;
    /// later observations blend smoothly unless the jump exceeds
    /// `SNAP_THRESHOLD_TICKS`, in which case the estimate snaps straight
    /// to the new offset (SPEC_FULL §4.5).
    pub fn update_offset(&mut self, server_tick: Tick, client_tick: u64) {
        let new_offset = server_tick as f32 - client_tick as f32;
        if !self.initialized {
            self.offset_ticks = new_offset;
            self.initialized = true;
            return;
        }
        let diff = new_offset - self.offset_ticks;
        if diff.abs() > SNAP_THRESHOLD_TICKS {
            self.offset_ticks = new_offset;
        } else {
            self.offset_ticks += BLEND * diff;
        }
    }

    pub fn estimate_server_tick(&self, client_tick: u64) -> f32 {
        client_tick as f32 + self.offset_ticks
    }
}

/// Clamps an estimated historical tick to the rewind buffer's horizon.
/// Returns the tick to actually query plus whether clamping occurred.
pub fn clamp_rewind_tick(now_tick: Tick, estimated_tick: f32, max_rewind_ticks: u32) -> (Tick, bool) {
    let floor = now_tick.saturating_sub(max_rewind_ticks);
    if estimated_tick >= now_tick as f32 {
        (now_tick, estimated_tick > now_tick as f32)
    } else if estimated_tick <= floor as f32 {
        (floor, (estimated_tick as i64) < floor as i64)
    } else {
        (estimated_tick.round() as Tick, false)
    }
}

const LATENCY_WEIGHT: f64 = 0.45;
const VIEW_WEIGHT: f64 = 0.35;

/// A shot-tick estimate together with the components that fed it, so
/// callers can surface the latency/view-delay/effective-age breakdown
/// for telemetry without recomputing the blend.
#[derive(Debug, Clone, Copy)]
pub struct ShotEstimate {
    pub tick: Tick,
    pub latency_ms: f64,
    pub view_interp_delay_ms: f64,
    pub effective_age_ms: f64,
}

/// Estimates the server tick a SHOOT input was actually fired on, blending
/// network latency and view-interpolation delay (SPEC_FULL §4.5). The
/// caller still clamps the returned tick via [`clamp_rewind_tick`].
pub fn estimate_shot_tick(
    now_tick: Tick,
    tick_rate_hz: u32,
    now_server_time_ms: f64,
    estimated_server_time_ms: f64,
    view_interp_delay_ms: f64,
) -> ShotEstimate {
    let view_interp_delay_ms = view_interp_delay_ms.clamp(0.0, 200.0);
    let latency_ms = (now_server_time_ms - estimated_server_time_ms).max(0.0);
    let age_ms = LATENCY_WEIGHT * latency_ms + VIEW_WEIGHT * view_interp_delay_ms;
    let tick_ms = 1000.0 / tick_rate_hz as f64;
    let age_ticks = (age_ms / tick_ms).floor() as i64;
    ShotEstimate {
        tick: now_tick.saturating_sub(age_ticks.max(0) as u32),
        latency_ms,
        view_interp_delay_ms,
        effective_age_ms: age_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_initializes_exactly() {
        let mut mapper = ClientTickMapper::new();
        mapper.update_offset(100, 40);
        assert_eq!(mapper.offset_ticks(), 60.0);
    }

    #[test]
    fn smooth_drift_blends_toward_new_offset() {
        let mut mapper = ClientTickMapper::new();
        mapper.update_offset(100, 40);
        mapper.update_offset(101, 40);
        let expected = 60.0 + BLEND * (61.0 - 60.0);
        assert!((mapper.offset_ticks() - expected).abs() < 1e-5);
    }

    #[test]
    fn large_jump_snaps_instead_of_blending() {
        let mut mapper = ClientTickMapper::new();
        mapper.update_offset(100, 40);
        mapper.update_offset(200, 40);
        assert_eq!(mapper.offset_ticks(), 160.0);
    }

    #[test]
    fn clamp_rewind_tick_respects_horizon() {
        let (tick, clamped) = clamp_rewind_tick(1000, 950.0, 30);
        assert_eq!(tick, 970);
        assert!(clamped);
    }

    #[test]
    fn clamp_rewind_tick_passes_through_in_range() {
        let (tick, clamped) = clamp_rewind_tick(1000, 985.0, 30);
        assert_eq!(tick, 985);
        assert!(!clamped);
    }

    #[test]
    fn clamp_rewind_tick_rejects_future() {
        let (tick, clamped) = clamp_rewind_tick(1000, 1010.0, 30);
        assert_eq!(tick, 1000);
        assert!(clamped);
    }

    #[test]
    fn estimate_shot_tick_accounts_for_latency_and_view_delay() {
        let estimate = estimate_shot_tick(600, 60, 1000.0, 900.0, 50.0);
        let age_ms: f64 = 0.45 * 100.0 + 0.35 * 50.0;
        let expected = 600 - (age_ms / (1000.0 / 60.0)).floor() as u32;
        assert_eq!(estimate.tick, expected);
        assert!((estimate.latency_ms - 100.0).abs() < 1e-9);
        assert!((estimate.effective_age_ms - age_ms).abs() < 1e-9);
    }
}
