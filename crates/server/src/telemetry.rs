//! Periodic rate-limit and rewind-statistics telemetry (SPEC_FULL §4.7
//! step 10). No teacher analogue — the teacher's `Server` had no
//! telemetry emission at all; this follows the accumulate-then-emit
//! shape spec.md:162 describes directly.

#[derive(Debug, Default)]
struct ShotSample {
    rewind_depth: u32,
    latency_ms: f64,
    interp_delay_ms: f64,
    effective_age_ms: f64,
}

/// Accumulates per-shot lag-comp samples and held-input skip counts
/// between telemetry emissions. Reset by [`TelemetryAccumulator::drain`].
#[derive(Debug, Default)]
pub struct TelemetryAccumulator {
    samples: Vec<ShotSample>,
    held_input_shoot_skips: u64,
}

impl TelemetryAccumulator {
    pub fn record_shot(&mut self, rewind_depth: u32, latency_ms: f64, interp_delay_ms: f64, effective_age_ms: f64) {
        self.samples.push(ShotSample {
            rewind_depth,
            latency_ms,
            interp_delay_ms,
            effective_age_ms,
        });
    }

    pub fn record_held_input_shoot_skip(&mut self) {
        self.held_input_shoot_skips += 1;
    }

    /// Takes everything accumulated so far, leaving the accumulator
    /// empty for the next telemetry window.
    pub fn drain(&mut self) -> TelemetryAccumulator {
        std::mem::take(self)
    }

    /// Builds the report line for this window, combining the drained
    /// per-shot samples with the room-wide rate-limit and rewind-miss
    /// totals (sourced from `InputQueue::rate_limited_drops` and
    /// `RewindHistory::history_misses`).
    pub fn report(&self, rate_limited_drops_total: u64, history_misses_total: u64) -> TelemetryReport {
        let mut depths: Vec<u32> = self.samples.iter().map(|s| s.rewind_depth).collect();
        depths.sort_unstable();

        let count = self.samples.len();
        let mean_latency_ms = mean(self.samples.iter().map(|s| s.latency_ms));
        let mean_interp_delay_ms = mean(self.samples.iter().map(|s| s.interp_delay_ms));
        let mean_effective_age_ms = mean(self.samples.iter().map(|s| s.effective_age_ms));

        TelemetryReport {
            shot_count: count as u64,
            rewind_depth_p50: percentile(&depths, 0.50),
            rewind_depth_p95: percentile(&depths, 0.95),
            mean_latency_ms,
            mean_interp_delay_ms,
            mean_effective_age_ms,
            held_input_shoot_skips: self.held_input_shoot_skips,
            rate_limited_drops_total,
            history_misses_total,
        }
    }
}

fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

/// Nearest-rank percentile over an already-sorted slice.
fn percentile(sorted: &[u32], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)] as f64
}

/// One telemetry window's worth of rate-limit and rewind statistics
/// (spec.md:162: "totals, p50/p95 rewind depth, mean latency/interp/
/// effective-age, held-input skips").
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryReport {
    pub shot_count: u64,
    pub rewind_depth_p50: f64,
    pub rewind_depth_p95: f64,
    pub mean_latency_ms: f64,
    pub mean_interp_delay_ms: f64,
    pub mean_effective_age_ms: f64,
    pub held_input_shoot_skips: u64,
    pub rate_limited_drops_total: u64,
    pub history_misses_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_sorted_depths() {
        let depths = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        assert_eq!(percentile(&depths, 0.50), 6.0);
        assert_eq!(percentile(&depths, 0.95), 10.0);
    }

    #[test]
    fn report_reflects_drained_samples() {
        let mut acc = TelemetryAccumulator::default();
        acc.record_shot(5, 40.0, 20.0, 60.0);
        acc.record_shot(9, 60.0, 20.0, 80.0);
        acc.record_held_input_shoot_skip();

        let drained = acc.drain();
        let report = drained.report(3, 1);

        assert_eq!(report.shot_count, 2);
        assert_eq!(report.held_input_shoot_skips, 1);
        assert_eq!(report.rate_limited_drops_total, 3);
        assert_eq!(report.history_misses_total, 1);
        assert!((report.mean_latency_ms - 50.0).abs() < 1e-9);
        assert_eq!(acc.report(0, 0).shot_count, 0);
    }

    #[test]
    fn empty_accumulator_reports_zeroed_stats() {
        let acc = TelemetryAccumulator::default();
        let report = acc.report(0, 0);
        assert_eq!(report.shot_count, 0);
        assert_eq!(report.rewind_depth_p50, 0.0);
        assert_eq!(report.mean_latency_ms, 0.0);
    }
}
