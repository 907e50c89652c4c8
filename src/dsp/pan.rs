//! Stereo placement — equal-power panning and the auto-pan LFO.

use std::f64::consts::PI;

/// Equal-power pan law. `pan` ∈ [-1, 1] maps to (left, right) gains whose
/// squared sum is constant, so a sweep never changes perceived loudness.
pub fn equal_power_gains(pan: f64) -> (f64, f64) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * PI / 4.0;
    (angle.cos(), angle.sin())
}

/// The LFO that sweeps the noise bus across the stereo field.
///
/// Created when auto-pan is enabled and dropped when it is disabled; while
/// alive, rate and depth changes apply immediately via plain field sets.
#[derive(Debug, Clone)]
pub struct AutoPanLfo {
    /// Sweep rate in Hz.
    pub rate: f64,
    /// Sweep depth [0, 1].
    pub depth: f64,
    phase: f64,
    sample_rate: f64,
}

impl AutoPanLfo {
    pub fn new(rate: f64, depth: f64, sample_rate: f64) -> Self {
        AutoPanLfo {
            rate: rate.max(0.0),
            depth: depth.clamp(0.0, 1.0),
            phase: 0.0,
            sample_rate,
        }
    }

    /// Live parameter update; phase keeps running.
    pub fn set_params(&mut self, rate: f64, depth: f64) {
        self.rate = rate.max(0.0);
        self.depth = depth.clamp(0.0, 1.0);
    }

    /// Next pan position in [-depth, depth].
    pub fn next_pan(&mut self) -> f64 {
        let pan = (2.0 * PI * self.phase).sin() * self.depth;
        self.phase += self.rate / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        pan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_pan_is_balanced() {
        let (l, r) = equal_power_gains(0.0);
        assert!((l - r).abs() < 1e-12, "center should be balanced");
        assert!((l * l + r * r - 1.0).abs() < 1e-9, "power should be unity");
    }

    #[test]
    fn hard_pan_silences_opposite_channel() {
        let (l, r) = equal_power_gains(-1.0);
        assert!((l - 1.0).abs() < 1e-9 && r.abs() < 1e-9, "hard left: {l}, {r}");

        let (l, r) = equal_power_gains(1.0);
        assert!(l.abs() < 1e-9 && (r - 1.0).abs() < 1e-9, "hard right: {l}, {r}");
    }

    #[test]
    fn power_constant_across_the_sweep() {
        for i in 0..=20 {
            let pan = -1.0 + i as f64 * 0.1;
            let (l, r) = equal_power_gains(pan);
            assert!(
                (l * l + r * r - 1.0).abs() < 1e-9,
                "power varies at pan {pan}"
            );
        }
    }

    #[test]
    fn lfo_stays_within_depth() {
        let mut lfo = AutoPanLfo::new(2.0, 0.6, 44100.0);
        for _ in 0..44100 {
            let pan = lfo.next_pan();
            assert!(pan.abs() <= 0.6 + 1e-9, "pan exceeded depth: {pan}");
        }
    }

    #[test]
    fn lfo_completes_a_cycle_at_its_rate() {
        let mut lfo = AutoPanLfo::new(1.0, 1.0, 1000.0);
        // One full cycle at 1 Hz over 1000 samples: pan should return near 0
        // and have visited both extremes.
        let mut max = f64::MIN;
        let mut min = f64::MAX;
        let mut last = 0.0;
        for _ in 0..1000 {
            last = lfo.next_pan();
            max = max.max(last);
            min = min.min(last);
        }
        assert!(max > 0.95 && min < -0.95, "sweep range [{min}, {max}]");
        assert!(last.abs() < 0.05, "cycle should close near center: {last}");
    }
}
