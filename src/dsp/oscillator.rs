//! Anti-aliased oscillators using PolyBLEP.
//!
//! Tone voices retune these live (frequency ramps, waveform swaps) without
//! resetting phase, so parameter edits never produce a discontinuity.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Parse the clip record's waveform name. Unknown names fall back to
    /// sine, the source system's default.
    pub fn parse(s: &str) -> Waveform {
        match s {
            "sine" => Waveform::Sine,
            "square" => Waveform::Square,
            "sawtooth" | "saw" => Waveform::Sawtooth,
            "triangle" => Waveform::Triangle,
            _ => Waveform::Sine,
        }
    }

    /// Lowpass cutoff applied to tone voices using this waveform, in Hz.
    /// Non-sine waveforms are harmonically harsh at entrainment carrier
    /// frequencies; each gets its own taming cutoff. Sine needs none.
    pub fn taming_cutoff(self) -> Option<f64> {
        match self {
            Waveform::Sine => None,
            Waveform::Triangle => Some(2200.0),
            Waveform::Square => Some(1400.0),
            Waveform::Sawtooth => Some(1200.0),
        }
    }
}

/// A band-limited oscillator with anti-aliasing (PolyBLEP).
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    pub detune: f64, // in cents
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            detune: 0.0,
            phase: 0.0,
            sample_rate,
        }
    }

    pub fn with_frequency(waveform: Waveform, frequency: f64, sample_rate: f64) -> Self {
        let mut osc = Oscillator::new(waveform, sample_rate);
        osc.frequency = frequency;
        osc
    }

    /// Retune without touching phase. Safe to call every sample.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency.max(0.0);
    }

    /// Swap the waveform in place; phase continues uninterrupted.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Effective frequency accounting for detune (in cents).
    fn effective_freq(&self) -> f64 {
        self.frequency * (2.0_f64).powf(self.detune / 1200.0)
    }

    /// Phase increment per sample.
    fn phase_inc(&self) -> f64 {
        self.effective_freq() / self.sample_rate
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let inc = self.phase_inc();
        let sample = match self.waveform {
            Waveform::Sine => self.sine(),
            Waveform::Sawtooth => self.sawtooth(inc),
            Waveform::Square => self.square(inc),
            Waveform::Triangle => self.triangle(),
        };

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }

    fn sine(&self) -> f64 {
        (2.0 * PI * self.phase).sin()
    }

    /// Naive sawtooth with PolyBLEP correction at the wrap.
    fn sawtooth(&self, inc: f64) -> f64 {
        let naive = 2.0 * self.phase - 1.0;
        naive - poly_blep(self.phase, inc)
    }

    /// Square wave via two PolyBLEP-corrected edges.
    fn square(&self, inc: f64) -> f64 {
        let mut value = if self.phase < 0.5 { 1.0 } else { -1.0 };
        value += poly_blep(self.phase, inc);
        value -= poly_blep((self.phase + 0.5) % 1.0, inc);
        value
    }

    /// Piecewise-linear triangle: -1→+1 in [0, 0.5], +1→-1 in [0.5, 1].
    fn triangle(&self) -> f64 {
        if self.phase < 0.5 {
            4.0 * self.phase - 1.0
        } else {
            3.0 - 4.0 * self.phase
        }
    }

    /// Reset oscillator phase.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// PolyBLEP (Polynomial Band-Limited Step) anti-aliasing correction.
///
/// `t` is the phase [0, 1), `dt` is the phase increment per sample.
/// Returns a correction value to subtract from the naive waveform
/// at discontinuities.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        // Just after the discontinuity
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        // Just before the next discontinuity
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_zero_at_start() {
        let mut osc = Oscillator::with_frequency(Waveform::Sine, 440.0, 44100.0);
        let sample = osc.next_sample();
        assert!(sample.abs() < 1e-10, "Sine should start near 0, got {sample}");
    }

    #[test]
    fn sine_range() {
        let mut osc = Oscillator::with_frequency(Waveform::Sine, 440.0, 44100.0);
        for _ in 0..44100 {
            let s = osc.next_sample();
            assert!(s >= -1.0 && s <= 1.0, "Sine out of range: {s}");
        }
    }

    #[test]
    fn sawtooth_range() {
        let mut osc = Oscillator::with_frequency(Waveform::Sawtooth, 440.0, 44100.0);
        for _ in 0..44100 {
            let s = osc.next_sample();
            assert!(s >= -1.5 && s <= 1.5, "Saw out of range: {s}");
        }
    }

    #[test]
    fn triangle_range() {
        let mut osc = Oscillator::with_frequency(Waveform::Triangle, 440.0, 44100.0);
        for _ in 0..44100 {
            let s = osc.next_sample();
            assert!(s >= -1.0 && s <= 1.0, "Triangle out of range: {s}");
        }
    }

    #[test]
    fn retune_preserves_phase_continuity() {
        let mut osc = Oscillator::with_frequency(Waveform::Sine, 200.0, 44100.0);
        let mut prev = osc.next_sample();
        for i in 0..2000 {
            // Sweep the frequency every sample, as a ramping voice does.
            osc.set_frequency(200.0 + i as f64 * 0.05);
            let s = osc.next_sample();
            // Worst-case per-sample delta for a sine at these frequencies
            // is far below 0.1; a phase reset would jump by up to 2.
            assert!(
                (s - prev).abs() < 0.1,
                "discontinuity at sample {i}: {prev} -> {s}"
            );
            prev = s;
        }
    }

    #[test]
    fn waveform_swap_keeps_running() {
        let mut osc = Oscillator::with_frequency(Waveform::Sine, 300.0, 44100.0);
        for _ in 0..100 {
            osc.next_sample();
        }
        osc.set_waveform(Waveform::Triangle);
        for _ in 0..1000 {
            let s = osc.next_sample();
            assert!(s.is_finite());
        }
        assert_eq!(osc.waveform, Waveform::Triangle);
    }

    #[test]
    fn parse_waveform_names() {
        assert_eq!(Waveform::parse("triangle"), Waveform::Triangle);
        assert_eq!(Waveform::parse("saw"), Waveform::Sawtooth);
        assert_eq!(Waveform::parse("nonsense"), Waveform::Sine);
    }

    #[test]
    fn taming_cutoffs_ordered_by_harshness() {
        assert!(Waveform::Sine.taming_cutoff().is_none());
        let tri = Waveform::Triangle.taming_cutoff().unwrap();
        let saw = Waveform::Sawtooth.taming_cutoff().unwrap();
        assert!(tri > saw, "triangle should be filtered more gently than saw");
    }

    #[test]
    fn detune_shifts_frequency() {
        let mut osc1 = Oscillator::with_frequency(Waveform::Sine, 440.0, 44100.0);
        osc1.detune = 0.0;
        let mut osc2 = Oscillator::with_frequency(Waveform::Sine, 440.0, 44100.0);
        osc2.detune = 1200.0; // +1 octave

        let inc1 = osc1.phase_inc();
        let inc2 = osc2.phase_inc();
        assert!(
            (inc2 - 2.0 * inc1).abs() < 1e-10,
            "1200 cents detune should double frequency"
        );
    }
}
