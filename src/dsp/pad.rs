//! Ambient pads — slow, detuned oscillator stacks.
//!
//! A pad is a chord of detuned oscillators under a gentle lowpass, kept
//! alive by a slow LFO that either wobbles the detune or sweeps the filter
//! cutoff. Without that motion the stack sounds static and synthetic.

use serde::{Deserialize, Serialize};

use crate::dsp::filter::BiquadFilter;
use crate::dsp::oscillator::{Oscillator, Waveform};

/// Pad character preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadKind {
    Soothing,
    Focus,
    Sleep,
}

/// What the slow LFO moves.
#[derive(Debug, Clone, Copy)]
enum Motion {
    /// Wobble each oscillator's detune by up to this many cents.
    Detune(f64),
    /// Sweep the filter cutoff across `center ± span` Hz.
    Cutoff { center: f64, span: f64 },
}

/// Filter cutoff updates happen at this control interval, not per sample.
const CONTROL_INTERVAL: usize = 64;

/// A running pad. Mono; the mixer owns stereo placement for the pad bus.
#[derive(Debug, Clone)]
pub struct AmbientPad {
    kind: PadKind,
    /// (oscillator, base detune in cents) pairs.
    stack: Vec<(Oscillator, f64)>,
    filter: BiquadFilter,
    lfo: Oscillator,
    motion: Motion,
    gain: f64,
    control_counter: usize,
}

impl AmbientPad {
    pub fn new(kind: PadKind, sample_rate: f64) -> Self {
        let (frequencies, detunes, waveform, lfo_rate, motion, cutoff, gain): (
            &[f64],
            &[f64],
            Waveform,
            f64,
            Motion,
            f64,
            f64,
        ) = match kind {
            // Root + fifth, breathing detune.
            PadKind::Soothing => (
                &[220.0, 220.0, 330.0],
                &[-4.0, 4.0, 0.0],
                Waveform::Sine,
                0.10,
                Motion::Detune(5.0),
                1500.0,
                0.5,
            ),
            // Brighter triangle cluster with a filter sweep.
            PadKind::Focus => (
                &[240.0, 240.0, 360.0],
                &[-6.0, 6.0, 2.0],
                Waveform::Triangle,
                0.05,
                Motion::Cutoff {
                    center: 1200.0,
                    span: 400.0,
                },
                1200.0,
                0.45,
            ),
            // Low octave pair, heavily darkened, barely moving.
            PadKind::Sleep => (
                &[110.0, 110.0, 165.0],
                &[-3.0, 3.0, 0.0],
                Waveform::Sine,
                0.04,
                Motion::Detune(3.0),
                600.0,
                0.55,
            ),
        };

        let stack = frequencies
            .iter()
            .zip(detunes)
            .map(|(&freq, &detune)| {
                let mut osc = Oscillator::with_frequency(waveform, freq, sample_rate);
                osc.detune = detune;
                (osc, detune)
            })
            .collect();

        AmbientPad {
            kind,
            stack,
            filter: BiquadFilter::lowpass(cutoff, sample_rate),
            lfo: Oscillator::with_frequency(Waveform::Sine, lfo_rate, sample_rate),
            motion,
            gain,
            control_counter: 0,
        }
    }

    pub fn kind(&self) -> PadKind {
        self.kind
    }

    /// Next mono sample.
    pub fn next_sample(&mut self) -> f64 {
        let wobble = self.lfo.next_sample();

        if self.control_counter == 0 {
            match self.motion {
                Motion::Detune(cents) => {
                    for (osc, base) in self.stack.iter_mut() {
                        // Opposing detunes move apart and back together.
                        osc.detune = *base + wobble * cents * base.signum();
                    }
                }
                Motion::Cutoff { center, span } => {
                    self.filter.set_frequency(center + wobble * span);
                }
            }
        }
        self.control_counter = (self.control_counter + 1) % CONTROL_INTERVAL;

        let sum: f64 = self.stack.iter_mut().map(|(osc, _)| osc.next_sample()).sum();
        self.filter.process(sum / self.stack.len().max(1) as f64) * self.gain
    }

    /// Add one block into a mono bus at `gain`.
    pub fn render_into(&mut self, bus: &mut [f64], gain: f64) {
        if gain <= 0.0 {
            return;
        }
        for out in bus.iter_mut() {
            *out += self.next_sample() * gain;
        }
    }
}
