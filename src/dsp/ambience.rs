//! Procedural soundscapes — rain, forest, drone.
//!
//! Each soundscape is a continuous bed (filtered noise, or a detuned
//! oscillator stack for the drone) plus short transient events spawned on
//! randomized intervals: rain drops, bird chirps, slow overtone swells.
//! Transients are disposable voices that finish on their own envelope; the
//! spawner is a sample-countdown timer owned by the layer, so dropping the
//! layer cancels every pending spawn by construction.

use serde::{Deserialize, Serialize};

use crate::dsp::envelope::Envelope;
use crate::dsp::filter::BiquadFilter;
use crate::dsp::noise::{NoiseGenerator, NoiseType};
use crate::dsp::oscillator::{Oscillator, Waveform};

/// Soundscape preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbienceKind {
    Rain,
    Forest,
    Drone,
}

/// Simultaneous transient ceiling; spawns beyond this are skipped.
const MAX_TRANSIENTS: usize = 8;

/// A countdown timer that fires on randomized intervals. Counts samples,
/// not wall time, so it pauses with the render loop and dies with its
/// owner.
#[derive(Debug, Clone)]
struct TransientSpawner {
    min_interval: f64,
    max_interval: f64,
    sample_rate: f64,
    samples_until_fire: u64,
}

impl TransientSpawner {
    fn new(min_interval: f64, max_interval: f64, sample_rate: f64, rng: &mut fastrand::Rng) -> Self {
        let mut spawner = TransientSpawner {
            min_interval,
            max_interval,
            sample_rate,
            samples_until_fire: 0,
        };
        spawner.rearm(rng);
        spawner
    }

    fn rearm(&mut self, rng: &mut fastrand::Rng) {
        let interval =
            self.min_interval + rng.f64() * (self.max_interval - self.min_interval);
        self.samples_until_fire = (interval * self.sample_rate) as u64;
    }

    /// Advance one sample; true means a transient is due now.
    fn tick(&mut self, rng: &mut fastrand::Rng) -> bool {
        if self.samples_until_fire == 0 {
            self.rearm(rng);
            return true;
        }
        self.samples_until_fire -= 1;
        false
    }
}

/// One disposable transient: an oscillator with a linear frequency glide
/// under a one-shot envelope. Finished voices are dropped by the layer.
#[derive(Debug, Clone)]
struct TransientVoice {
    osc: Oscillator,
    env: Envelope,
    frequency: f64,
    /// Per-sample frequency delta for the glide.
    freq_step: f64,
    amplitude: f64,
}

impl TransientVoice {
    fn new(
        waveform: Waveform,
        start_freq: f64,
        end_freq: f64,
        attack: f64,
        decay: f64,
        amplitude: f64,
        sample_rate: f64,
    ) -> Self {
        let total_samples = ((attack + decay) * sample_rate).max(1.0);
        let mut env = Envelope::one_shot(attack, decay, sample_rate);
        env.gate_on();
        TransientVoice {
            osc: Oscillator::with_frequency(waveform, start_freq, sample_rate),
            env,
            frequency: start_freq,
            freq_step: (end_freq - start_freq) / total_samples,
            amplitude,
        }
    }

    fn next_sample(&mut self) -> f64 {
        self.frequency += self.freq_step;
        self.osc.set_frequency(self.frequency);
        self.osc.next_sample() * self.env.next_sample() * self.amplitude
    }

    fn is_finished(&self) -> bool {
        self.env.is_finished()
    }
}

/// The continuous layer under the transients.
#[derive(Debug, Clone)]
enum Bed {
    /// Filtered noise (rain hiss, forest wind).
    Noise {
        generator: NoiseGenerator,
        filter: BiquadFilter,
        gain: f64,
    },
    /// Detuned oscillator stack with a slow amplitude LFO (drone).
    Oscillators {
        stack: Vec<Oscillator>,
        lfo: Oscillator,
        gain: f64,
    },
}

impl Bed {
    fn next_sample(&mut self) -> f64 {
        match self {
            Bed::Noise {
                generator,
                filter,
                gain,
            } => filter.process(generator.next_sample()) * *gain,
            Bed::Oscillators { stack, lfo, gain } => {
                let sum: f64 = stack.iter_mut().map(|osc| osc.next_sample()).sum();
                // LFO breathes the level between 0.8 and 1.0 of nominal.
                let breath = 0.9 + 0.1 * lfo.next_sample();
                sum / stack.len().max(1) as f64 * breath * *gain
            }
        }
    }
}

/// A running soundscape: bed + transient spawner + live transients.
/// Mono; the mixer owns stereo placement for the ambience bus.
#[derive(Debug, Clone)]
pub struct AmbienceLayer {
    kind: AmbienceKind,
    sample_rate: f64,
    rng: fastrand::Rng,
    bed: Bed,
    spawner: TransientSpawner,
    transients: Vec<TransientVoice>,
}

impl AmbienceLayer {
    pub fn new(kind: AmbienceKind, sample_rate: f64) -> Self {
        AmbienceLayer::build(kind, sample_rate, fastrand::Rng::new())
    }

    /// Seeded construction for deterministic tests.
    pub fn with_seed(kind: AmbienceKind, sample_rate: f64, seed: u64) -> Self {
        AmbienceLayer::build(kind, sample_rate, fastrand::Rng::with_seed(seed))
    }

    fn build(kind: AmbienceKind, sample_rate: f64, mut rng: fastrand::Rng) -> Self {
        let bed = match kind {
            AmbienceKind::Rain => Bed::Noise {
                generator: NoiseGenerator::with_seed(NoiseType::White, rng.u64(..)),
                filter: BiquadFilter::lowpass(4500.0, sample_rate),
                gain: 0.5,
            },
            AmbienceKind::Forest => Bed::Noise {
                generator: NoiseGenerator::with_seed(NoiseType::Brown, rng.u64(..)),
                filter: BiquadFilter::lowpass(900.0, sample_rate),
                gain: 0.6,
            },
            AmbienceKind::Drone => {
                let mut stack = Vec::new();
                for detune in [-7.0, 0.0, 7.0] {
                    let mut osc =
                        Oscillator::with_frequency(Waveform::Sine, 110.0, sample_rate);
                    osc.detune = detune;
                    stack.push(osc);
                }
                // One octave up for a little shimmer.
                stack.push(Oscillator::with_frequency(Waveform::Sine, 220.0, sample_rate));
                Bed::Oscillators {
                    stack,
                    lfo: Oscillator::with_frequency(Waveform::Sine, 0.08, sample_rate),
                    gain: 0.45,
                }
            }
        };

        let (min_interval, max_interval) = match kind {
            AmbienceKind::Rain => (0.04, 0.25),
            AmbienceKind::Forest => (1.5, 6.0),
            AmbienceKind::Drone => (4.0, 10.0),
        };
        let spawner = TransientSpawner::new(min_interval, max_interval, sample_rate, &mut rng);

        AmbienceLayer {
            kind,
            sample_rate,
            rng,
            bed,
            spawner,
            transients: Vec::with_capacity(MAX_TRANSIENTS),
        }
    }

    pub fn kind(&self) -> AmbienceKind {
        self.kind
    }

    fn spawn_transient(&mut self) -> TransientVoice {
        let rng = &mut self.rng;
        match self.kind {
            // A drop: short downward blip.
            AmbienceKind::Rain => {
                let f0 = 1200.0 + rng.f64() * 1800.0;
                TransientVoice::new(
                    Waveform::Sine,
                    f0,
                    f0 * 0.5,
                    0.001,
                    0.03 + rng.f64() * 0.06,
                    0.10 + rng.f64() * 0.15,
                    self.sample_rate,
                )
            }
            // A chirp: quick upward glide.
            AmbienceKind::Forest => {
                let f0 = 2000.0 + rng.f64() * 1500.0;
                TransientVoice::new(
                    Waveform::Sine,
                    f0,
                    f0 + 400.0 + rng.f64() * 500.0,
                    0.01,
                    0.08 + rng.f64() * 0.10,
                    0.08 + rng.f64() * 0.10,
                    self.sample_rate,
                )
            }
            // A swell: slow overtone rising out of the stack.
            AmbienceKind::Drone => {
                let f0 = 220.0 + rng.f64() * 220.0;
                TransientVoice::new(
                    Waveform::Sine,
                    f0,
                    f0 * 1.02,
                    0.8,
                    1.0 + rng.f64() * 1.5,
                    0.06 + rng.f64() * 0.04,
                    self.sample_rate,
                )
            }
        }
    }

    /// Next mono sample: bed plus every live transient.
    pub fn next_sample(&mut self) -> f64 {
        if self.spawner.tick(&mut self.rng) && self.transients.len() < MAX_TRANSIENTS {
            let voice = self.spawn_transient();
            self.transients.push(voice);
        }

        let mut sample = self.bed.next_sample();
        for voice in self.transients.iter_mut() {
            sample += voice.next_sample();
        }
        self.transients.retain(|voice| !voice.is_finished());
        sample
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

#[cfg(test)]
mod tests {
    use super::*;

    fn render(layer: &mut AmbienceLayer, seconds: f64, sample_rate: f64) -> Vec<f64> {
        (0..(seconds * sample_rate) as usize)
            .map(|_| layer.next_sample())
            .collect()
    }

    #[test]
    fn spawner_fires_within_its_interval() {
        let mut rng = fastrand::Rng::with_seed(5);
        let mut spawner = TransientSpawner::new(0.1, 0.2, 1000.0, &mut rng);
        let mut fired_at = Vec::new();
        for i in 0..2000u64 {
            if spawner.tick(&mut rng) {
                fired_at.push(i);
            }
        }
        assert!(!fired_at.is_empty(), "spawner never fired in 2 seconds");
        for w in fired_at.windows(2) {
            let gap = w[1] - w[0];
            assert!(
                (100..=201).contains(&gap),
                "inter-arrival gap {gap} outside [100, 201] samples"
            );
        }
    }

    #[test]
    fn rain_produces_audio_and_stays_bounded() {
        let mut layer = AmbienceLayer::with_seed(AmbienceKind::Rain, 8000.0, 11);
        let out = render(&mut layer, 2.0, 8000.0);
        let peak = out.iter().fold(0.0_f64, |m, &s| m.max(s.abs()));
        assert!(peak > 0.01, "rain should be audible, peak {peak}");
        assert!(peak < 3.0, "rain peak unreasonably hot: {peak}");
    }

    #[test]
    fn transient_count_stays_capped() {
        // Force a dense spawner by using the rain preset for a while.
        let mut layer = AmbienceLayer::with_seed(AmbienceKind::Rain, 8000.0, 3);
        for _ in 0..8000 * 4 {
            layer.next_sample();
            assert!(
                layer.transients.len() <= MAX_TRANSIENTS,
                "transient cap exceeded: {}",
                layer.transients.len()
            );
        }
    }

    #[test]
    fn transient_voice_finishes_on_its_own() {
        let mut voice =
            TransientVoice::new(Waveform::Sine, 1000.0, 500.0, 0.001, 0.02, 0.2, 8000.0);
        for _ in 0..8000 {
            voice.next_sample();
        }
        assert!(voice.is_finished(), "one-shot transient should have ended");
    }

    #[test]
    fn drone_bed_is_continuous() {
        let mut layer = AmbienceLayer::with_seed(AmbienceKind::Drone, 8000.0, 7);
        let out = render(&mut layer, 1.0, 8000.0);
        // A drone has no silent stretches: check RMS over quarters.
        for (i, chunk) in out.chunks(2000).enumerate() {
            let rms: f64 =
                (chunk.iter().map(|s| s * s).sum::<f64>() / chunk.len() as f64).sqrt();
            assert!(rms > 0.01, "drone went quiet in quarter {i}: rms {rms}");
        }
    }

    #[test]
    fn seeded_layers_are_deterministic() {
        let mut a = AmbienceLayer::with_seed(AmbienceKind::Forest, 8000.0, 99);
        let mut b = AmbienceLayer::with_seed(AmbienceKind::Forest, 8000.0, 99);
        for _ in 0..8000 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }
}
