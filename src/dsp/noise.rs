//! Noise generators — white, pink, and brown.
//!
//! The noise layer plays a short procedurally filled loop buffer rather than
//! running the generator per sample forever; the loop is long enough (a few
//! seconds) that the seam is inaudible under the bus lowpass.

use serde::{Deserialize, Serialize};

/// Noise color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseType {
    White,
    Pink,
    Brown,
}

/// Seconds of noise in the loop buffer.
const LOOP_SECONDS: f64 = 4.0;
/// Brown noise integration constant: `out = (prev + K·white) / (1 + K)`.
const BROWN_K: f64 = 0.02;
/// Brown noise loses amplitude to the integration; compensate.
const BROWN_MAKEUP: f64 = 3.5;

/// A stateful noise source. Deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    kind: NoiseType,
    rng: fastrand::Rng,
    // Pink: seven leaky integrators (Paul Kellet's filter bank).
    pink: [f64; 7],
    // Brown: previous output before makeup gain.
    brown: f64,
}

impl NoiseGenerator {
    pub fn new(kind: NoiseType) -> Self {
        NoiseGenerator {
            kind,
            rng: fastrand::Rng::new(),
            pink: [0.0; 7],
            brown: 0.0,
        }
    }

    /// Seeded construction for deterministic tests.
    pub fn with_seed(kind: NoiseType, seed: u64) -> Self {
        let mut g = NoiseGenerator::new(kind);
        g.rng = fastrand::Rng::with_seed(seed);
        g
    }

    pub fn kind(&self) -> NoiseType {
        self.kind
    }

    fn white(&mut self) -> f64 {
        self.rng.f64() * 2.0 - 1.0
    }

    /// Generate the next sample in [-1, 1].
    pub fn next_sample(&mut self) -> f64 {
        match self.kind {
            NoiseType::White => self.white(),
            NoiseType::Pink => self.next_pink(),
            NoiseType::Brown => self.next_brown(),
        }
    }

    /// Paul Kellet's seven-state pink noise filter: each state is a leaky
    /// integrator of white noise with a fixed coefficient pair; their sum
    /// approximates a 1/f spectrum. Scaled to roughly unit amplitude.
    fn next_pink(&mut self) -> f64 {
        let white = self.white();
        let p = &mut self.pink;
        p[0] = 0.99886 * p[0] + white * 0.0555179;
        p[1] = 0.99332 * p[1] + white * 0.0750759;
        p[2] = 0.96900 * p[2] + white * 0.1538520;
        p[3] = 0.86650 * p[3] + white * 0.3104856;
        p[4] = 0.55000 * p[4] + white * 0.5329522;
        p[5] = -0.7616 * p[5] - white * 0.0168980;
        let pink = p.iter().sum::<f64>() + white * 0.5362;
        p[6] = white * 0.115926;
        (pink * 0.11).clamp(-1.0, 1.0)
    }

    /// Single-pole leaky integration of white noise, with makeup gain for
    /// the amplitude lost to the integrator.
    fn next_brown(&mut self) -> f64 {
        let white = self.white();
        self.brown = (self.brown + BROWN_K * white) / (1.0 + BROWN_K);
        (self.brown * BROWN_MAKEUP).clamp(-1.0, 1.0)
    }

    /// Fill a buffer in place.
    pub fn fill(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Build the standard loop buffer for this noise color.
    pub fn loop_buffer(&mut self, sample_rate: f64) -> Vec<f64> {
        let mut buffer = vec![0.0; (LOOP_SECONDS * sample_rate) as usize];
        self.fill(&mut buffer);
        buffer
    }
}

/// A looping playback of a generated noise buffer. Mono; the mixer's noise
/// bus handles stereo placement (auto-pan).
#[derive(Debug, Clone)]
pub struct NoiseLayer {
    kind: NoiseType,
    buffer: Vec<f64>,
    position: usize,
}

impl NoiseLayer {
    pub fn new(kind: NoiseType, sample_rate: f64) -> Self {
        let mut generator = NoiseGenerator::new(kind);
        NoiseLayer {
            kind,
            buffer: generator.loop_buffer(sample_rate),
            position: 0,
        }
    }

    pub fn kind(&self) -> NoiseType {
        self.kind
    }

    /// Next looped sample.
    pub fn next_sample(&mut self) -> f64 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        let s = self.buffer[self.position];
        self.position = (self.position + 1) % self.buffer.len();
        s
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
