//! ADSR envelope generator and linear parameter smoothing.
//!
//! Tone voices use short attack/release segments as click guards around
//! their scheduled start/stop; ambience transients run the same envelope as
//! a one-shot (sustain 0) that finishes on its own.

/// Envelope stages.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR Envelope with linear attack/decay/release curves.
///
/// A sustain level of exactly 0 turns the envelope into a one-shot: it
/// finishes at the end of the decay without waiting for `gate_off`.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level [0, 1].
    pub sustain: f64,
    /// Release time in seconds.
    pub release: f64,

    stage: Stage,
    level: f64,
    sample_rate: f64,
    /// Samples remaining in current stage.
    stage_samples: usize,
    stage_counter: usize,
    /// Level at the start of the current stage (for release).
    start_level: f64,
}

impl Envelope {
    pub fn new(sample_rate: f64) -> Self {
        Envelope {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
            stage: Stage::Idle,
            level: 0.0,
            sample_rate,
            stage_samples: 0,
            stage_counter: 0,
            start_level: 0.0,
        }
    }

    /// A one-shot attack/decay envelope for disposable transients.
    pub fn one_shot(attack: f64, decay: f64, sample_rate: f64) -> Self {
        let mut env = Envelope::new(sample_rate);
        env.attack = attack;
        env.decay = decay;
        env.sustain = 0.0;
        env.release = 0.0;
        env
    }

    /// Trigger the envelope (note on).
    pub fn gate_on(&mut self) {
        self.stage = Stage::Attack;
        self.stage_samples = (self.attack * self.sample_rate) as usize;
        self.stage_counter = 0;
        self.start_level = self.level; // retrigger from current level
    }

    /// Release the envelope (note off).
    pub fn gate_off(&mut self) {
        if self.stage == Stage::Idle {
            return;
        }
        self.stage = Stage::Release;
        self.stage_samples = (self.release * self.sample_rate) as usize;
        self.stage_counter = 0;
        self.start_level = self.level;
    }

    /// Generate the next envelope sample [0, 1].
    pub fn next_sample(&mut self) -> f64 {
        match self.stage {
            Stage::Idle => {
                self.level = 0.0;
            }
            Stage::Attack => {
                if self.stage_samples == 0 {
                    self.level = 1.0;
                    self.enter_decay();
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = self.start_level + (1.0 - self.start_level) * t;
                    self.stage_counter += 1;
                    if self.stage_counter >= self.stage_samples {
                        self.level = 1.0;
                        self.enter_decay();
                    }
                }
            }
            Stage::Decay => {
                if self.stage_samples == 0 {
                    self.level = self.sustain;
                    self.end_decay();
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = 1.0 - (1.0 - self.sustain) * t;
                    self.stage_counter += 1;
                    if self.stage_counter >= self.stage_samples {
                        self.level = self.sustain;
                        self.end_decay();
                    }
                }
            }
            Stage::Sustain => {
                self.level = self.sustain;
            }
            Stage::Release => {
                if self.stage_samples == 0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = self.start_level * (1.0 - t);
                    self.stage_counter += 1;
                    if self.stage_counter >= self.stage_samples {
                        self.level = 0.0;
                        self.stage = Stage::Idle;
                    }
                }
            }
        }
        self.level
    }

    /// Returns true if the envelope has finished (idle after release).
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Idle
    }

    fn enter_decay(&mut self) {
        self.stage = Stage::Decay;
        self.stage_samples = (self.decay * self.sample_rate) as usize;
        self.stage_counter = 0;
    }

    fn end_decay(&mut self) {
        // One-shot envelopes are done once the decay lands at zero.
        if self.sustain == 0.0 {
            self.stage = Stage::Idle;
        } else {
            self.stage = Stage::Sustain;
        }
    }
}

/// A linearly smoothed parameter. Live volume and mute edits move through
/// this instead of stepping the gain, so they never click.
#[derive(Debug, Clone)]
pub struct Smoothed {
    current: f64,
    target: f64,
    step: f64,
    ramp_samples: f64,
}

impl Smoothed {
    /// `ramp_seconds` is how long any target change takes to settle.
    pub fn new(value: f64, ramp_seconds: f64, sample_rate: f64) -> Self {
        Smoothed {
            current: value,
            target: value,
            step: 0.0,
            ramp_samples: (ramp_seconds * sample_rate).max(1.0),
        }
    }

    /// Retarget; the value glides there over the configured ramp time.
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
        self.step = (target - self.current) / self.ramp_samples;
    }

    /// Jump immediately, e.g. when (re)building a voice from silence.
    pub fn snap_to(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn value(&self) -> f64 {
        self.current
    }

    /// Advance one sample and return the new value.
    pub fn next_sample(&mut self) -> f64 {
        if self.step != 0.0 {
            self.current += self.step;
            let overshot = (self.step > 0.0 && self.current >= self.target)
                || (self.step < 0.0 && self.current <= self.target);
            if overshot {
                self.current = self.target;
                self.step = 0.0;
            }
        }
        self.current
    }
}
