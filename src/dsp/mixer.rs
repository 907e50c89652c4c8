//! Bus mixer — fixed topology, built once and reconfigured in place.
//!
//! Four input buses (tone, noise, ambience, pad) sum into one stereo
//! signal. The sum splits into a dry path and a reverb send; dry and wet
//! recombine, pass through one shared lowpass, and land in a soft clipper.
//! Disabling the lowpass snaps its cutoff to Nyquist in a single set —
//! at Nyquist the filter passes everything, and there is no disconnect
//! click. Auto-pan applies to the noise bus only; its LFO exists only
//! while the effect is enabled.

use crate::dsp::envelope::Smoothed;
use crate::dsp::filter::BiquadFilter;
use crate::dsp::pan::{AutoPanLfo, equal_power_gains};
use crate::dsp::reverb::ConvolutionReverb;
use crate::model::{AmbienceSettings, AmbientPadSettings, EffectsTargets, NoiseSettings};

/// Seconds for a bus gain edit to settle (click guard).
const GAIN_RAMP: f64 = 0.03;

/// The per-block input buses. Generators write into these at unit gain;
/// the mixer owns all level and placement decisions.
#[derive(Debug, Clone)]
pub struct Buses {
    pub tone_l: Vec<f64>,
    pub tone_r: Vec<f64>,
    pub noise: Vec<f64>,
    pub ambience: Vec<f64>,
    pub pad: Vec<f64>,
}

impl Buses {
    pub fn new(block_len: usize) -> Self {
        Buses {
            tone_l: vec![0.0; block_len],
            tone_r: vec![0.0; block_len],
            noise: vec![0.0; block_len],
            ambience: vec![0.0; block_len],
            pad: vec![0.0; block_len],
        }
    }

    pub fn len(&self) -> usize {
        self.tone_l.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tone_l.is_empty()
    }

    pub fn clear(&mut self) {
        self.tone_l.fill(0.0);
        self.tone_r.fill(0.0);
        self.noise.fill(0.0);
        self.ambience.fill(0.0);
        self.pad.fill(0.0);
    }
}

/// The shared output stage.
pub struct BusMixer {
    noise_gain: Smoothed,
    ambience_gain: Smoothed,
    pad_gain: Smoothed,
    reverb_send: Smoothed,
    auto_pan: Option<AutoPanLfo>,
    reverb: ConvolutionReverb,
    lowpass_l: BiquadFilter,
    lowpass_r: BiquadFilter,
    sample_rate: f64,
}

impl BusMixer {
    pub fn new(sample_rate: f64) -> Self {
        let mut mixer = BusMixer {
            noise_gain: Smoothed::new(0.0, GAIN_RAMP, sample_rate),
            ambience_gain: Smoothed::new(0.0, GAIN_RAMP, sample_rate),
            pad_gain: Smoothed::new(0.0, GAIN_RAMP, sample_rate),
            reverb_send: Smoothed::new(0.0, GAIN_RAMP, sample_rate),
            auto_pan: None,
            reverb: ConvolutionReverb::hall(sample_rate),
            lowpass_l: BiquadFilter::lowpass(1000.0, sample_rate),
            lowpass_r: BiquadFilter::lowpass(1000.0, sample_rate),
            sample_rate,
        };
        // Bypass position until settings say otherwise.
        let nyquist = mixer.lowpass_l.nyquist();
        mixer.lowpass_l.set_frequency(nyquist);
        mixer.lowpass_r.set_frequency(nyquist);
        mixer
    }

    /// Reconfigure from the latest settings snapshots. Safe to call
    /// redundantly on every apply cycle; every path is a plain retarget.
    /// Of the per-target effects map, this topology routes the song
    /// target's reverb and lowpass and the noise target's autoPan.
    pub fn apply_settings(
        &mut self,
        effects: &EffectsTargets,
        noise: &NoiseSettings,
        ambience: &AmbienceSettings,
        pad: &AmbientPadSettings,
    ) {
        self.noise_gain
            .set_target(if noise.enabled { noise.volume } else { 0.0 });
        self.ambience_gain
            .set_target(if ambience.enabled { ambience.volume } else { 0.0 });
        self.pad_gain
            .set_target(if pad.enabled { pad.volume } else { 0.0 });

        let reverb = &effects.song.reverb;
        self.reverb_send
            .set_target(if reverb.enabled { reverb.amount } else { 0.0 });

        // Lowpass bypass = cutoff at Nyquist. A single set, never a ramp.
        let lowpass = &effects.song.lowpass;
        let cutoff = if lowpass.enabled {
            lowpass.frequency
        } else {
            self.lowpass_l.nyquist()
        };
        if self.lowpass_l.frequency != cutoff {
            self.lowpass_l.set_frequency(cutoff);
            self.lowpass_r.set_frequency(cutoff);
        }

        // The pan LFO lives exactly as long as the effect is enabled;
        // rate/depth edits while enabled apply live.
        let auto_pan = &effects.noise.auto_pan;
        if auto_pan.enabled {
            match &mut self.auto_pan {
                Some(lfo) => lfo.set_params(auto_pan.rate, auto_pan.depth),
                None => {
                    self.auto_pan =
                        Some(AutoPanLfo::new(auto_pan.rate, auto_pan.depth, self.sample_rate));
                }
            }
        } else {
            self.auto_pan = None;
        }
    }

    /// Render one block of input buses into the stereo output.
    pub fn mix(&mut self, buses: &Buses, out_l: &mut [f64], out_r: &mut [f64]) {
        // Center placement for the mono ambience/pad buses.
        let (center_l, center_r) = equal_power_gains(0.0);

        for i in 0..buses.len().min(out_l.len()) {
            let noise_gain = self.noise_gain.next_sample();
            let ambience_gain = self.ambience_gain.next_sample();
            let pad_gain = self.pad_gain.next_sample();

            let pan = match &mut self.auto_pan {
                Some(lfo) => lfo.next_pan(),
                None => 0.0,
            };
            let (noise_l, noise_r) = equal_power_gains(pan);

            let mono = buses.ambience[i] * ambience_gain + buses.pad[i] * pad_gain;
            let sum_l =
                buses.tone_l[i] + buses.noise[i] * noise_gain * noise_l + mono * center_l;
            let sum_r =
                buses.tone_r[i] + buses.noise[i] * noise_gain * noise_r + mono * center_r;

            let send = self.reverb_send.next_sample();
            let (wet_l, wet_r) = self
                .reverb
                .process((sum_l * send) as f32, (sum_r * send) as f32);

            let fx_l = self.lowpass_l.process(sum_l + wet_l as f64);
            let fx_r = self.lowpass_r.process(sum_r + wet_r as f64);

            out_l[i] = fx_l.tanh();
            out_r[i] = fx_r.tanh();
        }
    }

    /// Drop all time-varying state (reverb tail, filter memory). Gains and
    /// settings survive; this is a transport stop, not a teardown.
    pub fn reset(&mut self) {
        self.reverb.clear();
        self.lowpass_l.reset();
        self.lowpass_r.reset();
    }
}
