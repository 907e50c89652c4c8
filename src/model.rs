//! Data model — collaborator-owned records and settings snapshots.
//!
//! These records are owned and mutated by the host (editor UI, persistence
//! layer); the engine only ever reads them. Field names serialize in
//! camelCase so they round-trip with the JS side unchanged.

use serde::{Deserialize, Serialize};

use crate::dsp::ambience::AmbienceKind;
use crate::dsp::noise::NoiseType;
use crate::dsp::pad::PadKind;

/// Carrier frequency bounds in Hz.
pub const CARRIER_RANGE: (f64, f64) = (20.0, 900.0);
/// Beat frequency bounds in Hz.
pub const BEAT_RANGE: (f64, f64) = (0.5, 100.0);

/// How the beat frequency is presented to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneMode {
    /// Two tones at `carrier ∓ beat/2`, one per stereo channel.
    Binaural,
    /// One carrier amplitude-modulated at the beat rate.
    Isochronic,
}

impl Default for ToneMode {
    fn default() -> Self {
        ToneMode::Binaural
    }
}

/// A named frequency program: carrier/beat pair with optional linear ramps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Section {
    pub id: String,
    pub name: String,
    /// Duration in seconds. Must be > 0 to produce audio.
    pub duration: f64,
    /// Starting carrier frequency in Hz.
    pub carrier: f64,
    /// Ramp target for the carrier, if any.
    pub end_carrier: Option<f64>,
    /// Starting beat frequency in Hz.
    pub beat: f64,
    /// Ramp target for the beat, if any.
    pub end_beat: Option<f64>,
    /// Explicit ramp switch. When unset, the presence of either end value
    /// enables the ramp (legacy records predate the flag).
    pub ramp_enabled: Option<bool>,
    /// Section gain [0, 1].
    pub volume: f64,
    pub muted: bool,
}

impl Default for Section {
    fn default() -> Self {
        Section {
            id: String::new(),
            name: String::new(),
            duration: 60.0,
            carrier: 200.0,
            end_carrier: None,
            beat: 10.0,
            end_beat: None,
            ramp_enabled: None,
            volume: 1.0,
            muted: false,
        }
    }
}

impl Section {
    /// Whether the ramp is effectively enabled (explicit flag, or legacy
    /// end-value presence when the flag is unset).
    pub fn ramp_active(&self) -> bool {
        match self.ramp_enabled {
            Some(flag) => flag,
            None => self.end_carrier.is_some() || self.end_beat.is_some(),
        }
    }

    /// Carrier ramp target, clamped to the entrainment range; falls back
    /// to the start value.
    pub fn carrier_target(&self) -> f64 {
        self.end_carrier
            .unwrap_or(self.carrier)
            .clamp(CARRIER_RANGE.0, CARRIER_RANGE.1)
    }

    /// Beat ramp target, clamped to the entrainment range; falls back to
    /// the start value.
    pub fn beat_target(&self) -> f64 {
        self.end_beat
            .unwrap_or(self.beat)
            .clamp(BEAT_RANGE.0, BEAT_RANGE.1)
    }

    /// Instantaneous carrier at `progress` ∈ [0, 1] through the section,
    /// clamped to the entrainment range. Holds the start value when the
    /// ramp is inactive.
    pub fn carrier_at(&self, progress: f64) -> f64 {
        let hz = if self.ramp_active() {
            lerp(self.carrier, self.carrier_target(), progress.clamp(0.0, 1.0))
        } else {
            self.carrier
        };
        hz.clamp(CARRIER_RANGE.0, CARRIER_RANGE.1)
    }

    /// Instantaneous beat at `progress` ∈ [0, 1] through the section,
    /// clamped to the entrainment range.
    pub fn beat_at(&self, progress: f64) -> f64 {
        let hz = if self.ramp_active() {
            lerp(self.beat, self.beat_target(), progress.clamp(0.0, 1.0))
        } else {
            self.beat
        };
        hz.clamp(BEAT_RANGE.0, BEAT_RANGE.1)
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// A timeline lane. Holds mix state only, never audio parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineTrack {
    pub id: String,
    pub name: String,
    pub color: String,
    pub muted: bool,
    pub solo: bool,
    pub volume: f64,
}

impl Default for TimelineTrack {
    fn default() -> Self {
        TimelineTrack {
            id: String::new(),
            name: String::new(),
            color: String::new(),
            muted: false,
            solo: false,
            volume: 1.0,
        }
    }
}

/// A placement of a Section on a Track's timeline. Several clips may
/// reference the same Section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineClip {
    pub id: String,
    pub section_id: String,
    pub track_id: String,
    /// Placement start in seconds, >= 0.
    pub start_time: f64,
    /// Placement duration in seconds, > 0.
    pub duration: f64,
    pub muted: bool,
    /// Oscillator waveform name: "sine", "triangle", "sawtooth", "square".
    pub waveform: String,
}

impl Default for TimelineClip {
    fn default() -> Self {
        TimelineClip {
            id: String::new(),
            section_id: String::new(),
            track_id: String::new(),
            start_time: 0.0,
            duration: 60.0,
            muted: false,
            waveform: "sine".to_string(),
        }
    }
}

// ── Settings snapshots ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReverbSettings {
    pub enabled: bool,
    /// Send level [0, 1].
    pub amount: f64,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        ReverbSettings {
            enabled: false,
            amount: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LowpassSettings {
    pub enabled: bool,
    /// Cutoff in Hz while enabled.
    pub frequency: f64,
}

impl Default for LowpassSettings {
    fn default() -> Self {
        LowpassSettings {
            enabled: false,
            frequency: 2000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoPanSettings {
    pub enabled: bool,
    /// LFO rate in Hz.
    pub rate: f64,
    /// Sweep depth [0, 1]: 0 = centered, 1 = full left/right.
    pub depth: f64,
}

impl Default for AutoPanSettings {
    fn default() -> Self {
        AutoPanSettings {
            enabled: false,
            rate: 0.1,
            depth: 0.8,
        }
    }
}

/// Reserved: present in the settings schema but not routed into the mixer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Audio3dSettings {
    pub enabled: bool,
    pub rate: f64,
    pub depth: f64,
}

/// Reserved: present in the settings schema but not routed into the mixer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeshiftSettings {
    pub enabled: bool,
    pub amount: f64,
}

/// One target's effects bundle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectsSettings {
    pub reverb: ReverbSettings,
    pub lowpass: LowpassSettings,
    pub auto_pan: AutoPanSettings,
    pub audio3d: Audio3dSettings,
    pub timeshift: TimeshiftSettings,
}

/// The collaborator's per-target effects map. The bus topology routes the
/// song target's reverb and lowpass (shared output stage) and the noise
/// target's autoPan (noise bus); the other records round-trip untouched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectsTargets {
    pub song: EffectsSettings,
    pub soundscape: EffectsSettings,
    pub noise: EffectsSettings,
    pub ambient_pad: EffectsSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoiseSettings {
    #[serde(rename = "type")]
    pub kind: NoiseType,
    pub volume: f64,
    pub enabled: bool,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        NoiseSettings {
            kind: NoiseType::White,
            volume: 0.5,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmbienceSettings {
    #[serde(rename = "type")]
    pub kind: AmbienceKind,
    pub volume: f64,
    pub enabled: bool,
}

impl Default for AmbienceSettings {
    fn default() -> Self {
        AmbienceSettings {
            kind: AmbienceKind::Rain,
            volume: 0.5,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmbientPadSettings {
    #[serde(rename = "type")]
    pub kind: PadKind,
    pub volume: f64,
    pub enabled: bool,
}

impl Default for AmbientPadSettings {
    fn default() -> Self {
        AmbientPadSettings {
            kind: PadKind::Soothing,
            volume: 0.4,
            enabled: false,
        }
    }
}

/// Everything the collaborator feeds across the boundary in one record:
/// the timeline plus the latest settings snapshots. This is the JSON
/// surface of `schedule_session` and `render_session_wav`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub sections: Vec<Section>,
    pub tracks: Vec<TimelineTrack>,
    pub clips: Vec<TimelineClip>,
    pub mode: ToneMode,
    pub effects: EffectsTargets,
    pub noise: NoiseSettings,
    pub ambience: AmbienceSettings,
    pub ambient_pad: AmbientPadSettings,
}
