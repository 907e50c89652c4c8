//! Session engine — the orchestrator the host drives.
//!
//! Owns the tone transport, the generator layers and the bus mixer, and
//! exposes the full command surface: timeline updates, transport control,
//! settings application, previews, and the per-tick snapshot. The engine
//! starts suspended and ignores transport commands until the host calls
//! `resume()` after a user gesture; a suspended engine renders silence.

use crate::dsp::ambience::{AmbienceKind, AmbienceLayer};
use crate::dsp::engine::{LoopMode, ToneEngine, TransportSnapshot};
use crate::dsp::mixer::{BusMixer, Buses};
use crate::dsp::noise::{NoiseLayer, NoiseType};
use crate::dsp::pad::{AmbientPad, PadKind};
use crate::model::{
    AmbienceSettings, AmbientPadSettings, EffectsTargets, NoiseSettings, Section, Session,
    TimelineClip, TimelineTrack, ToneMode,
};
use crate::schedule;

pub struct SessionEngine {
    sample_rate: f64,
    suspended: bool,
    tone: ToneEngine,
    mixer: BusMixer,
    buses: Buses,

    sections: Vec<Section>,
    tracks: Vec<TimelineTrack>,
    clips: Vec<TimelineClip>,

    effects: EffectsTargets,
    noise_settings: NoiseSettings,
    ambience_settings: AmbienceSettings,
    pad_settings: AmbientPadSettings,

    noise_main: Option<NoiseLayer>,
    ambience_main: Option<AmbienceLayer>,
    pad_main: Option<AmbientPad>,

    noise_preview: Option<NoiseLayer>,
    ambience_preview: Option<AmbienceLayer>,
    pad_preview: Option<AmbientPad>,
}

impl SessionEngine {
    pub fn new(sample_rate: f64) -> Self {
        SessionEngine {
            sample_rate,
            suspended: true,
            tone: ToneEngine::new(sample_rate, ToneMode::default()),
            mixer: BusMixer::new(sample_rate),
            buses: Buses::new(0),
            sections: Vec::new(),
            tracks: Vec::new(),
            clips: Vec::new(),
            effects: EffectsTargets::default(),
            noise_settings: NoiseSettings::default(),
            ambience_settings: AmbienceSettings::default(),
            pad_settings: AmbientPadSettings::default(),
            noise_main: None,
            ambience_main: None,
            pad_main: None,
            noise_preview: None,
            ambience_preview: None,
            pad_preview: None,
        }
    }

    /// Build an engine preloaded from a complete session record, settings
    /// applied and timeline scheduled. Still suspended.
    pub fn from_session(session: &Session, sample_rate: f64) -> Self {
        let mut engine = SessionEngine::new(sample_rate);
        engine.set_mode(session.mode);
        engine.set_timeline(
            session.sections.clone(),
            session.tracks.clone(),
            session.clips.clone(),
        );
        engine.apply_settings(
            session.effects,
            session.noise,
            session.ambience,
            session.ambient_pad,
        );
        engine
    }

    /// Mark the clock runnable. Returns true if this call unblocked the
    /// engine, false if it was already running.
    pub fn resume(&mut self) -> bool {
        let was_suspended = self.suspended;
        self.suspended = false;
        was_suspended
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn gate(&self, command: &str) -> bool {
        if self.suspended {
            log::warn!("{command} ignored: engine is suspended until resume()");
        }
        self.suspended
    }

    // ── Timeline ─────────────────────────────────────────────────

    /// Replace the timeline records and reschedule. Structural edits
    /// (clip moves, track solo/mute) come through here.
    pub fn set_timeline(
        &mut self,
        sections: Vec<Section>,
        tracks: Vec<TimelineTrack>,
        clips: Vec<TimelineClip>,
    ) {
        self.sections = sections;
        self.tracks = tracks;
        self.clips = clips;
        let events = schedule::schedule(&self.clips, &self.tracks, &self.sections);
        self.tone.update_schedule(events);
    }

    /// Live section parameter edits: gains retarget, ramps reschedule,
    /// nothing restarts.
    pub fn update_sections(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        self.tone.update_sections(&self.sections);
    }

    /// Live clip parameter edits (waveform swaps). Clip placement changes
    /// go through `set_timeline` instead.
    pub fn update_clips(&mut self, clips: Vec<TimelineClip>) {
        self.clips = clips;
        self.tone.update_clips(&self.clips);
    }

    pub fn total_duration(&self) -> f64 {
        self.tone.total_duration()
    }

    // ── Transport ────────────────────────────────────────────────

    pub fn play(&mut self, from_time: f64) {
        if self.gate("play") {
            return;
        }
        self.tone.play(from_time);
    }

    pub fn pause(&mut self) {
        if self.gate("pause") {
            return;
        }
        self.tone.pause();
    }

    pub fn stop(&mut self) {
        if self.gate("stop") {
            return;
        }
        self.tone.stop();
        self.mixer.reset();
    }

    pub fn seek_to(&mut self, time: f64) {
        if self.gate("seek_to") {
            return;
        }
        self.tone.seek_to(time);
    }

    /// Audition a section by index on the test lane.
    pub fn test_section(&mut self, section_index: usize) {
        if self.gate("test_section") {
            return;
        }
        match self.sections.get(section_index) {
            Some(section) => {
                let section = section.clone();
                self.tone.test_section(&section, section_index);
            }
            None => log::warn!("test_section ignored: no section at index {section_index}"),
        }
    }

    pub fn stop_test(&mut self) {
        if self.gate("stop_test") {
            return;
        }
        self.tone.stop_test();
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.tone.set_loop_mode(mode);
    }

    pub fn cycle_loop_mode(&mut self) -> LoopMode {
        self.tone.cycle_loop_mode()
    }

    pub fn set_mode(&mut self, mode: ToneMode) {
        self.tone.set_mode(mode);
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.tone.snapshot()
    }

    // ── Settings ─────────────────────────────────────────────────

    /// Apply the latest settings snapshots. Idempotent; generator layers
    /// are created, retyped or dropped to match.
    pub fn apply_settings(
        &mut self,
        effects: EffectsTargets,
        noise: NoiseSettings,
        ambience: AmbienceSettings,
        pad: AmbientPadSettings,
    ) {
        self.effects = effects;
        self.noise_settings = noise;
        self.ambience_settings = ambience;
        self.pad_settings = pad;
        self.sync_generators();
    }

    fn sync_generators(&mut self) {
        let noise = &self.noise_settings;
        self.noise_main = match (noise.enabled, self.noise_main.take()) {
            (true, Some(layer)) if layer.kind() == noise.kind => Some(layer),
            (true, _) => Some(NoiseLayer::new(noise.kind, self.sample_rate)),
            (false, _) => None,
        };

        let ambience = &self.ambience_settings;
        self.ambience_main = match (ambience.enabled, self.ambience_main.take()) {
            (true, Some(layer)) if layer.kind() == ambience.kind => Some(layer),
            (true, _) => Some(AmbienceLayer::new(ambience.kind, self.sample_rate)),
            (false, _) => None,
        };

        let pad = &self.pad_settings;
        self.pad_main = match (pad.enabled, self.pad_main.take()) {
            (true, Some(layer)) if layer.kind() == pad.kind => Some(layer),
            (true, _) => Some(AmbientPad::new(pad.kind, self.sample_rate)),
            (false, _) => None,
        };

        // A live preview keeps its bus open even when the main layer is
        // disabled, so auditions are always audible.
        let mut noise = self.noise_settings;
        noise.enabled = noise.enabled || self.noise_preview.is_some();
        let mut ambience = self.ambience_settings;
        ambience.enabled = ambience.enabled || self.ambience_preview.is_some();
        let mut pad = self.pad_settings;
        pad.enabled = pad.enabled || self.pad_preview.is_some();
        self.mixer.apply_settings(&self.effects, &noise, &ambience, &pad);
    }

    // ── Previews ─────────────────────────────────────────────────

    pub fn preview_noise(&mut self, kind: NoiseType) {
        self.noise_preview = Some(NoiseLayer::new(kind, self.sample_rate));
        self.sync_generators();
    }

    pub fn stop_noise_preview(&mut self) {
        self.noise_preview = None;
        self.sync_generators();
    }

    pub fn preview_ambience(&mut self, kind: AmbienceKind) {
        self.ambience_preview = Some(AmbienceLayer::new(kind, self.sample_rate));
        self.sync_generators();
    }

    pub fn stop_ambience_preview(&mut self) {
        self.ambience_preview = None;
        self.sync_generators();
    }

    pub fn preview_pad(&mut self, kind: PadKind) {
        self.pad_preview = Some(AmbientPad::new(kind, self.sample_rate));
        self.sync_generators();
    }

    pub fn stop_pad_preview(&mut self) {
        self.pad_preview = None;
        self.sync_generators();
    }

    // ── Rendering ────────────────────────────────────────────────

    /// Render one stereo block. A suspended engine writes silence.
    pub fn render(&mut self, out_l: &mut [f64], out_r: &mut [f64]) {
        let block = out_l.len().min(out_r.len());
        if self.suspended {
            out_l[..block].fill(0.0);
            out_r[..block].fill(0.0);
            return;
        }
        if self.buses.len() != block {
            self.buses = Buses::new(block);
        }
        self.buses.clear();

        self.tone
            .render(&mut self.buses.tone_l, &mut self.buses.tone_r);
        if let Some(layer) = &mut self.noise_main {
            layer.render_into(&mut self.buses.noise, 1.0);
        }
        if let Some(layer) = &mut self.noise_preview {
            layer.render_into(&mut self.buses.noise, 1.0);
        }
        if let Some(layer) = &mut self.ambience_main {
            layer.render_into(&mut self.buses.ambience, 1.0);
        }
        if let Some(layer) = &mut self.ambience_preview {
            layer.render_into(&mut self.buses.ambience, 1.0);
        }
        if let Some(layer) = &mut self.pad_main {
            layer.render_into(&mut self.buses.pad, 1.0);
        }
        if let Some(layer) = &mut self.pad_preview {
            layer.render_into(&mut self.buses.pad, 1.0);
        }

        self.mixer.mix(&self.buses, out_l, out_r);
    }
}
