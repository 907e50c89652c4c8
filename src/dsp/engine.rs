//! Tone transport — turns scheduled events into running voices.
//!
//! The engine is a block renderer: its clock is the sample position, and
//! every event start/stop, frequency ramp and loop decision is expressed in
//! samples. Voices are built on `play`, torn down on `pause`/`stop`, and
//! mutated in place for live edits; only a binaural↔isochronic switch
//! rebuilds the whole set, because the two voice shapes are structurally
//! different.

use serde::Serialize;

use crate::dsp::envelope::Smoothed;
use crate::dsp::filter::BiquadFilter;
use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::model::{Section, TimelineClip, ToneMode};
use crate::schedule::{self, ScheduledEvent};

/// Transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// What happens when the transport reaches the end of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    Off,
    /// Restart from 0 exactly once, then behave as `Off`. The one-shot
    /// flag re-arms whenever playback restarts from 0.
    RepeatOnce,
    Loop,
}

impl LoopMode {
    /// The cycle order the transport button steps through.
    pub fn cycled(self) -> LoopMode {
        match self {
            LoopMode::Off => LoopMode::RepeatOnce,
            LoopMode::RepeatOnce => LoopMode::Loop,
            LoopMode::Loop => LoopMode::Off,
        }
    }
}

/// The per-tick transport report the collaborator polls.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportSnapshot {
    pub state: PlaybackState,
    /// Timeline position in seconds.
    pub current_time: f64,
    /// Index of the earliest active schedule event, if any.
    pub active_index: Option<usize>,
    /// Section index under audition, if a test is running.
    pub test_index: Option<usize>,
}

/// Per-event gain edits settle over this long.
const GAIN_RAMP: f64 = 0.03;
/// Fade applied at each voice's scheduled start and stop.
const EDGE_FADE: f64 = 0.008;
/// Stop sample for the open-ended test voice.
const NEVER: u64 = u64::MAX;
/// Equal-power center placement for mono (isochronic) voices.
const CENTER: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// A linear per-sample parameter ramp with retarget/snap support.
#[derive(Debug, Clone)]
struct ParamRamp {
    value: f64,
    target: f64,
    step: f64,
    remaining: u64,
}

impl ParamRamp {
    fn fixed(value: f64) -> Self {
        ParamRamp {
            value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    fn ramped(start: f64, target: f64, samples: u64) -> Self {
        let samples = samples.max(1);
        ParamRamp {
            value: start,
            target,
            step: (target - start) / samples as f64,
            remaining: samples,
        }
    }

    /// Replace the remaining segment with a fresh ramp from the current
    /// instantaneous value.
    fn retarget(&mut self, target: f64, samples: u64) {
        *self = ParamRamp::ramped(self.value, target, samples);
    }

    fn snap(&mut self, value: f64) {
        *self = ParamRamp::fixed(value);
    }

    fn next(&mut self) -> f64 {
        if self.remaining > 0 {
            self.value += self.step;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.value = self.target;
            }
        }
        self.value
    }
}

/// The mode-specific half of a voice.
#[derive(Debug, Clone)]
enum VoiceKind {
    /// Two oscillators at `carrier ∓ beat/2`, hard-panned left/right.
    Binaural {
        left: Oscillator,
        right: Oscillator,
        filter_left: Option<BiquadFilter>,
        filter_right: Option<BiquadFilter>,
    },
    /// One carrier amplitude-modulated at the beat rate.
    Isochronic {
        carrier: Oscillator,
        lfo: Oscillator,
        filter: Option<BiquadFilter>,
    },
}

impl VoiceKind {
    fn build(mode: ToneMode, waveform: Waveform, carrier: f64, beat: f64, sample_rate: f64) -> Self {
        let filter = |cutoff: Option<f64>| cutoff.map(|hz| BiquadFilter::lowpass(hz, sample_rate));
        match mode {
            ToneMode::Binaural => VoiceKind::Binaural {
                left: Oscillator::with_frequency(waveform, (carrier - beat / 2.0).max(0.0), sample_rate),
                right: Oscillator::with_frequency(waveform, carrier + beat / 2.0, sample_rate),
                filter_left: filter(waveform.taming_cutoff()),
                filter_right: filter(waveform.taming_cutoff()),
            },
            ToneMode::Isochronic => VoiceKind::Isochronic {
                carrier: Oscillator::with_frequency(waveform, carrier, sample_rate),
                lfo: Oscillator::with_frequency(Waveform::Sine, beat, sample_rate),
                filter: filter(waveform.taming_cutoff()),
            },
        }
    }

    fn waveform(&self) -> Waveform {
        match self {
            VoiceKind::Binaural { left, .. } => left.waveform,
            VoiceKind::Isochronic { carrier, .. } => carrier.waveform,
        }
    }

    /// In-place waveform swap; phase keeps running, the taming filter is
    /// rebuilt for the new shape.
    fn set_waveform(&mut self, waveform: Waveform, sample_rate: f64) {
        let filter = |cutoff: Option<f64>| cutoff.map(|hz| BiquadFilter::lowpass(hz, sample_rate));
        match self {
            VoiceKind::Binaural {
                left,
                right,
                filter_left,
                filter_right,
            } => {
                left.set_waveform(waveform);
                right.set_waveform(waveform);
                *filter_left = filter(waveform.taming_cutoff());
                *filter_right = filter(waveform.taming_cutoff());
            }
            VoiceKind::Isochronic {
                carrier, filter: f, ..
            } => {
                carrier.set_waveform(waveform);
                *f = filter(waveform.taming_cutoff());
            }
        }
    }
}

/// One running voice tied to a scheduled event (or to the test lane).
#[derive(Debug, Clone)]
struct EventVoice {
    /// Index into the engine's event list; `usize::MAX` for the test lane.
    event_index: usize,
    start_sample: u64,
    stop_sample: u64,
    carrier: ParamRamp,
    beat: ParamRamp,
    gain: Smoothed,
    kind: VoiceKind,
    fade_samples: f64,
}

impl EventVoice {
    /// Build a voice for `event` as heard from `from_time`. Seeking into a
    /// ramp resumes at the linearly interpolated instantaneous frequency.
    fn for_event(
        event_index: usize,
        event: &ScheduledEvent,
        mode: ToneMode,
        from_time: f64,
        sample_rate: f64,
    ) -> Self {
        let section = &event.section;
        let progress = if event.duration > 0.0 {
            ((from_time - event.start_time).max(0.0) / event.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let carrier_now = section.carrier_at(progress);
        let beat_now = section.beat_at(progress);

        let active_from = event.start_time.max(from_time);
        let remaining = ((event.end_time() - active_from).max(0.0) * sample_rate) as u64;

        let ramp = section.ramp_active();
        let carrier = if ramp {
            ParamRamp::ramped(carrier_now, section.carrier_target(), remaining)
        } else {
            ParamRamp::fixed(carrier_now)
        };
        let beat = if ramp {
            ParamRamp::ramped(beat_now, section.beat_target(), remaining)
        } else {
            ParamRamp::fixed(beat_now)
        };

        let mut gain = Smoothed::new(0.0, GAIN_RAMP, sample_rate);
        gain.snap_to(if section.muted { 0.0 } else { section.volume });

        EventVoice {
            event_index,
            start_sample: (event.start_time * sample_rate) as u64,
            stop_sample: (event.end_time() * sample_rate) as u64,
            carrier: carrier.clone(),
            beat,
            gain,
            kind: VoiceKind::build(
                mode,
                Waveform::parse(&event.waveform),
                carrier.value,
                beat_now,
                sample_rate,
            ),
            fade_samples: EDGE_FADE * sample_rate,
        }
    }

    /// An open-ended audition voice for one section: sentinel stop time,
    /// no ramp (there is no end to ramp toward).
    fn for_test(section: &Section, mode: ToneMode, sample_rate: f64) -> Self {
        let mut gain = Smoothed::new(0.0, GAIN_RAMP, sample_rate);
        gain.snap_to(if section.muted { 0.0 } else { section.volume });
        EventVoice {
            event_index: usize::MAX,
            start_sample: 0,
            stop_sample: NEVER,
            carrier: ParamRamp::fixed(section.carrier_at(0.0)),
            beat: ParamRamp::fixed(section.beat_at(0.0)),
            gain,
            kind: VoiceKind::build(
                mode,
                Waveform::Sine,
                section.carrier_at(0.0),
                section.beat_at(0.0),
                sample_rate,
            ),
            fade_samples: EDGE_FADE * sample_rate,
        }
    }

    fn is_active(&self, pos: u64) -> bool {
        pos >= self.start_sample && pos < self.stop_sample
    }

    /// Short linear fades at the scheduled edges, as a click guard.
    fn edge_gain(&self, pos: u64) -> f64 {
        let since_start = (pos - self.start_sample) as f64;
        let fade_in = (since_start / self.fade_samples).min(1.0);
        let fade_out = if self.stop_sample == NEVER {
            1.0
        } else {
            let until_stop = (self.stop_sample - pos) as f64;
            (until_stop / self.fade_samples).min(1.0)
        };
        fade_in * fade_out
    }

    fn next_frame(&mut self, pos: u64) -> (f64, f64) {
        let carrier_hz = self.carrier.next();
        let beat_hz = self.beat.next();
        let gain = self.gain.next_sample() * self.edge_gain(pos);

        match &mut self.kind {
            VoiceKind::Binaural {
                left,
                right,
                filter_left,
                filter_right,
            } => {
                left.set_frequency((carrier_hz - beat_hz / 2.0).max(0.0));
                right.set_frequency(carrier_hz + beat_hz / 2.0);
                let mut l = left.next_sample();
                let mut r = right.next_sample();
                if let Some(f) = filter_left {
                    l = f.process(l);
                }
                if let Some(f) = filter_right {
                    r = f.process(r);
                }
                (l * gain, r * gain)
            }
            VoiceKind::Isochronic {
                carrier,
                lfo,
                filter,
            } => {
                carrier.set_frequency(carrier_hz);
                lfo.set_frequency(beat_hz);
                let mut s = carrier.next_sample();
                if let Some(f) = filter {
                    s = f.process(s);
                }
                let depth = (lfo.next_sample() + 1.0) * 0.5;
                let s = s * depth * gain * CENTER;
                (s, s)
            }
        }
    }
}

struct TestLane {
    voice: EventVoice,
    section_index: usize,
    section_id: String,
    /// Samples rendered so far on this lane.
    position: u64,
    /// Where the main transport resumes when the test stops, if it was
    /// playing when the test started.
    resume_at: Option<f64>,
}

/// The tone transport.
pub struct ToneEngine {
    sample_rate: f64,
    mode: ToneMode,
    events: Vec<ScheduledEvent>,
    total_samples: u64,
    state: PlaybackState,
    /// Timeline position in samples.
    position: u64,
    loop_mode: LoopMode,
    repeat_once_used: bool,
    voices: Vec<EventVoice>,
    test: Option<TestLane>,
}

impl ToneEngine {
    pub fn new(sample_rate: f64, mode: ToneMode) -> Self {
        ToneEngine {
            sample_rate,
            mode,
            events: Vec::new(),
            total_samples: 0,
            state: PlaybackState::Stopped,
            position: 0,
            loop_mode: LoopMode::Off,
            repeat_once_used: false,
            voices: Vec::new(),
            test: None,
        }
    }

    pub fn mode(&self) -> ToneMode {
        self.mode
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn cycle_loop_mode(&mut self) -> LoopMode {
        self.loop_mode = self.loop_mode.cycled();
        self.loop_mode
    }

    pub fn current_time(&self) -> f64 {
        self.position as f64 / self.sample_rate
    }

    pub fn total_duration(&self) -> f64 {
        schedule::total_duration(&self.events)
    }

    /// Swap in a fresh schedule. While playing, the voice set is rebuilt
    /// at the current position.
    pub fn update_schedule(&mut self, events: Vec<ScheduledEvent>) {
        self.events = events;
        self.total_samples = (self.total_duration() * self.sample_rate) as u64;
        if self.state == PlaybackState::Playing {
            if self.position >= self.total_samples {
                self.stop_transport();
            } else {
                self.rebuild_voices(self.current_time());
            }
        }
    }

    /// Start (or restart) the main transport at `from_time` seconds.
    pub fn play(&mut self, from_time: f64) {
        let total = self.total_duration();
        if total <= 0.0 {
            log::debug!("play ignored: schedule is empty");
            return;
        }
        // The two lanes are mutually exclusive: starting the main
        // transport takes any running audition down with it, resume
        // bookkeeping included.
        self.test = None;
        let from = from_time.clamp(0.0, total);
        if from == 0.0 {
            self.repeat_once_used = false;
        }
        self.position = (from * self.sample_rate) as u64;
        self.total_samples = (total * self.sample_rate) as u64;
        self.rebuild_voices(from);
        self.state = PlaybackState::Playing;
    }

    /// Tear the voices down but keep the position.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.voices.clear();
            self.state = PlaybackState::Paused;
        }
    }

    /// Tear everything down, including any running test, and reset to 0.
    pub fn stop(&mut self) {
        self.voices.clear();
        self.test = None;
        self.position = 0;
        self.repeat_once_used = false;
        self.state = PlaybackState::Stopped;
    }

    pub fn seek_to(&mut self, time: f64) {
        let clamped = time.clamp(0.0, self.total_duration());
        self.position = (clamped * self.sample_rate) as u64;
        if self.state == PlaybackState::Playing {
            self.rebuild_voices(clamped);
        }
    }

    /// Audition one section open-endedly on the independent test lane.
    /// A playing main transport is paused and resumed when the test stops.
    pub fn test_section(&mut self, section: &Section, section_index: usize) {
        // A test replacing a running test inherits its resume bookkeeping.
        let resume_at = match self.test.take() {
            Some(previous) => previous.resume_at,
            None if self.state == PlaybackState::Playing => {
                let at = self.current_time();
                self.pause();
                Some(at)
            }
            None => None,
        };
        self.test = Some(TestLane {
            voice: EventVoice::for_test(section, self.mode, self.sample_rate),
            section_index,
            section_id: section.id.clone(),
            position: 0,
            resume_at,
        });
    }

    /// Stop the audition; resume the main transport if the test paused it.
    pub fn stop_test(&mut self) {
        if let Some(lane) = self.test.take() {
            if let Some(at) = lane.resume_at {
                self.play(at);
            }
        }
    }

    /// Structural rebuild: binaural and isochronic voices are different
    /// shapes, so a mode switch rebuilds every live voice at the current
    /// position.
    pub fn set_mode(&mut self, mode: ToneMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        if self.state == PlaybackState::Playing {
            self.rebuild_voices(self.current_time());
        }
        if let Some(lane) = &mut self.test {
            let kind = VoiceKind::build(
                mode,
                Waveform::Sine,
                lane.voice.carrier.value,
                lane.voice.beat.value,
                self.sample_rate,
            );
            lane.voice.kind = kind;
        }
    }

    /// Live section edits: gain retargets, ramp cancel+reschedule (or snap
    /// when the ramp is off), applied to running voices without a restart.
    /// Event snapshots are refreshed in place so later rebuilds agree.
    pub fn update_sections(&mut self, sections: &[Section]) {
        let position = self.position;
        for event in self.events.iter_mut() {
            if let Some(section) = sections.iter().find(|s| s.id == event.section.id) {
                event.section = section.clone();
            }
        }
        let events = &self.events;
        for voice in self.voices.iter_mut() {
            let Some(event) = events.get(voice.event_index) else {
                continue;
            };
            let section = &event.section;
            voice
                .gain
                .set_target(if section.muted { 0.0 } else { section.volume });
            if position >= voice.stop_sample {
                continue;
            }
            let remaining = voice.stop_sample.saturating_sub(position.max(voice.start_sample));
            if section.ramp_active() {
                voice.carrier.retarget(section.carrier_target(), remaining);
                voice.beat.retarget(section.beat_target(), remaining);
            } else {
                voice.carrier.snap(section.carrier_at(0.0));
                voice.beat.snap(section.beat_at(0.0));
            }
        }
        if let Some(lane) = &mut self.test {
            if let Some(section) = sections.iter().find(|s| s.id == lane.section_id) {
                lane.voice
                    .gain
                    .set_target(if section.muted { 0.0 } else { section.volume });
                lane.voice.carrier.snap(section.carrier_at(0.0));
                lane.voice.beat.snap(section.beat_at(0.0));
            }
        }
    }

    /// Live clip edits: the only per-clip audio parameter is the waveform,
    /// swapped in place on the running oscillators.
    pub fn update_clips(&mut self, clips: &[TimelineClip]) {
        for event in self.events.iter_mut() {
            if let Some(clip) = clips.iter().find(|c| c.id == event.clip_id) {
                event.waveform = clip.waveform.clone();
            }
        }
        let events = &self.events;
        let sample_rate = self.sample_rate;
        for voice in self.voices.iter_mut() {
            let Some(event) = events.get(voice.event_index) else {
                continue;
            };
            let waveform = Waveform::parse(&event.waveform);
            if voice.kind.waveform() != waveform {
                voice.kind.set_waveform(waveform, sample_rate);
            }
        }
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        let active_index = if self.state == PlaybackState::Stopped {
            None
        } else {
            schedule::active_events(&self.events, self.current_time())
                .first()
                .copied()
        };
        TransportSnapshot {
            state: self.state,
            current_time: self.current_time(),
            active_index,
            test_index: self.test.as_ref().map(|lane| lane.section_index),
        }
    }

    /// Render one block, adding into the stereo tone bus. The test lane
    /// renders regardless of main transport state.
    pub fn render(&mut self, out_l: &mut [f64], out_r: &mut [f64]) {
        let block = out_l.len().min(out_r.len());
        for i in 0..block {
            if let Some(lane) = &mut self.test {
                let (l, r) = lane.voice.next_frame(lane.position);
                lane.position += 1;
                out_l[i] += l;
                out_r[i] += r;
            }

            if self.state != PlaybackState::Playing {
                continue;
            }
            let pos = self.position;
            for voice in self.voices.iter_mut() {
                if voice.is_active(pos) {
                    let (l, r) = voice.next_frame(pos);
                    out_l[i] += l;
                    out_r[i] += r;
                }
            }
            self.position += 1;
            if self.position >= self.total_samples {
                self.handle_end_of_schedule();
            }
        }
    }

    fn rebuild_voices(&mut self, from_time: f64) {
        let sample_rate = self.sample_rate;
        let mode = self.mode;
        self.voices = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, event)| event.end_time() > from_time)
            .map(|(i, event)| EventVoice::for_event(i, event, mode, from_time, sample_rate))
            .collect();
    }

    fn handle_end_of_schedule(&mut self) {
        match self.loop_mode {
            LoopMode::Off => self.stop_transport(),
            LoopMode::RepeatOnce => {
                if self.repeat_once_used {
                    self.stop_transport();
                } else {
                    self.repeat_once_used = true;
                    self.restart_from_zero();
                }
            }
            LoopMode::Loop => self.restart_from_zero(),
        }
    }

    fn restart_from_zero(&mut self) {
        self.position = 0;
        self.rebuild_voices(0.0);
    }

    fn stop_transport(&mut self) {
        self.voices.clear();
        self.position = 0;
        self.state = PlaybackState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TimelineTrack, ToneMode};

    const SR: f64 = 1000.0;

    fn section(id: &str, carrier: f64, beat: f64) -> Section {
        let mut s = Section::default();
        s.id = id.to_string();
        s.carrier = carrier;
        s.beat = beat;
        s.duration = 60.0;
        s
    }

    fn one_clip_schedule(section: Section, start: f64, duration: f64) -> Vec<ScheduledEvent> {
        let mut track = TimelineTrack::default();
        track.id = "t1".into();
        let mut clip = TimelineClip::default();
        clip.id = "c1".into();
        clip.section_id = section.id.clone();
        clip.track_id = "t1".into();
        clip.start_time = start;
        clip.duration = duration;
        schedule::schedule(&[clip], &[track], &[section])
    }

    fn engine_with(events: Vec<ScheduledEvent>, mode: ToneMode) -> ToneEngine {
        let mut engine = ToneEngine::new(SR, mode);
        engine.update_schedule(events);
        engine
    }

    fn render_seconds(engine: &mut ToneEngine, seconds: f64) -> (Vec<f64>, Vec<f64>) {
        let n = (seconds * SR) as usize;
        let mut l = vec![0.0; n];
        let mut r = vec![0.0; n];
        engine.render(&mut l, &mut r);
        (l, r)
    }

    #[test]
    fn play_with_empty_schedule_stays_stopped() {
        let mut engine = engine_with(Vec::new(), ToneMode::Binaural);
        engine.play(0.0);
        assert_eq!(engine.snapshot().state, PlaybackState::Stopped);
    }

    #[test]
    fn seek_into_ramp_resumes_at_interpolated_frequency() {
        let mut s = section("s1", 100.0, 10.0);
        s.end_carrier = Some(200.0);
        let events = one_clip_schedule(s, 0.0, 60.0);
        let mut engine = engine_with(events, ToneMode::Binaural);

        engine.play(30.0);
        let carrier = engine.voices[0].carrier.value;
        assert!(
            (carrier - 150.0).abs() < 1e-6,
            "expected 150 Hz halfway through the ramp, got {carrier}"
        );
    }

    #[test]
    fn pause_retains_position_stop_resets_it() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 10.0);
        let mut engine = engine_with(events, ToneMode::Binaural);

        engine.play(0.0);
        render_seconds(&mut engine, 2.0);
        engine.pause();
        let snap = engine.snapshot();
        assert_eq!(snap.state, PlaybackState::Paused);
        assert!((snap.current_time - 2.0).abs() < 0.01, "paused at {}", snap.current_time);

        engine.stop();
        let snap = engine.snapshot();
        assert_eq!(snap.state, PlaybackState::Stopped);
        assert_eq!(snap.current_time, 0.0);
    }

    #[test]
    fn transport_stops_at_end_when_loop_is_off() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 1.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(0.0);
        render_seconds(&mut engine, 1.5);
        assert_eq!(engine.snapshot().state, PlaybackState::Stopped);
    }

    #[test]
    fn repeat_once_restarts_exactly_once() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 1.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.set_loop_mode(LoopMode::RepeatOnce);
        engine.play(0.0);

        // After 1.5 passes it should still be playing (one restart)...
        render_seconds(&mut engine, 1.5);
        assert_eq!(engine.snapshot().state, PlaybackState::Playing);
        // ...and after the second pass completes it stops for good.
        render_seconds(&mut engine, 1.0);
        assert_eq!(engine.snapshot().state, PlaybackState::Stopped);
    }

    #[test]
    fn repeat_once_rearms_when_playback_restarts_from_zero() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 1.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.set_loop_mode(LoopMode::RepeatOnce);

        engine.play(0.0);
        render_seconds(&mut engine, 2.5);
        assert_eq!(engine.snapshot().state, PlaybackState::Stopped);

        // Fresh start from 0: the one-shot flag must be re-armed.
        engine.play(0.0);
        render_seconds(&mut engine, 1.5);
        assert_eq!(engine.snapshot().state, PlaybackState::Playing);
    }

    #[test]
    fn loop_mode_keeps_playing_indefinitely() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 0.5);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.set_loop_mode(LoopMode::Loop);
        engine.play(0.0);
        render_seconds(&mut engine, 5.0);
        assert_eq!(engine.snapshot().state, PlaybackState::Playing);
    }

    #[test]
    fn loop_mode_cycles_in_order() {
        let mut engine = engine_with(Vec::new(), ToneMode::Binaural);
        assert_eq!(engine.loop_mode(), LoopMode::Off);
        assert_eq!(engine.cycle_loop_mode(), LoopMode::RepeatOnce);
        assert_eq!(engine.cycle_loop_mode(), LoopMode::Loop);
        assert_eq!(engine.cycle_loop_mode(), LoopMode::Off);
    }

    #[test]
    fn binaural_channels_differ() {
        let events = one_clip_schedule(section("s1", 200.0, 12.0), 0.0, 10.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(0.0);
        let (l, r) = render_seconds(&mut engine, 1.0);
        // 194 Hz left vs 206 Hz right: the channels must not be identical.
        let diff: f64 = l.iter().zip(&r).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff > 1.0, "binaural channels look identical, diff {diff}");
    }

    #[test]
    fn isochronic_output_pulses_at_the_beat_rate() {
        let events = one_clip_schedule(section("s1", 100.0, 4.0), 0.0, 10.0);
        let mut engine = engine_with(events, ToneMode::Isochronic);
        engine.play(0.0);
        let (l, _r) = render_seconds(&mut engine, 2.0);

        // Peak level per 1/8 s window: a 4 Hz AM makes windows alternate
        // between loud and near-silent.
        let peaks: Vec<f64> = l
            .chunks(125)
            .map(|w| w.iter().fold(0.0_f64, |m, &s| m.max(s.abs())))
            .collect();
        let loud = peaks.iter().cloned().fold(0.0_f64, f64::max);
        let quiet = peaks.iter().cloned().fold(f64::MAX, f64::min);
        assert!(
            quiet < loud * 0.5,
            "expected pulsing output, peaks ranged [{quiet}, {loud}]"
        );
    }

    #[test]
    fn test_section_pauses_main_and_resumes_on_stop() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 30.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(0.0);
        render_seconds(&mut engine, 2.0);

        engine.test_section(&section("s2", 300.0, 5.0), 1);
        let snap = engine.snapshot();
        assert_eq!(snap.state, PlaybackState::Paused, "test must pause main");
        assert_eq!(snap.test_index, Some(1));

        // The test lane keeps sounding while main is paused.
        let (l, _r) = render_seconds(&mut engine, 0.5);
        assert!(l.iter().any(|&s| s.abs() > 0.01), "test lane is silent");

        engine.stop_test();
        let snap = engine.snapshot();
        assert_eq!(snap.state, PlaybackState::Playing, "main must resume");
        assert!((snap.current_time - 2.0).abs() < 0.05, "resume position lost");
        assert_eq!(snap.test_index, None);
    }

    #[test]
    fn play_while_testing_stops_the_test_lane() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 30.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(0.0);
        render_seconds(&mut engine, 2.0);
        engine.test_section(&section("s2", 300.0, 5.0), 1);

        engine.play(5.0);
        let snap = engine.snapshot();
        assert_eq!(snap.state, PlaybackState::Playing);
        assert_eq!(snap.test_index, None, "play must end the audition");
        assert!((snap.current_time - 5.0).abs() < 1e-9);

        // The discarded audition must not drag the transport backwards.
        engine.stop_test();
        let snap = engine.snapshot();
        assert_eq!(snap.state, PlaybackState::Playing);
        assert!(
            (snap.current_time - 5.0).abs() < 0.01,
            "stale resume position moved the transport to {}",
            snap.current_time
        );
    }

    #[test]
    fn test_section_from_stopped_does_not_start_main() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 30.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.test_section(&section("s2", 300.0, 5.0), 0);
        engine.stop_test();
        assert_eq!(engine.snapshot().state, PlaybackState::Stopped);
    }

    #[test]
    fn section_mute_edit_silences_running_voice() {
        let mut s = section("s1", 200.0, 8.0);
        let events = one_clip_schedule(s.clone(), 0.0, 30.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(0.0);
        render_seconds(&mut engine, 0.5);

        s.muted = true;
        engine.update_sections(&[s]);
        // Give the gain ramp time to settle, then check for silence.
        render_seconds(&mut engine, 0.2);
        let (l, r) = render_seconds(&mut engine, 0.5);
        let peak = l
            .iter()
            .chain(r.iter())
            .fold(0.0_f64, |m, &s| m.max(s.abs()));
        assert!(peak < 1e-6, "muted voice still audible, peak {peak}");
    }

    #[test]
    fn ramp_disable_snaps_to_section_start_value() {
        let mut s = section("s1", 100.0, 10.0);
        s.end_carrier = Some(200.0);
        let events = one_clip_schedule(s.clone(), 0.0, 60.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(30.0);

        s.ramp_enabled = Some(false);
        engine.update_sections(&[s]);
        let carrier = engine.voices[0].carrier.value;
        assert!(
            (carrier - 100.0).abs() < 1e-9,
            "disabled ramp should snap to the start value, got {carrier}"
        );
    }

    #[test]
    fn clip_waveform_edit_swaps_in_place() {
        let s = section("s1", 200.0, 8.0);
        let mut track = TimelineTrack::default();
        track.id = "t1".into();
        let mut clip = TimelineClip::default();
        clip.id = "c1".into();
        clip.section_id = "s1".into();
        clip.track_id = "t1".into();
        clip.duration = 30.0;
        let events = schedule::schedule(&[clip.clone()], &[track], &[s]);

        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(0.0);
        assert_eq!(engine.voices[0].kind.waveform(), Waveform::Sine);

        clip.waveform = "triangle".into();
        engine.update_clips(&[clip]);
        assert_eq!(engine.voices[0].kind.waveform(), Waveform::Triangle);
    }

    #[test]
    fn mode_switch_rebuilds_at_current_position() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 30.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(0.0);
        render_seconds(&mut engine, 2.0);

        engine.set_mode(ToneMode::Isochronic);
        let snap = engine.snapshot();
        assert_eq!(snap.state, PlaybackState::Playing);
        assert!((snap.current_time - 2.0).abs() < 0.01, "position moved on rebuild");
        assert!(
            matches!(engine.voices[0].kind, VoiceKind::Isochronic { .. }),
            "voices should be isochronic after the switch"
        );
    }

    #[test]
    fn event_edge_fade_prevents_hard_onsets() {
        let events = one_clip_schedule(section("s1", 200.0, 8.0), 0.0, 10.0);
        let mut engine = engine_with(events, ToneMode::Binaural);
        engine.play(0.0);
        let (l, _r) = render_seconds(&mut engine, 0.02);
        // Within the first couple of samples the edge fade keeps output tiny.
        assert!(l[0].abs() < 0.01, "first sample not faded: {}", l[0]);
        assert!(l[1].abs() < 0.01, "second sample not faded: {}", l[1]);
    }
}
