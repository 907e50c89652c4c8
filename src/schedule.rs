//! Playback scheduler — projects clips + tracks + sections into a flat,
//! time-ordered list of playable events.
//!
//! This is a pure function of its inputs: the engine calls it fresh on every
//! playback start or loop restart and never mutates the result in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Section, TimelineClip, TimelineTrack};

/// A scheduler-resolved, time-bounded instruction to play one section's tone
/// within one clip's placement. Carries a snapshot of the section so later
/// edits to the source record cannot shear a running event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEvent {
    pub clip_id: String,
    pub section_id: String,
    pub track_id: String,
    /// Timeline start in seconds.
    pub start_time: f64,
    /// Event duration in seconds.
    pub duration: f64,
    /// Oscillator waveform name inherited from the clip.
    pub waveform: String,
    /// Section state captured at schedule time.
    pub section: Section,
}

impl ScheduledEvent {
    /// Timeline end in seconds (exclusive).
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Whether `t` falls within the half-open span `[start, start+duration)`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_time && t < self.end_time()
    }
}

/// Resolve the timeline into playable events.
///
/// Rules, in order:
/// - a clip whose section or track no longer exists is dropped silently;
/// - if any track is solo'd, only clips on solo'd tracks survive;
/// - otherwise clips on muted tracks are dropped;
/// - clips muted directly are dropped;
/// - survivors sort ascending by start time, ties keeping clip order.
pub fn schedule(
    clips: &[TimelineClip],
    tracks: &[TimelineTrack],
    sections: &[Section],
) -> Vec<ScheduledEvent> {
    let track_by_id: HashMap<&str, &TimelineTrack> =
        tracks.iter().map(|t| (t.id.as_str(), t)).collect();
    let section_by_id: HashMap<&str, &Section> =
        sections.iter().map(|s| (s.id.as_str(), s)).collect();

    let any_solo = tracks.iter().any(|t| t.solo);

    let mut events: Vec<ScheduledEvent> = Vec::new();
    for clip in clips {
        let Some(section) = section_by_id.get(clip.section_id.as_str()) else {
            log::debug!("dropping clip {}: missing section {}", clip.id, clip.section_id);
            continue;
        };
        let Some(track) = track_by_id.get(clip.track_id.as_str()) else {
            log::debug!("dropping clip {}: missing track {}", clip.id, clip.track_id);
            continue;
        };

        if any_solo {
            if !track.solo {
                continue;
            }
        } else if track.muted {
            continue;
        }
        if clip.muted {
            continue;
        }

        events.push(ScheduledEvent {
            clip_id: clip.id.clone(),
            section_id: clip.section_id.clone(),
            track_id: clip.track_id.clone(),
            start_time: clip.start_time,
            duration: clip.duration,
            waveform: clip.waveform.clone(),
            section: (*section).clone(),
        });
    }

    // Stable: ties keep original clip order.
    events.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    events
}

/// Total schedule duration: `max(start + duration)` over events, or 0.
pub fn total_duration(events: &[ScheduledEvent]) -> f64 {
    events
        .iter()
        .map(|e| e.end_time())
        .fold(0.0, f64::max)
}

/// Indices of events whose half-open span contains `t`, in schedule order.
pub fn active_events(events: &[ScheduledEvent], t: f64) -> Vec<usize> {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.contains(t))
        .map(|(i, _)| i)
        .collect()
}
