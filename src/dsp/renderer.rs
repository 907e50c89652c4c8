//! Offline renderer — renders a session to a WAV byte buffer.
//!
//! Runs the same engine the realtime path uses, block by block, for the
//! session's total duration, so an export sounds identical to playback.

use crate::model::Session;
use crate::session::SessionEngine;

const BLOCK: usize = 512;

/// Render a complete session to a WAV file as bytes (16-bit stereo PCM).
pub fn render_wav(session: &Session, sample_rate: u32) -> Vec<u8> {
    let pcm = render_pcm_i16(session, sample_rate as f64);
    encode_wav(&pcm, sample_rate, 2)
}

/// Render a session to interleaved stereo i16 PCM.
pub fn render_pcm_i16(session: &Session, sample_rate: f64) -> Vec<i16> {
    let mut engine = SessionEngine::from_session(session, sample_rate);
    engine.resume();

    let total_frames = (engine.total_duration() * sample_rate) as usize;
    let mut pcm = Vec::with_capacity(total_frames * 2);
    if total_frames == 0 {
        return pcm;
    }
    engine.play(0.0);

    let mut left = vec![0.0_f64; BLOCK];
    let mut right = vec![0.0_f64; BLOCK];
    let mut rendered = 0;
    while rendered < total_frames {
        let n = BLOCK.min(total_frames - rendered);
        left[..n].fill(0.0);
        right[..n].fill(0.0);
        engine.render(&mut left[..n], &mut right[..n]);
        for i in 0..n {
            pcm.push(to_i16(left[i]));
            pcm.push(to_i16(right[i]));
        }
        rendered += n;
    }
    pcm
}

fn to_i16(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Section, TimelineClip, TimelineTrack};

    fn half_second_session() -> Session {
        let mut section = Section::default();
        section.id = "s1".into();
        section.carrier = 200.0;
        section.beat = 8.0;
        let mut track = TimelineTrack::default();
        track.id = "t1".into();
        let mut clip = TimelineClip::default();
        clip.id = "c1".into();
        clip.section_id = "s1".into();
        clip.track_id = "t1".into();
        clip.duration = 0.5;

        let mut session = Session::default();
        session.sections = vec![section];
        session.tracks = vec![track];
        session.clips = vec![clip];
        session
    }

    #[test]
    fn wav_header_valid() {
        let wav = render_wav(&half_second_session(), 8000);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 8000);

        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 2);
    }

    #[test]
    fn wav_size_matches_session_duration() {
        let wav = render_wav(&half_second_session(), 8000);

        // 0.5 s at 8 kHz = 4000 frames * 2 channels * 2 bytes.
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 16000);
        assert_eq!(wav.len(), 44 + 16000);
    }

    #[test]
    fn rendered_audio_is_not_silent() {
        let pcm = render_pcm_i16(&half_second_session(), 8000.0);
        let peak = pcm.iter().map(|&s| s.unsigned_abs()).max().unwrap_or(0);
        assert!(peak > 1000, "render should contain the tone, peak {peak}");
    }

    #[test]
    fn empty_session_renders_empty_data() {
        let wav = render_wav(&Session::default(), 8000);
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 0);
        assert_eq!(wav.len(), 44);
    }
}
