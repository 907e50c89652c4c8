//! DSP Engine — Pure Rust audio synthesis and processing.
//!
//! All DSP runs in Rust for deterministic, cross-platform audio output.
//! The same code powers both the WebAudio (via AudioWorklet + WASM) and
//! the offline WAV renderer.

pub mod ambience;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod pad;
pub mod pan;
pub mod renderer;
pub mod reverb;
