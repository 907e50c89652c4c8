pub mod dsp;
pub mod error;
pub mod model;
pub mod schedule;
pub mod session;

use wasm_bindgen::prelude::*;

use crate::error::EngineError;
use crate::model::Session;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the entrain-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse a session record from JSON.
pub fn parse_session(json: &str) -> Result<Session, EngineError> {
    Ok(serde_json::from_str(json)?)
}

/// WASM-exposed: resolve a session's timeline into the ordered event list
/// the transport would play.
#[wasm_bindgen]
pub fn schedule_session(session: JsValue) -> Result<JsValue, JsValue> {
    let session: Session =
        serde_wasm_bindgen::from_value(session).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let events = schedule::schedule(&session.clips, &session.tracks, &session.sections);
    serde_wasm_bindgen::to_value(&events).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render a complete session offline to a WAV byte array.
#[wasm_bindgen]
pub fn render_session_wav(session: JsValue, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    let session: Session =
        serde_wasm_bindgen::from_value(session).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(dsp::renderer::render_wav(&session, sample_rate))
}
