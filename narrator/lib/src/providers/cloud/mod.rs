//! Cloud-based backend implementations.
//!
//! These call a remote neural voice service over HTTP.

mod neural_voice;

pub use neural_voice::{CloudVoiceAdapter, OUTPUT_FORMAT, voice_for};
