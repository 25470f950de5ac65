//! Narrator
//!
//! Text-to-speech synthesis for narrating code explanations.
//!
//! ## Features
//!
//! - **Two interchangeable backends**: a local neural model (device aware,
//!   waveform output) and a cloud neural voice (MP3 output)
//! - **Lazy, load-once lifecycle**: the backend is initialized on first use
//!   and stays loaded; failed loads can be retried
//! - **Normalized output**: waveforms become mono 16-bit WAV, compressed
//!   streams pass through untouched
//! - **Blocking interface**: the cloud backend drives its request on a
//!   runtime that lives for a single call
//!
//! ## Quick Start
//!
//! ```ignore
//! use narrator_lib::{Language, NarratorConfig, SynthesisService};
//!
//! let config = NarratorConfig::load()?;
//! let mut service = SynthesisService::from_config(&config);
//! let envelope = service.synthesize("Hello world", Language::English)?;
//! println!("{} bytes at {} Hz", envelope.audio_bytes.len(), envelope.sample_rate);
//! ```
//!
//! ## Module Structure
//!
//! - [`types`] - Core type definitions (languages, devices, audio envelopes)
//! - [`errors`] - Error taxonomy
//! - [`service`] - The `SynthesisService`
//! - [`backend`] - The backend enum dispatching to the adapters
//! - [`providers`] - Local model and cloud voice adapters
//! - [`audio`] - PCM quantization, WAV encoding and duration estimates

pub mod audio;
pub mod backend;
pub mod config;
pub mod detection;
pub mod errors;
pub mod providers;
pub mod service;
pub mod traits;
pub mod types;

// Re-export main types at crate root for convenience
pub use backend::Backend;
pub use config::{CloudConfig, ModelConfig, NarratorConfig};
pub use detection::probe_compute_device;
pub use errors::{ErrorKind, TtsError};
pub use providers::cloud::CloudVoiceAdapter;
pub use providers::host::{CommandModel, LocalModelAdapter};
pub use service::{BackendState, SynthesisService};
pub use traits::SpeechModel;
pub use types::{
    AdapterOutput, AudioEncoding, AudioEnvelope, BackendKind, ComputeDevice, Language,
    ServiceInfo, SynthesisMetadata, SynthesisRequest,
};
