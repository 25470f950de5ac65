//! The synthesis service.
//!
//! Owns one [`Backend`], loads it lazily, and normalizes whatever the backend
//! produces into an [`AudioEnvelope`].
//!
//! ## Lifecycle
//!
//! ```text
//! Unloaded --load_model ok--> Loaded (sticky)
//! Unloaded --load_model err--> Unloaded (retryable)
//! ```

use tracing::{debug, error, info};

use crate::audio::{
    DEFAULT_COMPRESSED_BITRATE_KBPS, encode_pcm16_wav, estimate_compressed_duration_secs,
    pcm_duration_secs,
};
use crate::backend::Backend;
use crate::config::NarratorConfig;
use crate::detection::probe_compute_device;
use crate::errors::TtsError;
use crate::types::{
    AdapterOutput, AudioEncoding, AudioEnvelope, BackendKind, ComputeDevice, Language,
    ServiceInfo, SynthesisRequest,
};

/// Process-lifetime state of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendState {
    /// Flips to `true` once, on the first successful load.
    pub loaded: bool,
    /// Probed device id for the local backend, endpoint for the cloud one.
    pub device_or_backend_id: String,
}

/// Text-to-speech service with a stable, blocking interface.
///
/// ## Examples
///
/// ```ignore
/// use narrator_lib::{Language, NarratorConfig, SynthesisService};
///
/// let mut service = SynthesisService::from_config(&NarratorConfig::load()?);
/// let envelope = service.synthesize("Hello world", Language::English)?;
/// std::fs::write("hello.wav", &envelope.audio_bytes)?;
/// ```
#[derive(Debug)]
pub struct SynthesisService {
    backend: Backend,
    state: BackendState,
    compressed_bitrate_kbps: u32,
    last_load_error: Option<String>,
}

impl SynthesisService {
    pub fn new(backend: impl Into<Backend>) -> Self {
        let backend = backend.into();
        let state = BackendState {
            loaded: false,
            device_or_backend_id: backend.id(),
        };
        Self {
            backend,
            state,
            compressed_bitrate_kbps: DEFAULT_COMPRESSED_BITRATE_KBPS,
            last_load_error: None,
        }
    }

    /// Build the configured backend.
    ///
    /// For the local backend the compute device comes from `config.device`
    /// when it names a known device, otherwise from a single probe of the host.
    pub fn from_config(config: &NarratorConfig) -> Self {
        let device = match config.backend {
            BackendKind::Local => resolve_device(config),
            BackendKind::Cloud => ComputeDevice::GeneralPurpose,
        };
        Self::new(Backend::from_config(config, device))
            .with_compressed_bitrate(config.cloud.bitrate_kbps)
    }

    /// Bitrate assumed when estimating compressed stream duration.
    #[must_use]
    pub fn with_compressed_bitrate(mut self, kbps: u32) -> Self {
        self.compressed_bitrate_kbps = kbps;
        self
    }

    pub fn state(&self) -> &BackendState {
        &self.state
    }

    /// Message of the most recent failed load, cleared by a successful one.
    pub fn last_load_error(&self) -> Option<&str> {
        self.last_load_error.as_deref()
    }

    /// Load the backend if it is not loaded yet.
    ///
    /// Returns `true` when the backend is ready. Failures are logged and
    /// recorded (see [`SynthesisService::last_load_error`]) rather than
    /// returned; the service stays unloaded and a later call may retry.
    pub fn load_model(&mut self) -> bool {
        if self.state.loaded {
            return true;
        }

        let backend = self.backend.kind();
        match self.backend.initialize() {
            Ok(()) => {
                self.state.loaded = true;
                self.last_load_error = None;
                info!(
                    backend = backend.as_str(),
                    device = %self.state.device_or_backend_id,
                    "Synthesis backend loaded"
                );
                true
            }
            Err(e) => {
                error!(
                    backend = backend.as_str(),
                    device = %self.state.device_or_backend_id,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Failed to load synthesis backend"
                );
                self.last_load_error = Some(e.to_string());
                false
            }
        }
    }

    /// Synthesize `text`, loading the backend first if needed.
    ///
    /// ## Errors
    ///
    /// - `TtsError::EmptyText` for blank text; the backend is not touched.
    /// - `TtsError::ModelLoadFailed` if the implicit load fails.
    /// - `TtsError::Synthesis` for any backend or encoding failure.
    pub fn synthesize(&mut self, text: &str, language: Language) -> Result<AudioEnvelope, TtsError> {
        let request = SynthesisRequest::new(text, language)?;
        self.synthesize_request(&request)
    }

    /// Synthesize a validated request.
    pub fn synthesize_request(
        &mut self,
        request: &SynthesisRequest,
    ) -> Result<AudioEnvelope, TtsError> {
        if !self.load_model() {
            return Err(TtsError::ModelLoadFailed {
                reason: self
                    .last_load_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".into()),
            });
        }

        debug!(
            backend = self.backend.kind().as_str(),
            lang = request.language.code(),
            text_len = request.text.len(),
            "Synthesizing"
        );

        let output = self
            .backend
            .synthesize(&request.text, request.language)
            .map_err(|e| match e {
                TtsError::Synthesis { .. } | TtsError::EmptyText => e,
                other => TtsError::synthesis(other),
            })?;

        let envelope = normalize(output, self.compressed_bitrate_kbps)?;

        debug!(
            encoding = ?envelope.encoding,
            audio_size = envelope.audio_bytes.len(),
            duration = envelope.duration_secs,
            "Synthesis complete"
        );

        Ok(envelope)
    }

    /// Snapshot of the service. Never triggers a load.
    pub fn get_info(&self) -> ServiceInfo {
        ServiceInfo {
            backend_kind: self.backend.kind(),
            acceleration_available: self.backend.acceleration_available(),
            sample_rate: self.backend.sample_rate(),
            model_loaded: self.state.loaded,
            device: self.state.device_or_backend_id.clone(),
            voice: self.backend.default_voice(),
        }
    }
}

fn resolve_device(config: &NarratorConfig) -> ComputeDevice {
    if let Some(name) = config.device.as_deref() {
        match ComputeDevice::parse(name) {
            Some(device) => return device,
            None => tracing::warn!(device = name, "Unknown device override, probing instead"),
        }
    }
    probe_compute_device(&config.model.command)
}

/// Turn adapter output into an audio envelope.
///
/// Waveforms are clamped, quantized and wrapped in a PCM16 mono WAV
/// container. Compressed streams pass through unchanged, with a duration
/// estimated from `compressed_bitrate_kbps`.
///
/// ## Errors
///
/// Returns `TtsError::Synthesis` if the output is empty or cannot be encoded.
pub fn normalize(
    output: AdapterOutput,
    compressed_bitrate_kbps: u32,
) -> Result<AudioEnvelope, TtsError> {
    match output {
        AdapterOutput::Waveform {
            sample_rate,
            samples,
        } => {
            let audio_bytes = encode_pcm16_wav(&samples, sample_rate)?;
            Ok(AudioEnvelope {
                sample_rate,
                audio_bytes,
                encoding: AudioEncoding::Pcm16Mono,
                duration_secs: pcm_duration_secs(samples.len(), sample_rate),
            })
        }
        AdapterOutput::Compressed { sample_rate, bytes } => {
            if bytes.is_empty() {
                return Err(TtsError::synthesis("backend returned an empty audio stream"));
            }
            let duration_secs = estimate_compressed_duration_secs(bytes.len(), compressed_bitrate_kbps);
            Ok(AudioEnvelope {
                sample_rate,
                audio_bytes: bytes,
                encoding: AudioEncoding::CompressedStream,
                duration_secs,
            })
        }
    }
}
