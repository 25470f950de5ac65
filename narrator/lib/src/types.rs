//! Core types for the narrator synthesis service.
//!
//! This module defines the values that flow between the backend adapters,
//! the synthesis service and the CLI:
//! - Language and backend selection enums
//! - The compute device reported by the capability probe
//! - Adapter output, the normalized audio envelope and its metadata
//! - The `ServiceInfo` snapshot

use serde::{Deserialize, Serialize};

use crate::errors::TtsError;

// ============================================================================
// Language
// ============================================================================

/// Language hint for synthesis.
///
/// Unrecognized codes fall back to [`Language::English`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
}

impl Language {
    /// Parse a language code such as `en`, `ZH` or `zh-CN`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use narrator_lib::types::Language;
    ///
    /// assert_eq!(Language::from_code("zh-CN"), Language::Chinese);
    /// assert_eq!(Language::from_code("klingon"), Language::English);
    /// ```
    pub fn from_code(code: &str) -> Language {
        let lower = code.trim().to_lowercase();
        let primary = lower.split(['-', '_']).next().unwrap_or("");

        match primary {
            "zh" | "cmn" => Language::Chinese,
            "ja" => Language::Japanese,
            "es" => Language::Spanish,
            "fr" => Language::French,
            "de" => Language::German,
            "en" => Language::English,
            other => {
                tracing::debug!(code = other, "Unrecognized language code, using en");
                Language::English
            }
        }
    }

    /// The two-letter code passed to backends.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
            Language::Japanese => "ja",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
        }
    }

    /// The BCP-47 locale used for voice selection.
    pub fn locale(&self) -> &'static str {
        match self {
            Language::English => "en-US",
            Language::Chinese => "zh-CN",
            Language::Japanese => "ja-JP",
            Language::Spanish => "es-ES",
            Language::French => "fr-FR",
            Language::German => "de-DE",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Backend / device
// ============================================================================

/// Which backend variant a service was constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Cloud,
}

impl BackendKind {
    /// Parse a backend name (case-insensitive).
    pub fn parse(name: &str) -> Option<BackendKind> {
        match name.trim().to_lowercase().as_str() {
            "local" | "model" | "chattts" => Some(BackendKind::Local),
            "cloud" | "remote" | "azure" => Some(BackendKind::Cloud),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Cloud => "cloud",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware accelerator families the probe knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accelerator {
    Cuda,
    Metal,
}

/// Result of the compute capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeDevice {
    /// A hardware accelerator is present.
    Accelerated(Accelerator),
    /// Plain CPU execution.
    GeneralPurpose,
    /// No usable compute for the model runtime.
    Unavailable,
}

impl ComputeDevice {
    /// Parse a device override (`cuda`, `gpu`, `metal`, `mps`, `cpu`).
    pub fn parse(name: &str) -> Option<ComputeDevice> {
        match name.trim().to_lowercase().as_str() {
            "cuda" | "gpu" => Some(ComputeDevice::Accelerated(Accelerator::Cuda)),
            "metal" | "mps" => Some(ComputeDevice::Accelerated(Accelerator::Metal)),
            "cpu" => Some(ComputeDevice::GeneralPurpose),
            _ => None,
        }
    }

    /// Identifier handed to the model runtime and reported by `get_info`.
    pub fn id(&self) -> &'static str {
        match self {
            ComputeDevice::Accelerated(Accelerator::Cuda) => "cuda",
            ComputeDevice::Accelerated(Accelerator::Metal) => "metal",
            ComputeDevice::GeneralPurpose => "cpu",
            ComputeDevice::Unavailable => "unavailable",
        }
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self, ComputeDevice::Accelerated(_))
    }
}

// ============================================================================
// Requests and audio
// ============================================================================

/// A validated synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub language: Language,
}

impl SynthesisRequest {
    /// Build a request, rejecting text that is empty or whitespace only.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::EmptyText` when there is nothing to speak.
    pub fn new(text: impl Into<String>, language: Language) -> Result<Self, TtsError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TtsError::EmptyText);
        }
        Ok(Self { text, language })
    }
}

/// Encoding of the bytes inside an [`AudioEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioEncoding {
    /// A WAV container holding mono 16-bit signed PCM.
    #[serde(rename = "pcm16-mono")]
    Pcm16Mono,
    /// A compressed stream (MP3) passed through from a cloud voice.
    #[serde(rename = "compressed")]
    CompressedStream,
}

impl AudioEncoding {
    /// File extension a caller would use for these bytes.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Pcm16Mono => "wav",
            AudioEncoding::CompressedStream => "mp3",
        }
    }
}

/// Raw output of a backend adapter, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterOutput {
    /// Floating point samples nominally in `[-1.0, 1.0]`.
    Waveform { sample_rate: u32, samples: Vec<f32> },
    /// An already encoded stream.
    Compressed { sample_rate: u32, bytes: Vec<u8> },
}

/// Normalized synthesis result.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEnvelope {
    pub sample_rate: u32,
    pub audio_bytes: Vec<u8>,
    pub encoding: AudioEncoding,
    /// Seconds of audio. Exact for PCM, estimated from bitrate for compressed streams.
    pub duration_secs: f64,
}

impl AudioEnvelope {
    /// Metadata describing this envelope, as written to the diagnostic channel.
    pub fn metadata(&self) -> SynthesisMetadata {
        SynthesisMetadata {
            sample_rate: self.sample_rate,
            size: self.audio_bytes.len(),
            duration: self.duration_secs,
            encoding: self.encoding,
        }
    }
}

/// Success metadata for one synthesis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisMetadata {
    pub sample_rate: u32,
    pub size: usize,
    pub duration: f64,
    pub encoding: AudioEncoding,
}

/// Snapshot of a service's state. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub backend_kind: BackendKind,
    pub acceleration_available: bool,
    pub sample_rate: u32,
    pub model_loaded: bool,
    /// Resolved device id (local) or backend id (cloud).
    pub device: String,
    /// Default voice for English, when the backend has named voices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}
