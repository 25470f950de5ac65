//! Traits for the narrator backend layer.
//!
//! The neural model behind the local backend is opaque: anything that can be
//! loaded onto a device and turn text into a waveform can drive it.

use crate::errors::TtsError;
use crate::types::{ComputeDevice, Language};

/// A local neural speech model.
///
/// ## Implementation Requirements
///
/// - `load` may be slow and is called at most once per successful load.
/// - `infer` returns mono samples nominally in `[-1.0, 1.0]` at
///   [`SpeechModel::native_sample_rate`]. Values outside that range are
///   allowed; the service clamps them.
///
/// ## Examples
///
/// ```
/// use narrator_lib::{ComputeDevice, Language, SpeechModel, TtsError};
///
/// struct Silence;
///
/// impl SpeechModel for Silence {
///     fn load(&mut self, _device: ComputeDevice) -> Result<(), TtsError> {
///         Ok(())
///     }
///
///     fn infer(&self, text: &str, _language: Language) -> Result<Vec<f32>, TtsError> {
///         Ok(vec![0.0; text.len() * 100])
///     }
/// }
/// ```
pub trait SpeechModel: Send {
    /// Load weights onto the given device.
    ///
    /// ## Errors
    ///
    /// `TtsError::BackendUnavailable` when the runtime is missing,
    /// `TtsError::Initialization` when loading itself fails.
    fn load(&mut self, device: ComputeDevice) -> Result<(), TtsError>;

    /// Generate a waveform for the text.
    fn infer(&self, text: &str, language: Language) -> Result<Vec<f32>, TtsError>;

    /// Rate of the samples produced by `infer`.
    fn native_sample_rate(&self) -> u32 {
        crate::config::DEFAULT_SAMPLE_RATE
    }

    /// Short name used in logs and errors.
    fn name(&self) -> &str {
        "model"
    }
}

// ============================================================================
// Tests
// ============================================================================
