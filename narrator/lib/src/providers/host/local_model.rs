//! Local neural model backend.
//!
//! Runs a [`SpeechModel`] on the device chosen by the capability probe and
//! returns its raw waveform.

use tracing::{debug, info};

use crate::config::NarratorConfig;
use crate::errors::TtsError;
use crate::providers::host::CommandModel;
use crate::traits::SpeechModel;
use crate::types::{AdapterOutput, ComputeDevice, Language};

/// Device-aware adapter around a local speech model.
///
/// ## Examples
///
/// ```ignore
/// use narrator_lib::providers::host::{CommandModel, LocalModelAdapter};
/// use narrator_lib::{ComputeDevice, Language};
///
/// let mut adapter = LocalModelAdapter::new(
///     Box::new(CommandModel::new("chattts")),
///     ComputeDevice::GeneralPurpose,
/// );
/// adapter.initialize()?;
/// let output = adapter.synthesize("Hello world", Language::English)?;
/// ```
pub struct LocalModelAdapter {
    model: Box<dyn SpeechModel>,
    device: ComputeDevice,
}

impl std::fmt::Debug for LocalModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalModelAdapter")
            .field("model", &self.model.name())
            .field("device", &self.device)
            .finish()
    }
}

impl LocalModelAdapter {
    /// Backend name used in errors.
    const PROVIDER_NAME: &'static str = "local";

    pub fn new(model: Box<dyn SpeechModel>, device: ComputeDevice) -> Self {
        Self { model, device }
    }

    /// Adapter over the configured model runtime.
    pub fn from_config(config: &NarratorConfig, device: ComputeDevice) -> Self {
        Self::new(
            Box::new(CommandModel::from_config(&config.model, config.sample_rate)),
            device,
        )
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    pub fn sample_rate(&self) -> u32 {
        self.model.native_sample_rate()
    }

    /// Load the model onto the probed device.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::BackendUnavailable` when no device can run the
    /// model, or whatever the model's own `load` reports.
    pub fn initialize(&mut self) -> Result<(), TtsError> {
        if self.device == ComputeDevice::Unavailable {
            return Err(TtsError::BackendUnavailable {
                backend: Self::PROVIDER_NAME.into(),
                reason: format!("no compute device available for `{}`", self.model.name()),
            });
        }

        debug!(model = self.model.name(), device = self.device.id(), "Loading model");
        self.model.load(self.device)?;
        info!(model = self.model.name(), device = self.device.id(), "Model loaded");
        Ok(())
    }

    /// Generate a waveform, clamped to `[-1.0, 1.0]`.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::Synthesis` if the model fails or yields no samples.
    pub fn synthesize(&self, text: &str, language: Language) -> Result<AdapterOutput, TtsError> {
        let mut samples = self.model.infer(text, language).map_err(|e| match e {
            TtsError::Synthesis { .. } | TtsError::EmptyText => e,
            other => TtsError::synthesis(other),
        })?;

        if samples.is_empty() {
            return Err(TtsError::synthesis("model returned an empty waveform"));
        }

        for sample in samples.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        debug!(
            model = self.model.name(),
            samples = samples.len(),
            "Model produced waveform"
        );

        Ok(AdapterOutput::Waveform {
            sample_rate: self.model.native_sample_rate(),
            samples,
        })
    }
}
