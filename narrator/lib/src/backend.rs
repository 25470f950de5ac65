//! Backend selection.
//!
//! A service owns exactly one backend, chosen when it is constructed. The two
//! variants are alternatives behind the same capability, so they are modelled
//! as an enum rather than trait objects.

use crate::config::NarratorConfig;
use crate::errors::TtsError;
use crate::providers::cloud::{CloudVoiceAdapter, voice_for};
use crate::providers::host::LocalModelAdapter;
use crate::types::{AdapterOutput, BackendKind, ComputeDevice, Language};

/// The synthesis backend of one service.
#[derive(Debug)]
pub enum Backend {
    Local(LocalModelAdapter),
    Cloud(CloudVoiceAdapter),
}

impl Backend {
    /// Build the backend selected by `config`.
    ///
    /// `device` is only used by the local variant.
    pub fn from_config(config: &NarratorConfig, device: ComputeDevice) -> Self {
        match config.backend {
            BackendKind::Local => Backend::Local(LocalModelAdapter::from_config(config, device)),
            BackendKind::Cloud => Backend::Cloud(CloudVoiceAdapter::from_config(config)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Local(_) => BackendKind::Local,
            Backend::Cloud(_) => BackendKind::Cloud,
        }
    }

    /// Device id (local) or endpoint (cloud).
    pub fn id(&self) -> String {
        match self {
            Backend::Local(adapter) => adapter.device().id().to_string(),
            Backend::Cloud(adapter) => adapter.endpoint().to_string(),
        }
    }

    pub fn acceleration_available(&self) -> bool {
        match self {
            Backend::Local(adapter) => adapter.device().is_accelerated(),
            Backend::Cloud(_) => false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            Backend::Local(adapter) => adapter.sample_rate(),
            Backend::Cloud(adapter) => adapter.sample_rate(),
        }
    }

    /// Voice used for English, for backends with named voices.
    pub fn default_voice(&self) -> Option<String> {
        match self {
            Backend::Local(_) => None,
            Backend::Cloud(adapter) => Some(adapter.resolve_voice(Language::English).to_string()),
        }
    }

    pub fn initialize(&mut self) -> Result<(), TtsError> {
        match self {
            Backend::Local(adapter) => adapter.initialize(),
            Backend::Cloud(adapter) => adapter.initialize(),
        }
    }

    pub fn synthesize(&self, text: &str, language: Language) -> Result<AdapterOutput, TtsError> {
        match self {
            Backend::Local(adapter) => adapter.synthesize(text, language),
            Backend::Cloud(adapter) => adapter.synthesize(text, language),
        }
    }
}

impl From<LocalModelAdapter> for Backend {
    fn from(adapter: LocalModelAdapter) -> Self {
        Backend::Local(adapter)
    }
}

impl From<CloudVoiceAdapter> for Backend {
    fn from(adapter: CloudVoiceAdapter) -> Self {
        Backend::Cloud(adapter)
    }
}
