//! Service configuration.
//!
//! Configuration is layered: built-in defaults, then an optional JSON file,
//! then environment variables. The CLI applies its flags last.
//!
//! ## Config File
//!
//! The file is read from `$NARRATOR_CONFIG` when set, otherwise from
//! `<config dir>/narrator/config.json`. A missing file is not an error.
//!
//! ```json
//! {
//!   "backend": "cloud",
//!   "cloud": { "region": "westeurope", "voice": "en-GB-SoniaNeural" }
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | variable | field |
//! |----------|-------|
//! | `NARRATOR_BACKEND` | `backend` |
//! | `NARRATOR_DEVICE` | `device` |
//! | `NARRATOR_MODEL_COMMAND` | `model.command` |
//! | `NARRATOR_MODEL_PATH` | `model.path` |
//! | `NARRATOR_CLOUD_ENDPOINT` | `cloud.endpoint` |
//! | `NARRATOR_CLOUD_REGION` | `cloud.region` |
//! | `NARRATOR_CLOUD_KEY` / `AZURE_SPEECH_KEY` | `cloud.api_key` |
//! | `NARRATOR_VOICE` | `cloud.voice` |

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::DEFAULT_COMPRESSED_BITRATE_KBPS;
use crate::errors::TtsError;
use crate::types::BackendKind;

/// Native sample rate of the local model and of the requested cloud format.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Default model runtime executable.
pub const DEFAULT_MODEL_COMMAND: &str = "chattts";

/// Default cloud region.
pub const DEFAULT_CLOUD_REGION: &str = "eastus";

const CONFIG_ENV: &str = "NARRATOR_CONFIG";

/// Top level configuration for a synthesis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Which backend variant to construct.
    pub backend: BackendKind,
    /// Device override for the local backend (`cuda`, `metal`, `cpu`).
    pub device: Option<String>,
    /// Sample rate reported for synthesized audio.
    pub sample_rate: u32,
    pub model: ModelConfig,
    pub cloud: CloudConfig,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            model: ModelConfig::default(),
            cloud: CloudConfig::default(),
        }
    }
}

/// Settings for the local model runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Executable that runs the neural model.
    pub command: String,
    /// Custom model weights location passed to the runtime.
    pub path: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_MODEL_COMMAND.into(),
            path: None,
        }
    }
}

/// Settings for the cloud voice backend.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Full base URL. Derived from `region` when unset.
    pub endpoint: Option<String>,
    pub region: String,
    pub api_key: Option<String>,
    /// Voice used for every language instead of the per-language table.
    pub voice: Option<String>,
    /// Bitrate assumed when estimating compressed duration.
    pub bitrate_kbps: u32,
    /// Directory for the per-call staging file. System temp dir when unset.
    pub staging_dir: Option<PathBuf>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_CLOUD_REGION.into(),
            api_key: None,
            voice: None,
            bitrate_kbps: DEFAULT_COMPRESSED_BITRATE_KBPS,
            staging_dir: None,
        }
    }
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("voice", &self.voice)
            .field("bitrate_kbps", &self.bitrate_kbps)
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}

impl CloudConfig {
    /// The base URL requests are sent to.
    pub fn resolved_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.tts.speech.microsoft.com", self.region),
        }
    }
}

impl NarratorConfig {
    /// Load defaults, the config file (if any) and environment overrides.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::Config` if a config file exists but cannot be read
    /// or parsed.
    pub fn load() -> Result<Self, TtsError> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, TtsError> {
        let path_str = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|e| TtsError::Config {
            path: path_str.clone(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| TtsError::Config {
            path: path_str.clone(),
            message: format!("JSON parse error: {}", e),
        })?;
        config.validate().map_err(|message| TtsError::Config {
            path: path_str,
            message,
        })?;
        Ok(config)
    }

    /// Reject values that would produce a meaningless envelope.
    fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample_rate must be greater than zero".into());
        }
        if self.cloud.bitrate_kbps == 0 {
            return Err("cloud.bitrate_kbps must be greater than zero".into());
        }
        Ok(())
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get("NARRATOR_BACKEND") {
            match BackendKind::parse(&value) {
                Some(kind) => self.backend = kind,
                None => tracing::warn!(value = %value, "Ignoring unknown NARRATOR_BACKEND"),
            }
        }
        if let Some(value) = get("NARRATOR_DEVICE") {
            self.device = Some(value);
        }
        if let Some(value) = get("NARRATOR_MODEL_COMMAND") {
            self.model.command = value;
        }
        if let Some(value) = get("NARRATOR_MODEL_PATH") {
            self.model.path = Some(PathBuf::from(value));
        }
        if let Some(value) = get("NARRATOR_CLOUD_ENDPOINT") {
            self.cloud.endpoint = Some(value);
        }
        if let Some(value) = get("NARRATOR_CLOUD_REGION") {
            self.cloud.region = value;
        }
        if let Some(value) = get("NARRATOR_CLOUD_KEY").or_else(|| get("AZURE_SPEECH_KEY")) {
            self.cloud.api_key = Some(value);
        }
        if let Some(value) = get("NARRATOR_VOICE") {
            self.cloud.voice = Some(value);
        }
    }
}

/// Location of the config file, if one can be determined.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("narrator").join("config.json"))
}
