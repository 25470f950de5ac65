//! Model runtime driven as a child process.
//!
//! The neural model runs inside an external runtime executable (ChatTTS by
//! default). Each inference writes the text to a temporary directory, asks
//! the runtime for a WAV file and decodes it back into samples.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::audio::decode_wav;
use crate::config::{DEFAULT_SAMPLE_RATE, ModelConfig};
use crate::errors::TtsError;
use crate::traits::SpeechModel;
use crate::types::{ComputeDevice, Language};

/// A [`SpeechModel`] backed by an external runtime executable.
///
/// The runtime is invoked as:
///
/// ```text
/// <runtime> --input <input.txt> --output <output.wav> --lang <code> --device <id> [--model <path>]
/// ```
///
/// and must write a WAV file (any bit depth, mono or multi-channel) at the
/// model's native sample rate.
#[derive(Debug, Clone)]
pub struct CommandModel {
    /// Executable name or path.
    command: String,
    /// Custom weights location forwarded with `--model`.
    model_path: Option<PathBuf>,
    sample_rate: u32,
    /// Resolved executable, set by a successful `load`.
    executable: Option<PathBuf>,
    device: ComputeDevice,
}

impl CommandModel {
    /// Backend name used in errors.
    const PROVIDER_NAME: &'static str = "local";

    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            model_path: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            executable: None,
            device: ComputeDevice::GeneralPurpose,
        }
    }

    /// Build from the `model` section of the configuration.
    pub fn from_config(config: &ModelConfig, sample_rate: u32) -> Self {
        Self {
            model_path: config.path.clone(),
            sample_rate,
            ..Self::new(config.command.clone())
        }
    }

    /// Set a custom weights location.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Check that configured weights exist and are not empty.
    fn validate_model_path(path: &Path) -> Result<(), TtsError> {
        let fail = |message: String| TtsError::Initialization {
            backend: Self::PROVIDER_NAME.into(),
            message,
        };

        let metadata = fs::metadata(path)
            .map_err(|e| fail(format!("model path {}: {}", path.display(), e)))?;

        let has_content = if metadata.is_dir() {
            fs::read_dir(path)
                .map_err(|e| fail(format!("model path {}: {}", path.display(), e)))?
                .next()
                .is_some()
        } else {
            metadata.len() > 0
        };

        if !has_content {
            return Err(fail(format!("model path {} is empty", path.display())));
        }
        Ok(())
    }
}

impl SpeechModel for CommandModel {
    fn load(&mut self, device: ComputeDevice) -> Result<(), TtsError> {
        let executable =
            which::which(&self.command).map_err(|e| TtsError::BackendUnavailable {
                backend: Self::PROVIDER_NAME.into(),
                reason: format!("model runtime `{}` not found: {}", self.command, e),
            })?;

        if let Some(path) = &self.model_path {
            Self::validate_model_path(path)?;
        }

        debug!(
            runtime = %executable.display(),
            device = device.id(),
            model_path = ?self.model_path,
            "Model runtime ready"
        );

        self.executable = Some(executable);
        self.device = device;
        Ok(())
    }

    fn infer(&self, text: &str, language: Language) -> Result<Vec<f32>, TtsError> {
        let executable = self
            .executable
            .as_ref()
            .ok_or_else(|| TtsError::synthesis("model runtime is not loaded"))?;

        // Removed when dropped, on every return path
        let temp_dir = tempfile::tempdir().map_err(TtsError::synthesis)?;
        let input_path = temp_dir.path().join("input.txt");
        fs::write(&input_path, text).map_err(TtsError::synthesis)?;
        let output_path = temp_dir.path().join("output.wav");

        let mut cmd = Command::new(executable);
        cmd.arg("--input").arg(&input_path);
        cmd.arg("--output").arg(&output_path);
        cmd.arg("--lang").arg(language.code());
        cmd.arg("--device").arg(self.device.id());
        if let Some(model_path) = &self.model_path {
            cmd.arg("--model").arg(model_path);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(
            runtime = %self.command,
            lang = language.code(),
            device = self.device.id(),
            text_len = text.len(),
            "Running model runtime"
        );

        let output = cmd.output().map_err(|e| {
            TtsError::synthesis(format!("failed to run `{}`: {}", self.command, e))
        })?;

        if !output.status.success() {
            // Some runtimes report errors on stdout
            let error_output = if output.stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout)
            } else {
                String::from_utf8_lossy(&output.stderr)
            };
            return Err(TtsError::synthesis(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                error_output.trim()
            )));
        }

        let file = fs::File::open(&output_path).map_err(|e| {
            TtsError::synthesis(format!("`{}` produced no audio: {}", self.command, e))
        })?;
        let (rate, samples) = decode_wav(std::io::BufReader::new(file))?;

        if rate != self.sample_rate {
            return Err(TtsError::synthesis(format!(
                "`{}` produced {} Hz audio, expected {} Hz",
                self.command, rate, self.sample_rate
            )));
        }

        Ok(samples)
    }

    fn native_sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        &self.command
    }
}
