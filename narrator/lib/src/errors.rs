/// Broad classification of a [`TtsError`].
///
/// The kind decides how a caller should react: an unavailable backend needs
/// external remediation, an initialization failure can be retried through
/// `load_model`, and a synthesis failure can be retried with the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BackendUnavailable,
    Initialization,
    Synthesis,
    Config,
}

/// Errors that can occur during TTS operations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// A required capability (runtime executable, API credentials) is missing.
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable {
        /// The backend that could not be used.
        backend: String,
        /// Why the backend is unavailable.
        reason: String,
    },

    /// Device, model or client setup failed.
    #[error("Failed to load {backend} model: {message}")]
    Initialization {
        /// The backend being initialized.
        backend: String,
        /// Description of the failure.
        message: String,
    },

    /// A single synthesis request failed.
    #[error("TTS synthesis failed: {message}")]
    Synthesis {
        /// The underlying cause.
        message: String,
    },

    /// The request text was empty after trimming.
    #[error("TTS synthesis failed: text must not be empty")]
    EmptyText,

    /// `synthesize` needed to load the model first and loading failed.
    #[error("Model loading failed: {reason}")]
    ModelLoadFailed {
        /// The load error that was recorded.
        reason: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Invalid configuration at {path}: {message}")]
    Config {
        /// Path of the offending file.
        path: String,
        /// Description of the problem.
        message: String,
    },
}

impl TtsError {
    /// Shorthand for a [`TtsError::Synthesis`] built from anything displayable.
    pub fn synthesis(message: impl std::fmt::Display) -> Self {
        TtsError::Synthesis {
            message: message.to_string(),
        }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TtsError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            TtsError::Initialization { .. } | TtsError::ModelLoadFailed { .. } => {
                ErrorKind::Initialization
            }
            TtsError::Synthesis { .. } | TtsError::EmptyText => ErrorKind::Synthesis,
            TtsError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Whether retrying (without changing the environment) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Initialization | ErrorKind::Synthesis)
    }
}
