//! Cloud neural voice backend.
//!
//! Sends SSML to a neural voice REST endpoint (the Azure Cognitive Services
//! speech shape) and receives an MP3 stream.
//!
//! ## Blocking Interface
//!
//! The adapter's `synthesize` is synchronous. Each call builds a fresh
//! current-thread tokio runtime, drives the single request on it with
//! `block_on`, and drops the runtime before returning. Nothing about the
//! runtime survives between calls.
//!
//! ## Staging File
//!
//! The response body is streamed into a named temporary file and read back
//! once complete. The file is owned by a [`tempfile::NamedTempFile`] and is
//! removed when it drops, whichever way the call exits.

use std::path::PathBuf;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::config::NarratorConfig;
use crate::errors::TtsError;
use crate::types::{AdapterOutput, Language};

/// Output format requested from the service.
pub const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

const SYNTHESIS_PATH: &str = "/cognitiveservices/v1";
const USER_AGENT: &str = concat!("narrator/", env!("CARGO_PKG_VERSION"));

/// The named voice used for a language.
///
/// ## Examples
///
/// ```
/// use narrator_lib::providers::cloud::voice_for;
/// use narrator_lib::Language;
///
/// assert_eq!(voice_for(Language::Chinese), "zh-CN-XiaoxiaoNeural");
/// ```
pub fn voice_for(language: Language) -> &'static str {
    match language {
        Language::English => "en-US-AriaNeural",
        Language::Chinese => "zh-CN-XiaoxiaoNeural",
        Language::Japanese => "ja-JP-NanamiNeural",
        Language::Spanish => "es-ES-ElviraNeural",
        Language::French => "fr-FR-DeniseNeural",
        Language::German => "de-DE-KatjaNeural",
    }
}

/// Escape text for inclusion in an SSML element.
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn build_ssml(text: &str, language: Language, voice: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        language.locale(),
        escape_xml(voice),
        escape_xml(text)
    )
}

/// Cloud neural voice adapter.
///
/// ## Examples
///
/// ```ignore
/// use narrator_lib::providers::cloud::CloudVoiceAdapter;
/// use narrator_lib::Language;
///
/// let mut adapter = CloudVoiceAdapter::new("https://eastus.tts.speech.microsoft.com", Some(key));
/// adapter.initialize()?;
/// let output = adapter.synthesize("你好", Language::Chinese)?;
/// ```
pub struct CloudVoiceAdapter {
    endpoint: String,
    api_key: Option<String>,
    /// Used for every language when set.
    voice_override: Option<String>,
    sample_rate: u32,
    staging_dir: Option<PathBuf>,
    /// Built by `initialize`.
    client: Option<reqwest::Client>,
}

impl std::fmt::Debug for CloudVoiceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudVoiceAdapter")
            .field("endpoint", &self.endpoint)
            .field("voice_override", &self.voice_override)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

impl CloudVoiceAdapter {
    /// Backend name used in errors.
    const PROVIDER_NAME: &'static str = "cloud";

    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            voice_override: None,
            sample_rate: crate::config::DEFAULT_SAMPLE_RATE,
            staging_dir: None,
            client: None,
        }
    }

    /// Adapter configured from the `cloud` section.
    pub fn from_config(config: &NarratorConfig) -> Self {
        Self {
            voice_override: config.cloud.voice.clone(),
            sample_rate: config.sample_rate,
            staging_dir: config.cloud.staging_dir.clone(),
            ..Self::new(config.cloud.resolved_endpoint(), config.cloud.api_key.clone())
        }
    }

    /// Use one voice for every language.
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice_override = Some(voice.into());
        self
    }

    /// Stage downloads in `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The voice that will speak `language`.
    pub fn resolve_voice(&self, language: Language) -> &str {
        self.voice_override
            .as_deref()
            .unwrap_or_else(|| voice_for(language))
    }

    /// Check that credentials are present and build the HTTP client.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::BackendUnavailable` when no API key is configured,
    /// or `TtsError::Initialization` if the client cannot be built.
    pub fn initialize(&mut self) -> Result<(), TtsError> {
        if self.api_key.as_deref().is_none_or(|key| key.trim().is_empty()) {
            return Err(TtsError::BackendUnavailable {
                backend: Self::PROVIDER_NAME.into(),
                reason: "no API key configured (set NARRATOR_CLOUD_KEY)".into(),
            });
        }

        // Pooled connections would be bound to a runtime that no longer exists
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| TtsError::Initialization {
                backend: Self::PROVIDER_NAME.into(),
                message: e.to_string(),
            })?;

        self.client = Some(client);
        tracing::debug!(endpoint = %self.endpoint, "Cloud voice client ready");
        Ok(())
    }

    /// Synthesize `text` and return the MP3 stream.
    ///
    /// Blocks the calling thread until the request completes. Must not be
    /// called from inside an async runtime.
    ///
    /// ## Errors
    ///
    /// Returns `TtsError::Synthesis` if the request fails, the service
    /// answers with an error status, or the stream is empty.
    pub fn synthesize(&self, text: &str, language: Language) -> Result<AdapterOutput, TtsError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| TtsError::synthesis("cloud voice client is not initialized"))?;
        let voice = self.resolve_voice(language);
        let ssml = build_ssml(text, language, voice);

        let staging = self.create_staging_file()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TtsError::synthesis(format!("failed to start event loop: {}", e)))?;
        let fetched = runtime.block_on(self.fetch_into(client, voice, ssml, &staging));
        drop(runtime);
        let written = fetched?;

        if written == 0 {
            return Err(TtsError::synthesis("cloud voice returned an empty audio stream"));
        }

        let bytes = std::fs::read(staging.path()).map_err(TtsError::synthesis)?;
        if bytes.is_empty() {
            return Err(TtsError::synthesis("cloud voice returned an empty audio stream"));
        }

        tracing::debug!(voice, audio_size = bytes.len(), "Received cloud voice audio");

        Ok(AdapterOutput::Compressed {
            sample_rate: self.sample_rate,
            bytes,
        })
    }

    fn create_staging_file(&self) -> Result<NamedTempFile, TtsError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("narrator-").suffix(".mp3");
        let staging = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        staging.map_err(|e| TtsError::synthesis(format!("failed to create staging file: {}", e)))
    }

    /// Send the request and stream the body into the staging file.
    async fn fetch_into(
        &self,
        client: &reqwest::Client,
        voice: &str,
        ssml: String,
        staging: &NamedTempFile,
    ) -> Result<u64, TtsError> {
        let url = format!("{}{}", self.endpoint, SYNTHESIS_PATH);

        tracing::debug!(
            url = %url,
            voice,
            ssml_len = ssml.len(),
            "Sending cloud voice request"
        );

        let mut request = client
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/ssml+xml"))
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(ssml);
        if let Some(key) = &self.api_key {
            request = request.header("Ocp-Apim-Subscription-Key", key.as_str());
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| TtsError::synthesis(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::synthesis(format!(
                "cloud voice returned {}: {}",
                status,
                body.trim()
            )));
        }

        let handle = staging.reopen().map_err(TtsError::synthesis)?;
        let mut file = tokio::fs::File::from_std(handle);
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| {
            TtsError::synthesis(format!("audio stream interrupted: {}", e))
        })? {
            file.write_all(&chunk).await.map_err(TtsError::synthesis)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(TtsError::synthesis)?;

        Ok(written)
    }
}
