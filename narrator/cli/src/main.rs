//! Narrator CLI - text-to-speech for code explanations
//!
//! Audio bytes go to stdout with no framing. Everything else (metadata,
//! info, errors) is a single JSON object on stderr, so a host process can
//! read the two channels without the text corrupting the audio.

mod output;

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use narrator_lib::{
    AudioEnvelope, BackendKind, Language, NarratorConfig, SynthesisService, TtsError,
};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::output::{write_audio, write_error, write_json, write_line};

/// Maximum characters read from stdin.
const STDIN_CHAR_LIMIT: usize = 10_000;

/// Bytes read from stdin; enough for [`STDIN_CHAR_LIMIT`] four-byte characters.
const STDIN_BYTE_LIMIT: u64 = STDIN_CHAR_LIMIT as u64 * 4;

#[derive(Parser, Debug)]
#[command(name = "narrator")]
#[command(about = "Synthesize narration audio for code explanations", long_about = None)]
#[command(version)]
struct Cli {
    /// Text to synthesize (use "-" to read from stdin)
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,

    /// Language of the text (en, zh, ja, es, fr, de)
    #[arg(long, default_value = "en")]
    lang: String,

    /// Print backend information as JSON and exit
    #[arg(long)]
    info: bool,

    /// Synthesis backend (local or cloud)
    #[arg(long, value_parser = parse_backend)]
    backend: Option<BackendKind>,

    /// Compute device for the local model (cuda, metal or cpu)
    #[arg(long)]
    device: Option<String>,

    /// Model weights location for the local model runtime
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Cloud voice name, overriding the per-language default
    #[arg(long)]
    voice: Option<String>,

    /// Cloud endpoint base URL
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv). Logs go to stderr.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    log_verbosity: u8,

    /// Output logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    BackendKind::parse(value).ok_or_else(|| format!("unknown backend '{}' (expected local or cloud)", value))
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply_to(&self, config: &mut NarratorConfig) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
        }
        if let Some(model) = &self.model {
            config.model.path = Some(model.clone());
        }
        if let Some(voice) = &self.voice {
            config.cloud.voice = Some(voice.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            config.cloud.endpoint = Some(endpoint.clone());
        }
    }
}

/// Initialize tracing.
///
/// Stderr doubles as the JSON diagnostic channel, so nothing is logged unless
/// `-v` or `RUST_LOG` asks for it.
fn init_tracing(verbose: u8, json: bool) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "off".to_string(),
            1 => "warn,narrator_lib=info".to_string(),
            2 => "info,narrator_lib=debug".to_string(),
            _ => "debug,narrator_lib=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("off"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(io::stderr)
                    .compact(),
            )
            .init();
    }
}

/// Read text from stdin, capped at [`STDIN_CHAR_LIMIT`] characters.
fn read_from_stdin() -> io::Result<String> {
    let mut bytes = Vec::new();
    io::stdin().take(STDIN_BYTE_LIMIT).read_to_end(&mut bytes)?;
    decode_stdin(&bytes)
}

/// Decode piped bytes, keeping at most [`STDIN_CHAR_LIMIT`] characters.
///
/// The byte cap can split the final character; that incomplete tail is
/// dropped. Invalid UTF-8 anywhere else is an error.
fn decode_stdin(bytes: &[u8]) -> io::Result<String> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&bytes[..e.valid_up_to()])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
        Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
    };
    let limited: String = text.chars().take(STDIN_CHAR_LIMIT).collect();
    Ok(limited.trim().to_string())
}

/// Resolve the text argument, reading stdin for "-".
fn resolve_text(text: Option<&str>) -> Result<String, TtsError> {
    match text {
        None => Err(TtsError::synthesis("no text provided (use --text or --info)")),
        Some("-") => read_from_stdin()
            .map_err(|e| TtsError::synthesis(format!("failed to read stdin: {}", e))),
        Some(text) => Ok(text.to_string()),
    }
}

/// Run one invocation against the given output channels.
///
/// Info mode always succeeds: an unusable config file falls back to the
/// defaults with a warning.
fn run<O: io::Write, E: io::Write>(cli: &Cli, stdout: &mut O, stderr: &mut E) -> ExitCode {
    let mut config = match NarratorConfig::load() {
        Ok(config) => config,
        Err(e) if cli.info => {
            tracing::warn!(error = %e, "Ignoring config file for info query");
            NarratorConfig::default()
        }
        Err(e) => return write_error(stderr, &e),
    };
    cli.apply_to(&mut config);
    tracing::debug!(?config, "Resolved configuration");

    let mut service = SynthesisService::from_config(&config);

    if cli.info {
        write_json(stderr, &service.get_info());
        return ExitCode::SUCCESS;
    }

    let text = match resolve_text(cli.text.as_deref()) {
        Ok(text) => text,
        Err(e) => return write_error(stderr, &e),
    };

    let language = Language::from_code(&cli.lang);
    match service.synthesize(&text, language) {
        Ok(envelope) => emit(&envelope, stdout, stderr),
        Err(e) => write_error(stderr, &e),
    }
}

/// Write the audio to `stdout` and its metadata to `stderr`.
///
/// The metadata is encoded before any audio is written, so nothing on stdout
/// precedes an encoding failure. A write error after some audio bytes have
/// reached stdout cannot be retracted; stdout then holds a truncated stream
/// and stderr the error.
fn emit<O: io::Write, E: io::Write>(
    envelope: &AudioEnvelope,
    stdout: &mut O,
    stderr: &mut E,
) -> ExitCode {
    let metadata = match serde_json::to_string(&envelope.metadata()) {
        Ok(line) => line,
        Err(e) => {
            return write_error(stderr, &TtsError::synthesis(format!("failed to encode metadata: {}", e)));
        }
    };
    if let Err(e) = write_audio(stdout, &envelope.audio_bytes) {
        return write_error(stderr, &TtsError::synthesis(format!("failed to write audio: {}", e)));
    }
    write_line(stderr, &metadata);
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_verbosity, cli.log_json);

    let stdout = io::stdout();
    let stderr = io::stderr();
    run(&cli, &mut stdout.lock(), &mut stderr.lock())
}
