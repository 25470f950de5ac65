//! Integration tests for the narrator CLI.
//!
//! These verify the stdout/stderr contract end to end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_VARS: &[&str] = &[
    "RUST_LOG",
    "NARRATOR_BACKEND",
    "NARRATOR_DEVICE",
    "NARRATOR_MODEL_COMMAND",
    "NARRATOR_MODEL_PATH",
    "NARRATOR_CLOUD_ENDPOINT",
    "NARRATOR_CLOUD_REGION",
    "NARRATOR_CLOUD_KEY",
    "AZURE_SPEECH_KEY",
    "NARRATOR_VOICE",
];

/// A command isolated from the caller's environment and config files.
fn narrator_cmd(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("narrator").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("NARRATOR_CONFIG", workdir.path().join("missing.json"));
    cmd.current_dir(workdir.path());
    cmd
}

fn stderr_json(output: &std::process::Output) -> serde_json::Value {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().last().expect("stderr should not be empty");
    serde_json::from_str(line).expect("stderr should be JSON")
}

fn mp3_payload() -> Vec<u8> {
    let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    bytes.extend(std::iter::repeat_n(0xAB, 4_000));
    bytes
}

#[test]
fn cli_shows_help() {
    let dir = TempDir::new().unwrap();
    narrator_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Synthesize narration audio"))
        .stdout(predicate::str::contains("--text"))
        .stdout(predicate::str::contains("--info"));
}

#[test]
fn info_reports_unloaded_local_backend() {
    let dir = TempDir::new().unwrap();
    let output = narrator_cmd(&dir).arg("--info").output().unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let info = stderr_json(&output);
    assert_eq!(info["backendKind"], "local");
    assert_eq!(info["modelLoaded"], false);
    assert_eq!(info["sampleRate"], 24_000);
    assert!(info["accelerationAvailable"].is_boolean());
}

#[test]
fn info_for_cloud_backend_names_default_voice() {
    let dir = TempDir::new().unwrap();
    let output = narrator_cmd(&dir)
        .args(["--info", "--backend", "cloud"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let info = stderr_json(&output);
    assert_eq!(info["backendKind"], "cloud");
    assert_eq!(info["voice"], "en-US-AriaNeural");
    assert_eq!(info["modelLoaded"], false);
}

#[test]
fn missing_text_fails_with_json_error() {
    let dir = TempDir::new().unwrap();
    let output = narrator_cmd(&dir).output().unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let error = stderr_json(&output);
    assert!(error["error"].as_str().unwrap().contains("no text provided"));
}

#[test]
fn empty_text_fails_before_loading() {
    let dir = TempDir::new().unwrap();
    let output = narrator_cmd(&dir)
        .args(["--text", "", "--lang", "zh"])
        .env("NARRATOR_MODEL_COMMAND", "narrator-runtime-that-does-not-exist")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let error = stderr_json(&output);
    assert!(error["error"].as_str().unwrap().contains("must not be empty"));
}

#[test]
fn missing_runtime_reports_model_loading_failure() {
    let dir = TempDir::new().unwrap();
    let output = narrator_cmd(&dir)
        .args(["--text", "Hello world", "--device", "cpu"])
        .env("NARRATOR_MODEL_COMMAND", "narrator-runtime-that-does-not-exist")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let error = stderr_json(&output);
    assert!(
        error["error"]
            .as_str()
            .unwrap()
            .starts_with("Model loading failed")
    );
}

#[test]
fn unknown_backend_is_rejected() {
    let dir = TempDir::new().unwrap();
    narrator_cmd(&dir)
        .args(["--backend", "carrier-pigeon", "--text", "Hi"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

#[test]
fn cloud_synthesis_writes_audio_and_metadata() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(body_string_contains("zh-CN-XiaoxiaoNeural"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(mp3_payload()))
            .mount(&server),
    );

    let dir = TempDir::new().unwrap();
    let output = narrator_cmd(&dir)
        .args(["--backend", "cloud", "--endpoint", &server.uri()])
        .args(["--text", "你好", "--lang", "zh"])
        .env("NARRATOR_CLOUD_KEY", "test-key")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(output.stdout, mp3_payload());

    let metadata = stderr_json(&output);
    assert_eq!(metadata["sampleRate"], 24_000);
    assert_eq!(metadata["size"], mp3_payload().len());
    assert!(metadata["duration"].as_f64().unwrap() > 0.0);
}

#[test]
fn cloud_text_from_stdin() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(body_string_contains("piped narration"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(mp3_payload()))
            .mount(&server),
    );

    let dir = TempDir::new().unwrap();
    narrator_cmd(&dir)
        .args(["--backend", "cloud", "--endpoint", &server.uri(), "--text", "-"])
        .env("NARRATOR_CLOUD_KEY", "test-key")
        .write_stdin("  piped narration \n")
        .assert()
        .success()
        .stdout(mp3_payload());
}

#[test]
fn multibyte_stdin_over_ten_thousand_bytes() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(body_string_contains("zh-CN-XiaoxiaoNeural"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(mp3_payload()))
            .mount(&server),
    );

    // 3,334 characters, 10,002 bytes
    let text = "你".repeat(3_334);

    let dir = TempDir::new().unwrap();
    narrator_cmd(&dir)
        .args(["--backend", "cloud", "--endpoint", &server.uri()])
        .args(["--text", "-", "--lang", "zh"])
        .env("NARRATOR_CLOUD_KEY", "test-key")
        .write_stdin(text.clone())
        .assert()
        .success()
        .stdout(mp3_payload());

    let requests = rt.block_on(server.received_requests()).unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.contains(&text));
}

#[test]
fn info_survives_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("broken.json");
    std::fs::write(&config, "{ not json").unwrap();

    let output = narrator_cmd(&dir)
        .arg("--info")
        .env("NARRATOR_CONFIG", &config)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let info = stderr_json(&output);
    assert_eq!(info["backendKind"], "local");
    assert_eq!(info["modelLoaded"], false);
}

#[test]
fn synthesis_rejects_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("zero.json");
    std::fs::write(&config, r#"{ "sample_rate": 0 }"#).unwrap();

    let output = narrator_cmd(&dir)
        .args(["--text", "Hello"])
        .env("NARRATOR_CONFIG", &config)
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let error = stderr_json(&output);
    assert!(error["error"].as_str().unwrap().contains("sample_rate"));
}

#[test]
fn cloud_failure_writes_nothing_to_stdout() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server),
    );

    let dir = TempDir::new().unwrap();
    let output = narrator_cmd(&dir)
        .args(["--backend", "cloud", "--endpoint", &server.uri(), "--text", "Hello"])
        .env("NARRATOR_CLOUD_KEY", "test-key")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let error = stderr_json(&output);
    let message = error["error"].as_str().unwrap();
    assert!(message.starts_with("TTS synthesis failed"));
    assert!(message.contains("upstream exploded"));
}

#[cfg(unix)]
#[test]
fn local_synthesis_writes_pcm_wav() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();

    let fixture = dir.path().join("fixture.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&fixture, spec).unwrap();
    for i in 0..4_800 {
        writer.write_sample((i as f32 / 20.0).sin() * 1.5).unwrap();
    }
    writer.finalize().unwrap();

    let runtime = dir.path().join("fake-runtime");
    std::fs::write(
        &runtime,
        format!(
            "#!/bin/sh\nout=\"\"\nwhile [ $# -gt 0 ]; do\n  case \"$1\" in\n    --output) out=\"$2\"; shift 2 ;;\n    *) shift ;;\n  esac\ndone\ncp \"{}\" \"$out\"\n",
            fixture.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();

    let output = narrator_cmd(&dir)
        .args(["--text", "Hello world", "--lang", "en", "--device", "cpu"])
        .env("NARRATOR_MODEL_COMMAND", &runtime)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(output.stdout.len() % 2, 0);

    let reader = hound::WavReader::new(std::io::Cursor::new(&output.stdout)).unwrap();
    assert_eq!(reader.spec().sample_rate, 24_000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().bits_per_sample, 16);
    assert_eq!(reader.len(), 4_800);

    let metadata = stderr_json(&output);
    assert_eq!(metadata["sampleRate"], 24_000);
    assert_eq!(metadata["size"], output.stdout.len());
    assert_eq!(metadata["duration"], 0.2);
}
