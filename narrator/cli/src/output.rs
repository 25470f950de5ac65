//! Writers for the two output channels.

use std::io::{self, Write};
use std::process::ExitCode;

use serde::Serialize;

/// Write audio bytes unframed and flush.
pub fn write_audio<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(bytes)?;
    out.flush()
}

/// Write one JSON object followed by a newline.
///
/// Failures to write diagnostics are ignored: there is no other channel left
/// to report them on.
pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) {
    if let Ok(line) = serde_json::to_string(value) {
        write_line(out, &line);
    }
}

/// Write an already encoded JSON line.
pub fn write_line<W: Write>(out: &mut W, line: &str) {
    let _ = writeln!(out, "{}", line);
    let _ = out.flush();
}

/// Write `{"error": <message>}` and return the failure exit code.
pub fn write_error<W: Write>(out: &mut W, error: &dyn std::fmt::Display) -> ExitCode {
    tracing::debug!(error = %error, "Invocation failed");
    write_json(out, &serde_json::json!({ "error": error.to_string() }));
    ExitCode::FAILURE
}
