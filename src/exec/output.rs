// src/exec/output.rs

//! Log sink contract and the per-line rewrite applied to toolchain output.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info};

/// Marker toolchains print in front of a file path.
pub const FILE_MARKER: &str = "File: ";

/// Replacement that turns the marker into a clickable resource locator.
pub const FILE_LOCATOR: &str = "file://";

/// Append-only text sink receiving process output.
///
/// Implementations must tolerate concurrent appends from the stdout and
/// stderr readers of the same run. Appends come from runtime tasks, never
/// from inside a coordinator call, so a sink may query the coordinator. It
/// must not block on a run's completion.
pub trait LogSink: Send + Sync {
    fn append(&self, line: &str);

    /// Bring the output in front of the user. Called once per run start.
    fn reveal(&self) {}
}

/// Sink that writes every line to our own stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn append(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }

    fn reveal(&self) {
        info!("streaming toolchain output to stdout");
    }
}

/// Rewrite every `File: ` marker into `file://`.
pub fn rewrite_file_markers(line: &str) -> String {
    line.replace(FILE_MARKER, FILE_LOCATOR)
}

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Read `reader` line by line until EOF, calling `on_line` for each line
/// without its terminator. Invalid UTF-8 is replaced rather than ending the
/// stream.
pub async fn for_each_line<R, F>(reader: R, stream: OutputStream, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                on_line(text.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                debug!(stream = stream.as_str(), error = %e, "output stream read error");
                break;
            }
        }
    }
}
