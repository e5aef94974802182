//! Run Log
//!
//! The process-wide output tee: operator-facing lines go to stdout and to
//! `profile.log`, build-tool output and diagnostics go to the log file only.
//! The log is flushed at every invocation boundary so a crashed run still
//! leaves a complete record on disk.

use chrono::Utc;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

enum Sink {
    File(BufWriter<File>),
    Buffer(Vec<u8>),
}

impl Sink {
    fn write_all(&mut self, bytes: &[u8]) {
        let result = match self {
            Sink::File(file) => file.write_all(bytes),
            Sink::Buffer(buffer) => {
                buffer.extend_from_slice(bytes);
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to write to run log");
        }
    }

    fn flush(&mut self) {
        if let Sink::File(file) = self {
            if let Err(e) = file.flush() {
                tracing::error!(error = %e, "failed to flush run log");
            }
        }
    }
}

/// Shared handle to the run log. Cloning shares the underlying sink.
#[derive(Clone)]
pub struct RunLog {
    sink: Arc<Mutex<Sink>>,
}

impl RunLog {
    /// Create a log backed by a file, writing a timestamp header.
    pub fn create(path: &Path) -> io::Result<RunLog> {
        let file = File::create(path)?;
        let log = RunLog {
            sink: Arc::new(Mutex::new(Sink::File(BufWriter::new(file)))),
        };
        log.detail(&format!("Run started at {}", Utc::now().to_rfc3339()));
        Ok(log)
    }

    /// Create a log backed by an in-memory buffer, for tests.
    pub fn buffer() -> RunLog {
        RunLog {
            sink: Arc::new(Mutex::new(Sink::Buffer(Vec::new()))),
        }
    }

    /// An operator-facing line: printed to stdout and recorded in the log.
    pub fn line(&self, message: &str) {
        println!("{}", message);
        self.write(message.as_bytes());
        self.write(b"\n");
    }

    /// A log-only line.
    pub fn detail(&self, message: &str) {
        self.write(message.as_bytes());
        self.write(b"\n");
    }

    /// Raw build-tool output, recorded verbatim.
    pub fn child_output(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.write(bytes);
        if !bytes.ends_with(b"\n") {
            self.write(b"\n");
        }
    }

    /// Flush the file sink; called at invocation boundaries.
    pub fn flush(&self) {
        self.sink.lock().expect("run log poisoned").flush();
    }

    /// Contents written so far; only available for buffer-backed logs.
    pub fn contents(&self) -> Option<String> {
        match &*self.sink.lock().expect("run log poisoned") {
            Sink::Buffer(buffer) => Some(String::from_utf8_lossy(buffer).into_owned()),
            Sink::File(_) => None,
        }
    }

    fn write(&self, bytes: &[u8]) {
        self.sink.lock().expect("run log poisoned").write_all(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_log_records_lines_and_child_output() {
        let log = RunLog::buffer();
        log.line("* Running build 1");
        log.child_output(b"<gradle-version: 3.1>\n");
        log.child_output(b"no trailing newline");

        let contents = log.contents().unwrap();
        assert_eq!(
            contents,
            "* Running build 1\n<gradle-version: 3.1>\nno trailing newline\n"
        );
    }

    #[test]
    fn file_log_persists_after_flush() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("profile.log");
        let log = RunLog::create(&path).unwrap();
        log.line("* Running warm-up build 1");
        log.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Run started at "));
        assert!(contents.contains("* Running warm-up build 1\n"));
    }
}
