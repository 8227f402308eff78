//! Line-oriented output shared by the logging decorators.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Append-only destination for operator-facing output.
///
/// Each call writes one complete entry; a multi-line entry is written in a
/// single call so concurrent requests never interleave inside it.
pub trait LogSink: Send + Sync + 'static {
    fn write_line(&self, line: &str);
}

/// Sink shared between the decorators of one pipeline.
pub type SharedSink = Arc<dyn LogSink>;

/// Writes to the process stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn shared() -> SharedSink {
        Arc::new(Self)
    }
}

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        // stdout going away must not take a request down with it
        let _ = writeln!(out, "{line}");
    }
}

/// Collects entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of every entry written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// All entries joined with newlines.
    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
