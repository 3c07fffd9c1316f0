//! Preload progress reporting.
//!
//! The full pipeline reports a percentage (0–100, never decreasing) and a
//! human-readable status line after each step so a splash screen or the CLI
//! can show what is happening. Progress is emitted on **stderr** so stdout
//! stays parseable for scripts.

use std::io::Write;
use std::sync::Mutex;

/// A single progress update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreloadProgress {
    pub percent: u8,
    pub status: String,
}

/// Receives progress updates from the pipelines.
pub trait PreloadProgressReporter: Send + Sync {
    fn report(&self, event: PreloadProgress);
}

/// Human-friendly progress on stderr: "preload  42%  Loading Movies (3 / 8)".
pub struct StderrProgress;

impl PreloadProgressReporter for StderrProgress {
    fn report(&self, event: PreloadProgress) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "preload {:>4}%  {}", event.percent, event.status);
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl PreloadProgressReporter for JsonProgress {
    fn report(&self, event: PreloadProgress) {
        let line = serde_json::json!({
            "event": "preload_progress",
            "percent": event.percent,
            "status": event.status,
        });
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
        let _ = err.flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl PreloadProgressReporter for NoProgress {
    fn report(&self, _event: PreloadProgress) {}
}

/// Clamps updates so the reported percentage never goes backwards or past 100.
pub struct ProgressTracker<'a> {
    reporter: &'a dyn PreloadProgressReporter,
    last: Mutex<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(reporter: &'a dyn PreloadProgressReporter) -> Self {
        Self {
            reporter,
            last: Mutex::new(0),
        }
    }

    pub fn update(&self, percent: u8, status: impl Into<String>) {
        let percent = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            *last = (*last).max(percent.min(100));
            *last
        };
        self.reporter.report(PreloadProgress {
            percent,
            status: status.into(),
        });
    }

    pub fn percent(&self) -> u8 {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Map `done / total` onto the `[from, to]` band of the overall percentage.
pub fn band(from: u8, to: u8, done: usize, total: usize) -> u8 {
    if total == 0 || to <= from {
        return to;
    }
    let span = (to - from) as usize;
    from + ((span * done.min(total)) / total) as u8
}

/// `1234567` → `"1,234,567"`.
pub(crate) fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut groups: Vec<&str> = Vec::new();
    if head > 0 {
        groups.push(&digits[..head]);
    }
    let mut at = head;
    while at < digits.len() {
        groups.push(&digits[at..at + 3]);
        at += 3;
    }
    groups.join(",")
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn PreloadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
