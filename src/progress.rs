//! Directory sweep progress reporting.
//!
//! Reports observable progress during `ksync index` so users see what is
//! being scanned and how much is left. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;
use std::str::FromStr;

/// A single progress event for a directory sweep.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SweepProgressEvent {
    /// Walking the managed root. Total unknown.
    Discovering { root: String },
    /// `n` files processed out of `total`; `path` is the file just handled.
    Indexing { path: String, n: u64, total: u64 },
}

/// Reports sweep progress. Implementations write to stderr (human or JSON).
pub trait SweepProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the indexer.
    fn report(&self, event: SweepProgressEvent);
}

/// Human-friendly progress on stderr: "index /srv/kb  1,234 / 5,000 files".
pub struct StderrProgress;

impl SweepProgressReporter for StderrProgress {
    fn report(&self, event: SweepProgressEvent) {
        let line = match &event {
            SweepProgressEvent::Discovering { root } => {
                format!("index {}  discovering...\n", root)
            }
            SweepProgressEvent::Indexing { path, n, total } => format!(
                "index  {} / {} files  {}\n",
                format_number(*n),
                format_number(*total),
                path
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SweepProgressReporter for JsonProgress {
    fn report(&self, event: SweepProgressEvent) {
        let obj = match &event {
            SweepProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root
            }),
            SweepProgressEvent::Indexing { path, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "indexing",
                "path": path,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SweepProgressReporter for NoProgress {
    fn report(&self, _event: SweepProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
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

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn SweepProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "invalid progress mode '{}': expected off, human, or json",
                other
            )),
        }
    }
}
