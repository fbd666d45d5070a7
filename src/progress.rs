//! Document loading progress.
//!
//! Reports what `askdoc` is doing while a document is read, split and
//! embedded, so users of large PDFs see how far indexing has got.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event while loading a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Reading and extracting text from the file.
    Extracting { path: String },
    /// Text extracted; cutting it into segments.
    Splitting { pages: u64 },
    /// Embedding segments: n done out of total.
    Embedding { n: u64, total: u64 },
    /// Index built; questions can be asked.
    Ready { segments: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "index  embedding  64 / 1,024 segments".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Extracting { path } => format!("load {}  extracting...\n", path),
            IngestProgressEvent::Splitting { pages } => {
                format!("load  splitting  {} pages\n", format_number(*pages))
            }
            IngestProgressEvent::Embedding { n, total } => format!(
                "index  embedding  {} / {} segments\n",
                format_number(*n),
                format_number(*total)
            ),
            IngestProgressEvent::Ready { segments } => {
                format!("index  ready  {} segments\n", format_number(*segments))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &IngestProgressEvent) -> serde_json::Value {
        match event {
            IngestProgressEvent::Extracting { path } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "path": path
            }),
            IngestProgressEvent::Splitting { pages } => serde_json::json!({
                "event": "progress",
                "phase": "splitting",
                "pages": pages
            }),
            IngestProgressEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Ready { segments } => serde_json::json!({
                "event": "progress",
                "phase": "ready",
                "segments": segments
            }),
        }
    }
}

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
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

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
