//! Index build progress reporting.
//!
//! Reports observable progress during `lore index build` so users see
//! which chapter is being chunked and how far embedding has got.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for an index build.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestEvent {
    /// Reading pages from the source document.
    Loading { document: String },
    /// One chapter has been split into chunks.
    Chunked { chapter: String, chunks: u64 },
    /// `n` of `total` chunks embedded so far.
    Embedding { n: u64, total: u64 },
    /// Writing the finished index to disk.
    Persisting { chunks: u64 },
}

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: IngestEvent);
}

/// Human-friendly progress on stderr: "index  embedding  1,234 / 5,000 chunks".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Loading { document } => format!("index  loading {}\n", document),
            IngestEvent::Chunked { chapter, chunks } => {
                format!("index  chunked {}  {} chunks\n", chapter, format_number(*chunks))
            }
            IngestEvent::Embedding { n, total } => format!(
                "index  embedding  {} / {} chunks\n",
                format_number(*n),
                format_number(*total)
            ),
            IngestEvent::Persisting { chunks } => {
                format!("index  writing {} chunks\n", format_number(*chunks))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &IngestEvent) -> serde_json::Value {
        match event {
            IngestEvent::Loading { document } => serde_json::json!({
                "event": "progress",
                "phase": "loading",
                "document": document
            }),
            IngestEvent::Chunked { chapter, chunks } => serde_json::json!({
                "event": "progress",
                "phase": "chunking",
                "chapter": chapter,
                "chunks": chunks
            }),
            IngestEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
            IngestEvent::Persisting { chunks } => serde_json::json!({
                "event": "progress",
                "phase": "persisting",
                "chunks": chunks
            }),
        }
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: IngestEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
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

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn json_events_carry_phase() {
        let v = JsonProgress::to_json(&IngestEvent::Embedding { n: 64, total: 300 });
        assert_eq!(v["phase"], "embedding");
        assert_eq!(v["n"], 64);
        assert_eq!(v["total"], 300);

        let v = JsonProgress::to_json(&IngestEvent::Chunked {
            chapter: "Raças".to_string(),
            chunks: 12,
        });
        assert_eq!(v["phase"], "chunking");
        assert_eq!(v["chapter"], "Raças");
    }
}
