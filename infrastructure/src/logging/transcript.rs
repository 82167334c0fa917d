//! JSONL transcript of collaboration events.
//!
//! Each [`CollaborationEvent`] becomes one JSON line carrying `type`, `seq`
//! and `timestamp`. The file is opened in append mode so several runs can
//! share one transcript.

use concord_application::{CollaborationEvent, CollaborationLogger};
use serde_json::{Value, json};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

struct TranscriptWriter {
    out: BufWriter<File>,
    seq: u64,
}

/// Collaboration logger that appends one JSON object per line.
///
/// Thread-safe via a `Mutex` around the writer. Flushes on `Drop`.
pub struct JsonlCollaborationLogger {
    writer: Mutex<TranscriptWriter>,
    path: PathBuf,
}

impl JsonlCollaborationLogger {
    /// Open (or create) the transcript at `path`, creating parent
    /// directories as needed.
    ///
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(dir = %parent.display(), error = %e, "Could not create transcript directory");
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not open transcript");
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(TranscriptWriter {
                out: BufWriter::new(file),
                seq: 0,
            }),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn record(event: CollaborationEvent, seq: u64) -> Value {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    match event.payload {
        Value::Object(mut map) => {
            map.insert("type".to_string(), Value::String(event.event_type.to_string()));
            map.insert("seq".to_string(), json!(seq));
            map.insert("timestamp".to_string(), Value::String(timestamp));
            Value::Object(map)
        }
        other => json!({
            "type": event.event_type,
            "seq": seq,
            "timestamp": timestamp,
            "data": other,
        }),
    }
}

impl CollaborationLogger for JsonlCollaborationLogger {
    fn log(&self, event: CollaborationEvent) {
        // A poisoned writer only loses transcript lines.
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        writer.seq += 1;
        let line = record(event, writer.seq);
        let Ok(line) = serde_json::to_string(&line) else {
            return;
        };
        if let Err(e) = writeln!(writer.out, "{}", line).and_then(|_| writer.out.flush()) {
            warn!(path = %self.path.display(), error = %e, "Transcript write failed");
        }
    }
}

impl Drop for JsonlCollaborationLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.out.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_events_are_written_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/run.jsonl");
        let logger = JsonlCollaborationLogger::new(&path).unwrap();

        logger.log(CollaborationEvent::new(
            "session_started",
            json!({ "session": "s-1", "protocol": "swarm", "agents": ["a", "b"] }),
        ));
        logger.log(CollaborationEvent::new(
            "session_finished",
            json!({ "session": "s-1", "status": "completed" }),
        ));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "session_started");
        assert_eq!(lines[0]["seq"], 1);
        assert_eq!(lines[0]["agents"][1], "b");
        assert!(lines[0]["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(lines[1]["type"], "session_finished");
        assert_eq!(lines[1]["seq"], 2);
    }

    #[test]
    fn test_non_object_payload_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let logger = JsonlCollaborationLogger::new(&path).unwrap();

        logger.log(CollaborationEvent::new("allocation", json!(["a", "b"])));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["type"], "allocation");
        assert_eq!(lines[0]["data"], json!(["a", "b"]));
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");

        for session in ["s-1", "s-2"] {
            let logger = JsonlCollaborationLogger::new(&path).unwrap();
            logger.log(CollaborationEvent::new(
                "session_started",
                json!({ "session": session }),
            ));
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["session"], "s-1");
        assert_eq!(lines[1]["session"], "s-2");
    }

    #[test]
    fn test_directory_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonlCollaborationLogger::new(dir.path()).is_none());
    }
}
