//! Audit sinks
//!
//! Durable destinations the writer appends drained entries to.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::entry::AuditEntry;

/// Destination for drained audit entries. Only the writer calls it.
pub trait AuditSink: Send + 'static {
    fn append(&mut self, entry: &AuditEntry) -> io::Result<()>;

    /// Called after each drained batch.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// == Memory Sink ==
/// Collects entries in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditSink for MemorySink {
    fn append(&mut self, entry: &AuditEntry) -> io::Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

// == JSON Lines Sink ==
/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonLinesSink {
    fn append(&mut self, entry: &AuditEntry) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        writer.append(&AuditEntry::new("cache", "get", 0, true, "")).unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].action, "get");
    }

    #[test]
    fn test_json_lines_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let mut sink = JsonLinesSink::open(&path).unwrap();
        sink.append(&AuditEntry::new("cache", "put", 1, true, "a")).unwrap();
        sink.append(&AuditEntry::new("cache", "put", 2, false, "b")).unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Vec<AuditEntry> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].details, "b");
        assert!(!parsed[1].success);
    }

    #[test]
    fn test_json_lines_sink_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        for details in ["first", "second"] {
            let mut sink = JsonLinesSink::open(&path).unwrap();
            sink.append(&AuditEntry::new("api", "call", 0, true, details)).unwrap();
            sink.flush().unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
