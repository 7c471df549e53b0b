//! Durable, append-only log of verified solutions.
//!
//! The log is a pretty-printed JSON array and the source of truth for the
//! memory half of the retrieval corpus. Appends read the whole file, push
//! one entry and write the whole file back. There is no locking: a single
//! writer is assumed and concurrent writers can lose updates.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use mentor_core::{MemoryEntry, MentorError, MentorResult};

pub struct MemoryLog {
    path: PathBuf,
}

impl MemoryLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The log as raw JSON values. A missing or blank file is empty; content
    /// that is not a JSON array is an error.
    fn read_raw(&self) -> MentorResult<Vec<Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MentorError::Io(e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&content)? {
            Value::Array(items) => Ok(items),
            other => Err(MentorError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("memory log is a JSON {}, not an array", json_kind(&other)),
            ))),
        }
    }

    /// Read the log strictly. A missing file is an empty log; unreadable or
    /// malformed content is an error. Well-formed entries that do not match
    /// the packet shape are skipped with a warning.
    pub fn try_load(&self) -> MentorResult<Vec<MemoryEntry>> {
        let raw = self.read_raw()?;
        let mut entries = Vec::with_capacity(raw.len());
        for (i, value) in raw.into_iter().enumerate() {
            match serde_json::from_value::<MemoryEntry>(value) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %self.path.display(), index = i, "skipping memory entry: {e}"),
            }
        }
        Ok(entries)
    }

    /// Read the log, treating any failure as an empty log. The file is left
    /// untouched.
    pub fn load(&self) -> Vec<MemoryEntry> {
        match self.try_load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), "memory log unreadable, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Append one entry and persist the full log. Returns the new length.
    ///
    /// Existing items are carried over verbatim, including ones this version
    /// cannot read. Only a file that is not a JSON array is replaced.
    pub fn append(&self, entry: MemoryEntry) -> MentorResult<usize> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut history = match self.read_raw() {
            Ok(items) => items,
            Err(e) => {
                warn!(path = %self.path.display(), "memory log unreadable, starting over: {e}");
                Vec::new()
            }
        };
        history.push(serde_json::to_value(&entry)?);

        let json = serde_json::to_string_pretty(&history)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), entries = history.len(), "memory log written");
        Ok(history.len())
    }

    /// Number of readable entries.
    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::{Feedback, Topic};

    fn entry(question: &str, answer: &str) -> MemoryEntry {
        MemoryEntry::new(
            question.into(),
            Topic::Probability,
            vec!["Generated Python Code".into()],
            answer.into(),
            "VERIFIED_CORRECT".into(),
        )
        .with_input_type("Text")
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::open(dir.path().join("nope.json"));
        assert!(log.is_empty());
        assert!(log.try_load().unwrap().is_empty());
    }

    #[test]
    fn test_append_grows_by_one_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::open(dir.path().join("memory").join("solution_history.json"));

        let packets: Vec<MemoryEntry> = (0..4)
            .map(|i| entry(&format!("question {i}"), &format!("answer {i}")))
            .collect();
        for (i, p) in packets.iter().enumerate() {
            assert_eq!(log.append(p.clone()).unwrap(), i + 1);
        }

        let stored = log.try_load().unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored, packets);
        assert!(stored.iter().all(|e| e.user_feedback == Feedback::Positive));
    }

    #[test]
    fn test_corrupt_log_counts_as_zero_prior_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solution_history.json");
        std::fs::write(&path, "[{\"parsed_question\": oops").unwrap();

        let log = MemoryLog::open(&path);
        assert!(log.try_load().is_err());
        assert!(log.load().is_empty());

        assert_eq!(log.append(entry("q", "a")).unwrap(), 1);
        assert_eq!(log.try_load().unwrap().len(), 1);
    }

    #[test]
    fn test_log_is_pretty_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::open(dir.path().join("log.json"));
        log.append(entry("q", "a")).unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert!(raw.starts_with("[\n  {"));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["parsed_question"], "q");
        assert_eq!(value[0]["topic"], "PROBABILITY");
        assert_eq!(value[0]["user_feedback"], "positive");
    }

    #[test]
    fn test_off_schema_entries_survive_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solution_history.json");
        let mut items = vec![
            serde_json::to_value(entry("q1", "a1")).unwrap(),
            serde_json::to_value(entry("q2", "a2")).unwrap(),
        ];
        items.push(serde_json::json!({
            "parsed_question": "legacy",
            "topic": "General",
            "final_answer": "42",
        }));
        std::fs::write(&path, serde_json::to_string_pretty(&items).unwrap()).unwrap();

        let log = MemoryLog::open(&path);
        assert_eq!(log.try_load().unwrap().len(), 2);

        assert_eq!(log.append(entry("q3", "a3")).unwrap(), 4);

        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(raw[2]["topic"], "General");
        assert_eq!(raw[2]["parsed_question"], "legacy");

        let readable: Vec<String> = log
            .try_load()
            .unwrap()
            .into_iter()
            .map(|e| e.parsed_question)
            .collect();
        assert_eq!(readable, vec!["q1", "q2", "q3"]);
    }

    #[test]
    fn test_non_array_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "{\"parsed_question\": \"q\"}").unwrap();
        assert!(MemoryLog::open(&path).try_load().is_err());
    }
}
