use serde::{Deserialize, Serialize};
use std::fmt;

use crate::memory::{Feedback, MemoryEntry};

/// Where a corpus document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocSource {
    Textbook,
    Memory,
}

impl fmt::Display for DocSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Textbook => write!(f, "textbook"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for DocSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "textbook" => Ok(Self::Textbook),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("invalid document source: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub source: DocSource,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

/// A unit of retrievable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub content: String,
    pub metadata: DocMetadata,
}

impl CorpusDocument {
    /// A knowledge-base chunk.
    pub fn rule(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocMetadata {
                source: DocSource::Textbook,
                kind: "rule".into(),
                feedback: None,
            },
        }
    }

    /// Synthetic document summarizing a verified solution.
    pub fn from_memory(entry: &MemoryEntry) -> Self {
        let content = format!(
            "SIMILAR SOLVED PROBLEM:\n\
             Q: {}\n\
             Topic: {}\n\
             Verified Solution: {}\n\
             Verifier Note: {}",
            entry.parsed_question, entry.topic, entry.final_answer, entry.verifier_outcome
        );
        Self {
            content,
            metadata: DocMetadata {
                source: DocSource::Memory,
                kind: "solved_example".into(),
                feedback: Some(entry.user_feedback),
            },
        }
    }
}

/// Split `text` into windows of `size` characters, each starting
/// `size - overlap` characters after the previous one. Whitespace-only
/// windows are dropped and the rest are trimmed.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
