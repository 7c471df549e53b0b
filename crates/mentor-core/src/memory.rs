use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::topic::Topic;

/// One human-approved problem-solving trace, as stored in the memory log.
///
/// `id` and `recorded_at` are absent from logs written by older versions, so
/// both are optional on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,

    #[serde(default = "default_input_type")]
    pub original_input_type: String,
    pub parsed_question: String,
    pub topic: Topic,
    #[serde(default)]
    pub retrieved_context: Vec<String>,
    pub final_answer: String,
    pub verifier_outcome: String,
    #[serde(default)]
    pub user_feedback: Feedback,
}

fn default_input_type() -> String {
    "Text".into()
}

impl MemoryEntry {
    pub fn new(
        parsed_question: String,
        topic: Topic,
        retrieved_context: Vec<String>,
        final_answer: String,
        verifier_outcome: String,
    ) -> Self {
        Self {
            id: Some(ulid::Ulid::new().to_string()),
            recorded_at: Some(Utc::now()),
            original_input_type: default_input_type(),
            parsed_question,
            topic,
            retrieved_context,
            final_answer,
            verifier_outcome,
            user_feedback: Feedback::Positive,
        }
    }

    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.original_input_type = input_type.into();
        self
    }
}

/// Reviewer verdict on a presented solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    #[default]
    Positive,
    Negative,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

impl std::str::FromStr for Feedback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "yes" | "y" | "correct" => Ok(Self::Positive),
            "negative" | "no" | "n" | "incorrect" => Ok(Self::Negative),
            _ => Err(format!("invalid feedback: {s}")),
        }
    }
}
