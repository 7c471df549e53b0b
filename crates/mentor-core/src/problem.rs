use serde::{Deserialize, Serialize};
use std::fmt;

use crate::topic::Topic;

// ---------------------------------------------------------------------------
// ProblemRecord
// ---------------------------------------------------------------------------

/// A normalized problem statement for one request.
///
/// `topic_hint` is whatever free-form guess the parser produced
/// ("Probability/General", "General", "Calculus", ...). `topic` stays empty
/// until the router attaches one of the closed categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub problem_text: String,
    #[serde(default)]
    pub topic_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
    #[serde(default)]
    pub needs_clarification: bool,
}

impl ProblemRecord {
    pub fn new(problem_text: impl Into<String>, topic_hint: impl Into<String>) -> Self {
        Self {
            problem_text: problem_text.into(),
            topic_hint: Some(topic_hint.into()),
            topic: None,
            needs_clarification: false,
        }
    }

    /// Replace the statement after human review. Any earlier routing is
    /// dropped since it was computed for the old text.
    pub fn with_text(mut self, problem_text: impl Into<String>) -> Self {
        self.problem_text = problem_text.into();
        self.topic = None;
        self
    }

    pub fn routed(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }
}

// ---------------------------------------------------------------------------
// SolutionArtifact
// ---------------------------------------------------------------------------

/// Which solver strategy produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Symbolic,
    Numeric,
    Retrieval,
    /// Every strategy failed, including the final model call.
    Unresolved,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbolic => write!(f, "symbolic"),
            Self::Numeric => write!(f, "numeric"),
            Self::Retrieval => write!(f, "retrieval"),
            Self::Unresolved => write!(f, "unresolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionArtifact {
    pub tier: Tier,
    pub text: String,
    /// Generated source code for the code tiers, retrieved snippets for the
    /// retrieval tier. Empty when no external evidence was used.
    pub evidence: Vec<String>,
}

impl SolutionArtifact {
    pub fn new(tier: Tier, text: impl Into<String>, evidence: Vec<String>) -> Self {
        Self {
            tier,
            text: text.into(),
            evidence,
        }
    }
}
