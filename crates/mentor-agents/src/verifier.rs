use std::fmt;
use std::sync::Arc;

use mentor_core::{Inference, MentorResult};
use serde::Serialize;

use crate::prompts;

/// Verdict token read out of a verifier reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Unclear,
}

impl Verdict {
    /// `VERIFIED_INCORRECT` is checked first so a reply mentioning both
    /// tokens counts as a rejection.
    pub fn from_reply(reply: &str) -> Self {
        let upper = reply.to_uppercase();
        if upper.contains("VERIFIED_INCORRECT") {
            Self::Incorrect
        } else if upper.contains("VERIFIED_CORRECT") {
            Self::Correct
        } else {
            Self::Unclear
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correct => write!(f, "correct"),
            Self::Incorrect => write!(f, "incorrect"),
            Self::Unclear => write!(f, "unclear"),
        }
    }
}

/// Critiques a solution. Stateless; errors go to the caller.
pub struct Verifier {
    inference: Arc<dyn Inference>,
}

impl Verifier {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    pub fn analyze(&self, problem_text: &str, solution: &str) -> MentorResult<String> {
        self.inference.infer(&prompts::verifier(problem_text, solution))
    }
}
