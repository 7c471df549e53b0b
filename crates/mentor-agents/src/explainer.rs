use std::sync::Arc;

use mentor_core::{Inference, MentorResult};

use crate::prompts;

/// Rewrites a solution as a student-facing walkthrough.
pub struct Explainer {
    inference: Arc<dyn Inference>,
}

impl Explainer {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    pub fn analyze(&self, problem_text: &str, solution: &str) -> MentorResult<String> {
        self.inference
            .infer(&prompts::explainer(problem_text, solution))
    }
}
