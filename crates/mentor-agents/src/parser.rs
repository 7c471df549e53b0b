use std::sync::Arc;

use mentor_core::{Inference, MentorError, MentorResult, ProblemRecord};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::prompts;

/// Hint attached to inputs that skip the model entirely.
pub const FAST_PATH_HINT: &str = "Probability/General";
/// Hint attached when the model call or its reply fails.
pub const FALLBACK_HINT: &str = "General";
/// Inputs longer than this many characters take the fast path.
pub const DEFAULT_FAST_PATH_LEN: usize = 100;

/// Words that mark an input as already well-formed. Matched as typed.
const SIGNAL_WORDS: [&str; 2] = ["balls", "probability"];

#[derive(Debug, Deserialize)]
struct ParsedReply {
    #[serde(default)]
    problem_text: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    needs_clarification: Option<bool>,
}

/// Turns free-form user input into a [`ProblemRecord`]. Never fails.
pub struct Parser {
    inference: Arc<dyn Inference>,
    fast_path_len: usize,
}

impl Parser {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self {
            inference,
            fast_path_len: DEFAULT_FAST_PATH_LEN,
        }
    }

    pub fn with_fast_path_len(mut self, len: usize) -> Self {
        self.fast_path_len = len;
        self
    }

    pub fn parse(&self, raw_text: &str) -> ProblemRecord {
        let input = raw_text.trim();

        if self.takes_fast_path(input) {
            debug!(chars = input.chars().count(), "parser fast path");
            return ProblemRecord::new(input, FAST_PATH_HINT);
        }

        match self.ask_model(input) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "parser fell back to raw input");
                ProblemRecord::new(input, FALLBACK_HINT)
            }
        }
    }

    fn takes_fast_path(&self, input: &str) -> bool {
        input.chars().count() > self.fast_path_len
            || SIGNAL_WORDS.iter().any(|w| input.contains(w))
    }

    fn ask_model(&self, input: &str) -> MentorResult<ProblemRecord> {
        let reply = self.inference.infer(&prompts::parser(input))?;
        let reply: ParsedReply = serde_json_lenient::from_str(strip_fences(&reply))
            .map_err(|e| MentorError::Inference(format!("unparseable parser reply: {e}")))?;

        let problem_text = reply
            .problem_text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| input.to_string());

        Ok(ProblemRecord {
            problem_text,
            topic_hint: Some(reply.topic.unwrap_or_else(|| FALLBACK_HINT.to_string())),
            topic: None,
            needs_clarification: reply.needs_clarification.unwrap_or(false),
        })
    }
}

/// Remove a surrounding markdown code fence, with or without a language tag.
pub(crate) fn strip_fences(reply: &str) -> &str {
    let mut body = reply.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.strip_prefix("json").unwrap_or(rest);
        body = body.strip_suffix("```").unwrap_or(body);
    }
    body.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInference;

    fn parser(replies: &[&str]) -> (Parser, Arc<ScriptedInference>) {
        let inference = Arc::new(ScriptedInference::new(replies));
        (Parser::new(inference.clone()), inference)
    }

    #[test]
    fn test_fast_path_on_signal_word() {
        let (p, inference) = parser(&[]);
        let record = p.parse("  Two balls are drawn from a bag  ");
        assert_eq!(record.problem_text, "Two balls are drawn from a bag");
        assert_eq!(record.topic_hint.as_deref(), Some(FAST_PATH_HINT));
        assert!(!record.needs_clarification);
        assert_eq!(inference.calls(), 0);
    }

    #[test]
    fn test_fast_path_on_long_input() {
        let (p, inference) = parser(&[]);
        let long = "x".repeat(101);
        let record = p.parse(&long);
        assert_eq!(record.problem_text, long);
        assert_eq!(inference.calls(), 0);
    }

    #[test]
    fn test_signal_words_are_case_sensitive() {
        let (p, inference) = parser(&[r#"{"problem_text": "P(A)?", "topic": "Probability"}"#]);
        let record = p.parse("Probability of A?");
        assert_eq!(inference.calls(), 1);
        assert_eq!(record.problem_text, "P(A)?");
        assert_eq!(record.topic_hint.as_deref(), Some("Probability"));
    }

    #[test]
    fn test_fenced_reply_is_parsed() {
        let reply = "```json\n{\"problem_text\": \"Solve x^2 = 4\", \"topic\": \"Algebra\", \"needs_clarification\": true}\n```";
        let (p, _) = parser(&[reply]);
        let record = p.parse("solv x^2=4");
        assert_eq!(record.problem_text, "Solve x^2 = 4");
        assert!(record.needs_clarification);
    }

    #[test]
    fn test_missing_fields_are_backfilled() {
        let (p, _) = parser(&[r#"{"topic": "Algebra"}"#]);
        let record = p.parse("solv x+1=2");
        assert_eq!(record.problem_text, "solv x+1=2");
        assert!(!record.needs_clarification);
    }

    #[test]
    fn test_bad_reply_falls_back() {
        let (p, _) = parser(&["I think this is algebra"]);
        let record = p.parse(" 2+2 ");
        assert_eq!(record, ProblemRecord::new("2+2", FALLBACK_HINT));

        let (p, _) = parser(&["[1, 2]"]);
        assert_eq!(p.parse("2+2").topic_hint.as_deref(), Some(FALLBACK_HINT));
    }

    #[test]
    fn test_inference_failure_falls_back() {
        let (p, inference) = parser(&[]);
        let record = p.parse("2+2");
        assert_eq!(inference.calls(), 1);
        assert_eq!(record, ProblemRecord::new("2+2", FALLBACK_HINT));
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences(" {} "), "{}");
    }
}
