//! In-process fakes for the pipeline's collaborators.

use std::collections::VecDeque;
use std::sync::Mutex;

use mentor_core::{
    Capabilities, CodeRunner, ExecutionResult, Inference, MentorError, MentorResult, Retriever,
};

/// Replies from a fixed script, then errors once the script runs out.
pub struct ScriptedInference {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Inference for ScriptedInference {
    fn infer(&self, prompt: &str) -> MentorResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| MentorError::Inference("script exhausted".into()))
    }
}

/// Answers by prompt content rather than call order, for stages that run
/// concurrently.
pub struct KeyedInference {
    rules: Vec<(String, String)>,
}

impl KeyedInference {
    pub fn new(rules: &[(&str, &str)]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|(needle, reply)| (needle.to_string(), reply.to_string()))
                .collect(),
        }
    }
}

impl Inference for KeyedInference {
    fn infer(&self, prompt: &str) -> MentorResult<String> {
        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| MentorError::Inference("no scripted reply".into()))
    }
}

pub struct FakeRunner {
    results: Mutex<VecDeque<ExecutionResult>>,
    seen: Mutex<Vec<(String, bool)>>,
}

impl FakeRunner {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Code and `use_sympy` flag of every execution so far.
    pub fn seen(&self) -> Vec<(String, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

impl CodeRunner for FakeRunner {
    fn execute(&self, code: &str, capabilities: Capabilities) -> ExecutionResult {
        self.seen
            .lock()
            .unwrap()
            .push((code.to_string(), capabilities.use_sympy));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ExecutionResult::Failed("no scripted result".into()))
    }
}

pub struct StaticRetriever {
    docs: Option<Vec<String>>,
}

impl StaticRetriever {
    pub fn new(docs: &[&str]) -> Self {
        Self {
            docs: Some(docs.iter().map(|d| d.to_string()).collect()),
        }
    }

    pub fn failing() -> Self {
        Self { docs: None }
    }
}

impl Retriever for StaticRetriever {
    fn retrieve(&self, _query: &str, k: usize) -> MentorResult<Vec<String>> {
        match &self.docs {
            Some(docs) => Ok(docs.iter().take(k + 2).cloned().collect()),
            None => Err(MentorError::Database("index unavailable".into())),
        }
    }
}
