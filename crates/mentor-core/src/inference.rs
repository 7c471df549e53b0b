use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{MentorError, MentorResult};

/// Opaque language-model capability: prompt in, text out.
///
/// Callers must expect arbitrary latency and a nonzero failure rate and
/// apply their own fallback.
pub trait Inference: Send + Sync {
    fn infer(&self, prompt: &str) -> MentorResult<String>;
}

/// Inference that is switched off. Every call fails, so callers take their
/// deterministic fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl Inference for Offline {
    fn infer(&self, _prompt: &str) -> MentorResult<String> {
        Err(MentorError::Inference("model disabled".into()))
    }
}

/// Settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".into(),
            model: "llama-3.3-70b-versatile".into(),
            temperature: 0.2,
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Single-turn chat completion over HTTP.
pub struct ChatInference {
    agent: ureq::Agent,
    settings: ChatSettings,
}

impl ChatInference {
    pub fn new(settings: ChatSettings) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(settings.timeout).build();
        Self { agent, settings }
    }

    fn body(&self, prompt: &str) -> Value {
        json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "messages": [{"role": "user", "content": prompt}],
        })
    }
}

impl Inference for ChatInference {
    fn infer(&self, prompt: &str) -> MentorResult<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| MentorError::Config("no API key configured for the model".into()))?;

        debug!(model = %self.settings.model, chars = prompt.len(), "chat completion request");
        let response: Value = self
            .agent
            .post(&self.settings.endpoint)
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_json(self.body(prompt))
            .map_err(|e| MentorError::Inference(e.to_string()))?
            .into_json()
            .map_err(|e| MentorError::Inference(format!("unreadable response: {e}")))?;

        extract_content(&response)
    }
}

fn extract_content(response: &Value) -> MentorResult<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MentorError::Inference("response has no message content".into()))
}
