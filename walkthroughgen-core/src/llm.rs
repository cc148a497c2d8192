//! OpenAI-compatible model client for the calculator agent.
//!
//! Sends the serialized thread as a chat completion request in JSON mode and
//! parses the reply into a [`NextStep`].

use crate::agent::{NextStep, StepClient, Thread};
use crate::config::AgentConfig;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};

/// System prompt describing the step schema the model must answer with.
pub const SYSTEM_PROMPT: &str = r#"You are a helpful assistant that can help with tasks.
You work through a thread of events and decide the single next step.

Answer with exactly one JSON object, using one of these shapes:
{"intent": "done_for_now", "message": "<final answer for the user>"}
{"intent": "request_more_information", "message": "<question for the user>"}
{"intent": "add", "a": <number>, "b": <number>}
{"intent": "subtract", "a": <number>, "b": <number>}
{"intent": "multiply", "a": <number>, "b": <number>}
{"intent": "divide", "a": <number>, "b": <number>}

Use the calculator intents for arithmetic instead of computing results yourself.
Ask for more information when the request is ambiguous.
Always think about what to do next first, then answer with the JSON object only."#;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client implementing [`StepClient`].
pub struct OpenAiStepClient {
    agent: ureq::Agent,
    config: AgentConfig,
    api_key: String,
}

impl OpenAiStepClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the config is invalid or no API key
    /// is available.
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.resolve_api_key()?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout))
            .build()
            .into();

        Ok(Self {
            agent,
            config,
            api_key,
        })
    }

    /// The chat completions URL.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base)
    }

    /// Request body for a thread, rendered in the configured format.
    pub fn request_body(&self, thread: &Thread) -> Result<Value> {
        let rendered = thread.serialize(self.config.thread_format)?;
        tracing::info!(
            "📄 Using {} serialization ({} chars)",
            self.config.thread_format,
            rendered.chars().count()
        );

        Ok(json!({
            "model": self.config.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!(
                    "What should the next step be?\n\n{}",
                    rendered
                )},
            ],
        }))
    }
}

impl StepClient for OpenAiStepClient {
    fn determine_next_step(&self, thread: &Thread) -> Result<NextStep> {
        let body = self.request_body(thread)?;

        let response: ChatResponse = self
            .agent
            .post(&self.endpoint())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)?
            .body_mut()
            .read_json()?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::llm_error("response has no message content"))?;

        tracing::debug!(%content, "model reply");
        parse_next_step(&content)
    }
}

/// Parse a model reply, tolerating a surrounding markdown code fence.
pub fn parse_next_step(content: &str) -> Result<NextStep> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(|e| Error::invalid_step(format!("{}: {}", e, body)))
}
