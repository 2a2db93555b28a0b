use serde::{Deserialize, Serialize};

use crate::types::MessageParam;

/// Body of a `POST /messages` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagesRequest {
    /// Model identifier, e.g. `claude-haiku-4-5`.
    pub model: String,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,

    /// System prompt applied to every turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// The conversation so far, ending with the new user turn.
    pub messages: Vec<MessageParam>,

    /// Whether the response is delivered as server-sent events.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl MessagesRequest {
    /// Create a non-streaming request.
    pub fn new(model: impl Into<String>, max_tokens: u32, messages: Vec<MessageParam>) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system: None,
            temperature: None,
            messages,
            stream: false,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Mark the request as streaming.
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}
