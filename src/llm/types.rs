//! Request and response types for OpenAI-compatible completion APIs

use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// What gets sent to a language model
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Role-tagged message list for chat-style endpoints
    Chat(Vec<Message>),
    /// Flat instruction text for completion-style endpoints
    Text(String),
}

/// Sampling parameters; unset values are left to the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl GenerationParams {
    /// Layer `overrides` on top of `self`; every value set in `overrides` wins
    pub fn merge(&self, overrides: &GenerationParams) -> GenerationParams {
        GenerationParams {
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            temperature: overrides.temperature.or(self.temperature),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
            top_p: overrides.top_p.or(self.top_p),
            stop: overrides.stop.clone().or_else(|| self.stop.clone()),
        }
    }
}

/// Message as sent on the wire
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub content: String,
}

/// Longest participant name OpenAI-compatible endpoints accept
const MAX_NAME_LEN: usize = 64;

/// Participant names may only contain `[A-Za-z0-9_-]`
fn wire_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(MAX_NAME_LEN)
        .collect()
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            name: wire_name(&msg.name),
            content: msg.content.clone(),
        }
    }
}

/// Body for `POST /chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(flatten)]
    pub params: GenerationParams,
}

/// Body for `POST /completions`
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(flatten)]
    pub params: GenerationParams,
}

/// Response body, shared by both endpoints and by streamed chunks
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    /// Text of the first choice, whichever shape the endpoint used
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(Choice::text)
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Completion endpoints
    #[serde(default)]
    pub text: Option<String>,
    /// Chat endpoints, non-streaming
    #[serde(default)]
    pub message: Option<ChoiceContent>,
    /// Chat endpoints, streaming
    #[serde(default)]
    pub delta: Option<ChoiceContent>,
}

impl Choice {
    pub fn text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or_else(|| self.message.as_ref().and_then(|m| m.content.as_deref()))
            .or_else(|| self.delta.as_ref().and_then(|d| d.content.as_deref()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceContent {
    #[serde(default)]
    pub content: Option<String>,
}

/// API error response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub message: String,
}
