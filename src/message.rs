//! Core message types for conversation history
//!
//! A conversation is an append-only list of [`Message`]s. Completed
//! conversations leave behind a [`Summary`], which is persisted per
//! player/AI character pair.

use serde::{Deserialize, Serialize};

use crate::interactions::InteractionResult;

/// Role of the message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub name: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            name: String::new(),
            content: content.into(),
        }
    }

    pub fn user(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn assistant(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Condensed record of one completed conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// In-game date the conversation took place
    pub date: String,
    pub content: String,
}

/// Result of a successful generation: the new assistant message plus
/// whatever interactions it triggered
#[derive(Debug, Clone, Serialize)]
pub struct ResponseObject {
    pub message: Message,
    pub interactions: Vec<InteractionResult>,
}
