//! Errors surfaced by a [`Conversation`](crate::Conversation)

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    /// The selected description script is missing or failed to render
    #[error("description script error, the selected description script `{script}` is not valid: {source:#}")]
    DescriptionScript {
        script: String,
        #[source]
        source: anyhow::Error,
    },

    /// The selected example messages script is missing or failed to render
    #[error("example messages script error, the selected example messages script `{script}` is not valid: {source:#}")]
    ExampleMessagesScript {
        script: String,
        #[source]
        source: anyhow::Error,
    },

    /// A language model role failed (network, HTTP status, or model error)
    #[error("API error: {0:#}")]
    Api(#[source] anyhow::Error),

    /// Reading or writing conversation summaries failed
    #[error("summary storage error: {0:#}")]
    Storage(#[source] anyhow::Error),

    /// The interaction directory could not be read
    #[error("interaction loading error: {0:#}")]
    Interactions(#[source] anyhow::Error),

    /// Writing to the game signal channel failed
    #[error("signal channel error: {0:#}")]
    Signal(#[source] anyhow::Error),

    /// The conversation was already summarized and closed
    #[error("conversation is closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, ConversationError>;
