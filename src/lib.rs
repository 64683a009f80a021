//! Talkbridge - AI dialogue for game characters
//!
//! This crate drives conversations between the player and AI-controlled
//! characters of a life-simulation game. Replies come from an
//! OpenAI-compatible language model; triggered game actions and the
//! end-of-conversation signal are written to a run file the game polls.
//!
//! # Example
//!
//! ```no_run
//! use talkbridge::{Config, Conversation, GameData, Message};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let game_data = GameData::load("game_data.json".as_ref())?;
//!     let config = Config::load_default()?;
//!     let mut conversation = Conversation::new(game_data, config, ".")?;
//!
//!     conversation.push_message(Message::user("Robert", "Greetings, cousin."))?;
//!     let response = conversation
//!         .generate_new_ai_message(|chunk| print!("{}", chunk))
//!         .await?;
//!     for interaction in &response.interactions {
//!         println!("\n[{}]", interaction.chat_message);
//!     }
//!
//!     conversation.summarize().await?;
//!     Ok(())
//! }
//! ```

pub mod cleaner;
pub mod config;
pub mod conversation;
pub mod error;
pub mod game_data;
pub mod interactions;
pub mod llm;
pub mod message;
pub mod prompts;
pub mod scripts;
pub mod signal;
pub mod storage;
pub mod summarize;

// Re-export the public API
pub use config::{ApiConnectionConfig, ApiKind, Config};
pub use conversation::{Conversation, SummarizeOutcome};
pub use error::{ConversationError, Result};
pub use game_data::{Character, GameData};
pub use interactions::{InteractionRegistry, InteractionResult};
pub use llm::{ApiConnection, ApiRoles, Connector, HttpConnector, LanguageModel};
pub use message::{Message, ResponseObject, Role, Summary};
