//! Language model clients and role wiring
//!
//! A conversation uses a language model in three independent roles: text
//! generation, summarization and interaction classification. Each role is a
//! [`LanguageModel`] handle; summarization and interaction may share the text
//! generation handle or get their own, decided on every config reload.

mod client;
mod stream;
mod types;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{ApiConnectionConfig, Config};

pub use client::ApiConnection;
pub use stream::{collect_stream, SseParser, StreamEvent};
pub use types::{GenerationParams, Prompt};

/// A language model endpoint
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Whether the endpoint takes chat messages rather than flat text
    fn is_chat(&self) -> bool;

    /// Run one completion. When `stream` is set, every text delta is passed
    /// to `on_chunk` as it arrives; the full text is returned either way.
    async fn complete(
        &self,
        prompt: &Prompt,
        stream: bool,
        params: &GenerationParams,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String>;
}

/// Builds language model handles from connection settings
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ApiConnectionConfig) -> Result<Arc<dyn LanguageModel>>;
}

/// Connector producing real HTTP connections
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn connect(&self, config: &ApiConnectionConfig) -> Result<Arc<dyn LanguageModel>> {
        Ok(Arc::new(ApiConnection::new(config)?))
    }
}

/// The three role handles of a conversation.
///
/// Handles are immutable once resolved; a reload builds a fresh `ApiRoles`.
#[derive(Clone)]
pub struct ApiRoles {
    pub text_gen: Arc<dyn LanguageModel>,
    pub summarization: Arc<dyn LanguageModel>,
    pub interaction: Arc<dyn LanguageModel>,
}

impl ApiRoles {
    /// Resolve every role from the config. The text generation connection is
    /// always rebuilt; the other two either alias it or get their own.
    pub fn resolve(config: &Config, connector: &dyn Connector) -> Result<Self> {
        let text_gen = connector.connect(&config.text_generation_api_connection)?;

        let summarization = if config.summarization_use_text_gen_api {
            Arc::clone(&text_gen)
        } else {
            connector.connect(&config.summarization_api_connection)?
        };

        let interaction = if config.interaction_use_text_gen_api {
            Arc::clone(&text_gen)
        } else {
            connector.connect(&config.interaction_api_connection)?
        };

        Ok(Self {
            text_gen,
            summarization,
            interaction,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted stand-ins for network-backed models

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Returns queued replies in order and records every prompt it receives
    pub struct ScriptedModel {
        chat: bool,
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub prompts: Mutex<Vec<(Prompt, GenerationParams)>>,
    }

    impl ScriptedModel {
        pub fn new(chat: bool) -> Self {
            Self {
                chat,
                replies: Mutex::new(VecDeque::new()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn reply(self, text: &str) -> Self {
            self.replies.lock().unwrap().push_back(Ok(text.to_string()));
            self
        }

        pub fn fail(self, error: &str) -> Self {
            self.replies.lock().unwrap().push_back(Err(error.to_string()));
            self
        }

        pub fn call_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn is_chat(&self) -> bool {
            self.chat
        }

        async fn complete(
            &self,
            prompt: &Prompt,
            stream: bool,
            params: &GenerationParams,
            on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
        ) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.clone(), params.clone()));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()));
            match reply {
                Ok(text) => {
                    if stream {
                        on_chunk(&text);
                    }
                    Ok(text)
                },
                Err(e) => Err(anyhow::anyhow!(e)),
            }
        }
    }

    /// Hands out pre-built models keyed by connection model name
    pub struct StubConnector {
        models: Mutex<std::collections::HashMap<String, Arc<ScriptedModel>>>,
        pub connects: Mutex<Vec<String>>,
    }

    impl StubConnector {
        pub fn new() -> Self {
            Self {
                models: Mutex::new(std::collections::HashMap::new()),
                connects: Mutex::new(Vec::new()),
            }
        }

        pub fn with(self, model: &str, scripted: Arc<ScriptedModel>) -> Self {
            self.models.lock().unwrap().insert(model.to_string(), scripted);
            self
        }
    }

    impl Connector for StubConnector {
        fn connect(&self, config: &ApiConnectionConfig) -> Result<Arc<dyn LanguageModel>> {
            self.connects.lock().unwrap().push(config.model.clone());
            let model = self
                .models
                .lock()
                .unwrap()
                .get(&config.model)
                .cloned()
                .unwrap_or_else(|| Arc::new(ScriptedModel::new(true)));
            Ok(model)
        }
    }
}
