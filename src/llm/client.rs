//! OpenAI-compatible API client

use super::stream::collect_stream;
use super::types::*;
use super::LanguageModel;
use crate::config::{ApiConnectionConfig, ApiKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

/// HTTP connection to one language model backend
pub struct ApiConnection {
    http_client: reqwest::Client,
    base_url: String,
    key: Option<String>,
    model: String,
    chat: bool,
    defaults: GenerationParams,
}

impl ApiConnection {
    /// Create a connection from its config block
    pub fn new(config: &ApiConnectionConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.resolved_base_url()?,
            key: config.resolved_key(),
            model: config.model.clone(),
            chat: Self::is_chat_kind(config),
            defaults: config.parameters.clone(),
        })
    }

    /// ooba's completion endpoint is the reliable one; every other kind
    /// speaks chat unless told otherwise.
    fn is_chat_kind(config: &ApiConnectionConfig) -> bool {
        !config.force_instruct && config.kind != ApiKind::Ooba
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build headers for API requests
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref key) = self.key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).context("Invalid API key")?,
            );
        }

        Ok(headers)
    }

    async fn post<T: serde::Serialize>(&self, endpoint: &str, body: &T) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, endpoint))
            .headers(self.headers()?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                anyhow::bail!("API error ({}): {}", status, api_error.error.message);
            } else {
                anyhow::bail!("API error ({}): {}", status, error_text);
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for ApiConnection {
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
        let params = self.defaults.merge(params);

        let response = match prompt {
            Prompt::Chat(messages) => {
                let request = ChatCompletionRequest {
                    model: self.model.clone(),
                    messages: messages.iter().map(ChatMessage::from).collect(),
                    stream,
                    params,
                };
                self.post("chat/completions", &request).await?
            },
            Prompt::Text(text) => {
                let request = CompletionRequest {
                    model: self.model.clone(),
                    prompt: text.clone(),
                    stream,
                    params,
                };
                self.post("completions", &request).await?
            },
        };

        if stream {
            return collect_stream(response, on_chunk).await;
        }

        let body: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse API response")?;
        Ok(body.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_style_by_kind() {
        let mut config = ApiConnectionConfig::default();
        assert!(ApiConnection::new(&config).unwrap().is_chat());

        config.force_instruct = true;
        assert!(!ApiConnection::new(&config).unwrap().is_chat());

        config.force_instruct = false;
        config.kind = ApiKind::Ooba;
        assert!(!ApiConnection::new(&config).unwrap().is_chat());
    }

    #[test]
    fn test_custom_kind_needs_base_url() {
        let config = ApiConnectionConfig {
            kind: ApiKind::Custom,
            ..Default::default()
        };
        assert!(ApiConnection::new(&config).is_err());
    }

    #[test]
    fn test_headers_include_bearer_key() {
        let config = ApiConnectionConfig {
            key: Some("sk-abc".to_string()),
            ..Default::default()
        };
        let conn = ApiConnection::new(&config).unwrap();
        let headers = conn.headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-abc");
    }
}
