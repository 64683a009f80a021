//! Configuration loading
//!
//! This module provides:
//! - `Config` - Application configuration loaded from config.toml
//! - `ApiConnectionConfig` - Per-role language model connection settings
//!
//! Every section is `#[serde(default)]`, so a config file only needs the
//! keys it wants to change.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::GenerationParams;

/// Directory name used under the platform config directory
pub const APP_DIR: &str = "talkbridge";

/// Environment variable consulted when a connection has no API key
pub const API_KEY_ENV: &str = "TALKBRIDGE_API_KEY";

/// Placeholder written over secrets in [`Config::to_safe_config`]
pub const REDACTED: &str = "<redacted>";

// =============================================================================
// Connection configuration
// =============================================================================

/// Which kind of backend a connection talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKind {
    #[default]
    Openai,
    Openrouter,
    /// text-generation-webui's OpenAI-compatible extension
    Ooba,
    Custom,
}

impl ApiKind {
    /// Well-known base URL for the backend, if it has one
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ApiKind::Openai => Some("https://api.openai.com/v1"),
            ApiKind::Openrouter => Some("https://openrouter.ai/api/v1"),
            ApiKind::Ooba => Some("http://127.0.0.1:5000/v1"),
            ApiKind::Custom => None,
        }
    }
}

/// Settings for one language model connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConnectionConfig {
    pub kind: ApiKind,
    /// Overrides the kind's default endpoint (required for `custom`)
    pub base_url: Option<String>,
    pub key: Option<String>,
    pub model: String,
    /// Send instruction-style prompts even to a chat-capable backend
    pub force_instruct: bool,
    /// Connection-level generation defaults; session values override these
    pub parameters: GenerationParams,
}

impl Default for ApiConnectionConfig {
    fn default() -> Self {
        Self {
            kind: ApiKind::Openai,
            base_url: None,
            key: None,
            model: "gpt-4o-mini".to_string(),
            force_instruct: false,
            parameters: GenerationParams::default(),
        }
    }
}

impl ApiConnectionConfig {
    /// Resolve the endpoint base URL, falling back to the kind's default
    pub fn resolved_base_url(&self) -> Result<String> {
        let raw = match (&self.base_url, self.kind.default_base_url()) {
            (Some(url), _) if !url.trim().is_empty() => url.trim(),
            (_, Some(default)) => default,
            _ => anyhow::bail!("A base_url is required for {:?} connections", self.kind),
        };
        url::Url::parse(raw).with_context(|| format!("Invalid base_url: {}", raw))?;
        Ok(raw.trim_end_matches('/').to_string())
    }

    /// API key from the config, or from the environment when omitted
    pub fn resolved_key(&self) -> Option<String> {
        self.key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }

    fn redacted(&self) -> Self {
        Self {
            key: self.key.as_ref().map(|_| REDACTED.to_string()),
            ..self.clone()
        }
    }
}

// =============================================================================
// Application configuration
// =============================================================================

/// Main configuration structure loaded from config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stream generated text back to the UI as it arrives
    pub stream: bool,
    pub max_tokens: u32,
    /// Delimiter placed before player turns in instruction mode
    pub input_sequence: String,
    /// Delimiter placed before AI turns in instruction mode
    pub output_sequence: String,
    /// Post-process generated text with the message cleaner
    pub clean_messages: bool,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub top_p: f32,

    pub text_generation_api_connection: ApiConnectionConfig,
    pub summarization_api_connection: ApiConnectionConfig,
    pub interaction_api_connection: ApiConnectionConfig,
    /// Reuse the text generation connection for summaries
    pub summarization_use_text_gen_api: bool,
    /// Reuse the text generation connection for interaction checks
    pub interaction_use_text_gen_api: bool,

    /// Interaction file base names that must not be loaded
    pub disabled_interactions: Vec<String>,
    pub selected_desc_script: String,
    pub selected_ex_msg_script: String,
    /// The game's user folder, home of the run file
    pub user_folder_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream: true,
            max_tokens: 200,
            input_sequence: "### Instruction:".to_string(),
            output_sequence: "### Response:".to_string(),
            clean_messages: true,
            temperature: 0.8,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            top_p: 1.0,
            text_generation_api_connection: ApiConnectionConfig::default(),
            summarization_api_connection: ApiConnectionConfig::default(),
            interaction_api_connection: ApiConnectionConfig::default(),
            summarization_use_text_gen_api: true,
            interaction_use_text_gen_api: true,
            disabled_interactions: Vec::new(),
            selected_desc_script: "standard.j2".to_string(),
            selected_ex_msg_script: "standard.toml".to_string(),
            user_folder_path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load from the default location, falling back to defaults
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Config::default())
    }

    /// Get the config directory path (e.g. ~/.config/talkbridge)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Session-level sampling parameters
    pub fn textgen_parameters(&self) -> GenerationParams {
        GenerationParams {
            temperature: Some(self.temperature),
            frequency_penalty: Some(self.frequency_penalty),
            presence_penalty: Some(self.presence_penalty),
            top_p: Some(self.top_p),
            ..GenerationParams::default()
        }
    }

    /// Copy of the config with secrets removed, safe to log
    pub fn to_safe_config(&self) -> Self {
        Self {
            text_generation_api_connection: self.text_generation_api_connection.redacted(),
            summarization_api_connection: self.summarization_api_connection.redacted(),
            interaction_api_connection: self.interaction_api_connection.redacted(),
            ..self.clone()
        }
    }
}
