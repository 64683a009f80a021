//! Interactions: game actions that a conversation can trigger
//!
//! Each interaction is a TOML file in the interaction directory:
//!
//! ```toml
//! signature = "becomeRivals"
//! description = "Execute when {{ playerName }} and {{ aiName }} became rivals."
//! check = "ai.opinionOfPlayer < 0"
//! run = '''global_var:talk_second_scope = {
//!     set_relation_rival = { reason = {{ args.reason }} target = global_var:talk_first_scope }
//! }'''
//! chat_message = "{{ aiName }} has become your rival."
//! chat_message_class = "negative-action-message"
//!
//! [[args]]
//! name = "reason"
//! type = "string"
//! desc = "the reason they became rivals, in past tense"
//! ```
//!
//! - `check` is a template expression over the game state gating whether
//!   the interaction is offered at all (defaults to `true`)
//! - `run` renders the command block appended to the run file; the
//!   rendered text is written unchanged
//! - `description` and `chat_message` are templates too
//!
//! The file name up to its first dot is the key used by
//! `disabled_interactions`.

mod check;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use minijinja::{context, Environment, Value};
use serde::{Deserialize, Serialize};

use crate::scripts::{script_env, ScriptContext};

pub use check::{check_interactions, parse_triggered, TriggeredCall};

/// Directory of interaction files, relative to the data root
pub const ACTIONS_DIR: &str = "custom/actions";

/// Extension of interaction files
pub const ACTION_EXTENSION: &str = "toml";

/// Type of an interaction argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Number,
    Boolean,
}

/// One argument the model must extract for an interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    #[serde(default)]
    pub desc: String,
}

impl ArgSpec {
    /// Coerce a model-supplied value into this argument's type
    fn coerce(&self, value: &serde_json::Value) -> Result<serde_json::Value> {
        use serde_json::Value as Json;

        let coerced = match (self.arg_type, value) {
            (ArgType::String, Json::String(_)) => Some(value.clone()),
            (ArgType::String, Json::Number(n)) => Some(Json::String(n.to_string())),
            (ArgType::String, Json::Bool(b)) => Some(Json::String(b.to_string())),
            (ArgType::Number, Json::Number(_)) => Some(value.clone()),
            (ArgType::Number, Json::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number),
            (ArgType::Boolean, Json::Bool(_)) => Some(value.clone()),
            (ArgType::Boolean, Json::String(s)) => match s.trim() {
                "true" => Some(Json::Bool(true)),
                "false" => Some(Json::Bool(false)),
                _ => None,
            },
            _ => None,
        };

        coerced.with_context(|| {
            format!("argument `{}` expects {:?}, got {}", self.name, self.arg_type, value)
        })
    }
}

fn default_check() -> String {
    "true".to_string()
}

/// A loaded interaction. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub signature: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default = "default_check")]
    pub check: String,
    pub run: String,
    #[serde(default)]
    pub chat_message: String,
    #[serde(default)]
    pub chat_message_class: String,
}

impl Interaction {
    /// Parse an interaction file and compile its templates
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read interaction: {}", path.display()))?;
        let interaction: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse interaction: {}", path.display()))?;
        interaction
            .compile(&script_env())
            .with_context(|| format!("Invalid interaction: {}", path.display()))?;
        Ok(interaction)
    }

    /// Syntax check of the `check` expression and every template
    pub fn compile(&self, env: &Environment<'_>) -> Result<()> {
        env.compile_expression(&self.check)
            .with_context(|| format!("{}: invalid check expression", self.signature))?;
        for (field, source) in [
            ("description", &self.description),
            ("run", &self.run),
            ("chat_message", &self.chat_message),
        ] {
            env.template_from_str(source)
                .with_context(|| format!("{}: invalid {} template", self.signature, field))?;
        }
        Ok(())
    }

    /// Evaluate the `check` gate against the game state
    pub fn check(&self, env: &Environment<'_>, ctx: &ScriptContext<'_>) -> Result<bool> {
        let expr = env
            .compile_expression(&self.check)
            .with_context(|| format!("{}: invalid check expression", self.signature))?;
        let value = expr
            .eval(ctx)
            .with_context(|| format!("{}: check failed", self.signature))?;
        Ok(value.is_true())
    }

    /// One-line description offered to the classification model
    pub fn describe(&self, env: &Environment<'_>, ctx: &ScriptContext<'_>) -> Result<String> {
        let description = env
            .render_str(&self.description, ctx)
            .with_context(|| format!("{}: invalid description", self.signature))?;

        let args = self
            .args
            .iter()
            .map(|a| {
                let ty = format!("{:?}", a.arg_type).to_lowercase();
                if a.desc.is_empty() {
                    format!("{}: {}", a.name, ty)
                } else {
                    format!("{}: {} ({})", a.name, ty, a.desc)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("- {}({}): {}", self.signature, args, description.trim()))
    }

    /// Check count and types of model-supplied arguments
    pub fn validate_args(&self, raw: &[serde_json::Value]) -> Result<Vec<serde_json::Value>> {
        if raw.len() != self.args.len() {
            anyhow::bail!(
                "{} takes {} argument(s), got {}",
                self.signature,
                self.args.len(),
                raw.len()
            );
        }
        self.args
            .iter()
            .zip(raw)
            .map(|(spec, value)| spec.coerce(value))
            .collect()
    }

    /// Template context with the validated arguments, by name (`args`) and
    /// by position (`argv`)
    fn args_context(&self, ctx: &ScriptContext<'_>, args: &[serde_json::Value]) -> Value {
        let named: BTreeMap<&str, &serde_json::Value> = self
            .args
            .iter()
            .map(|spec| spec.name.as_str())
            .zip(args)
            .collect();

        context! {
            args => Value::from_serialize(&named),
            argv => Value::from_serialize(args),
            ..Value::from_serialize(ctx)
        }
    }

    /// Command block for the run file, written unchanged by the caller
    pub fn render_command(
        &self,
        env: &Environment<'_>,
        ctx: &ScriptContext<'_>,
        args: &[serde_json::Value],
    ) -> Result<String> {
        env.render_str(&self.run, self.args_context(ctx, args))
            .with_context(|| format!("{}: invalid run template", self.signature))
    }

    /// Notification shown to the player
    pub fn render_chat_message(
        &self,
        env: &Environment<'_>,
        ctx: &ScriptContext<'_>,
        args: &[serde_json::Value],
    ) -> Result<String> {
        env.render_str(&self.chat_message, self.args_context(ctx, args))
            .with_context(|| format!("{}: invalid chat message", self.signature))
    }
}

/// Outcome of one triggered interaction, returned to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionResult {
    pub signature: String,
    pub args: Vec<serde_json::Value>,
    pub chat_message: String,
    pub chat_message_class: String,
}

/// Registry of loaded interactions keyed by signature.
///
/// A registry is never modified after loading; reloads build a new one.
#[derive(Debug, Default)]
pub struct InteractionRegistry {
    interactions: BTreeMap<String, Interaction>,
}

impl InteractionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every interaction file in `dir`, skipping the names listed in
    /// `disabled`. Files that fail to parse are skipped with a warning.
    pub fn load(dir: &Path, disabled: &[String]) -> Result<Self> {
        let mut registry = Self::empty();

        if !dir.exists() {
            tracing::warn!("Interaction directory not found: {}", dir.display());
            return Ok(registry);
        }

        for path in interaction_files(dir)? {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let key = file_name.split('.').next().unwrap_or_default();

            if disabled.iter().any(|d| d == key) {
                tracing::debug!("skipping disabled interaction: {}", file_name);
                continue;
            }

            match Interaction::load(&path) {
                Ok(interaction) => {
                    if registry.interactions.contains_key(&interaction.signature) {
                        tracing::warn!(
                            "Duplicate interaction signature {} in {}, ignoring",
                            interaction.signature,
                            file_name
                        );
                        continue;
                    }
                    tracing::info!("loaded interaction: {}", file_name);
                    registry.register(interaction);
                },
                Err(e) => tracing::warn!("Skipping interaction {}: {:#}", file_name, e),
            }
        }

        Ok(registry)
    }

    pub fn register(&mut self, interaction: Interaction) {
        self.interactions
            .insert(interaction.signature.clone(), interaction);
    }

    pub fn get(&self, signature: &str) -> Option<&Interaction> {
        self.interactions.get(signature)
    }

    pub fn signatures(&self) -> impl Iterator<Item = &str> {
        self.interactions.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.values()
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}

/// Interaction files in `dir`, sorted by name
fn interaction_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read interaction directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(ACTION_EXTENSION)
        })
        .collect();
    files.sort();
    Ok(files)
}
