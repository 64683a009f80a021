//! Deciding which interactions the latest exchange triggered

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{Interaction, InteractionRegistry, InteractionResult};
use crate::config::Config;
use crate::error::ConversationError;
use crate::game_data::GameData;
use crate::llm::{GenerationParams, LanguageModel, Prompt};
use crate::message::Message;
use crate::prompts::{build_interaction_prompt, build_interaction_text_prompt};
use crate::scripts::{script_env, ScriptContext};
use crate::signal::RunFileManager;

const CLASSIFY_MAX_TOKENS: u32 = 200;

/// One call requested by the classification model
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggeredCall {
    pub signature: String,
    /// Either an ordered array or an object keyed by argument name
    #[serde(default)]
    pub args: serde_json::Value,
}

impl TriggeredCall {
    /// Arguments in declaration order
    fn positional(&self, interaction: &Interaction) -> Vec<serde_json::Value> {
        match &self.args {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::Array(values) => values.clone(),
            serde_json::Value::Object(map) => interaction
                .args
                .iter()
                .map(|spec| map.get(&spec.name).cloned().unwrap_or_default())
                .collect(),
            other => vec![other.clone()],
        }
    }
}

/// Extract the JSON array of calls from a model reply. Text around the
/// outermost brackets is ignored.
pub fn parse_triggered(reply: &str) -> Result<Vec<TriggeredCall>> {
    let start = reply.find('[').context("no JSON array in reply")?;
    let end = reply.rfind(']').context("unterminated JSON array in reply")?;
    if end < start {
        anyhow::bail!("no JSON array in reply");
    }
    serde_json::from_str(&reply[start..=end]).context("malformed interaction list")
}

/// Ask the interaction model which eligible interactions the conversation
/// triggered, run the accepted ones and report them.
///
/// A malformed model reply yields no interactions rather than an error.
/// An interaction whose scripts fail against the current game state is
/// skipped with a warning.
pub async fn check_interactions(
    registry: &InteractionRegistry,
    model: &dyn LanguageModel,
    game_data: &GameData,
    messages: &[Message],
    config: &Config,
    channel: &mut RunFileManager,
) -> crate::error::Result<Vec<InteractionResult>> {
    let env = script_env();
    let ctx = ScriptContext::new(game_data);

    let mut eligible: Vec<&Interaction> = Vec::new();
    let mut actions = Vec::new();
    for interaction in registry.values() {
        let offered = interaction
            .check(&env, &ctx)
            .and_then(|available| available.then(|| interaction.describe(&env, &ctx)).transpose());
        match offered {
            Ok(Some(line)) => {
                eligible.push(interaction);
                actions.push(line);
            },
            Ok(None) => {},
            Err(e) => tracing::warn!("Skipping interaction: {:#}", e),
        }
    }

    if eligible.is_empty() || messages.is_empty() {
        return Ok(Vec::new());
    }
    let actions = actions.join("\n");

    let mut params = GenerationParams {
        max_tokens: Some(CLASSIFY_MAX_TOKENS),
        temperature: Some(0.0),
        ..Default::default()
    };
    let prompt = if model.is_chat() {
        Prompt::Chat(build_interaction_prompt(messages, &actions))
    } else {
        params.stop = Some(vec![config.input_sequence.clone()]);
        Prompt::Text(build_interaction_text_prompt(
            messages,
            &actions,
            &config.input_sequence,
            &config.output_sequence,
        ))
    };

    let reply = model
        .complete(&prompt, false, &params, &mut |_: &str| {})
        .await
        .context("Interaction classification failed")
        .map_err(ConversationError::Api)?;
    tracing::debug!("interaction reply: {}", reply);

    let calls = match parse_triggered(&reply) {
        Ok(calls) => calls,
        Err(e) => {
            tracing::warn!("Ignoring interaction reply: {:#}", e);
            return Ok(Vec::new());
        },
    };

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for call in calls {
        let Some(interaction) = eligible.iter().find(|i| i.signature == call.signature) else {
            tracing::warn!("Model requested unavailable interaction: {}", call.signature);
            continue;
        };
        if !seen.insert(interaction.signature.clone()) {
            continue;
        }

        let args = match interaction.validate_args(&call.positional(interaction)) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("Rejected {}: {:#}", call.signature, e);
                continue;
            },
        };

        let rendered = interaction.render_command(&env, &ctx, &args).and_then(|command| {
            Ok((command, interaction.render_chat_message(&env, &ctx, &args)?))
        });
        let (command, chat_message) = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!("Skipping interaction: {:#}", e);
                continue;
            },
        };

        channel.append(&command).map_err(ConversationError::Signal)?;
        tracing::info!("interaction triggered: {}", interaction.signature);

        results.push(InteractionResult {
            signature: interaction.signature.clone(),
            args,
            chat_message,
            chat_message_class: interaction.chat_message_class.clone(),
        });
    }

    Ok(results)
}
