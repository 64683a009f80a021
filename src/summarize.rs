//! Conversation summarization
//!
//! The summary is generated in one non-streaming request, chat or
//! instruction style depending on the summarization role.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::llm::{GenerationParams, LanguageModel, Prompt};
use crate::prompts::{build_summarize_chat_prompt, build_summarize_text_prompt, PromptContext};

/// Upper bound on summary length
const SUMMARY_MAX_TOKENS: u32 = 300;

/// Ask `model` to summarize the conversation in `ctx`
pub async fn generate_summary(
    model: &dyn LanguageModel,
    ctx: &PromptContext<'_>,
    config: &Config,
) -> Result<String> {
    let mut params = GenerationParams {
        max_tokens: Some(SUMMARY_MAX_TOKENS),
        ..config.textgen_parameters()
    };

    let prompt = if model.is_chat() {
        Prompt::Chat(build_summarize_chat_prompt(ctx))
    } else {
        params.stop = Some(vec![config.input_sequence.clone()]);
        Prompt::Text(build_summarize_text_prompt(
            ctx,
            &config.input_sequence,
            &config.output_sequence,
        ))
    };

    let summary = model
        .complete(&prompt, false, &params, &mut |_: &str| {})
        .await
        .context("Summary generation failed")?;

    Ok(summary.trim().to_string())
}
