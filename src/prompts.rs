//! Prompt construction for every language model role
//!
//! Chat-style roles receive a list of messages; instruction-style roles get
//! the same content flattened into text with the configured input/output
//! sequences as turn delimiters.

use crate::game_data::GameData;
use crate::message::{Message, Role, Summary};

/// Instruction for the summarization role
pub const SUMMARIZE_PROMPT: &str = "Summarize the conversation above in a short paragraph, \
written in past tense from a neutral narrator's point of view. Mention the important \
events, decisions, promises and feelings that were expressed. Only output the summary.";

/// Instruction for the interaction classification role. `{actions}` is
/// replaced with the list of available actions.
pub const INTERACTION_PROMPT: &str = r#"You are watching a conversation between two characters in a game. Decide whether the LAST message caused any of the actions below to happen.

Available actions:
{actions}

Answer with a JSON array only. Each element is an object with the action's "signature" and its "args" as an ordered array. If nothing happened, answer with []."#;

/// Everything a prompt is built from
pub struct PromptContext<'a> {
    pub game_data: &'a GameData,
    pub description: &'a str,
    pub example_messages: &'a [Message],
    pub summaries: &'a [Summary],
    pub messages: &'a [Message],
}

/// Format stored summaries as a memory block, newest first
fn memory_block(game_data: &GameData, summaries: &[Summary]) -> Option<String> {
    if summaries.is_empty() {
        return None;
    }

    let mut block = format!(
        "Previous conversations between {} and {}:\n",
        game_data.player_name, game_data.ai_name
    );
    for summary in summaries {
        block.push_str(&format!("[{}] {}\n", summary.date, summary.content));
    }
    Some(block.trim_end().to_string())
}

/// Build the chat prompt for text generation: description, memories,
/// example messages, then the full conversation.
pub fn build_chat_prompt(ctx: &PromptContext<'_>) -> Vec<Message> {
    let mut prompt = Vec::with_capacity(
        2 + ctx.example_messages.len() + ctx.messages.len(),
    );

    prompt.push(Message::system(ctx.description));

    if let Some(memories) = memory_block(ctx.game_data, ctx.summaries) {
        prompt.push(Message::system(memories));
    }

    prompt.extend(ctx.example_messages.iter().cloned());
    prompt.extend(ctx.messages.iter().cloned());
    prompt
}

/// Flatten a chat prompt into instruction text, ending on an open turn for
/// `ai_name`.
pub fn convert_chat_to_text(
    chat: &[Message],
    input_sequence: &str,
    output_sequence: &str,
    ai_name: &str,
) -> String {
    let mut text = String::new();

    for msg in chat {
        match msg.role {
            Role::System => {
                text.push_str(&msg.content);
                text.push('\n');
            },
            Role::User => {
                text.push_str(&format!("{}\n{}: {}\n", input_sequence, msg.name, msg.content));
            },
            Role::Assistant => {
                text.push_str(&format!("{}\n{}: {}\n", output_sequence, msg.name, msg.content));
            },
        }
    }

    text.push_str(&format!("{}\n{}:", output_sequence, ai_name));
    text
}

/// Plain transcript of the conversation, one `Name: content` line per message
fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| format!("{}: {}", m.name, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Chat-style summarization prompt
pub fn build_summarize_chat_prompt(ctx: &PromptContext<'_>) -> Vec<Message> {
    let mut prompt = Vec::new();
    if let Some(memories) = memory_block(ctx.game_data, ctx.summaries) {
        prompt.push(Message::system(memories));
    }
    prompt.push(Message::user(
        ctx.game_data.player_name.as_str(),
        transcript(ctx.messages),
    ));
    prompt.push(Message::system(SUMMARIZE_PROMPT));
    prompt
}

/// Instruction-style summarization prompt
pub fn build_summarize_text_prompt(
    ctx: &PromptContext<'_>,
    input_sequence: &str,
    output_sequence: &str,
) -> String {
    let mut text = String::new();
    if let Some(memories) = memory_block(ctx.game_data, ctx.summaries) {
        text.push_str(&memories);
        text.push_str("\n\n");
    }
    text.push_str(&format!(
        "{}\n{}\n\n{}\n{}\n",
        input_sequence,
        transcript(ctx.messages),
        SUMMARIZE_PROMPT,
        output_sequence
    ));
    text
}

/// Classification prompt asking which of `actions` the last exchange
/// triggered. `actions` is pre-rendered, one line per action.
pub fn build_interaction_prompt(messages: &[Message], actions: &str) -> Vec<Message> {
    let recent = &messages[messages.len().saturating_sub(4)..];
    vec![
        Message::system(INTERACTION_PROMPT.replace("{actions}", actions)),
        Message::user("", transcript(recent)),
    ]
}

/// Instruction-style variant of [`build_interaction_prompt`]
pub fn build_interaction_text_prompt(
    messages: &[Message],
    actions: &str,
    input_sequence: &str,
    output_sequence: &str,
) -> String {
    let recent = &messages[messages.len().saturating_sub(4)..];
    format!(
        "{}\n{}\n\n{}\n{}\n",
        input_sequence,
        INTERACTION_PROMPT.replace("{actions}", actions),
        transcript(recent),
        output_sequence
    )
}
