//! Conversation session between the player and one AI character
//!
//! A [`Conversation`] owns the message history, the stored summaries of
//! earlier conversations with the same character, the interaction registry
//! and the three language model roles. It is driven by the UI:
//!
//! 1. [`Conversation::push_message`] for every player line
//! 2. [`Conversation::generate_new_ai_message`] for the AI's reply
//! 3. [`Conversation::summarize`] once the conversation ends
//!
//! Configuration can be reloaded at any time. A reload either succeeds
//! completely or leaves the previous state in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::cleaner::{clean_message_content, Cleaner};
use crate::config::Config;
use crate::error::{ConversationError, Result};
use crate::game_data::GameData;
use crate::interactions::{check_interactions, InteractionRegistry, ACTIONS_DIR};
use crate::llm::{ApiRoles, Connector, GenerationParams, HttpConnector, Prompt};
use crate::message::{Message, ResponseObject, Summary};
use crate::prompts::{build_chat_prompt, convert_chat_to_text, PromptContext};
use crate::scripts::{render_description, render_example_messages, ScriptContext};
use crate::signal::{RunFileManager, END_CONVERSATION_TRIGGER};
use crate::storage::SummaryStore;
use crate::summarize::generate_summary;

/// Conversations shorter than this are not summarized
pub const MIN_MESSAGES_FOR_SUMMARY: usize = 6;

/// How long the end-of-conversation trigger stays in the run file
pub const SIGNAL_CLEAR_DELAY: Duration = Duration::from_millis(500);

/// What [`Conversation::summarize`] did
#[derive(Debug, Clone, PartialEq)]
pub enum SummarizeOutcome {
    /// Too few messages; nothing was generated or written
    Skipped { message_count: usize },
    /// A new summary was generated, prepended and saved
    Saved(Summary),
}

/// Everything derived from the config on a (re)load
struct LoadedConfig {
    textgen_params: GenerationParams,
    description: String,
    example_messages: Vec<Message>,
    roles: ApiRoles,
    interactions: Arc<InteractionRegistry>,
}

impl LoadedConfig {
    fn load(
        config: &Config,
        data_root: &Path,
        game_data: &GameData,
        connector: &dyn Connector,
    ) -> Result<Self> {
        let ctx = ScriptContext::new(game_data);

        let description = render_description(data_root, &config.selected_desc_script, &ctx)
            .map_err(|source| ConversationError::DescriptionScript {
                script: config.selected_desc_script.clone(),
                source,
            })?;

        let example_messages =
            render_example_messages(data_root, &config.selected_ex_msg_script, &ctx).map_err(
                |source| ConversationError::ExampleMessagesScript {
                    script: config.selected_ex_msg_script.clone(),
                    source,
                },
            )?;

        let interactions = load_registry(config, data_root)?;
        let roles = ApiRoles::resolve(config, connector).map_err(ConversationError::Api)?;

        Ok(Self {
            textgen_params: config.textgen_parameters(),
            description,
            example_messages,
            roles,
            interactions,
        })
    }
}

fn load_registry(config: &Config, data_root: &Path) -> Result<Arc<InteractionRegistry>> {
    let registry =
        InteractionRegistry::load(&data_root.join(ACTIONS_DIR), &config.disabled_interactions)
            .map_err(ConversationError::Interactions)?;
    Ok(Arc::new(registry))
}

pub struct Conversation {
    id: Uuid,
    is_open: bool,
    game_data: GameData,
    messages: Vec<Message>,
    config: Config,
    data_root: PathBuf,
    connector: Arc<dyn Connector>,
    cleaner: Cleaner,
    run_file: RunFileManager,
    roles: ApiRoles,
    textgen_params: GenerationParams,
    description: String,
    example_messages: Vec<Message>,
    interactions: Arc<InteractionRegistry>,
    summaries: Vec<Summary>,
    summary_store: SummaryStore,
}

impl Conversation {
    /// Start a conversation using HTTP connections to the configured APIs.
    /// `data_root` holds the user scripts and the summary files.
    pub fn new(game_data: GameData, config: Config, data_root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_connector(game_data, config, data_root, Arc::new(HttpConnector))
    }

    /// Start a conversation building its language model roles with `connector`
    pub fn with_connector(
        game_data: GameData,
        config: Config,
        data_root: impl Into<PathBuf>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let data_root = data_root.into();

        let summary_store = SummaryStore::new(&data_root, game_data.player_id, game_data.ai_id);
        let summaries = summary_store
            .load_or_init()
            .map_err(ConversationError::Storage)?;

        tracing::info!("{:?}", config.to_safe_config());
        let loaded = LoadedConfig::load(&config, &data_root, &game_data, connector.as_ref())?;

        let mut run_file = RunFileManager::new(&config.user_folder_path);
        run_file.clear().map_err(ConversationError::Signal)?;

        let id = Uuid::new_v4();
        tracing::debug!(
            "conversation {} started: {} with {}",
            id,
            game_data.player_name,
            game_data.ai_name
        );

        Ok(Self {
            id,
            is_open: true,
            game_data,
            messages: Vec::new(),
            config,
            data_root,
            connector,
            cleaner: clean_message_content,
            run_file,
            roles: loaded.roles,
            textgen_params: loaded.textgen_params,
            description: loaded.description,
            example_messages: loaded.example_messages,
            interactions: loaded.interactions,
            summaries,
            summary_store,
        })
    }

    /// Replace the message cleaner used when `clean_messages` is set
    pub fn with_cleaner(mut self, cleaner: Cleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn push_message(&mut self, message: Message) -> Result<()> {
        self.ensure_open()?;
        self.messages.push(message);
        Ok(())
    }

    /// Generate the AI character's next message and check which interactions
    /// it triggered. Text deltas are passed to `on_chunk` while streaming.
    pub async fn generate_new_ai_message<F>(&mut self, mut on_chunk: F) -> Result<ResponseObject>
    where
        F: FnMut(&str) + Send,
    {
        self.ensure_open()?;

        let text_gen = Arc::clone(&self.roles.text_gen);
        let chat = build_chat_prompt(&self.prompt_context());

        let mut params = GenerationParams {
            max_tokens: Some(self.config.max_tokens),
            ..self.textgen_params.clone()
        };
        let prompt = if text_gen.is_chat() {
            Prompt::Chat(chat)
        } else {
            params.stop = Some(vec![
                self.config.input_sequence.clone(),
                self.config.output_sequence.clone(),
            ]);
            Prompt::Text(convert_chat_to_text(
                &chat,
                &self.config.input_sequence,
                &self.config.output_sequence,
                &self.game_data.ai_name,
            ))
        };

        let mut content = text_gen
            .complete(&prompt, self.config.stream, &params, &mut on_chunk)
            .await
            .map_err(ConversationError::Api)?;

        if self.config.clean_messages {
            content = (self.cleaner)(&content);
        }

        let message = Message::assistant(self.game_data.ai_name.as_str(), content);
        self.messages.push(message.clone());

        let registry = Arc::clone(&self.interactions);
        let interactions = check_interactions(
            &registry,
            self.roles.interaction.as_ref(),
            &self.game_data,
            &self.messages,
            &self.config,
            &mut self.run_file,
        )
        .await?;

        tracing::info!(
            "triggered interactions: {:?}",
            interactions.iter().map(|i| i.signature.as_str()).collect::<Vec<_>>()
        );

        Ok(ResponseObject {
            message,
            interactions,
        })
    }

    /// End the conversation: signal the game, then summarize and persist
    /// unless the conversation was too short.
    pub async fn summarize(&mut self) -> Result<SummarizeOutcome> {
        self.ensure_open()?;
        self.is_open = false;

        self.run_file
            .pulse(END_CONVERSATION_TRIGGER, SIGNAL_CLEAR_DELAY)
            .map_err(ConversationError::Signal)?;

        if self.messages.len() < MIN_MESSAGES_FOR_SUMMARY {
            tracing::info!(
                "Not enough messages for summarization, no summary has been saved from this conversation!"
            );
            return Ok(SummarizeOutcome::Skipped {
                message_count: self.messages.len(),
            });
        }

        let summarization = Arc::clone(&self.roles.summarization);
        let content = generate_summary(summarization.as_ref(), &self.prompt_context(), &self.config)
            .await
            .map_err(ConversationError::Api)?;

        let summary = Summary {
            date: self.game_data.date.clone(),
            content,
        };
        let mut summaries = Vec::with_capacity(self.summaries.len() + 1);
        summaries.push(summary.clone());
        summaries.extend(self.summaries.iter().cloned());
        self.summary_store
            .save(&summaries)
            .map_err(ConversationError::Storage)?;
        self.summaries = summaries;

        tracing::debug!("saved summary to {}", self.summary_store.path().display());
        Ok(SummarizeOutcome::Saved(summary))
    }

    /// Reload everything derived from `config` and adopt it. On error the
    /// previous config and everything derived from it stay in place.
    pub fn update_config(&mut self, config: Config) -> Result<()> {
        tracing::info!("config updated!");
        self.apply_config(config)
    }

    /// Re-derive scripts, interactions and language model roles from the
    /// current config and reset the run file
    pub fn load_config(&mut self) -> Result<()> {
        self.apply_config(self.config.clone())
    }

    fn apply_config(&mut self, config: Config) -> Result<()> {
        tracing::info!("{:?}", config.to_safe_config());

        let loaded = LoadedConfig::load(
            &config,
            &self.data_root,
            &self.game_data,
            self.connector.as_ref(),
        )?;

        let mut run_file = RunFileManager::new(&config.user_folder_path);
        run_file.clear().map_err(ConversationError::Signal)?;
        self.run_file = run_file;

        self.textgen_params = loaded.textgen_params;
        self.description = loaded.description;
        self.example_messages = loaded.example_messages;
        self.roles = loaded.roles;
        self.interactions = loaded.interactions;
        self.config = config;
        Ok(())
    }

    /// Rebuild the interaction registry from disk
    pub fn load_interactions(&mut self) -> Result<()> {
        self.interactions = load_registry(&self.config, &self.data_root)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open {
            Ok(())
        } else {
            Err(ConversationError::SessionClosed)
        }
    }

    fn prompt_context(&self) -> PromptContext<'_> {
        PromptContext {
            game_data: &self.game_data,
            description: &self.description,
            example_messages: &self.example_messages,
            summaries: &self.summaries,
            messages: &self.messages,
        }
    }

    // Accessors

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn game_data(&self) -> &GameData {
        &self.game_data
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn summaries(&self) -> &[Summary] {
        &self.summaries
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn example_messages(&self) -> &[Message] {
        &self.example_messages
    }

    /// Snapshot of the active interaction registry
    pub fn interactions(&self) -> Arc<InteractionRegistry> {
        Arc::clone(&self.interactions)
    }

    pub fn roles(&self) -> &ApiRoles {
        &self.roles
    }

    pub fn summary_path(&self) -> &Path {
        self.summary_store.path()
    }

    pub fn run_file_path(&self) -> &Path {
        self.run_file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactions::fixtures::{write_action, BECOME_RIVALS, GIFT_GOLD};
    use crate::llm::testing::{ScriptedModel, StubConnector};
    use crate::message::Role;
    use crate::scripts::{DESCRIPTION_DIR, EXAMPLE_MESSAGES_DIR};
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    const EXAMPLES: &str = r#"
[[messages]]
role = "user"
name = "{{ playerName }}"
content = "Greetings."

[[messages]]
role = "assistant"
name = "{{ aiName }}"
content = "Well met, {{ playerName }}."
"#;

    struct Fixture {
        root: TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let description_dir = root.path().join(DESCRIPTION_DIR);
            std::fs::create_dir_all(&description_dir).unwrap();
            std::fs::write(
                description_dir.join("standard.j2"),
                "You are {{ aiName }}, talking to {{ playerName }} in {{ location }}.",
            )
            .unwrap();

            let examples_dir = root.path().join(EXAMPLE_MESSAGES_DIR);
            std::fs::create_dir_all(&examples_dir).unwrap();
            std::fs::write(examples_dir.join("standard.toml"), EXAMPLES).unwrap();

            let mut config = Config::default();
            config.text_generation_api_connection.model = "gen".to_string();
            config.summarization_api_connection.model = "sum".to_string();
            config.interaction_api_connection.model = "act".to_string();
            config.user_folder_path = root.path().join("game");

            Self { root, config }
        }

        fn path(&self) -> &Path {
            self.root.path()
        }

        fn conversation(&self, connector: StubConnector) -> Conversation {
            self.conversation_with(self.config.clone(), connector)
        }

        fn conversation_with(&self, config: Config, connector: StubConnector) -> Conversation {
            Conversation::with_connector(game_data(), config, self.path(), Arc::new(connector))
                .unwrap()
        }
    }

    fn game_data() -> GameData {
        GameData {
            date: "1066.9.15".to_string(),
            location: "Paris".to_string(),
            player_id: 1,
            ai_id: 2,
            player_name: "Robert".to_string(),
            ai_name: "Ermengarde".to_string(),
            ..Default::default()
        }
    }

    fn push_exchanges(conversation: &mut Conversation, count: usize) {
        for i in 0..count {
            let message = if i % 2 == 0 {
                Message::user("Robert", format!("line {}", i))
            } else {
                Message::assistant("Ermengarde", format!("reply {}", i))
            };
            conversation.push_message(message).unwrap();
        }
    }

    /// Log output of the subscriber installed by `capture_logs`
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    #[tokio::test]
    async fn test_new_loads_scripts_and_creates_summary_file() {
        let fixture = Fixture::new();
        let conversation = fixture.conversation(StubConnector::new());

        assert!(conversation.is_open());
        assert_eq!(
            conversation.description(),
            "You are Ermengarde, talking to Robert in Paris."
        );
        assert_eq!(conversation.example_messages().len(), 2);
        assert_eq!(conversation.example_messages()[1].content, "Well met, Robert.");
        assert_eq!(
            std::fs::read_to_string(conversation.summary_path()).unwrap(),
            "[]"
        );
        assert!(conversation
            .summary_path()
            .ends_with("conversation_summaries/1/2.json"));
        assert_eq!(
            std::fs::read_to_string(conversation.run_file_path()).unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn test_chat_generation_cleans_and_appends() {
        let fixture = Fixture::new();
        let model = Arc::new(ScriptedModel::new(true).reply("Hello.\""));
        let mut conversation = fixture.conversation(StubConnector::new().with("gen", model.clone()));

        conversation
            .push_message(Message::user("Robert", "Hi there"))
            .unwrap();

        let mut streamed = String::new();
        let response = conversation
            .generate_new_ai_message(|chunk| streamed.push_str(chunk))
            .await
            .unwrap();

        assert_eq!(response.message, Message::assistant("Ermengarde", "Hello."));
        assert!(response.interactions.is_empty());
        assert_eq!(streamed, "Hello.\"");
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.messages()[1].content, "Hello.");

        let prompts = model.prompts.lock().unwrap();
        let (Prompt::Chat(chat), params) = &prompts[0] else {
            panic!("expected chat prompt");
        };
        assert_eq!(chat[0].role, Role::System);
        assert_eq!(chat[0].content, conversation.description());
        assert_eq!(chat.last().unwrap().content, "Hi there");
        assert_eq!(params.max_tokens, Some(200));
        assert_eq!(params.temperature, Some(0.8));
    }

    #[tokio::test]
    async fn test_instruct_generation_appends_one_message() {
        let fixture = Fixture::new();
        let model = Arc::new(ScriptedModel::new(false).reply("I have waited for you."));
        let mut conversation = fixture.conversation(StubConnector::new().with("gen", model.clone()));

        push_exchanges(&mut conversation, 3);
        let before = conversation.messages().len();

        conversation.generate_new_ai_message(|_| {}).await.unwrap();
        assert_eq!(conversation.messages().len(), before + 1);

        let prompts = model.prompts.lock().unwrap();
        let (Prompt::Text(text), params) = &prompts[0] else {
            panic!("expected text prompt");
        };
        assert!(text.starts_with("You are Ermengarde"));
        assert!(text.ends_with("### Response:\nErmengarde:"));
        assert_eq!(
            params.stop,
            Some(vec!["### Instruction:".to_string(), "### Response:".to_string()])
        );
    }

    #[tokio::test]
    async fn test_cleaning_can_be_disabled_or_replaced() {
        let fixture = Fixture::new();
        let mut config = fixture.config.clone();
        config.clean_messages = false;

        let model = Arc::new(ScriptedModel::new(true).reply("Hello.\""));
        let mut conversation =
            fixture.conversation_with(config, StubConnector::new().with("gen", model));
        let response = conversation.generate_new_ai_message(|_| {}).await.unwrap();
        assert_eq!(response.message.content, "Hello.\"");

        fn shout(text: &str) -> String {
            text.to_uppercase()
        }
        let model = Arc::new(ScriptedModel::new(true).reply("quiet"));
        let mut conversation = fixture
            .conversation(StubConnector::new().with("gen", model))
            .with_cleaner(shout);
        let response = conversation.generate_new_ai_message(|_| {}).await.unwrap();
        assert_eq!(response.message.content, "QUIET");
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let fixture = Fixture::new();
        let model = Arc::new(ScriptedModel::new(true).fail("401 Unauthorized"));
        let mut conversation = fixture.conversation(StubConnector::new().with("gen", model));

        let err = conversation.generate_new_ai_message(|_| {}).await.unwrap_err();
        assert!(matches!(err, ConversationError::Api(_)));
        assert!(conversation.messages().is_empty());
    }

    #[tokio::test]
    async fn test_generation_reports_triggered_interactions() {
        let fixture = Fixture::new();
        write_action(&fixture.path().join(ACTIONS_DIR), "becomeRivals.toml", BECOME_RIVALS);

        let model = Arc::new(
            ScriptedModel::new(true)
                .reply("Then we are enemies.")
                .reply(r#"[{"signature": "becomeRivals", "args": ["he insulted her"]}]"#),
        );
        let mut conversation = fixture.conversation(StubConnector::new().with("gen", model.clone()));
        conversation
            .push_message(Message::user("Robert", "Your father was a coward."))
            .unwrap();

        let response = conversation.generate_new_ai_message(|_| {}).await.unwrap();

        assert_eq!(response.interactions.len(), 1);
        assert_eq!(response.interactions[0].signature, "becomeRivals");
        assert_eq!(model.call_count(), 2);
        let written = std::fs::read_to_string(conversation.run_file_path()).unwrap();
        assert!(written.contains("set_relation_rival = { reason = he insulted her target"));
    }

    #[tokio::test]
    async fn test_short_conversation_is_not_summarized() {
        let fixture = Fixture::new();
        let mut config = fixture.config.clone();
        config.summarization_use_text_gen_api = false;

        let summarizer = Arc::new(ScriptedModel::new(true).reply("unused"));
        let mut conversation = fixture
            .conversation_with(config, StubConnector::new().with("sum", summarizer.clone()));
        push_exchanges(&mut conversation, 3);

        let before = std::fs::read_to_string(conversation.summary_path()).unwrap();
        let outcome = conversation.summarize().await.unwrap();

        assert_eq!(outcome, SummarizeOutcome::Skipped { message_count: 3 });
        assert_eq!(summarizer.call_count(), 0);
        assert_eq!(
            std::fs::read_to_string(conversation.summary_path()).unwrap(),
            before
        );
        assert_eq!(
            std::fs::read_to_string(conversation.run_file_path()).unwrap(),
            END_CONVERSATION_TRIGGER
        );
        assert!(!conversation.is_open());
    }

    #[tokio::test]
    async fn test_short_conversation_logs_skipped_summary() {
        let (logs, _guard) = capture_logs();
        let fixture = Fixture::new();
        let mut conversation = fixture.conversation(StubConnector::new());
        push_exchanges(&mut conversation, 2);

        conversation.summarize().await.unwrap();
        assert!(logs.contents().contains(
            "Not enough messages for summarization, no summary has been saved from this conversation!"
        ));
    }

    #[tokio::test]
    async fn test_failed_summary_save_keeps_summaries() {
        let fixture = Fixture::new();
        let mut config = fixture.config.clone();
        config.summarization_use_text_gen_api = false;
        let summarizer = Arc::new(ScriptedModel::new(true).reply("She swore revenge."));
        let mut conversation =
            fixture.conversation_with(config, StubConnector::new().with("sum", summarizer));
        assert!(conversation.summaries().is_empty());

        // a directory in place of the summary file makes the write fail
        std::fs::remove_file(conversation.summary_path()).unwrap();
        std::fs::create_dir(conversation.summary_path()).unwrap();

        push_exchanges(&mut conversation, 8);
        let err = conversation.summarize().await.unwrap_err();
        assert!(matches!(err, ConversationError::Storage(_)));
        assert!(conversation.summaries().is_empty());
    }

    #[tokio::test]
    async fn test_summary_is_prepended_and_persisted() {
        let fixture = Fixture::new();
        let existing = vec![Summary {
            date: "D0".to_string(),
            content: "X".to_string(),
        }];
        SummaryStore::new(fixture.path(), 1, 2).save(&existing).unwrap();

        let mut config = fixture.config.clone();
        config.summarization_use_text_gen_api = false;
        let summarizer = Arc::new(ScriptedModel::new(true).reply("He confessed his fears."));
        let mut conversation = fixture
            .conversation_with(config, StubConnector::new().with("sum", summarizer.clone()));
        assert_eq!(conversation.summaries(), existing.as_slice());

        push_exchanges(&mut conversation, 8);
        let outcome = conversation.summarize().await.unwrap();

        let expected = vec![
            Summary {
                date: "1066.9.15".to_string(),
                content: "He confessed his fears.".to_string(),
            },
            existing[0].clone(),
        ];
        assert_eq!(outcome, SummarizeOutcome::Saved(expected[0].clone()));
        assert_eq!(conversation.summaries(), expected.as_slice());

        let persisted: Vec<Summary> =
            serde_json::from_str(&std::fs::read_to_string(conversation.summary_path()).unwrap())
                .unwrap();
        assert_eq!(persisted, expected);
        assert_eq!(summarizer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_closed_conversation_rejects_changes() {
        let fixture = Fixture::new();
        let mut conversation = fixture.conversation(StubConnector::new());
        conversation.summarize().await.unwrap();

        assert!(matches!(
            conversation.push_message(Message::user("Robert", "Wait!")),
            Err(ConversationError::SessionClosed)
        ));
        assert!(matches!(
            conversation.generate_new_ai_message(|_| {}).await,
            Err(ConversationError::SessionClosed)
        ));
        assert!(matches!(
            conversation.summarize().await,
            Err(ConversationError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_reload_replaces_interaction_registry() {
        let fixture = Fixture::new();
        let actions = fixture.path().join(ACTIONS_DIR);
        write_action(&actions, "becomeRivals.toml", BECOME_RIVALS);
        write_action(&actions, "giftGold.toml", GIFT_GOLD);

        let mut conversation = fixture.conversation(StubConnector::new());
        let before = conversation.interactions();
        assert_eq!(before.len(), 2);

        let mut config = fixture.config.clone();
        config.disabled_interactions = vec!["giftGold".to_string()];
        conversation.update_config(config).unwrap();
        assert!(conversation.interactions().get("giftGold").is_none());
        assert!(conversation.interactions().get("becomeRivals").is_some());
        // earlier snapshots are untouched
        assert_eq!(before.len(), 2);

        conversation.update_config(fixture.config.clone()).unwrap();
        assert!(conversation.interactions().get("giftGold").is_some());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_config() {
        let fixture = Fixture::new();
        let model = Arc::new(ScriptedModel::new(true).reply("Indeed."));
        let mut conversation = fixture.conversation(StubConnector::new().with("gen", model.clone()));

        let mut config = fixture.config.clone();
        config.selected_desc_script = "missing.j2".to_string();
        config.max_tokens = 7;
        config.temperature = 0.1;
        let err = conversation.update_config(config).unwrap_err();
        assert!(matches!(err, ConversationError::DescriptionScript { .. }));
        assert_eq!(conversation.config().max_tokens, 200);
        assert_eq!(conversation.config().selected_desc_script, "standard.j2");

        conversation.generate_new_ai_message(|_| {}).await.unwrap();
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0].1.max_tokens, Some(200));
        assert_eq!(prompts[0].1.temperature, Some(0.8));
    }

    #[tokio::test]
    async fn test_invalid_interaction_file_is_skipped() {
        let fixture = Fixture::new();
        let actions = fixture.path().join(ACTIONS_DIR);
        write_action(&actions, "becomeRivals.toml", BECOME_RIVALS);
        write_action(
            &actions,
            "giftGold.toml",
            &GIFT_GOLD.replace("{{ aiName }} gives gold", "{{ aiName gives gold"),
        );

        let model = Arc::new(
            ScriptedModel::new(true)
                .reply("Then we are enemies.")
                .reply(r#"[{"signature": "becomeRivals", "args": ["he insulted her"]}]"#),
        );
        let mut conversation = fixture.conversation(StubConnector::new().with("gen", model));
        assert_eq!(conversation.interactions().signatures().collect::<Vec<_>>(), vec!["becomeRivals"]);

        let response = conversation.generate_new_ai_message(|_| {}).await.unwrap();
        assert_eq!(response.interactions.len(), 1);
        assert_eq!(response.interactions[0].signature, "becomeRivals");
    }

    #[tokio::test]
    async fn test_reload_picks_up_script_edits() {
        let fixture = Fixture::new();
        let mut conversation = fixture.conversation(StubConnector::new());

        std::fs::write(
            fixture.path().join(DESCRIPTION_DIR).join("standard.j2"),
            "{{ aiName }} is tired.",
        )
        .unwrap();
        conversation.load_config().unwrap();
        assert_eq!(conversation.description(), "Ermengarde is tired.");
    }

    #[tokio::test]
    async fn test_roles_follow_sharing_flags() {
        let fixture = Fixture::new();
        let mut conversation = fixture.conversation(StubConnector::new());

        let roles = conversation.roles();
        assert!(Arc::ptr_eq(&roles.text_gen, &roles.summarization));
        assert!(Arc::ptr_eq(&roles.text_gen, &roles.interaction));

        let mut config = fixture.config.clone();
        config.interaction_use_text_gen_api = false;
        conversation.update_config(config).unwrap();

        let roles = conversation.roles();
        assert!(Arc::ptr_eq(&roles.text_gen, &roles.summarization));
        assert!(!Arc::ptr_eq(&roles.text_gen, &roles.interaction));
    }

    #[tokio::test]
    async fn test_broken_script_names_failing_role() {
        let fixture = Fixture::new();
        let mut config = fixture.config.clone();
        config.selected_desc_script = "missing.j2".to_string();

        let err = Conversation::with_connector(
            game_data(),
            config,
            fixture.path(),
            Arc::new(StubConnector::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConversationError::DescriptionScript { ref script, .. } if script == "missing.j2"));

        let mut conversation = fixture.conversation(StubConnector::new());
        std::fs::write(
            fixture.path().join(EXAMPLE_MESSAGES_DIR).join("standard.toml"),
            "[[messages]]\nrole = \"narrator\"",
        )
        .unwrap();
        let err = conversation.load_config().unwrap_err();
        assert!(matches!(err, ConversationError::ExampleMessagesScript { .. }));
        // the previous state survives a failed reload
        assert_eq!(conversation.example_messages().len(), 2);
    }
}
