use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use talkbridge::{Config, Conversation, GameData, Message, SummarizeOutcome};

const DEFAULT_LOG_FILTER: &str = "info,talkbridge=debug";

/// Talkbridge - AI dialogue for game characters
#[derive(Parser, Debug)]
#[command(name = "talkbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game data snapshot (JSON) describing the scene and both characters
    #[arg(short, long)]
    game_data: PathBuf,

    /// Directory holding custom scripts and conversation summaries
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_logging(data_dir: &std::path::Path) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let log_path = log_dir.join(format!(
        "talkbridge-{}.log",
        chrono::Local::now().format("%Y-%m-%d")
    ));
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(log_file).with_ansi(false))
        .init();
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.data_dir)?;

    // Load .env files (local first, then home directory)
    // Errors are ignored - files are optional
    let _ = dotenvy::from_filename(".env");
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".env"));
    }

    let game_data = GameData::load(&args.game_data)?;
    let config = load_config(args.config.as_ref())?;
    let player_name = game_data.player_name.clone();
    let ai_name = game_data.ai_name.clone();

    let mut conversation = Conversation::new(game_data, config, &args.data_dir)?;
    println!("Talking to {}. /reload reloads the config, /end ends the conversation.", ai_name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}: ", player_name);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/end" => break,
            "/reload" => {
                match load_config(args.config.as_ref()) {
                    Ok(config) => match conversation.update_config(config) {
                        Ok(()) => println!("Config reloaded."),
                        Err(e) => eprintln!("Error: {}", e),
                    },
                    Err(e) => eprintln!("Error: {:#}", e),
                }
                continue;
            },
            _ => {},
        }

        conversation.push_message(Message::user(player_name.as_str(), line))?;

        print!("{}: ", ai_name);
        std::io::stdout().flush()?;
        let response = conversation
            .generate_new_ai_message(|chunk| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            })
            .await;

        match response {
            Ok(response) => {
                if !conversation.config().stream {
                    print!("{}", response.message.content);
                }
                println!();
                for interaction in &response.interactions {
                    println!("[{}] {}", interaction.chat_message_class, interaction.chat_message);
                }
            },
            Err(e) => {
                println!();
                eprintln!("Error: {}", e);
                tracing::error!("generation failed: {}", e);
            },
        }
    }

    match conversation.summarize().await? {
        SummarizeOutcome::Skipped { message_count } => {
            println!("Conversation ended after {} messages, nothing to summarize.", message_count);
        },
        SummarizeOutcome::Saved(summary) => {
            println!("Summary saved: {}", summary.content);
        },
    }

    // Let the pending run file clear fire before exiting
    tokio::time::sleep(talkbridge::conversation::SIGNAL_CLEAR_DELAY + Duration::from_millis(100)).await;
    Ok(())
}
