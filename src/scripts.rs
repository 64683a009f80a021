//! User-authored description and example message scripts
//!
//! Scripts are minijinja templates read fresh from disk on every load, so
//! edits are picked up by the next config reload without a restart. Both
//! kinds receive the same context:
//!
//! | name         | value                         |
//! |--------------|-------------------------------|
//! | `date`       | in-game date                  |
//! | `scene`      | current scene                 |
//! | `location`   | current location              |
//! | `player`     | player character (may be none)|
//! | `ai`         | AI character (may be none)    |
//! | `playerName` | player character's name       |
//! | `aiName`     | AI character's name           |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use minijinja::Environment;
use serde::{Deserialize, Serialize};

use crate::game_data::{Character, GameData};
use crate::message::Message;

/// Directory of description scripts, relative to the data root
pub const DESCRIPTION_DIR: &str = "custom/scripts/description";

/// Directory of example message scripts, relative to the data root
pub const EXAMPLE_MESSAGES_DIR: &str = "custom/scripts/example messages";

/// Template environment shared by every user script
pub fn script_env() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env
}

/// Values passed to every script
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptContext<'a> {
    pub date: &'a str,
    pub scene: &'a str,
    pub location: &'a str,
    pub player: Option<&'a Character>,
    pub ai: Option<&'a Character>,
    pub player_name: &'a str,
    pub ai_name: &'a str,
}

impl<'a> ScriptContext<'a> {
    pub fn new(game_data: &'a GameData) -> Self {
        Self {
            date: &game_data.date,
            scene: &game_data.scene,
            location: &game_data.location,
            player: game_data.player(),
            ai: game_data.ai(),
            player_name: &game_data.player_name,
            ai_name: &game_data.ai_name,
        }
    }
}

fn read_script(root: &Path, dir: &str, name: &str) -> Result<(PathBuf, String)> {
    let path = root.join(dir).join(name);
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    Ok((path, source))
}

/// Render the selected description script
pub fn render_description(root: &Path, name: &str, ctx: &ScriptContext<'_>) -> Result<String> {
    let (path, source) = read_script(root, DESCRIPTION_DIR, name)?;
    let rendered = script_env()
        .render_str(&source, ctx)
        .with_context(|| format!("Failed to render {}", path.display()))?;
    Ok(rendered.trim().to_string())
}

#[derive(Debug, Deserialize)]
struct ExampleMessagesFile {
    #[serde(default)]
    messages: Vec<Message>,
}

/// Load the selected example messages script, rendering each message's
/// name and content
pub fn render_example_messages(
    root: &Path,
    name: &str,
    ctx: &ScriptContext<'_>,
) -> Result<Vec<Message>> {
    let (path, source) = read_script(root, EXAMPLE_MESSAGES_DIR, name)?;
    let file: ExampleMessagesFile = toml::from_str(&source)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let env = script_env();
    file.messages
        .into_iter()
        .enumerate()
        .map(|(i, msg)| {
            Ok(Message {
                role: msg.role,
                name: env
                    .render_str(&msg.name, ctx)
                    .with_context(|| format!("{}: message {} name", path.display(), i + 1))?,
                content: env
                    .render_str(&msg.content, ctx)
                    .with_context(|| format!("{}: message {} content", path.display(), i + 1))?,
            })
        })
        .collect()
}
