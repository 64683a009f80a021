//! Conversation summary storage
//!
//! One JSON file per player/AI pair at
//! `<root>/conversation_summaries/<playerID>/<aiID>.json`, holding the
//! summaries newest first. Saves overwrite the whole file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::game_data::CharacterId;
use crate::message::Summary;

/// Directory under the data root holding all summary files
pub const SUMMARIES_DIR: &str = "conversation_summaries";

/// Summary storage handler for one player/AI pair
#[derive(Debug, Clone)]
pub struct SummaryStore {
    path: PathBuf,
}

impl SummaryStore {
    pub fn new(root: &Path, player_id: CharacterId, ai_id: CharacterId) -> Self {
        let path = root
            .join(SUMMARIES_DIR)
            .join(player_id.to_string())
            .join(format!("{}.json", ai_id));
        Self { path }
    }

    /// Create summary storage with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored summaries, creating an empty file if none exists yet
    pub fn load_or_init(&self) -> Result<Vec<Summary>> {
        if !self.path.exists() {
            self.save(&[])?;
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read summary file: {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse summary file: {}", self.path.display()))
    }

    /// Overwrite the file with `summaries`
    pub fn save(&self, summaries: &[Summary]) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create summary directory: {}", parent.display())
            })?;
        }

        let content = to_tab_pretty_json(&summaries).context("Failed to serialize summaries")?;

        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write summary file: {}", self.path.display()))
    }
}

/// Pretty-print with tab indentation
fn to_tab_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}
