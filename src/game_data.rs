//! Read-only snapshot of the game state for one conversation
//!
//! The game exports this as JSON when a conversation starts. Field names
//! follow the game's export (camelCase) so the same names are available to
//! user scripts and interaction checks.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Identifier the game assigns to a character
pub type CharacterId = u64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameData {
    pub date: String,
    pub scene: String,
    pub location: String,
    #[serde(rename = "playerID")]
    pub player_id: CharacterId,
    #[serde(rename = "aiID")]
    pub ai_id: CharacterId,
    pub player_name: String,
    pub ai_name: String,
    pub characters: HashMap<CharacterId, Character>,
}

impl GameData {
    /// Load a game data snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read game data: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse game data: {}", path.display()))
    }

    pub fn player(&self) -> Option<&Character> {
        self.characters.get(&self.player_id)
    }

    pub fn ai(&self) -> Option<&Character> {
        self.characters.get(&self.ai_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Character {
    pub id: CharacterId,
    pub short_name: String,
    pub full_name: String,
    pub primary_title: String,
    pub she_he: String,
    pub age: u32,
    pub gold: f64,
    pub opinion_of_player: i32,
    pub personality: String,
    pub culture: String,
    pub faith: String,
    pub house: String,
    pub is_ruler: bool,
    pub traits: Vec<Trait>,
    pub relations_to_player: Vec<String>,
    pub opinion_breakdown_to_player: Vec<OpinionModifier>,
    /// Any further exported fields, passed through untouched to scripts
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Character {
    /// Opinion contributed by previous conversations, 0 when absent
    pub fn conversation_opinion(&self) -> i32 {
        self.opinion_breakdown_to_player
            .iter()
            .find(|m| m.reason == "From conversations")
            .map(|m| m.value)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Trait {
    pub category: String,
    pub name: String,
    pub desc: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpinionModifier {
    pub reason: String,
    pub value: i32,
}
