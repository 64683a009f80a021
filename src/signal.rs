//! File-based signal channel to the game
//!
//! The game polls a single run file and executes whatever command block it
//! finds there. Content must stay byte-exact; the game parses it as script.
//!
//! A pulse writes a command and clears the file again after a delay. The
//! pending clear is a task owned by the manager: any later write, append,
//! clear or pulse supersedes it, and dropping the manager cancels it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

/// Directory inside the game's user folder holding the run file
pub const RUN_DIR: &str = "run";

/// Name of the run file
pub const RUN_FILE: &str = "ai_talk.txt";

/// Command telling the game the conversation has ended
pub const END_CONVERSATION_TRIGGER: &str = "trigger_event = talk_event.9002";

pub struct RunFileManager {
    path: PathBuf,
    pending_clear: Option<JoinHandle<()>>,
}

impl RunFileManager {
    pub fn new(user_folder_path: &Path) -> Self {
        Self {
            path: user_folder_path.join(RUN_DIR).join(RUN_FILE),
            pending_clear: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file content
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.cancel_pending_clear();
        self.ensure_dir()?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("Failed to write run file: {}", self.path.display()))
    }

    /// Add to the end of the file
    pub fn append(&mut self, text: &str) -> Result<()> {
        self.cancel_pending_clear();
        self.ensure_dir()?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open run file: {}", self.path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("Failed to append to run file: {}", self.path.display()))
    }

    /// Empty the file
    pub fn clear(&mut self) -> Result<()> {
        self.write("")
    }

    /// Write `text`, then clear the file after `delay`.
    /// Must be called from within a tokio runtime.
    pub fn pulse(&mut self, text: &str, delay: Duration) -> Result<()> {
        self.write(text)?;

        let path = self.path.clone();
        self.pending_clear = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = std::fs::write(&path, "") {
                tracing::warn!("Failed to clear run file {}: {}", path.display(), e);
            }
        }));
        Ok(())
    }

    /// Whether a delayed clear is still scheduled
    pub fn has_pending_clear(&self) -> bool {
        self.pending_clear
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn cancel_pending_clear(&mut self) {
        if let Some(handle) = self.pending_clear.take() {
            handle.abort();
        }
    }

    fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create run directory: {}", parent.display())
            })?;
        }
        Ok(())
    }
}

impl Drop for RunFileManager {
    fn drop(&mut self) {
        self.cancel_pending_clear();
    }
}
