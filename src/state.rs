//! Resume state: where the bot was and which chapters it has already read.
//!
//! Persisted as pretty JSON in `manga_state_{short_id}.json`. A missing or
//! unreadable file means a fresh start; write failures are logged and the
//! run carries on.

use crate::models::{ChapterKey, ChapterRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to write state file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeState {
    pub current_page: u32,
    pub current_manga: Option<String>,
    pub current_volume: u32,
    pub current_chapter: u32,
    pub processed_chapters: BTreeSet<String>,
}

impl Default for ResumeState {
    fn default() -> Self {
        Self {
            current_page: 1,
            current_manga: None,
            current_volume: 1,
            current_chapter: 1,
            processed_chapters: BTreeSet::new(),
        }
    }
}

impl ResumeState {
    pub fn is_processed(&self, key: &ChapterKey) -> bool {
        self.processed_chapters.contains(key.as_str())
    }

    /// Returns false when the key was already present
    pub fn mark_processed(&mut self, key: ChapterKey) -> bool {
        self.processed_chapters.insert(key.into_string())
    }

    pub fn processed_count(&self) -> usize {
        self.processed_chapters.len()
    }

    pub fn position(&self) -> ChapterRef {
        ChapterRef::new(self.current_volume, self.current_chapter)
    }

    pub fn set_position(&mut self, chapter: ChapterRef) {
        self.current_volume = chapter.volume;
        self.current_chapter = chapter.chapter;
    }

    /// Start the given title from its first chapter
    pub fn select(&mut self, slug: &str) {
        self.current_manga = Some(slug.to_string());
        self.set_position(ChapterRef::FIRST);
    }

    // Page numbers are 1-based; a hand-edited 0 would loop on a bad URL
    fn normalize(mut self) -> Self {
        if self.current_page == 0 {
            self.current_page = 1;
        }
        self
    }
}

/// Reads and writes the state file of one installation
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_identity(dir: &Path, short_id: &str) -> Self {
        Self::new(dir.join(format!("manga_state_{}.json", short_id)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when there is no usable state file
    pub fn load(&self) -> Option<ResumeState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Could not read state file {}: {}", self.path.display(), e);
                }
                return None;
            }
        };

        match serde_json::from_str::<ResumeState>(&content) {
            Ok(state) => Some(state.normalize()),
            Err(e) => {
                log::error!("State file {} is corrupt, starting fresh: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn try_save(&self, state: &ResumeState) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json).map_err(|source| StateError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Save, logging a failure instead of returning it
    pub fn save(&self, state: &ResumeState) -> bool {
        match self.try_save(state) {
            Ok(()) => true,
            Err(e) => {
                log::error!("{}", e);
                false
            }
        }
    }
}
