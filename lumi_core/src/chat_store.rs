//! Per-chat JSON documents on disk.
//!
//! Each (category, chat) pair maps to `<root>/<prefix>_<chat_id>.json`.
//! A missing or unreadable document is replaced by the category's empty
//! document, and the replacement is written back immediately.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the document, so a concurrent reader sees either the old or the new
//! contents, never a partial file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CommandError;
use crate::transport::ChatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCategory {
    /// Memory notes: `{"notes": [...]}`.
    Memory,
    /// Reserved chat metadata: `{"chats": {}}`.
    Chats,
}

impl StoreCategory {
    pub fn prefix(self) -> &'static str {
        match self {
            StoreCategory::Memory => "memory",
            StoreCategory::Chats => "chats",
        }
    }

    pub fn empty_document(self) -> Value {
        match self {
            StoreCategory::Memory => json!({ "notes": [] }),
            StoreCategory::Chats => json!({ "chats": {} }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDocument {
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChatStore {
    root: PathBuf,
}

impl ChatStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn document_path(&self, category: StoreCategory, chat_id: ChatId) -> PathBuf {
        self.root
            .join(format!("{}_{}.json", category.prefix(), chat_id))
    }

    /// Read a document, creating or healing it when needed.
    pub fn load(&self, category: StoreCategory, chat_id: ChatId) -> Result<Value> {
        let path = self.document_path(category, chat_id);
        if !path.exists() {
            let empty = category.empty_document();
            // Another handler may have created it meanwhile; keep theirs.
            if self.write_document(&path, &empty, false)? {
                return Ok(empty);
            }
        }

        let parsed = fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|contents| serde_json::from_str::<Value>(&contents).map_err(Into::into));
        match parsed {
            Ok(document) => Ok(document),
            Err(e) => {
                tracing::warn!("Resetting unreadable document {:?}: {}", path, e);
                self.heal(category, chat_id)
            }
        }
    }

    /// Overwrite the whole document.
    pub fn save(&self, category: StoreCategory, chat_id: ChatId, document: &Value) -> Result<()> {
        let path = self.document_path(category, chat_id);
        self.write_document(&path, document, true)?;
        Ok(())
    }

    /// Write through a sibling temp file and rename it into place. Without
    /// `overwrite`, returns `false` and leaves an existing document alone.
    fn write_document(&self, path: &Path, document: &Value, overwrite: bool) -> Result<bool> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create store directory {:?}", dir))?;
        let contents =
            serde_json::to_string_pretty(document).context("Failed to serialize document")?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
        temp.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write {:?}", path))?;

        let persisted = if overwrite {
            temp.persist(path)
        } else {
            temp.persist_noclobber(path)
        };
        match persisted {
            Ok(_) => Ok(true),
            Err(e) if !overwrite && e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error).with_context(|| format!("Failed to write {:?}", path)),
        }
    }

    fn heal(&self, category: StoreCategory, chat_id: ChatId) -> Result<Value> {
        let empty = category.empty_document();
        self.save(category, chat_id, &empty)?;
        Ok(empty)
    }

    pub fn notes(&self, chat_id: ChatId) -> Result<Vec<String>> {
        let document = self.load(StoreCategory::Memory, chat_id)?;
        match serde_json::from_value::<MemoryDocument>(document) {
            Ok(memory) => Ok(memory.notes),
            Err(e) => {
                tracing::warn!(
                    "Memory document for chat {} has an unexpected shape: {}",
                    chat_id,
                    e
                );
                self.heal(StoreCategory::Memory, chat_id)?;
                Ok(Vec::new())
            }
        }
    }

    pub fn save_notes(&self, chat_id: ChatId, notes: &[String]) -> Result<()> {
        self.save(StoreCategory::Memory, chat_id, &json!({ "notes": notes }))
    }

    pub fn append_note(&self, chat_id: ChatId, note: &str) -> Result<()> {
        let mut notes = self.notes(chat_id)?;
        notes.push(note.to_string());
        self.save_notes(chat_id, &notes)
    }

    /// Remove the note at a 1-based `position`. Nothing is written when the
    /// position is out of range.
    pub fn remove_note(
        &self,
        chat_id: ChatId,
        position: usize,
    ) -> Result<std::result::Result<String, CommandError>> {
        let mut notes = self.notes(chat_id)?;
        if position == 0 || position > notes.len() {
            return Ok(Err(CommandError::OutOfRange {
                position,
                len: notes.len(),
            }));
        }
        let removed = notes.remove(position - 1);
        self.save_notes(chat_id, &notes)?;
        Ok(Ok(removed))
    }

    pub fn clear_notes(&self, chat_id: ChatId) -> Result<()> {
        self.save(
            StoreCategory::Memory,
            chat_id,
            &StoreCategory::Memory.empty_document(),
        )
    }
}
