// ABOUTME: Durable local storage for the chat message log
// Saves the full log under a fixed key after every mutation and restores it on startup

use crate::models::{ChatMessage, MessageLog};
use crate::session::error::StorageError;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Key under which the serialized message log is stored
pub const MESSAGES_KEY: &str = "chatMessages";

/// String-keyed slots of durable local state
pub trait KeyValueStorage: Send {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per slot inside a storage directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    storage_path: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `~/.elisa-chat/storage`
    pub fn new() -> Result<Self, StorageError> {
        let home = dirs::home_dir().ok_or(StorageError::NoStorageDir)?;
        Self::with_dir(home.join(".elisa-chat").join("storage"))
    }

    pub fn with_dir(storage_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let storage_path = storage_path.into();

        // Ensure directory exists
        fs::create_dir_all(&storage_path)?;

        Ok(Self { storage_path })
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        // Write to a sibling temp file and rename so a crash never leaves half a snapshot
        let path = self.slot_path(key);
        let tmp_path = self.storage_path.join(format!(".{key}.json.tmp"));
        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// In-memory storage. Clones share the same slots, so a test can hand one
/// clone to a store and inspect or reuse the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.slots.lock().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: impl Into<String>) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(key.to_string(), value.into());
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.insert(key, value);
        Ok(())
    }
}

/// Reads and writes the message log snapshot through a storage backend
pub struct MessagePersistence {
    storage: Box<dyn KeyValueStorage>,
}

impl MessagePersistence {
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Restore the persisted log. Missing or corrupt snapshots yield an empty log.
    pub fn restore(&self) -> MessageLog {
        let content = match self.storage.load(MESSAGES_KEY) {
            Ok(Some(content)) => content,
            Ok(None) => {
                tracing::debug!("No persisted chat messages found");
                return MessageLog::new();
            }
            Err(e) => {
                tracing::warn!("Failed to read persisted chat messages: {}", e);
                return MessageLog::new();
            }
        };

        match serde_json::from_str::<Vec<ChatMessage>>(&content) {
            Ok(messages) => {
                tracing::info!("Restored {} chat messages", messages.len());
                MessageLog::from_messages(messages)
            }
            Err(e) => {
                tracing::warn!("Discarding corrupt chat message snapshot: {}", e);
                MessageLog::new()
            }
        }
    }

    /// Persist the full log, replacing the previous snapshot
    pub fn save(&mut self, log: &MessageLog) -> Result<(), StorageError> {
        let json = serde_json::to_string(log)?;
        self.storage.save(MESSAGES_KEY, &json)
    }
}
