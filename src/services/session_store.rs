use crate::errors::BotError;
use crate::utils::fs_atomic::atomic_write_text_file;
use crate::utils::paths::resolve_sessions_path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Per-chat conversational state. The thread handle is owned by the assistant
/// collaborator and survives deactivation; only an explicit reset drops it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(default)]
    pub talking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(default)]
    chats: BTreeMap<String, ChatSession>,
}

/// Durable store for every chat's conversation session. Single writer of its
/// file; mutations hold the write guard across the read-modify-write cycle.
pub struct SessionStore {
    file_path: PathBuf,
    doc: RwLock<SessionDocument>,
}

impl SessionStore {
    pub fn new() -> Result<Self, BotError> {
        Self::with_path(resolve_sessions_path())
    }

    pub fn with_path(file_path: PathBuf) -> Result<Self, BotError> {
        let store = Self {
            file_path,
            doc: RwLock::new(SessionDocument::default()),
        };
        store.load()?;
        Ok(store)
    }

    fn load(&self) -> Result<(), BotError> {
        if !self.file_path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(&self.file_path)
            .map_err(|err| BotError::storage(format!("Failed to load session file: {}", err)))?;
        let parsed: SessionDocument = serde_json::from_str(&raw)
            .map_err(|err| BotError::storage(format!("Failed to parse session file: {}", err)))?;
        *self.doc.write().unwrap() = parsed;
        Ok(())
    }

    fn persist(&self, doc: &SessionDocument) -> Result<(), BotError> {
        let data = serde_json::to_string_pretty(doc)
            .map_err(|err| BotError::storage(format!("Failed to serialize sessions: {}", err)))?;
        atomic_write_text_file(&self.file_path, &format!("{}\n", data), 0o600)
            .map_err(|err| BotError::storage(format!("Failed to save sessions: {}", err)))
    }

    fn with_session_mut<T>(
        &self,
        chat_id: i64,
        mutate: impl FnOnce(&mut ChatSession) -> T,
    ) -> Result<T, BotError> {
        let mut guard = self.doc.write().unwrap();
        let mut working = guard.clone();
        let session = working.chats.entry(chat_id.to_string()).or_default();
        let out = mutate(session);
        session.last_activity = Some(Utc::now());
        self.persist(&working)?;
        *guard = working;
        Ok(out)
    }

    pub fn get(&self, chat_id: i64) -> ChatSession {
        self.doc
            .read()
            .unwrap()
            .chats
            .get(&chat_id.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_talking(&self, chat_id: i64, talking: bool) -> Result<(), BotError> {
        self.with_session_mut(chat_id, |session| {
            session.talking = talking;
        })
    }

    pub fn set_thread(&self, chat_id: i64, thread: &str) -> Result<(), BotError> {
        self.with_session_mut(chat_id, |session| {
            session.thread = Some(thread.to_string());
        })
    }

    /// Drops the stored thread handle and leaves the chat inactive. The next
    /// activation mints a fresh thread.
    pub fn reset(&self, chat_id: i64) -> Result<(), BotError> {
        self.with_session_mut(chat_id, |session| {
            session.talking = false;
            session.thread = None;
        })
    }
}
