use crate::errors::BotError;
use crate::utils::fs_atomic::atomic_write_text_file;
use crate::utils::paths::resolve_config_path;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::RwLock;

/// A named remote host registered within one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Per-chat server registry. `servers` keeps insertion order; `selected`
/// names at most one of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatServers {
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    authorized_users: BTreeSet<i64>,
    #[serde(default)]
    authorized_groups: BTreeSet<i64>,
    #[serde(default)]
    chats: BTreeMap<String, ChatServers>,
}

/// Durable store for the authorization sets and every chat's server registry.
/// The whole document is rewritten atomically on each mutation; a failed write
/// rolls the in-memory copy back so state never diverges from disk.
#[derive(Debug)]
pub struct ConfigStore {
    file_path: PathBuf,
    admin_id: i64,
    doc: RwLock<ConfigDocument>,
}

impl ConfigStore {
    pub fn new(admin_id: i64) -> Result<Self, BotError> {
        Self::with_path(resolve_config_path(), admin_id)
    }

    pub fn with_path(file_path: PathBuf, admin_id: i64) -> Result<Self, BotError> {
        let store = Self {
            file_path,
            admin_id,
            doc: RwLock::new(ConfigDocument::default()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn admin_id(&self) -> i64 {
        self.admin_id
    }

    fn load(&self) -> Result<(), BotError> {
        if !self.file_path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(&self.file_path)
            .map_err(|err| BotError::storage(format!("Failed to load config file: {}", err)))?;
        let parsed: ConfigDocument = serde_json::from_str(&raw)
            .map_err(|err| BotError::storage(format!("Failed to parse config file: {}", err)))?;
        *self.doc.write().unwrap() = parsed;
        Ok(())
    }

    fn persist(&self, doc: &ConfigDocument) -> Result<(), BotError> {
        let data = serde_json::to_string_pretty(doc)
            .map_err(|err| BotError::storage(format!("Failed to serialize config: {}", err)))?;
        atomic_write_text_file(&self.file_path, &format!("{}\n", data), 0o600)
            .map_err(|err| BotError::storage(format!("Failed to save config: {}", err)))
    }

    /// Applies `mutate` to a working copy, persists, then commits. Keeps the
    /// previous in-memory document when the write fails.
    fn with_doc_mut<T>(
        &self,
        mutate: impl FnOnce(&mut ConfigDocument) -> Result<T, BotError>,
    ) -> Result<T, BotError> {
        let mut guard = self.doc.write().unwrap();
        let mut working = guard.clone();
        let out = mutate(&mut working)?;
        self.persist(&working)?;
        *guard = working;
        Ok(out)
    }

    pub fn is_authorized_user(&self, user_id: i64) -> bool {
        self.doc.read().unwrap().authorized_users.contains(&user_id)
    }

    pub fn is_authorized_group(&self, chat_id: i64) -> bool {
        self.doc
            .read()
            .unwrap()
            .authorized_groups
            .contains(&chat_id)
    }

    pub fn authorized_counts(&self) -> (usize, usize) {
        let doc = self.doc.read().unwrap();
        (doc.authorized_users.len(), doc.authorized_groups.len())
    }

    pub fn grant_user(&self, user_id: i64) -> Result<bool, BotError> {
        self.with_doc_mut(|doc| Ok(doc.authorized_users.insert(user_id)))
    }

    pub fn grant_group(&self, chat_id: i64) -> Result<bool, BotError> {
        self.with_doc_mut(|doc| Ok(doc.authorized_groups.insert(chat_id)))
    }

    pub fn revoke_user(&self, user_id: i64) -> Result<bool, BotError> {
        self.with_doc_mut(|doc| Ok(doc.authorized_users.remove(&user_id)))
    }

    pub fn revoke_group(&self, chat_id: i64) -> Result<bool, BotError> {
        self.with_doc_mut(|doc| Ok(doc.authorized_groups.remove(&chat_id)))
    }

    pub fn chat_servers(&self, chat_id: i64) -> ChatServers {
        self.doc
            .read()
            .unwrap()
            .chats
            .get(&chat_id.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Read-modify-write over one chat's registry, persisted before commit.
    pub fn mutate_chat_servers<T>(
        &self,
        chat_id: i64,
        mutate: impl FnOnce(&mut ChatServers) -> Result<T, BotError>,
    ) -> Result<T, BotError> {
        self.with_doc_mut(|doc| {
            let entry = doc.chats.entry(chat_id.to_string()).or_default();
            mutate(entry)
        })
    }
}
