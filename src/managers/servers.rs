use crate::errors::BotError;
use crate::services::config_store::{ChatServers, ConfigStore, ServerRecord};
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use std::sync::Arc;

/// Partial update for `edit`; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub label: Option<String>,
}

impl ServerPatch {
    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.port.is_none() && self.user.is_none() && self.label.is_none()
    }
}

/// Chat-scoped server registry with single-selection semantics. All mutations
/// go through the config store so selection can never desynchronize.
pub struct ServerManager {
    logger: Logger,
    validation: Validation,
    config: Arc<ConfigStore>,
}

impl ServerManager {
    pub fn new(logger: Logger, validation: Validation, config: Arc<ConfigStore>) -> Self {
        Self {
            logger: logger.child("servers"),
            validation,
            config,
        }
    }

    pub fn register(
        &self,
        chat_id: i64,
        name: &str,
        host: &str,
        port: Option<u16>,
        user: &str,
        label: Option<String>,
    ) -> Result<ServerRecord, BotError> {
        let name = self.validation.ensure_server_name(name)?;
        let host = self.validation.ensure_host(host)?;
        let port = self.validation.ensure_port(port)?;
        let user = self.validation.ensure_string(user, "Login user")?;

        let record = ServerRecord {
            name: name.clone(),
            host,
            port,
            user,
            label,
        };
        let stored = record.clone();
        self.config.mutate_chat_servers(chat_id, move |chat| {
            if chat.servers.iter().any(|s| s.name == stored.name) {
                return Err(BotError::duplicate_name(format!(
                    "A server named '{}' already exists in this chat",
                    stored.name
                ))
                .with_hint("Pick another name, or use /edit_server to change the existing one"));
            }
            let first = chat.servers.is_empty();
            chat.servers.push(stored);
            if first {
                chat.selected = Some(name);
            }
            Ok(())
        })?;
        self.logger.info(
            "server registered",
            Some(&serde_json::json!({ "chat_id": chat_id, "name": record.name })),
        );
        Ok(record)
    }

    /// Insertion-ordered records plus the selected name.
    pub fn list(&self, chat_id: i64) -> ChatServers {
        self.config.chat_servers(chat_id)
    }

    pub fn select(&self, chat_id: i64, name: &str) -> Result<ServerRecord, BotError> {
        let name = self.validation.ensure_server_name(name)?;
        self.config.mutate_chat_servers(chat_id, move |chat| {
            let record = chat
                .servers
                .iter()
                .find(|s| s.name == name)
                .cloned()
                .ok_or_else(|| unknown_server(&name))?;
            chat.selected = Some(record.name.clone());
            Ok(record)
        })
    }

    pub fn edit(
        &self,
        chat_id: i64,
        name: &str,
        patch: ServerPatch,
    ) -> Result<ServerRecord, BotError> {
        let name = self.validation.ensure_server_name(name)?;
        if patch.is_empty() {
            return Err(BotError::invalid_params("Nothing to change")
                .with_hint("Provide at least one of: host, port, user, label"));
        }
        if let Some(host) = patch.host.as_deref() {
            self.validation.ensure_host(host)?;
        }
        if let Some(port) = patch.port {
            self.validation.ensure_port(Some(port))?;
        }
        if let Some(user) = patch.user.as_deref() {
            self.validation.ensure_string(user, "Login user")?;
        }
        self.config.mutate_chat_servers(chat_id, move |chat| {
            let record = chat
                .servers
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| unknown_server(&name))?;
            if let Some(host) = patch.host {
                record.host = host;
            }
            if let Some(port) = patch.port {
                record.port = port;
            }
            if let Some(user) = patch.user {
                record.user = user;
            }
            if let Some(label) = patch.label {
                record.label = Some(label);
            }
            Ok(record.clone())
        })
    }

    /// Removes the record; deleting the selected server leaves the chat with
    /// no selection rather than silently picking another one.
    pub fn delete(&self, chat_id: i64, name: &str) -> Result<bool, BotError> {
        let name = self.validation.ensure_server_name(name)?;
        let was_selected = self.config.mutate_chat_servers(chat_id, move |chat| {
            let position = chat
                .servers
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| unknown_server(&name))?;
            chat.servers.remove(position);
            let was_selected = chat.selected.as_deref() == Some(name.as_str());
            if was_selected {
                chat.selected = None;
            }
            Ok(was_selected)
        })?;
        self.logger.info(
            "server deleted",
            Some(&serde_json::json!({ "chat_id": chat_id, "was_selected": was_selected })),
        );
        Ok(was_selected)
    }

    pub fn info(&self, chat_id: i64, name: Option<&str>) -> Result<Vec<ServerRecord>, BotError> {
        let chat = self.config.chat_servers(chat_id);
        match name {
            None => Ok(chat.servers),
            Some(name) => {
                let name = self.validation.ensure_server_name(name)?;
                let record = chat
                    .servers
                    .into_iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| unknown_server(&name))?;
                Ok(vec![record])
            }
        }
    }

    /// The chat's current execution target.
    pub fn selected(&self, chat_id: i64) -> Result<ServerRecord, BotError> {
        let chat = self.config.chat_servers(chat_id);
        let name = chat.selected.as_deref().ok_or_else(|| {
            BotError::no_server_selected("No server is selected in this chat")
                .with_hint("Register one with /set_server or pick one with /select_server")
        })?;
        chat.servers
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| {
                BotError::internal(format!(
                    "Selected server '{}' is missing from the registry",
                    name
                ))
            })
    }
}

fn unknown_server(name: &str) -> BotError {
    BotError::not_found(format!("No server named '{}' in this chat", name))
        .with_hint("Use /list_servers to see what is registered")
}
