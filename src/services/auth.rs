use crate::errors::BotError;
use crate::services::config_store::ConfigStore;
use crate::services::logger::Logger;
use std::sync::Arc;

/// Identity of an inbound action: the acting user and the chat it arrived in.
/// Direct chats carry the user id in both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub chat_id: i64,
}

impl Principal {
    pub fn new(user_id: i64, chat_id: i64) -> Self {
        Self { user_id, chat_id }
    }

    pub fn direct(user_id: i64) -> Self {
        Self {
            user_id,
            chat_id: user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScope {
    User,
    Group,
}

/// Gate in front of every stateful operation. A user passes if they are in the
/// authorized-user set, or if the chat they act in is an authorized group.
pub struct AuthGuard {
    logger: Logger,
    config: Arc<ConfigStore>,
}

impl AuthGuard {
    pub fn new(logger: Logger, config: Arc<ConfigStore>) -> Self {
        Self {
            logger: logger.child("auth"),
            config,
        }
    }

    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.config.is_authorized_user(principal.user_id)
            || self.config.is_authorized_group(principal.chat_id)
            || principal.user_id == self.config.admin_id()
    }

    pub fn require_authorized(&self, principal: &Principal) -> Result<(), BotError> {
        if self.is_authorized(principal) {
            return Ok(());
        }
        self.logger.warn(
            "unauthorized access attempt",
            Some(&serde_json::json!({
                "user_id": principal.user_id,
                "chat_id": principal.chat_id,
            })),
        );
        Err(
            BotError::permission_denied("You are not authorized to use this bot").with_hint(
                format!(
                    "Ask the bot admin to grant access for user id {} or chat id {}",
                    principal.user_id, principal.chat_id
                ),
            ),
        )
    }

    pub fn require_admin(&self, principal: &Principal) -> Result<(), BotError> {
        if principal.user_id == self.config.admin_id() {
            return Ok(());
        }
        Err(
            BotError::permission_denied("Only the bot admin may manage access")
                .with_hint("Contact the bot admin to change who is authorized"),
        )
    }

    pub fn grant(
        &self,
        acting: &Principal,
        scope: AuthScope,
        id: i64,
    ) -> Result<bool, BotError> {
        self.require_admin(acting)?;
        let added = match scope {
            AuthScope::User => self.config.grant_user(id)?,
            AuthScope::Group => self.config.grant_group(id)?,
        };
        self.logger.info(
            "grant",
            Some(&serde_json::json!({ "scope": scope_name(scope), "id": id, "added": added })),
        );
        Ok(added)
    }

    pub fn revoke(
        &self,
        acting: &Principal,
        scope: AuthScope,
        id: i64,
    ) -> Result<bool, BotError> {
        self.require_admin(acting)?;
        let removed = match scope {
            AuthScope::User => self.config.revoke_user(id)?,
            AuthScope::Group => self.config.revoke_group(id)?,
        };
        self.logger.info(
            "revoke",
            Some(&serde_json::json!({ "scope": scope_name(scope), "id": id, "removed": removed })),
        );
        Ok(removed)
    }
}

fn scope_name(scope: AuthScope) -> &'static str {
    match scope {
        AuthScope::User => "user",
        AuthScope::Group => "group",
    }
}
