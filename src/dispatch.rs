use crate::constants::markers;
use crate::errors::BotError;
use crate::managers::report::ReportManager;
use crate::managers::servers::{ServerManager, ServerPatch};
use crate::managers::session::SessionController;
use crate::services::auth::{AuthGuard, AuthScope, Principal};
use crate::services::config_store::ServerRecord;
use crate::services::logger::Logger;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::Mutex;

static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(markers::MENTION_PATTERN).expect("mention pattern"));

/// The closed set of operations the transport may hand to the core. Free text
/// is a variant of its own; everything else arrives with validated arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    Help,
    Report,
    RawReport,
    SetServer {
        name: String,
        host: String,
        port: Option<u16>,
        user: String,
        label: Option<String>,
    },
    ListServers,
    SelectServer {
        name: String,
    },
    ServerInfo {
        name: Option<String>,
    },
    EditServer {
        name: String,
        patch: ServerPatch,
    },
    DeleteServer {
        name: String,
    },
    Grant {
        scope: AuthScope,
        id: i64,
    },
    Revoke {
        scope: AuthScope,
        id: i64,
    },
    Activate,
    Deactivate,
    ResetThread,
    Text(String),
}

/// One inbound action as delivered by the transport collaborator.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub principal: Principal,
    pub speaker: Option<String>,
    pub command: BotCommand,
}

/// Single entry point for every inbound action: authorization first, then
/// per-chat serialization, then one exhaustive route. Replies are plain text
/// for the transport to send back verbatim.
pub struct Dispatcher {
    logger: Logger,
    guard: Arc<AuthGuard>,
    servers: Arc<ServerManager>,
    reports: Arc<ReportManager>,
    controller: Arc<SessionController>,
    chat_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl Dispatcher {
    pub fn new(
        logger: Logger,
        guard: Arc<AuthGuard>,
        servers: Arc<ServerManager>,
        reports: Arc<ReportManager>,
        controller: Arc<SessionController>,
    ) -> Self {
        Self {
            logger: logger.child("dispatch"),
            guard,
            servers,
            reports,
            controller,
            chat_locks: DashMap::new(),
        }
    }

    fn chat_lock(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.chat_locks
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Returns the reply text; an empty reply means "say nothing" (free text
    /// in an inactive chat with no mention).
    pub async fn dispatch(&self, event: InboundEvent) -> String {
        if matches!(event.command, BotCommand::Help) {
            return help_text();
        }
        if let Err(err) = self.guard.require_authorized(&event.principal) {
            return render_error(&err);
        }

        let lock = self.chat_lock(event.principal.chat_id);
        let _guard = lock.lock().await;
        self.logger.debug(
            "dispatch",
            Some(&serde_json::json!({
                "chat_id": event.principal.chat_id,
                "user_id": event.principal.user_id,
            })),
        );
        match self.route(event).await {
            Ok(reply) => reply,
            Err(err) => render_error(&err),
        }
    }

    async fn route(&self, event: InboundEvent) -> Result<String, BotError> {
        let chat_id = event.principal.chat_id;
        match event.command {
            BotCommand::Help => Ok(help_text()),
            BotCommand::Report => {
                let server = self.servers.selected(chat_id)?;
                let report = self.reports.run_report(&server).await?;
                self.controller.format_report(chat_id, &report).await
            }
            BotCommand::RawReport => {
                let server = self.servers.selected(chat_id)?;
                let report = self.reports.run_report(&server).await?;
                Ok(report.render())
            }
            BotCommand::SetServer {
                name,
                host,
                port,
                user,
                label,
            } => {
                let record = self
                    .servers
                    .register(chat_id, &name, &host, port, &user, label)?;
                let selected = self.servers.list(chat_id).selected.as_deref()
                    == Some(record.name.as_str());
                Ok(format!(
                    "Registered '{}' ({}:{}, user {}){}",
                    record.name,
                    record.host,
                    record.port,
                    record.user,
                    if selected { " (selected)" } else { "" }
                ))
            }
            BotCommand::ListServers => {
                let chat = self.servers.list(chat_id);
                if chat.servers.is_empty() {
                    return Ok(
                        "No servers registered in this chat. Add one with /set_server".to_string(),
                    );
                }
                let lines: Vec<String> = chat
                    .servers
                    .iter()
                    .map(|record| {
                        let marker = if chat.selected.as_deref() == Some(record.name.as_str()) {
                            " (selected)"
                        } else {
                            ""
                        };
                        format!("- {}{}", summarize(record), marker)
                    })
                    .collect();
                Ok(lines.join("\n"))
            }
            BotCommand::SelectServer { name } => {
                let record = self.servers.select(chat_id, &name)?;
                Ok(format!("Selected '{}'", record.name))
            }
            BotCommand::ServerInfo { name } => {
                let records = self.servers.info(chat_id, name.as_deref())?;
                if records.is_empty() {
                    return Ok(
                        "No servers registered in this chat. Add one with /set_server".to_string(),
                    );
                }
                Ok(records
                    .iter()
                    .map(summarize)
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            BotCommand::EditServer { name, patch } => {
                let record = self.servers.edit(chat_id, &name, patch)?;
                Ok(format!("Updated {}", summarize(&record)))
            }
            BotCommand::DeleteServer { name } => {
                let was_selected = self.servers.delete(chat_id, &name)?;
                Ok(if was_selected {
                    format!(
                        "Deleted '{}'. No server is selected now; pick one with /select_server",
                        name
                    )
                } else {
                    format!("Deleted '{}'", name)
                })
            }
            BotCommand::Grant { scope, id } => {
                let added = self.guard.grant(&event.principal, scope, id)?;
                Ok(if added {
                    format!("Granted access to {} {}", scope_word(scope), id)
                } else {
                    format!("{} {} is already authorized", scope_word(scope), id)
                })
            }
            BotCommand::Revoke { scope, id } => {
                let removed = self.guard.revoke(&event.principal, scope, id)?;
                Ok(if removed {
                    format!("Revoked access for {} {}", scope_word(scope), id)
                } else {
                    format!("{} {} was not authorized", scope_word(scope), id)
                })
            }
            BotCommand::Activate => {
                self.controller.activate(chat_id).await?;
                Ok("Conversation mode is on. Send me a message!".to_string())
            }
            BotCommand::Deactivate => {
                self.controller.deactivate(chat_id)?;
                Ok("Conversation mode is off".to_string())
            }
            BotCommand::ResetThread => {
                self.controller.reset(chat_id)?;
                Ok("Conversation thread reset".to_string())
            }
            BotCommand::Text(text) => {
                if self.controller.is_active(chat_id) || MENTION.is_match(&text) {
                    return self
                        .controller
                        .handle_turn(chat_id, event.speaker.as_deref(), &text)
                        .await;
                }
                Ok(String::new())
            }
        }
    }
}

fn summarize(record: &ServerRecord) -> String {
    let label = record
        .label
        .as_deref()
        .map(|l| format!(" ({})", l))
        .unwrap_or_default();
    format!(
        "{}: {}:{} user {}{}",
        record.name, record.host, record.port, record.user, label
    )
}

fn scope_word(scope: AuthScope) -> &'static str {
    match scope {
        AuthScope::User => "user",
        AuthScope::Group => "group",
    }
}

pub fn render_error(err: &BotError) -> String {
    match err.hint.as_deref() {
        Some(hint) => format!("error: {}\nhint: {}", err.message, hint),
        None => format!("error: {}", err.message),
    }
}

pub fn help_text() -> String {
    [
        "Available commands:",
        "/set_server <name> <host> <port> <user> [label] - register a server",
        "/list_servers - list registered servers",
        "/select_server <name> - pick the active server",
        "/server_info [name] - show one server or all",
        "/edit_server <name> <field=value ...> - change host/port/user/label",
        "/delete_server <name> - remove a server",
        "/report - run the diagnostic report on the selected server",
        "/raw_report - same report, without assistant formatting",
        "/talk - start conversation mode (mentioning the bot also works)",
        "/stop - leave conversation mode",
        "/reset_thread - forget the conversation thread",
        "/grant user|group <id> - authorize a user or group (admin only)",
        "/revoke user|group <id> - remove authorization (admin only)",
        "/help - show this message",
    ]
    .join("\n")
}
