use crate::constants::markers;
use crate::errors::BotError;
use crate::managers::report::{self, Report, ReportManager};
use crate::managers::servers::ServerManager;
use crate::services::assistant::AssistantClient;
use crate::services::logger::Logger;
use crate::services::session_store::SessionStore;
use std::sync::Arc;

const FAREWELL: &str = "Conversation closed. Mention me again if you need help!";

/// Per-chat conversation state machine: Inactive <-> Active, with the thread
/// handle reused across activations. Callers serialize per chat, so a
/// transition always sees the latest persisted session.
pub struct SessionController {
    logger: Logger,
    sessions: Arc<SessionStore>,
    assistant: Arc<dyn AssistantClient>,
    servers: Arc<ServerManager>,
    reports: Arc<ReportManager>,
}

impl SessionController {
    pub fn new(
        logger: Logger,
        sessions: Arc<SessionStore>,
        assistant: Arc<dyn AssistantClient>,
        servers: Arc<ServerManager>,
        reports: Arc<ReportManager>,
    ) -> Self {
        Self {
            logger: logger.child("session"),
            sessions,
            assistant,
            servers,
            reports,
        }
    }

    pub fn is_active(&self, chat_id: i64) -> bool {
        self.sessions.get(chat_id).talking
    }

    /// Reuses the stored thread handle when one exists; otherwise obtains a
    /// new one and persists it before marking the chat active.
    pub async fn activate(&self, chat_id: i64) -> Result<String, BotError> {
        let thread = self.ensure_thread(chat_id).await?;
        self.sessions.set_talking(chat_id, true)?;
        Ok(thread)
    }

    pub fn deactivate(&self, chat_id: i64) -> Result<(), BotError> {
        self.sessions.set_talking(chat_id, false)
    }

    pub fn reset(&self, chat_id: i64) -> Result<(), BotError> {
        self.logger
            .info("thread reset", Some(&serde_json::json!({ "chat_id": chat_id })));
        self.sessions.reset(chat_id)
    }

    async fn ensure_thread(&self, chat_id: i64) -> Result<String, BotError> {
        if let Some(thread) = self.sessions.get(chat_id).thread {
            return Ok(thread);
        }
        let thread = self.assistant.create_thread().await?;
        self.sessions.set_thread(chat_id, &thread)?;
        self.logger.info(
            "thread created",
            Some(&serde_json::json!({ "chat_id": chat_id })),
        );
        Ok(thread)
    }

    /// One dialogue turn. The reply is inspected for the termination marker
    /// (auto-deactivation) and for the `cmd:` request form; every state
    /// transition is persisted before the reply goes back to the chat.
    pub async fn handle_turn(
        &self,
        chat_id: i64,
        speaker: Option<&str>,
        text: &str,
    ) -> Result<String, BotError> {
        let thread = self.activate(chat_id).await?;
        let message = match speaker {
            Some(name) => format!("[{}] {}", name, text),
            None => text.to_string(),
        };
        let reply = self.assistant.post_turn(&thread, &message).await?;

        // Case-insensitive, anywhere in the reply; the marker itself is
        // lowercase.
        if reply.to_lowercase().contains(markers::CONVERSATION_END) {
            self.sessions.set_talking(chat_id, false)?;
            return Ok(FAREWELL.to_string());
        }

        if let Some(requested) = parse_command_request(&reply) {
            return self.run_requested_command(chat_id, &thread, requested).await;
        }

        Ok(reply)
    }

    /// The assistant asked for one diagnostic by canonical name. Names are
    /// looked up in the compiled table; anything else is refused unexecuted.
    async fn run_requested_command(
        &self,
        chat_id: i64,
        thread: &str,
        requested: &str,
    ) -> Result<String, BotError> {
        let Some(spec) = report::find_command(requested) else {
            self.logger.warn(
                "assistant requested unknown command",
                Some(&serde_json::json!({ "chat_id": chat_id, "requested": requested })),
            );
            return Ok(format!(
                "'{}' is not a permitted command. Permitted: {}",
                requested,
                report::command_names().join(", ")
            ));
        };
        let server = self.servers.selected(chat_id)?;
        let entry = self.reports.run_single(&server, spec).await?;
        let prompt = format!(
            "You are an IT infrastructure assistant talking to IT professionals. \
             Summarize the output below concisely and technically, without obvious \
             explanations.\n\nOutput of `{}` on {}:\n{}",
            entry.invocation, server.name, entry.output
        );
        self.assistant.post_turn(thread, &prompt).await
    }

    /// Hands a collected report to the assistant for formatting, on the
    /// chat's thread so the dialogue history keeps the context.
    pub async fn format_report(&self, chat_id: i64, report: &Report) -> Result<String, BotError> {
        let thread = self.ensure_thread(chat_id).await?;
        let prompt = format!(
            "You are an IT infrastructure assistant talking to IT professionals. \
             Below are the outputs of the diagnostic commands for server {}. \
             Format them concisely and technically, stating the situation of each \
             service without obvious explanations.\n\n{}",
            report.server,
            report.render()
        );
        self.assistant.post_turn(&thread, &prompt).await
    }
}

fn parse_command_request(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();
    let lowered = trimmed.to_lowercase();
    if !lowered.starts_with(markers::ASSISTANT_COMMAND_PREFIX) {
        return None;
    }
    Some(trimmed[markers::ASSISTANT_COMMAND_PREFIX.len()..].trim())
}
