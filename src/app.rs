use crate::dispatch::Dispatcher;
use crate::errors::BotError;
use crate::managers::report::ReportManager;
use crate::managers::servers::ServerManager;
use crate::managers::session::SessionController;
use crate::services::assistant::AssistantClient;
use crate::services::auth::AuthGuard;
use crate::services::config_store::ConfigStore;
use crate::services::logger::Logger;
use crate::services::session_store::SessionStore;
use crate::services::validation::Validation;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub dispatcher: Arc<Dispatcher>,
}

impl App {
    pub fn initialize(assistant: Arc<dyn AssistantClient>) -> Result<Self, BotError> {
        let logger = Logger::new("opsbot");
        let validation = Validation::new();
        let admin_id = resolve_admin_id()?;

        let config = Arc::new(ConfigStore::new(admin_id)?);
        let sessions = Arc::new(SessionStore::new()?);

        let guard = Arc::new(AuthGuard::new(logger.clone(), config.clone()));
        let servers = Arc::new(ServerManager::new(
            logger.clone(),
            validation.clone(),
            config.clone(),
        ));
        let reports = Arc::new(ReportManager::new(logger.clone()));
        let controller = Arc::new(SessionController::new(
            logger.clone(),
            sessions,
            assistant,
            servers.clone(),
            reports.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            logger.clone(),
            guard,
            servers,
            reports,
            controller,
        ));

        Ok(Self { logger, dispatcher })
    }
}

fn resolve_admin_id() -> Result<i64, BotError> {
    let raw = std::env::var("OPSBOT_ADMIN_ID").map_err(|_| {
        BotError::invalid_params("OPSBOT_ADMIN_ID must be set")
            .with_hint("Set OPSBOT_ADMIN_ID to the bot admin's numeric user id")
    })?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| BotError::invalid_params("OPSBOT_ADMIN_ID must be a numeric user id"))
}
