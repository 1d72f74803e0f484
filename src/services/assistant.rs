use crate::errors::BotError;

/// External assistant-dialogue collaborator. One thread per chat; turns are
/// posted against the stored handle. Upstream failures surface as
/// `AssistantUnavailable` and are not retried here.
#[async_trait::async_trait]
pub trait AssistantClient: Send + Sync {
    async fn create_thread(&self) -> Result<String, BotError>;

    async fn post_turn(&self, thread: &str, text: &str) -> Result<String, BotError>;
}
