use once_cell::sync::Lazy;
use opsbot::dispatch::Dispatcher;
use opsbot::errors::BotError;
use opsbot::managers::report::ReportManager;
use opsbot::managers::servers::ServerManager;
use opsbot::managers::session::SessionController;
use opsbot::services::assistant::AssistantClient;
use opsbot::services::auth::AuthGuard;
use opsbot::services::config_store::ConfigStore;
use opsbot::services::logger::Logger;
use opsbot::services::session_store::SessionStore;
use opsbot::services::validation::Validation;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn tmp_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
}

/// Scripted assistant double: threads are numbered, replies are popped from a
/// queue ("ok" when empty), every turn is recorded.
pub struct ScriptedAssistant {
    replies: StdMutex<VecDeque<String>>,
    turns: StdMutex<Vec<(String, String)>>,
    threads: AtomicUsize,
    pub fail: AtomicBool,
}

impl ScriptedAssistant {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: StdMutex::new(VecDeque::new()),
            turns: StdMutex::new(Vec::new()),
            threads: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn push_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(text.to_string());
    }

    pub fn threads_created(&self) -> usize {
        self.threads.load(Ordering::SeqCst)
    }

    pub fn recorded_turns(&self) -> Vec<(String, String)> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AssistantClient for ScriptedAssistant {
    async fn create_thread(&self) -> Result<String, BotError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BotError::assistant_unavailable("assistant is down"));
        }
        let n = self.threads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("thread-{}", n))
    }

    async fn post_turn(&self, thread: &str, text: &str) -> Result<String, BotError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BotError::assistant_unavailable("assistant is down"));
        }
        self.turns
            .lock()
            .unwrap()
            .push((thread.to_string(), text.to_string()));
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| "ok".to_string()))
    }
}

pub struct Harness {
    pub dir: PathBuf,
    pub assistant: Arc<ScriptedAssistant>,
    pub config: Arc<ConfigStore>,
    pub sessions: Arc<SessionStore>,
    pub servers: Arc<ServerManager>,
    pub reports: Arc<ReportManager>,
    pub controller: Arc<SessionController>,
    pub dispatcher: Dispatcher,
}

/// Full stack over temp-dir stores. The SSH key path points at a file that
/// does not exist unless a test writes one.
pub fn harness(admin_id: i64) -> Harness {
    let dir = tmp_dir("opsbot-test");
    let logger = Logger::new("test");
    let validation = Validation::new();
    let assistant = ScriptedAssistant::new();

    let config =
        Arc::new(ConfigStore::with_path(dir.join("config.json"), admin_id).expect("config store"));
    let sessions =
        Arc::new(SessionStore::with_path(dir.join("sessions.json")).expect("session store"));
    let guard = Arc::new(AuthGuard::new(logger.clone(), config.clone()));
    let servers = Arc::new(ServerManager::new(
        logger.clone(),
        validation,
        config.clone(),
    ));
    let reports = Arc::new(ReportManager::with_key_path(
        logger.clone(),
        dir.join("bot_key"),
    ));
    let controller = Arc::new(SessionController::new(
        logger.clone(),
        sessions.clone(),
        assistant.clone(),
        servers.clone(),
        reports.clone(),
    ));
    let dispatcher = Dispatcher::new(
        logger,
        guard,
        servers.clone(),
        reports.clone(),
        controller.clone(),
    );

    Harness {
        dir,
        assistant,
        config,
        sessions,
        servers,
        reports,
        controller,
        dispatcher,
    }
}
