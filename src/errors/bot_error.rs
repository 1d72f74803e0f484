use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotErrorKind {
    InvalidParams,
    PermissionDenied,
    NotFound,
    DuplicateName,
    NoServerSelected,
    HostUnreachable,
    ConnectionRefused,
    AuthFailed,
    Timeout,
    AssistantUnavailable,
    Storage,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotError {
    pub kind: BotErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl BotError {
    pub fn new(kind: BotErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(kind, BotErrorKind::Timeout),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::InvalidParams, "INVALID_PARAMS", message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::PermissionDenied, "PERMISSION_DENIED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::NotFound, "NOT_FOUND", message)
    }

    pub fn duplicate_name(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::DuplicateName, "DUPLICATE_NAME", message)
    }

    pub fn no_server_selected(message: impl Into<String>) -> Self {
        Self::new(
            BotErrorKind::NoServerSelected,
            "NO_SERVER_SELECTED",
            message,
        )
    }

    pub fn host_unreachable(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::HostUnreachable, "HOST_UNREACHABLE", message)
    }

    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::new(
            BotErrorKind::ConnectionRefused,
            "CONNECTION_REFUSED",
            message,
        )
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::AuthFailed, "AUTH_FAILED", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Timeout, "TIMEOUT", message)
    }

    pub fn assistant_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            BotErrorKind::AssistantUnavailable,
            "ASSISTANT_UNAVAILABLE",
            message,
        )
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Storage, "STORAGE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Internal, "INTERNAL", message)
    }
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for BotError {}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::internal(err.to_string())
    }
}
