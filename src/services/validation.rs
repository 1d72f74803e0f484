use crate::constants::limits::{MAX_PORT, MAX_SERVER_NAME_LENGTH, MIN_PORT};
use crate::errors::BotError;

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(&self, value: &str, label: &str) -> Result<String, BotError> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(BotError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(normalized.to_string())
    }

    pub fn ensure_port(&self, value: Option<u16>) -> Result<u16, BotError> {
        let port = value.unwrap_or(crate::constants::network::SSH_DEFAULT_PORT);
        if port < MIN_PORT {
            return Err(BotError::invalid_params(format!(
                "Port must be an integer between {} and {}",
                MIN_PORT, MAX_PORT
            )));
        }
        Ok(port)
    }

    pub fn ensure_server_name(&self, value: &str) -> Result<String, BotError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(BotError::invalid_params(
                "Server name must be a non-empty string",
            ));
        }
        if trimmed.len() > MAX_SERVER_NAME_LENGTH {
            return Err(BotError::invalid_params(format!(
                "Server name must be at most {} characters",
                MAX_SERVER_NAME_LENGTH
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(BotError::invalid_params(
                "Server name may only contain letters, digits, '-', '_' and '.'",
            ));
        }
        Ok(trimmed.to_string())
    }

    pub fn ensure_host(&self, value: &str) -> Result<String, BotError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(BotError::invalid_params("Host must be a non-empty string"));
        }
        if trimmed.contains(char::is_whitespace) || trimmed.contains('\0') {
            return Err(BotError::invalid_params(
                "Host must not contain whitespace or null bytes",
            ));
        }
        Ok(trimmed.to_string())
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}
