use std::env;
use std::path::PathBuf;

fn normalize_env_path(value: Option<String>) -> Option<PathBuf> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn resolve_home_dir() -> Option<PathBuf> {
    env::var("HOME").ok().map(PathBuf::from)
}

fn resolve_xdg_state_dir() -> Option<PathBuf> {
    if let Some(path) = normalize_env_path(env::var("XDG_STATE_HOME").ok()) {
        return Some(path);
    }
    resolve_home_dir().map(|home| home.join(".local").join("state"))
}

fn resolve_entry_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
}

fn resolve_base_dir() -> PathBuf {
    if let Some(path) = resolve_xdg_state_dir() {
        return path.join("opsbot");
    }
    resolve_entry_dir().unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

pub fn resolve_config_path() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("OPSBOT_CONFIG_PATH").ok()) {
        return path;
    }
    resolve_base_dir().join("config.json")
}

pub fn resolve_sessions_path() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("OPSBOT_SESSIONS_PATH").ok()) {
        return path;
    }
    resolve_base_dir().join("sessions.json")
}

pub fn resolve_ssh_key_path() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("OPSBOT_SSH_KEY_PATH").ok()) {
        return path;
    }
    resolve_home_dir()
        .map(|home| home.join(".ssh").join("id_ed25519"))
        .unwrap_or_else(|| PathBuf::from("id_ed25519"))
}
