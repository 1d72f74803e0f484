pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const TIMEOUT_SSH_READY_MS: u64 = 10_000;
    pub const TIMEOUT_COMMAND_DEFAULT_MS: u64 = 20_000;
    pub const KEEPALIVE_INTERVAL_MS: u64 = 30_000;
    pub const EXEC_POLL_SLEEP_MS: u64 = 20;
    pub const TIMEOUT_COMMAND_CLOSE_GRACE_MS: u64 = 2_000;
}

pub mod limits {
    pub const MAX_PORT: u16 = 65_535;
    pub const MIN_PORT: u16 = 1;
    pub const MAX_SERVER_NAME_LENGTH: usize = 64;
    pub const MAX_LABEL_LENGTH: usize = 200;
}

pub mod markers {
    /// Sentinel in assistant output that ends conversation mode.
    pub const CONVERSATION_END: &str = "#fimdepapo";
    /// Prefix the assistant uses to request one vetted diagnostic command.
    pub const ASSISTANT_COMMAND_PREFIX: &str = "cmd:";
    /// Free-text pattern that pulls an inactive chat into conversation mode.
    pub const MENTION_PATTERN: &str = r"(?i)@opsbot\b|\bops\s?bot\b";
    pub const TIMED_OUT_PLACEHOLDER: &str = "command timed out";
}
