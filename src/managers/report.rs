use crate::constants::{markers, network};
use crate::errors::BotError;
use crate::services::config_store::ServerRecord;
use crate::services::logger::Logger;
use base64::Engine;
use chrono::{DateTime, Utc};
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// One permitted diagnostic command. The table below is the safety boundary:
/// executed strings come from here and nowhere else.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub invocation: &'static str,
    pub timeout_ms: u64,
}

/// Fixed report order; a report runs these sequentially, top to bottom.
pub const REPORT_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "disk",
        invocation: "df -h",
        timeout_ms: network::TIMEOUT_COMMAND_DEFAULT_MS,
    },
    CommandSpec {
        name: "memory",
        invocation: "free -m",
        timeout_ms: network::TIMEOUT_COMMAND_DEFAULT_MS,
    },
    CommandSpec {
        name: "load",
        invocation: "uptime",
        timeout_ms: network::TIMEOUT_COMMAND_DEFAULT_MS,
    },
    CommandSpec {
        name: "backups",
        invocation: "/usr/local/bin/list-backups",
        timeout_ms: 30_000,
    },
    CommandSpec {
        name: "snapshots",
        invocation: "/usr/local/bin/list-snapshots",
        timeout_ms: 30_000,
    },
    CommandSpec {
        name: "apache",
        invocation: "service apache2 status",
        timeout_ms: network::TIMEOUT_COMMAND_DEFAULT_MS,
    },
    CommandSpec {
        name: "mysql",
        invocation: "service mysql status",
        timeout_ms: network::TIMEOUT_COMMAND_DEFAULT_MS,
    },
];

pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    let normalized = name.trim().to_lowercase();
    REPORT_COMMANDS.iter().find(|spec| spec.name == normalized)
}

pub fn command_names() -> Vec<&'static str> {
    REPORT_COMMANDS.iter().map(|spec| spec.name).collect()
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub name: &'static str,
    pub invocation: &'static str,
    pub output: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

/// Collected raw outputs in table order. Formatting for humans is the
/// assistant collaborator's job; `render` is the plain sectioned fallback.
#[derive(Debug, Clone)]
pub struct Report {
    pub server: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<CommandOutput>,
}

impl Report {
    pub fn render(&self) -> String {
        let mut sections = Vec::with_capacity(self.entries.len() + 1);
        sections.push(format!("Report for {}:", self.server));
        for entry in &self.entries {
            sections.push(format!("--- {} ---\n{}", entry.invocation, entry.output));
        }
        sections.join("\n\n")
    }
}

/// Runs the vetted command table on a registered server over SSH. Key-pair
/// auth only; the private key is the bot's, provisioned out of band.
pub struct ReportManager {
    logger: Logger,
    key_path: PathBuf,
}

impl ReportManager {
    pub fn new(logger: Logger) -> Self {
        Self::with_key_path(logger, crate::utils::paths::resolve_ssh_key_path())
    }

    pub fn with_key_path(logger: Logger, key_path: PathBuf) -> Self {
        Self {
            logger: logger.child("report"),
            key_path,
        }
    }

    /// Full report: every table entry in order. Connection-phase failures
    /// abort with zero entries; a per-command timeout records a placeholder
    /// and the loop continues.
    pub async fn run_report(&self, server: &ServerRecord) -> Result<Report, BotError> {
        let report_id = uuid::Uuid::new_v4();
        self.logger.info(
            "report started",
            Some(&serde_json::json!({ "report_id": report_id, "server": server.name })),
        );
        let logger = self.logger.clone();
        let key_path = self.key_path.clone();
        let server = server.clone();
        let report = tokio::task::spawn_blocking(move || {
            run_table_blocking(&logger, &server, &key_path, REPORT_COMMANDS)
        })
        .await
        .map_err(|_| BotError::internal("Report task failed"))??;
        self.logger.info(
            "report finished",
            Some(&serde_json::json!({
                "report_id": report_id,
                "entries": report.entries.len(),
                "timed_out": report.entries.iter().filter(|e| e.timed_out).count(),
            })),
        );
        Ok(report)
    }

    /// One table entry, for the assistant-driven `cmd:` flow.
    pub async fn run_single(
        &self,
        server: &ServerRecord,
        spec: &'static CommandSpec,
    ) -> Result<CommandOutput, BotError> {
        let logger = self.logger.clone();
        let key_path = self.key_path.clone();
        let server = server.clone();
        let report = tokio::task::spawn_blocking(move || {
            run_table_blocking(&logger, &server, &key_path, std::slice::from_ref(spec))
        })
        .await
        .map_err(|_| BotError::internal("Command task failed"))??;
        report
            .entries
            .into_iter()
            .next()
            .ok_or_else(|| BotError::internal("Command produced no entry"))
    }
}

const CONNECT_HINT: &str =
    "Check the /set_server host, port and user, and that the bot public key is installed on the server";

fn run_table_blocking(
    logger: &Logger,
    server: &ServerRecord,
    key_path: &Path,
    table: &[CommandSpec],
) -> Result<Report, BotError> {
    let session = connect_session(logger, server, key_path)?;
    let mut entries = Vec::with_capacity(table.len());
    for spec in table {
        entries.push(run_command_blocking(&session, spec)?);
    }
    let _ = session.disconnect(None, "report finished", None);
    Ok(Report {
        server: server.name.clone(),
        generated_at: Utc::now(),
        entries,
    })
}

fn connect_session(
    logger: &Logger,
    server: &ServerRecord,
    key_path: &Path,
) -> Result<Session, BotError> {
    if !key_path.exists() {
        return Err(BotError::auth_failed(format!(
            "Bot SSH key not found at {}",
            key_path.display()
        ))
        .with_hint("Set OPSBOT_SSH_KEY_PATH to the bot's private key file"));
    }

    let addr = (server.host.as_str(), server.port)
        .to_socket_addrs()
        .map_err(|err| {
            BotError::host_unreachable(format!(
                "Cannot resolve {}:{}: {}",
                server.host, server.port, err
            ))
            .with_hint(CONNECT_HINT)
        })?
        .next()
        .ok_or_else(|| {
            BotError::host_unreachable(format!(
                "Cannot resolve {}:{}",
                server.host, server.port
            ))
            .with_hint(CONNECT_HINT)
        })?;

    let tcp = TcpStream::connect_timeout(
        &addr,
        Duration::from_millis(network::TIMEOUT_SSH_READY_MS),
    )
    .map_err(|err| map_connect_error(server, &err))?;
    tcp.set_read_timeout(Some(Duration::from_millis(network::TIMEOUT_SSH_READY_MS)))
        .ok();
    tcp.set_write_timeout(Some(Duration::from_millis(network::TIMEOUT_SSH_READY_MS)))
        .ok();

    let mut session =
        Session::new().map_err(|_| BotError::internal("Failed to create SSH session"))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|err| {
        BotError::connection_refused(format!(
            "SSH handshake with {}:{} failed: {}",
            server.host, server.port, err
        ))
        .with_hint(CONNECT_HINT)
    })?;

    if let Some(fingerprint) = fingerprint_host_key_sha256(&session) {
        logger.debug(
            "host key",
            Some(&serde_json::json!({ "server": server.name, "fingerprint": fingerprint })),
        );
    }

    session
        .userauth_pubkey_file(&server.user, None, key_path, None)
        .map_err(|err| {
            BotError::auth_failed(format!(
                "SSH authentication as '{}' failed: {}",
                server.user, err
            ))
            .with_hint(CONNECT_HINT)
        })?;
    if !session.authenticated() {
        return Err(BotError::auth_failed("SSH authentication failed").with_hint(CONNECT_HINT));
    }

    let interval = std::cmp::max(1, (network::KEEPALIVE_INTERVAL_MS / 1000) as u32);
    session.set_keepalive(true, interval);
    Ok(session)
}

fn map_connect_error(server: &ServerRecord, err: &std::io::Error) -> BotError {
    let target = format!("{}:{}", server.host, server.port);
    match err.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            BotError::connection_refused(format!("Connection to {} refused: {}", target, err))
                .with_hint(CONNECT_HINT)
        }
        _ => BotError::host_unreachable(format!("Cannot reach {}: {}", target, err))
            .with_hint(CONNECT_HINT),
    }
}

fn fingerprint_host_key_sha256(session: &Session) -> Option<String> {
    let hash = session.host_key_hash(ssh2::HashType::Sha256)?;
    let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash);
    Some(format!("SHA256:{}", encoded))
}

fn map_ssh_error(err: ssh2::Error) -> BotError {
    let io_err: std::io::Error = err.into();
    match io_err.kind() {
        std::io::ErrorKind::TimedOut => BotError::timeout("SSH operation timed out"),
        _ => BotError::internal(format!("SSH error: {}", io_err)),
    }
}

fn run_command_blocking(
    session: &Session,
    spec: &CommandSpec,
) -> Result<CommandOutput, BotError> {
    let mut channel = session.channel_session().map_err(map_ssh_error)?;
    channel.exec(spec.invocation).map_err(map_ssh_error)?;
    session.set_blocking(false);

    let mut stdout_buf: Vec<u8> = Vec::new();
    let mut stderr_buf: Vec<u8> = Vec::new();
    let started = Instant::now();
    let mut timed_out = false;

    {
        let mut stdout_stream = channel.stream(0);
        let mut stderr_stream = channel.stderr();
        loop {
            let mut progressed = false;
            let mut buf = [0u8; 8192];
            match stdout_stream.read(&mut buf) {
                Ok(n) if n > 0 => {
                    stdout_buf.extend_from_slice(&buf[..n]);
                    progressed = true;
                }
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    session.set_blocking(true);
                    return Err(BotError::internal(format!("SSH read failed: {}", err)));
                }
            }
            match stderr_stream.read(&mut buf) {
                Ok(n) if n > 0 => {
                    stderr_buf.extend_from_slice(&buf[..n]);
                    progressed = true;
                }
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    session.set_blocking(true);
                    return Err(BotError::internal(format!("SSH read failed: {}", err)));
                }
            }

            if channel.eof() {
                break;
            }
            if started.elapsed().as_millis() as u64 > spec.timeout_ms {
                timed_out = true;
                break;
            }
            if !progressed {
                std::thread::sleep(Duration::from_millis(network::EXEC_POLL_SLEEP_MS));
            }
        }
    }

    if timed_out {
        // Ask the remote side to stop, give it a short grace window, then
        // move on; the next command gets a fresh channel.
        let _ = channel.close();
        let deadline =
            Instant::now() + Duration::from_millis(network::TIMEOUT_COMMAND_CLOSE_GRACE_MS);
        while Instant::now() < deadline && !channel.eof() {
            std::thread::sleep(Duration::from_millis(network::EXEC_POLL_SLEEP_MS));
        }
        let _ = channel.wait_close();
        session.set_blocking(true);
        return Ok(CommandOutput {
            name: spec.name,
            invocation: spec.invocation,
            output: markers::TIMED_OUT_PLACEHOLDER.to_string(),
            exit_code: None,
            timed_out: true,
        });
    }

    session.set_blocking(true);
    let _ = channel.wait_close();
    let exit_code = channel.exit_status().ok();

    let mut output = String::from_utf8_lossy(&stdout_buf).trim().to_string();
    let stderr_text = String::from_utf8_lossy(&stderr_buf).trim().to_string();
    if !stderr_text.is_empty() {
        if output.is_empty() {
            output = stderr_text;
        } else {
            output.push('\n');
            output.push_str(&stderr_text);
        }
    }

    Ok(CommandOutput {
        name: spec.name,
        invocation: spec.invocation,
        output,
        exit_code,
        timed_out: false,
    })
}
