use crate::app::App;
use crate::dispatch::{render_error, BotCommand, InboundEvent};
use crate::errors::BotError;
use crate::managers::servers::ServerPatch;
use crate::services::assistant::AssistantClient;
use crate::services::auth::{AuthScope, Principal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Reference transport: line-delimited JSON events on stdin, replies on
/// stdout. Real messaging platforms plug in the same way: parse to a
/// `BotCommand`, build an `InboundEvent`, dispatch.
#[derive(Debug, Deserialize)]
struct InboundLine {
    user_id: i64,
    chat_id: i64,
    text: String,
    #[serde(default)]
    user_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutboundLine<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Placeholder collaborator for the standalone binary: every dialogue call
/// reports the assistant as unavailable. Embedders supply a real client.
struct UnconfiguredAssistant;

#[async_trait::async_trait]
impl AssistantClient for UnconfiguredAssistant {
    async fn create_thread(&self) -> Result<String, BotError> {
        Err(unconfigured())
    }

    async fn post_turn(&self, _thread: &str, _text: &str) -> Result<String, BotError> {
        Err(unconfigured())
    }
}

fn unconfigured() -> BotError {
    BotError::assistant_unavailable("No assistant backend is configured")
        .with_hint("Embed opsbot as a library and provide an AssistantClient implementation")
}

pub fn parse_command(text: &str) -> Result<BotCommand, BotError> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return Ok(BotCommand::Text(trimmed.to_string()));
    }
    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or("/");
    // Group chats may address commands as /command@botname.
    let command = head.split('@').next().unwrap_or(head);
    let args: Vec<&str> = parts.collect();

    match command {
        "/help" => Ok(BotCommand::Help),
        "/report" => Ok(BotCommand::Report),
        "/raw_report" => Ok(BotCommand::RawReport),
        "/list_servers" => Ok(BotCommand::ListServers),
        "/talk" => Ok(BotCommand::Activate),
        "/stop" => Ok(BotCommand::Deactivate),
        "/reset_thread" => Ok(BotCommand::ResetThread),
        "/set_server" => {
            if args.len() < 4 {
                return Err(usage("/set_server <name> <host> <port> <user> [label]"));
            }
            let port = parse_port(args[2])?;
            let label = if args.len() > 4 {
                Some(args[4..].join(" "))
            } else {
                None
            };
            Ok(BotCommand::SetServer {
                name: args[0].to_string(),
                host: args[1].to_string(),
                port: Some(port),
                user: args[3].to_string(),
                label,
            })
        }
        "/select_server" => match args.as_slice() {
            [name] => Ok(BotCommand::SelectServer {
                name: name.to_string(),
            }),
            _ => Err(usage("/select_server <name>")),
        },
        "/server_info" => match args.as_slice() {
            [] => Ok(BotCommand::ServerInfo { name: None }),
            [name] => Ok(BotCommand::ServerInfo {
                name: Some(name.to_string()),
            }),
            _ => Err(usage("/server_info [name]")),
        },
        "/delete_server" => match args.as_slice() {
            [name] => Ok(BotCommand::DeleteServer {
                name: name.to_string(),
            }),
            _ => Err(usage("/delete_server <name>")),
        },
        "/edit_server" => {
            let Some((name, fields)) = args.split_first() else {
                return Err(usage("/edit_server <name> <field=value ...>"));
            };
            if fields.is_empty() {
                return Err(usage("/edit_server <name> <field=value ...>"));
            }
            let mut patch = ServerPatch::default();
            for field in fields {
                let Some((key, value)) = field.split_once('=') else {
                    return Err(BotError::invalid_params(format!(
                        "Expected field=value, got '{}'",
                        field
                    ))
                    .with_hint("Fields: host, port, user, label"));
                };
                match key {
                    "host" => patch.host = Some(value.to_string()),
                    "port" => patch.port = Some(parse_port(value)?),
                    "user" => patch.user = Some(value.to_string()),
                    "label" => patch.label = Some(value.to_string()),
                    _ => {
                        return Err(BotError::invalid_params(format!(
                            "Unknown field '{}'",
                            key
                        ))
                        .with_hint("Fields: host, port, user, label"))
                    }
                }
            }
            Ok(BotCommand::EditServer {
                name: name.to_string(),
                patch,
            })
        }
        "/grant" => parse_access(&args, "/grant").map(|(scope, id)| BotCommand::Grant { scope, id }),
        "/revoke" => {
            parse_access(&args, "/revoke").map(|(scope, id)| BotCommand::Revoke { scope, id })
        }
        _ => Err(BotError::invalid_params(format!("Unknown command: {}", command))
            .with_hint("Use /help to see the available commands")),
    }
}

fn parse_access(args: &[&str], command: &str) -> Result<(AuthScope, i64), BotError> {
    let usage_line = format!("{} user|group <id>", command);
    match args {
        [scope, id] => {
            let scope = match *scope {
                "user" => AuthScope::User,
                "group" => AuthScope::Group,
                _ => return Err(usage(&usage_line)),
            };
            let id = id
                .parse::<i64>()
                .map_err(|_| BotError::invalid_params("Id must be numeric").with_hint(usage_line.clone()))?;
            Ok((scope, id))
        }
        _ => Err(usage(&usage_line)),
    }
}

fn parse_port(raw: &str) -> Result<u16, BotError> {
    raw.parse::<u16>()
        .map_err(|_| BotError::invalid_params(format!("Port must be a number, got '{}'", raw)))
}

fn usage(line: &str) -> BotError {
    BotError::invalid_params("Wrong arguments").with_hint(format!("Usage: {}", line))
}

pub struct StdioServer {
    app: App,
}

impl StdioServer {
    pub fn new() -> Result<Self, BotError> {
        Ok(Self {
            app: App::initialize(Arc::new(UnconfiguredAssistant))?,
        })
    }

    pub async fn run(&self) -> Result<(), BotError> {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin).lines();
        let mut writer = BufWriter::new(stdout);

        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|err| BotError::internal(err.to_string()))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let inbound: InboundLine = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(_) => {
                    writer
                        .write_all(b"{\"error\":\"Parse error\"}\n")
                        .await?;
                    writer.flush().await?;
                    continue;
                }
            };

            let reply = match parse_command(&inbound.text) {
                Ok(command) => {
                    let event = InboundEvent {
                        principal: Principal::new(inbound.user_id, inbound.chat_id),
                        speaker: inbound.user_name.clone(),
                        command,
                    };
                    self.app.dispatcher.dispatch(event).await
                }
                Err(err) => render_error(&err),
            };
            if reply.is_empty() {
                continue;
            }

            let outbound = OutboundLine {
                chat_id: inbound.chat_id,
                text: &reply,
            };
            let payload = serde_json::to_string(&outbound)
                .map_err(|err| BotError::internal(err.to_string()))?;
            writer.write_all(payload.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok(())
    }
}

pub async fn run_stdio() -> Result<(), BotError> {
    let server = StdioServer::new()?;
    server.run().await
}
