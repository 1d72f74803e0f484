mod common;

use common::harness;
use opsbot::dispatch::{BotCommand, InboundEvent};
use opsbot::managers::servers::ServerPatch;
use opsbot::server::parse_command;
use opsbot::services::auth::{AuthScope, Principal};

const ADMIN: i64 = 99;
const CHAT: i64 = -100_600;

fn admin_event(command: BotCommand) -> InboundEvent {
    InboundEvent {
        principal: Principal::new(ADMIN, CHAT),
        speaker: Some("Admin".to_string()),
        command,
    }
}

#[test]
fn slash_commands_parse_into_the_closed_set() {
    assert_eq!(parse_command("/help").expect("parse"), BotCommand::Help);
    assert_eq!(
        parse_command("/help@opsbot").expect("parse"),
        BotCommand::Help,
        "group-addressed form"
    );
    assert_eq!(parse_command("/report").expect("parse"), BotCommand::Report);
    assert_eq!(
        parse_command("/set_server web1 10.0.0.5 22 ubuntu edge box").expect("parse"),
        BotCommand::SetServer {
            name: "web1".to_string(),
            host: "10.0.0.5".to_string(),
            port: Some(22),
            user: "ubuntu".to_string(),
            label: Some("edge box".to_string()),
        }
    );
    assert_eq!(
        parse_command("/edit_server web1 port=2222 label=staging").expect("parse"),
        BotCommand::EditServer {
            name: "web1".to_string(),
            patch: ServerPatch {
                port: Some(2222),
                label: Some("staging".to_string()),
                ..ServerPatch::default()
            },
        }
    );
    assert_eq!(
        parse_command("/grant group -100500").expect("parse"),
        BotCommand::Grant {
            scope: AuthScope::Group,
            id: -100_500,
        }
    );
    assert_eq!(
        parse_command("hello there").expect("parse"),
        BotCommand::Text("hello there".to_string())
    );
}

#[test]
fn malformed_slash_commands_are_rejected_with_usage() {
    let err = parse_command("/set_server web1").expect_err("too few args");
    assert!(err.hint.as_deref().unwrap_or("").contains("/set_server"));

    let err = parse_command("/set_server web1 10.0.0.5 notaport ubuntu").expect_err("bad port");
    assert!(err.message.contains("Port"));

    let err = parse_command("/edit_server web1 color=red").expect_err("unknown field");
    assert!(err.message.contains("color"));

    let err = parse_command("/grant someone 5").expect_err("bad scope");
    assert!(err.hint.as_deref().unwrap_or("").contains("user|group"));

    assert!(parse_command("/frobnicate").is_err());
}

#[tokio::test]
async fn mention_activates_conversation_mode() {
    let h = harness(ADMIN);
    h.assistant.push_reply("hello! how can I help?");

    let reply = h
        .dispatcher
        .dispatch(admin_event(BotCommand::Text(
            "hey ops bot, everything fine?".to_string(),
        )))
        .await;

    assert_eq!(reply, "hello! how can I help?");
    assert!(h.controller.is_active(CHAT));
    assert_eq!(h.assistant.threads_created(), 1);
}

#[tokio::test]
async fn plain_text_in_an_inactive_chat_stays_silent() {
    let h = harness(ADMIN);
    let reply = h
        .dispatcher
        .dispatch(admin_event(BotCommand::Text("just chatting".to_string())))
        .await;
    assert!(reply.is_empty(), "got: {}", reply);
    assert!(!h.controller.is_active(CHAT));
    assert_eq!(h.assistant.threads_created(), 0);
}

#[tokio::test]
async fn active_chat_routes_free_text_until_the_marker_ends_it() {
    let h = harness(ADMIN);
    h.dispatcher.dispatch(admin_event(BotCommand::Activate)).await;
    assert!(h.controller.is_active(CHAT));

    h.assistant.push_reply("all good #fimdepapo");
    let reply = h
        .dispatcher
        .dispatch(admin_event(BotCommand::Text("are we done?".to_string())))
        .await;
    assert!(reply.contains("Mention me again"), "got: {}", reply);

    // Next plain message is treated as a plain command again, not a turn.
    let reply = h
        .dispatcher
        .dispatch(admin_event(BotCommand::Text("anyone here?".to_string())))
        .await;
    assert!(reply.is_empty());
    assert_eq!(h.assistant.recorded_turns().len(), 1);
}

#[tokio::test]
async fn registry_round_trip_through_the_dispatcher() {
    let h = harness(ADMIN);

    let reply = h
        .dispatcher
        .dispatch(admin_event(BotCommand::SetServer {
            name: "web1".to_string(),
            host: "10.0.0.5".to_string(),
            port: Some(22),
            user: "ubuntu".to_string(),
            label: None,
        }))
        .await;
    assert!(reply.contains("Registered 'web1'"), "got: {}", reply);
    assert!(reply.contains("selected"), "first server is selected");

    let reply = h
        .dispatcher
        .dispatch(admin_event(BotCommand::ListServers))
        .await;
    assert!(reply.contains("web1"), "got: {}", reply);
    assert!(reply.contains("(selected)"));

    let reply = h
        .dispatcher
        .dispatch(admin_event(BotCommand::DeleteServer {
            name: "web1".to_string(),
        }))
        .await;
    assert!(reply.contains("No server is selected now"), "got: {}", reply);

    let reply = h
        .dispatcher
        .dispatch(admin_event(BotCommand::Report))
        .await;
    assert!(reply.contains("No server is selected"), "got: {}", reply);
    assert!(reply.contains("/select_server"), "hint present");
}

#[tokio::test]
async fn duplicate_registration_is_reported_to_the_chat() {
    let h = harness(ADMIN);
    let set = BotCommand::SetServer {
        name: "web1".to_string(),
        host: "10.0.0.5".to_string(),
        port: Some(22),
        user: "ubuntu".to_string(),
        label: None,
    };
    h.dispatcher.dispatch(admin_event(set.clone())).await;
    let reply = h.dispatcher.dispatch(admin_event(set)).await;
    assert!(reply.contains("already exists"), "got: {}", reply);
    assert_eq!(h.servers.list(CHAT).servers.len(), 1);
}
