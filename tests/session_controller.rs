mod common;

use common::harness;
use opsbot::errors::BotErrorKind;

const CHAT: i64 = -100_300;

#[tokio::test]
async fn activation_mints_one_thread_and_reuses_it() {
    let h = harness(1);

    let thread = h.controller.activate(CHAT).await.expect("activate");
    assert_eq!(thread, "thread-0");
    assert!(h.controller.is_active(CHAT));

    h.controller.deactivate(CHAT).expect("deactivate");
    assert!(!h.controller.is_active(CHAT));
    // The handle survives deactivation.
    assert_eq!(h.sessions.get(CHAT).thread.as_deref(), Some("thread-0"));

    let thread = h.controller.activate(CHAT).await.expect("re-activate");
    assert_eq!(thread, "thread-0");
    assert_eq!(h.assistant.threads_created(), 1);
}

#[tokio::test]
async fn termination_marker_deactivates_mid_text_any_case() {
    let h = harness(1);
    h.assistant.push_reply("Tudo certo por aqui. #FimDePapo");

    let reply = h
        .controller
        .handle_turn(CHAT, None, "thanks, that is all")
        .await
        .expect("turn");

    assert!(reply.contains("Mention me again"), "got: {}", reply);
    assert!(!h.controller.is_active(CHAT), "auto-deactivated");
    // Thread is kept for the next activation.
    assert_eq!(h.sessions.get(CHAT).thread.as_deref(), Some("thread-0"));
}

#[tokio::test]
async fn turns_are_attributed_to_the_speaker() {
    let h = harness(1);
    h.controller
        .handle_turn(CHAT, Some("Fabio (fab)"), "disk is acting up")
        .await
        .expect("turn");

    let turns = h.assistant.recorded_turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].0, "thread-0");
    assert!(turns[0].1.starts_with("[Fabio (fab)] "), "got: {}", turns[0].1);
}

#[tokio::test]
async fn assistant_command_request_outside_the_table_is_refused() {
    let h = harness(1);
    h.assistant.push_reply("cmd: rm -rf /");

    let reply = h
        .controller
        .handle_turn(CHAT, None, "clean the disk please")
        .await
        .expect("turn");

    assert!(reply.contains("not a permitted command"), "got: {}", reply);
    assert!(reply.contains("disk"), "reply lists the permitted names");
    // Only the original turn reached the assistant; nothing was executed or
    // posted back.
    assert_eq!(h.assistant.recorded_turns().len(), 1);
}

#[tokio::test]
async fn assistant_command_request_needs_a_selected_server() {
    let h = harness(1);
    h.assistant.push_reply("cmd: disk");

    let err = h
        .controller
        .handle_turn(CHAT, None, "how is the disk?")
        .await
        .expect_err("no server selected");
    assert_eq!(err.kind, BotErrorKind::NoServerSelected);
}

#[tokio::test]
async fn assistant_failure_surfaces_and_chat_stays_inactive() {
    let h = harness(1);
    h.assistant
        .fail
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h.controller.activate(CHAT).await.expect_err("unavailable");
    assert_eq!(err.kind, BotErrorKind::AssistantUnavailable);
    assert!(!h.controller.is_active(CHAT));
    assert!(h.sessions.get(CHAT).thread.is_none());
}

#[tokio::test]
async fn reset_drops_the_thread_so_reactivation_mints_a_new_one() {
    let h = harness(1);
    h.controller.activate(CHAT).await.expect("activate");
    assert_eq!(h.assistant.threads_created(), 1);

    h.controller.reset(CHAT).expect("reset");
    assert!(!h.controller.is_active(CHAT));
    assert!(h.sessions.get(CHAT).thread.is_none());

    let thread = h.controller.activate(CHAT).await.expect("re-activate");
    assert_eq!(thread, "thread-1");
    assert_eq!(h.assistant.threads_created(), 2);
}

#[tokio::test]
async fn sessions_are_tracked_per_chat() {
    let h = harness(1);
    h.controller.activate(CHAT).await.expect("activate");
    assert!(h.controller.is_active(CHAT));
    assert!(!h.controller.is_active(CHAT + 1));

    h.controller.activate(CHAT + 1).await.expect("activate");
    assert_eq!(h.assistant.threads_created(), 2, "one thread per chat");
}
