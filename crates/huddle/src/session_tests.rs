// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const M1: &str = r#"{"type":"newMessage","id":"m1","sender_username":"alice","content":"hi"}"#;

fn alice_len(store: &ThreadStore) -> usize {
    store.thread(&ThreadKey::direct("alice")).map_or(0, |t| t.len())
}

#[test]
fn duplicate_frame_yields_one_message() {
    let mut store = ThreadStore::new("me");
    store.select(ThreadKey::direct("alice"));

    let first = apply_frame(&mut store, M1);
    let second = apply_frame(&mut store, M1);

    assert!(matches!(first, Some(SessionEvent::Message { active: true, .. })), "got {first:?}");
    assert_eq!(second, None);
    let ids: Vec<_> = store
        .thread(&ThreadKey::direct("alice"))
        .map(|t| t.messages().iter().map(|m| m.id.clone()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![Some("m1".to_owned())]);
}

#[yare::parameterized(
    empty = { "" },
    not_json = { "hello" },
    array = { "[1,2]" },
    no_type = { r#"{"sender_username":"alice","content":"x"}"# },
    no_sender = { r#"{"type":"newMessage","id":"m9","content":"x"}"# },
    unknown_kind = { r#"{"type":"reaction","id":"m9","sender_username":"alice"}"# },
    bad_image = { r#"{"type":"newImage","id":"m9","sender_username":"alice","content":"%%%"}"# },
)]
fn rejected_frames_leave_threads_unchanged(frame: &str) {
    let mut store = ThreadStore::new("me");
    apply_frame(&mut store, M1);

    assert_eq!(apply_frame(&mut store, frame), None);
    assert_eq!(alice_len(&store), 1);
    assert_eq!(store.keys().count(), 1);
}

#[test]
fn typing_is_reported_but_not_stored() {
    let mut store = ThreadStore::new("me");
    let event = apply_frame(&mut store, r#"{"type":"typing","sender_username":"alice"}"#);
    assert_eq!(
        event,
        Some(SessionEvent::Typing { thread: ThreadKey::direct("alice"), user: "alice".to_owned() })
    );
    assert_eq!(store.keys().count(), 0);
}

#[test]
fn group_typing_targets_group_thread() {
    let mut store = ThreadStore::new("me");
    let event =
        apply_frame(&mut store, r#"{"type":"typing","sender_username":"bob","group_id":"7"}"#);
    assert_eq!(event.as_ref().and_then(SessionEvent::thread), Some(&ThreadKey::group("7")));
}

#[test]
fn own_typing_echo_is_ignored() {
    let mut store = ThreadStore::new("me");
    let frame = r#"{"type":"typing","sender_username":"me","target_username":"alice"}"#;
    let event = apply_frame(&mut store, frame);
    assert_eq!(event, None);
}

#[test]
fn echo_of_local_image_reconciles() {
    let mut store = ThreadStore::new("me");
    let key = ThreadKey::direct("alice");
    let local = Message {
        id: None,
        client_id: Some("c-1".to_owned()),
        sender: "me".to_owned(),
        target: Some("alice".to_owned()),
        group_id: None,
        body: crate::model::MessageBody::Image {
            data: "aGk=".to_owned(),
            file_type: "image/png".to_owned(),
            file_name: None,
        },
        created_at: None,
    };
    store.push_local(&key, local);

    let echo = r#"{"type":"newImage","id":"srv-1","client_id":"c-1","sender_username":"me","target_username":"alice","content":"aGk=","fileType":"image/png"}"#;
    let event = apply_frame(&mut store, echo);
    assert!(matches!(event, Some(SessionEvent::Reconciled { .. })), "got {event:?}");
    assert_eq!(store.thread(&key).map(|t| t.len()), Some(1));
    assert_eq!(store.thread(&key).map(|t| t.contains_id("srv-1")), Some(true));
}

#[tokio::test]
async fn new_session_starts_idle_with_no_threads() {
    let session = ChatSession::new(ChatConfig::new("http://127.0.0.1:1", "me"));
    assert_eq!(session.connection_state(), ConnectionState::Idle);
    assert_eq!(session.identity(), "me");
    assert!(session.active_thread().await.is_none());
    assert!(session.messages(&ThreadKey::direct("alice")).await.is_empty());
}

#[tokio::test]
async fn whitespace_send_is_rejected() {
    let session = ChatSession::new(ChatConfig::new("http://127.0.0.1:1", "me"));
    let result = session.send_text(&ThreadKey::direct("alice"), "   ").await;
    assert_eq!(result, Err(SendError::Empty));
}
