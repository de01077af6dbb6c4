//! Integration tests for the WebSocket collaboration flow.

use diagram_sync::config::Config;
use diagram_sync::templates::TemplateCatalog;
use diagram_sync::{build_router, AppState};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const VALID_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL">
  <bpmn:process id="Process_1" isExecutable="false">
    <bpmn:startEvent id="StartEvent_1"/>
  </bpmn:process>
</bpmn:definitions>"#;

/// Start the server on a random port.
async fn start_test_server() -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::default(), TemplateCatalog::builtin()));
    let app = build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn connect(addr: SocketAddr, template: Option<&str>) -> Client {
    let url = match template {
        Some(t) => format!("ws://{}/ws?template={}", addr, t),
        None => format!("ws://{}/ws", addr),
    };
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws
}

/// Connect and return the client together with its `init` payload.
async fn join(addr: SocketAddr, template: Option<&str>) -> (Client, Value) {
    let mut ws = connect(addr, template).await;
    let init = recv_type(&mut ws, "init").await;
    (ws, init)
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn recv_json(ws: &mut Client) -> Option<Value> {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}

/// Skip frames until one of the wanted type arrives.
async fn recv_type(ws: &mut Client, wanted: &str) -> Value {
    loop {
        let msg = recv_json(ws)
            .await
            .unwrap_or_else(|| panic!("timed out waiting for {wanted}"));
        if msg["type"] == wanted {
            return msg;
        }
    }
}

/// Assert that no frame of the given type arrives within a short window.
async fn assert_no_frame(ws: &mut Client, unwanted: &str) {
    loop {
        match tokio::time::timeout(Duration::from_millis(300), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let msg: Value = serde_json::from_str(&text).unwrap();
                assert_ne!(msg["type"], unwanted, "unexpected frame: {msg}");
            }
            Ok(Some(Ok(_))) => continue,
            _ => return,
        }
    }
}

async fn wait_for_user_count(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.store.users().await.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("user count never reached {expected}");
}

#[tokio::test]
async fn test_connect_receives_full_init() {
    let (addr, _state) = start_test_server().await;
    let (_ws, init) = join(addr, None).await;

    let user_id = init["user_id"].as_str().unwrap();
    assert!(init["users"].get(user_id).is_some());
    assert!(init["user_name"].is_string());
    assert!(init["xml"].as_str().unwrap().contains("bpmn:definitions"));
    assert!(init["locked_elements"].as_object().unwrap().is_empty());
    assert_eq!(init["template"], "blank");
    assert_eq!(init["is_initialized"], true);
    assert!(init["session_id"].is_string());
}

#[tokio::test]
async fn test_invalid_template_defaults_to_blank() {
    let (addr, _state) = start_test_server().await;
    let (_ws, init) = join(addr, Some("invalid-template")).await;
    assert_eq!(init["template"], "blank");
}

#[tokio::test]
async fn test_repeated_template_param_still_connects() {
    let (addr, _state) = start_test_server().await;
    let (_ws, init) = join(addr, Some("blank&template=simple-process")).await;
    assert_eq!(init["template"], "simple-process");
    assert_eq!(init["is_initialized"], true);
}

#[tokio::test]
async fn test_empty_template_param_defaults_to_blank() {
    let (addr, _state) = start_test_server().await;
    let (_ws, init) = join(addr, Some("")).await;
    assert_eq!(init["template"], "blank");
}

#[tokio::test]
async fn test_first_template_wins_for_session() {
    let (addr, _state) = start_test_server().await;

    let (_a, init_a) = join(addr, Some("simple-process")).await;
    assert_eq!(init_a["template"], "simple-process");
    assert_eq!(init_a["is_initialized"], true);

    let (_b, init_b) = join(addr, Some("blank")).await;
    assert_eq!(init_b["template"], "simple-process");
    assert_eq!(init_b["is_initialized"], true);
    assert_eq!(init_b["session_id"], init_a["session_id"]);
    assert_eq!(init_b["users"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_new_user_is_announced_to_others() {
    let (addr, _state) = start_test_server().await;
    let (mut a, _) = join(addr, None).await;
    let (_b, init_b) = join(addr, None).await;

    let update = recv_type(&mut a, "users_update").await;
    let b_id = init_b["user_id"].as_str().unwrap();
    assert!(update["users"].get(b_id).is_some());
}

#[tokio::test]
async fn test_xml_update_reaches_others_but_not_sender() {
    let (addr, state) = start_test_server().await;
    let (mut a, _) = join(addr, None).await;
    let (mut b, _) = join(addr, None).await;

    send_json(&mut a, json!({"type": "xml_update", "xml": VALID_XML})).await;

    let update = recv_type(&mut b, "xml_update").await;
    assert_eq!(update["xml"], VALID_XML);
    assert_no_frame(&mut a, "xml_update").await;
    assert_eq!(state.store.document().await, VALID_XML);
}

#[tokio::test]
async fn test_invalid_xml_errors_only_to_sender() {
    let (addr, _state) = start_test_server().await;
    let (mut a, _) = join(addr, None).await;
    let (mut b, _) = join(addr, None).await;

    send_json(&mut a, json!({"type": "xml_update", "xml": "<invalid><unclosed>"})).await;

    let error = recv_type(&mut a, "error").await;
    assert!(error["message"].as_str().unwrap().contains("Invalid XML"));
    assert_no_frame(&mut b, "xml_update").await;
}

#[tokio::test]
async fn test_missing_field_reports_validation_error() {
    let (addr, _state) = start_test_server().await;
    let (mut a, _) = join(addr, None).await;
    let (mut b, _) = join(addr, None).await;

    send_json(&mut a, json!({"type": "xml_update"})).await;

    let error = recv_type(&mut a, "error").await;
    assert!(error["message"].as_str().unwrap().contains("xml"));
    assert_no_frame(&mut b, "xml_update").await;

    // connection stays usable
    send_json(&mut a, json!({"type": "user_name_update", "name": "Still here"})).await;
    loop {
        let update = recv_type(&mut a, "users_update").await;
        let renamed = update["users"]
            .as_object()
            .unwrap()
            .values()
            .any(|v| v == "Still here");
        if renamed {
            break;
        }
    }
}

#[tokio::test]
async fn test_bad_frames_get_error_replies() {
    let (addr, _state) = start_test_server().await;
    let (mut a, _) = join(addr, None).await;

    a.send(Message::Text("not json".into())).await.unwrap();
    let error = recv_type(&mut a, "error").await;
    assert_eq!(error["message"], "Invalid JSON format");

    send_json(&mut a, json!({"type": "do_something_else"})).await;
    let error = recv_type(&mut a, "error").await;
    assert!(error["message"].as_str().unwrap().contains("do_something_else"));
}

#[tokio::test]
async fn test_selection_locks_and_replaces() {
    let (addr, _state) = start_test_server().await;
    let (mut a, init_a) = join(addr, None).await;
    let (mut b, _) = join(addr, None).await;
    let a_id = init_a["user_id"].clone();

    send_json(&mut a, json!({"type": "element_select", "element_ids": ["e1"]})).await;
    for ws in [&mut a, &mut b] {
        let update = recv_type(ws, "locked_elements_update").await;
        assert_eq!(update["locked_elements"], json!({"e1": a_id}));
    }

    send_json(&mut a, json!({"type": "element_select", "element_ids": ["e2"]})).await;
    for ws in [&mut a, &mut b] {
        let update = recv_type(ws, "locked_elements_update").await;
        assert_eq!(update["locked_elements"], json!({"e2": a_id}));
    }
}

#[tokio::test]
async fn test_locked_element_cannot_be_taken() {
    let (addr, _state) = start_test_server().await;
    let (mut a, init_a) = join(addr, None).await;
    let (mut b, init_b) = join(addr, None).await;
    let a_id = init_a["user_id"].clone();
    let b_id = init_b["user_id"].clone();

    send_json(&mut a, json!({"type": "element_select", "element_ids": ["shared"]})).await;
    recv_type(&mut b, "locked_elements_update").await;

    send_json(
        &mut b,
        json!({"type": "element_select", "element_ids": ["shared", "other"]}),
    )
    .await;
    let update = recv_type(&mut b, "locked_elements_update").await;
    assert_eq!(
        update["locked_elements"],
        json!({"shared": a_id, "other": b_id})
    );
}

#[tokio::test]
async fn test_deselect_unlocks_for_everyone() {
    let (addr, _state) = start_test_server().await;
    let (mut a, _) = join(addr, None).await;
    let (mut b, _) = join(addr, None).await;

    send_json(&mut a, json!({"type": "element_select", "element_ids": ["e1"]})).await;
    recv_type(&mut b, "locked_elements_update").await;

    send_json(&mut a, json!({"type": "element_deselect", "element_id": "e1"})).await;
    let update = recv_type(&mut b, "locked_elements_update").await;
    assert_eq!(update["locked_elements"], json!({}));
}

#[tokio::test]
async fn test_disconnect_releases_user_and_locks() {
    let (addr, state) = start_test_server().await;
    let (mut a, init_a) = join(addr, Some("simple-process")).await;
    let (mut b, _) = join(addr, None).await;
    let a_id = init_a["user_id"].as_str().unwrap().to_string();

    send_json(&mut a, json!({"type": "element_select", "element_ids": ["e1"]})).await;
    recv_type(&mut b, "locked_elements_update").await;

    a.close(None).await.unwrap();
    let update = recv_type(&mut b, "users_update").await;
    assert!(update["users"].get(&a_id).is_none());
    wait_for_user_count(&state, 1).await;

    let (_c, init_c) = join(addr, None).await;
    assert!(init_c["users"].get(&a_id).is_none());
    assert!(init_c["locked_elements"].get("e1").is_none());
    assert_eq!(init_c["template"], "simple-process");
}

#[tokio::test]
async fn test_session_resets_after_last_user_leaves() {
    let (addr, state) = start_test_server().await;
    let (mut a, init_a) = join(addr, Some("cross-functional")).await;
    let (mut b, _) = join(addr, None).await;

    b.close(None).await.unwrap();
    wait_for_user_count(&state, 1).await;
    assert!(state.store.is_initialized().await);

    a.close(None).await.unwrap();
    wait_for_user_count(&state, 0).await;

    // reset runs right after the last user is released
    let mut diagram = state.store.diagram().await;
    for _ in 0..50 {
        if !diagram.initialized {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        diagram = state.store.diagram().await;
    }
    assert!(!diagram.initialized);
    assert_eq!(diagram.template, None);
    assert_ne!(
        diagram.session_id.to_string(),
        init_a["session_id"].as_str().unwrap()
    );

    let (_c, init_c) = join(addr, Some("simple-process")).await;
    assert_eq!(init_c["template"], "simple-process");
    assert_eq!(init_c["is_initialized"], true);
    assert_eq!(init_c["session_id"], diagram.session_id.to_string());
}

#[tokio::test]
async fn test_close_disconnects_clients() {
    let (addr, state) = start_test_server().await;
    let (mut a, _) = join(addr, None).await;

    assert_eq!(state.close(), 1);

    // server side closes the socket once the outbound channel is gone
    let mut closed = false;
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_millis(500), a.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => {
                closed = true;
                break;
            }
            Ok(Some(Ok(_))) => continue,
            Err(_) => continue,
        }
    }
    assert!(closed);
    wait_for_user_count(&state, 0).await;
}
