// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process chat backend for integration tests: a websocket relay plus the
//! message REST endpoints, served by axum on a loopback port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use huddle::config::ChatConfig;
use huddle::events::SessionEvent;

pub const TOKEN: &str = "test-token";
pub const VIEWER: &str = "me";
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub struct MockState {
    /// Accepted websocket connections, counted once each is subscribed to the relay.
    connections: AtomicUsize,
    /// Frames clients sent over the websocket.
    frames: Mutex<Vec<Value>>,
    /// REST message posts as `(path, body)`.
    posts: Mutex<Vec<(String, Value)>>,
    /// History pages keyed by `(user, offset)`.
    history: Mutex<HashMap<(String, usize), Value>>,
    history_failure: Mutex<Option<u16>>,
    relay: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
    next_id: AtomicU64,
}

impl MockState {
    fn next_id(&self) -> String {
        format!("srv-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> anyhow::Result<Self> {
        let (relay, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(4);
        let state = Arc::new(MockState {
            connections: AtomicUsize::new(0),
            frames: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            history: Mutex::new(HashMap::new()),
            history_failure: Mutex::new(None),
            relay,
            kick,
            next_id: AtomicU64::new(0),
        });

        let router = Router::new()
            .route("/ws", get(ws_handler))
            .route("/message", get(get_history).post(post_message))
            .route("/messagegroup", get(get_history).post(post_message))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, state, _handle: handle })
    }

    pub fn api_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Session config pointed at this server with a short reconnect delay.
    pub fn config(&self) -> ChatConfig {
        let mut config = ChatConfig::new(self.api_url(), VIEWER);
        config.token = Some(TOKEN.to_owned());
        config.reconnect_delay_ms = 50;
        config.max_reconnect_attempts = 5;
        config.request_timeout_ms = 2000;
        config
    }

    /// Deliver a raw frame to every connected client.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.state.relay.send(frame.into());
    }

    /// Drop every websocket without a close handshake.
    pub fn kick_all(&self) {
        let _ = self.state.kick.send(());
    }

    pub fn set_history(&self, user: &str, offset: usize, page: Value) {
        self.state.history.lock().insert((user.to_owned(), offset), page);
    }

    pub fn fail_history(&self, status: u16) {
        *self.state.history_failure.lock() = Some(status);
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::Relaxed)
    }

    pub fn frames(&self) -> Vec<Value> {
        self.state.frames.lock().clone()
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.state.posts.lock().clone()
    }

    /// Wait until at least `n` websocket clients have been accepted.
    pub async fn wait_connections(&self, n: usize) -> anyhow::Result<()> {
        tokio::time::timeout(TIMEOUT, async {
            while self.connections() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| {
            anyhow::anyhow!("timed out waiting for {n} connections, have {}", self.connections())
        })
    }

    /// Wait until clients have sent at least `n` websocket frames.
    pub async fn wait_frames(&self, n: usize) -> anyhow::Result<Vec<Value>> {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                let frames = self.frames();
                if frames.len() >= n {
                    return frames;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for {n} client frames"))
    }
}

/// Receive session events until one matches `pred`.
pub async fn wait_for<F>(
    rx: &mut broadcast::Receiver<SessionEvent>,
    mut pred: F,
) -> anyhow::Result<SessionEvent>
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    anyhow::bail!("session event stream closed")
                }
            }
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for session event"))?
}

/// Matches a message or reconciliation event carrying server id `id`.
pub fn carries_id(event: &SessionEvent, id: &str) -> bool {
    match event {
        SessionEvent::Message { message, .. } | SessionEvent::Reconciled { message, .. } => {
            message.id.as_deref() == Some(id)
        }
        _ => false,
    }
}

// -- handlers -----------------------------------------------------------------

async fn ws_handler(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if query.get("token").map(String::as_str) != Some(TOKEN) {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(state, socket)).into_response()
}

async fn handle_socket(state: Arc<MockState>, socket: WebSocket) {
    let mut relay_rx = state.relay.subscribe();
    let mut kick_rx = state.kick.subscribe();
    state.connections.fetch_add(1, Ordering::Relaxed);

    let (mut tx, mut rx) = socket.split();
    loop {
        tokio::select! {
            _ = kick_rx.recv() => return,
            frame = relay_rx.recv() => {
                let Ok(frame) = frame else { continue };
                if tx.send(WsMessage::Text(frame.into())).await.is_err() {
                    return;
                }
            }
            msg = rx.next() => {
                let text = match msg {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => return,
                };
                let Ok(mut value) = serde_json::from_str::<Value>(text.as_str()) else { continue };
                state.frames.lock().push(value.clone());
                // Relay with a server id, as the backend does once it stores the frame.
                if let Some(obj) = value.as_object_mut() {
                    if obj.get("type").and_then(|t| t.as_str()) != Some("typing") {
                        obj.entry("id").or_insert_with(|| Value::String(state.next_id()));
                    }
                }
                let _ = state.relay.send(value.to_string());
            }
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn post_message(
    State(state): State<Arc<MockState>>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
    }
    let content = body.get("content").and_then(|v| v.as_str()).unwrap_or_default();
    let target = body.get("target_username").and_then(|v| v.as_str()).unwrap_or_default();
    if content.is_empty() || target.is_empty() {
        return (StatusCode::BAD_REQUEST, "Message content or target username is missing")
            .into_response();
    }
    state.posts.lock().push((uri.path().to_owned(), body.clone()));

    let echo = json!({
        "type": "newMessage",
        "id": state.next_id(),
        "sender_username": VIEWER,
        "target_username": target,
        "content": content,
        "timestamp": "2025-05-01T10:00:00Z",
    });
    let _ = state.relay.send(echo.to_string());
    Json(json!({ "status": "success", "message": "Message sent" })).into_response()
}

async fn get_history(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
    }
    if let Some(status) = *state.history_failure.lock() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({ "error": "history unavailable" }))).into_response();
    }
    let user = query.get("user").cloned().unwrap_or_default();
    let offset = query.get("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
    let page = state.history.lock().get(&(user, offset)).cloned().unwrap_or_else(|| json!([]));
    Json(page).into_response()
}
