// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime connection lifecycle.
//!
//! One [`ConnectionManager`] owns at most one websocket. State machine:
//!
//! ```text
//! Idle/Closed --open--> Connecting --handshake--> Open
//! Open --error/close--> Reconnecting --delay--> Connecting
//! Reconnecting --attempts exhausted--> Idle
//! any --close--> Closing --> Closed
//! ```
//!
//! Transport failures never reach the caller; they are logged and answered
//! with a reconnect. State changes and inbound text frames are delivered in
//! order on a single event channel.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{NotConnectedError, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closing,
    Closed,
}

impl ConnectionState {
    /// A connection exists or one is on its way; `open()` does nothing here.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Reconnecting)
    }
}

/// Delivered in order on the channel returned by [`ConnectionManager::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    State(ConnectionState),
    Frame(String),
}

/// Fixed-delay reconnection with a bounded number of attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

/// Handle to a session's realtime connection. Clones share the connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: String,
    policy: ReconnectPolicy,
    parent: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    attempts: AtomicU32,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    credential: Option<String>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    /// Writer queue for the open socket. `None` unless `Open`.
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            debug!(state = ?next, "realtime connection state");
            let _ = self.events_tx.send(ConnectionEvent::State(next));
        }
    }
}

impl ConnectionManager {
    /// Create an idle manager. `parent` cancels every connection it ever opens.
    pub fn new(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        parent: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            endpoint: endpoint.into(),
            policy,
            parent,
            state_tx,
            events_tx,
            attempts: AtomicU32::new(0),
            slot: Mutex::new(Slot::default()),
        });
        (Self { inner }, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Reconnection attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::Relaxed)
    }

    /// Start connecting with `credential`. No-op while a connection is live
    /// or a close is still in progress.
    pub fn open(&self, credential: &str) {
        let mut slot = self.inner.slot.lock();
        let state = self.state();
        if state.is_live() || state == ConnectionState::Closing {
            debug!(?state, "open ignored, connection live or closing");
            return;
        }

        let cancel = self.inner.parent.child_token();
        slot.credential = Some(credential.to_owned());
        slot.cancel = Some(cancel.clone());
        self.inner.attempts.store(0, Ordering::Relaxed);
        self.inner.set_state(ConnectionState::Connecting);

        let url = build_ws_url(&self.inner.endpoint, credential);
        slot.task = Some(tokio::spawn(drive(Arc::clone(&self.inner), url, cancel)));
    }

    /// Open again with the last credential passed to [`open`](Self::open).
    /// Returns `false` when no credential was ever supplied.
    pub fn reopen(&self) -> bool {
        let credential = self.inner.slot.lock().credential.clone();
        match credential {
            Some(credential) => {
                self.open(&credential);
                true
            }
            None => {
                warn!("cannot reconnect, no credential on record");
                false
            }
        }
    }

    /// Queue a text frame on the open socket.
    pub fn send(&self, frame: String) -> Result<(), NotConnectedError> {
        let slot = self.inner.slot.lock();
        if self.state() != ConnectionState::Open {
            return Err(NotConnectedError);
        }
        match slot.outbound {
            Some(ref tx) => tx.send(frame).map_err(|_| NotConnectedError),
            None => Err(NotConnectedError),
        }
    }

    /// Tear down the connection and stop reconnecting. The credential is kept
    /// so a later [`reopen`](Self::reopen) can use it.
    pub async fn close(&self) {
        // `Closing` is set under the slot lock so a concurrent `open()` sees it.
        let task = {
            let mut slot = self.inner.slot.lock();
            slot.outbound = None;
            if let Some(cancel) = slot.cancel.take() {
                self.inner.set_state(ConnectionState::Closing);
                cancel.cancel();
            }
            slot.task.take()
        };

        if let Some(task) = task {
            let _ = task.await;
        }
        self.inner.attempts.store(0, Ordering::Relaxed);
        self.inner.set_state(ConnectionState::Closed);
        info!("realtime connection closed");
    }
}

/// Connection driver: connect, pump, and reconnect until cancelled or out of attempts.
async fn drive(inner: Arc<Inner>, url: String, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        inner.set_state(ConnectionState::Connecting);

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((ws_stream, _)) => {
                inner.attempts.store(0, Ordering::Relaxed);
                let (tx, rx) = mpsc::unbounded_channel();
                inner.slot.lock().outbound = Some(tx);
                inner.set_state(ConnectionState::Open);
                info!("realtime connection open");

                let result = pump(&inner, ws_stream, rx, &cancel).await;
                inner.slot.lock().outbound = None;
                if let Err(e) = result {
                    warn!(err = %e, "realtime connection lost");
                }
            }
            Err(e) => {
                let err = TransportError::Connect(e.to_string());
                warn!(err = %err, "realtime connect failed");
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        let attempts = inner.attempts.load(Ordering::Relaxed);
        if attempts >= inner.policy.max_attempts {
            warn!(attempts, "giving up on realtime connection");
            inner.set_state(ConnectionState::Idle);
            break;
        }
        inner.attempts.store(attempts + 1, Ordering::Relaxed);
        inner.set_state(ConnectionState::Reconnecting);
        let delay_ms = inner.policy.delay.as_millis() as u64;
        debug!(attempt = attempts + 1, delay_ms, "reconnecting");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(inner.policy.delay) => {}
        }
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Shuttle frames between the socket and the session until either side ends.
/// `Ok` means the close was requested locally.
async fn pump(
    inner: &Inner,
    ws_stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(WsMessage::Close(None)).await;
                return Ok(());
            }
            Some(text) = outbound.recv() => {
                write
                    .send(WsMessage::Text(text.into()))
                    .await
                    .map_err(|e| TransportError::Protocol(e.to_string()))?;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = inner.events_tx.send(ConnectionEvent::Frame(text.to_string()));
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return Err(TransportError::Protocol("closed by server".to_owned()));
                    }
                    Some(Err(e)) => return Err(TransportError::Protocol(e.to_string())),
                    Some(Ok(_)) => {} // binary, ping, pong
                }
            }
        }
    }
}

/// Append the credential to the endpoint as `?token=`.
fn build_ws_url(endpoint: &str, token: &str) -> String {
    match reqwest::Url::parse(endpoint) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("token", token);
            url.to_string()
        }
        Err(_) => {
            let sep = if endpoint.contains('?') { '&' } else { '?' };
            format!("{endpoint}{sep}token={token}")
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
