// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A messaging session: one connection, one identity, every thread.
//!
//! The session owns the [`ConnectionManager`] and the [`ThreadStore`] and
//! wires them to the history loader and the composer. Inbound frames are
//! decoded and routed one at a time, in arrival order, by a single task.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::codec::{self, Frame};
use crate::composer::{Composer, ImageUpload};
use crate::config::ChatConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState, ReconnectPolicy};
use crate::error::{HistoryFetchError, SendError};
use crate::events::SessionEvent;
use crate::history::{HistoryLoader, HistoryPage};
use crate::model::{Message, ThreadKey};
use crate::router::{ThreadMutation, ThreadStore};

pub struct ChatSession {
    config: ChatConfig,
    connection: ConnectionManager,
    threads: Arc<RwLock<ThreadStore>>,
    history: HistoryLoader,
    composer: Composer,
    event_tx: broadcast::Sender<SessionEvent>,
    shutdown: CancellationToken,
}

impl ChatSession {
    /// Build an idle session. Must be called inside a Tokio runtime.
    pub fn new(config: ChatConfig) -> Self {
        let shutdown = CancellationToken::new();
        let api = Arc::new(ChatApi::new(
            &config.api_url,
            config.token.clone(),
            config.request_timeout(),
        ));
        let policy = ReconnectPolicy {
            delay: config.reconnect_delay(),
            max_attempts: config.max_reconnect_attempts,
        };
        let (connection, conn_rx) =
            ConnectionManager::new(config.ws_endpoint(), policy, shutdown.clone());
        let threads = Arc::new(RwLock::new(ThreadStore::new(config.username.clone())));
        let (event_tx, _) = broadcast::channel(256);

        tokio::spawn(pump(conn_rx, Arc::clone(&threads), event_tx.clone(), shutdown.clone()));

        Self {
            history: HistoryLoader::new(Arc::clone(&api), Arc::clone(&threads)),
            composer: Composer::new(
                config.username.clone(),
                api,
                connection.clone(),
                Arc::clone(&threads),
                event_tx.clone(),
            ),
            config,
            connection,
            threads,
            event_tx,
            shutdown,
        }
    }

    pub fn identity(&self) -> &str {
        &self.config.username
    }

    /// Connect using the configured token. No-op while a connection is live.
    pub fn open(&self) {
        let credential = self.config.token.clone().unwrap_or_default();
        self.connection.open(&credential);
    }

    /// Close the connection. No automatic reconnect follows.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    pub async fn active_thread(&self) -> Option<ThreadKey> {
        self.threads.read().await.active().cloned()
    }

    /// Snapshot of a thread's messages in stored order.
    pub async fn messages(&self, key: &ThreadKey) -> Vec<Message> {
        self.threads.read().await.thread(key).map(|t| t.messages().to_vec()).unwrap_or_default()
    }

    /// Make `key` the active thread and load its newest history page if
    /// nothing has been fetched for it yet.
    pub async fn select_thread(
        &self,
        key: &ThreadKey,
    ) -> Result<Option<HistoryPage>, HistoryFetchError> {
        let fetched = self.threads.write().await.select(key.clone()).history_fetched();
        info!(thread = %key, "thread selected");
        if fetched > 0 {
            return Ok(None);
        }
        self.load_history(key, 0, &self.shutdown).await.map(Some)
    }

    /// Load the history page at `offset` and prepend it to the thread.
    pub async fn load_history(
        &self,
        key: &ThreadKey,
        offset: usize,
        cancel: &CancellationToken,
    ) -> Result<HistoryPage, HistoryFetchError> {
        let page = self.history.load_history(key, offset, cancel).await?;
        let _ = self.event_tx.send(SessionEvent::History { thread: key.clone(), page });
        Ok(page)
    }

    /// Load the page just older than what the thread already holds.
    pub async fn load_older(&self, key: &ThreadKey) -> Result<HistoryPage, HistoryFetchError> {
        let page = self.history.load_older(key, &self.shutdown).await?;
        let _ = self.event_tx.send(SessionEvent::History { thread: key.clone(), page });
        Ok(page)
    }

    pub async fn send_text(&self, key: &ThreadKey, body: &str) -> Result<(), SendError> {
        self.composer.send_text(key, body).await
    }

    /// Send an image over the realtime connection. Fails fast when not open.
    pub async fn send_image(
        &self,
        key: &ThreadKey,
        upload: ImageUpload,
    ) -> Result<Message, SendError> {
        self.composer.send_image(key, upload).await
    }

    pub async fn send_image_file(
        &self,
        key: &ThreadKey,
        path: &Path,
    ) -> Result<Message, SendError> {
        let upload = ImageUpload::from_path(path).await?;
        self.send_image(key, upload).await
    }

    pub fn send_typing(&self, key: &ThreadKey) -> Result<(), SendError> {
        self.composer.send_typing(key)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Consume connection events in order until the session goes away.
async fn pump(
    mut conn_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    threads: Arc<RwLock<ThreadStore>>,
    event_tx: broadcast::Sender<SessionEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = conn_rx.recv() => event,
        };
        match event {
            Some(ConnectionEvent::State(state)) => {
                let _ = event_tx.send(SessionEvent::Connection { state });
            }
            Some(ConnectionEvent::Frame(text)) => {
                // Publish under the store lock so events follow mutation order.
                let mut store = threads.write().await;
                if let Some(event) = apply_frame(&mut store, &text) {
                    let _ = event_tx.send(event);
                }
            }
            None => break,
        }
    }
    debug!("session pump stopped");
}

/// Decode one inbound frame and apply it to the store.
///
/// Frames that fail to decode or carry an unknown kind never reach the router.
fn apply_frame(store: &mut ThreadStore, text: &str) -> Option<SessionEvent> {
    let frame = match codec::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(code = e.as_str(), err = %e, "dropping inbound frame");
            return None;
        }
    };

    let message = match frame {
        Frame::Text(msg) | Frame::Image(msg) => msg,
        Frame::Typing(typing) => {
            if typing.sender == store.viewer() {
                return None;
            }
            let thread = match typing.group_id {
                Some(group) => ThreadKey::Group(group),
                None => ThreadKey::Direct(typing.sender.clone()),
            };
            return Some(SessionEvent::Typing { thread, user: typing.sender });
        }
        Frame::Unknown { kind } => {
            warn!(kind, "dropping frame of unknown kind");
            return None;
        }
    };

    match store.route(message.clone()) {
        ThreadMutation::Appended { thread, active } => {
            Some(SessionEvent::Message { thread, active, message })
        }
        ThreadMutation::Reconciled { thread, .. } => {
            Some(SessionEvent::Reconciled { thread, message })
        }
        ThreadMutation::Duplicate { thread } => {
            debug!(thread = %thread, id = ?message.id, "duplicate delivery ignored");
            None
        }
        ThreadMutation::Unroutable => {
            warn!(sender = %message.sender, "message has no recipient, dropped");
            None
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
