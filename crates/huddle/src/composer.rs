// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound messages.
//!
//! Text goes through REST and shows up in the thread when the server
//! broadcasts it back. Images go straight over the realtime connection with a
//! local echo that the server copy later replaces.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::api::ChatApi;
use crate::codec;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::SendError;
use crate::events::SessionEvent;
use crate::model::{Message, MessageBody, ThreadKey};
use crate::router::ThreadStore;

/// Raw image ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub file_type: String,
}

impl ImageUpload {
    /// Read an image file fully, taking the MIME type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self, SendError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SendError::Io(format!("{}: {e}", path.display())))?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(Self { bytes, file_name, file_type: mime_for_path(path).to_owned() })
    }
}

/// MIME type for common image extensions.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

pub struct Composer {
    identity: String,
    api: Arc<ChatApi>,
    connection: ConnectionManager,
    threads: Arc<RwLock<ThreadStore>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Composer {
    pub fn new(
        identity: impl Into<String>,
        api: Arc<ChatApi>,
        connection: ConnectionManager,
        threads: Arc<RwLock<ThreadStore>>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { identity: identity.into(), api, connection, threads, event_tx }
    }

    /// Post a text message. Whitespace-only bodies are rejected before any request.
    pub async fn send_text(&self, key: &ThreadKey, body: &str) -> Result<(), SendError> {
        if body.trim().is_empty() {
            return Err(SendError::Empty);
        }
        self.api.post_message(&self.identity, key, body).await.map_err(|e| {
            warn!(thread = %key, err = %e, "text send failed");
            e
        })?;
        debug!(thread = %key, "text message posted");
        Ok(())
    }

    /// Send an image frame, insert its local echo and publish it.
    ///
    /// Without an open connection nothing is sent: a reconnect is started and
    /// [`SendError::NotConnected`] returned. Images are never queued.
    pub async fn send_image(
        &self,
        key: &ThreadKey,
        upload: ImageUpload,
    ) -> Result<Message, SendError> {
        if self.connection.state() != ConnectionState::Open {
            self.connection.reopen();
            let state = self.connection.state();
            warn!(thread = %key, ?state, "image dropped, connection not open");
            return Err(SendError::NotConnected);
        }

        let (target, group_id) = match key {
            ThreadKey::Direct(peer) => (Some(peer.clone()), None),
            ThreadKey::Group(id) => (None, Some(id.clone())),
        };
        let message = Message {
            id: None,
            client_id: Some(uuid::Uuid::new_v4().to_string()),
            sender: self.identity.clone(),
            target,
            group_id,
            body: MessageBody::Image {
                data: base64::engine::general_purpose::STANDARD.encode(&upload.bytes),
                file_type: upload.file_type,
                file_name: upload.file_name,
            },
            created_at: None,
        };
        let frame = codec::encode(&message).map_err(|e| SendError::Rejected(e.to_string()))?;

        // Hold the store across the send and the publish so the server echo
        // is neither routed nor announced before the local copy.
        let mut threads = self.threads.write().await;
        if let Err(e) = self.connection.send(frame) {
            warn!(thread = %key, err = %e, "image dropped");
            return Err(e.into());
        }
        threads.push_local(key, message.clone());
        let active = threads.active() == Some(key);
        let _ = self.event_tx.send(SessionEvent::Message {
            thread: key.clone(),
            active,
            message: message.clone(),
        });
        drop(threads);

        debug!(thread = %key, bytes = upload.bytes.len(), "image sent");
        Ok(message)
    }

    /// Tell the other side of the thread that the viewer is typing.
    pub fn send_typing(&self, key: &ThreadKey) -> Result<(), SendError> {
        let frame = codec::encode_typing(&self.identity, key)
            .map_err(|e| SendError::Rejected(e.to_string()))?;
        self.connection.send(frame)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "composer_tests.rs"]
mod tests;
