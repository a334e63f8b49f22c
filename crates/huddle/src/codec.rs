// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime wire format.
//!
//! Frames are JSON objects discriminated by `type`:
//! `newMessage` (text), `newImage` (base64 payload), `typing` (transient).
//! Inbound frames are parsed into the closed [`Frame`] type here so nothing
//! downstream ever looks at raw JSON.

use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::model::{Message, MessageBody, ThreadKey};

pub const KIND_TEXT: &str = "newMessage";
pub const KIND_IMAGE: &str = "newImage";
pub const KIND_TYPING: &str = "typing";

const DEFAULT_IMAGE_TYPE: &str = "application/octet-stream";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(Message),
    Image(Message),
    Typing(Typing),
    /// Well-formed frame with a `type` this client does not know.
    Unknown { kind: String },
}

impl Frame {
    /// The persistable message, if this frame carries one.
    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Text(msg) | Self::Image(msg) => Some(msg),
            Self::Typing(_) | Self::Unknown { .. } => None,
        }
    }
}

/// Transient "is typing" indicator. Never stored in a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typing {
    pub sender: String,
    pub target: Option<String>,
    pub group_id: Option<String>,
}

/// Parse one text frame from the realtime transport.
pub fn decode(frame: &str) -> Result<Frame, DecodeError> {
    if frame.trim().is_empty() {
        return Err(DecodeError::Malformed("empty frame".to_owned()));
    }
    let value: Value =
        serde_json::from_str(frame).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    decode_value(&value)
}

/// Parse an already-deserialized frame or history record.
pub fn decode_value(value: &Value) -> Result<Frame, DecodeError> {
    if !value.is_object() {
        return Err(DecodeError::Malformed("frame is not a JSON object".to_owned()));
    }

    let kind = value
        .get("type")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DecodeError::InvalidShape("missing type".to_owned()))?;
    let sender = text_field(value, &["sender_username", "senderUsername"])
        .ok_or_else(|| DecodeError::InvalidShape("missing sender_username".to_owned()))?;

    let target = text_field(value, &["target_username", "targetUsername"]);
    let group_id = text_field(value, &["group_id", "groupId"]);

    match kind {
        KIND_TEXT => {
            let content = value
                .get("content")
                .and_then(|v| v.as_str())
                .ok_or_else(|| DecodeError::InvalidShape("newMessage without content".to_owned()))?
                .to_owned();
            Ok(Frame::Text(Message {
                id: text_field(value, &["id"]),
                client_id: text_field(value, &["client_id"]),
                sender,
                target,
                group_id,
                body: MessageBody::Text { content },
                created_at: text_field(value, &["timestamp", "created_at"]),
            }))
        }
        KIND_IMAGE => {
            let content = value
                .get("content")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| DecodeError::InvalidShape("newImage without content".to_owned()))?;
            let (data, url_type) = split_data_url(content);
            if base64::engine::general_purpose::STANDARD.decode(data).is_err() {
                return Err(DecodeError::InvalidShape("newImage content is not base64".to_owned()));
            }
            let file_type = text_field(value, &["fileType", "file_type"])
                .or(url_type)
                .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_owned());
            Ok(Frame::Image(Message {
                id: text_field(value, &["id"]),
                client_id: text_field(value, &["client_id"]),
                sender,
                target,
                group_id,
                body: MessageBody::Image {
                    data: data.to_owned(),
                    file_type,
                    file_name: text_field(value, &["fileName", "file_name"]),
                },
                created_at: text_field(value, &["timestamp", "created_at"]),
            }))
        }
        KIND_TYPING => Ok(Frame::Typing(Typing { sender, target, group_id })),
        other => Ok(Frame::Unknown { kind: other.to_owned() }),
    }
}

/// Serialize a message as an outbound frame.
pub fn encode(message: &Message) -> Result<String, serde_json::Error> {
    let (kind, content, file_name, file_type) = match &message.body {
        MessageBody::Text { content } => (KIND_TEXT, content.as_str(), None, None),
        MessageBody::Image { data, file_type, file_name } => {
            (KIND_IMAGE, data.as_str(), file_name.as_deref(), Some(file_type.as_str()))
        }
    };
    serde_json::to_string(&WireFrame {
        kind,
        id: message.id.as_deref(),
        client_id: message.client_id.as_deref(),
        sender_username: &message.sender,
        target_username: message.target.as_deref(),
        group_id: message.group_id.as_deref(),
        content: Some(content),
        file_name,
        file_type,
        timestamp: message.created_at.as_deref(),
    })
}

/// Serialize a typing indicator for a thread.
pub fn encode_typing(sender: &str, thread: &ThreadKey) -> Result<String, serde_json::Error> {
    let (target_username, group_id) = match thread {
        ThreadKey::Direct(peer) => (Some(peer.as_str()), None),
        ThreadKey::Group(id) => (None, Some(id.as_str())),
    };
    serde_json::to_string(&WireFrame {
        kind: KIND_TYPING,
        id: None,
        client_id: None,
        sender_username: sender,
        target_username,
        group_id,
        content: None,
        file_name: None,
        file_type: None,
        timestamp: None,
    })
}

#[derive(Serialize)]
struct WireFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    sender_username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
    #[serde(rename = "fileType", skip_serializing_if = "Option::is_none")]
    file_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<&'a str>,
}

/// First non-empty string (or number, stringified) among `names`.
fn text_field(value: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match value.get(*name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Split `data:<mime>;base64,<payload>` into payload and MIME type.
/// Plain base64 passes through untouched.
fn split_data_url(content: &str) -> (&str, Option<String>) {
    let Some(rest) = content.strip_prefix("data:") else {
        return (content, None);
    };
    match rest.split_once(',') {
        Some((header, payload)) => {
            let mime = header.split(';').next().filter(|m| !m.is_empty()).map(str::to_owned);
            (payload, mime)
        }
        None => (content, None),
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
