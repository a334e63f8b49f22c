// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message and thread identity types shared by the codec, router, and composer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseThreadKeyError;

/// Identifies one thread: a direct conversation with a peer, or a group chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ThreadKey {
    Direct(String),
    Group(String),
}

impl ThreadKey {
    pub fn direct(peer: impl Into<String>) -> Self {
        Self::Direct(peer.into())
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::Group(id.into())
    }

    /// Peer username or group id.
    pub fn id(&self) -> &str {
        match self {
            Self::Direct(id) | Self::Group(id) => id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(peer) => write!(f, "dm:{peer}"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}

impl FromStr for ThreadKey {
    type Err = ParseThreadKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) =
            s.split_once(':').ok_or_else(|| ParseThreadKeyError::MissingSeparator(s.to_owned()))?;
        if id.is_empty() {
            return Err(ParseThreadKeyError::EmptyId(s.to_owned()));
        }
        match kind {
            "dm" | "direct" => Ok(Self::Direct(id.to_owned())),
            "group" => Ok(Self::Group(id.to_owned())),
            other => Err(ParseThreadKeyError::UnknownKind(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Text {
        content: String,
    },
    /// Base64 payload (no data-URL prefix) with its declared MIME type.
    Image {
        data: String,
        file_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
}

/// One chat message, live or fetched from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id. Absent on local echoes until the server copy arrives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Client-generated correlation id for optimistic echoes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub sender: String,
    /// Direct-message recipient, or the group id on group REST echoes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub body: MessageBody,
    /// Server-assigned ISO-8601 creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self.body {
            MessageBody::Text { .. } => MessageKind::Text,
            MessageBody::Image { .. } => MessageKind::Image,
        }
    }

    /// Short human-readable rendering of the body.
    pub fn preview(&self) -> String {
        match &self.body {
            MessageBody::Text { content } => content.clone(),
            MessageBody::Image { file_type, file_name, data } => {
                let name = file_name.as_deref().unwrap_or("image");
                // base64 expands by 4/3.
                format!("[{name} {file_type}, {} bytes]", data.len() / 4 * 3)
            }
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
