// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Frame-level failure. The frame is dropped and the session continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Empty frame, invalid JSON, or JSON that is not an object.
    Malformed(String),
    /// Valid JSON missing a field the message kind requires.
    InvalidShape(String),
}

impl DecodeError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "MALFORMED",
            Self::InvalidShape(_) => "INVALID_SHAPE",
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(detail) => write!(f, "malformed frame: {detail}"),
            Self::InvalidShape(detail) => write!(f, "invalid frame shape: {detail}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Returned by [`ConnectionManager::send`](crate::connection::ConnectionManager::send)
/// when no connection is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotConnectedError;

impl fmt::Display for NotConnectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("realtime connection is not open")
    }
}

impl std::error::Error for NotConnectedError {}

/// Connection-level failure. Logged and answered with a reconnect, never returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Connect(String),
    Protocol(String),
}

impl TransportError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect(_) => "CONNECT",
            Self::Protocol(_) => "PROTOCOL",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(detail) => write!(f, "connect failed: {detail}"),
            Self::Protocol(detail) => write!(f, "transport error: {detail}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// REST history fetch failure. Recoverable; the realtime connection is unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryFetchError {
    Network(String),
    Status { status: u16, message: String },
    Decode(String),
    Cancelled,
}

impl HistoryFetchError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK",
            Self::Status { .. } => "STATUS",
            Self::Decode(_) => "DECODE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for HistoryFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(detail) => write!(f, "history fetch failed: {detail}"),
            Self::Status { status, message } => {
                write!(f, "history fetch returned {status}: {message}")
            }
            Self::Decode(detail) => write!(f, "history response unreadable: {detail}"),
            Self::Cancelled => f.write_str("history fetch cancelled"),
        }
    }
}

impl std::error::Error for HistoryFetchError {}

/// Outbound send failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Body was empty after trimming. No network call was made.
    Empty,
    /// Image send attempted while the connection was not open. A reconnect was triggered.
    NotConnected,
    /// The API answered but did not report success.
    Rejected(String),
    Network(String),
    Status { status: u16, message: String },
    /// Reading the image file failed.
    Io(String),
}

impl SendError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Rejected(_) => "REJECTED",
            Self::Network(_) => "NETWORK",
            Self::Status { .. } => "STATUS",
            Self::Io(_) => "IO",
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("message is empty"),
            Self::NotConnected => f.write_str("realtime connection is not open"),
            Self::Rejected(detail) => write!(f, "message rejected: {detail}"),
            Self::Network(detail) => write!(f, "send failed: {detail}"),
            Self::Status { status, message } => write!(f, "send returned {status}: {message}"),
            Self::Io(detail) => write!(f, "reading attachment failed: {detail}"),
        }
    }
}

impl std::error::Error for SendError {}

impl From<NotConnectedError> for SendError {
    fn from(_: NotConnectedError) -> Self {
        Self::NotConnected
    }
}

/// A thread target that is not `dm:<user>`, `direct:<user>`, or `group:<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseThreadKeyError {
    MissingSeparator(String),
    EmptyId(String),
    UnknownKind(String),
}

impl ParseThreadKeyError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSeparator(_) => "MISSING_SEPARATOR",
            Self::EmptyId(_) => "EMPTY_ID",
            Self::UnknownKind(_) => "UNKNOWN_KIND",
        }
    }
}

impl fmt::Display for ParseThreadKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator(input) => {
                write!(f, "expected dm:<user> or group:<id>, got {input}")
            }
            Self::EmptyId(input) => write!(f, "thread id is empty: {input}"),
            Self::UnknownKind(kind) => write!(f, "unknown thread kind: {kind}"),
        }
    }
}

impl std::error::Error for ParseThreadKeyError {}
