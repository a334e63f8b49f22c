// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events a session publishes to its observers.

use serde::Serialize;

use crate::connection::ConnectionState;
use crate::history::HistoryPage;
use crate::model::{Message, ThreadKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The realtime connection changed state.
    Connection { state: ConnectionState },
    /// A new message was appended to a thread.
    Message { thread: ThreadKey, active: bool, message: Message },
    /// The server copy of a local echo replaced it in place.
    Reconciled { thread: ThreadKey, message: Message },
    /// A history page was merged in front of a thread.
    History { thread: ThreadKey, page: HistoryPage },
    /// Someone is typing. Transient; never stored.
    Typing { thread: ThreadKey, user: String },
}

impl SessionEvent {
    /// The thread this event concerns, if any.
    pub fn thread(&self) -> Option<&ThreadKey> {
        match self {
            Self::Connection { .. } => None,
            Self::Message { thread, .. }
            | Self::Reconciled { thread, .. }
            | Self::History { thread, .. }
            | Self::Typing { thread, .. } => Some(thread),
        }
    }
}
