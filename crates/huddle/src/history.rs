// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Paginated history: fetch a page over REST and merge it in front of a thread.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ChatApi;
use crate::codec::{self, Frame};
use crate::error::HistoryFetchError;
use crate::model::{Message, ThreadKey};
use crate::router::ThreadStore;

/// Result of merging one history page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    pub offset: usize,
    /// Records the server returned, decodable or not.
    pub fetched: usize,
    /// Messages that were not already in the thread.
    pub inserted: usize,
}

impl HistoryPage {
    /// An empty page means there is nothing older to load.
    pub fn is_exhausted(&self) -> bool {
        self.fetched == 0
    }
}

pub struct HistoryLoader {
    api: Arc<ChatApi>,
    threads: Arc<RwLock<ThreadStore>>,
}

impl HistoryLoader {
    pub fn new(api: Arc<ChatApi>, threads: Arc<RwLock<ThreadStore>>) -> Self {
        Self { api, threads }
    }

    /// Fetch the page at `offset` and prepend it to the thread.
    ///
    /// Offset 0 is the newest page. Cancelling `cancel` before the response
    /// lands leaves the thread untouched.
    pub async fn load_history(
        &self,
        key: &ThreadKey,
        offset: usize,
        cancel: &CancellationToken,
    ) -> Result<HistoryPage, HistoryFetchError> {
        let records = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HistoryFetchError::Cancelled),
            result = self.api.fetch_history(key, offset) => result,
        };
        let records = match records {
            Ok(records) => records,
            Err(e) => {
                warn!(thread = %key, offset, err = %e, "history fetch failed");
                return Err(e);
            }
        };

        let fetched = records.len();
        let page = decode_page(key, &records);
        if cancel.is_cancelled() {
            return Err(HistoryFetchError::Cancelled);
        }

        let inserted = self.threads.write().await.prepend_history(key, page, fetched);
        debug!(thread = %key, offset, fetched, inserted, "history page merged");
        Ok(HistoryPage { offset, fetched, inserted })
    }

    /// Load the page following everything this thread has fetched so far.
    pub async fn load_older(
        &self,
        key: &ThreadKey,
        cancel: &CancellationToken,
    ) -> Result<HistoryPage, HistoryFetchError> {
        let offset = self.threads.read().await.thread(key).map_or(0, |t| t.history_fetched());
        self.load_history(key, offset, cancel).await
    }
}

/// Decode history records, skipping any that are not text or image messages.
fn decode_page(key: &ThreadKey, records: &[Value]) -> Vec<Message> {
    records
        .iter()
        .filter_map(|record| match codec::decode_value(record) {
            Ok(Frame::Text(msg)) | Ok(Frame::Image(msg)) => Some(msg),
            Ok(other) => {
                warn!(thread = %key, frame = ?other, "skipping non-message history record");
                None
            }
            Err(e) => {
                warn!(thread = %key, err = %e, "skipping undecodable history record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
