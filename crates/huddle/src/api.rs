// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the chat REST API: posting text messages and paging history.

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::{json, Value};

use crate::error::{HistoryFetchError, SendError};
use crate::model::ThreadKey;

/// HTTP client wrapper for the chat backend.
pub struct ChatApi {
    base_url: String,
    auth_token: Option<String>,
    client: Client,
}

impl ChatApi {
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Self {
        crate::ensure_crypto();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), auth_token, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Create a text message. The server stores it and broadcasts it back over
    /// the realtime transport, so nothing is returned here.
    pub async fn post_message(
        &self,
        sender: &str,
        thread: &ThreadKey,
        content: &str,
    ) -> Result<(), SendError> {
        let (path, body) = match thread {
            ThreadKey::Direct(peer) => (
                "/message",
                json!({ "sender_username": sender, "target_username": peer, "content": content }),
            ),
            ThreadKey::Group(group) => {
                ("/messagegroup", json!({ "target_username": group, "content": content }))
            }
        };

        let req = self.client.post(self.url(path)).json(&body);
        let resp =
            self.apply_auth(req).send().await.map_err(|e| SendError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(SendError::Status { status, message: error_message(resp).await });
        }

        let value: Value = resp.json().await.unwrap_or(Value::Null);
        match value.get("status").and_then(|s| s.as_str()) {
            Some("success") => Ok(()),
            _ => Err(SendError::Rejected(value.to_string())),
        }
    }

    /// Fetch one page of raw history records for a thread.
    pub async fn fetch_history(
        &self,
        thread: &ThreadKey,
        offset: usize,
    ) -> Result<Vec<Value>, HistoryFetchError> {
        let path = if thread.is_group() { "/messagegroup" } else { "/message" };
        let offset = offset.to_string();
        let req = self
            .client
            .get(self.url(path))
            .query(&[("user", thread.id()), ("offset", offset.as_str())]);
        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| HistoryFetchError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(HistoryFetchError::Status { status, message: error_message(resp).await });
        }

        let value: Value =
            resp.json().await.map_err(|e| HistoryFetchError::Decode(e.to_string()))?;
        match value {
            Value::Array(records) => Ok(records),
            // An empty conversation comes back as `null`.
            Value::Null => Ok(Vec::new()),
            other => Err(HistoryFetchError::Decode(format!("expected an array, got {other}"))),
        }
    }
}

/// Best-effort human-readable error from a failed response.
///
/// Accepts `{"error":{"message":..}}`, `{"error":".."}`, `{"message":".."}`, or plain text.
async fn error_message(resp: Response) -> String {
    let text = resp.text().await.unwrap_or_default();
    let Ok(value) = serde_json::from_str::<Value>(&text) else {
        return text.trim().to_owned();
    };
    let error = value.get("error");
    error
        .and_then(|e| e.get("message"))
        .or(error)
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| text.trim().to_owned())
}
