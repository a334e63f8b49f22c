// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Configuration for a realtime chat session.
#[derive(Debug, Clone, clap::Args)]
pub struct ChatConfig {
    /// Base URL of the REST API.
    #[arg(long, default_value = "http://127.0.0.1:8079", env = "HUDDLE_API_URL")]
    pub api_url: String,

    /// Realtime endpoint. Derived from the API URL when unset.
    #[arg(long, env = "HUDDLE_WS_URL")]
    pub ws_url: Option<String>,

    /// Bearer token used for REST calls and the realtime handshake.
    #[arg(long, env = "HUDDLE_TOKEN")]
    pub token: Option<String>,

    /// Username of the viewer. Decides which side of a direct thread a message belongs to.
    #[arg(long, env = "HUDDLE_USERNAME")]
    pub username: String,

    /// Fixed delay between reconnection attempts, in milliseconds.
    #[arg(long, default_value_t = 3000, env = "HUDDLE_RECONNECT_DELAY_MS")]
    pub reconnect_delay_ms: u64,

    /// Reconnection attempts after an unexpected close before giving up.
    #[arg(long, default_value_t = 5, env = "HUDDLE_MAX_RECONNECT_ATTEMPTS")]
    pub max_reconnect_attempts: u32,

    /// Timeout for REST requests, in milliseconds.
    #[arg(long, default_value_t = 10000, env = "HUDDLE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,
}

impl ChatConfig {
    /// Config with defaults for everything except the endpoint and identity.
    pub fn new(api_url: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: None,
            token: None,
            username: username.into(),
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: 5,
            request_timeout_ms: 10000,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Realtime endpoint without credentials.
    ///
    /// `http://host:8079` becomes `ws://host:8079/ws`, `https` becomes `wss`.
    pub fn ws_endpoint(&self) -> String {
        if let Some(ref url) = self.ws_url {
            return url.clone();
        }
        let base = self.api_url.trim_end_matches('/');
        let ws_base = if base.starts_with("https://") {
            base.replacen("https://", "wss://", 1)
        } else {
            base.replacen("http://", "ws://", 1)
        };
        format!("{ws_base}/ws")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
