// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Huddle: realtime direct and group messaging client.

pub mod api;
pub mod codec;
pub mod composer;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod history;
pub mod model;
pub mod router;
pub mod run;
pub mod session;

pub use config::ChatConfig;
pub use events::SessionEvent;
pub use model::{Message, MessageBody, ThreadKey};
pub use session::ChatSession;

/// Install the rustls crypto provider (ring) once per process.
///
/// reqwest is built without a bundled provider, so this must run before any
/// HTTPS client is created.
pub fn ensure_crypto() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
