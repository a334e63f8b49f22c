// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive terminal client: one thread on screen, stdin for input.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::connection::ConnectionState;
use crate::events::SessionEvent;
use crate::model::{Message, ThreadKey};
use crate::session::ChatSession;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Text(String),
    Image(PathBuf),
    More,
    Typing,
    Quit,
    /// Blank line or unrecognized slash command.
    Ignore,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return if line.trim().is_empty() { Self::Ignore } else { Self::Text(line.to_owned()) };
        };
        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        match (name, arg.trim()) {
            ("image" | "img", "") => Self::Ignore,
            ("image" | "img", path) => Self::Image(PathBuf::from(path)),
            ("more", _) => Self::More,
            ("typing", _) => Self::Typing,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Ignore,
        }
    }
}

/// Render a message as a single terminal line.
pub fn format_line(message: &Message) -> String {
    let pending = if message.id.is_none() { " (sending)" } else { "" };
    match message.created_at {
        Some(ref at) => format!("[{at}] {}: {}{pending}", message.sender, message.preview()),
        None => format!("{}: {}{pending}", message.sender, message.preview()),
    }
}

/// Run the interactive client on `target` until `/quit`, EOF, or Ctrl-C.
pub async fn run(config: ChatConfig, target: ThreadKey) -> anyhow::Result<()> {
    let session = ChatSession::new(config);
    let mut events = session.subscribe();
    session.open();

    match session.select_thread(&target).await {
        Ok(page) => {
            info!(thread = %target, page = ?page, "thread opened");
            for message in session.messages(&target).await {
                println!("{}", format_line(&message));
            }
        }
        Err(e) => {
            warn!(thread = %target, err = %e, "history unavailable, showing live messages only")
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&session, &target, Command::parse(&line)).await {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => render(&target, &event),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.close().await;
    Ok(())
}

/// Returns `false` when the user asked to quit.
async fn handle_command(session: &ChatSession, target: &ThreadKey, command: Command) -> bool {
    match command {
        Command::Text(body) => {
            if let Err(e) = session.send_text(target, &body).await {
                eprintln!("! {e}");
            }
        }
        Command::Image(path) => {
            if let Err(e) = session.send_image_file(target, &path).await {
                eprintln!("! {e}");
            }
        }
        Command::More => match session.load_older(target).await {
            Ok(page) if page.is_exhausted() => eprintln!("! no older messages"),
            Ok(_) => {
                for message in session.messages(target).await {
                    println!("{}", format_line(&message));
                }
            }
            Err(e) => eprintln!("! {e}"),
        },
        Command::Typing => {
            if let Err(e) = session.send_typing(target) {
                eprintln!("! {e}");
            }
        }
        Command::Quit => return false,
        Command::Ignore => {}
    }
    true
}

fn render(target: &ThreadKey, event: &SessionEvent) {
    match event {
        SessionEvent::Connection { state } => match state {
            ConnectionState::Connecting => eprintln!("* connecting..."),
            ConnectionState::Open => eprintln!("* connected"),
            ConnectionState::Reconnecting => eprintln!("* disconnected, retrying..."),
            ConnectionState::Idle => eprintln!("* offline"),
            ConnectionState::Closing | ConnectionState::Closed => {}
        },
        SessionEvent::Message { thread, message, .. } if thread == target => {
            println!("{}", format_line(message));
        }
        SessionEvent::Message { thread, message, .. } => {
            eprintln!("* new message in {thread} from {}", message.sender);
        }
        SessionEvent::Typing { thread, user } if thread == target => {
            eprintln!("* {user} is typing...");
        }
        SessionEvent::Reconciled { .. }
        | SessionEvent::History { .. }
        | SessionEvent::Typing { .. } => {}
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
