// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-thread ordered message logs and the routing of inbound messages into them.
//!
//! Live messages are appended in arrival order, history pages are prepended.
//! A server id appears at most once per thread; that is the only mechanism
//! keeping the live and REST paths from showing a message twice.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::{Message, ThreadKey};

/// Ordered message log for one peer or group.
#[derive(Debug, Clone)]
pub struct Thread {
    key: ThreadKey,
    messages: Vec<Message>,
    ids: HashSet<String>,
    /// History records fetched so far, used as the next page offset.
    history_fetched: usize,
}

impl Thread {
    fn new(key: ThreadKey) -> Self {
        Self { key, messages: Vec::new(), ids: HashSet::new(), history_fetched: 0 }
    }

    pub fn key(&self) -> &ThreadKey {
        &self.key
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn history_fetched(&self) -> usize {
        self.history_fetched
    }

    fn append(&mut self, msg: Message) -> bool {
        if let Some(ref id) = msg.id {
            if !self.ids.insert(id.clone()) {
                return false;
            }
        }
        self.messages.push(msg);
        true
    }

    /// Resolve a pending local echo sharing `msg`'s `client_id`.
    ///
    /// The echo adopts the server copy in place, unless that server id is
    /// already in the log (history landed first), in which case the echo is
    /// dropped so the id stays unique.
    fn reconcile(&mut self, msg: &Message) -> Option<EchoOutcome> {
        let client_id = msg.client_id.as_deref()?;
        let pos = self
            .messages
            .iter()
            .position(|m| m.id.is_none() && m.client_id.as_deref() == Some(client_id))?;
        if let Some(ref id) = msg.id {
            if !self.ids.insert(id.clone()) {
                self.messages.remove(pos);
                return Some(EchoOutcome::Superseded);
            }
        }
        self.messages[pos] = msg.clone();
        Some(EchoOutcome::Replaced)
    }

    fn prepend(&mut self, page: Vec<Message>, records: usize) -> usize {
        self.history_fetched += records;
        let mut fresh = Vec::with_capacity(page.len());
        for msg in page {
            if let Some(ref id) = msg.id {
                if !self.ids.insert(id.clone()) {
                    continue;
                }
            }
            fresh.push(msg);
        }
        let inserted = fresh.len();
        self.messages.splice(0..0, fresh);
        inserted
    }
}

enum EchoOutcome {
    Replaced,
    Superseded,
}

/// Outcome of routing one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ThreadMutation {
    /// Appended at the end of the thread's log.
    Appended { thread: ThreadKey, active: bool },
    /// Replaced a local echo in place.
    Reconciled { thread: ThreadKey, active: bool },
    /// Already present by id; log unchanged.
    Duplicate { thread: ThreadKey },
    /// Outbound message with no recipient; nowhere to put it.
    Unroutable,
}

/// All threads of one session, keyed by peer or group.
#[derive(Debug)]
pub struct ThreadStore {
    viewer: String,
    active: Option<ThreadKey>,
    threads: HashMap<ThreadKey, Thread>,
}

impl ThreadStore {
    pub fn new(viewer: impl Into<String>) -> Self {
        Self { viewer: viewer.into(), active: None, threads: HashMap::new() }
    }

    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    pub fn active(&self) -> Option<&ThreadKey> {
        self.active.as_ref()
    }

    /// Mark `key` as the thread on screen, creating it if needed.
    pub fn select(&mut self, key: ThreadKey) -> &Thread {
        self.active = Some(key.clone());
        self.threads.entry(key.clone()).or_insert_with(|| Thread::new(key))
    }

    pub fn thread(&self, key: &ThreadKey) -> Option<&Thread> {
        self.threads.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ThreadKey> {
        self.threads.keys()
    }

    /// Decide which thread a message belongs to.
    ///
    /// An explicit `group_id` wins. Otherwise a target naming a known group
    /// thread is a group message (group REST echoes carry the group id as
    /// `target_username`). Anything else is direct: keyed by the sender, or by
    /// the target when the viewer sent it.
    pub fn thread_key_for(&self, msg: &Message) -> Option<ThreadKey> {
        if let Some(ref group) = msg.group_id {
            return Some(ThreadKey::Group(group.clone()));
        }
        if let Some(ref target) = msg.target {
            let as_group = ThreadKey::Group(target.clone());
            if self.threads.contains_key(&as_group) {
                return Some(as_group);
            }
        }
        if msg.sender == self.viewer {
            msg.target.clone().map(ThreadKey::Direct)
        } else {
            Some(ThreadKey::Direct(msg.sender.clone()))
        }
    }

    /// Route a live message into its thread.
    pub fn route(&mut self, msg: Message) -> ThreadMutation {
        let Some(key) = self.thread_key_for(&msg) else {
            return ThreadMutation::Unroutable;
        };
        let active = self.active.as_ref() == Some(&key);
        let thread = self.threads.entry(key.clone()).or_insert_with(|| Thread::new(key.clone()));

        match thread.reconcile(&msg) {
            Some(EchoOutcome::Replaced) => ThreadMutation::Reconciled { thread: key, active },
            Some(EchoOutcome::Superseded) => ThreadMutation::Duplicate { thread: key },
            None => {
                if thread.append(msg) {
                    ThreadMutation::Appended { thread: key, active }
                } else {
                    ThreadMutation::Duplicate { thread: key }
                }
            }
        }
    }

    /// Insert an optimistic local echo for an outbound message.
    pub fn push_local(&mut self, key: &ThreadKey, msg: Message) {
        let thread = self.threads.entry(key.clone()).or_insert_with(|| Thread::new(key.clone()));
        thread.append(msg);
    }

    /// Put an older history page in front of everything already in the thread.
    ///
    /// `records` is the raw page size from the server, which may exceed
    /// `page.len()` when records were undecodable; it advances the next offset.
    /// Returns how many messages were new.
    pub fn prepend_history(
        &mut self,
        key: &ThreadKey,
        page: Vec<Message>,
        records: usize,
    ) -> usize {
        let thread = self.threads.entry(key.clone()).or_insert_with(|| Thread::new(key.clone()));
        thread.prepend(page, records)
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
