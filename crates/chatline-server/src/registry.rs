//! Session registry: who is logged in, and where to send their lines.
//!
//! One map from identity to outbound queue handle. An identity is active
//! exactly when it has an entry, so the active set and the channel mapping
//! cannot drift apart. Every operation takes the one lock for a short,
//! non-blocking critical section.
//!
//! Enforces at most one live session per identity.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{collections::HashMap, sync::Mutex};

use thiserror::Error;

use crate::outbound::OutboundHandle;

/// Errors from opening a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Identity already has a live session
    #[error("identity already has an active session: {0}")]
    AlreadyActive(String),
}

/// Live authenticated sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, OutboundHandle>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session for `identity`.
    ///
    /// Fails without mutation if the identity already has one.
    pub fn try_open(&self, identity: &str, outbound: OutboundHandle) -> Result<(), SessionError> {
        self.try_open_with(identity, outbound, |_| ())
    }

    /// Like [`try_open`](Self::try_open), running `on_open` before the lock
    /// is released.
    ///
    /// Anything `on_open` queues on the new handle precedes every broadcast
    /// the session can receive. `on_open` must not block or touch the
    /// registry.
    pub fn try_open_with<F>(
        &self,
        identity: &str,
        outbound: OutboundHandle,
        on_open: F,
    ) -> Result<(), SessionError>
    where
        F: FnOnce(&OutboundHandle),
    {
        let mut sessions = self.sessions.lock().expect("Mutex poisoned");
        if sessions.contains_key(identity) {
            return Err(SessionError::AlreadyActive(identity.to_string()));
        }

        on_open(&outbound);
        sessions.insert(identity.to_string(), outbound);
        Ok(())
    }

    /// Forget the session for `identity`.
    ///
    /// Idempotent: returns `None` if there was no session.
    pub fn close(&self, identity: &str) -> Option<OutboundHandle> {
        self.sessions.lock().expect("Mutex poisoned").remove(identity)
    }

    /// Outbound queue for `identity`. `None` if not logged in.
    pub fn lookup(&self, identity: &str) -> Option<OutboundHandle> {
        self.sessions.lock().expect("Mutex poisoned").get(identity).cloned()
    }

    /// Snapshot of every open session's queue.
    ///
    /// Sessions opened or closed after the snapshot are not reflected.
    /// Closed sessions' queues are never reused, so a stale handle can only
    /// drop lines, not misdeliver them.
    pub fn broadcast_targets(&self) -> Vec<OutboundHandle> {
        self.sessions.lock().expect("Mutex poisoned").values().cloned().collect()
    }

    /// Whether `identity` has a live session.
    pub fn is_active(&self, identity: &str) -> bool {
        self.sessions.lock().expect("Mutex poisoned").contains_key(identity)
    }

    /// Logged-in identities, sorted.
    pub fn identities(&self) -> Vec<String> {
        let mut identities: Vec<String> =
            self.sessions.lock().expect("Mutex poisoned").keys().cloned().collect();
        identities.sort();
        identities
    }

    /// Total number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("Mutex poisoned").len()
    }
}
