//! Message routing over the session registry.
//!
//! Broadcast fans one line out to a snapshot of every open session; whisper
//! looks up exactly one. Both push with [`OutboundHandle::deliver`], so a
//! stalled recipient is disconnected rather than waited on.

use std::sync::Arc;

use chatline_proto::ServerReply;

use crate::{
    outbound::{Delivery, OutboundHandle},
    registry::SessionRegistry,
};

/// Result of a whisper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperOutcome {
    /// Queued for the target
    Delivered,
    /// Target has no open session, or its queue could not take the line
    TargetMissing,
}

/// Routes chat lines between sessions.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
}

impl MessageRouter {
    /// Router over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `reply` to every open session, including the sender's own.
    ///
    /// Returns how many sessions accepted the line.
    pub fn broadcast(&self, reply: &ServerReply) -> usize {
        let line = reply.to_string();
        let targets = self.registry.broadcast_targets();

        targets.iter().filter(|target| deliver_logged(target, line.clone())).count()
    }

    /// Send `text` from `sender` to `target` only.
    ///
    /// The sender's local echo is the caller's job.
    pub fn whisper(&self, sender: &str, target: &str, text: &str) -> WhisperOutcome {
        let Some(handle) = self.registry.lookup(target) else {
            return WhisperOutcome::TargetMissing;
        };

        if deliver_logged(&handle, ServerReply::whisper_from(sender, text).to_string()) {
            WhisperOutcome::Delivered
        } else {
            WhisperOutcome::TargetMissing
        }
    }
}

fn deliver_logged(target: &OutboundHandle, line: String) -> bool {
    match target.deliver(line) {
        Delivery::Delivered => true,
        Delivery::Overflow => {
            tracing::warn!(
                session_id = target.session_id(),
                "outbound queue full, disconnecting slow client"
            );
            false
        },
        Delivery::Closed => {
            tracing::debug!(session_id = target.session_id(), "dropping line for closed session");
            false
        },
    }
}
