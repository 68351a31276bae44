//! Per-session outbound line queues.
//!
//! Every connection owns one bounded queue drained by its own writer task.
//! The connection's own replies wait for queue space; lines pushed by other
//! connections (broadcasts, whispers) never wait. When such a push finds the
//! queue full, the line is dropped and the owning connection is told to
//! disconnect: one slow reader cannot stall the room.
//!
//! ```text
//!  handler ──send().await──┐
//!                          ├──> [ bounded mpsc ] ──> writer task ──> socket
//!  router ───try_send()────┘          │
//!                                  full? ──> overflow notify ──> handler exits
//! ```
//!
//! Ordering: one queue per recipient and FIFO delivery mean lines pushed by
//! a single sender arrive in the order they were pushed.

use std::{io, sync::Arc};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt, BufWriter},
    sync::{
        Notify,
        mpsc::{self, Permit, error::TrySendError},
    },
};

use crate::error::ServerError;

/// Outcome of a non-blocking push into another session's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Line queued
    Delivered,
    /// Queue full; line dropped and the session asked to disconnect
    Overflow,
    /// Writer already gone; line dropped
    Closed,
}

/// Sending side of one session's queue.
///
/// Cheap to clone; every clone feeds the same writer task.
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    session_id: u64,
    tx: mpsc::Sender<String>,
    overflow: Arc<Notify>,
}

/// Create a queue holding at most `capacity` lines.
///
/// The receiver goes to [`write_lines`]; the handle to the session's owner
/// and, once authenticated, to the session registry.
pub fn channel(session_id: u64, capacity: usize) -> (OutboundHandle, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(capacity);
    (OutboundHandle { session_id, tx, overflow: Arc::new(Notify::new()) }, rx)
}

impl OutboundHandle {
    /// Connection this queue belongs to.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Push a line without waiting.
    ///
    /// Used for lines that originate from other sessions.
    pub fn deliver(&self, line: String) -> Delivery {
        match self.tx.try_send(line) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => {
                self.overflow.notify_one();
                Delivery::Overflow
            },
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Push a line, waiting for space.
    ///
    /// Only the owning connection calls this, so it only ever waits on its
    /// own peer.
    pub async fn send(&self, line: String) -> Result<(), ServerError> {
        self.tx
            .send(line)
            .await
            .map_err(|_| ServerError::Transport("outbound queue closed".to_string()))
    }

    /// Reserve one slot so a line can be queued later without waiting.
    pub async fn reserve(&self) -> Result<Permit<'_, String>, ServerError> {
        self.tx
            .reserve()
            .await
            .map_err(|_| ServerError::Transport("outbound queue closed".to_string()))
    }

    /// Resolves once a [`deliver`](Self::deliver) call has found the queue
    /// full.
    ///
    /// An overflow that happened before this is awaited is not lost.
    pub async fn overflowed(&self) {
        self.overflow.notified().await;
    }
}

/// Drain `rx` into `writer`, one line per message.
///
/// Output is buffered and flushed whenever the queue runs dry. Returns once
/// every sender is dropped and the queue is empty, after shutting the writer
/// down.
pub async fn write_lines<W>(mut rx: mpsc::Receiver<String>, writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        if rx.is_empty() {
            writer.flush().await?;
        }
    }

    writer.flush().await?;
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, BufReader};

    use super::*;

    #[test]
    fn full_queue_overflows_instead_of_blocking() {
        let (handle, _rx) = channel(1, 2);

        assert_eq!(handle.deliver("one".to_string()), Delivery::Delivered);
        assert_eq!(handle.deliver("two".to_string()), Delivery::Delivered);
        assert_eq!(handle.deliver("three".to_string()), Delivery::Overflow);
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (handle, rx) = channel(1, 4);
        drop(rx);

        assert_eq!(handle.deliver("late".to_string()), Delivery::Closed);
    }

    #[tokio::test]
    async fn overflow_wakes_owner_even_if_signalled_first() {
        let (handle, _rx) = channel(1, 1);

        handle.deliver("fill".to_string());
        handle.deliver("spill".to_string());

        tokio::time::timeout(Duration::from_secs(1), handle.overflowed())
            .await
            .expect("overflow signal should be stored until awaited");
    }

    #[tokio::test]
    async fn writer_emits_lines_in_order_and_finishes() {
        let (client, server) = tokio::io::duplex(1024);
        let (handle, rx) = channel(7, 16);

        let writer = tokio::spawn(write_lines(rx, server));

        handle.send("first".to_string()).await.unwrap();
        handle.deliver("second".to_string());
        handle.send("third".to_string()).await.unwrap();
        drop(handle);

        writer.await.unwrap().unwrap();

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("third"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
