use std::{
    collections::HashSet,
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

use argus_core::VerifiedIdentity;
use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Frames queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(Utf8Bytes),
    /// Transport-level liveness ping.
    Ping,
    Close { code: u16, reason: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryFailed {
    #[error("connection is closed")]
    Closed,
    #[error("outbound buffer is full")]
    Backpressure,
}

pub struct Connection {
    session_id: String,
    identity: VerifiedIdentity,
    created_at: DateTime<Utc>,
    /// Cleared by each heartbeat ping, set again by an inbound pong.
    alive: AtomicBool,
    open: AtomicBool,
    sender: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
    subscriptions: Mutex<HashSet<String>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("subject_id", &self.identity.subject_id())
            .field("created_at", &self.created_at)
            .field("alive", &self.is_alive())
            .field("open", &self.is_open())
            .field("channel_closed", &self.sender.is_closed())
            .finish()
    }
}

impl Connection {
    pub fn new(
        session_id: String,
        identity: VerifiedIdentity,
        sender: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            session_id,
            identity,
            created_at: Utc::now(),
            alive: AtomicBool::new(true),
            open: AtomicBool::new(true),
            sender,
            cancel: CancellationToken::new(),
            subscriptions: Mutex::new(HashSet::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subject_id(&self) -> &str {
        self.identity.subject_id()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Queue a frame without waiting. A full buffer counts as a failure so a
    /// slow client never stalls the sender.
    pub fn deliver(&self, frame: Outbound) -> Result<(), DeliveryFailed> {
        if !self.is_open() {
            return Err(DeliveryFailed::Closed);
        }
        self.push(frame)
    }

    fn push(&self, frame: Outbound) -> Result<(), DeliveryFailed> {
        self.sender.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryFailed::Backpressure,
            TrySendError::Closed(_) => DeliveryFailed::Closed,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Clear the liveness flag ahead of a ping, returning whether the
    /// connection answered the previous one.
    pub fn begin_ping(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Stop accepting frames. Returns `true` only for the first caller.
    pub(crate) fn mark_closed(&self) -> bool {
        self.open.swap(false, Ordering::AcqRel)
    }

    /// Send a close frame after anything already queued, then shut down.
    pub fn close(&self, code: u16, reason: &'static str) {
        self.mark_closed();
        if self.push(Outbound::Close { code, reason }).is_err() {
            self.cancel.cancel();
        }
    }

    /// Drop the transport without a close handshake.
    pub fn terminate(&self) {
        self.mark_closed();
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Record an advisory subscription. Delivery is never filtered by it.
    pub fn subscribe(&self, camera_id: &str) -> bool {
        self.subscriptions.lock().insert(camera_id.to_string())
    }

    pub fn subscriptions(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.subscriptions.lock().iter().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(buffer: usize) -> (Connection, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(buffer);
        let conn = Connection::new(
            "u1_1_0".into(),
            VerifiedIdentity::new("u1", Some("operator".into())),
            tx,
        );
        (conn, rx)
    }

    #[test]
    fn full_buffer_is_backpressure() {
        let (conn, _rx) = connection(1);
        assert_eq!(conn.deliver(Outbound::Ping), Ok(()));
        assert_eq!(conn.deliver(Outbound::Ping), Err(DeliveryFailed::Backpressure));
    }

    #[test]
    fn dropped_receiver_is_closed() {
        let (conn, rx) = connection(4);
        drop(rx);
        assert_eq!(conn.deliver(Outbound::Ping), Err(DeliveryFailed::Closed));
    }

    #[test]
    fn ping_clears_liveness_until_pong() {
        let (conn, _rx) = connection(4);
        assert!(conn.begin_ping());
        assert!(!conn.is_alive());
        assert!(!conn.begin_ping());

        conn.mark_alive();
        assert!(conn.begin_ping());
    }

    #[test]
    fn close_queues_frame_and_refuses_further_delivery() {
        let (conn, mut rx) = connection(4);
        conn.deliver(Outbound::Text("first".into())).unwrap();
        conn.close(1001, "server shutting down");

        assert_eq!(conn.deliver(Outbound::Ping), Err(DeliveryFailed::Closed));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Text("first".into()));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Close {
                code: 1001,
                reason: "server shutting down"
            }
        );
        assert!(!conn.cancellation().is_cancelled());
    }

    #[test]
    fn terminate_cancels_transport() {
        let (conn, _rx) = connection(4);
        conn.terminate();
        assert!(!conn.is_open());
        assert!(conn.cancellation().is_cancelled());
    }

    #[test]
    fn subscriptions_are_deduplicated() {
        let (conn, _rx) = connection(4);
        assert!(conn.subscribe("cam2"));
        assert!(conn.subscribe("cam1"));
        assert!(!conn.subscribe("cam2"));
        assert_eq!(conn.subscriptions(), vec!["cam1", "cam2"]);
    }
}
