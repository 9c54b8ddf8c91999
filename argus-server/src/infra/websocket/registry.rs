use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use argus_core::{Unauthenticated, VerifiedIdentity};
use axum::extract::ws::close_code;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    connection::{Connection, Outbound},
    messages::OutboundEvent,
};

pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// A newly admitted connection plus the receiving half of its outbound queue,
/// which the caller hands to the transport writer.
#[derive(Debug)]
pub struct Admission {
    pub connection: Arc<Connection>,
    pub outbound: mpsc::Receiver<Outbound>,
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    /// Open connections keyed by session id
    connections: Arc<DashMap<String, Arc<Connection>>>,
    sequence: Arc<AtomicU64>,
    outbound_buffer: usize,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connection_count", &self.connections.len())
            .field("outbound_buffer", &self.outbound_buffer)
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_outbound_buffer(DEFAULT_OUTBOUND_BUFFER)
    }

    pub fn with_outbound_buffer(outbound_buffer: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            sequence: Arc::new(AtomicU64::new(0)),
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    /// Register a verified client and queue its welcome event.
    pub fn admit(&self, identity: VerifiedIdentity) -> Result<Admission, Unauthenticated> {
        if identity.subject_id().trim().is_empty() {
            return Err(Unauthenticated::MissingSubject);
        }

        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let connection = loop {
            let session_id = self.next_session_id(identity.subject_id());
            match self.connections.entry(session_id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(vacant) => {
                    let connection = Arc::new(Connection::new(
                        vacant.key().clone(),
                        identity.clone(),
                        tx.clone(),
                    ));
                    // Welcome is queued before the entry becomes visible to fanout.
                    queue_welcome(&connection);
                    vacant.insert(Arc::clone(&connection));
                    break connection;
                }
            }
        };

        info!(
            session_id = connection.session_id(),
            subject_id = connection.subject_id(),
            connections = self.connections.len(),
            "client connected"
        );

        Ok(Admission {
            connection,
            outbound: rx,
        })
    }

    fn next_session_id(&self, subject_id: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{subject_id}_{}_{seq}", Utc::now().timestamp_millis())
    }

    /// Close and forget a connection. Removing an unknown id is a no-op.
    pub fn remove(&self, session_id: &str) -> Option<Arc<Connection>> {
        if let Some(connection) = self.get(session_id) {
            connection.mark_closed();
        }

        let (_, connection) = self.connections.remove(session_id)?;
        connection.terminate();
        debug!(
            session_id,
            connections = self.connections.len(),
            "client removed"
        );
        Some(connection)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Connection>> {
        self.connections
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Open connections at the time of the call.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_open())
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(&Arc<Connection>)) {
        for connection in self.snapshot() {
            f(&connection);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send every client a going-away close frame and empty the registry.
    pub fn shutdown(&self) {
        let connections: Vec<_> = self
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.connections.clear();

        for connection in &connections {
            connection.close(close_code::AWAY, "server shutting down");
        }
        info!(closed = connections.len(), "connection registry shut down");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn queue_welcome(connection: &Connection) {
    match OutboundEvent::connected(connection.session_id()).to_frame() {
        Ok(frame) => {
            if let Err(err) = connection.deliver(Outbound::Text(frame)) {
                warn!(session_id = connection.session_id(), error = %err, "failed to queue welcome");
            }
        }
        Err(err) => warn!(error = %err, "failed to serialize welcome"),
    }
}
