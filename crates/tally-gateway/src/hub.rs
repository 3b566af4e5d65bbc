//! Fan-out of server messages to live connections.
//!
//! Every connection registers an unbounded channel; its socket task drains
//! the receiver. Publishing walks the registered senders, so a connection
//! that subscribes while a publish is in flight may or may not receive that
//! particular message. A closed receiver is pruned on the next delivery
//! attempt, never surfaced to the publisher.

use crate::session::ConnectionId;
use dashmap::DashMap;
use tally_types::ServerMessage;
use tokio::sync::mpsc;
use tracing::debug;

/// Broadcast hub keyed by connection.
pub struct BroadcastHub {
    senders: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
}

impl BroadcastHub {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Register a connection; the returned receiver feeds its socket.
    pub fn subscribe(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(id, tx);
        rx
    }

    /// Remove a connection. Safe to call for an id that was never
    /// registered or is already gone.
    pub fn unsubscribe(&self, id: ConnectionId) {
        self.senders.remove(&id);
    }

    /// Deliver `message` to every registered connection.
    ///
    /// Returns how many connections received it. Connections whose receiver
    /// has gone away are dropped from the hub in the same pass.
    pub fn publish(&self, message: &ServerMessage) -> usize {
        let mut delivered = 0;
        self.senders.retain(|id, tx| {
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                debug!(connection_id = %id, "pruning closed connection from hub");
                false
            }
        });
        delivered
    }

    /// Deliver `message` to one connection.
    ///
    /// Returns false when the connection is unknown or its receiver has gone
    /// away; a dead entry is pruned.
    pub fn notify(&self, id: ConnectionId, message: ServerMessage) -> bool {
        // The guard from get() must be gone before remove() touches the
        // same shard.
        let sent = match self.senders.get(&id) {
            Some(tx) => tx.send(message).is_ok(),
            None => return false,
        };
        if !sent {
            debug!(connection_id = %id, "pruning closed connection from hub");
            self.senders.remove(&id);
        }
        sent
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
