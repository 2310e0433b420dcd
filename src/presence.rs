use crate::protocol::ServerEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

/// Unique identifier for a single WebSocket connection.
///
/// Presence maps a user to at most one connection; the id lets a stale
/// disconnect from a superseded connection be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

struct PresenceEntry {
    conn: ConnectionId,
    sender: UnboundedSender<String>,
}

/// Process-wide registry of online users and their live connections.
///
/// One instance per server process, shared by the relay pipeline and the
/// call-signaling relay. All mutation happens under the write lock, so
/// register/unregister are atomic with respect to concurrent access.
#[derive(Default, Clone)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<HashMap<Uuid, PresenceEntry>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `user_id` with a new connection, replacing any prior one.
    ///
    /// The returned receiver is the connection's outbound channel. The new
    /// connection gets the current online set; everyone else gets a
    /// `user_online` broadcast. Replacing an entry drops the superseded
    /// connection's sender, which ends its outbound stream.
    pub async fn register(&self, user_id: Uuid, conn: ConnectionId) -> UnboundedReceiver<String> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;

        let replaced = guard
            .insert(user_id, PresenceEntry { conn, sender: tx })
            .is_some();

        let users: Vec<Uuid> = guard.keys().copied().collect();
        if let Some(payload) = encode(&ServerEvent::OnlineUsers { users }) {
            if let Some(entry) = guard.get(&user_id) {
                let _ = entry.sender.send(payload);
            }
        }

        // Peers only hear genuine offline -> online transitions; a reconnect
        // replacing a live entry is not one.
        if !replaced {
            if let Some(payload) = encode(&ServerEvent::UserOnline { user_id }) {
                for (uid, entry) in guard.iter() {
                    if *uid != user_id {
                        let _ = entry.sender.send(payload.clone());
                    }
                }
            }
        }

        tracing::debug!(%user_id, replaced, online = guard.len(), "presence registered");
        rx
    }

    /// Remove the association if `conn` is still the registered connection.
    ///
    /// A disconnect from a connection that has already been superseded is a
    /// no-op; without this guard a slow disconnect could erase a newer
    /// connection's presence.
    pub async fn unregister(&self, user_id: Uuid, conn: ConnectionId) {
        let mut guard = self.inner.write().await;

        match guard.get(&user_id) {
            Some(entry) if entry.conn == conn => {}
            Some(_) => {
                tracing::debug!(%user_id, "stale unregister ignored");
                return;
            }
            None => return,
        }

        guard.remove(&user_id);

        if let Some(payload) = encode(&ServerEvent::UserOffline { user_id }) {
            // Drop dead senders while broadcasting.
            guard.retain(|_, entry| entry.sender.send(payload.clone()).is_ok());
        }

        tracing::debug!(%user_id, online = guard.len(), "presence unregistered");
    }

    /// The live outbound channel for `user_id`, if online.
    pub async fn resolve(&self, user_id: Uuid) -> Option<UnboundedSender<String>> {
        let guard = self.inner.read().await;
        guard.get(&user_id).map(|entry| entry.sender.clone())
    }

    /// Deliver one event to a user's current connection.
    ///
    /// Returns false when the user is offline or the connection is gone;
    /// presence misses are surfaced per-operation, never queued.
    pub async fn send_to(&self, user_id: Uuid, event: &ServerEvent) -> bool {
        let Some(payload) = encode(event) else {
            return false;
        };
        match self.resolve(user_id).await {
            Some(sender) => sender.send(payload).is_ok(),
            None => false,
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        let guard = self.inner.read().await;
        guard.contains_key(&user_id)
    }

    pub async fn list_online(&self) -> Vec<Uuid> {
        let guard = self.inner.read().await;
        guard.keys().copied().collect()
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode server event");
            None
        }
    }
}
