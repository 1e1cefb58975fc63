//! Concurrent registry of live connections.
//!
//! [`ConnectionRegistry`] maps each connected [`Identity`] to the handle of
//! its one live connection. It is backed by a sharded [`DashMap`], so every
//! operation locks a single shard for the duration of one key operation and
//! a broadcast snapshot never holds up unrelated connects or disconnects.

use dashmap::DashMap;

use super::{ConnectionHandle, ConnectionId, Identity};

/// Identity → live connection map.
///
/// # Concurrency
///
/// - All operations are atomic per key.
/// - No operation holds a lock across keys.
/// - [`Self::snapshot`] and [`Self::handles`] return point-in-time copies.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Identity, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under `identity`, replacing any previous entry.
    ///
    /// Returns the replaced handle so the caller can close it.
    pub fn register(&self, identity: Identity, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(identity, handle)
    }

    /// Returns the current handle for `identity`, if any.
    #[must_use]
    pub fn lookup(&self, identity: &Identity) -> Option<ConnectionHandle> {
        self.connections.get(identity).map(|entry| entry.value().clone())
    }

    /// Removes `identity` regardless of which connection holds it.
    pub fn remove(&self, identity: &Identity) -> bool {
        self.connections.remove(identity).is_some()
    }

    /// Removes `identity` only if it is still bound to `connection_id`.
    ///
    /// Returns `false` when the entry is absent or already belongs to a newer
    /// connection, in which case nothing is removed.
    pub fn remove_if_current(&self, identity: &Identity, connection_id: ConnectionId) -> bool {
        self.connections
            .remove_if(identity, |_, handle| handle.id() == connection_id)
            .is_some()
    }

    /// Returns `true` if `identity` is currently registered.
    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.connections.contains_key(identity)
    }

    /// Returns a sorted point-in-time copy of all registered identities.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Identity> {
        let mut identities: Vec<Identity> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        identities.sort();
        identities
    }

    /// Returns a point-in-time copy of every registered identity and handle.
    #[must_use]
    pub fn handles(&self) -> Vec<(Identity, ConnectionHandle)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Returns the number of registered identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no identity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
