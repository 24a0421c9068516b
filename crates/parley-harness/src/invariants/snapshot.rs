//! Observable state snapshots for invariant checking.

use std::collections::BTreeMap;

use parley_client::Messenger;
use parley_core::env::Environment;
use parley_proto::{RoomId, payloads::Message};

/// Snapshot of every client in a simulation.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// No clients.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Add a client snapshot.
    pub fn add_client(&mut self, client: ClientSnapshot) {
        self.clients.push(client);
    }
}

/// Observable state of one messenger.
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    /// Client index within the simulation.
    pub id: usize,
    /// Active room.
    pub active_room: Option<RoomId>,
    /// Subscribed rooms, in subscription order.
    pub subscriptions: Vec<RoomId>,
    /// Cached history per room.
    pub rooms: BTreeMap<RoomId, Vec<Message>>,
}

impl ClientSnapshot {
    /// Capture a messenger's state.
    pub fn capture<E: Environment>(id: usize, messenger: &Messenger<E>) -> Self {
        let rooms = messenger
            .cached_rooms()
            .map(|room| (room.to_owned(), messenger.history(room).to_vec()))
            .collect();

        Self {
            id,
            active_room: messenger.active_room().map(str::to_owned),
            subscriptions: messenger.subscriptions().map(str::to_owned).collect(),
            rooms,
        }
    }
}
