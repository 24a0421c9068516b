//! Standard invariant checks.

use std::collections::HashSet;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A message id appears at most once in a client's cache.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            for message in client.rooms.values().flatten() {
                if !seen.insert(message.id.as_str()) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("client {}: {} cached twice", client.id, message.id),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A message marked read is also marked delivered.
pub struct ReadImpliesDelivered;

impl Invariant for ReadImpliesDelivered {
    fn name(&self) -> &'static str {
        "read_implies_delivered"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for message in client.rooms.values().flatten() {
                if message.read && !message.delivered {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: {} read but not delivered",
                            client.id, message.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The active room is one of the client's subscriptions.
pub struct ActiveRoomSubscribed;

impl Invariant for ActiveRoomSubscribed {
    fn name(&self) -> &'static str {
        "active_room_subscribed"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if let Some(active) = &client.active_room
                && !client.subscriptions.contains(active)
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: active room {active} not in {:?}",
                        client.id, client.subscriptions
                    ),
                });
            }
        }
        Ok(())
    }
}
