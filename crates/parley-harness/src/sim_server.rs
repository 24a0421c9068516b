//! In-process relay server for simulation.
//!
//! `SimServer` stands in for the real-time messaging server: it tracks which
//! sessions are connected and which rooms they joined, and decides who
//! receives each inbound frame. It does no I/O; [`crate::SimCluster`] moves
//! frames between the server and the messengers.
//!
//! Routing rules:
//!
//! | Frame | Recipients |
//! |-------|------------|
//! | `join`, `leave`, `typing`, `conversation:read` | other members of the room |
//! | `message` | every member of the room, sender included |
//! | `delivered`, `read_receipt`, edits, deletes, reactions | other members of the message's room |
//! | `conversation:create` | connected participants other than the sender |
//! | `ping` | sender (as `pong`) |
//!
//! Connecting and disconnecting broadcast `user:online` / `user:offline` to
//! every other connected session.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parley_proto::{
    Frame, MessageId, RoomId, UserId,
    payloads::{Conversation, UserStatus},
};
use tracing::{debug, trace};

/// Session identifier, one per simulated client.
pub type SessionId = usize;

/// Frame addressed to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Recipient.
    pub to: SessionId,
    /// Frame to deliver.
    pub frame: Frame,
}

/// Routing server for simulated clients.
#[derive(Debug, Default)]
pub struct SimServer {
    users: HashMap<SessionId, UserId>,
    connected: BTreeSet<SessionId>,
    rooms: BTreeMap<RoomId, BTreeSet<SessionId>>,
    message_rooms: HashMap<MessageId, RoomId>,
}

impl SimServer {
    /// Empty server with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the user behind a session.
    pub fn register(&mut self, session: SessionId, user_id: impl Into<UserId>) {
        self.users.insert(session, user_id.into());
    }

    /// Session opened. Returns the `user:online` broadcast.
    pub fn connect(&mut self, session: SessionId) -> Vec<Outbound> {
        if !self.connected.insert(session) {
            return Vec::new();
        }
        debug!(session, "session connected");

        let Some(user_id) = self.users.get(&session).cloned() else {
            return Vec::new();
        };
        let frame = Frame::UserOnline(UserStatus { user_id, last_seen: None });
        self.broadcast_connected(session, &frame)
    }

    /// Session closed. Drops its room memberships and returns the
    /// `user:offline` broadcast.
    pub fn disconnect(&mut self, session: SessionId, now_ms: u64) -> Vec<Outbound> {
        if !self.connected.remove(&session) {
            return Vec::new();
        }
        debug!(session, "session disconnected");

        for members in self.rooms.values_mut() {
            members.remove(&session);
        }
        let Some(user_id) = self.users.get(&session).cloned() else {
            return Vec::new();
        };
        let frame = Frame::UserOffline(UserStatus { user_id, last_seen: Some(now_ms) });
        self.broadcast_connected(session, &frame)
    }

    /// True if the session is connected.
    pub fn is_connected(&self, session: SessionId) -> bool {
        self.connected.contains(&session)
    }

    /// Sessions currently joined to `room_id`.
    pub fn members(&self, room_id: &str) -> Vec<SessionId> {
        self.rooms.get(room_id).map(|m| m.iter().copied().collect()).unwrap_or_default()
    }

    /// Route a frame sent by `from`.
    ///
    /// Frames from sessions that are not connected are dropped.
    pub fn route(&mut self, from: SessionId, frame: &Frame) -> Vec<Outbound> {
        if !self.connected.contains(&from) {
            trace!(from, "frame from disconnected session dropped");
            return Vec::new();
        }

        match frame {
            Frame::Join(join) => {
                self.rooms.entry(join.room_id.clone()).or_default().insert(from);
                self.to_room(&join.room_id, Some(from), frame)
            },
            Frame::Leave(leave) => {
                let out = self.to_room(&leave.room_id, Some(from), frame);
                if let Some(members) = self.rooms.get_mut(&leave.room_id) {
                    members.remove(&from);
                }
                out
            },
            Frame::Message(message) => {
                self.message_rooms.insert(message.id.clone(), message.room_id.clone());
                self.to_room(&message.room_id, None, frame)
            },
            Frame::Typing(indicator) => self.to_room(&indicator.room_id, Some(from), frame),
            Frame::ConversationRead(read) => {
                self.to_room(&read.conversation_id, Some(from), frame)
            },
            Frame::ConversationUpdate(update) => {
                self.to_room(&update.conversation_id, Some(from), frame)
            },
            Frame::ConversationLeave(leave) => {
                self.to_room(&leave.conversation_id, Some(from), frame)
            },
            Frame::Delivered(d) => self.to_message_room(&d.message_id, from, frame),
            Frame::ReadReceipt(r) => self.to_message_room(&r.message_id, from, frame),
            Frame::MessageEdit(e) => self.to_message_room(&e.message_id, from, frame),
            Frame::MessageDelete(d) => self.to_message_room(&d.message_id, from, frame),
            Frame::Reaction(r) => self.to_message_room(&r.message_id, from, frame),
            Frame::ReactionRemove(r) => self.to_message_room(&r.message_id, from, frame),
            Frame::ConversationCreate(conversation) => {
                self.to_participants(conversation, from, frame)
            },
            Frame::Ping => vec![Outbound { to: from, frame: Frame::Pong }],
            Frame::Pong | Frame::UserOnline(_) | Frame::UserOffline(_) => Vec::new(),
        }
    }

    fn to_room(&self, room_id: &str, except: Option<SessionId>, frame: &Frame) -> Vec<Outbound> {
        let Some(members) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|&&to| Some(to) != except)
            .map(|&to| Outbound { to, frame: frame.clone() })
            .collect()
    }

    fn to_message_room(&self, message_id: &str, from: SessionId, frame: &Frame) -> Vec<Outbound> {
        match self.message_rooms.get(message_id) {
            Some(room_id) => self.to_room(room_id, Some(from), frame),
            None => {
                trace!(message_id, "frame for unknown message dropped");
                Vec::new()
            },
        }
    }

    fn to_participants(
        &self,
        conversation: &Conversation,
        from: SessionId,
        frame: &Frame,
    ) -> Vec<Outbound> {
        self.connected
            .iter()
            .filter(|&&to| to != from)
            .filter(|to| {
                self.users.get(to).is_some_and(|user| conversation.participants.contains(user))
            })
            .map(|&to| Outbound { to, frame: frame.clone() })
            .collect()
    }

    fn broadcast_connected(&self, from: SessionId, frame: &Frame) -> Vec<Outbound> {
        self.connected
            .iter()
            .filter(|&&to| to != from)
            .map(|&to| Outbound { to, frame: frame.clone() })
            .collect()
    }
}
