//! Room and conversation subscriptions.
//!
//! The registry is an ordered set of memberships plus an optional "active"
//! room. The single-room API ([`SubscriptionRegistry::join`] /
//! [`SubscriptionRegistry::leave`]) keeps at most one membership active and
//! emits `leave` for the previous room before `join` for the next. The
//! conversation API ([`SubscriptionRegistry::subscribe`] /
//! [`SubscriptionRegistry::unsubscribe`]) adds and removes independently.
//!
//! Memberships survive transport drops; [`SubscriptionRegistry::replay`]
//! rebuilds server-side state after every (re)open.

use parley_proto::{
    Frame, RoomId, UserId,
    payloads::{Join, Leave, Role},
};
use tracing::debug;

/// Local participant identity attached to a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Participant {
    /// Participant id.
    pub user_id: UserId,
    /// Display name.
    pub user_name: String,
    /// Domain role tag.
    pub role: Role,
}

impl Participant {
    /// Build a participant.
    pub fn new(user_id: impl Into<UserId>, user_name: impl Into<String>, role: impl Into<Role>) -> Self {
        Self { user_id: user_id.into(), user_name: user_name.into(), role: role.into() }
    }
}

/// This client is subscribed to `room_id` as `participant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Subscribed room.
    pub room_id: RoomId,
    /// Identity used for the subscription.
    pub participant: Participant,
    /// Unix milliseconds of the subscription.
    pub joined_at: u64,
}

impl Membership {
    fn join_frame(&self) -> Frame {
        Frame::Join(Join {
            room_id: self.room_id.clone(),
            user_id: self.participant.user_id.clone(),
            user_name: self.participant.user_name.clone(),
            user_role: self.participant.role.clone(),
        })
    }

    fn leave_frame(&self) -> Frame {
        Frame::Leave(Leave {
            room_id: self.room_id.clone(),
            user_id: self.participant.user_id.clone(),
        })
    }
}

/// Ordered set of subscriptions with an optional active room.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    memberships: Vec<Membership>,
    active: Option<RoomId>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `room_id` the single active room.
    ///
    /// Returns the frames to send, in order: `leave` for the previously
    /// active room (if any), then `join` for the new one. Joining the room
    /// that is already active with the same identity returns nothing.
    pub fn join(&mut self, room_id: &str, participant: Participant, now_ms: u64) -> Vec<Frame> {
        if let Some(current) = self.active_membership()
            && current.room_id == room_id
            && current.participant == participant
        {
            debug!(room_id, "already active in room");
            return Vec::new();
        }

        let mut frames = self.leave();

        // An existing conversation subscription is promoted, not duplicated.
        if let Some(existing) = self.membership(room_id) {
            if existing.participant == participant {
                self.active = Some(room_id.to_owned());
                return frames;
            }
            frames.extend(self.unsubscribe(room_id));
        }

        let membership = Membership { room_id: room_id.to_owned(), participant, joined_at: now_ms };
        frames.push(membership.join_frame());
        self.memberships.push(membership);
        self.active = Some(room_id.to_owned());
        frames
    }

    /// Leave the active room. Returns the `leave` frame, if a room was active.
    pub fn leave(&mut self) -> Vec<Frame> {
        let Some(room_id) = self.active.take() else {
            return Vec::new();
        };
        self.remove(&room_id).map(|m| m.leave_frame()).into_iter().collect()
    }

    /// Add a subscription without changing the active room.
    ///
    /// Returns the `join` frame, or nothing if already subscribed.
    pub fn subscribe(&mut self, room_id: &str, participant: Participant, now_ms: u64) -> Vec<Frame> {
        if self.is_subscribed(room_id) {
            return Vec::new();
        }
        let membership = Membership { room_id: room_id.to_owned(), participant, joined_at: now_ms };
        let frame = membership.join_frame();
        self.memberships.push(membership);
        vec![frame]
    }

    /// Remove a subscription. Clears the active room if it was this one.
    pub fn unsubscribe(&mut self, room_id: &str) -> Vec<Frame> {
        if self.active.as_deref() == Some(room_id) {
            self.active = None;
        }
        self.remove(room_id).map(|m| m.leave_frame()).into_iter().collect()
    }

    /// `join` frames for every subscription, in subscription order.
    pub fn replay(&self) -> Vec<Frame> {
        self.memberships.iter().map(Membership::join_frame).collect()
    }

    /// Drop every subscription. Returns their `leave` frames.
    pub fn clear(&mut self) -> Vec<Frame> {
        self.active = None;
        self.memberships.drain(..).map(|m| m.leave_frame()).collect()
    }

    /// Active room id.
    pub fn active_room(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Membership of the active room.
    pub fn active_membership(&self) -> Option<&Membership> {
        self.active.as_deref().and_then(|room| self.membership(room))
    }

    /// Membership for `room_id`.
    pub fn membership(&self, room_id: &str) -> Option<&Membership> {
        self.memberships.iter().find(|m| m.room_id == room_id)
    }

    /// True if subscribed to `room_id`.
    pub fn is_subscribed(&self, room_id: &str) -> bool {
        self.membership(room_id).is_some()
    }

    /// All memberships, in subscription order.
    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    fn remove(&mut self, room_id: &str) -> Option<Membership> {
        let pos = self.memberships.iter().position(|m| m.room_id == room_id)?;
        Some(self.memberships.remove(pos))
    }
}
