//! Membership, typing, and presence payloads.

use serde::{Deserialize, Serialize};

use super::{Role, RoomId, UserId};

/// Subscribe to a room as a participant (`join`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Join {
    /// Room being joined.
    pub room_id: RoomId,
    /// Joining participant.
    pub user_id: UserId,
    /// Display name shown to other participants.
    #[serde(default)]
    pub user_name: String,
    /// Domain role tag (e.g. `patient`, `staff`).
    #[serde(default)]
    pub user_role: Role,
}

/// Unsubscribe from a room (`leave`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leave {
    /// Room being left.
    pub room_id: RoomId,
    /// Leaving participant.
    pub user_id: UserId,
}

/// Typing signal for one participant in one room (`typing`).
///
/// Accepts `conversationId` as an alias for `roomId` on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    /// Room the participant is typing in.
    #[serde(alias = "conversationId")]
    pub room_id: RoomId,
    /// Typing participant.
    pub user_id: UserId,
    /// Display name of the typing participant.
    #[serde(default)]
    pub user_name: String,
    /// `true` while composing, `false` once stopped.
    pub is_typing: bool,
}

/// Online/offline notification (`user:online`, `user:offline`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    /// Participant whose status changed.
    pub user_id: UserId,
    /// Unix milliseconds the participant was last seen. Only sent on offline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
}
