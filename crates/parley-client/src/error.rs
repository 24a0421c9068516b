//! Client error types.

use parley_proto::RoomId;
use thiserror::Error;

/// Local misuse the caller must see.
///
/// Transport failures are never reported here; they surface as connection
/// state changes. Operations on unknown message ids are no-ops, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Operation needs an active room and none is joined.
    #[error("no active room")]
    NoActiveRoom,

    /// Operation targets a room this client is not subscribed to.
    #[error("not subscribed to room {0}")]
    NotSubscribed(RoomId),

    /// Conversation was never created by or announced to this client.
    #[error("unknown conversation {0}")]
    UnknownConversation(RoomId),

    /// Messenger was destroyed.
    #[error("messenger destroyed")]
    Destroyed,
}
