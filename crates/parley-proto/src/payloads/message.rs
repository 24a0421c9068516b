//! Chat message payloads.
//!
//! [`Message`] is both the `message` frame payload and the record the client
//! caches. Its immutable fields (id, room, sender, content at creation,
//! timestamp) are set by the sender; the mutable flags (`delivered`, `read`,
//! `readBy`, `edited`, `deletedAt`, `reactions`) are owned by the receiving
//! client's store.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{MessageId, RoomId, UserId};

/// Domain role tag for a participant (e.g. `patient`, `staff`, `doctor`).
///
/// Kept as an open string: the core never branches on it, and unknown roles
/// from newer servers must not make a frame undecodable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Create a role tag.
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    /// Role tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        Self::new(role)
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        Self(role)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text.
    #[default]
    Text,
    /// Image attachment with optional caption.
    Image,
    /// Non-image attachment with optional caption.
    File,
    /// Locally synthesized notice (joins, leaves). Never sent by clients.
    System,
}

/// File already hosted by an upload service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment id.
    pub id: String,
    /// Original file name.
    pub name: String,
    /// MIME type.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Download URL.
    pub url: String,
    /// Preview URL, for images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl Attachment {
    /// Message kind implied by the MIME type.
    pub fn message_kind(&self) -> MessageKind {
        if self.mime_type.starts_with("image/") { MessageKind::Image } else { MessageKind::File }
    }
}

/// Emoji reaction by one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Reaction content.
    pub emoji: String,
    /// Reacting participant.
    pub user_id: UserId,
    /// Display name of the reacting participant.
    #[serde(default)]
    pub user_name: String,
    /// Unix milliseconds the reaction was added.
    #[serde(default)]
    pub created_at: u64,
}

/// Chat message (`message`).
///
/// Decoding accepts both room-model (`roomId`, `timestamp`) and
/// conversation-model (`conversationId`, `createdAt`) spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Client-generated id, unique across rooms.
    pub id: MessageId,
    /// Room the message belongs to.
    #[serde(alias = "conversationId")]
    pub room_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Author display name at send time.
    #[serde(default)]
    pub sender_name: String,
    /// Author role at send time.
    #[serde(default)]
    pub sender_role: Role,
    /// Text content. Empty once soft-deleted.
    #[serde(default)]
    pub content: String,
    /// Content kind.
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// Attached files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    /// Unix milliseconds of creation.
    #[serde(rename = "timestamp", alias = "createdAt", default)]
    pub timestamp: u64,
    /// Read by at least one other participant (or by us, for inbound).
    #[serde(default)]
    pub read: bool,
    /// Delivered to at least one other client (or acknowledged by us).
    #[serde(default)]
    pub delivered: bool,
    /// Participants that have read the message.
    #[serde(default)]
    pub read_by: Vec<UserId>,
    /// Content was changed after sending.
    #[serde(default, skip_serializing_if = "is_false")]
    pub edited: bool,
    /// Unix milliseconds of soft deletion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<u64>,
    /// Reactions, at most one per participant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// True once the message has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True if `user_id` appears in `read_by`.
    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.iter().any(|u| u == user_id)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(super) fn is_false(value: &bool) -> bool {
    !*value
}

/// Content of a message was edited by its sender (`message:edit`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEdit {
    /// Edited message.
    pub message_id: MessageId,
    /// Replacement content.
    pub content: String,
}

/// A message was soft-deleted by its sender (`message:delete`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDelete {
    /// Deleted message.
    pub message_id: MessageId,
}

/// A participant set their reaction on a message (`message:reaction`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
    /// Target message.
    pub message_id: MessageId,
    /// Reaction content.
    pub emoji: String,
    /// Reacting participant.
    pub user_id: UserId,
    /// Display name of the reacting participant.
    #[serde(default)]
    pub user_name: String,
}

/// A participant removed their reaction (`message:reaction:remove`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRemove {
    /// Target message.
    pub message_id: MessageId,
    /// Participant whose reaction is removed.
    pub user_id: UserId,
}
