//! Conversation payloads for the multi-conversation model.

use serde::{Deserialize, Serialize};

use super::{RoomId, UserId, message::is_false};

/// Conversation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// One-to-one conversation.
    #[default]
    Direct,
    /// Small group with a fixed participant list.
    Group,
    /// Broadcast-style channel.
    Channel,
}

/// Newly created conversation (`conversation:create`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation id. Doubles as the room id for subscriptions and messages.
    pub id: RoomId,
    /// Conversation shape.
    #[serde(rename = "type", default)]
    pub kind: ConversationKind,
    /// Display name, for groups and channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Participant ids, creator included.
    #[serde(default)]
    pub participants: Vec<UserId>,
    /// Creator.
    pub created_by: UserId,
    /// Unix milliseconds of creation.
    #[serde(default)]
    pub created_at: u64,
    /// Notifications silenced by the local user.
    #[serde(default, skip_serializing_if = "is_false")]
    pub muted: bool,
    /// Kept at the top of the local user's list.
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
    /// Hidden from the local user's list.
    #[serde(default, skip_serializing_if = "is_false")]
    pub archived: bool,
}

impl Conversation {
    /// Merge settings. Returns `true` if anything changed.
    pub fn apply(&mut self, updates: &ConversationUpdates) -> bool {
        let before = self.clone();
        if let Some(name) = &updates.name {
            self.name = Some(name.clone());
        }
        if let Some(muted) = updates.muted {
            self.muted = muted;
        }
        if let Some(pinned) = updates.pinned {
            self.pinned = pinned;
        }
        if let Some(archived) = updates.archived {
            self.archived = archived;
        }
        *self != before
    }
}

/// Partial conversation settings. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdates {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Mute or unmute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    /// Pin or unpin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// Archive or restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

/// Conversation settings changed (`conversation:update`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdate {
    /// Updated conversation.
    pub conversation_id: RoomId,
    /// Changed settings.
    pub updates: ConversationUpdates,
}

/// A participant left a conversation (`conversation:leave`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationLeave {
    /// Conversation that was left.
    pub conversation_id: RoomId,
    /// Leaving participant. Servers may fill this in from the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Every message in a conversation was read (`conversation:read`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRead {
    /// Conversation that was read.
    pub conversation_id: RoomId,
    /// Reader.
    pub user_id: UserId,
}
#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Conversation {
        Conversation {
            id: "conv-1".into(),
            kind: ConversationKind::Group,
            name: Some("Care team".into()),
            participants: vec!["user-1".into(), "user-2".into()],
            created_by: "user-1".into(),
            created_at: 1,
            muted: false,
            pinned: false,
            archived: false,
        }
    }

    #[test]
    fn apply_merges_only_present_fields() {
        let mut conversation = group();
        let updates = ConversationUpdates { pinned: Some(true), ..ConversationUpdates::default() };

        assert!(conversation.apply(&updates));
        assert!(conversation.pinned);
        assert_eq!(conversation.name.as_deref(), Some("Care team"));
        assert!(!conversation.apply(&updates), "second apply changes nothing");
    }

    #[test]
    fn settings_default_off_on_the_wire() {
        let json = r#"{"id":"conv-1","type":"group","createdBy":"user-1"}"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert!(!conversation.muted && !conversation.pinned && !conversation.archived);

        let mut pinned = group();
        pinned.pinned = true;
        insta::assert_snapshot!(
            serde_json::to_string(&pinned).unwrap(),
            @r#"{"id":"conv-1","type":"group","name":"Care team","participants":["user-1","user-2"],"createdBy":"user-1","createdAt":1,"pinned":true}"#
        );
    }
}
