//! Frame envelope and codec.
//!
//! A frame is one JSON text message: `{"type": "<wire name>", "data": {...}}`.
//! [`FrameType`] is the discriminator, [`Frame`] pairs it with the typed
//! payload. Each variant maps to exactly one wire name; adding a variant
//! breaks every exhaustive `match` below until it is wired through.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::value::RawValue;

use crate::{
    errors::{ProtocolError, Result},
    payloads::{
        Conversation, ConversationLeave, ConversationRead, ConversationUpdate, Delivered, Join,
        Leave, Message, MessageDelete, MessageEdit, ReactionRemove, ReactionUpdate, ReadReceipt,
        TypingIndicator, UserStatus,
    },
};

/// Frame discriminator (the envelope `type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Subscribe to a room.
    Join,
    /// Unsubscribe from a room.
    Leave,
    /// Chat message.
    Message,
    /// Typing signal.
    Typing,
    /// Read confirmation.
    ReadReceipt,
    /// Delivery confirmation.
    Delivered,
    /// Sender edited a message.
    MessageEdit,
    /// Sender soft-deleted a message.
    MessageDelete,
    /// Reaction added or replaced.
    Reaction,
    /// Reaction removed.
    ReactionRemove,
    /// Conversation created.
    ConversationCreate,
    /// Whole conversation read.
    ConversationRead,
    /// Conversation settings changed.
    ConversationUpdate,
    /// Participant left a conversation.
    ConversationLeave,
    /// Participant came online.
    UserOnline,
    /// Participant went offline.
    UserOffline,
    /// Keepalive request.
    Ping,
    /// Keepalive response.
    Pong,
}

impl FrameType {
    /// Every frame type, in wire-table order.
    pub const ALL: [Self; 18] = [
        Self::Join,
        Self::Leave,
        Self::Message,
        Self::Typing,
        Self::ReadReceipt,
        Self::Delivered,
        Self::MessageEdit,
        Self::MessageDelete,
        Self::Reaction,
        Self::ReactionRemove,
        Self::ConversationCreate,
        Self::ConversationRead,
        Self::ConversationUpdate,
        Self::ConversationLeave,
        Self::UserOnline,
        Self::UserOffline,
        Self::Ping,
        Self::Pong,
    ];

    /// Wire spelling of this type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Message => "message",
            Self::Typing => "typing",
            Self::ReadReceipt => "read_receipt",
            Self::Delivered => "delivered",
            Self::MessageEdit => "message:edit",
            Self::MessageDelete => "message:delete",
            Self::Reaction => "message:reaction",
            Self::ReactionRemove => "message:reaction:remove",
            Self::ConversationCreate => "conversation:create",
            Self::ConversationRead => "conversation:read",
            Self::ConversationUpdate => "conversation:update",
            Self::ConversationLeave => "conversation:leave",
            Self::UserOnline => "user:online",
            Self::UserOffline => "user:offline",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Look up a type by its wire spelling.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Whether frames of this type carry a `data` object.
    pub const fn has_payload(self) -> bool {
        !matches!(self, Self::Ping | Self::Pong)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_wire(s).ok_or_else(|| ProtocolError::UnknownType(s.to_owned()))
    }
}

/// Typed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `join`
    Join(Join),
    /// `leave`
    Leave(Leave),
    /// `message`
    Message(Box<Message>),
    /// `typing`
    Typing(TypingIndicator),
    /// `read_receipt`
    ReadReceipt(ReadReceipt),
    /// `delivered`
    Delivered(Delivered),
    /// `message:edit`
    MessageEdit(MessageEdit),
    /// `message:delete`
    MessageDelete(MessageDelete),
    /// `message:reaction`
    Reaction(ReactionUpdate),
    /// `message:reaction:remove`
    ReactionRemove(ReactionRemove),
    /// `conversation:create`
    ConversationCreate(Conversation),
    /// `conversation:read`
    ConversationRead(ConversationRead),
    /// `conversation:update`
    ConversationUpdate(ConversationUpdate),
    /// `conversation:leave`
    ConversationLeave(ConversationLeave),
    /// `user:online`
    UserOnline(UserStatus),
    /// `user:offline`
    UserOffline(UserStatus),
    /// `ping`
    Ping,
    /// `pong`
    Pong,
}

#[derive(Serialize)]
struct OutgoingEnvelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

#[derive(Deserialize)]
struct IncomingEnvelope<'a> {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, borrow)]
    data: Option<&'a RawValue>,
}

impl Frame {
    /// Discriminator for this frame.
    pub const fn frame_type(&self) -> FrameType {
        match self {
            Self::Join(_) => FrameType::Join,
            Self::Leave(_) => FrameType::Leave,
            Self::Message(_) => FrameType::Message,
            Self::Typing(_) => FrameType::Typing,
            Self::ReadReceipt(_) => FrameType::ReadReceipt,
            Self::Delivered(_) => FrameType::Delivered,
            Self::MessageEdit(_) => FrameType::MessageEdit,
            Self::MessageDelete(_) => FrameType::MessageDelete,
            Self::Reaction(_) => FrameType::Reaction,
            Self::ReactionRemove(_) => FrameType::ReactionRemove,
            Self::ConversationCreate(_) => FrameType::ConversationCreate,
            Self::ConversationRead(_) => FrameType::ConversationRead,
            Self::ConversationUpdate(_) => FrameType::ConversationUpdate,
            Self::ConversationLeave(_) => FrameType::ConversationLeave,
            Self::UserOnline(_) => FrameType::UserOnline,
            Self::UserOffline(_) => FrameType::UserOffline,
            Self::Ping => FrameType::Ping,
            Self::Pong => FrameType::Pong,
        }
    }

    /// Build a `message` frame.
    pub fn message(message: Message) -> Self {
        Self::Message(Box::new(message))
    }

    /// Serialize to JSON text.
    ///
    /// `type` is always written before `data`; payload-less frames omit `data`.
    pub fn encode(&self) -> Result<String> {
        let kind = self.frame_type().as_str();
        match self {
            Self::Join(p) => envelope(kind, Some(p)),
            Self::Leave(p) => envelope(kind, Some(p)),
            Self::Message(p) => envelope(kind, Some(p.as_ref())),
            Self::Typing(p) => envelope(kind, Some(p)),
            Self::ReadReceipt(p) => envelope(kind, Some(p)),
            Self::Delivered(p) => envelope(kind, Some(p)),
            Self::MessageEdit(p) => envelope(kind, Some(p)),
            Self::MessageDelete(p) => envelope(kind, Some(p)),
            Self::Reaction(p) => envelope(kind, Some(p)),
            Self::ReactionRemove(p) => envelope(kind, Some(p)),
            Self::ConversationCreate(p) => envelope(kind, Some(p)),
            Self::ConversationRead(p) => envelope(kind, Some(p)),
            Self::ConversationUpdate(p) => envelope(kind, Some(p)),
            Self::ConversationLeave(p) => envelope(kind, Some(p)),
            Self::UserOnline(p) | Self::UserOffline(p) => envelope(kind, Some(p)),
            Self::Ping | Self::Pong => envelope::<()>(kind, None),
        }
    }

    /// Parse JSON text into a typed frame.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidEnvelope`] if the text is not an object with
    ///   a string `type`
    /// - [`ProtocolError::UnknownType`] for unrecognised `type` values
    /// - [`ProtocolError::MissingPayload`] if `data` is absent or `null`
    /// - [`ProtocolError::MalformedPayload`] if `data` fails the schema
    pub fn decode(text: &str) -> Result<Self> {
        let env: IncomingEnvelope<'_> = serde_json::from_str(text)
            .map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))?;
        let ty: FrameType = env.kind.parse()?;
        let data = env.data;

        Ok(match ty {
            FrameType::Join => Self::Join(payload(ty, data)?),
            FrameType::Leave => Self::Leave(payload(ty, data)?),
            FrameType::Message => Self::Message(Box::new(payload(ty, data)?)),
            FrameType::Typing => Self::Typing(payload(ty, data)?),
            FrameType::ReadReceipt => Self::ReadReceipt(payload(ty, data)?),
            FrameType::Delivered => Self::Delivered(payload(ty, data)?),
            FrameType::MessageEdit => Self::MessageEdit(payload(ty, data)?),
            FrameType::MessageDelete => Self::MessageDelete(payload(ty, data)?),
            FrameType::Reaction => Self::Reaction(payload(ty, data)?),
            FrameType::ReactionRemove => Self::ReactionRemove(payload(ty, data)?),
            FrameType::ConversationCreate => Self::ConversationCreate(payload(ty, data)?),
            FrameType::ConversationRead => Self::ConversationRead(payload(ty, data)?),
            FrameType::ConversationUpdate => Self::ConversationUpdate(payload(ty, data)?),
            FrameType::ConversationLeave => Self::ConversationLeave(payload(ty, data)?),
            FrameType::UserOnline => Self::UserOnline(payload(ty, data)?),
            FrameType::UserOffline => Self::UserOffline(payload(ty, data)?),
            FrameType::Ping => Self::Ping,
            FrameType::Pong => Self::Pong,
        })
    }
}

fn envelope<T: Serialize>(kind: &'static str, data: Option<&T>) -> Result<String> {
    serde_json::to_string(&OutgoingEnvelope { kind, data })
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

fn payload<T: DeserializeOwned>(ty: FrameType, data: Option<&RawValue>) -> Result<T> {
    let raw = data.ok_or(ProtocolError::MissingPayload(ty.as_str()))?;
    serde_json::from_str(raw.get()).map_err(|e| ProtocolError::MalformedPayload {
        frame_type: ty.as_str(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{ConversationUpdates, Role};

    #[test]
    fn join_matches_server_wire_format() {
        let frame = Frame::Join(Join {
            room_id: "room-123".into(),
            user_id: "user-1".into(),
            user_name: "John".into(),
            user_role: Role::from("patient"),
        });

        insta::assert_snapshot!(frame.encode().unwrap(), @r#"{"type":"join","data":{"roomId":"room-123","userId":"user-1","userName":"John","userRole":"patient"}}"#);
    }

    #[test]
    fn small_frames_match_server_wire_format() {
        let leave = Frame::Leave(Leave { room_id: "room-123".into(), user_id: "user-1".into() });
        let delivered = Frame::Delivered(Delivered { message_id: "msg-1".into() });
        let receipt = Frame::ReadReceipt(ReadReceipt {
            message_id: "msg-1".into(),
            user_id: "user-1".into(),
            read_at: 1_700_000_000_000,
        });
        let typing = Frame::Typing(TypingIndicator {
            room_id: "room-123".into(),
            user_id: "user-1".into(),
            user_name: "John".into(),
            is_typing: true,
        });

        insta::assert_snapshot!(leave.encode().unwrap(), @r#"{"type":"leave","data":{"roomId":"room-123","userId":"user-1"}}"#);
        insta::assert_snapshot!(delivered.encode().unwrap(), @r#"{"type":"delivered","data":{"messageId":"msg-1"}}"#);
        insta::assert_snapshot!(receipt.encode().unwrap(), @r#"{"type":"read_receipt","data":{"messageId":"msg-1","userId":"user-1","readAt":1700000000000}}"#);
        insta::assert_snapshot!(typing.encode().unwrap(), @r#"{"type":"typing","data":{"roomId":"room-123","userId":"user-1","userName":"John","isTyping":true}}"#);
    }

    #[test]
    fn conversation_settings_frames() {
        let update = Frame::ConversationUpdate(ConversationUpdate {
            conversation_id: "conv-1".into(),
            updates: ConversationUpdates { muted: Some(true), ..ConversationUpdates::default() },
        });
        let leave = Frame::ConversationLeave(ConversationLeave {
            conversation_id: "conv-1".into(),
            user_id: Some("user-1".into()),
        });

        insta::assert_snapshot!(update.encode().unwrap(), @r#"{"type":"conversation:update","data":{"conversationId":"conv-1","updates":{"muted":true}}}"#);
        insta::assert_snapshot!(leave.encode().unwrap(), @r#"{"type":"conversation:leave","data":{"conversationId":"conv-1","userId":"user-1"}}"#);

        let bare = Frame::decode(r#"{"type":"conversation:leave","data":{"conversationId":"conv-1"}}"#);
        assert_eq!(
            bare,
            Ok(Frame::ConversationLeave(ConversationLeave {
                conversation_id: "conv-1".into(),
                user_id: None,
            }))
        );
    }

    #[test]
    fn ping_has_no_data() {
        assert_eq!(Frame::Ping.encode().unwrap(), r#"{"type":"ping"}"#);
        assert_eq!(Frame::decode(r#"{"type":"pong"}"#).unwrap(), Frame::Pong);
        assert_eq!(Frame::decode(r#"{"type":"pong","data":{"t":1}}"#).unwrap(), Frame::Pong);
    }

    #[test]
    fn decode_delivered() {
        let frame = Frame::decode(r#"{"type":"delivered","data":{"messageId":"msg_1"}}"#).unwrap();
        assert_eq!(frame, Frame::Delivered(Delivered { message_id: "msg_1".into() }));
    }

    #[test]
    fn decode_accepts_data_before_type() {
        let frame = Frame::decode(r#"{"data":{"messageId":"m"},"type":"message:delete"}"#).unwrap();
        assert_eq!(frame, Frame::MessageDelete(MessageDelete { message_id: "m".into() }));
    }

    #[test]
    fn unknown_type_is_reported_separately() {
        let err = Frame::decode(r#"{"type":"user:away","data":{}}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType("user:away".into()));
        assert!(err.is_forward_compatible());
    }

    #[test]
    fn envelope_errors() {
        assert!(matches!(Frame::decode("not json"), Err(ProtocolError::InvalidEnvelope(_))));
        assert!(matches!(Frame::decode(r#"{"data":{}}"#), Err(ProtocolError::InvalidEnvelope(_))));
        assert!(matches!(Frame::decode(r#"{"type":7}"#), Err(ProtocolError::InvalidEnvelope(_))));
        assert!(matches!(Frame::decode("[]"), Err(ProtocolError::InvalidEnvelope(_))));
    }

    #[test]
    fn payload_errors() {
        assert_eq!(Frame::decode(r#"{"type":"join"}"#), Err(ProtocolError::MissingPayload("join")));
        assert_eq!(
            Frame::decode(r#"{"type":"delivered","data":null}"#),
            Err(ProtocolError::MissingPayload("delivered"))
        );
        assert!(matches!(
            Frame::decode(r#"{"type":"typing","data":{"roomId":"r"}}"#),
            Err(ProtocolError::MalformedPayload { frame_type: "typing", .. })
        ));
    }

    #[test]
    fn wire_names_are_unique_and_resolvable() {
        for ty in FrameType::ALL {
            assert_eq!(FrameType::from_wire(ty.as_str()), Some(ty));
            assert_eq!(ty.as_str().parse::<FrameType>(), Ok(ty));
        }
        let mut names: Vec<_> = FrameType::ALL.iter().map(|t| t.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FrameType::ALL.len());
    }
}
