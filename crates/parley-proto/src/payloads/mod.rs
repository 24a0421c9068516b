//! JSON payloads carried in the `data` field of a frame.
//!
//! Payloads are grouped by concern:
//!
//! - [`session`]: room membership, typing, and online presence
//! - [`message`]: chat messages and their edit/delete/reaction updates
//! - [`receipt`]: delivery and read confirmations
//! - [`conversation`]: conversation creation and bulk read markers
//!
//! All structs use `camelCase` field names. Optional fields are skipped when
//! empty so frames stay compatible with servers that predate them, and every
//! optional field defaults on decode so older senders are accepted.

pub mod conversation;
pub mod message;
pub mod receipt;
pub mod session;

pub use conversation::{
    Conversation, ConversationKind, ConversationLeave, ConversationRead, ConversationUpdate,
    ConversationUpdates,
};
pub use message::{
    Attachment, Message, MessageDelete, MessageEdit, MessageKind, Reaction, ReactionRemove,
    ReactionUpdate, Role,
};
pub use receipt::{Delivered, ReadReceipt};
pub use session::{Join, Leave, TypingIndicator, UserStatus};

/// Room or conversation identifier.
pub type RoomId = String;

/// Participant identifier.
pub type UserId = String;

/// Client-generated, globally unique message identifier.
pub type MessageId = String;
