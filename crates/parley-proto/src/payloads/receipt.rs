//! Delivery and read confirmations.

use serde::{Deserialize, Serialize};

use super::{MessageId, UserId};

/// A participant viewed a message (`read_receipt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Message that was read.
    pub message_id: MessageId,
    /// Reader.
    pub user_id: UserId,
    /// Unix milliseconds at which the message was read.
    pub read_at: u64,
}

/// A recipient's client received a message (`delivered`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivered {
    /// Message that was delivered.
    pub message_id: MessageId,
}
