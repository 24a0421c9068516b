//! Client actions and event handlers.

use std::fmt;

use parley_core::{ConnectionState, OnlineStatus};
use parley_proto::{
    Frame,
    payloads::{Message, ReadReceipt, TypingIndicator},
};

/// Actions the messenger produces for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open a socket and report back with `handle_opened` or
    /// `handle_connect_failed`.
    Connect,

    /// Send a frame over the open socket.
    Send(Frame),

    /// Close the socket.
    Disconnect {
        /// Reason for closing.
        reason: String,
    },
}

/// Handler for new messages.
pub type MessageHandler = Box<dyn FnMut(&Message) + Send>;

/// Handler for inbound typing indicators.
pub type TypingHandler = Box<dyn FnMut(&TypingIndicator) + Send>;

/// Handler for read receipts.
pub type ReadReceiptHandler = Box<dyn FnMut(&ReadReceipt) + Send>;

/// Handler for delivery confirmations, given the message id.
pub type DeliveredHandler = Box<dyn FnMut(&str) + Send>;

/// Handler for online/offline changes.
pub type PresenceHandler = Box<dyn FnMut(&OnlineStatus) + Send>;

/// Handler for connection state transitions.
pub type ConnectionStateHandler = Box<dyn FnMut(ConnectionState) + Send>;

/// Callbacks invoked by the messenger, one call per event.
///
/// Every handler is optional. [`crate::Messenger::set_event_handlers`] merges:
/// handlers set on the argument replace existing ones, unset ones are kept.
#[derive(Default)]
pub struct EventHandlers {
    /// A message arrived, or a join/leave notification was synthesized.
    pub on_message: Option<MessageHandler>,
    /// A cached message changed (delivered, read, edited, deleted, reacted).
    pub on_message_update: Option<MessageHandler>,
    /// A remote participant started or stopped typing.
    pub on_typing: Option<TypingHandler>,
    /// A participant read a message.
    pub on_read_receipt: Option<ReadReceiptHandler>,
    /// A message was delivered to another client.
    pub on_delivered: Option<DeliveredHandler>,
    /// A participant came online or went offline.
    pub on_presence: Option<PresenceHandler>,
    /// The connection changed state.
    pub on_connection_state: Option<ConnectionStateHandler>,
}

impl EventHandlers {
    /// No handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the new-message handler.
    #[must_use]
    pub fn on_message(mut self, f: impl FnMut(&Message) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// Set the message-update handler.
    #[must_use]
    pub fn on_message_update(mut self, f: impl FnMut(&Message) + Send + 'static) -> Self {
        self.on_message_update = Some(Box::new(f));
        self
    }

    /// Set the typing handler.
    #[must_use]
    pub fn on_typing(mut self, f: impl FnMut(&TypingIndicator) + Send + 'static) -> Self {
        self.on_typing = Some(Box::new(f));
        self
    }

    /// Set the read-receipt handler.
    #[must_use]
    pub fn on_read_receipt(mut self, f: impl FnMut(&ReadReceipt) + Send + 'static) -> Self {
        self.on_read_receipt = Some(Box::new(f));
        self
    }

    /// Set the delivered handler.
    #[must_use]
    pub fn on_delivered(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_delivered = Some(Box::new(f));
        self
    }

    /// Set the presence handler.
    #[must_use]
    pub fn on_presence(mut self, f: impl FnMut(&OnlineStatus) + Send + 'static) -> Self {
        self.on_presence = Some(Box::new(f));
        self
    }

    /// Set the connection-state handler.
    #[must_use]
    pub fn on_connection_state(mut self, f: impl FnMut(ConnectionState) + Send + 'static) -> Self {
        self.on_connection_state = Some(Box::new(f));
        self
    }

    pub(crate) fn merge(&mut self, other: Self) {
        let Self {
            on_message,
            on_message_update,
            on_typing,
            on_read_receipt,
            on_delivered,
            on_presence,
            on_connection_state,
        } = other;

        if on_message.is_some() {
            self.on_message = on_message;
        }
        if on_message_update.is_some() {
            self.on_message_update = on_message_update;
        }
        if on_typing.is_some() {
            self.on_typing = on_typing;
        }
        if on_read_receipt.is_some() {
            self.on_read_receipt = on_read_receipt;
        }
        if on_delivered.is_some() {
            self.on_delivered = on_delivered;
        }
        if on_presence.is_some() {
            self.on_presence = on_presence;
        }
        if on_connection_state.is_some() {
            self.on_connection_state = on_connection_state;
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_message", &self.on_message.is_some())
            .field("on_message_update", &self.on_message_update.is_some())
            .field("on_typing", &self.on_typing.is_some())
            .field("on_read_receipt", &self.on_read_receipt.is_some())
            .field("on_delivered", &self.on_delivered.is_some())
            .field("on_presence", &self.on_presence.is_some())
            .field("on_connection_state", &self.on_connection_state.is_some())
            .finish()
    }
}
