//! Records messenger events for assertions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parley_client::{ConnectionState, EventHandlers, OnlineStatus};
use parley_proto::{
    MessageId,
    payloads::{Message, ReadReceipt, TypingIndicator},
};

/// One handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `on_message`.
    Message(Message),
    /// `on_message_update`.
    Update(Message),
    /// `on_typing`.
    Typing(TypingIndicator),
    /// `on_read_receipt`.
    ReadReceipt(ReadReceipt),
    /// `on_delivered`.
    Delivered(MessageId),
    /// `on_presence`.
    Presence(OnlineStatus),
    /// `on_connection_state`.
    ConnectionState(ConnectionState),
}

/// Shared event log fed by a full set of [`EventHandlers`].
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers that append every event to this recorder.
    pub fn handlers(&self) -> EventHandlers {
        let on_message = self.sink();
        let on_update = self.sink();
        let on_typing = self.sink();
        let on_receipt = self.sink();
        let on_delivered = self.sink();
        let on_presence = self.sink();
        let on_state = self.sink();

        EventHandlers::new()
            .on_message(move |m| on_message.push(Event::Message(m.clone())))
            .on_message_update(move |m| on_update.push(Event::Update(m.clone())))
            .on_typing(move |t| on_typing.push(Event::Typing(t.clone())))
            .on_read_receipt(move |r| on_receipt.push(Event::ReadReceipt(r.clone())))
            .on_delivered(move |id| on_delivered.push(Event::Delivered(id.to_owned())))
            .on_presence(move |p| on_presence.push(Event::Presence(p.clone())))
            .on_connection_state(move |s| on_state.push(Event::ConnectionState(s)))
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Drain recorded events.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.lock())
    }

    /// Messages passed to `on_message`.
    pub fn messages(&self) -> Vec<Message> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Messages passed to `on_message_update`.
    pub fn updates(&self) -> Vec<Message> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::Update(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Connection states passed to `on_connection_state`.
    pub fn states(&self) -> Vec<ConnectionState> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::ConnectionState(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.lock().iter().filter(|e| predicate(e)).count()
    }

    fn sink(&self) -> Sink {
        Sink(Arc::clone(&self.events))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Sink(Arc<Mutex<Vec<Event>>>);

impl Sink {
    fn push(&self, event: Event) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}
