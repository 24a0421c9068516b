//! Delivery and receipt reconciliation.
//!
//! Maps inbound wire events (and the local mark-read action) onto
//! [`MessageStore`] mutations and reports what happened as [`Reconciled`]
//! items for the facade to fan out.
//!
//! Receipt state is monotonic: `sent → delivered → read`. A read receipt sets
//! `delivered` too, so a lost or late `delivered` frame never leaves a message
//! read-but-undelivered.

use parley_proto::{
    Frame, MessageId, UserId,
    payloads::{
        ConversationRead, Delivered, Message, MessageDelete, MessageEdit, Reaction, ReactionRemove,
        ReactionUpdate, ReadReceipt,
    },
};
use tracing::debug;

use crate::store::{MessagePatch, MessageStore};

/// Outcome of reconciling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Send this frame to the server.
    Send(Frame),
    /// First sighting of a message.
    NewMessage(Message),
    /// A cached message's mutable state changed.
    Updated(Message),
    /// A delivery confirmation arrived.
    Delivered(MessageId),
    /// A read receipt arrived.
    ReadReceipt(ReadReceipt),
}

/// Applies receipts and updates for one local participant.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    local_user: UserId,
}

impl Reconciler {
    /// Create a reconciler for `local_user`.
    pub fn new(local_user: impl Into<UserId>) -> Self {
        Self { local_user: local_user.into() }
    }

    /// Local participant.
    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    /// Change the local participant.
    pub fn set_local_user(&mut self, local_user: impl Into<UserId>) {
        self.local_user = local_user.into();
    }

    /// Inbound `message`.
    ///
    /// Messages from other participants are cached undelivered, confirmed
    /// with exactly one `delivered` frame per arrival, then marked delivered.
    /// Read state claimed by the sender is dropped. Our own messages are never
    /// confirmed; one sent from another session is cached and surfaced, an
    /// echo of one already cached is ignored.
    pub fn on_message(&self, store: &mut MessageStore, mut message: Message) -> Vec<Reconciled> {
        if message.sender_id == self.local_user {
            if store.append(message.clone()) {
                return vec![Reconciled::NewMessage(message)];
            }
            debug!(message_id = %message.id, "own message echo ignored");
            return Vec::new();
        }

        message.delivered = false;
        message.read = false;
        message.read_by.clear();

        let id = message.id.clone();
        let inserted = store.append(message);
        let mut out = vec![Reconciled::Send(Frame::Delivered(Delivered { message_id: id.clone() }))];

        if inserted {
            store.update(&id, MessagePatch::delivered());
            if let Some(cached) = store.get(&id) {
                out.push(Reconciled::NewMessage(cached.clone()));
            }
        } else {
            debug!(message_id = %id, "duplicate message, confirming again");
        }
        out
    }

    /// Inbound `delivered`.
    pub fn on_delivered(&self, store: &mut MessageStore, delivered: Delivered) -> Vec<Reconciled> {
        let mut out = Vec::new();
        if let Some(updated) = store.update(&delivered.message_id, MessagePatch::delivered()) {
            out.push(Reconciled::Updated(updated.clone()));
        }
        out.push(Reconciled::Delivered(delivered.message_id));
        out
    }

    /// Inbound `read_receipt`. Sets `delivered` as well as `read`.
    pub fn on_read_receipt(&self, store: &mut MessageStore, receipt: ReadReceipt) -> Vec<Reconciled> {
        let mut out = Vec::new();
        if let Some(updated) =
            store.update(&receipt.message_id, MessagePatch::read_by(receipt.user_id.clone()))
        {
            out.push(Reconciled::Updated(updated.clone()));
        }
        out.push(Reconciled::ReadReceipt(receipt));
        out
    }

    /// Inbound `conversation:read`: `user_id` read everything in the room.
    pub fn on_conversation_read(
        &self,
        store: &mut MessageStore,
        read: &ConversationRead,
    ) -> Vec<Reconciled> {
        let mut out = Vec::new();
        for id in store.ids(&read.conversation_id) {
            if store.get(&id).is_some_and(|m| m.sender_id == read.user_id) {
                continue;
            }
            if let Some(updated) = store.update(&id, MessagePatch::read_by(read.user_id.clone())) {
                out.push(Reconciled::Updated(updated.clone()));
            }
        }
        out
    }

    /// Local mark-as-read.
    ///
    /// Always emits the `read_receipt`; updates the cached copy if present.
    pub fn mark_as_read(
        &self,
        store: &mut MessageStore,
        message_id: &str,
        read_at: u64,
    ) -> Vec<Reconciled> {
        let receipt = ReadReceipt {
            message_id: message_id.to_owned(),
            user_id: self.local_user.clone(),
            read_at,
        };
        let mut out = vec![Reconciled::Send(Frame::ReadReceipt(receipt))];
        if let Some(updated) = store.update(message_id, MessagePatch::read_by(self.local_user.clone())) {
            out.push(Reconciled::Updated(updated.clone()));
        }
        out
    }

    /// Replace content. No-op for unknown or deleted messages.
    pub fn apply_edit(&self, store: &mut MessageStore, edit: MessageEdit) -> Option<Message> {
        if store.get(&edit.message_id).is_none_or(Message::is_deleted) {
            return None;
        }
        let patch = MessagePatch { content: Some(edit.content), edited: Some(true), ..MessagePatch::default() };
        store.update(&edit.message_id, patch).cloned()
    }

    /// Soft-delete: clear content, keep id and position.
    pub fn apply_delete(
        &self,
        store: &mut MessageStore,
        delete: &MessageDelete,
        deleted_at: u64,
    ) -> Option<Message> {
        if store.get(&delete.message_id).is_none_or(Message::is_deleted) {
            return None;
        }
        let patch = MessagePatch {
            content: Some(String::new()),
            deleted_at: Some(deleted_at),
            ..MessagePatch::default()
        };
        store.update(&delete.message_id, patch).cloned()
    }

    /// Set a participant's reaction, replacing any previous one.
    pub fn apply_reaction(
        &self,
        store: &mut MessageStore,
        update: ReactionUpdate,
        created_at: u64,
    ) -> Option<Message> {
        let message = store.get(&update.message_id).filter(|m| !m.is_deleted())?;

        let mut reactions: Vec<Reaction> =
            message.reactions.iter().filter(|r| r.user_id != update.user_id).cloned().collect();
        reactions.push(Reaction {
            emoji: update.emoji,
            user_id: update.user_id,
            user_name: update.user_name,
            created_at,
        });

        let patch = MessagePatch { reactions: Some(reactions), ..MessagePatch::default() };
        store.update(&update.message_id, patch).cloned()
    }

    /// Remove a participant's reaction. Deleted messages are left alone.
    pub fn apply_reaction_remove(
        &self,
        store: &mut MessageStore,
        remove: &ReactionRemove,
    ) -> Option<Message> {
        let message = store.get(&remove.message_id).filter(|m| !m.is_deleted())?;
        if !message.reactions.iter().any(|r| r.user_id == remove.user_id) {
            return None;
        }

        let reactions =
            message.reactions.iter().filter(|r| r.user_id != remove.user_id).cloned().collect();
        let patch = MessagePatch { reactions: Some(reactions), ..MessagePatch::default() };
        store.update(&remove.message_id, patch).cloned()
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::payloads::{MessageKind, Role};

    use super::*;

    fn message(id: &str, sender: &str) -> Message {
        Message {
            id: id.into(),
            room_id: "room-123".into(),
            sender_id: sender.into(),
            sender_name: "Someone".into(),
            sender_role: Role::default(),
            content: "hi".into(),
            kind: MessageKind::Text,
            attachments: Vec::new(),
            reply_to: None,
            timestamp: 1,
            read: false,
            delivered: false,
            read_by: Vec::new(),
            edited: false,
            deleted_at: None,
            reactions: Vec::new(),
        }
    }

    fn sends(out: &[Reconciled]) -> Vec<&Frame> {
        out.iter()
            .filter_map(|r| match r {
                Reconciled::Send(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn inbound_message_is_confirmed_once() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();

        let out = rec.on_message(&mut store, message("X", "user-2"));

        assert_eq!(sends(&out), [&Frame::Delivered(Delivered { message_id: "X".into() })]);
        assert!(matches!(&out[1], Reconciled::NewMessage(m) if m.id == "X" && m.delivered && !m.read));
    }

    #[test]
    fn inbound_flags_from_sender_are_reset() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        let mut m = message("X", "user-2");
        m.read = true;
        m.read_by = vec!["user-3".into()];

        rec.on_message(&mut store, m);

        let cached = store.get("X").unwrap();
        assert!(!cached.read);
        assert!(cached.read_by.is_empty());
    }

    #[test]
    fn duplicate_inbound_reconfirms_without_new_event() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        rec.on_message(&mut store, message("X", "user-2"));

        let out = rec.on_message(&mut store, message("X", "user-2"));

        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Reconciled::Send(Frame::Delivered(_))));
        assert_eq!(store.history("room-123").len(), 1);
    }

    #[test]
    fn own_echo_is_not_confirmed() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        store.append(message("X", "user-1"));

        assert!(rec.on_message(&mut store, message("X", "user-1")).is_empty());
    }

    #[test]
    fn own_message_from_another_session_is_surfaced_unconfirmed() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();

        let out = rec.on_message(&mut store, message("Y", "user-1"));

        assert!(sends(&out).is_empty());
        assert!(matches!(&out[..], [Reconciled::NewMessage(m)] if m.id == "Y"));
        assert!(store.get("Y").is_some());
    }

    #[test]
    fn read_receipt_implies_delivered() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        store.append(message("X", "user-1"));

        let receipt = ReadReceipt { message_id: "X".into(), user_id: "user-2".into(), read_at: 5 };
        let out = rec.on_read_receipt(&mut store, receipt.clone());

        let cached = store.get("X").unwrap();
        assert!(cached.delivered && cached.read);
        assert_eq!(cached.read_by, ["user-2"]);
        assert_eq!(out.last(), Some(&Reconciled::ReadReceipt(receipt)));
    }

    #[test]
    fn receipts_for_unknown_ids_still_surface() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();

        let out = rec.on_delivered(&mut store, Delivered { message_id: "gone".into() });
        assert_eq!(out, [Reconciled::Delivered("gone".into())]);
    }

    #[test]
    fn delivered_after_read_keeps_read() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        store.append(message("X", "user-1"));
        rec.on_read_receipt(&mut store, ReadReceipt {
            message_id: "X".into(),
            user_id: "user-2".into(),
            read_at: 5,
        });

        let out = rec.on_delivered(&mut store, Delivered { message_id: "X".into() });

        assert_eq!(out, [Reconciled::Delivered("X".into())]);
        assert!(store.get("X").unwrap().read);
    }

    #[test]
    fn mark_as_read_sends_even_when_unknown() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();

        let out = rec.mark_as_read(&mut store, "missing", 42);

        insta::assert_snapshot!(
            sends(&out)[0].encode().unwrap(),
            @r#"{"type":"read_receipt","data":{"messageId":"missing","userId":"user-1","readAt":42}}"#
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn mark_as_read_updates_local_copy() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        rec.on_message(&mut store, message("X", "user-2"));

        let out = rec.mark_as_read(&mut store, "X", 42);

        assert!(matches!(&out[1], Reconciled::Updated(m) if m.read && m.is_read_by("user-1")));
    }

    #[test]
    fn conversation_read_skips_readers_own_messages() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        store.append(message("a", "user-1"));
        store.append(message("b", "user-2"));

        let read = ConversationRead { conversation_id: "room-123".into(), user_id: "user-2".into() };
        let out = rec.on_conversation_read(&mut store, &read);

        assert_eq!(out.len(), 1);
        assert!(store.get("a").unwrap().read);
        assert!(!store.get("b").unwrap().read);
    }

    #[test]
    fn edit_and_delete() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        store.append(message("X", "user-1"));

        let edited = rec.apply_edit(&mut store, MessageEdit { message_id: "X".into(), content: "fixed".into() });
        assert!(edited.is_some_and(|m| m.edited && m.content == "fixed"));

        let deleted = rec.apply_delete(&mut store, &MessageDelete { message_id: "X".into() }, 9);
        assert!(deleted.is_some_and(|m| m.content.is_empty() && m.deleted_at == Some(9)));

        // Deleted messages can no longer be edited or deleted again
        assert!(rec.apply_edit(&mut store, MessageEdit { message_id: "X".into(), content: "x".into() }).is_none());
        assert!(rec.apply_delete(&mut store, &MessageDelete { message_id: "X".into() }, 10).is_none());
        assert_eq!(store.history("room-123").len(), 1);
    }

    #[test]
    fn one_reaction_per_user() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        store.append(message("X", "user-2"));

        let react = |emoji: &str| ReactionUpdate {
            message_id: "X".into(),
            emoji: emoji.into(),
            user_id: "user-1".into(),
            user_name: "John".into(),
        };
        rec.apply_reaction(&mut store, react("👍"), 1);
        let updated = rec.apply_reaction(&mut store, react("❤️"), 2).unwrap();

        assert_eq!(updated.reactions.len(), 1);
        assert_eq!(updated.reactions[0].emoji, "❤️");

        let remove = ReactionRemove { message_id: "X".into(), user_id: "user-1".into() };
        assert!(rec.apply_reaction_remove(&mut store, &remove).is_some_and(|m| m.reactions.is_empty()));
        assert!(rec.apply_reaction_remove(&mut store, &remove).is_none());
    }

    #[test]
    fn reactions_on_deleted_messages_are_frozen() {
        let rec = Reconciler::new("user-1");
        let mut store = MessageStore::new();
        store.append(message("X", "user-2"));
        rec.apply_reaction(
            &mut store,
            ReactionUpdate {
                message_id: "X".into(),
                emoji: "👍".into(),
                user_id: "user-1".into(),
                user_name: "John".into(),
            },
            1,
        );
        let delete = MessageDelete { message_id: "X".into() };
        rec.apply_delete(&mut store, &delete, 2);

        let remove = ReactionRemove { message_id: "X".into(), user_id: "user-1".into() };
        assert!(rec.apply_reaction_remove(&mut store, &remove).is_none());
        assert_eq!(store.get("X").unwrap().reactions.len(), 1);
    }
}
