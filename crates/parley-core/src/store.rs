//! Local message cache.
//!
//! Messages are kept per room in arrival order (oldest first) with an id
//! index across rooms. The store is the only place a cached [`Message`] is
//! mutated; everything else goes through [`MessageStore::update`].
//!
//! # Invariants
//!
//! - A message id appears at most once across all rooms
//! - Entries are never reordered or individually removed; soft deletion
//!   keeps the id and position
//! - Reads never mutate

use std::collections::HashMap;

use parley_proto::{
    MessageId, RoomId, UserId,
    payloads::{Message, Reaction},
};

/// Field-wise patch merged into a cached message.
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    /// New `delivered` flag.
    pub delivered: Option<bool>,
    /// New `read` flag.
    pub read: Option<bool>,
    /// Participant to add to `readBy`.
    pub read_by: Option<UserId>,
    /// Replacement content.
    pub content: Option<String>,
    /// New `edited` flag.
    pub edited: Option<bool>,
    /// Soft-deletion time.
    pub deleted_at: Option<u64>,
    /// Replacement reaction list.
    pub reactions: Option<Vec<Reaction>>,
}

impl MessagePatch {
    /// Mark delivered.
    pub fn delivered() -> Self {
        Self { delivered: Some(true), ..Self::default() }
    }

    /// Mark read by `user_id`. Read implies delivered.
    pub fn read_by(user_id: impl Into<UserId>) -> Self {
        Self {
            delivered: Some(true),
            read: Some(true),
            read_by: Some(user_id.into()),
            ..Self::default()
        }
    }

    fn apply(self, message: &mut Message) -> bool {
        let before = message.clone();

        if let Some(delivered) = self.delivered {
            message.delivered = delivered;
        }
        if let Some(read) = self.read {
            message.read = read;
        }
        if let Some(user_id) = self.read_by
            && !message.is_read_by(&user_id)
        {
            message.read_by.push(user_id);
        }
        if let Some(content) = self.content {
            message.content = content;
        }
        if let Some(edited) = self.edited {
            message.edited = edited;
        }
        if let Some(deleted_at) = self.deleted_at {
            message.deleted_at = Some(deleted_at);
        }
        if let Some(reactions) = self.reactions {
            message.reactions = reactions;
        }

        *message != before
    }
}

/// Page of a room's history, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum entries returned.
    pub limit: usize,
    /// Entries skipped from the oldest end.
    pub offset: usize,
}

impl Page {
    /// First `limit` messages.
    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

/// Ordered, deduplicated per-room message cache.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    rooms: HashMap<RoomId, Vec<Message>>,
    index: HashMap<MessageId, (RoomId, usize)>,
}

impl MessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its room unless the id is already cached.
    ///
    /// Returns `true` if the message was inserted.
    pub fn append(&mut self, message: Message) -> bool {
        if self.index.contains_key(&message.id) {
            return false;
        }

        let room = self.rooms.entry(message.room_id.clone()).or_default();
        self.index.insert(message.id.clone(), (message.room_id.clone(), room.len()));
        room.push(message);
        true
    }

    /// Merge `patch` into the cached message `id`.
    ///
    /// Returns the updated message only if it exists and something changed.
    /// Unknown ids are a no-op.
    pub fn update(&mut self, id: &str, patch: MessagePatch) -> Option<&Message> {
        let (room_id, pos) = self.index.get(id)?;
        let message = self.rooms.get_mut(room_id)?.get_mut(*pos)?;
        if patch.apply(message) { Some(message) } else { None }
    }

    /// Cached message by id.
    pub fn get(&self, id: &str) -> Option<&Message> {
        let (room_id, pos) = self.index.get(id)?;
        self.rooms.get(room_id)?.get(*pos)
    }

    /// True if `id` is cached.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Full history of `room_id`, oldest first. Empty for unknown rooms.
    pub fn history(&self, room_id: &str) -> &[Message] {
        self.rooms.get(room_id).map_or(&[], Vec::as_slice)
    }

    /// Slice of `room_id`'s history, oldest first.
    pub fn page(&self, room_id: &str, page: Page) -> &[Message] {
        let history = self.history(room_id);
        let start = page.offset.min(history.len());
        let end = start.saturating_add(page.limit).min(history.len());
        &history[start..end]
    }

    /// Case-insensitive substring search over non-deleted content.
    ///
    /// Restricted to `room_id` when given. Results are in history order.
    pub fn search(&self, query: &str, room_id: Option<&str>) -> Vec<&Message> {
        let needle = query.to_lowercase();
        let matches = |m: &&Message| !m.is_deleted() && m.content.to_lowercase().contains(&needle);

        match room_id {
            Some(room) => self.history(room).iter().filter(matches).collect(),
            None => {
                let mut rooms: Vec<_> = self.rooms.keys().collect();
                rooms.sort();
                rooms.into_iter().flat_map(|r| self.history(r).iter().filter(matches)).collect()
            },
        }
    }

    /// Ids of every message in `room_id`, oldest first.
    pub fn ids(&self, room_id: &str) -> Vec<MessageId> {
        self.history(room_id).iter().map(|m| m.id.clone()).collect()
    }

    /// Rooms with at least one cached message.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    /// Total cached messages.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Drop every room's cache.
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::payloads::{MessageKind, Role};

    use super::*;

    fn message(id: &str, room: &str, content: &str) -> Message {
        Message {
            id: id.into(),
            room_id: room.into(),
            sender_id: "user-2".into(),
            sender_name: "Jane".into(),
            sender_role: Role::from("staff"),
            content: content.into(),
            kind: MessageKind::Text,
            attachments: Vec::new(),
            reply_to: None,
            timestamp: 0,
            read: false,
            delivered: false,
            read_by: Vec::new(),
            edited: false,
            deleted_at: None,
            reactions: Vec::new(),
        }
    }

    #[test]
    fn append_is_idempotent_and_keeps_order() {
        let mut store = MessageStore::new();
        assert!(store.append(message("m1", "r", "one")));
        assert!(store.append(message("m2", "r", "two")));
        assert!(!store.append(message("m1", "r", "one again")));

        let contents: Vec<_> = store.history("r").iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_id_in_other_room_is_rejected() {
        let mut store = MessageStore::new();
        store.append(message("m1", "r1", "one"));

        assert!(!store.append(message("m1", "r2", "one")));
        assert!(store.history("r2").is_empty());
    }

    #[test]
    fn update_merges_and_reports_changes() {
        let mut store = MessageStore::new();
        store.append(message("m1", "r", "one"));

        let updated = store.update("m1", MessagePatch::delivered()).cloned();
        assert_eq!(updated.map(|m| m.delivered), Some(true));

        // Same patch again changes nothing
        assert!(store.update("m1", MessagePatch::delivered()).is_none());
        assert!(store.get("m1").is_some_and(|m| m.delivered));
    }

    #[test]
    fn read_patch_implies_delivered_and_dedups_readers() {
        let mut store = MessageStore::new();
        store.append(message("m1", "r", "one"));

        store.update("m1", MessagePatch::read_by("user-1"));
        store.update("m1", MessagePatch::read_by("user-1"));

        let m = store.get("m1").unwrap();
        assert!(m.read && m.delivered);
        assert_eq!(m.read_by, ["user-1"]);
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let mut store = MessageStore::new();
        assert!(store.update("missing", MessagePatch::delivered()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn page_slices_oldest_first() {
        let mut store = MessageStore::new();
        for i in 0..5 {
            store.append(message(&format!("m{i}"), "r", &format!("{i}")));
        }

        let ids = |page: &[Message]| page.iter().map(|m| m.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(store.page("r", Page::first(2))), ["m0", "m1"]);
        assert_eq!(ids(store.page("r", Page { limit: 2, offset: 4 })), ["m4"]);
        assert!(store.page("r", Page { limit: 2, offset: 9 }).is_empty());
        assert!(store.page("nope", Page::first(10)).is_empty());
    }

    #[test]
    fn search_is_case_insensitive_and_skips_deleted() {
        let mut store = MessageStore::new();
        store.append(message("m1", "r1", "Hello there"));
        store.append(message("m2", "r2", "say HELLO"));
        store.append(message("m3", "r1", "hello, deleted"));
        store.update("m3", MessagePatch { deleted_at: Some(1), ..MessagePatch::default() });

        let all: Vec<_> = store.search("hello", None).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(all, ["m1", "m2"]);

        let r2: Vec<_> = store.search("hello", Some("r2")).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(r2, ["m2"]);
    }

    #[test]
    fn clear_wipes_all_rooms() {
        let mut store = MessageStore::new();
        store.append(message("m1", "r1", "a"));
        store.append(message("m2", "r2", "b"));

        store.clear();
        store.clear();

        assert!(store.history("r1").is_empty());
        assert!(store.history("r2").is_empty());
        assert!(!store.contains("m1"));
        assert!(store.append(message("m1", "r1", "a")));
    }
}
