//! Typing indicators and online presence.
//!
//! Two halves with different lifetimes:
//!
//! - Self typing: one debounce timer per room. `send(true)` arms (or re-arms)
//!   the room's timer, `send(false)` cancels it, and `tick` fires the
//!   automatic `isTyping: false` exactly once per expired timer. Typing in one
//!   room never disturbs another room's timer.
//! - Remote typing: a projection of the latest inbound indicator per
//!   `(room, user)`. Entries are removed only by an explicit `isTyping: false`
//!   unless a remote expiry is configured.
//!
//! Presence (`user:online` / `user:offline`) is tracked alongside, keyed by
//! user.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    time::Duration,
};

use parley_proto::{Frame, RoomId, UserId, payloads::TypingIndicator};

use crate::registry::Participant;

/// Inactivity before the self-typing signal is withdrawn automatically.
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_millis(3000);

/// Online status of a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineStatus {
    /// Participant.
    pub user_id: UserId,
    /// Currently connected.
    pub online: bool,
    /// Unix milliseconds last seen, when reported on going offline.
    pub last_seen: Option<u64>,
}

#[derive(Debug, Clone)]
struct SelfTyping<I> {
    stop: TypingIndicator,
    armed_at: I,
}

#[derive(Debug, Clone)]
struct RemoteTyping<I> {
    indicator: TypingIndicator,
    seen_at: I,
}

/// Self-typing timer, remote typists, and presence.
#[derive(Debug, Clone)]
pub struct TypingTracker<I> {
    timeout: Duration,
    remote_expiry: Option<Duration>,
    pending: BTreeMap<RoomId, SelfTyping<I>>,
    remote: HashMap<RoomId, Vec<RemoteTyping<I>>>,
    presence: HashMap<UserId, OnlineStatus>,
}

impl<I> TypingTracker<I>
where
    I: Copy + Ord + fmt::Debug + std::ops::Sub<Output = Duration>,
{
    /// Create a tracker.
    ///
    /// `remote_expiry` of `None` keeps remote indicators until the sender
    /// withdraws them.
    pub fn new(timeout: Duration, remote_expiry: Option<Duration>) -> Self {
        Self {
            timeout,
            remote_expiry,
            pending: BTreeMap::new(),
            remote: HashMap::new(),
            presence: HashMap::new(),
        }
    }

    /// Build the outbound indicator and update the self timer.
    ///
    /// `true` arms the room's timer, replacing any pending one for that room.
    /// `false` cancels it.
    pub fn send(&mut self, room_id: &str, who: &Participant, is_typing: bool, now: I) -> Frame {
        let indicator = TypingIndicator {
            room_id: room_id.to_owned(),
            user_id: who.user_id.clone(),
            user_name: who.user_name.clone(),
            is_typing,
        };

        if is_typing {
            let stop = TypingIndicator { is_typing: false, ..indicator.clone() };
            self.pending.insert(indicator.room_id.clone(), SelfTyping { stop, armed_at: now });
        } else {
            self.pending.remove(room_id);
        }

        Frame::Typing(indicator)
    }

    /// Fire every self-typing expiry that is due, in room order. Returns the
    /// `isTyping: false` frames.
    pub fn tick(&mut self, now: I) -> Vec<Frame> {
        if let Some(expiry) = self.remote_expiry {
            for typists in self.remote.values_mut() {
                typists.retain(|t| now - t.seen_at < expiry);
            }
            self.remote.retain(|_, typists| !typists.is_empty());
        }

        let timeout = self.timeout;
        let due: Vec<RoomId> = self
            .pending
            .iter()
            .filter(|(_, p)| now - p.armed_at >= timeout)
            .map(|(room, _)| room.clone())
            .collect();

        due.iter()
            .filter_map(|room| self.pending.remove(room))
            .map(|p| Frame::Typing(p.stop))
            .collect()
    }

    /// Cancel the self timer for `room_id`. No frame is sent.
    pub fn cancel_for_room(&mut self, room_id: &str) -> bool {
        self.pending.remove(room_id).is_some()
    }

    /// Rooms with an armed self timer, in room order.
    pub fn pending_rooms(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    /// Fold an inbound indicator into the remote projection.
    ///
    /// An update moves the typist to the end of the room's list.
    pub fn apply_remote(&mut self, indicator: &TypingIndicator, now: I) {
        let typists = self.remote.entry(indicator.room_id.clone()).or_default();
        typists.retain(|t| t.indicator.user_id != indicator.user_id);

        if indicator.is_typing {
            typists.push(RemoteTyping { indicator: indicator.clone(), seen_at: now });
        } else if typists.is_empty() {
            self.remote.remove(&indicator.room_id);
        }
    }

    /// Remote participants currently typing in `room_id`, oldest first.
    pub fn typists(&self, room_id: &str) -> Vec<&TypingIndicator> {
        self.remote
            .get(room_id)
            .map(|typists| typists.iter().map(|t| &t.indicator).collect())
            .unwrap_or_default()
    }

    /// Human-readable summary of who is typing in `room_id`.
    ///
    /// Empty when nobody is typing.
    pub fn typing_text(&self, room_id: &str) -> String {
        match self.typists(room_id).as_slice() {
            [] => String::new(),
            [one] => format!("{} is typing...", one.user_name),
            [first, second] => {
                format!("{} and {} are typing...", first.user_name, second.user_name)
            },
            many => format!("{} people are typing...", many.len()),
        }
    }

    /// Record an online/offline notification.
    pub fn set_presence(&mut self, status: OnlineStatus) {
        self.presence.insert(status.user_id.clone(), status);
    }

    /// Last known status of `user_id`.
    pub fn presence(&self, user_id: &str) -> Option<&OnlineStatus> {
        self.presence.get(user_id)
    }

    /// Drop all state and cancel every self timer.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.remote.clear();
        self.presence.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> Participant {
        Participant::new("user-1", "John", "patient")
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn remote(room: &str, user: &str, name: &str, is_typing: bool) -> TypingIndicator {
        TypingIndicator {
            room_id: room.into(),
            user_id: user.into(),
            user_name: name.into(),
            is_typing,
        }
    }

    fn tracker() -> TypingTracker<Duration> {
        TypingTracker::new(DEFAULT_TYPING_TIMEOUT, None)
    }

    #[test]
    fn self_typing_expires_once() {
        let mut t = tracker();
        t.send("room-1", &me(), true, ms(0));

        assert!(t.tick(ms(2_999)).is_empty());
        let frames = t.tick(ms(3_000));
        assert_eq!(frames, [Frame::Typing(remote("room-1", "user-1", "John", false))]);
        assert!(t.tick(ms(10_000)).is_empty());
    }

    #[test]
    fn restart_debounces_instead_of_stacking() {
        let mut t = tracker();
        t.send("room-1", &me(), true, ms(0));
        t.send("room-1", &me(), true, ms(2_999));

        assert!(t.tick(ms(3_000)).is_empty());
        assert!(t.tick(ms(5_998)).is_empty());
        assert_eq!(t.tick(ms(5_999)).len(), 1);
        assert!(t.tick(ms(9_000)).is_empty());
    }

    #[test]
    fn explicit_stop_cancels_timer() {
        let mut t = tracker();
        t.send("room-1", &me(), true, ms(0));
        let frame = t.send("room-1", &me(), false, ms(1_000));

        assert_eq!(frame, Frame::Typing(remote("room-1", "user-1", "John", false)));
        assert!(t.tick(ms(5_000)).is_empty());
    }

    #[test]
    fn cancel_for_other_room_keeps_timer() {
        let mut t = tracker();
        t.send("room-1", &me(), true, ms(0));

        assert!(!t.cancel_for_room("room-2"));
        assert_eq!(t.pending_rooms().collect::<Vec<_>>(), ["room-1"]);
        assert!(t.cancel_for_room("room-1"));
        assert!(t.tick(ms(3_000)).is_empty());
    }

    #[test]
    fn each_room_keeps_its_own_timer() {
        let mut t = tracker();
        t.send("conv-1", &me(), true, ms(0));
        t.send("conv-2", &me(), true, ms(1_000));
        t.send("conv-2", &me(), true, ms(1_500));

        assert_eq!(t.pending_rooms().collect::<Vec<_>>(), ["conv-1", "conv-2"]);
        assert_eq!(t.tick(ms(3_000)), [Frame::Typing(remote("conv-1", "user-1", "John", false))]);
        assert!(t.tick(ms(4_499)).is_empty());
        assert_eq!(t.tick(ms(4_500)), [Frame::Typing(remote("conv-2", "user-1", "John", false))]);
        assert!(t.tick(ms(10_000)).is_empty());
    }

    #[test]
    fn rooms_due_together_each_stop_once() {
        let mut t = tracker();
        t.send("conv-2", &me(), true, ms(0));
        t.send("conv-1", &me(), true, ms(0));

        let rooms: Vec<_> = t
            .tick(ms(10_000))
            .into_iter()
            .filter_map(|f| match f {
                Frame::Typing(i) if !i.is_typing => Some(i.room_id),
                _ => None,
            })
            .collect();
        assert_eq!(rooms, ["conv-1", "conv-2"]);
        assert!(t.tick(ms(20_000)).is_empty());
    }

    #[test]
    fn typing_text_for_zero_to_many() {
        let mut t = tracker();
        assert_eq!(t.typing_text("r"), "");

        t.apply_remote(&remote("r", "a", "Alice", true), ms(0));
        assert_eq!(t.typing_text("r"), "Alice is typing...");

        t.apply_remote(&remote("r", "b", "Bob", true), ms(0));
        assert_eq!(t.typing_text("r"), "Alice and Bob are typing...");

        t.apply_remote(&remote("r", "c", "Carol", true), ms(0));
        assert_eq!(t.typing_text("r"), "3 people are typing...");

        t.apply_remote(&remote("r", "a", "Alice", false), ms(0));
        assert_eq!(t.typing_text("r"), "Bob and Carol are typing...");
    }

    #[test]
    fn update_moves_typist_to_end() {
        let mut t = tracker();
        t.apply_remote(&remote("r", "a", "Alice", true), ms(0));
        t.apply_remote(&remote("r", "b", "Bob", true), ms(0));
        t.apply_remote(&remote("r", "a", "Alice", true), ms(1));

        assert_eq!(t.typing_text("r"), "Bob and Alice are typing...");
    }

    #[test]
    fn remote_entries_do_not_expire_by_default() {
        let mut t = tracker();
        t.apply_remote(&remote("r", "a", "Alice", true), ms(0));
        t.tick(ms(3_600_000));

        assert_eq!(t.typists("r").len(), 1);
    }

    #[test]
    fn remote_expiry_is_opt_in() {
        let mut t = TypingTracker::new(DEFAULT_TYPING_TIMEOUT, Some(ms(3_000)));
        t.apply_remote(&remote("r", "a", "Alice", true), ms(0));
        t.apply_remote(&remote("r", "b", "Bob", true), ms(2_000));

        t.tick(ms(3_000));
        assert_eq!(t.typing_text("r"), "Bob is typing...");
        t.tick(ms(5_000));
        assert_eq!(t.typing_text("r"), "");
    }

    #[test]
    fn rooms_are_isolated() {
        let mut t = tracker();
        t.apply_remote(&remote("r1", "a", "Alice", true), ms(0));

        assert_eq!(t.typing_text("r2"), "");
        t.apply_remote(&remote("r2", "a", "Alice", false), ms(0));
        assert_eq!(t.typing_text("r1"), "Alice is typing...");
    }

    #[test]
    fn presence_tracks_latest_status() {
        let mut t = tracker();
        t.set_presence(OnlineStatus { user_id: "a".into(), online: true, last_seen: None });
        t.set_presence(OnlineStatus { user_id: "a".into(), online: false, last_seen: Some(9) });

        assert_eq!(t.presence("a").map(|s| s.online), Some(false));
        assert_eq!(t.presence("b"), None);
    }
}
