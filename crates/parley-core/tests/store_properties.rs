//! Property-based tests for the message store and receipt reconciliation.
//!
//! Inbound traffic is unreliable: duplicates, reordering, and receipts for
//! messages we never saw. These properties must hold for any interleaving.

use parley_core::{MessageStore, Reconciled, Reconciler};
use parley_proto::{
    Frame,
    payloads::{Delivered, Message, MessageKind, ReadReceipt, Role},
};
use proptest::prelude::*;

const LOCAL: &str = "user-1";

#[derive(Debug, Clone)]
enum Event {
    Inbound { id: u8, room: u8 },
    Delivered { id: u8 },
    Read { id: u8 },
}

fn message(id: u8, room: u8) -> Message {
    Message {
        id: format!("msg-{id}"),
        room_id: format!("room-{room}"),
        sender_id: "user-2".into(),
        sender_name: "Jane".into(),
        sender_role: Role::from("staff"),
        content: format!("content {id}"),
        kind: MessageKind::Text,
        attachments: Vec::new(),
        reply_to: None,
        timestamp: u64::from(id),
        read: false,
        delivered: false,
        read_by: Vec::new(),
        edited: false,
        deleted_at: None,
        reactions: Vec::new(),
    }
}

fn arbitrary_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0u8..16, 0u8..3).prop_map(|(id, room)| Event::Inbound { id, room }),
        (0u8..16).prop_map(|id| Event::Delivered { id }),
        (0u8..16).prop_map(|id| Event::Read { id }),
    ]
}

fn apply(rec: &Reconciler, store: &mut MessageStore, event: &Event) -> Vec<Reconciled> {
    match *event {
        Event::Inbound { id, room } => rec.on_message(store, message(id, room)),
        Event::Delivered { id } => {
            rec.on_delivered(store, Delivered { message_id: format!("msg-{id}") })
        },
        Event::Read { id } => rec.on_read_receipt(store, ReadReceipt {
            message_id: format!("msg-{id}"),
            user_id: "user-2".into(),
            read_at: 1,
        }),
    }
}

#[test]
fn prop_append_twice_adds_once() {
    proptest!(|(ids in prop::collection::vec(0u8..32, 1..64))| {
        let mut store = MessageStore::new();
        for &id in &ids {
            store.append(message(id, 0));
            let before = store.history("room-0").len();
            store.append(message(id, 0));
            prop_assert_eq!(store.history("room-0").len(), before);
        }

        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(store.len(), unique.len());
    });
}

#[test]
fn prop_history_keeps_first_arrival_order() {
    proptest!(|(ids in prop::collection::vec(0u8..32, 1..64))| {
        let mut store = MessageStore::new();
        let mut expected: Vec<String> = Vec::new();
        for &id in &ids {
            let msg = message(id, 0);
            if !expected.contains(&msg.id) {
                expected.push(msg.id.clone());
            }
            store.append(msg);
        }

        let actual: Vec<_> = store.history("room-0").iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(actual, expected);
    });
}

#[test]
fn prop_read_implies_delivered() {
    proptest!(|(events in prop::collection::vec(arbitrary_event(), 1..64))| {
        let rec = Reconciler::new(LOCAL);
        let mut store = MessageStore::new();

        for event in &events {
            apply(&rec, &mut store, event);
            for room in 0..3 {
                for m in store.history(&format!("room-{room}")) {
                    prop_assert!(!m.read || m.delivered, "read without delivered: {m:?}");
                }
            }
        }
    });
}

#[test]
fn prop_receipts_are_monotonic() {
    proptest!(|(events in prop::collection::vec(arbitrary_event(), 1..64))| {
        let rec = Reconciler::new(LOCAL);
        let mut store = MessageStore::new();
        let mut seen_read = std::collections::HashSet::new();

        for event in &events {
            apply(&rec, &mut store, event);
            for room in 0..3 {
                for m in store.history(&format!("room-{room}")) {
                    if m.read {
                        seen_read.insert(m.id.clone());
                    }
                    prop_assert!(!seen_read.contains(&m.id) || m.read, "read flag regressed");
                }
            }
        }
    });
}

#[test]
fn prop_each_inbound_message_confirmed_exactly_once_per_arrival() {
    proptest!(|(events in prop::collection::vec(arbitrary_event(), 1..64))| {
        let rec = Reconciler::new(LOCAL);
        let mut store = MessageStore::new();

        for event in &events {
            let out = apply(&rec, &mut store, event);
            let confirmations: Vec<_> = out
                .iter()
                .filter_map(|r| match r {
                    Reconciled::Send(Frame::Delivered(d)) => Some(d.message_id.clone()),
                    _ => None,
                })
                .collect();

            match event {
                Event::Inbound { id, .. } => {
                    prop_assert_eq!(confirmations, vec![format!("msg-{id}")]);
                },
                Event::Delivered { .. } | Event::Read { .. } => prop_assert!(confirmations.is_empty()),
            }
        }
    });
}
