//! Parley messaging core.
//!
//! Sans-IO state machines for a real-time chat client. Nothing in this crate
//! owns a socket or a timer: methods take the current time (or read it from an
//! injected [`Environment`]) and return frames or actions for a driver to
//! execute.
//!
//! # Components
//!
//! - [`Connection`]: Transport lifecycle, reconnect backoff, heartbeat
//! - [`SubscriptionRegistry`]: Active rooms and their replay after reconnect
//! - [`TypingTracker`]: Self-typing debounce timer, remote typists, presence
//! - [`MessageStore`]: Ordered, deduplicated per-room message cache
//! - [`Reconciler`]: Maps inbound receipts and updates onto the store
//!
//! The client facade in `parley-client` composes these into one API.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod ids;
pub mod reconciler;
pub mod registry;
pub mod store;
pub mod typing;

pub use connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState, ReconnectPolicy};
pub use env::Environment;
pub use error::ConnectionError;
pub use reconciler::{Reconciled, Reconciler};
pub use registry::{Membership, Participant, SubscriptionRegistry};
pub use store::{MessagePatch, MessageStore, Page};
pub use typing::{OnlineStatus, TypingTracker};
