//! Client
//!
//! Messaging facade for the Parley protocol. Composes the Sans-IO state
//! machines from [`parley_core`] into one API: join and leave rooms, send and
//! edit messages, react, mark read, signal typing, and query the local cache.
//!
//! # Architecture
//!
//! [`Messenger`] follows the same action-based pattern as the core. Public
//! operations and driver inputs (`handle_opened`, `handle_text`, `tick`, ...)
//! update state, invoke the registered [`EventHandlers`], and queue
//! [`ClientAction`]s that the driver drains with
//! [`Messenger::take_actions`].
//!
//! Sends are fire-and-forget: while the connection is not open, outbound
//! frames are dropped rather than queued. Local state (the optimistic cache)
//! is still updated, and subscriptions are replayed when the connection
//! opens. Application frames dropped while offline are not resent.
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::SystemEnv`]: System clock and OS RNG
//! - [`transport::spawn`]: Run a messenger over a WebSocket on a tokio task
//! - [`transport::MessengerHandle`]: Cloneable handle to the running messenger

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod event;
mod messenger;

#[cfg(feature = "transport")]
mod system_env;
#[cfg(feature = "transport")]
pub mod transport;

pub use config::ClientConfig;
pub use error::ClientError;
pub use event::{
    ClientAction, ConnectionStateHandler, DeliveredHandler, EventHandlers, MessageHandler,
    PresenceHandler, ReadReceiptHandler, TypingHandler,
};
pub use messenger::Messenger;
pub use parley_core::{
    ConnectionConfig, ConnectionError, ConnectionState, OnlineStatus, Page, Participant,
    ReconnectPolicy, env::Environment,
};
