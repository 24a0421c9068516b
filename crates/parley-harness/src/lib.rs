//! Deterministic simulation harness for Parley messaging tests.
//!
//! Virtual-time implementation of the `Environment` trait plus an in-process
//! relay server, so several messengers can talk to each other without
//! sockets or wall-clock waits.
//!
//! - [`SimEnv`]: shared virtual clock and seeded RNG
//! - [`SimServer`]: room membership and frame routing
//! - [`SimCluster`]: drives messengers against the server
//! - [`EventRecorder`]: captures handler invocations for assertions
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties of observable state (no
//! duplicate ids, read implies delivered, active room subscribed) after every
//! step. Use [`InvariantRegistry::standard()`] for the common set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod recorder;
pub mod sim_cluster;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    ActiveRoomSubscribed, ClientSnapshot, Invariant, InvariantRegistry, InvariantResult,
    ReadImpliesDelivered, SystemSnapshot, UniqueMessageIds, Violation,
};
pub use recorder::{Event, EventRecorder};
pub use sim_cluster::{SimClient, SimCluster};
pub use sim_env::SimEnv;
pub use sim_server::{Outbound, SessionId, SimServer};
