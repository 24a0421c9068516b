//! Parley wire protocol.
//!
//! Every frame on the wire is a JSON text message shaped as
//! `{"type": string, "data": object}`. The `type` string selects the payload
//! schema; `data` is omitted for payload-less frames such as `ping`.
//!
//! # Components
//!
//! - [`Frame`]: Typed frame with one variant per wire `type`
//! - [`FrameType`]: The `type` discriminator and its wire spelling
//! - [`payloads`]: Payload structs (`camelCase` on the wire)
//! - [`ProtocolError`]: Envelope and payload decoding failures
//!
//! Field names are bit-exact with the existing server: the payload structs
//! serialize their fields in declaration order, and the envelope always writes
//! `type` before `data`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::{Frame, FrameType};
pub use payloads::{MessageId, RoomId, UserId};
