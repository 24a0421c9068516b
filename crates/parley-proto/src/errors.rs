//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input was not a JSON object with a string `type` field.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Envelope was well formed but its `type` is not one we understand.
    ///
    /// Receivers ignore these so that newer servers can add frame types.
    #[error("unknown frame type: {0}")]
    UnknownType(String),

    /// Frame type requires a `data` object but none was present.
    #[error("missing payload for frame type {0}")]
    MissingPayload(&'static str),

    /// `data` did not match the schema for the frame type.
    #[error("malformed {frame_type} payload: {reason}")]
    MalformedPayload {
        /// Wire spelling of the frame type.
        frame_type: &'static str,
        /// Deserializer message.
        reason: String,
    },

    /// Payload could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// Returns true if the frame should be skipped without complaint.
    ///
    /// Unknown types are expected during rolling upgrades; everything else
    /// indicates a broken peer and is worth a warning.
    pub fn is_forward_compatible(&self) -> bool {
        matches!(self, Self::UnknownType(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_type_is_forward_compatible() {
        assert!(ProtocolError::UnknownType("user:away".into()).is_forward_compatible());
        assert!(!ProtocolError::InvalidEnvelope("eof".into()).is_forward_compatible());
        assert!(!ProtocolError::MissingPayload("join").is_forward_compatible());
        assert!(
            !ProtocolError::MalformedPayload { frame_type: "typing", reason: "x".into() }
                .is_forward_compatible()
        );
    }
}
