//! Error types for the messaging core.
//!
//! Transport failures never reach callers of send/join: the [`Connection`]
//! records them as `last_error` and turns them into state transitions.
//!
//! [`Connection`]: crate::connection::Connection

use std::time::Duration;

use thiserror::Error;

/// Why the transport connection is not (or is no longer) open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Socket failed to open.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Open socket closed without us asking.
    #[error("connection lost: {0}")]
    Lost(String),

    /// Nothing received from the server for too long.
    #[error("idle timeout after {elapsed:?}")]
    IdleTimeout {
        /// How long the connection was silent.
        elapsed: Duration,
    },

    /// Every reconnect attempt allowed by the policy failed.
    #[error("gave up after {attempts} reconnect attempts")]
    ReconnectExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl ConnectionError {
    /// Returns true if an automatic reconnect may succeed.
    ///
    /// Exhaustion is terminal until the caller explicitly reconnects.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::ReconnectExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        assert!(ConnectionError::ConnectFailed("refused".into()).is_transient());
        assert!(ConnectionError::Lost("reset".into()).is_transient());
        assert!(ConnectionError::IdleTimeout { elapsed: Duration::from_secs(61) }.is_transient());
    }

    #[test]
    fn exhaustion_is_not_transient() {
        assert!(!ConnectionError::ReconnectExhausted { attempts: 5 }.is_transient());
    }
}
