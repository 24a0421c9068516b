//! Client configuration.

use std::time::Duration;

use parley_core::{ConnectionConfig, typing::DEFAULT_TYPING_TIMEOUT};

/// Page size used when a history query does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Messenger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Transport lifecycle settings.
    pub connection: ConnectionConfig,
    /// Inactivity before our own typing signal is withdrawn.
    pub typing_timeout: Duration,
    /// Drop remote typists not refreshed within this window. `None` keeps
    /// them until the sender withdraws.
    pub remote_typing_expiry: Option<Duration>,
    /// Start connecting as soon as the messenger is created.
    pub auto_connect: bool,
    /// Default page size for history queries.
    pub default_page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            typing_timeout: DEFAULT_TYPING_TIMEOUT,
            remote_typing_expiry: None,
            auto_connect: true,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
