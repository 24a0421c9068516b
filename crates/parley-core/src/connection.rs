//! Transport connection state machine.
//!
//! Owns the lifecycle of the one logical connection a client keeps to the
//! messaging server: connect, reconnect with bounded exponential backoff,
//! heartbeat, and optional idle timeout. Uses the action pattern: methods take
//! time (or an [`Environment`] for backoff jitter) and return actions for the
//! driver to execute. The socket itself lives in the driver.
//!
//! # State Machine
//!
//! ```text
//!                 connect()               opened()
//! ┌──────────────┐ ───────> ┌────────────┐ ──────> ┌──────┐
//! │ Disconnected │          │ Connecting │         │ Open │
//! └──────────────┘ <─┐      └────────────┘ <──┐    └──────┘
//!        ↑           │ exhausted   │ failed   │ retry due │ lost / idle
//!        │           │             ↓          │           ↓
//!        │           └──────── ┌──────────────┐ <─────────┘
//!        │                     │ Reconnecting │
//!        │                     └──────────────┘
//!        │ close() from any state
//!        ↓
//!   ┌────────┐
//!   │ Closed │  terminal
//!   └────────┘
//! ```
//!
//! # Invariants
//!
//! - At most one socket attempt is in flight: `connect()` while `Connecting`
//!   or `Open` is a no-op
//! - At most one retry deadline is armed, and only while `Reconnecting`
//! - `retry_count` resets to zero on every successful open
//! - Every successful open emits [`ConnectionAction::Resubscribe`] so the
//!   server-side membership is rebuilt

use std::{fmt, time::Duration};

use parley_proto::Frame;
use tracing::{debug, info, warn};

use crate::{env::Environment, error::ConnectionError};

/// Interval between `ping` frames while open.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Delay before the first reconnect attempt.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the exponential part of the reconnect delay.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Reconnect attempts before settling in `Disconnected`.
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Upper bound on the random jitter added to each reconnect delay.
pub const DEFAULT_RECONNECT_JITTER: Duration = Duration::from_secs(1);

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a new socket to the server.
    Open,

    /// Send this frame over the open socket.
    SendFrame(Frame),

    /// Close the socket.
    Close {
        /// Reason for closing
        reason: String,
    },

    /// Connection (re)opened: resend every active subscription.
    Resubscribe,

    /// Observable state changed.
    StateChanged(ConnectionState),
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket and no retry pending.
    Disconnected,
    /// Socket attempt in flight.
    Connecting,
    /// Socket open; frames may be sent.
    Open,
    /// Socket lost; waiting for the backoff deadline.
    Reconnecting,
    /// Closed by the owner. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Bounded exponential backoff with additive jitter.
///
/// Attempt `n` (zero-based) waits `min(max_delay, base_delay * 2^n)` plus a
/// uniformly random duration in `[0, jitter)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Cap on the exponential component.
    pub max_delay: Duration,
    /// Attempts allowed per outage. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Upper bound on the jitter. Zero disables jitter.
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            max_attempts: Some(DEFAULT_RECONNECT_MAX_ATTEMPTS),
            jitter: DEFAULT_RECONNECT_JITTER,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reconnects automatically.
    pub fn disabled() -> Self {
        Self { max_attempts: Some(0), ..Self::default() }
    }

    /// Whether attempt number `attempt` (zero-based) is allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    /// Delay before attempt `attempt`, using `entropy` for the jitter.
    pub fn delay(&self, attempt: u32, entropy: u64) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);

        let jitter_nanos = self.jitter.as_nanos() as u64;
        if jitter_nanos == 0 {
            return backoff;
        }
        backoff.saturating_add(Duration::from_nanos(entropy % jitter_nanos))
    }
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Interval between heartbeats while open.
    pub heartbeat_interval: Duration,
    /// Treat this much silence from the server as a lost connection.
    pub idle_timeout: Option<Duration>,
    /// Reconnect behaviour after an abnormal close.
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            idle_timeout: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRetry<I> {
    armed_at: I,
    delay: Duration,
}

/// Transport connection state machine.
///
/// Pure state: no I/O. Generic over the instant type so virtual time can be
/// used in tests.
#[derive(Debug, Clone)]
pub struct Connection<I> {
    state: ConnectionState,
    config: ConnectionConfig,
    retry_count: u32,
    last_error: Option<ConnectionError>,
    retry: Option<PendingRetry<I>>,
    last_activity: Option<I>,
    last_heartbeat: Option<I>,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + fmt::Debug + std::ops::Sub<Output = Duration>,
{
    /// Create a connection in [`ConnectionState::Disconnected`].
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            retry_count: 0,
            last_error: None,
            retry: None,
            last_activity: None,
            last_heartbeat: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Failed attempts in the current outage.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Most recent failure. Cleared on successful open.
    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    /// True if frames can be sent.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Active configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Start a socket attempt.
    ///
    /// No-op while `Connecting` or `Open`, and after [`Self::close`]. From
    /// `Reconnecting` the backoff wait is skipped.
    pub fn connect(&mut self, _now: I) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                debug!(state = %self.state, "connect ignored, attempt already active");
                Vec::new()
            },
            ConnectionState::Closed => {
                debug!("connect ignored, connection closed");
                Vec::new()
            },
            ConnectionState::Disconnected => {
                self.retry_count = 0;
                self.begin_attempt()
            },
            ConnectionState::Reconnecting => {
                self.retry = None;
                self.begin_attempt()
            },
        }
    }

    /// Driver reports the socket opened.
    pub fn opened(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            debug!(state = %self.state, "stale open ignored");
            return Vec::new();
        }

        info!(retries = self.retry_count, "connection open");
        self.state = ConnectionState::Open;
        self.retry_count = 0;
        self.last_error = None;
        self.retry = None;
        self.last_activity = Some(now);
        self.last_heartbeat = Some(now);

        vec![ConnectionAction::StateChanged(ConnectionState::Open), ConnectionAction::Resubscribe]
    }

    /// Driver reports the socket attempt failed.
    pub fn connect_failed<E>(&mut self, env: &E, reason: impl Into<String>) -> Vec<ConnectionAction>
    where
        E: Environment<Instant = I>,
    {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.schedule_retry(env, ConnectionError::ConnectFailed(reason.into()))
    }

    /// Driver reports the socket closed without us asking.
    pub fn closed<E>(&mut self, env: &E, reason: impl Into<String>) -> Vec<ConnectionAction>
    where
        E: Environment<Instant = I>,
    {
        match self.state {
            ConnectionState::Open => self.schedule_retry(env, ConnectionError::Lost(reason.into())),
            ConnectionState::Connecting => {
                self.schedule_retry(env, ConnectionError::ConnectFailed(reason.into()))
            },
            ConnectionState::Disconnected
            | ConnectionState::Reconnecting
            | ConnectionState::Closed => Vec::new(),
        }
    }

    /// Mark inbound activity.
    pub fn record_activity(&mut self, now: I) {
        if self.state == ConnectionState::Open {
            self.last_activity = Some(now);
        }
    }

    /// Process periodic maintenance: retry deadline, idle timeout, heartbeat.
    pub fn tick<E>(&mut self, env: &E) -> Vec<ConnectionAction>
    where
        E: Environment<Instant = I>,
    {
        let now = env.now();

        match self.state {
            ConnectionState::Reconnecting => {
                let due = self.retry.is_some_and(|r| now - r.armed_at >= r.delay);
                if due {
                    self.retry = None;
                    return self.begin_attempt();
                }
                Vec::new()
            },
            ConnectionState::Open => {
                if let (Some(timeout), Some(last)) = (self.config.idle_timeout, self.last_activity) {
                    let elapsed = now - last;
                    if elapsed >= timeout {
                        let mut actions = vec![ConnectionAction::Close {
                            reason: format!("idle timeout after {elapsed:?}"),
                        }];
                        actions
                            .extend(self.schedule_retry(env, ConnectionError::IdleTimeout { elapsed }));
                        return actions;
                    }
                }

                let should_send = self
                    .last_heartbeat
                    .is_none_or(|last| now - last >= self.config.heartbeat_interval);
                if should_send {
                    self.last_heartbeat = Some(now);
                    return vec![ConnectionAction::SendFrame(Frame::Ping)];
                }
                Vec::new()
            },
            ConnectionState::Disconnected
            | ConnectionState::Connecting
            | ConnectionState::Closed => Vec::new(),
        }
    }

    /// Close permanently. Cancels any pending retry. Idempotent.
    pub fn close(&mut self, reason: impl Into<String>) -> Vec<ConnectionAction> {
        let previous = self.state;
        if previous == ConnectionState::Closed {
            return Vec::new();
        }

        self.state = ConnectionState::Closed;
        self.retry = None;

        let mut actions = Vec::new();
        if matches!(previous, ConnectionState::Connecting | ConnectionState::Open) {
            actions.push(ConnectionAction::Close { reason: reason.into() });
        }
        actions.push(ConnectionAction::StateChanged(ConnectionState::Closed));
        actions
    }

    fn begin_attempt(&mut self) -> Vec<ConnectionAction> {
        debug!(attempt = self.retry_count, "opening connection");
        self.state = ConnectionState::Connecting;
        vec![ConnectionAction::StateChanged(ConnectionState::Connecting), ConnectionAction::Open]
    }

    fn schedule_retry<E>(&mut self, env: &E, error: ConnectionError) -> Vec<ConnectionAction>
    where
        E: Environment<Instant = I>,
    {
        self.last_activity = None;
        self.last_heartbeat = None;

        if !self.config.reconnect.allows(self.retry_count) {
            warn!(attempts = self.retry_count, %error, "reconnect attempts exhausted");
            self.last_error = Some(ConnectionError::ReconnectExhausted { attempts: self.retry_count });
            self.retry = None;
            self.state = ConnectionState::Disconnected;
            return vec![ConnectionAction::StateChanged(ConnectionState::Disconnected)];
        }

        let delay = self.config.reconnect.delay(self.retry_count, env.random_u64());
        info!(attempt = self.retry_count + 1, ?delay, %error, "scheduling reconnect");

        self.last_error = Some(error);
        self.retry_count += 1;
        self.retry = Some(PendingRetry { armed_at: env.now(), delay });
        self.state = ConnectionState::Reconnecting;
        vec![ConnectionAction::StateChanged(ConnectionState::Reconnecting)]
    }
}
