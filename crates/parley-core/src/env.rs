//! Environment abstraction for deterministic testing.
//!
//! Decouples messaging logic from system resources (time, randomness). The
//! production client reads the system clock and OS entropy; the simulation
//! harness uses a virtual clock and a seeded RNG so timer-driven behaviour
//! (typing expiry, reconnect backoff, heartbeats) replays exactly.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async sleep.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - Given the same seed, a simulated environment yields the same sequence of
///   random values
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    ///
    /// Production uses `std::time::Instant`; simulation uses a virtual instant
    /// advanced explicitly by the test.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current monotonic time. Used for every deadline comparison.
    fn now(&self) -> Self::Instant;

    /// Unix time in milliseconds.
    ///
    /// Only used for values that go on the wire (`timestamp`, `readAt`) and
    /// for id generation. Never used for deadlines.
    fn wall_clock_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; the state machines never do.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
