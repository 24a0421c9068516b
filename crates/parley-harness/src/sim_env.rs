//! Simulated environment with a virtual clock and seeded RNG.
//!
//! Time only moves when the test calls [`SimEnv::advance`] or awaits
//! [`Environment::sleep`]. Clones share one clock and one RNG, so every
//! messenger in a cluster sees the same time and the random sequence depends
//! only on the seed and call order.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use parley_core::env::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Unix milliseconds at virtual time zero (2023-11-14T22:13:20Z).
pub const WALL_CLOCK_BASE: u64 = 1_700_000_000_000;

/// Seed used by [`SimEnv::new`].
pub const DEFAULT_SEED: u64 = 0;

struct SimState {
    now: Duration,
    rng: ChaCha8Rng,
}

/// Deterministic [`Environment`] for tests.
#[derive(Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Environment at virtual time zero with the default seed.
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Environment at virtual time zero with the given RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                now: Duration::ZERO,
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.now = state.now.saturating_add(duration);
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.lock().now
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("now", &self.elapsed()).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        self.lock().now
    }

    fn wall_clock_millis(&self) -> u64 {
        WALL_CLOCK_BASE + self.lock().now.as_millis() as u64
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let env = self.clone();
        async move { env.advance(duration) }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.lock().rng.fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        env.advance(Duration::from_millis(1500));

        assert_eq!(other.now(), Duration::from_millis(1500));
        assert_eq!(other.wall_clock_millis(), WALL_CLOCK_BASE + 1500);
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = SimEnv::with_seed(7);
        let b = SimEnv::with_seed(7);
        let c = SimEnv::with_seed(8);

        let seq_a: Vec<_> = (0..4).map(|_| a.random_u64()).collect();
        let seq_b: Vec<_> = (0..4).map(|_| b.random_u64()).collect();
        let seq_c: Vec<_> = (0..4).map(|_| c.random_u64()).collect();

        assert_eq!(seq_a, seq_b);
        assert_ne!(seq_a, seq_c);
    }
}
