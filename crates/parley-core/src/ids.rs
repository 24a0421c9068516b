//! Client-side identifier generation.
//!
//! Ids have the shape `<prefix>_<unix ms>_<9 base36 chars>`, e.g.
//! `msg_1700000000000_k3j9x0a1b`. The random suffix comes from the
//! environment RNG, so ids are reproducible under simulation.

use crate::env::Environment;

/// Prefix for message ids.
pub const MESSAGE_PREFIX: &str = "msg";

/// Prefix for conversation ids.
pub const CONVERSATION_PREFIX: &str = "conv";

/// Prefix for attachment ids.
pub const ATTACHMENT_PREFIX: &str = "att";

const SUFFIX_LEN: usize = 9;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a new id with the given prefix.
pub fn generate<E: Environment>(env: &E, prefix: &str) -> String {
    let mut entropy = env.random_u64();
    let mut suffix = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        suffix.push(char::from(ALPHABET[(entropy % 36) as usize]));
        entropy /= 36;
    }
    format!("{prefix}_{}_{suffix}", env.wall_clock_millis())
}

/// Generate a message id.
pub fn message_id<E: Environment>(env: &E) -> String {
    generate(env, MESSAGE_PREFIX)
}

/// Generate an attachment id.
pub fn attachment_id<E: Environment>(env: &E) -> String {
    generate(env, ATTACHMENT_PREFIX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[derive(Clone)]
    struct FixedEnv(u8);

    impl Environment for FixedEnv {
        type Instant = Duration;

        fn now(&self) -> Duration {
            Duration::ZERO
        }

        fn wall_clock_millis(&self) -> u64 {
            1_700_000_000_000
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(self.0);
        }
    }

    #[test]
    fn id_shape() {
        let id = message_id(&FixedEnv(0));
        assert_eq!(id, "msg_1700000000000_000000000");

        let id = generate(&FixedEnv(0xff), CONVERSATION_PREFIX);
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts[0], "conv");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn attachment_ids_use_their_own_prefix() {
        assert_eq!(attachment_id(&FixedEnv(0)), "att_1700000000000_000000000");
    }
}
