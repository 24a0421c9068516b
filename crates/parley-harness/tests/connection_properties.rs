//! Connection lifecycle under virtual time.

use std::time::Duration;

use parley_core::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, ReconnectPolicy,
    env::Environment,
};
use parley_harness::SimEnv;
use proptest::prelude::*;

/// Drive one outage where every attempt fails, returning the virtual time
/// at which each attempt started.
fn failing_outage(seed: u64, policy: ReconnectPolicy) -> (Vec<Duration>, Connection<Duration>) {
    let env = SimEnv::with_seed(seed);
    let config = ConnectionConfig { reconnect: policy, ..ConnectionConfig::default() };
    let mut conn = Connection::new(config);

    conn.connect(env.now());
    conn.opened(env.now());
    conn.closed(&env, "reset by peer");

    let mut attempts = Vec::new();
    for _ in 0..10_000 {
        if conn.state() != ConnectionState::Reconnecting {
            break;
        }
        env.advance(Duration::from_millis(10));
        let actions = conn.tick(&env);
        if actions.contains(&ConnectionAction::Open) {
            attempts.push(env.now());
            conn.connect_failed(&env, "refused");
        }
    }
    (attempts, conn)
}

#[test]
fn same_seed_same_schedule() {
    let (a, _) = failing_outage(9, ReconnectPolicy::default());
    let (b, _) = failing_outage(9, ReconnectPolicy::default());
    assert_eq!(a, b);
    assert_eq!(a.len(), 5);
}

#[test]
fn prop_backoff_stays_within_bounds() {
    proptest!(|(seed in any::<u64>())| {
        let policy = ReconnectPolicy::default();
        let (attempts, conn) = failing_outage(seed, policy.clone());

        prop_assert_eq!(attempts.len(), 5);
        prop_assert_eq!(conn.state(), ConnectionState::Disconnected);

        let mut previous = Duration::ZERO;
        for (n, at) in attempts.iter().enumerate() {
            let waited = *at - previous;
            let floor = policy.base_delay.saturating_mul(1u32 << n).min(policy.max_delay);
            let ceiling = floor + policy.jitter + Duration::from_millis(10);
            prop_assert!(waited >= floor, "attempt {} waited {:?} < {:?}", n, waited, floor);
            prop_assert!(waited <= ceiling, "attempt {} waited {:?} > {:?}", n, waited, ceiling);
            previous = *at;
        }
    });
}

#[test]
fn unlimited_policy_keeps_retrying() {
    let policy = ReconnectPolicy {
        max_attempts: None,
        max_delay: Duration::from_secs(2),
        ..ReconnectPolicy::default()
    };
    let env = SimEnv::with_seed(1);
    let config = ConnectionConfig { reconnect: policy, ..ConnectionConfig::default() };
    let mut conn = Connection::new(config);
    conn.connect(env.now());
    conn.connect_failed(&env, "refused");

    let mut attempts = 0;
    for _ in 0..6_000 {
        env.advance(Duration::from_millis(10));
        if conn.tick(&env).contains(&ConnectionAction::Open) {
            attempts += 1;
            conn.connect_failed(&env, "refused");
        }
    }

    assert_eq!(conn.state(), ConnectionState::Reconnecting);
    assert!(attempts >= 15, "only {attempts} attempts in 60 s");
}
