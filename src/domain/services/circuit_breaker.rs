//! Circuit breaker transition function
//!
//! Pure: the next state depends only on (state, event, now) and the policy.
//! Cooldown expiry is evaluated lazily when a `Poll` event is applied at
//! selection time, so no background timer exists.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{BreakerEvent, BreakerState, CircuitState};

/// Thresholds and cooldown bounds for the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Cooldown applied the first time a circuit opens
    pub base_cooldown: Duration,
    /// Upper bound for the exponential backoff
    pub max_cooldown: Duration,
    /// How long a half-open trial may stay unreported
    pub trial_timeout: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            base_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(600),
            trial_timeout: Duration::from_secs(30),
        }
    }
}

impl BreakerPolicy {
    /// Cooldown for the n-th opening (1-based): `base * 2^(n-1)`, capped
    pub fn cooldown_for(&self, times_opened: u32) -> Duration {
        let exponent = times_opened.saturating_sub(1).min(31);
        self.base_cooldown
            .saturating_mul(1u32 << exponent)
            .min(self.max_cooldown)
    }
}

/// Result of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: BreakerState,
    /// Set when this event opened (or re-opened) the circuit
    pub opened_for: Option<Duration>,
}

/// Apply `event` to `state` at time `now`
pub fn transition(
    state: BreakerState,
    event: BreakerEvent,
    now: DateTime<Utc>,
    policy: &BreakerPolicy,
) -> Transition {
    let mut next = state;
    let mut opened_for = None;

    match event {
        BreakerEvent::Poll => {
            // The trial holder went away without reporting: count it as a
            // failure at the moment the trial expired
            if let Some(expired_at) = state.trial_expires_at.filter(|at| now >= *at) {
                next.consecutive_failures = state.consecutive_failures.saturating_add(1);
                opened_for = Some(open(&mut next, expired_at, policy));
            }
            if next.circuit == CircuitState::Open && cooldown_elapsed(&next, now) {
                next.circuit = CircuitState::HalfOpen;
                next.trial_expires_at = None;
            }
        }
        BreakerEvent::TrialStarted => {
            if state.circuit == CircuitState::HalfOpen {
                next.trial_expires_at = Some(now + to_chrono(policy.trial_timeout));
            }
        }
        BreakerEvent::Success => {
            next = BreakerState::default();
        }
        BreakerEvent::Failure(kind) => {
            next.consecutive_failures = state.consecutive_failures.saturating_add(1);
            let should_open = match state.circuit {
                // The trial failed: reopen with a longer cooldown
                CircuitState::HalfOpen => true,
                CircuitState::Closed => {
                    next.consecutive_failures >= policy.failure_threshold.max(1)
                        || kind.trips_immediately()
                }
                // Late report from a call issued before the circuit opened
                CircuitState::Open => false,
            };

            if should_open {
                opened_for = Some(open(&mut next, now, policy));
            }
        }
    }

    Transition { next, opened_for }
}

/// Open the circuit for the next backoff step; returns the cooldown applied
fn open(state: &mut BreakerState, now: DateTime<Utc>, policy: &BreakerPolicy) -> Duration {
    state.times_opened = state.times_opened.saturating_add(1);
    let cooldown = policy.cooldown_for(state.times_opened);
    state.circuit = CircuitState::Open;
    state.cooldown_until = Some(now + to_chrono(cooldown));
    state.trial_expires_at = None;
    cooldown
}

fn cooldown_elapsed(state: &BreakerState, now: DateTime<Utc>) -> bool {
    state.cooldown_until.map_or(true, |deadline| now >= deadline)
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::FailureKind;

    fn policy() -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: 3,
            base_cooldown: Duration::from_secs(10),
            max_cooldown: Duration::from_secs(60),
            trial_timeout: Duration::from_secs(5),
        }
    }

    fn poll(state: BreakerState, now: DateTime<Utc>) -> Transition {
        transition(state, BreakerEvent::Poll, now, &policy())
    }

    fn fail(state: BreakerState, kind: FailureKind, now: DateTime<Utc>) -> Transition {
        transition(state, BreakerEvent::Failure(kind), now, &policy())
    }

    #[test]
    fn test_opens_after_threshold_consecutive_failures() {
        let now = Utc::now();
        let mut state = BreakerState::default();
        for _ in 0..2 {
            let t = fail(state, FailureKind::Transport, now);
            assert_eq!(t.next.circuit, CircuitState::Closed);
            assert!(t.opened_for.is_none());
            state = t.next;
        }
        let t = fail(state, FailureKind::Transport, now);
        assert_eq!(t.next.circuit, CircuitState::Open);
        assert_eq!(t.opened_for, Some(Duration::from_secs(10)));
        assert_eq!(t.next.cooldown_until, Some(now + chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_rate_limit_trips_immediately() {
        let t = fail(BreakerState::default(), FailureKind::RateLimited, Utc::now());
        assert_eq!(t.next.circuit, CircuitState::Open);
        assert_eq!(t.next.times_opened, 1);
    }

    #[test]
    fn test_poll_promotes_only_after_deadline() {
        let now = Utc::now();
        let mut state = BreakerState::default();
        for _ in 0..3 {
            state = fail(state, FailureKind::Timeout, now).next;
        }

        let early = poll(state, now + chrono::Duration::seconds(9));
        assert_eq!(early.next.circuit, CircuitState::Open);

        let late = poll(state, now + chrono::Duration::seconds(10));
        assert_eq!(late.next.circuit, CircuitState::HalfOpen);
        assert!(late.next.is_selectable());
    }

    #[test]
    fn test_failed_trial_reopens_with_longer_cooldown() {
        let now = Utc::now();
        let mut state = BreakerState::default();
        for _ in 0..3 {
            state = fail(state, FailureKind::Transport, now).next;
        }
        let later = now + chrono::Duration::seconds(11);
        state = poll(state, later).next;
        state = transition(state, BreakerEvent::TrialStarted, later, &policy()).next;
        assert!(!state.is_selectable());

        let t = fail(state, FailureKind::Transport, later);
        assert_eq!(t.next.circuit, CircuitState::Open);
        assert_eq!(t.opened_for, Some(Duration::from_secs(20)));
        assert_eq!(t.next.times_opened, 2);
    }

    #[test]
    fn test_unreported_trial_reopens_after_trial_timeout() {
        let now = Utc::now();
        let mut state = BreakerState::default();
        for _ in 0..3 {
            state = fail(state, FailureKind::Transport, now).next;
        }
        let later = now + chrono::Duration::seconds(11);
        state = poll(state, later).next;
        state = transition(state, BreakerEvent::TrialStarted, later, &policy()).next;

        let pending = poll(state, later + chrono::Duration::seconds(4));
        assert_eq!(pending.next, state);
        assert!(pending.opened_for.is_none());

        let expired = poll(state, later + chrono::Duration::seconds(5));
        assert_eq!(expired.next.circuit, CircuitState::Open);
        assert_eq!(expired.opened_for, Some(Duration::from_secs(20)));
        assert_eq!(expired.next.times_opened, 2);
        assert!(expired.next.trial_expires_at.is_none());

        // The reopened circuit gets a fresh trial once its cooldown passes
        let retry = poll(expired.next, later + chrono::Duration::seconds(25));
        assert!(retry.next.is_selectable());

        // Polling long after expiry reopens and promotes in one step
        let much_later = poll(state, later + chrono::Duration::days(365));
        assert_eq!(much_later.next.circuit, CircuitState::HalfOpen);
        assert!(much_later.next.is_selectable());
        assert_eq!(much_later.next.times_opened, 2);
        assert_eq!(much_later.opened_for, Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_success_resets_everything() {
        let now = Utc::now();
        let mut state = BreakerState::default();
        for _ in 0..3 {
            state = fail(state, FailureKind::Transport, now).next;
        }
        let t = transition(state, BreakerEvent::Success, now, &policy());
        assert_eq!(t.next, BreakerState::default());
    }

    #[test]
    fn test_late_failure_on_open_circuit_keeps_deadline() {
        let now = Utc::now();
        let opened = fail(BreakerState::default(), FailureKind::Auth, now).next;
        let t = fail(opened, FailureKind::Transport, now + chrono::Duration::seconds(5));
        assert_eq!(t.next.cooldown_until, opened.cooldown_until);
        assert!(t.opened_for.is_none());
    }

    #[test]
    fn test_cooldown_is_capped() {
        let p = policy();
        assert_eq!(p.cooldown_for(1), Duration::from_secs(10));
        assert_eq!(p.cooldown_for(3), Duration::from_secs(40));
        assert_eq!(p.cooldown_for(4), Duration::from_secs(60));
        assert_eq!(p.cooldown_for(40), Duration::from_secs(60));
    }
}
