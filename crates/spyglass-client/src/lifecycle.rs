//! Pure connection lifecycle: phases, close classification, and the bounded
//! exponential backoff decision. No sockets and no timers, so every retry
//! property is testable without I/O.

use std::time::Duration;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_BASE_MS: u64 = 1_000;
pub const RECONNECT_MAX_MS: u64 = 10_000;

/// Connection phase of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

/// Why the socket went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close code 1000 or a local disconnect. Never retried.
    Normal,
    /// Server-side close with any other code.
    Abnormal(u16),
    /// Socket-level failure: connect error, read error, or EOF without a
    /// close handshake.
    TransportError,
}

/// What the driver should do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Stop,
    Retry { delay: Duration },
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: RECONNECT_BASE_MS,
            max_delay_ms: RECONNECT_MAX_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at the policy maximum.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(10);
        let scaled = self
            .base_delay_ms
            .max(1)
            .saturating_mul(1_u64 << exponent);
        Duration::from_millis(scaled.min(self.max_delay_ms.max(self.base_delay_ms.max(1))))
    }
}

/// Lifecycle state machine for one feed subscription.
#[derive(Debug, Clone, Copy)]
pub struct FeedLifecycle {
    policy: ReconnectPolicy,
    phase: ConnectionPhase,
    attempts: u32,
}

impl FeedLifecycle {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            phase: ConnectionPhase::Disconnected,
            attempts: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn mark_connecting(&mut self) {
        self.phase = ConnectionPhase::Connecting;
    }

    /// A socket opened. Every successful open resets the attempt counter.
    pub fn mark_open(&mut self) {
        self.phase = ConnectionPhase::Connected;
        self.attempts = 0;
    }

    /// The socket closed; decide whether to retry.
    #[must_use]
    pub fn mark_closed(&mut self, reason: CloseReason) -> RetryDecision {
        if reason == CloseReason::Normal {
            self.phase = ConnectionPhase::Disconnected;
            self.attempts = 0;
            return RetryDecision::Stop;
        }
        if self.attempts >= self.policy.max_attempts {
            self.phase = ConnectionPhase::Error;
            return RetryDecision::GiveUp;
        }
        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        self.phase = ConnectionPhase::Connecting;
        RetryDecision::Retry { delay }
    }

    pub fn reset(&mut self) {
        self.phase = ConnectionPhase::Disconnected;
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delays_double_and_cap_at_ten_seconds() {
        let mut lifecycle = FeedLifecycle::new(ReconnectPolicy::default());
        let expected_ms = [1_000, 2_000, 4_000, 8_000, 10_000];

        for (attempt, expected) in expected_ms.iter().enumerate() {
            let decision = lifecycle.mark_closed(CloseReason::TransportError);
            match decision {
                RetryDecision::Retry { delay } => {
                    assert_eq!(
                        delay.as_millis() as u64,
                        *expected,
                        "attempt {attempt} delay"
                    );
                }
                other => panic!("attempt {attempt}: expected retry, got {other:?}"),
            }
            assert_eq!(lifecycle.phase(), ConnectionPhase::Connecting);
        }
    }

    #[test]
    fn successful_open_resets_attempt_counter() {
        let mut lifecycle = FeedLifecycle::new(ReconnectPolicy::default());
        let _ = lifecycle.mark_closed(CloseReason::Abnormal(1006));
        let _ = lifecycle.mark_closed(CloseReason::Abnormal(1006));
        assert_eq!(lifecycle.attempts(), 2);

        lifecycle.mark_open();
        assert_eq!(lifecycle.attempts(), 0);
        assert_eq!(lifecycle.phase(), ConnectionPhase::Connected);

        // The backoff schedule starts over after a fresh open.
        let decision = lifecycle.mark_closed(CloseReason::TransportError);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: Duration::from_millis(1_000)
            }
        );
    }

    #[test]
    fn normal_close_never_retries() {
        let mut lifecycle = FeedLifecycle::new(ReconnectPolicy::default());
        let _ = lifecycle.mark_closed(CloseReason::TransportError);

        let decision = lifecycle.mark_closed(CloseReason::Normal);
        assert_eq!(decision, RetryDecision::Stop);
        assert_eq!(lifecycle.phase(), ConnectionPhase::Disconnected);
        assert_eq!(lifecycle.attempts(), 0);
    }

    #[test]
    fn gives_up_after_five_consecutive_abnormal_closes() {
        let mut lifecycle = FeedLifecycle::new(ReconnectPolicy::default());
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            let decision = lifecycle.mark_closed(CloseReason::Abnormal(1001));
            assert!(
                matches!(decision, RetryDecision::Retry { .. }),
                "attempt {attempt} should still retry"
            );
        }

        let decision = lifecycle.mark_closed(CloseReason::Abnormal(1001));
        assert_eq!(decision, RetryDecision::GiveUp);
        assert_eq!(lifecycle.phase(), ConnectionPhase::Error);

        // Terminal but recoverable: a reset (fresh connect) leaves Error.
        lifecycle.reset();
        assert_eq!(lifecycle.phase(), ConnectionPhase::Disconnected);
        assert_eq!(lifecycle.attempts(), 0);
    }

    #[test]
    fn tiny_policies_stay_within_bounds() {
        let policy = ReconnectPolicy {
            max_attempts: 2,
            base_delay_ms: 10,
            max_delay_ms: 25,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for(2), Duration::from_millis(25));
        assert_eq!(policy.delay_for(63), Duration::from_millis(25));
    }

    #[test]
    fn phase_labels_are_stable() {
        assert_eq!(ConnectionPhase::Disconnected.as_str(), "disconnected");
        assert_eq!(ConnectionPhase::Connecting.as_str(), "connecting");
        assert_eq!(ConnectionPhase::Connected.as_str(), "connected");
        assert_eq!(ConnectionPhase::Error.as_str(), "error");
    }
}
