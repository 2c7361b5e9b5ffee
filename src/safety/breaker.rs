//! Per-tier circuit breaker over a rolling outcome window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::SafetyConfig;

/// Breaker state. `Open` carries the end of its cool-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { until: Instant },
    /// Cool-down elapsed; one trial attempt decides.
    HalfOpen,
}

/// Serializable view of [`CircuitState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// Trip thresholds for one breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerSettings {
    pub max_consecutive_failures: u32,
    pub failure_rate_threshold: f64,
    pub min_samples: usize,
    pub window_size: usize,
    pub cooldown: Duration,
}

impl From<&SafetyConfig> for BreakerSettings {
    fn from(config: &SafetyConfig) -> Self {
        Self {
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            failure_rate_threshold: config.failure_rate_threshold,
            min_samples: config.min_samples,
            window_size: config.window_size.max(1),
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&SafetyConfig::default())
    }
}

/// Rolling health for one tier.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    state: CircuitState,
    consecutive_failures: u32,
    /// `true` for a success.
    window: VecDeque<bool>,
    trips: u64,
    /// Admission time of a half-open trial that has not reported yet.
    trial_started: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            window: VecDeque::with_capacity(settings.window_size),
            trips: 0,
            trial_started: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// State as seen at `now`: an expired open circuit reads as half-open.
    #[must_use]
    pub fn status(&self, now: Instant) -> CircuitStatus {
        match self.state {
            CircuitState::Closed => CircuitStatus::Closed,
            CircuitState::Open { until } if now < until => CircuitStatus::Open,
            CircuitState::Open { .. } | CircuitState::HalfOpen => CircuitStatus::HalfOpen,
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    #[must_use]
    pub fn trips(&self) -> u64 {
        self.trips
    }

    /// Time left on an open circuit's cool-down.
    #[must_use]
    pub fn remaining_cooldown(&self, now: Instant) -> Option<Duration> {
        match self.state {
            CircuitState::Open { until } if now < until => Some(until - now),
            _ => None,
        }
    }

    /// Failures over outcomes in the window; zero when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|ok| !**ok).count();
        failures as f64 / self.window.len() as f64
    }

    /// Whether an attempt may run at `now`. Moves an expired open circuit to
    /// half-open and admits a single trial until its outcome is recorded.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => self.start_trial(now),
            CircuitState::Open { until } if now >= until => {
                self.transition(CircuitState::HalfOpen);
                self.start_trial(now)
            }
            CircuitState::Open { .. } => false,
        }
    }

    /// A trial that never reports (its caller was dropped) is abandoned
    /// after one cool-down.
    fn start_trial(&mut self, now: Instant) -> bool {
        match self.trial_started {
            Some(started) if now < started + self.settings.cooldown => false,
            _ => {
                self.trial_started = Some(now);
                true
            }
        }
    }

    /// Release a pending half-open trial without recording an outcome.
    pub fn record_neutral(&mut self) {
        self.trial_started = None;
    }

    pub fn record_success(&mut self) {
        self.trial_started = None;
        if self.state == CircuitState::HalfOpen {
            self.transition(CircuitState::Closed);
            self.consecutive_failures = 0;
            self.window.clear();
            return;
        }
        self.consecutive_failures = 0;
        self.push(true);
    }

    /// Record a hard failure. Returns `true` if this trips the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.trial_started = None;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.push(false);
        match self.state {
            CircuitState::HalfOpen => {
                self.trip(now);
                true
            }
            CircuitState::Closed if self.should_trip() => {
                self.trip(now);
                true
            }
            _ => false,
        }
    }

    /// Record a latency overrun. Enters the window as a failure and leaves
    /// the consecutive count alone. Returns `true` if this trips the breaker.
    pub fn record_soft_failure(&mut self, now: Instant) -> bool {
        self.trial_started = None;
        self.push(false);
        if self.state == CircuitState::Closed && self.rate_exceeded() {
            self.trip(now);
            return true;
        }
        false
    }

    /// Close the circuit and forget all history except the trip count.
    pub fn reset(&mut self) {
        self.trial_started = None;
        self.transition(CircuitState::Closed);
        self.consecutive_failures = 0;
        self.window.clear();
    }

    fn should_trip(&self) -> bool {
        self.consecutive_failures >= self.settings.max_consecutive_failures || self.rate_exceeded()
    }

    fn rate_exceeded(&self) -> bool {
        self.window.len() >= self.settings.min_samples
            && self.failure_rate() > self.settings.failure_rate_threshold
    }

    fn trip(&mut self, now: Instant) {
        self.trips = self.trips.saturating_add(1);
        self.transition(CircuitState::Open {
            until: now + self.settings.cooldown,
        });
    }

    fn push(&mut self, ok: bool) {
        if self.window.len() == self.settings.window_size {
            self.window.pop_front();
        }
        self.window.push_back(ok);
    }

    fn transition(&mut self, next: CircuitState) {
        tracing::debug!(from = ?self.state, to = ?next, "Circuit transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(BreakerSettings {
            max_consecutive_failures: 3,
            failure_rate_threshold: 0.5,
            min_samples: 4,
            window_size: 6,
            cooldown: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_trips_on_consecutive_failures() {
        let mut b = breaker();
        let now = Instant::now();
        assert!(!b.record_failure(now));
        assert!(!b.record_failure(now));
        assert!(b.record_failure(now));
        assert_eq!(b.status(now), CircuitStatus::Open);
        assert!(!b.admit(now));
        assert_eq!(b.trips(), 1);
    }

    #[test]
    fn test_success_resets_consecutive_count() {
        let mut b = breaker();
        let now = Instant::now();
        b.record_failure(now);
        b.record_failure(now);
        b.record_success();
        assert_eq!(b.consecutive_failures(), 0);
        b.record_success();
        b.record_success();
        // 3 of 6 failed: at the rate threshold, not above it.
        assert!(!b.record_failure(now));
        assert_eq!(b.consecutive_failures(), 1);
        assert_eq!(b.status(now), CircuitStatus::Closed);
    }

    #[test]
    fn test_rate_trip_without_consecutive_run() {
        let mut b = breaker();
        let now = Instant::now();
        b.record_failure(now);
        b.record_failure(now);
        b.record_success();
        // 3 of 4 failed with only one consecutive failure.
        assert!(b.record_failure(now));
        assert_eq!(b.consecutive_failures(), 1);
        assert_eq!(b.status(now), CircuitStatus::Open);
    }

    #[test]
    fn test_half_open_admits_one_trial() {
        let mut b = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            b.record_failure(now);
        }
        let later = now + Duration::from_secs(61);
        let admitted: Vec<bool> = (0..5).map(|_| b.admit(later)).collect();
        assert_eq!(admitted, vec![true, false, false, false, false]);

        b.record_soft_failure(later);
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(b.admit(later));
        assert!(!b.admit(later));
        b.record_success();
        assert!(b.admit(later));
        assert!(b.admit(later));
    }

    #[test]
    fn test_half_open_trial_released_by_neutral_or_abandonment() {
        let mut b = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            b.record_failure(now);
        }
        let later = now + Duration::from_secs(61);
        assert!(b.admit(later));
        b.record_neutral();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(b.admit(later));

        assert!(!b.admit(later + Duration::from_secs(59)));
        assert!(b.admit(later + Duration::from_secs(60)));
    }

    #[test]
    fn test_rate_trip_needs_min_samples() {
        let mut b = breaker();
        let now = Instant::now();
        // 2 failures in 3 outcomes is above the rate but below min samples.
        b.record_failure(now);
        b.record_success();
        assert!(!b.record_failure(now));
        // Fourth outcome: 3 of 4 failed.
        assert!(b.record_soft_failure(now));
        assert_eq!(b.consecutive_failures(), 1);
    }

    #[test]
    fn test_soft_failure_keeps_consecutive_count() {
        let mut b = breaker();
        let now = Instant::now();
        b.record_failure(now);
        b.record_soft_failure(now);
        assert_eq!(b.consecutive_failures(), 1);
        assert_eq!(b.window_len(), 2);
    }

    #[test]
    fn test_half_open_after_cooldown_then_success_closes() {
        let mut b = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            b.record_failure(now);
        }
        let later = now + Duration::from_secs(61);
        assert_eq!(b.status(later), CircuitStatus::HalfOpen);
        assert!(b.admit(later));
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.record_success();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.window_len(), 0);
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let mut b = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            b.record_failure(now);
        }
        let later = now + Duration::from_secs(61);
        assert!(b.admit(later));
        assert!(b.record_failure(later));
        assert_eq!(b.status(later), CircuitStatus::Open);
        assert_eq!(
            b.remaining_cooldown(later),
            Some(Duration::from_secs(60))
        );
        assert_eq!(b.trips(), 2);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut b = breaker();
        for _ in 0..20 {
            b.record_success();
        }
        assert_eq!(b.window_len(), 6);
        assert!(b.failure_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_closes() {
        let mut b = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            b.record_failure(now);
        }
        b.reset();
        assert!(b.admit(now));
        assert_eq!(b.status(now), CircuitStatus::Closed);
    }
}
