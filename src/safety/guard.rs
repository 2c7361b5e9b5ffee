//! Process-wide safety state: breakers per tier, latency budgets and the
//! escalation-only switch.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BreakerSettings, CircuitBreaker, CircuitStatus};
use crate::classify::ClassifiedQuery;
use crate::config::SafetyConfig;
use crate::graph::PrerequisiteGraph;
use crate::router::{Router, RoutingDecision, StudentContext, Tier, TierGate, TierOutcome};

#[derive(Debug, Clone, Default)]
struct TierStats {
    breaker: CircuitBreaker,
    attempts: u64,
    successes: u64,
    failures: u64,
    soft_failures: u64,
    skipped: u64,
    last_latency: Option<Duration>,
    opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SafetyState {
    tiers: BTreeMap<Tier, TierStats>,
    escalation_only_since: Option<DateTime<Utc>>,
    last_rollback: Option<DateTime<Utc>>,
    last_reset: Option<DateTime<Utc>>,
}

/// Health of one tier in a [`SafetyReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierHealth {
    pub tier: Tier,
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    pub failure_rate: f64,
    pub window: usize,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub soft_failures: u64,
    pub skipped: u64,
    pub trips: u64,
    pub budget_ms: u64,
    pub last_latency_ms: Option<u64>,
    pub opened_at: Option<DateTime<Utc>>,
    pub retry_in_secs: Option<u64>,
}

/// Serializable snapshot of the safety state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyReport {
    pub escalation_only: bool,
    pub escalation_only_since: Option<DateTime<Utc>>,
    pub last_rollback: Option<DateTime<Utc>>,
    pub last_reset: Option<DateTime<Utc>>,
    pub tiers: Vec<TierHealth>,
}

impl SafetyReport {
    /// Health entry for `tier`.
    #[must_use]
    pub fn tier(&self, tier: Tier) -> Option<&TierHealth> {
        self.tiers.iter().find(|h| h.tier == tier)
    }

    /// Whether every tier's circuit is closed and no rollback is active.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.escalation_only && self.tiers.iter().all(|h| h.status == CircuitStatus::Closed)
    }
}

/// Gate that trips tiers on repeated failure and routes around them.
///
/// One instance per engine; every update takes the state mutex once.
#[derive(Debug)]
pub struct SafetyLayer {
    config: SafetyConfig,
    state: Mutex<SafetyState>,
}

impl Default for SafetyLayer {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}

impl SafetyLayer {
    #[must_use]
    pub fn new(config: SafetyConfig) -> Self {
        let settings = BreakerSettings::from(&config);
        let tiers = Tier::FALLBACK_ORDER
            .iter()
            .map(|tier| {
                (
                    *tier,
                    TierStats {
                        breaker: CircuitBreaker::new(settings),
                        ..TierStats::default()
                    },
                )
            })
            .collect();
        Self {
            config,
            state: Mutex::new(SafetyState {
                tiers,
                escalation_only_since: None,
                last_rollback: None,
                last_reset: None,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Latency budget for one attempt at `tier`.
    #[must_use]
    pub fn budget(&self, tier: Tier) -> Duration {
        Duration::from_millis(match tier {
            Tier::Structured => self.config.structured_budget_ms,
            Tier::RuleBased => self.config.rule_based_budget_ms,
            Tier::Escalation => self.config.escalation_budget_ms,
        })
    }

    /// Route `query` with this layer as the gate.
    pub async fn guarded_route(
        &self,
        router: &Router,
        query: &ClassifiedQuery,
        student: &StudentContext,
        graph: &PrerequisiteGraph,
    ) -> RoutingDecision {
        router.route(query, student, graph, self).await
    }

    /// Admission check at an explicit instant.
    pub fn admit_at(&self, tier: Tier, now: Instant) -> bool {
        let mut state = self.lock();
        let escalation_only = state.escalation_only_since.is_some();
        let Some(stats) = state.tiers.get_mut(&tier) else {
            return true;
        };
        // Nothing lies below escalation.
        if tier == Tier::Escalation {
            stats.breaker.admit(now);
            return true;
        }
        if escalation_only || !stats.breaker.admit(now) {
            stats.skipped = stats.skipped.saturating_add(1);
            return false;
        }
        true
    }

    /// Outcome recording at an explicit instant.
    pub fn record_at(&self, tier: Tier, outcome: TierOutcome, elapsed: Duration, now: Instant) {
        let budget = self.budget(tier);
        let mut state = self.lock();
        let Some(stats) = state.tiers.get_mut(&tier) else {
            return;
        };
        stats.attempts = stats.attempts.saturating_add(1);
        stats.last_latency = Some(elapsed);

        let over_budget = elapsed > budget;
        let tripped = match outcome {
            TierOutcome::Failure => {
                stats.failures = stats.failures.saturating_add(1);
                stats.breaker.record_failure(now)
            }
            TierOutcome::Success | TierOutcome::Neutral if over_budget => {
                if outcome == TierOutcome::Success {
                    stats.successes = stats.successes.saturating_add(1);
                }
                stats.soft_failures = stats.soft_failures.saturating_add(1);
                tracing::debug!(
                    tier = %tier,
                    elapsed_ms = duration_ms(elapsed),
                    budget_ms = duration_ms(budget),
                    "Attempt exceeded latency budget"
                );
                stats.breaker.record_soft_failure(now)
            }
            TierOutcome::Success => {
                stats.successes = stats.successes.saturating_add(1);
                stats.breaker.record_success();
                false
            }
            TierOutcome::Neutral => {
                stats.breaker.record_neutral();
                false
            }
        };

        if tripped {
            stats.opened_at = Some(Utc::now());
            tracing::warn!(
                tier = %tier,
                consecutive_failures = stats.breaker.consecutive_failures(),
                failure_rate = stats.breaker.failure_rate(),
                cooldown_secs = self.config.cooldown_secs,
                "Circuit breaker opened"
            );
        }
    }

    /// Route every query to escalation, or stop doing so.
    pub fn force_escalation_only(&self, enabled: bool) {
        let mut state = self.lock();
        if enabled {
            let now = Utc::now();
            state.escalation_only_since = Some(now);
            state.last_rollback = Some(now);
            tracing::warn!("Escalation-only mode enabled");
        } else if state.escalation_only_since.take().is_some() {
            tracing::info!("Escalation-only mode disabled");
        }
    }

    #[must_use]
    pub fn is_escalation_only(&self) -> bool {
        self.lock().escalation_only_since.is_some()
    }

    /// Close every circuit and leave escalation-only mode.
    pub fn reset_circuit_breaker(&self) {
        let mut state = self.lock();
        for stats in state.tiers.values_mut() {
            stats.breaker.reset();
            stats.opened_at = None;
        }
        state.escalation_only_since = None;
        state.last_reset = Some(Utc::now());
        tracing::info!("Circuit breakers reset");
    }

    #[must_use]
    pub fn report(&self) -> SafetyReport {
        self.report_at(Instant::now())
    }

    #[must_use]
    pub fn report_at(&self, now: Instant) -> SafetyReport {
        let state = self.lock();
        let tiers = state
            .tiers
            .iter()
            .map(|(tier, stats)| TierHealth {
                tier: *tier,
                status: stats.breaker.status(now),
                consecutive_failures: stats.breaker.consecutive_failures(),
                failure_rate: stats.breaker.failure_rate(),
                window: stats.breaker.window_len(),
                attempts: stats.attempts,
                successes: stats.successes,
                failures: stats.failures,
                soft_failures: stats.soft_failures,
                skipped: stats.skipped,
                trips: stats.breaker.trips(),
                budget_ms: duration_ms(self.budget(*tier)),
                last_latency_ms: stats.last_latency.map(duration_ms),
                opened_at: stats.opened_at,
                retry_in_secs: stats
                    .breaker
                    .remaining_cooldown(now)
                    .map(|d| d.as_secs()),
            })
            .collect();
        SafetyReport {
            escalation_only: state.escalation_only_since.is_some(),
            escalation_only_since: state.escalation_only_since,
            last_rollback: state.last_rollback,
            last_reset: state.last_reset,
            tiers,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SafetyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TierGate for SafetyLayer {
    fn admit(&self, tier: Tier) -> bool {
        self.admit_at(tier, Instant::now())
    }

    fn record(&self, tier: Tier, outcome: TierOutcome, elapsed: Duration) {
        self.record_at(tier, outcome, elapsed, Instant::now());
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
