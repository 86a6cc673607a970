//! Per-agent circuit breaker.
//!
//! ```text
//!   closed ──(max consecutive failures)──▶ open
//!     ▲                                      │ cooldown elapsed,
//!     │ success                              ▼ checked in can_process()
//!     └──────────────────────────────── half-open ──failure──▶ open (cooldown restarts)
//! ```

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use switchyard_config::CircuitBreakerConfig;
use switchyard_core::event::{DomainEvent, EventBus};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerOptions {
    pub max_errors: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self::from_config(&CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerOptions {
    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self {
            max_errors: config.max_errors,
            cooldown: config.cooldown(),
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_errors: u32,
    /// Time since the breaker last tripped
    pub tripped_ms_ago: Option<u64>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_errors: u32,
    tripped_at: Option<Instant>,
    options: CircuitBreakerOptions,
}

impl CircuitBreaker {
    pub fn new(options: CircuitBreakerOptions) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_errors: 0,
            tripped_at: None,
            options,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Whether a request may proceed. Moves open → half-open once the
    /// cooldown has elapsed.
    pub fn can_process(&mut self) -> bool {
        if self.state != CircuitState::Open {
            return true;
        }
        let cooled = self
            .tripped_at
            .is_none_or(|at| at.elapsed() >= self.options.cooldown);
        if cooled {
            self.state = CircuitState::HalfOpen;
        }
        cooled
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                self.state = CircuitState::Closed;
                self.consecutive_errors = 0;
                self.tripped_at = None;
            }
            // A request admitted before the trip finished late; stay open.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        match self.state {
            CircuitState::Closed if self.consecutive_errors >= self.options.max_errors => {
                self.trip();
            }
            CircuitState::HalfOpen => self.trip(),
            _ => {}
        }
    }

    fn trip(&mut self) {
        self.state = CircuitState::Open;
        self.tripped_at = Some(Instant::now());
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            consecutive_errors: self.consecutive_errors,
            tripped_ms_ago: self.tripped_at.map(|at| at.elapsed().as_millis() as u64),
        }
    }
}

/// One breaker per agent, created on first use.
pub struct CircuitBreakerRegistry {
    options: CircuitBreakerOptions,
    breakers: Mutex<HashMap<String, Arc<Mutex<CircuitBreaker>>>>,
    events: Arc<EventBus>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CircuitBreakerRegistry {
    pub fn new(options: CircuitBreakerOptions) -> Self {
        Self {
            options,
            breakers: Mutex::new(HashMap::new()),
            events: Arc::new(EventBus::default()),
        }
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    fn breaker(&self, agent_id: &str) -> Arc<Mutex<CircuitBreaker>> {
        lock(&self.breakers)
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(CircuitBreaker::new(self.options))))
            .clone()
    }

    /// Run `f` on the agent's breaker and report any state change.
    fn with_breaker<R>(&self, agent_id: &str, f: impl FnOnce(&mut CircuitBreaker) -> R) -> R {
        let breaker = self.breaker(agent_id);
        let mut breaker = lock(&breaker);
        let before = breaker.state();
        let result = f(&mut breaker);
        let after = breaker.state();
        drop(breaker);

        if before != after {
            if after == CircuitState::Open {
                warn!(agent_id = %agent_id, from = %before, "Circuit breaker opened");
            } else {
                info!(agent_id = %agent_id, from = %before, to = %after, "Circuit breaker state changed");
            }
            self.events.publish(DomainEvent::CircuitStateChanged {
                agent_id: agent_id.to_string(),
                from: before.to_string(),
                to: after.to_string(),
                timestamp: Utc::now(),
            });
        }
        result
    }

    pub fn can_process(&self, agent_id: &str) -> bool {
        self.with_breaker(agent_id, CircuitBreaker::can_process)
    }

    pub fn record_success(&self, agent_id: &str) {
        self.with_breaker(agent_id, CircuitBreaker::record_success)
    }

    pub fn record_failure(&self, agent_id: &str) {
        self.with_breaker(agent_id, CircuitBreaker::record_failure)
    }

    /// Snapshot of an agent's breaker, if it has been used.
    pub fn snapshot(&self, agent_id: &str) -> Option<CircuitSnapshot> {
        let breaker = lock(&self.breakers).get(agent_id).cloned()?;
        let snapshot = lock(&breaker).snapshot();
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(max_errors: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerOptions {
            max_errors,
            cooldown: Duration::from_millis(cooldown_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn full_cycle_closed_open_half_open_closed() {
        let mut cb = breaker(2, 1000);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_process());

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(cb.can_process());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_errors(), 0);
        assert!(cb.snapshot().tripped_ms_ago.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_restarts_cooldown() {
        let mut cb = breaker(1, 1000);
        cb.record_failure();
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(cb.can_process());

        tokio::time::advance(Duration::from_millis(500)).await;
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // 1500ms after the original trip, but only 500ms after the retrip
        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!cb.can_process());
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(cb.can_process());
    }

    #[test]
    fn success_resets_error_count_while_closed() {
        let mut cb = breaker(3, 1000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn success_while_open_stays_open() {
        let mut cb = breaker(1, 60_000);
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_process());
    }

    #[tokio::test]
    async fn registry_isolates_agents_and_publishes_transitions() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let registry = CircuitBreakerRegistry::new(CircuitBreakerOptions {
            max_errors: 1,
            cooldown: Duration::from_secs(60),
        })
        .with_event_bus(bus);

        registry.record_failure("mailer");
        assert!(!registry.can_process("mailer"));
        assert!(registry.can_process("scheduler"));
        assert_eq!(registry.snapshot("mailer").unwrap().state, CircuitState::Open);
        assert!(registry.snapshot("unknown").is_none());

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::CircuitStateChanged { agent_id, from, to, .. } => {
                assert_eq!(agent_id, "mailer");
                assert_eq!(from, "closed");
                assert_eq!(to, "open");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn state_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), "\"half-open\"");
    }
}
