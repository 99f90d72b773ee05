//! Circuit breaker guarding the coordination store.
//!
//! Store command failures are recorded here by the side-effect guard. While
//! the breaker is open the guard refuses to run operations instead of
//! guessing whether a claim is held.
//!
//! # State Machine
//!
//! ```text
//! CLOSED → OPEN (failure rate >= threshold)
//! OPEN → HALF_OPEN (wait duration elapsed)
//! HALF_OPEN → CLOSED (probe calls succeed)
//! HALF_OPEN → OPEN (a probe call fails)
//! ```
//!
//! # Configuration
//!
//! - `failure_rate_threshold`: Open at this failure rate (default: 50%)
//! - `sliding_window_size`: Number of calls to track (default: 20)
//! - `minimum_calls`: Minimum calls before evaluating (default: 5)
//! - `wait_duration_in_open`: Time to stay open (default: 10s)
//! - `permitted_calls_in_half_open`: Probe calls allowed (default: 3)
//!
//! Time is read from `tokio::time::Instant`, so paused-clock tests can
//! drive the open wait.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::observability::{circuit_breaker_state, record_circuit_breaker_state};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    /// Store calls flow normally.
    Closed,
    /// Store considered unavailable, calls are rejected.
    Open,
    /// Probing with a limited number of calls.
    HalfOpen,
}

impl CircuitBreakerState {
    const fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => circuit_breaker_state::CLOSED,
            Self::Open => circuit_breaker_state::OPEN,
            Self::HalfOpen => circuit_breaker_state::HALF_OPEN,
        }
    }
}

impl std::fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failure rate threshold to open circuit (0.0-1.0).
    pub failure_rate_threshold: f64,
    /// Number of calls in the sliding window.
    pub sliding_window_size: u32,
    /// Minimum calls before evaluating failure rate.
    pub minimum_calls: u32,
    /// Duration to stay in `OPEN` state.
    pub wait_duration_in_open: Duration,
    /// Permitted probe calls in `HALF_OPEN` state.
    pub permitted_calls_in_half_open: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_size: 20,
            minimum_calls: 5,
            wait_duration_in_open: Duration::from_secs(10),
            permitted_calls_in_half_open: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallOutcome {
    Success,
    Failure,
}

/// Circuit breaker over coordination store commands.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<CircuitBreakerState>,
    sliding_window: RwLock<VecDeque<CallOutcome>>,
    opened_at: RwLock<Option<Instant>>,
    half_open_calls: AtomicU32,
    half_open_successes: AtomicU32,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    rejected_calls: AtomicU64,
    state_transitions: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let breaker = Self {
            name: name.into(),
            config,
            state: RwLock::new(CircuitBreakerState::Closed),
            sliding_window: RwLock::new(VecDeque::new()),
            opened_at: RwLock::new(None),
            half_open_calls: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            state_transitions: AtomicU64::new(0),
        };
        record_circuit_breaker_state(&breaker.name, circuit_breaker_state::CLOSED);
        breaker
    }

    /// Breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitBreakerState {
        self.check_state_transition();
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a store call may go ahead. Rejections are counted.
    #[must_use]
    pub fn is_call_permitted(&self) -> bool {
        self.check_state_transition();

        let state = *self.state.read().unwrap_or_else(PoisonError::into_inner);
        let permitted = match state {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::Open => false,
            CircuitBreakerState::HalfOpen => {
                self.half_open_calls.load(Ordering::Relaxed)
                    < self.config.permitted_calls_in_half_open
            }
        };
        if !permitted {
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
        }
        permitted
    }

    /// Record a successful store call.
    pub fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.record_outcome(CallOutcome::Success);
    }

    /// Record a failed store call.
    pub fn record_failure(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        self.record_outcome(CallOutcome::Failure);
    }

    fn record_outcome(&self, outcome: CallOutcome) {
        let current_state = *self.state.read().unwrap_or_else(PoisonError::into_inner);

        match current_state {
            CircuitBreakerState::Closed => {
                self.update_sliding_window(outcome);
                self.evaluate_closed_state();
            }
            CircuitBreakerState::HalfOpen => {
                self.half_open_calls.fetch_add(1, Ordering::Relaxed);
                if outcome == CallOutcome::Success {
                    self.half_open_successes.fetch_add(1, Ordering::Relaxed);
                }
                self.evaluate_half_open_state(outcome);
            }
            CircuitBreakerState::Open => {
                // Primitives that bypass the breaker (is_executed, clear) still report here
                tracing::debug!(
                    name = %self.name,
                    ?outcome,
                    "Store call recorded while circuit is OPEN"
                );
            }
        }
    }

    fn update_sliding_window(&self, outcome: CallOutcome) {
        let mut window = self
            .sliding_window
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        window.push_back(outcome);
        while window.len() > self.config.sliding_window_size as usize {
            window.pop_front();
        }
    }

    fn evaluate_closed_state(&self) {
        let window = self
            .sliding_window
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        if window.len() < self.config.minimum_calls as usize {
            return;
        }

        let failures = window
            .iter()
            .filter(|o| **o == CallOutcome::Failure)
            .count();
        let failure_rate = failures as f64 / window.len() as f64;

        if failure_rate >= self.config.failure_rate_threshold {
            drop(window);
            self.transition_to_open();
        }
    }

    fn evaluate_half_open_state(&self, outcome: CallOutcome) {
        if outcome == CallOutcome::Failure {
            self.transition_to_open();
            return;
        }

        if self.half_open_successes.load(Ordering::Relaxed)
            >= self.config.permitted_calls_in_half_open
        {
            self.transition_to_closed();
        }
    }

    /// `OPEN` -> `HALF_OPEN` once the wait has elapsed.
    fn check_state_transition(&self) {
        let state = *self.state.read().unwrap_or_else(PoisonError::into_inner);

        if state == CircuitBreakerState::Open
            && let Some(opened) = *self.opened_at.read().unwrap_or_else(PoisonError::into_inner)
            && opened.elapsed() >= self.config.wait_duration_in_open
        {
            self.transition_to_half_open();
        }
    }

    fn transition_to_open(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        if previous == CircuitBreakerState::Open {
            return;
        }
        *state = CircuitBreakerState::Open;
        drop(state);

        *self.opened_at.write().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.on_transition(CircuitBreakerState::Open);

        tracing::warn!(
            name = %self.name,
            from = %previous,
            to = "OPEN",
            wait_secs = self.config.wait_duration_in_open.as_secs(),
            "Coordination store circuit breaker opened"
        );
    }

    fn transition_to_half_open(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        if previous != CircuitBreakerState::Open {
            return;
        }
        *state = CircuitBreakerState::HalfOpen;
        drop(state);

        self.half_open_calls.store(0, Ordering::Relaxed);
        self.half_open_successes.store(0, Ordering::Relaxed);
        self.on_transition(CircuitBreakerState::HalfOpen);

        tracing::info!(
            name = %self.name,
            from = %previous,
            to = "HALF_OPEN",
            "Coordination store circuit breaker probing"
        );
    }

    fn transition_to_closed(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        if previous == CircuitBreakerState::Closed {
            return;
        }
        *state = CircuitBreakerState::Closed;
        drop(state);

        self.sliding_window
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.opened_at.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.on_transition(CircuitBreakerState::Closed);

        tracing::info!(
            name = %self.name,
            from = %previous,
            to = "CLOSED",
            "Coordination store circuit breaker closed"
        );
    }

    fn on_transition(&self, to: CircuitBreakerState) {
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
        record_circuit_breaker_state(&self.name, to.as_gauge());
    }

    /// Snapshot of counters and state.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: self.state(),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            state_transitions: self.state_transitions.load(Ordering::Relaxed),
            failure_rate: self.current_failure_rate(),
        }
    }

    fn current_failure_rate(&self) -> f64 {
        let window = self
            .sliding_window
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        if window.is_empty() {
            return 0.0;
        }

        let failures = window
            .iter()
            .filter(|o| **o == CallOutcome::Failure)
            .count();
        failures as f64 / window.len() as f64
    }

    /// Force the breaker open (operator intervention or tests).
    pub fn force_open(&self) {
        self.transition_to_open();
    }

    /// Force the breaker closed (operator intervention or tests).
    pub fn force_close(&self) {
        self.transition_to_closed();
    }
}

/// Counters and state of a circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Breaker name.
    pub name: String,
    /// Current state.
    pub state: CircuitBreakerState,
    /// Total recorded calls.
    pub total_calls: u64,
    /// Total recorded failures.
    pub total_failures: u64,
    /// Calls rejected while open or out of half-open probes.
    pub rejected_calls: u64,
    /// Number of state transitions.
    pub state_transitions: u64,
    /// Current failure rate (0.0-1.0).
    pub failure_rate: f64,
}
