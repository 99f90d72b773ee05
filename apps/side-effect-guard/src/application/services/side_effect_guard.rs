//! Side-Effect Guard
//!
//! Runs an operation at most once per idempotency key by claiming the key in
//! the coordination store before running it.
//!
//! # Protocol
//!
//! ```text
//! read key ── present ──────────────────────────────► AlreadyExecuted(prior)
//!    │ absent (or unreadable)
//!    ▼
//! SET NX ─── lost race ──── read key ───────────────► AlreadyExecuted(prior)
//!    │ won
//!    ▼
//! operation() ── Ok(v) ─── SET payload (refresh TTL) ► Executed(v)
//!    │ Err(e)
//!    ▼
//! DEL key ──────────────────────────────────────────► Err(Operation(e))
//! ```
//!
//! The guard holds no local state about claims; the store is authoritative.
//! Callers that lose the race do not wait for the winner. They may see a
//! claimed-but-not-completed record, reported as [`PriorResult::Pending`].
//!
//! # Store failures
//!
//! `is_executed` fails open (returns `false`) and `mark_executed` fails
//! closed (returns `false`). Inside `execute_once` a failed claim is handled
//! by [`StoreOutagePolicy`].

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::ports::{CoordinationStore, StoreError};
use crate::domain::idempotency::{
    CLAIM_PLACEHOLDER, CachedResult, DEFAULT_NAMESPACE, EffectType, EntityId, IdempotencyKey,
    PayloadEncoding, PriorResult, encode_completion,
};
use crate::error::GuardError;
use crate::observability::{
    ExecutionOutcomeLabel, record_cache_write_failure, record_execution, record_rollback_failure,
    record_store_error,
};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Default record retention: 72 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(72 * 60 * 60);

/// Breaker name used in logs and metrics.
pub const STORE_BREAKER_NAME: &str = "coordination_store";

/// What `execute_once` does when the store cannot arbitrate a claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOutagePolicy {
    /// Report the call as already executed with a pending result. The
    /// operation is not run, but the caller cannot tell an outage from a
    /// concurrent claim.
    FailOpen,
    /// Return [`GuardError::StoreUnavailable`] when the claim fails or the
    /// store circuit breaker is open.
    #[default]
    RefuseWhenUnavailable,
}

/// Guard settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardConfig {
    /// Key namespace.
    pub namespace: String,
    /// Record TTL when a call does not override it.
    pub default_ttl: Duration,
    /// Claim failure handling.
    pub outage_policy: StoreOutagePolicy,
    /// Store circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_ttl: DEFAULT_TTL,
            outage_policy: StoreOutagePolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Result of [`SideEffectGuard::execute_once`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome<T> {
    /// This caller claimed the key and ran the operation.
    Executed(T),
    /// Another caller claimed the key first.
    AlreadyExecuted(PriorResult),
}

impl<T> ExecutionOutcome<T> {
    /// Whether this caller ran the operation.
    #[must_use]
    pub const fn was_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }

    /// The fresh result, if this caller ran the operation.
    pub fn executed(self) -> Option<T> {
        match self {
            Self::Executed(value) => Some(value),
            Self::AlreadyExecuted(_) => None,
        }
    }

    /// What an earlier execution left behind, if this caller did not run.
    #[must_use]
    pub const fn prior(&self) -> Option<&PriorResult> {
        match self {
            Self::Executed(_) => None,
            Self::AlreadyExecuted(prior) => Some(prior),
        }
    }

    /// Whether another caller holds the claim and no result is readable yet.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::AlreadyExecuted(PriorResult::Pending))
    }
}

/// Return type of guarded executions.
pub type GuardResult<T, E> = Result<ExecutionOutcome<T>, GuardError<E>>;

/// Exactly-once execution guard over a [`CoordinationStore`].
pub struct SideEffectGuard<S>
where
    S: CoordinationStore,
{
    store: Arc<S>,
    config: GuardConfig,
    breaker: CircuitBreaker,
}

impl<S> SideEffectGuard<S>
where
    S: CoordinationStore,
{
    /// Create a guard over an injected store client.
    pub fn new(store: Arc<S>, config: GuardConfig) -> Self {
        let breaker = CircuitBreaker::new(STORE_BREAKER_NAME, config.circuit_breaker.clone());
        Self {
            store,
            config,
            breaker,
        }
    }

    /// Create a guard with default settings.
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, GuardConfig::default())
    }

    /// Guard settings.
    pub const fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Store circuit breaker.
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Underlying store client.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Idempotency key for an effect.
    pub fn key(&self, effect: EffectType, entity_id: &EntityId) -> IdempotencyKey {
        IdempotencyKey::new(self.config.namespace.clone(), effect, entity_id.clone())
    }

    /// Whether a record exists for the effect (claimed or completed).
    ///
    /// Fails open: a store error is logged and reported as `false`.
    pub async fn is_executed(&self, effect: EffectType, entity_id: &EntityId) -> bool {
        let key = self.key(effect, entity_id).to_string();
        let result = self.store.exists(&key).await;
        match self.observe(result, "exists") {
            Ok(exists) => exists,
            Err(e) => {
                tracing::error!(
                    effect = %effect,
                    entity_id = %entity_id,
                    key = %key,
                    error = %e,
                    "Failed to check execution state, assuming not executed"
                );
                false
            }
        }
    }

    /// Atomically claim the effect, storing `payload` with the given TTL.
    ///
    /// Returns `true` only for the single caller that created the record.
    /// Fails closed: a store error is logged and reported as `false`.
    pub async fn mark_executed(
        &self,
        effect: EffectType,
        entity_id: &EntityId,
        payload: &str,
        ttl: Option<Duration>,
    ) -> bool {
        let key = self.key(effect, entity_id).to_string();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        match self.try_claim(&key, payload, ttl).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(
                    effect = %effect,
                    entity_id = %entity_id,
                    key = %key,
                    error = %e,
                    "Failed to claim effect, refusing ownership"
                );
                false
            }
        }
    }

    /// Cached result of a completed execution.
    ///
    /// `None` when the record is absent, only claimed, or unreadable.
    pub async fn get_cached_result(
        &self,
        effect: EffectType,
        entity_id: &EntityId,
    ) -> Option<CachedResult> {
        let key = self.key(effect, entity_id).to_string();
        match self.read_payload(&key).await {
            Ok(payload) => payload.as_deref().and_then(CachedResult::from_payload),
            Err(e) => {
                tracing::error!(
                    effect = %effect,
                    entity_id = %entity_id,
                    key = %key,
                    error = %e,
                    "Failed to read cached result"
                );
                None
            }
        }
    }

    /// Remove the record for an effect. Operator intervention only: the
    /// next call for this key will run the operation again.
    ///
    /// Returns `true` if a record was removed.
    pub async fn clear(
        &self,
        effect: EffectType,
        entity_id: &EntityId,
    ) -> Result<bool, StoreError> {
        let key = self.key(effect, entity_id).to_string();
        let result = self.store.delete(&key).await;
        let removed = self.observe(result, "delete")?;
        tracing::warn!(
            effect = %effect,
            entity_id = %entity_id,
            key = %key,
            removed,
            "Guard record cleared"
        );
        Ok(removed)
    }

    /// Remaining retention of the record.
    ///
    /// `None` when the record is absent, has no expiry, or the store failed.
    pub async fn get_ttl(&self, effect: EffectType, entity_id: &EntityId) -> Option<Duration> {
        let key = self.key(effect, entity_id).to_string();
        let result = self.store.ttl(&key).await;
        match self.observe(result, "ttl") {
            Ok(ttl) => ttl,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to read record TTL");
                None
            }
        }
    }

    /// Run `operation` at most once for this effect.
    ///
    /// Returns [`ExecutionOutcome::Executed`] for the caller that ran it and
    /// [`ExecutionOutcome::AlreadyExecuted`] for everyone else. An error from
    /// `operation` rolls the claim back and is returned unchanged as
    /// [`GuardError::Operation`].
    ///
    /// `ttl` overrides the configured retention for this record.
    pub async fn execute_once<T, E, F, Fut>(
        &self,
        effect: EffectType,
        entity_id: &EntityId,
        operation: F,
        ttl: Option<Duration>,
    ) -> GuardResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + Debug,
        E: Display,
    {
        let key = self.key(effect, entity_id).to_string();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let refuse = self.config.outage_policy == StoreOutagePolicy::RefuseWhenUnavailable;

        if refuse && !self.breaker.is_call_permitted() {
            record_execution(effect.as_str(), ExecutionOutcomeLabel::Refused);
            tracing::warn!(
                effect = %effect,
                entity_id = %entity_id,
                key = %key,
                "Coordination store circuit open, refusing execution"
            );
            return Err(GuardError::StoreUnavailable {
                key,
                reason: "circuit breaker open".to_string(),
            });
        }

        // Fast path. A read failure falls through to the claim, which decides.
        match self.read_payload(&key).await {
            Ok(Some(payload)) => {
                let prior = PriorResult::from_payload(Some(&payload));
                tracing::info!(
                    effect = %effect,
                    entity_id = %entity_id,
                    key = %key,
                    pending = prior == PriorResult::Pending,
                    "Effect already executed, skipping"
                );
                return Ok(self.duplicate(effect, prior));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    effect = %effect,
                    key = %key,
                    error = %e,
                    "Fast-path read failed, attempting claim"
                );
            }
        }

        match self.try_claim(&key, CLAIM_PLACEHOLDER, ttl).await {
            Ok(true) => {
                tracing::info!(
                    effect = %effect,
                    entity_id = %entity_id,
                    key = %key,
                    ttl_secs = ttl.as_secs(),
                    "Claim acquired, executing effect"
                );
            }
            Ok(false) => {
                let prior = match self.read_payload(&key).await {
                    Ok(payload) => PriorResult::from_payload(payload.as_deref()),
                    Err(_) => PriorResult::Pending,
                };
                tracing::info!(
                    effect = %effect,
                    entity_id = %entity_id,
                    key = %key,
                    pending = prior == PriorResult::Pending,
                    "Lost claim race, effect executed by another caller"
                );
                return Ok(self.duplicate(effect, prior));
            }
            Err(e) => {
                tracing::error!(
                    effect = %effect,
                    entity_id = %entity_id,
                    key = %key,
                    error = %e,
                    transient = e.is_transient(),
                    policy = ?self.config.outage_policy,
                    "Claim failed on store error, not executing"
                );
                if refuse {
                    record_execution(effect.as_str(), ExecutionOutcomeLabel::Refused);
                    return Err(GuardError::StoreUnavailable {
                        key,
                        reason: e.to_string(),
                    });
                }
                return Ok(self.duplicate(effect, PriorResult::Pending));
            }
        }

        match operation().await {
            Ok(value) => {
                self.store_completion(effect, &key, &value, ttl).await;
                record_execution(effect.as_str(), ExecutionOutcomeLabel::Executed);
                Ok(ExecutionOutcome::Executed(value))
            }
            Err(e) => {
                tracing::error!(
                    effect = %effect,
                    entity_id = %entity_id,
                    key = %key,
                    error = %e,
                    "Effect failed, releasing claim"
                );
                self.release_claim(effect, &key).await;
                record_execution(effect.as_str(), ExecutionOutcomeLabel::Failed);
                Err(GuardError::Operation(e))
            }
        }
    }

    async fn try_claim(&self, key: &str, payload: &str, ttl: Duration) -> Result<bool, StoreError> {
        let result = self.store.set_if_absent(key, payload, ttl).await;
        self.observe(result, "set_if_absent")
    }

    async fn read_payload(&self, key: &str) -> Result<Option<String>, StoreError> {
        let result = self.store.get(key).await;
        self.observe(result, "get")
    }

    /// Claimed -> Completed. Failure is logged only: the operation already ran.
    async fn store_completion<T>(&self, effect: EffectType, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize + Debug,
    {
        let (payload, encoding) = encode_completion(value);
        let result = self.store.set(key, &payload, ttl).await;
        match self.observe(result, "set") {
            Ok(()) => {
                tracing::info!(
                    effect = %effect,
                    key = %key,
                    fallback = encoding == PayloadEncoding::StringFallback,
                    "Effect completed, result cached"
                );
            }
            Err(e) => {
                record_cache_write_failure(effect.as_str());
                tracing::warn!(
                    effect = %effect,
                    key = %key,
                    error = %e,
                    "Effect completed but result could not be cached, record stays claimed"
                );
            }
        }
    }

    /// Claimed -> Absent after a failed operation.
    async fn release_claim(&self, effect: EffectType, key: &str) {
        let result = self.store.delete(key).await;
        if let Err(e) = self.observe(result, "delete") {
            record_rollback_failure(effect.as_str());
            tracing::error!(
                effect = %effect,
                key = %key,
                error = %e,
                "Failed to release claim, retries blocked until TTL expiry"
            );
        }
    }

    fn duplicate<T>(&self, effect: EffectType, prior: PriorResult) -> ExecutionOutcome<T> {
        let label = match prior {
            PriorResult::Cached(_) => ExecutionOutcomeLabel::Duplicate,
            PriorResult::Pending => ExecutionOutcomeLabel::Pending,
        };
        record_execution(effect.as_str(), label);
        ExecutionOutcome::AlreadyExecuted(prior)
    }

    /// Feed a store call result into the breaker and error metrics.
    fn observe<V>(
        &self,
        result: Result<V, StoreError>,
        operation: &'static str,
    ) -> Result<V, StoreError> {
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => {
                self.breaker.record_failure();
                record_store_error(operation);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde::Deserialize;

    use super::*;
    use crate::domain::idempotency::{order_entity_id, pnl_entity_id};
    use crate::infrastructure::store::{InMemoryCoordinationStore, StoreOperation};
    use crate::resilience::CircuitBreakerState;
    use rust_decimal_macros::dec;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderAck {
        order_id: String,
        status: String,
    }

    fn ack(id: &str) -> OrderAck {
        OrderAck {
            order_id: id.to_string(),
            status: "accepted".to_string(),
        }
    }

    type Guard = SideEffectGuard<InMemoryCoordinationStore>;

    fn guard_with(policy: StoreOutagePolicy) -> (Arc<InMemoryCoordinationStore>, Guard) {
        let store = Arc::new(InMemoryCoordinationStore::new());
        let config = GuardConfig {
            outage_policy: policy,
            ..GuardConfig::default()
        };
        (Arc::clone(&store), SideEffectGuard::new(store, config))
    }

    fn guard() -> (Arc<InMemoryCoordinationStore>, Guard) {
        guard_with(StoreOutagePolicy::default())
    }

    fn btc_order() -> EntityId {
        order_entity_id("BTCUSDT", "buy", dec!(1.0), None)
    }

    #[tokio::test]
    async fn test_first_call_executes_and_caches() {
        let (store, guard) = guard();
        let id = btc_order();

        let outcome = guard
            .execute_once(
                EffectType::OrderPlacement,
                &id,
                || async { Ok::<_, String>(ack("O-1")) },
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome, ExecutionOutcome::Executed(ack("O-1")));
        let key = guard.key(EffectType::OrderPlacement, &id).to_string();
        assert!(key.starts_with("effect:order_placement:"));
        let payload = store.get_raw(&key).unwrap();
        assert_eq!(serde_json::from_str::<OrderAck>(&payload).unwrap(), ack("O-1"));
    }

    #[tokio::test]
    async fn test_retry_returns_cached_result_without_running() {
        let (_, guard) = guard();
        let id = btc_order();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            guard
                .execute_once(
                    EffectType::OrderPlacement,
                    &id,
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(ack("O-1"))
                    },
                    None,
                )
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let outcome = guard
            .execute_once(
                EffectType::OrderPlacement,
                &id,
                || async { Ok::<_, String>(ack("O-2")) },
                None,
            )
            .await
            .unwrap();
        assert!(!outcome.was_executed());
        assert_eq!(outcome.prior().unwrap().decode::<OrderAck>(), Some(ack("O-1")));
    }

    #[tokio::test]
    async fn test_operation_error_rolls_back_claim() {
        let (store, guard) = guard();
        let id = pnl_entity_id("T-42");

        let err = guard
            .execute_once(
                EffectType::PnlWrite,
                &id,
                || async { Err::<(), _>("ledger offline".to_string()) },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.into_operation_error().as_deref(), Some("ledger offline"));
        assert!(store.is_empty());
        assert!(!guard.is_executed(EffectType::PnlWrite, &id).await);

        let outcome = guard
            .execute_once(EffectType::PnlWrite, &id, || async { Ok::<_, String>(12.5) }, None)
            .await
            .unwrap();
        assert_eq!(outcome, ExecutionOutcome::Executed(12.5));
    }

    #[tokio::test]
    async fn test_claimed_record_reports_pending() {
        let (_, guard) = guard();
        let id = btc_order();

        assert!(guard.mark_executed(EffectType::OrderPlacement, &id, "", None).await);
        assert!(!guard.mark_executed(EffectType::OrderPlacement, &id, "", None).await);

        let calls = AtomicU32::new(0);
        let outcome = guard
            .execute_once(
                EffectType::OrderPlacement,
                &id,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(ack("O-9"))
                },
                None,
            )
            .await
            .unwrap();

        assert!(outcome.is_pending());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(guard.get_cached_result(EffectType::OrderPlacement, &id).await.is_none());
    }

    #[tokio::test]
    async fn test_unit_result_is_cached_as_null() {
        let (_, guard) = guard();
        let id = pnl_entity_id("T-1");

        guard
            .execute_once(EffectType::PnlWrite, &id, || async { Ok::<_, String>(()) }, None)
            .await
            .unwrap();

        assert_eq!(
            guard.get_cached_result(EffectType::PnlWrite, &id).await,
            Some(CachedResult::Structured(serde_json::Value::Null))
        );
    }

    #[tokio::test]
    async fn test_ttl_override_and_default() {
        let (_, guard) = guard();
        let short = pnl_entity_id("short");
        let long = pnl_entity_id("long");

        guard
            .execute_once(
                EffectType::PnlWrite,
                &short,
                || async { Ok::<_, String>(1) },
                Some(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        guard
            .execute_once(EffectType::PnlWrite, &long, || async { Ok::<_, String>(1) }, None)
            .await
            .unwrap();

        let short_ttl = guard.get_ttl(EffectType::PnlWrite, &short).await.unwrap();
        let long_ttl = guard.get_ttl(EffectType::PnlWrite, &long).await.unwrap();
        assert!(short_ttl <= Duration::from_secs(60));
        assert!(long_ttl > Duration::from_secs(71 * 3600));
        assert!(long_ttl <= DEFAULT_TTL);
        assert_eq!(guard.get_ttl(EffectType::PnlWrite, &pnl_entity_id("none")).await, None);
    }

    #[tokio::test]
    async fn test_unbounded_ttl_override_executes() {
        let (store, guard) = guard();
        let entity_id = pnl_entity_id("forever");

        let outcome = guard
            .execute_once(
                EffectType::PnlWrite,
                &entity_id,
                || async { Ok::<_, String>(7) },
                Some(Duration::MAX),
            )
            .await
            .unwrap();

        assert_eq!(outcome.executed(), Some(7));
        assert!(guard.mark_executed(EffectType::LedgerWrite, &entity_id, "", Some(Duration::MAX)).await);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_allows_rerun() {
        let (_, guard) = guard();
        let id = pnl_entity_id("T-7");
        guard
            .execute_once(EffectType::PnlWrite, &id, || async { Ok::<_, String>(1) }, None)
            .await
            .unwrap();

        assert!(guard.clear(EffectType::PnlWrite, &id).await.unwrap());
        assert!(!guard.clear(EffectType::PnlWrite, &id).await.unwrap());

        let outcome = guard
            .execute_once(EffectType::PnlWrite, &id, || async { Ok::<_, String>(2) }, None)
            .await
            .unwrap();
        assert_eq!(outcome, ExecutionOutcome::Executed(2));
    }

    #[tokio::test]
    async fn test_is_executed_fails_open_and_mark_fails_closed() {
        let (store, guard) = guard();
        let id = pnl_entity_id("T-1");
        guard.mark_executed(EffectType::PnlWrite, &id, "", None).await;

        store.set_available(false);

        assert!(!guard.is_executed(EffectType::PnlWrite, &id).await);
        assert!(!guard.mark_executed(EffectType::PnlWrite, &pnl_entity_id("T-2"), "", None).await);
        assert_eq!(guard.get_ttl(EffectType::PnlWrite, &id).await, None);
        assert!(guard.clear(EffectType::PnlWrite, &id).await.is_err());
    }

    #[tokio::test]
    async fn test_claim_failure_refuses_by_default() {
        let (store, guard) = guard();
        store.fail_next(StoreOperation::SetIfAbsent, 1);
        let calls = AtomicU32::new(0);

        let err = guard
            .execute_once(
                EffectType::LedgerWrite,
                &pnl_entity_id("tx"),
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                },
                None,
            )
            .await
            .unwrap_err();

        assert!(err.is_store_unavailable());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_claim_failure_reports_pending_when_failing_open() {
        let (store, guard) = guard_with(StoreOutagePolicy::FailOpen);
        store.fail_next(StoreOperation::SetIfAbsent, 1);

        let outcome = guard
            .execute_once(
                EffectType::LedgerWrite,
                &pnl_entity_id("tx"),
                || async { Ok::<_, String>(()) },
                None,
            )
            .await
            .unwrap();

        assert!(outcome.is_pending());
    }

    #[tokio::test]
    async fn test_open_breaker_refuses_without_store_calls() {
        let (store, guard) = guard();
        guard.breaker().force_open();

        let err = guard
            .execute_once(
                EffectType::OrderPlacement,
                &btc_order(),
                || async { Ok::<_, String>(ack("O-1")) },
                None,
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("circuit breaker open"));
        assert_eq!(store.call_count(StoreOperation::SetIfAbsent), 0);
        assert_eq!(guard.breaker().state(), CircuitBreakerState::Open);
    }

    #[tokio::test]
    async fn test_cache_write_failure_keeps_success() {
        let (store, guard) = guard();
        let id = btc_order();
        store.fail_next(StoreOperation::Set, 1);

        let outcome = guard
            .execute_once(
                EffectType::OrderPlacement,
                &id,
                || async { Ok::<_, String>(ack("O-1")) },
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome, ExecutionOutcome::Executed(ack("O-1")));

        let again = guard
            .execute_once(
                EffectType::OrderPlacement,
                &id,
                || async { Ok::<_, String>(ack("O-2")) },
                None,
            )
            .await
            .unwrap();
        assert!(again.is_pending());
    }

    #[tokio::test]
    async fn test_rollback_failure_leaves_claim_in_place() {
        let (store, guard) = guard();
        let id = pnl_entity_id("T-3");
        store.fail_next(StoreOperation::Delete, 1);

        let err = guard
            .execute_once(EffectType::PnlWrite, &id, || async { Err::<(), _>("boom") }, None)
            .await
            .unwrap_err();
        assert_eq!(err.into_operation_error(), Some("boom"));
        assert!(guard.is_executed(EffectType::PnlWrite, &id).await);
    }

    #[tokio::test]
    async fn test_fast_path_read_failure_still_claims() {
        let (store, guard) = guard();
        store.fail_next(StoreOperation::Get, 1);

        let outcome = guard
            .execute_once(
                EffectType::TradeStateWrite,
                &pnl_entity_id("T-5"),
                || async { Ok::<_, String>("open") },
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome, ExecutionOutcome::Executed("open"));
    }

    #[tokio::test]
    async fn test_namespace_is_applied() {
        let store = Arc::new(InMemoryCoordinationStore::new());
        let guard = SideEffectGuard::new(
            Arc::clone(&store),
            GuardConfig {
                namespace: "paper".to_string(),
                ..GuardConfig::default()
            },
        );
        let id = pnl_entity_id("T-1");
        guard
            .execute_once(EffectType::PnlWrite, &id, || async { Ok::<_, String>(1) }, None)
            .await
            .unwrap();

        assert!(store.get_raw(&format!("paper:pnl_write:{id}")).is_some());
    }
}
