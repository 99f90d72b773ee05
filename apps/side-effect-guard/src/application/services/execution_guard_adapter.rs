//! Execution Guard Adapter
//!
//! Per-effect wrappers that let call sites adopt exactly-once execution
//! without changing the wrapped operation. Each wrapper derives the entity id
//! from the domain parameters and delegates to [`SideEffectGuard::execute_once`].

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;

use super::side_effect_guard::{GuardResult, SideEffectGuard};
use crate::application::ports::CoordinationStore;
use crate::domain::idempotency::{
    EffectType, ledger_entity_id, order_entity_id, pnl_entity_id, position_entity_id,
    trade_state_entity_id,
};

/// Idempotent wrappers for execution side effects.
pub struct ExecutionGuardAdapter<S>
where
    S: CoordinationStore,
{
    guard: Arc<SideEffectGuard<S>>,
}

impl<S> Clone for ExecutionGuardAdapter<S>
where
    S: CoordinationStore,
{
    fn clone(&self) -> Self {
        Self {
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<S> ExecutionGuardAdapter<S>
where
    S: CoordinationStore,
{
    /// Create an adapter over a shared guard.
    pub const fn new(guard: Arc<SideEffectGuard<S>>) -> Self {
        Self { guard }
    }

    /// Underlying guard.
    pub fn guard(&self) -> &SideEffectGuard<S> {
        &self.guard
    }

    /// Place an order at most once per (symbol, side, quantity, price).
    ///
    /// `price` is `None` for market orders.
    pub async fn wrap_order_placement<T, E, F, Fut>(
        &self,
        operation: F,
        symbol: &str,
        side: &str,
        quantity: Decimal,
        price: Option<Decimal>,
        ttl: Option<Duration>,
    ) -> GuardResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + Debug,
        E: Display,
    {
        let entity_id = order_entity_id(symbol, side, quantity, price);
        tracing::info!(
            symbol,
            side,
            quantity = %quantity,
            price = ?price,
            entity_id = %entity_id,
            "Wrapping order placement"
        );
        self.guard
            .execute_once(EffectType::OrderPlacement, &entity_id, operation, ttl)
            .await
    }

    /// Update a position at most once per (symbol, position id).
    pub async fn wrap_position_update<T, E, F, Fut>(
        &self,
        operation: F,
        symbol: &str,
        position_id: &str,
        ttl: Option<Duration>,
    ) -> GuardResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + Debug,
        E: Display,
    {
        let entity_id = position_entity_id(symbol, position_id);
        tracing::info!(symbol, position_id, entity_id = %entity_id, "Wrapping position update");
        self.guard
            .execute_once(EffectType::PositionUpdate, &entity_id, operation, ttl)
            .await
    }

    /// Write PnL at most once per trade.
    pub async fn wrap_pnl_write<T, E, F, Fut>(
        &self,
        operation: F,
        trade_id: &str,
        ttl: Option<Duration>,
    ) -> GuardResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + Debug,
        E: Display,
    {
        let entity_id = pnl_entity_id(trade_id);
        tracing::info!(trade_id, entity_id = %entity_id, "Wrapping PnL write");
        self.guard
            .execute_once(EffectType::PnlWrite, &entity_id, operation, ttl)
            .await
    }

    /// Write a ledger entry at most once per transaction.
    pub async fn wrap_ledger_write<T, E, F, Fut>(
        &self,
        operation: F,
        transaction_id: &str,
        ttl: Option<Duration>,
    ) -> GuardResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + Debug,
        E: Display,
    {
        let entity_id = ledger_entity_id(transaction_id);
        tracing::info!(transaction_id, entity_id = %entity_id, "Wrapping ledger write");
        self.guard
            .execute_once(EffectType::LedgerWrite, &entity_id, operation, ttl)
            .await
    }

    /// Write a trade state transition at most once per (trade, state).
    pub async fn wrap_trade_state_write<T, E, F, Fut>(
        &self,
        operation: F,
        trade_id: &str,
        state: &str,
        ttl: Option<Duration>,
    ) -> GuardResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + Debug,
        E: Display,
    {
        let entity_id = trade_state_entity_id(trade_id, state);
        tracing::info!(trade_id, state, entity_id = %entity_id, "Wrapping trade state write");
        self.guard
            .execute_once(EffectType::TradeStateWrite, &entity_id, operation, ttl)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::StoreError;
    use crate::application::services::side_effect_guard::{
        DEFAULT_TTL, ExecutionOutcome, GuardConfig, StoreOutagePolicy,
    };
    use crate::domain::idempotency::{CachedResult, PriorResult};

    mock! {
        Store {}

        #[async_trait]
        impl CoordinationStore for Store {
            async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;
            async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
            async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
            async fn exists(&self, key: &str) -> Result<bool, StoreError>;
            async fn delete(&self, key: &str) -> Result<bool, StoreError>;
            async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
            async fn ping(&self) -> Result<(), StoreError>;
        }
    }

    fn adapter(store: MockStore) -> ExecutionGuardAdapter<MockStore> {
        ExecutionGuardAdapter::new(Arc::new(SideEffectGuard::with_defaults(Arc::new(store))))
    }

    fn fresh_key_store(expected_key: String, ttl: Duration) -> MockStore {
        let mut store = MockStore::new();
        store
            .expect_get()
            .with(eq(expected_key.clone()))
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_set_if_absent()
            .with(eq(expected_key.clone()), eq(""), eq(ttl))
            .times(1)
            .returning(|_, _, _| Ok(true));
        store
            .expect_set()
            .withf(move |key, _, t| key == expected_key && *t == ttl)
            .times(1)
            .returning(|_, _, _| Ok(()));
        store
    }

    #[tokio::test]
    async fn test_order_placement_uses_order_entity_id() {
        let id = order_entity_id("BTCUSDT", "buy", dec!(1.0), None);
        let store = fresh_key_store(format!("effect:order_placement:{id}"), DEFAULT_TTL);

        let outcome = adapter(store)
            .wrap_order_placement(
                || async { Ok::<_, String>("O-1") },
                "BTCUSDT",
                "buy",
                dec!(1.0),
                None,
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome, ExecutionOutcome::Executed("O-1"));
    }

    #[tokio::test]
    async fn test_position_update_passes_ttl_override() {
        let ttl = Duration::from_secs(3600);
        let id = position_entity_id("ETHUSDT", "P-7");
        let store = fresh_key_store(format!("effect:position_update:{id}"), ttl);

        let outcome = adapter(store)
            .wrap_position_update(|| async { Ok::<_, String>(2) }, "ETHUSDT", "P-7", Some(ttl))
            .await
            .unwrap();

        assert!(outcome.was_executed());
    }

    #[tokio::test]
    async fn test_pnl_ledger_and_trade_state_keys() {
        let pnl = pnl_entity_id("T-1");
        let outcome = adapter(fresh_key_store(format!("effect:pnl_write:{pnl}"), DEFAULT_TTL))
            .wrap_pnl_write(|| async { Ok::<_, String>(10.5) }, "T-1", None)
            .await
            .unwrap();
        assert!(outcome.was_executed());

        let ledger = ledger_entity_id("TX-1");
        let outcome = adapter(fresh_key_store(format!("effect:ledger_write:{ledger}"), DEFAULT_TTL))
            .wrap_ledger_write(|| async { Ok::<_, String>(()) }, "TX-1", None)
            .await
            .unwrap();
        assert!(outcome.was_executed());

        let state = trade_state_entity_id("T-1", "closed");
        let outcome = adapter(fresh_key_store(
            format!("effect:trade_state_write:{state}"),
            DEFAULT_TTL,
        ))
        .wrap_trade_state_write(|| async { Ok::<_, String>("closed") }, "T-1", "closed", None)
        .await
        .unwrap();
        assert!(outcome.was_executed());
    }

    #[tokio::test]
    async fn test_existing_record_skips_operation() {
        let mut store = MockStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_| Ok(Some(r#"{"order_id":"O-1"}"#.to_string())));
        store.expect_set_if_absent().never();
        store.expect_set().never();
        let calls = AtomicU32::new(0);

        let outcome = adapter(store)
            .wrap_order_placement(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("O-2")
                },
                "BTCUSDT",
                "buy",
                dec!(1.0),
                Some(dec!(50000)),
                None,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            outcome,
            ExecutionOutcome::AlreadyExecuted(PriorResult::Cached(CachedResult::Structured(
                serde_json::json!({ "order_id": "O-1" })
            )))
        );
    }

    #[tokio::test]
    async fn test_lost_race_reads_winner_payload() {
        let mut store = MockStore::new();
        let mut reads = 0;
        store.expect_get().times(2).returning(move |_| {
            reads += 1;
            if reads == 1 {
                Ok(None)
            } else {
                Ok(Some(String::new()))
            }
        });
        store
            .expect_set_if_absent()
            .times(1)
            .returning(|_, _, _| Ok(false));
        store.expect_set().never();

        let outcome = adapter(store)
            .wrap_pnl_write(|| async { Ok::<_, String>(1) }, "T-1", None)
            .await
            .unwrap();

        assert!(outcome.is_pending());
    }

    #[tokio::test]
    async fn test_operation_error_deletes_claim_and_propagates() {
        let mut store = MockStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_set_if_absent()
            .returning(|_, _, _| Ok(true));
        store.expect_set().never();
        store.expect_delete().times(1).returning(|_| Ok(true));

        let err = adapter(store)
            .wrap_ledger_write(
                || async { Err::<(), _>("insufficient balance".to_string()) },
                "TX-9",
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "insufficient balance");
    }

    #[tokio::test]
    async fn test_store_timeout_on_claim_refuses() {
        let mut store = MockStore::new();
        store.expect_get().returning(|_| {
            Err(StoreError::Timeout {
                timeout: Duration::from_secs(2),
            })
        });
        store.expect_set_if_absent().returning(|_, _, _| {
            Err(StoreError::Connection {
                message: "connection reset".to_string(),
            })
        });

        let err = adapter(store)
            .wrap_trade_state_write(|| async { Ok::<_, String>(()) }, "T-1", "open", None)
            .await
            .unwrap_err();

        assert!(err.is_store_unavailable());
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_store_timeout_on_claim_fails_open_when_configured() {
        let mut store = MockStore::new();
        store.expect_get().returning(|_| Ok(None));
        store.expect_set_if_absent().returning(|_, _, _| {
            Err(StoreError::Timeout {
                timeout: Duration::from_secs(2),
            })
        });
        let guard = SideEffectGuard::new(
            Arc::new(store),
            GuardConfig {
                outage_policy: StoreOutagePolicy::FailOpen,
                ..GuardConfig::default()
            },
        );

        let outcome = ExecutionGuardAdapter::new(Arc::new(guard))
            .wrap_pnl_write(|| async { Ok::<_, String>(1) }, "T-1", None)
            .await
            .unwrap();

        assert!(outcome.is_pending());
    }
}
