//! Configuration to Validator Integration Tests
//!
//! Builds the guard and the store safety validator from a YAML config file
//! and checks the startup verdict against differently configured stores.

#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use side_effect_guard::application::services::{
    SideEffectGuard, StoreOutagePolicy, StoreSafetyValidator, ValidatorConfig,
};
use side_effect_guard::config::load_config;
use side_effect_guard::domain::idempotency::{EffectType, ledger_entity_id};
use side_effect_guard::domain::store_safety::{
    MemoryInfo, PersistenceInfo, SafetyCheck, ValidationLevel,
};
use side_effect_guard::infrastructure::store::InMemoryCoordinationStore;

const CONFIG: &str = r#"
guard:
  namespace: "${GUARD_TEST_NAMESPACE:-desk}"
  default_ttl_secs: 3600
  outage_policy: fail_open
validator:
  min_free_memory_mb: 256
  audit_interval_secs: 30
  periodic_audit: true
"#;

fn config_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn guard_built_from_config_uses_its_namespace_and_ttl() {
    let file = config_file();
    let config = load_config(file.path().to_str()).unwrap();
    let store = Arc::new(InMemoryCoordinationStore::new());
    let guard = SideEffectGuard::new(Arc::clone(&store), config.guard_config());

    assert_eq!(guard.config().outage_policy, StoreOutagePolicy::FailOpen);

    let entity_id = ledger_entity_id("txn-1");
    guard
        .execute_once(
            EffectType::LedgerWrite,
            &entity_id,
            || async { Ok::<_, String>(()) },
            None,
        )
        .await
        .unwrap();

    let key = format!("desk:ledger_write:{entity_id}");
    assert_eq!(store.get_raw(&key).as_deref(), Some("null"));
    let ttl = guard.get_ttl(EffectType::LedgerWrite, &entity_id).await.unwrap();
    assert!(ttl <= Duration::from_secs(3600));
    assert!(ttl > Duration::from_secs(3590));
}

#[tokio::test]
async fn validator_built_from_config_applies_memory_threshold() {
    let file = config_file();
    let config = load_config(file.path().to_str()).unwrap();
    let store = Arc::new(InMemoryCoordinationStore::new());
    store.set_memory_info(MemoryInfo {
        used_bytes: 900 * 1024 * 1024,
        max_bytes: 1024 * 1024 * 1024,
    });

    let validator = StoreSafetyValidator::new(store, config.validator.to_validator_config());
    assert_eq!(validator.config().audit_interval, Duration::from_secs(30));

    let summary = validator.summary().await;
    let memory = summary
        .checks
        .iter()
        .find(|r| r.check == SafetyCheck::MemoryHeadroom)
        .unwrap();
    assert_eq!(memory.level, ValidationLevel::Warning);
    assert!(summary.passed);
}

#[tokio::test]
async fn volatile_store_fails_startup_validation() {
    let store = Arc::new(InMemoryCoordinationStore::new());
    store.set_persistence_info(PersistenceInfo::default());
    let validator = StoreSafetyValidator::new(store, ValidatorConfig::default());

    assert!(!validator.validate_on_startup().await);
}
