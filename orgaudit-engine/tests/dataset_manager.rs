//! Dataset manager integration tests.
//!
//! Covers caching across runs, concurrent de-duplication of fetches,
//! partial failure of a batch and expiry of cached datasets.

use async_trait::async_trait;
use orgaudit_engine::{
    register_defaults, CacheManager, DatasetContext, DatasetError, DatasetManager,
    DatasetParameters, DatasetRunRequest, DatasetValue, FixtureQueryInterface, ManualClock,
    MemoryStore, NoCompression, RawRow, RecordingLogger, SectionEvent, ZstdCompressor,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Dataset that counts its invocations.
struct Counting {
    calls: AtomicUsize,
    outcome: Result<Value, String>,
    delay: Duration,
}

impl Counting {
    fn ok(value: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome: Ok(value),
            delay: Duration::from_millis(20),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome: Err(message.to_string()),
            delay: Duration::from_millis(20),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl orgaudit_engine::Dataset for Counting {
    async fn run(
        &self,
        _ctx: &DatasetContext,
        _params: &DatasetParameters,
    ) -> Result<DatasetValue, DatasetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.outcome {
            Ok(value) => Ok(DatasetValue::from_json(value.clone())),
            Err(message) => Err(DatasetError::failed(message.clone())),
        }
    }
}

fn manager_with(cache: CacheManager) -> DatasetManager {
    DatasetManager::new(
        Arc::new(cache),
        DatasetContext::new(Arc::new(FixtureQueryInterface::new())),
    )
}

fn manager() -> DatasetManager {
    manager_with(CacheManager::in_memory())
}

#[tokio::test]
async fn test_failed_sibling_keeps_successes_cached() {
    let manager = manager();
    let a = Counting::ok(json!({"x": 1}));
    let b = Counting::failing("boom");
    manager.register("A", a.clone()).unwrap();
    manager.register("B", b.clone()).unwrap();

    let err = manager
        .run(vec![DatasetRunRequest::new("A"), DatasetRunRequest::new("B")])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);

    let results = manager.run(vec![DatasetRunRequest::new("A")]).await.unwrap();
    assert_eq!(results["A"].to_json(), json!({"x": 1}));
    assert_eq!(a.calls(), 1, "second run must be served from cache");
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let manager = manager();
    let b = Counting::failing("boom");
    manager.register("B", b.clone()).unwrap();

    for _ in 0..2 {
        assert!(manager.run(vec![DatasetRunRequest::new("B")]).await.is_err());
    }
    assert_eq!(b.calls(), 2);
    assert!(manager.cache_information().is_empty());
}

#[tokio::test]
async fn test_first_error_in_request_order_wins() {
    let manager = manager();
    manager.register("first", Counting::failing("first failure")).unwrap();
    manager.register("second", Counting::failing("second failure")).unwrap();

    let err = manager
        .run(vec![
            DatasetRunRequest::new("first"),
            DatasetRunRequest::new("second"),
        ])
        .await
        .unwrap_err();
    assert_eq!(err, DatasetError::failed("first failure"));
}

#[tokio::test]
async fn test_concurrent_runs_share_one_fetch() {
    let manager = manager();
    let a = Counting::ok(json!([1, 2, 3]));
    manager.register("A", a.clone()).unwrap();

    let (left, right) = tokio::join!(
        manager.run(vec![DatasetRunRequest::new("A")]),
        manager.run(vec![DatasetRunRequest::new("A")]),
    );
    let (left, right) = (left.unwrap(), right.unwrap());
    assert_eq!(a.calls(), 1);
    assert!(Arc::ptr_eq(&left["A"], &right["A"]));
    assert_eq!(left["A"].len(), Some(3));
}

#[tokio::test]
async fn test_aliases_sharing_a_cache_key_share_one_fetch() {
    let manager = manager();
    let a = Counting::ok(json!("value"));
    manager.register("A", a.clone()).unwrap();
    manager.register("A2", a.clone()).unwrap();

    let results = manager
        .run(vec![
            DatasetRunRequest::new("A").with_cache_key("shared"),
            DatasetRunRequest::new("A2").with_cache_key("shared"),
        ])
        .await
        .unwrap();
    assert_eq!(a.calls(), 1);
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_concurrent_failure_is_shared_then_retried() {
    let manager = manager();
    let b = Counting::failing("boom");
    manager.register("B", b.clone()).unwrap();

    let (left, right) = tokio::join!(
        manager.run(vec![DatasetRunRequest::new("B")]),
        manager.run(vec![DatasetRunRequest::new("B")]),
    );
    assert_eq!(left.unwrap_err().to_string(), "boom");
    assert_eq!(right.unwrap_err().to_string(), "boom");
    assert_eq!(b.calls(), 1);

    // The in-flight entry is gone, so a new run fetches again.
    assert!(manager.run(vec![DatasetRunRequest::new("B")]).await.is_err());
    assert_eq!(b.calls(), 2);
}

#[tokio::test]
async fn test_unregistered_alias_fetches_nothing() {
    let manager = manager();
    let a = Counting::ok(json!(1));
    manager.register("A", a.clone()).unwrap();

    let err = manager
        .run(vec![
            DatasetRunRequest::new("A"),
            DatasetRunRequest::new("missing"),
        ])
        .await
        .unwrap_err();
    assert_eq!(err, DatasetError::NotRegistered("missing".to_string()));
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_expired_cache_is_refetched() {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = CacheManager::new(Arc::new(MemoryStore::new()), Arc::new(ZstdCompressor::new()))
        .with_clock(clock.clone());
    let manager = manager_with(cache);
    let a = Counting::ok(json!({"x": 1}));
    manager.register("A", a.clone()).unwrap();

    manager.run(vec![DatasetRunRequest::new("A")]).await.unwrap();
    clock.advance(DAY_MS + 1);

    let info = manager.cache_information();
    assert_eq!(info.len(), 1);
    assert!(info[0].is_empty);

    manager.run(vec![DatasetRunRequest::new("A")]).await.unwrap();
    assert_eq!(a.calls(), 2);
    assert!(!manager.cache_information()[0].is_empty);
}

#[tokio::test]
async fn test_cache_write_failure_does_not_fail_the_run() {
    let cache = CacheManager::new(Arc::new(MemoryStore::with_capacity(8)), Arc::new(NoCompression));
    let manager = manager_with(cache);
    let a = Counting::ok(json!({"x": 1}));
    manager.register("A", a.clone()).unwrap();

    for _ in 0..2 {
        let results = manager.run(vec![DatasetRunRequest::new("A")]).await.unwrap();
        assert_eq!(results["A"].to_json(), json!({"x": 1}));
    }
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_remove_cache_forces_refetch() {
    let manager = manager();
    let a = Counting::ok(json!(1));
    let b = Counting::ok(json!(2));
    manager.register("A", a.clone()).unwrap();
    manager.register("B", b.clone()).unwrap();

    let both = || vec![DatasetRunRequest::new("A"), DatasetRunRequest::new("B")];
    manager.run(both()).await.unwrap();
    manager.remove_cache("A");
    manager.run(both()).await.unwrap();
    assert_eq!((a.calls(), b.calls()), (2, 1));

    manager.remove_all_cache();
    assert!(manager.cache_information().is_empty());
    manager.run(both()).await.unwrap();
    assert_eq!((a.calls(), b.calls()), (3, 2));
}

#[tokio::test]
async fn test_section_events_follow_fetches() {
    let logger = Arc::new(RecordingLogger::new());
    let manager = DatasetManager::new(
        Arc::new(CacheManager::in_memory()),
        DatasetContext::new(Arc::new(FixtureQueryInterface::new())).with_logger(logger.clone()),
    );
    manager.register("A", Counting::ok(json!(1))).unwrap();
    manager.register("B", Counting::failing("boom")).unwrap();

    let _ = manager
        .run(vec![DatasetRunRequest::new("A"), DatasetRunRequest::new("B")])
        .await;
    assert_eq!(logger.section("A"), vec![SectionEvent::Starts, SectionEvent::Ended]);
    assert_eq!(logger.section("B"), vec![SectionEvent::Starts, SectionEvent::Failed]);

    // Cache hits are silent.
    manager.run(vec![DatasetRunRequest::new("A")]).await.unwrap();
    assert_eq!(logger.section("A").len(), 2);
}

#[tokio::test]
async fn test_object_fields_cached_per_object_without_back_references() {
    let rows = |object: &str, id: &str| -> Vec<RawRow> {
        serde_json::from_value(json!([{
            "Id": id,
            "DeveloperName": "Rating",
            "EntityDefinitionId": "01I000000000001AAA",
            "EntityDefinition": {"QualifiedApiName": object}
        }]))
        .unwrap()
    };
    // The fixture keys rows by queried object, so both objects see both rows.
    let query = Arc::new(
        FixtureQueryInterface::new().with_rows("CustomField", rows("Account", "00N000000000001AAA")),
    );
    let manager = DatasetManager::new(
        Arc::new(CacheManager::in_memory()),
        DatasetContext::new(query.clone()),
    );
    register_defaults(&manager).unwrap();

    let fresh = manager
        .run(vec![DatasetRunRequest::object_fields("Account")])
        .await
        .unwrap();
    let field = fresh["object-fields"].get("00N000000000001").unwrap();
    assert_eq!(field["objectRef"]["apiName"], "Account");

    manager
        .run(vec![DatasetRunRequest::object_fields("Contact")])
        .await
        .unwrap();
    assert_eq!(query.calls(), 2);

    let mut names: Vec<String> = manager
        .cache_information()
        .into_iter()
        .map(|info| info.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["object-fields-Account", "object-fields-Contact"]);

    let cached = manager
        .run(vec![DatasetRunRequest::object_fields("Account")])
        .await
        .unwrap();
    assert_eq!(query.calls(), 2);
    let field = cached["object-fields"].get("00N000000000001").unwrap();
    assert!(field.get("objectRef").is_none());
    assert_eq!(field["objectApiName"], "Account");
}

#[tokio::test]
async fn test_default_datasets_run_in_one_call() {
    let query = Arc::new(FixtureQueryInterface::new());
    let manager = DatasetManager::new(
        Arc::new(CacheManager::in_memory()),
        DatasetContext::new(query.clone()),
    );
    register_defaults(&manager).unwrap();
    assert_eq!(
        manager.aliases(),
        vec!["apex-classes", "dependencies", "object-fields", "permission-sets"]
    );

    let results = manager
        .run(vec![
            DatasetRunRequest::new("apex-classes"),
            DatasetRunRequest::new("permission-sets"),
            DatasetRunRequest::new("dependencies"),
        ])
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results["apex-classes"].is_map());
    assert_eq!(results["dependencies"].len(), Some(0));
    assert_eq!(query.calls(), 3);
}
