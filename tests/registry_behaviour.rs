//! End-to-end registry behaviour against in-memory stub backends.
//!
//! The stubs implement the public port traits, so these tests exercise
//! exactly the surface application code sees: resolution, pool ceilings,
//! cache degradation, hot swaps under traffic, and queue acknowledgement.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use plugboard::config::{Settings, resolve_descriptors};
use plugboard::domain::ports::{
    AdapterLifecycle, BackendFactory, BackendUnavailableError, Cache, CacheError,
    ConstructedAdapter, DrainOutcome, LeasedTask, PortHandle, ProbeError, QueueError, Receipt,
    Record, RelationalError, RelationalStore, SqlText, TaskId, TaskQueue,
};
use plugboard::{BackendDescriptor, BackendKind, Registry, RegistryOptions};

fn descriptors(document: &str) -> Vec<BackendDescriptor> {
    let settings = Settings::from_toml_str(document).expect("valid TOML");
    resolve_descriptors(&settings).expect("valid settings")
}

fn options() -> RegistryOptions {
    RegistryOptions {
        drain_timeout: Duration::from_millis(100),
        ..RegistryOptions::default()
    }
}

/// Relational stub enforcing its descriptor's pool ceiling with a
/// semaphore. Reads briefly hold a permit so tests can saturate the pool.
struct BoundedRelational {
    name: String,
    kind: BackendKind,
    marker: String,
    permits: Arc<Semaphore>,
    hold: Duration,
}

#[async_trait]
impl RelationalStore for BoundedRelational {
    async fn read(&self, _query: &SqlText) -> Result<Vec<Record>, RelationalError> {
        let Ok(_permit) = self.permits.try_acquire() else {
            return Err(RelationalError::pool_exhausted(&self.name));
        };
        tokio::time::sleep(self.hold).await;
        let mut record = Record::new();
        record.insert("marker".to_string(), self.marker.clone().into());
        Ok(vec![record])
    }

    async fn write(&self, _statement: &SqlText) -> Result<u64, RelationalError> {
        Ok(1)
    }

    async fn transaction(&self, _statements: &[SqlText]) -> Result<(), RelationalError> {
        Ok(())
    }
}

#[async_trait]
impl AdapterLifecycle for BoundedRelational {
    fn logical_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    async fn close(&self, _drain: Duration) -> DrainOutcome {
        DrainOutcome::Clean
    }
}

/// Cache stub whose availability can be flipped mid-test.
struct FlakyCache {
    name: String,
    down: Arc<AtomicBool>,
    store: StdMutex<HashMap<String, String>>,
}

impl FlakyCache {
    fn check(&self) -> Result<(), CacheError> {
        if self.down.load(Ordering::Acquire) {
            Err(CacheError::unavailable(&self.name, "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Cache for FlakyCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.store.lock().expect("store").get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), CacheError> {
        self.check()?;
        self.store
            .lock()
            .expect("store")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.store.lock().expect("store").remove(key);
        Ok(())
    }
}

#[async_trait]
impl AdapterLifecycle for FlakyCache {
    fn logical_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cache
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        if self.down.load(Ordering::Acquire) {
            Err(ProbeError::backend(&self.name, "connection refused"))
        } else {
            Ok(())
        }
    }

    async fn close(&self, _drain: Duration) -> DrainOutcome {
        DrainOutcome::Clean
    }
}

/// In-memory queue with ready and pending lists, mirroring the leasing
/// contract: a leased task stays pending until acknowledged.
struct InMemoryQueue {
    name: String,
    ready: StdMutex<VecDeque<(String, String, Value)>>,
    pending: StdMutex<Vec<(String, String, Value)>>,
    counter: AtomicU32,
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(&self, kind: &str, payload: &Value) -> Result<TaskId, QueueError> {
        let id = format!("task-{}", self.counter.fetch_add(1, Ordering::SeqCst));
        self.ready.lock().expect("ready").push_back((
            id.clone(),
            kind.to_string(),
            payload.clone(),
        ));
        Ok(TaskId::new(id))
    }

    async fn lease(&self) -> Result<Option<LeasedTask>, QueueError> {
        let Some((id, kind, payload)) = self.ready.lock().expect("ready").pop_front() else {
            return Ok(None);
        };
        self.pending
            .lock()
            .expect("pending")
            .push((id.clone(), kind.clone(), payload.clone()));
        Ok(Some(LeasedTask {
            id: TaskId::new(id.clone()),
            kind,
            payload,
            receipt: Receipt::new(id),
        }))
    }

    async fn ack(&self, receipt: &Receipt) -> Result<(), QueueError> {
        let mut pending = self.pending.lock().expect("pending");
        let before = pending.len();
        pending.retain(|(id, _, _)| id != receipt.token());
        if pending.len() == before {
            return Err(QueueError::receipt_not_found(&self.name));
        }
        Ok(())
    }
}

#[async_trait]
impl AdapterLifecycle for InMemoryQueue {
    fn logical_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Queue
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    async fn close(&self, _drain: Duration) -> DrainOutcome {
        DrainOutcome::Clean
    }
}

/// Factory wiring the stubs above to descriptors by port family.
struct StubFactory {
    cache_down: Arc<AtomicBool>,
    relational_hold: Duration,
    generations: AtomicU32,
}

impl StubFactory {
    fn new() -> Self {
        Self {
            cache_down: Arc::new(AtomicBool::new(false)),
            relational_hold: Duration::ZERO,
            generations: AtomicU32::new(0),
        }
    }

    fn with_relational_hold(hold: Duration) -> Self {
        Self {
            relational_hold: hold,
            ..Self::new()
        }
    }
}

#[async_trait]
impl BackendFactory for StubFactory {
    async fn build(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<ConstructedAdapter, BackendUnavailableError> {
        let name = descriptor.logical_name().to_string();
        let adapter = match descriptor.kind() {
            BackendKind::RelationalOrm
            | BackendKind::RelationalRaw
            | BackendKind::RelationalYamlSchema => {
                let generation = self.generations.fetch_add(1, Ordering::SeqCst);
                let adapter = Arc::new(BoundedRelational {
                    name,
                    kind: descriptor.kind(),
                    marker: format!("generation-{generation}"),
                    permits: Arc::new(Semaphore::new(descriptor.pool_max() as usize)),
                    hold: self.relational_hold,
                });
                ConstructedAdapter {
                    port: PortHandle::Relational(adapter.clone()),
                    lifecycle: adapter,
                }
            }
            BackendKind::Cache => {
                let adapter = Arc::new(FlakyCache {
                    name,
                    down: self.cache_down.clone(),
                    store: StdMutex::new(HashMap::new()),
                });
                ConstructedAdapter {
                    port: PortHandle::Cache(adapter.clone()),
                    lifecycle: adapter,
                }
            }
            BackendKind::Queue => {
                let adapter = Arc::new(InMemoryQueue {
                    name,
                    ready: StdMutex::new(VecDeque::new()),
                    pending: StdMutex::new(Vec::new()),
                    counter: AtomicU32::new(0),
                });
                ConstructedAdapter {
                    port: PortHandle::Queue(adapter.clone()),
                    lifecycle: adapter,
                }
            }
            BackendKind::Document => {
                return Err(BackendUnavailableError::new(
                    descriptor,
                    "no document stub configured",
                ));
            }
        };
        Ok(adapter)
    }
}

const SINGLE_RELATIONAL: &str = r#"
    [[resources]]
    name = "primary"
    kind = "relational_raw"
    pool_max = 2
    [resources.params]
    url = "postgres://app:secret@db/app"
"#;

// Roomy ceiling: the swap test runs four overlapping readers and none of
// them may be turned away by pool pressure.
const SWAP_RELATIONAL: &str = r#"
    [[resources]]
    name = "primary"
    kind = "relational_raw"
    pool_max = 16
    [resources.params]
    url = "postgres://app:secret@db/app"
"#;

#[tokio::test]
async fn pool_ceiling_rejects_callers_beyond_the_maximum() {
    let registry = Registry::start(
        descriptors(SINGLE_RELATIONAL),
        Arc::new(StubFactory::with_relational_hold(Duration::from_millis(200))),
        options(),
    )
    .await
    .expect("startup succeeds");
    let store = registry.resolve_relational("primary").expect("resolves");

    let query = SqlText::new("SELECT id FROM accounts").expect("valid sql");
    let holders: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let query = query.clone();
            tokio::spawn(async move { store.read(&query).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let overflow = store.read(&query).await;
    assert!(matches!(
        overflow,
        Err(RelationalError::PoolExhausted { .. })
    ));

    for holder in holders {
        assert!(holder.await.expect("task completes").is_ok());
    }
    // With permits released, the next caller succeeds again.
    assert!(store.read(&query).await.is_ok());
}

#[tokio::test]
async fn cache_outage_degrades_without_failing_the_primary_path() {
    let factory = Arc::new(StubFactory::new());
    let cache_down = factory.cache_down.clone();
    let registry = Registry::start(
        descriptors(
            r#"
            [[resources]]
            name = "primary"
            kind = "relational_raw"
            [resources.params]
            url = "postgres://app:secret@db/app"

            [[resources]]
            name = "sessions"
            kind = "cache"
            [resources.params]
            uri = "redis://localhost:6379"
            "#,
        ),
        factory,
        options(),
    )
    .await
    .expect("startup succeeds");

    let cache = registry.resolve_cache("sessions").expect("resolves");
    let store = registry.resolve_relational("primary").expect("resolves");
    cache
        .set("user:42", "cached", None)
        .await
        .expect("cache is up");

    cache_down.store(true, Ordering::Release);

    // Read-through: the cache outage is visible as Unavailable, and the
    // caller falls back to the source of truth instead of failing.
    let cached = cache.get("user:42").await;
    assert!(matches!(cached, Err(CacheError::Unavailable { .. })));
    let query = SqlText::new("SELECT * FROM users WHERE id = 42").expect("valid sql");
    let rows = store.read(&query).await.expect("primary path unaffected");
    assert_eq!(rows.len(), 1);

    // Readiness reflects the outage without unregistering the backend.
    let report = registry.readiness().await;
    assert!(!report.all_ready());
    let session_state = report
        .resources
        .iter()
        .find(|r| r.logical_name == "sessions")
        .expect("cache is reported");
    assert!(!session_state.ready);

    cache_down.store(false, Ordering::Release);
    assert_eq!(
        cache.get("user:42").await.expect("cache recovered"),
        Some("cached".to_string())
    );
}

#[tokio::test]
async fn hot_swap_under_concurrent_traffic_drops_no_requests() {
    let registry = Arc::new(
        Registry::start(
            descriptors(SWAP_RELATIONAL),
            Arc::new(StubFactory::new()),
            options(),
        )
        .await
        .expect("startup succeeds"),
    );

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let query = SqlText::new("SELECT 1").expect("valid sql");
                let mut markers = Vec::new();
                for _ in 0..50 {
                    let store = registry.resolve_relational("primary").expect("resolves");
                    let rows = store.read(&query).await.expect("no request drops");
                    markers.push(rows[0]["marker"].as_str().expect("marker").to_string());
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                markers
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let replacement = descriptors(SWAP_RELATIONAL).remove(0);
    registry
        .replace(replacement)
        .await
        .expect("swap succeeds under traffic");

    let mut seen = Vec::new();
    for reader in readers {
        seen.extend(reader.await.expect("reader completes"));
    }
    // Traffic crossed the swap: both generations served requests.
    assert!(seen.iter().any(|m| m == "generation-0"));
    assert!(seen.iter().any(|m| m == "generation-1"));
}

#[tokio::test]
async fn leased_tasks_stay_pending_until_acknowledged() {
    let registry = Registry::start(
        descriptors(
            r#"
            [[resources]]
            name = "jobs"
            kind = "queue"
            [resources.params]
            uri = "redis://localhost:6379/1"
            "#,
        ),
        Arc::new(StubFactory::new()),
        options(),
    )
    .await
    .expect("startup succeeds");
    let queue = registry.resolve_queue("jobs").expect("resolves");

    queue
        .enqueue("send_welcome_email", &json!({ "user_id": 1 }))
        .await
        .expect("enqueues");
    queue
        .enqueue("send_welcome_email", &json!({ "user_id": 2 }))
        .await
        .expect("enqueues");

    let first = queue.lease().await.expect("leases").expect("task present");
    assert_eq!(first.kind, "send_welcome_email");
    assert_eq!(first.payload["user_id"], 1);

    queue.ack(&first.receipt).await.expect("ack succeeds");
    // A second ack of the same receipt has nothing to remove.
    assert!(matches!(
        queue.ack(&first.receipt).await,
        Err(QueueError::ReceiptNotFound { .. })
    ));

    let second = queue.lease().await.expect("leases").expect("task present");
    assert_eq!(second.payload["user_id"], 2);
    let drained = queue.lease().await.expect("leases");
    assert!(drained.is_none());
}

#[tokio::test]
async fn stopped_registry_rejects_resolution_and_reports_clean_shutdown() {
    let registry = Registry::start(
        descriptors(SINGLE_RELATIONAL),
        Arc::new(StubFactory::new()),
        options(),
    )
    .await
    .expect("startup succeeds");

    let report = registry.stop().await;
    assert!(report.is_clean());
    assert!(registry.resolve_relational("primary").is_err());

    let replacement = descriptors(SINGLE_RELATIONAL).remove(0);
    assert!(registry.replace(replacement).await.is_err());
}
