mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use common::runtime_with;
use serde_json::Value as JsonValue;
use tether::{
    ActionInvocation, LocalCache, MemoryCache, MockRemote, ReactiveRegistry, RemoteBoundary,
    SaveOutcome, SyncError, SyncResult, SyncRuntime, ThingQuery, ThingRecord,
};

/// Cache whose reads block until released, for exercising the composite's
/// cancellation window between stages.
struct GatedCache {
    inner: MemoryCache,
    open: Mutex<bool>,
    released: Condvar,
    entered: AtomicBool,
}

impl GatedCache {
    fn new() -> Self {
        Self {
            inner: MemoryCache::new(),
            open: Mutex::new(false),
            released: Condvar::new(),
            entered: AtomicBool::new(false),
        }
    }

    fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    fn release(&self) {
        let mut open = self.open.lock().unwrap();
        *open = true;
        self.released.notify_all();
    }
}

impl LocalCache for GatedCache {
    fn get(&self, thing: &str, key: &str) -> SyncResult<Option<ThingRecord>> {
        self.entered.store(true, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.released.wait(open).unwrap();
        }
        drop(open);
        self.inner.get(thing, key)
    }

    fn put(&self, record: ThingRecord) -> SyncResult<()> {
        self.inner.put(record)
    }

    fn merge(
        &self,
        thing: &str,
        key: &str,
        patch: &HashMap<String, JsonValue>,
    ) -> SyncResult<ThingRecord> {
        self.inner.merge(thing, key, patch)
    }

    fn remove(&self, thing: &str, key: &str) -> SyncResult<bool> {
        self.inner.remove(thing, key)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Cache that fails reads on demand while writes keep working
struct FlakyCache {
    inner: MemoryCache,
    fail_gets: AtomicBool,
}

impl FlakyCache {
    fn new() -> Self {
        Self {
            inner: MemoryCache::new(),
            fail_gets: AtomicBool::new(false),
        }
    }

    fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }
}

impl LocalCache for FlakyCache {
    fn get(&self, thing: &str, key: &str) -> SyncResult<Option<ThingRecord>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(SyncError::Cache("read failure injected".to_string()));
        }
        self.inner.get(thing, key)
    }

    fn put(&self, record: ThingRecord) -> SyncResult<()> {
        self.inner.put(record)
    }

    fn merge(
        &self,
        thing: &str,
        key: &str,
        patch: &HashMap<String, JsonValue>,
    ) -> SyncResult<ThingRecord> {
        self.inner.merge(thing, key, patch)
    }

    fn remove(&self, thing: &str, key: &str) -> SyncResult<bool> {
        self.inner.remove(thing, key)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

fn add_invocation(url: &str) -> ActionInvocation {
    let mut payload = HashMap::new();
    payload.insert("url".to_string(), serde_json::json!(url));
    payload.insert("saved".to_string(), serde_json::json!(true));
    ActionInvocation::new("add_bookmark", payload)
}

fn runtime_over(cache: Arc<dyn LocalCache>, remote: Arc<MockRemote>) -> SyncRuntime {
    runtime_with(
        cache,
        remote as Arc<dyn RemoteBoundary>,
        Arc::new(ReactiveRegistry::new()),
    )
}

#[tokio::test]
async fn test_save_reports_newly_added_then_already_present() {
    let remote = Arc::new(MockRemote::new());
    let runtime = runtime_over(Arc::new(MemoryCache::new()), Arc::clone(&remote));
    let query = ThingQuery::new("Bookmark", "https://example.com");

    let first = runtime
        .save(query.clone(), add_invocation("https://example.com"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(first.outcome, SaveOutcome::NewlyAdded);

    let second = runtime
        .save(query, add_invocation("https://example.com"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(second.outcome, SaveOutcome::AlreadyPresent);

    // The repeated mutation carried the same idempotency hash and produced
    // the same authoritative field state: no double-counted side effect.
    let requests = remote.requests();
    assert_eq!(requests.len(), 2);
    let first_hash = &requests[0].action.as_ref().unwrap().idempotency_hash;
    let second_hash = &requests[1].action.as_ref().unwrap().idempotency_hash;
    assert_eq!(first_hash, second_hash);
    assert_eq!(first.record.fields, second.record.fields);
}

#[tokio::test]
async fn test_stage_one_failure_is_informational_not_fatal() {
    let cache = Arc::new(FlakyCache::new());
    let remote = Arc::new(MockRemote::new());
    let runtime = runtime_over(
        Arc::clone(&cache) as Arc<dyn LocalCache>,
        Arc::clone(&remote),
    );

    cache.fail_gets(true);
    let report = runtime
        .save(
            ThingQuery::new("Bookmark", "https://example.com"),
            add_invocation("https://example.com"),
        )
        .outcome()
        .await
        .unwrap();

    // The failed local read is absorbed as absence; the sync still ran.
    assert_eq!(report.outcome, SaveOutcome::NewlyAdded);
    assert_eq!(remote.requests().len(), 1);
}

#[tokio::test]
async fn test_stage_two_failure_is_the_terminal_failure() {
    let remote = Arc::new(MockRemote::new());
    remote.fail_with(
        "Bookmark",
        "https://example.com",
        SyncError::RemoteUnavailable("connection refused".to_string()),
    );
    let runtime = runtime_over(Arc::new(MemoryCache::new()), Arc::clone(&remote));

    let pending = runtime.save(
        ThingQuery::new("Bookmark", "https://example.com"),
        add_invocation("https://example.com"),
    );
    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    pending.on_complete(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(
        pending.outcome().await,
        Err(SyncError::RemoteUnavailable("connection refused".to_string()))
    );
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandon_between_stages_prevents_stage_two() {
    let cache = Arc::new(GatedCache::new());
    let remote = Arc::new(MockRemote::new());
    let runtime = runtime_over(
        Arc::clone(&cache) as Arc<dyn LocalCache>,
        Arc::clone(&remote),
    );

    let pending = runtime.save(
        ThingQuery::new("Bookmark", "https://example.com"),
        add_invocation("https://example.com"),
    );
    let mut completion = pending.completion();

    // Hold the composite inside stage one, abandon it, then let stage one
    // finish: stage two must never start.
    while !cache.entered() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    pending.abandon();
    cache.release();

    assert_eq!(pending.outcome().await, Err(SyncError::Cancelled));
    completion.wait().await;
    assert!(remote.requests().is_empty());
}

#[tokio::test]
async fn test_abandon_during_stage_two_cancels_the_composite() {
    let remote = Arc::new(MockRemote::new());
    remote.hold();
    let runtime = runtime_over(Arc::new(MemoryCache::new()), Arc::clone(&remote));

    let pending = runtime.save(
        ThingQuery::new("Bookmark", "https://example.com"),
        add_invocation("https://example.com"),
    );
    while remote.requests().is_empty() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    pending.abandon();

    assert_eq!(pending.outcome().await, Err(SyncError::Cancelled));
    remote.release();
}
