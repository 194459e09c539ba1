mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::runtime_with;
use tether::{
    ActionInvocation, LocalCache, MemoryCache, MockRemote, ReactiveRegistry, RemoteBoundary,
    SyncError, SyncRuntime, ThingQuery, ThingRecord,
};

fn setup() -> (SyncRuntime, Arc<MemoryCache>, Arc<MockRemote>) {
    let cache = Arc::new(MemoryCache::new());
    let remote = Arc::new(MockRemote::new());
    let cache_dyn: Arc<dyn LocalCache> = Arc::clone(&cache) as Arc<dyn LocalCache>;
    let remote_dyn: Arc<dyn RemoteBoundary> = Arc::clone(&remote) as Arc<dyn RemoteBoundary>;
    let runtime = runtime_with(cache_dyn, remote_dyn, Arc::new(ReactiveRegistry::new()));
    (runtime, cache, remote)
}

fn add_invocation(url: &str) -> ActionInvocation {
    let mut payload = HashMap::new();
    payload.insert("url".to_string(), serde_json::json!(url));
    payload.insert("saved".to_string(), serde_json::json!(true));
    ActionInvocation::new("add_bookmark", payload)
}

#[tokio::test]
async fn test_local_read_of_missing_data_is_absent_success() {
    let (runtime, _cache, remote) = setup();

    let pending = runtime.local_read(ThingQuery::new("Bookmark", "https://example.com"));
    assert_eq!(pending.outcome().await, Ok(None));
    // Local-only reads never touch the remote boundary.
    assert!(remote.requests().is_empty());
}

#[tokio::test]
async fn test_full_sync_applies_optimistic_effect_then_reconciles() {
    let (runtime, cache, remote) = setup();
    remote.hold();

    let query = ThingQuery::new("Bookmark", "https://example.com");
    let pending = runtime.sync(query.clone(), Some(add_invocation("https://example.com")));

    // The optimistic merge lands in the cache before the remote answers.
    while remote.requests().is_empty() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let optimistic = cache.get("Bookmark", "https://example.com").unwrap().unwrap();
    assert_eq!(optimistic.fields["saved"], serde_json::json!(true));

    remote.release();
    let record = pending.outcome().await.unwrap();
    assert_eq!(record.fields["url"], serde_json::json!("https://example.com"));

    // The authoritative response replaced the optimistic record.
    let cached = cache.get("Bookmark", "https://example.com").unwrap().unwrap();
    assert_eq!(cached, record);
}

#[tokio::test]
async fn test_sync_routes_through_endpoint_and_defaults() {
    let (runtime, _cache, remote) = setup();

    let query = ThingQuery::new("Bookmark", "https://example.com");
    runtime
        .sync(query, Some(add_invocation("https://example.com")))
        .outcome()
        .await
        .unwrap();

    let requests = remote.requests();
    assert_eq!(requests.len(), 1);
    // The action's endpoint path wins; remote and auth fall back to the
    // schema defaults.
    assert_eq!(requests[0].path.as_deref(), Some("/bookmarks/add"));
    assert_eq!(requests[0].remote.as_deref(), Some("primary"));
    assert_eq!(requests[0].auth.as_deref(), Some("api_key"));
}

#[tokio::test]
async fn test_remote_failure_is_delivered_once_with_completion() {
    let (runtime, _cache, remote) = setup();
    remote.fail_with(
        "Bookmark",
        "https://example.com",
        SyncError::RemoteRejected("quota exceeded".to_string()),
    );

    let pending = runtime.sync(
        ThingQuery::new("Bookmark", "https://example.com"),
        Some(add_invocation("https://example.com")),
    );
    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    pending.on_complete(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(
        pending.outcome().await,
        Err(SyncError::RemoteRejected("quota exceeded".to_string()))
    );
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_abandon_while_remote_in_flight_cancels() {
    let (runtime, _cache, remote) = setup();
    remote.hold();

    let pending = runtime.sync(
        ThingQuery::new("Bookmark", "https://example.com"),
        Some(add_invocation("https://example.com")),
    );
    let mut completion = pending.completion();

    // Wait until the request is actually in flight behind the gate.
    while remote.requests().is_empty() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    pending.abandon();

    assert_eq!(pending.outcome().await, Err(SyncError::Cancelled));
    completion.wait().await;
    assert!(completion.is_complete());
    remote.release();
}

#[tokio::test]
async fn test_local_read_refreshes_reactive_fields() {
    let cache = Arc::new(MemoryCache::new());
    let remote = Arc::new(MockRemote::new());
    let registry = Arc::new(ReactiveRegistry::new());
    registry.register("Bookmark", "display", |inputs| {
        let title = inputs["title"].as_str().unwrap_or("untitled");
        let url = inputs["url"].as_str().unwrap_or("");
        Ok(serde_json::json!(format!("{} ({})", title, url)))
    });
    let runtime = runtime_with(
        Arc::clone(&cache) as Arc<dyn LocalCache>,
        Arc::clone(&remote) as Arc<dyn RemoteBoundary>,
        registry,
    );

    let mut fields = HashMap::new();
    fields.insert("title".to_string(), serde_json::json!("Example"));
    fields.insert("url".to_string(), serde_json::json!("https://example.com"));
    cache
        .put(ThingRecord::new("Bookmark", "https://example.com").with_fields(fields))
        .unwrap();

    let record = runtime
        .local_read(ThingQuery::new("Bookmark", "https://example.com"))
        .outcome()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.fields["display"],
        serde_json::json!("Example (https://example.com)")
    );
    // The recomputed value was written back to the cache.
    let cached = cache.get("Bookmark", "https://example.com").unwrap().unwrap();
    assert_eq!(cached.fields["display"], record.fields["display"]);
    assert!(remote.requests().is_empty());
}

#[tokio::test]
async fn test_sync_without_action_is_a_pure_query() {
    let (runtime, cache, remote) = setup();
    let mut scripted = ThingRecord::new("Bookmark", "https://example.com");
    scripted
        .fields
        .insert("saved".to_string(), serde_json::json!(true));
    remote.respond_with(scripted.clone());

    let record = runtime
        .sync(ThingQuery::new("Bookmark", "https://example.com"), None)
        .outcome()
        .await
        .unwrap();
    assert_eq!(record, scripted);

    let requests = remote.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].action.is_none());
    assert_eq!(cache.get("Bookmark", "https://example.com").unwrap(), Some(record));
}
