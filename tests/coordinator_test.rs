// Integration tests for the update coordinator against a fake deployment
// origin.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::RwLock;
use tokio::net::TcpListener;

use devotional_engine::config::{AppConfig, DEVOTIONAL_RESOURCE, MUSIC_RESOURCE};
use devotional_engine::engine::bucket::BucketStore;
use devotional_engine::engine::coordinator::{bucket_name, Coordinator, WorkerEvent};
use devotional_engine::source::http_source::HttpSource;

#[derive(Clone)]
struct Upstream {
    resources: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    offline: Arc<AtomicBool>,
}

impl Upstream {
    fn new() -> Self {
        Self {
            resources: Arc::new(RwLock::new(HashMap::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    fn put(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.resources.write().insert(path.to_string(), body.into());
    }

    fn remove(&self, path: &str) {
        self.resources.write().remove(path);
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }
}

async fn serve_resource(State(upstream): State<Upstream>, uri: Uri) -> Response {
    if upstream.offline.load(Ordering::Relaxed) {
        return (StatusCode::SERVICE_UNAVAILABLE, "offline").into_response();
    }
    let path = uri.path().trim_start_matches('/').to_string();
    match upstream.resources.read().get(&path) {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json".to_string())],
            body.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn start_upstream(upstream: Upstream) -> SocketAddr {
    let app = Router::new().fallback(serve_resource).with_state(upstream);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

fn devotional_json() -> Vec<u8> {
    let records: Vec<_> = (1..=365)
        .map(|i| {
            serde_json::json!({
                "title": format!("Title {i}"),
                "reading": format!("Reading {i}"),
                "message": format!("Message {i}"),
                "prayer": format!("Prayer {i}"),
                "practice": format!("Practice {i}"),
            })
        })
        .collect();
    serde_json::to_vec(&records).unwrap()
}

fn test_config(version: &str, cache_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        version: version.to_string(),
        cache_dir: cache_dir.to_string_lossy().into_owned(),
        shell_assets: vec!["index.html".to_string(), "app.js".to_string()],
    }
}

fn seed(upstream: &Upstream) {
    upstream.put("index.html", b"<html>shell</html>".to_vec());
    upstream.put("app.js", b"console.log('shell')".to_vec());
    upstream.put(DEVOTIONAL_RESOURCE, devotional_json());
    upstream.put(MUSIC_RESOURCE, br#"{"enabled": false}"#.to_vec());
}

fn coordinator_at(addr: SocketAddr, cache_dir: &std::path::Path) -> (Arc<Coordinator>, BucketStore) {
    let store = BucketStore::open(cache_dir).unwrap();
    let source = Arc::new(HttpSource::new(&format!("http://{}/", addr)).unwrap());
    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        source,
        AppConfig::volatile_resources(),
    ));
    (coordinator, store)
}

#[tokio::test]
async fn test_install_populates_manifest_and_serves_offline() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, store) = coordinator_at(addr, dir.path());

    let config = test_config("v1", dir.path());
    coordinator.install(&config).await.unwrap();

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.active.as_deref(), Some("v1"));
    assert_eq!(store.list().unwrap(), vec![bucket_name("v1")]);

    let bucket = store.bucket(&bucket_name("v1")).unwrap();
    for path in config.manifest() {
        assert!(bucket.has(&path), "missing manifest entry {path}");
    }

    // The whole manifest keeps serving with the network gone.
    upstream.set_offline(true);
    let devotional = coordinator.fetch(DEVOTIONAL_RESOURCE).await.unwrap();
    assert_eq!(devotional.body, devotional_json());
    let shell = coordinator.fetch("index.html").await.unwrap();
    assert_eq!(&shell.body[..], b"<html>shell</html>");
}

#[tokio::test]
async fn test_install_failure_rejects_version() {
    let upstream = Upstream::new();
    seed(&upstream);
    upstream.remove("app.js");
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, store) = coordinator_at(addr, dir.path());

    let err = coordinator
        .install(&test_config("v1", dir.path()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("aborted"), "unexpected error: {err}");

    // No partial bucket survives and nothing activated.
    assert!(store.list().unwrap().is_empty());
    assert_eq!(coordinator.snapshot().active, None);
}

#[tokio::test]
async fn test_failed_update_keeps_prior_version_serving() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, store) = coordinator_at(addr, dir.path());

    coordinator.install(&test_config("v1", dir.path())).await.unwrap();

    upstream.remove("app.js");
    coordinator.attach_page();
    assert!(coordinator
        .install(&test_config("v2", dir.path()))
        .await
        .is_err());

    assert_eq!(coordinator.snapshot().active.as_deref(), Some("v1"));
    assert_eq!(store.list().unwrap(), vec![bucket_name("v1")]);

    upstream.set_offline(true);
    assert!(coordinator.fetch(DEVOTIONAL_RESOURCE).await.is_ok());
}

#[tokio::test]
async fn test_update_waits_then_skip_waiting_activates() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, store) = coordinator_at(addr, dir.path());

    coordinator.install(&test_config("v1", dir.path())).await.unwrap();
    coordinator.attach_page();

    let mut events = coordinator.subscribe();
    coordinator.install(&test_config("v2", dir.path())).await.unwrap();

    // Parked behind the controlling version, page notified.
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.active.as_deref(), Some("v1"));
    assert_eq!(snapshot.waiting.as_deref(), Some("v2"));
    assert_eq!(
        events.try_recv().unwrap(),
        WorkerEvent::UpdateWaiting {
            version: "v2".to_string()
        }
    );
    let mut buckets = store.list().unwrap();
    buckets.sort();
    assert_eq!(buckets, vec![bucket_name("v1"), bucket_name("v2")]);

    // Explicit handshake promotes immediately.
    coordinator.skip_waiting().unwrap();
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.active.as_deref(), Some("v2"));
    assert_eq!(snapshot.waiting, None);
    assert_eq!(
        events.try_recv().unwrap(),
        WorkerEvent::Activated {
            version: "v2".to_string()
        }
    );

    // Activation leaves exactly the current version's bucket.
    assert_eq!(store.list().unwrap(), vec![bucket_name("v2")]);
}

#[tokio::test]
async fn test_last_page_detach_promotes_waiting_version() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _store) = coordinator_at(addr, dir.path());

    coordinator.install(&test_config("v1", dir.path())).await.unwrap();
    coordinator.attach_page();
    coordinator.attach_page();
    coordinator.install(&test_config("v2", dir.path())).await.unwrap();

    coordinator.detach_page();
    assert_eq!(coordinator.snapshot().active.as_deref(), Some("v1"));

    coordinator.detach_page();
    assert_eq!(coordinator.snapshot().active.as_deref(), Some("v2"));
    assert_eq!(coordinator.snapshot().waiting, None);
}

#[tokio::test]
async fn test_volatile_resource_is_network_first() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _store) = coordinator_at(addr, dir.path());

    coordinator.install(&test_config("v1", dir.path())).await.unwrap();

    // Fresh upstream content must win over the installed copy...
    upstream.put(MUSIC_RESOURCE, br#"{"enabled": true}"#.to_vec());
    let live = coordinator.fetch(MUSIC_RESOURCE).await.unwrap();
    assert_eq!(&live.body[..], br#"{"enabled": true}"#);

    // ...and the stored copy follows the last successful fetch.
    upstream.set_offline(true);
    let cached = coordinator.fetch(MUSIC_RESOURCE).await.unwrap();
    assert_eq!(&cached.body[..], br#"{"enabled": true}"#);
}

#[tokio::test]
async fn test_volatile_miss_without_cache_fails() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _store) = coordinator_at(addr, dir.path());

    // Nothing installed, network down: the load failure propagates.
    upstream.set_offline(true);
    assert!(coordinator.fetch(DEVOTIONAL_RESOURCE).await.is_err());
}

#[tokio::test]
async fn test_shell_resource_is_cache_first_with_background_refresh() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, store) = coordinator_at(addr, dir.path());

    coordinator.install(&test_config("v1", dir.path())).await.unwrap();

    upstream.put("index.html", b"<html>next</html>".to_vec());

    // Cached copy comes back immediately even though upstream changed.
    let served = coordinator.fetch("index.html").await.unwrap();
    assert_eq!(&served.body[..], b"<html>shell</html>");

    // The background refresh lands in the bucket for next time.
    let bucket = store.bucket(&bucket_name("v1")).unwrap();
    let mut refreshed = false;
    for _ in 0..100 {
        if bucket
            .get("index.html")
            .is_some_and(|r| &r.body[..] == b"<html>next</html>")
        {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refreshed, "bucket was not revalidated");

    let served = coordinator.fetch("index.html").await.unwrap();
    assert_eq!(&served.body[..], b"<html>next</html>");
}

#[tokio::test]
async fn test_shell_cache_miss_awaits_live_fetch_and_stores_copy() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, store) = coordinator_at(addr, dir.path());

    coordinator.install(&test_config("v1", dir.path())).await.unwrap();

    // Not part of the manifest, so the first request misses the cache.
    upstream.put("assets/logo.png", b"png bytes".to_vec());
    let served = coordinator.fetch("assets/logo.png").await.unwrap();
    assert_eq!(&served.body[..], b"png bytes");

    let bucket = store.bucket(&bucket_name("v1")).unwrap();
    assert!(bucket.has("assets/logo.png"));
}

#[tokio::test]
async fn test_hard_reset_deletes_every_bucket() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, store) = coordinator_at(addr, dir.path());

    coordinator.install(&test_config("v1", dir.path())).await.unwrap();
    coordinator.attach_page();
    coordinator.install(&test_config("v2", dir.path())).await.unwrap();

    coordinator.reset().unwrap();
    assert!(store.list().unwrap().is_empty());
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.active, None);
    assert_eq!(snapshot.waiting, None);
}

#[tokio::test]
async fn test_reinstalling_active_version_is_a_no_op() {
    let upstream = Upstream::new();
    seed(&upstream);
    let addr = start_upstream(upstream.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, store) = coordinator_at(addr, dir.path());

    let config = test_config("v1", dir.path());
    coordinator.install(&config).await.unwrap();
    coordinator.install(&config).await.unwrap();

    assert_eq!(store.list().unwrap(), vec![bucket_name("v1")]);
    assert_eq!(coordinator.snapshot().active.as_deref(), Some("v1"));
}
