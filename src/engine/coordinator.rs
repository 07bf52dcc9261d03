// Update coordinator — versioned bucket lifecycle and request interception.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bucket::{Bucket, BucketStore};
use crate::config::{AppConfig, BUCKET_PREFIX};
use crate::source::traits::{FetchedResource, ResourceSource};

/// Bucket name for a deployment version. All naming and eviction is driven
/// by this single derivation.
pub fn bucket_name(version: &str) -> String {
    format!("{}-{}", BUCKET_PREFIX, version)
}

/// Lifecycle signals broadcast to attached pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// A newly installed version is parked behind the active one.
    UpdateWaiting { version: String },
    /// A version finished activation and now controls all requests.
    Activated { version: String },
}

/// Externally observable lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub active: Option<String>,
    pub waiting: Option<String>,
    pub attached_pages: usize,
}

struct Deployment {
    version: String,
    bucket: Bucket,
}

struct CoordinatorState {
    active: Option<Deployment>,
    waiting: Option<Deployment>,
    attached_pages: usize,
}

/// The background worker: installs versioned caches, owns the
/// waiting/activation handshake, and intercepts every page resource fetch.
pub struct Coordinator {
    store: BucketStore,
    source: Arc<dyn ResourceSource>,
    volatile: Vec<String>,
    state: RwLock<CoordinatorState>,
    events: broadcast::Sender<WorkerEvent>,
    shutdown: CancellationToken,
}

impl Coordinator {
    /// `volatile` lists the data resource paths served network-first;
    /// everything else goes cache-first.
    pub fn new(store: BucketStore, source: Arc<dyn ResourceSource>, volatile: Vec<String>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            source,
            volatile,
            state: RwLock::new(CoordinatorState {
                active: None,
                waiting: None,
                attached_pages: 0,
            }),
            events,
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// A page starts being controlled by this coordinator. Attached pages
    /// keep the active version in control until they detach or send the
    /// skip-waiting signal.
    pub fn attach_page(&self) {
        self.state.write().attached_pages += 1;
    }

    /// A page went away. When the last one detaches, a waiting version is
    /// promoted immediately.
    pub fn detach_page(&self) {
        let promote = {
            let mut state = self.state.write();
            state.attached_pages = state.attached_pages.saturating_sub(1);
            if state.attached_pages == 0 {
                state.waiting.take()
            } else {
                None
            }
        };
        if let Some(deployment) = promote {
            if let Err(e) = self.activate(deployment) {
                warn!("activation after page detach failed: {}", e);
            }
        }
    }

    /// Install the configured version: create its bucket and pre-populate
    /// the full asset manifest.
    ///
    /// Any fetch failure rejects the version and removes the partial
    /// bucket; a previously active version stays in control. With no
    /// active version or no attached pages the new version activates
    /// immediately, otherwise it parks as waiting and pages are notified.
    pub async fn install(&self, config: &AppConfig) -> Result<()> {
        let version = config.version.clone();
        {
            let state = self.state.read();
            let already = |d: &Option<Deployment>| {
                d.as_ref().map(|d| d.version.as_str()) == Some(version.as_str())
            };
            if already(&state.active) || already(&state.waiting) {
                debug!("version {} already installed", version);
                return Ok(());
            }
        }

        let name = bucket_name(&version);
        info!("installing version {}", version);
        let bucket = self.store.bucket(&name)?;

        for path in config.manifest() {
            let resource = match self.source.fetch(&path).await {
                Ok(resource) => resource,
                Err(e) => {
                    warn!("install fetch failed path={}: {}", path, e);
                    let _ = self.store.delete(&name);
                    return Err(anyhow!("install of {} aborted: {}", version, e));
                }
            };
            bucket.put(&path, &resource)?;
        }

        let deployment = Deployment {
            version: version.clone(),
            bucket,
        };

        {
            let mut state = self.state.write();
            if state.active.is_some() && state.attached_pages > 0 {
                info!("version {} installed, waiting", version);
                state.waiting = Some(deployment);
                drop(state);
                let _ = self.events.send(WorkerEvent::UpdateWaiting { version });
                return Ok(());
            }
        }

        self.activate(deployment)
    }

    /// Explicit page→worker handshake: promote the waiting version now
    /// instead of waiting for all pages to detach. No-op when nothing is
    /// parked.
    pub fn skip_waiting(&self) -> Result<()> {
        let waiting = self.state.write().waiting.take();
        match waiting {
            Some(deployment) => {
                info!("skip-waiting received for {}", deployment.version);
                self.activate(deployment)
            }
            None => Ok(()),
        }
    }

    /// Activation: evict every bucket that is not this version's, then take
    /// over the request path. Afterwards exactly one bucket remains.
    fn activate(&self, deployment: Deployment) -> Result<()> {
        info!("activating version {}", deployment.version);
        let deleted = self.store.retain_only(&bucket_name(&deployment.version))?;
        if !deleted.is_empty() {
            debug!("evicted stale buckets: {:?}", deleted);
        }

        let version = deployment.version.clone();
        {
            let mut state = self.state.write();
            state.active = Some(deployment);
            // Anything still parked lost its bucket in the sweep above.
            state.waiting = None;
        }
        let _ = self.events.send(WorkerEvent::Activated { version });
        Ok(())
    }

    /// Page-triggered hard reset: delete every bucket by name. The page is
    /// expected to force a full reload (and reinstall) afterwards.
    pub fn reset(&self) -> Result<()> {
        warn!("hard reset: deleting all cache buckets");
        self.store.delete_all()?;
        let mut state = self.state.write();
        state.active = None;
        state.waiting = None;
        Ok(())
    }

    /// Serve one resource request from a controlled page.
    ///
    /// Volatile data resources go network-first with cache fallback; shell
    /// resources come cache-first with a background refresh.
    pub async fn fetch(&self, path: &str) -> Result<FetchedResource> {
        let bucket = self.active_bucket();
        if self.volatile.iter().any(|p| p == path) {
            self.fetch_network_first(path, bucket).await
        } else {
            self.fetch_cache_first(path, bucket).await
        }
    }

    async fn fetch_network_first(
        &self,
        path: &str,
        bucket: Option<Bucket>,
    ) -> Result<FetchedResource> {
        match self.source.fetch(path).await {
            Ok(resource) => {
                if let Some(bucket) = &bucket {
                    if let Err(e) = bucket.put(path, &resource) {
                        warn!("cache write failed path={}: {}", path, e);
                    }
                }
                Ok(resource)
            }
            Err(e) => match bucket.as_ref().and_then(|b| b.get(path)) {
                Some(cached) => {
                    debug!("network failed for {}, serving cached copy", path);
                    Ok(cached)
                }
                None => {
                    warn!("load failure path={} with no cached fallback: {}", path, e);
                    Err(e)
                }
            },
        }
    }

    async fn fetch_cache_first(
        &self,
        path: &str,
        bucket: Option<Bucket>,
    ) -> Result<FetchedResource> {
        if let Some(bucket) = &bucket {
            if let Some(cached) = bucket.get(path) {
                self.spawn_revalidate(path.to_string(), bucket.clone());
                return Ok(cached);
            }
        }

        let resource = self.source.fetch(path).await?;
        if let Some(bucket) = &bucket {
            if let Err(e) = bucket.put(path, &resource) {
                warn!("cache write failed path={}: {}", path, e);
            }
        }
        Ok(resource)
    }

    /// Refresh a cached shell resource in the background for next time.
    fn spawn_revalidate(&self, path: String, bucket: Bucket) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let source = Arc::clone(&self.source);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = source.fetch(&path) => match result {
                    Ok(resource) => {
                        if let Err(e) = bucket.put(&path, &resource) {
                            warn!("revalidate cache write failed path={}: {}", path, e);
                        } else {
                            debug!("revalidated {}", path);
                        }
                    }
                    Err(e) => debug!("revalidate fetch failed path={}: {}", path, e),
                },
                _ = shutdown.cancelled() => {}
            }
        });
    }

    fn active_bucket(&self) -> Option<Bucket> {
        self.state.read().active.as_ref().map(|d| d.bucket.clone())
    }

    pub fn active_version(&self) -> Option<String> {
        self.state.read().active.as_ref().map(|d| d.version.clone())
    }

    pub fn waiting_version(&self) -> Option<String> {
        self.state.read().waiting.as_ref().map(|d| d.version.clone())
    }

    /// Current lifecycle state, for hosts and tests.
    pub fn snapshot(&self) -> LifecycleSnapshot {
        let state = self.state.read();
        LifecycleSnapshot {
            active: state.active.as_ref().map(|d| d.version.clone()),
            waiting: state.waiting.as_ref().map(|d| d.version.clone()),
            attached_pages: state.attached_pages,
        }
    }

    /// Cancel in-flight background refreshes and stop starting new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
