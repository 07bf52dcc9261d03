// Application facade — wires the worker, the page, and the ticker together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{AppConfig, TICK_INTERVAL_MS};
use crate::engine::bucket::BucketStore;
use crate::engine::coordinator::{Coordinator, WorkerEvent};
use crate::page::session::{self, PageSession};
use crate::page::view::{self, ViewModel};
use crate::source::traits::ResourceSource;

struct AppInner {
    config: RwLock<AppConfig>,
    coordinator: Arc<Coordinator>,
    page: PageSession,
    view: RwLock<ViewModel>,
    countdown: RwLock<String>,
    shown_date: RwLock<NaiveDate>,
}

/// The assembled application: one background worker, one controlled page,
/// and the once-per-second midnight poll.
pub struct DevotionalApp {
    inner: Arc<AppInner>,
    cancel: CancellationToken,
}

impl DevotionalApp {
    /// Deploy the configured version and load today's entry.
    ///
    /// A failed install is not fatal: the page still loads over the live
    /// source, it just has no offline copy yet.
    pub async fn start(config: AppConfig, source: Arc<dyn ResourceSource>) -> Result<Self> {
        let store = BucketStore::open(Path::new(&config.cache_dir))?;
        let coordinator = Arc::new(Coordinator::new(
            store,
            source,
            AppConfig::volatile_resources(),
        ));

        if let Err(e) = coordinator.install(&config).await {
            warn!("install failed, continuing without offline copy: {}", e);
        }

        let page = PageSession::new(Arc::clone(&coordinator));
        let today = Local::now().date_naive();
        let view = page.load_or_degraded(today).await;
        let tick = session::tick_at(Local::now().naive_local(), today);

        let inner = Arc::new(AppInner {
            config: RwLock::new(config),
            coordinator,
            page,
            view: RwLock::new(view),
            countdown: RwLock::new(tick.countdown),
            shown_date: RwLock::new(today),
        });

        let cancel = CancellationToken::new();
        tokio::spawn(run_ticker(Arc::clone(&inner), cancel.clone()));

        Ok(Self { inner, cancel })
    }

    /// Current view model.
    pub fn view(&self) -> ViewModel {
        self.inner.view.read().clone()
    }

    /// Current countdown display text.
    pub fn countdown(&self) -> String {
        self.inner.countdown.read().clone()
    }

    /// Worker lifecycle events (update waiting, activated).
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.inner.coordinator.subscribe()
    }

    /// Plain-text share payload for the current entry.
    pub fn share_text(&self) -> String {
        view::share_text(&self.inner.view.read())
    }

    /// Re-derive today's slot and reload both data resources.
    pub async fn reload(&self) {
        reload(&self.inner).await;
    }

    /// Make a new deployment version known to the worker. With pages
    /// attached it parks as waiting and an update event fires; accept it
    /// with [`accept_update`](Self::accept_update).
    pub async fn deploy_update(&self, version: &str) -> Result<()> {
        let config = {
            let mut config = self.inner.config.write();
            config.version = version.to_string();
            config.clone()
        };
        self.inner.coordinator.install(&config).await
    }

    /// Accept a pending update: skip-waiting handshake, then full reload.
    pub async fn accept_update(&self) -> Result<()> {
        self.inner.coordinator.skip_waiting()?;
        reload(&self.inner).await;
        Ok(())
    }

    /// Hard refresh escape hatch: wipe every cache bucket, reinstall the
    /// current version, and reload.
    pub async fn hard_refresh(&self) -> Result<()> {
        self.inner.coordinator.reset()?;
        let config = self.inner.config.read().clone();
        if let Err(e) = self.inner.coordinator.install(&config).await {
            warn!("reinstall after hard refresh failed: {}", e);
        }
        reload(&self.inner).await;
        Ok(())
    }

    /// Stop the ticker and background refresh tasks.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.inner.coordinator.shutdown();
    }
}

impl Drop for DevotionalApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn reload(inner: &Arc<AppInner>) {
    let today = Local::now().date_naive();
    let view = inner.page.load_or_degraded(today).await;
    *inner.view.write() = view;
    *inner.shown_date.write() = today;
}

/// Once-per-second poll: refresh the countdown and fully reload when the
/// local civil date changes. Drift is tolerable; only the countdown text
/// and the day-boundary reload are externally visible.
async fn run_ticker(inner: Arc<AppInner>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Local::now().naive_local();
                let shown = *inner.shown_date.read();
                let tick = session::tick_at(now, shown);
                *inner.countdown.write() = tick.countdown;
                if tick.rolled_over {
                    info!("local date rolled over to {}", now.date());
                    reload(&inner).await;
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}
