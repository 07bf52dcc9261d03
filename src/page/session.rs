// Page session — loads the day's resources through the coordinator and
// computes the countdown ticks.

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use super::view::{self, ViewModel};
use crate::calendar;
use crate::config::{DEVOTIONAL_RESOURCE, MUSIC_RESOURCE};
use crate::content::devotional::DevotionalSet;
use crate::content::music::{self, MusicConfig};
use crate::engine::coordinator::Coordinator;

/// One ticker step: the countdown display plus whether the local civil
/// date has moved past the date currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub countdown: String,
    pub rolled_over: bool,
}

/// Compute a ticker step. Pure; the caller supplies the clock.
pub fn tick_at(now: NaiveDateTime, shown_date: NaiveDate) -> Tick {
    let secs = calendar::seconds_to_midnight(now);
    Tick {
        countdown: format!("Switches in {}", calendar::format_hms(secs)),
        rolled_over: now.date() != shown_date,
    }
}

/// A foreground page controlled by the coordinator. All resource fetches
/// go through the coordinator's interception path.
pub struct PageSession {
    coordinator: Arc<Coordinator>,
}

impl PageSession {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        coordinator.attach_page();
        Self { coordinator }
    }

    /// Load and project today's entry.
    ///
    /// The devotional text path and the music path are independent
    /// try/fallback chains: a music failure never blocks text rendering.
    pub async fn load(&self, today: NaiveDate) -> Result<ViewModel> {
        let slot = calendar::resolve(today);
        debug!("loading slot {} for {}", slot.index, today);

        let devotional = self.coordinator.fetch(DEVOTIONAL_RESOURCE).await?;
        let set = DevotionalSet::from_json(&devotional.body)?;
        let record = set.record(&slot);

        let music = match self.coordinator.fetch(MUSIC_RESOURCE).await {
            Ok(resource) => match MusicConfig::from_json(&resource.body) {
                Ok(config) => music::select(&config, &slot),
                Err(e) => {
                    warn!("music config unreadable: {}", e);
                    None
                }
            },
            Err(e) => {
                debug!("music resource unavailable: {}", e);
                None
            }
        };

        Ok(view::render(record, &slot, today, music.as_ref()))
    }

    /// Load today's view, degrading to the persistent failure status
    /// instead of erroring. No retry is scheduled; the user reloads.
    pub async fn load_or_degraded(&self, today: NaiveDate) -> ViewModel {
        match self.load(today).await {
            Ok(view) => view,
            Err(e) => {
                warn!("load failure: {}", e);
                view::degraded(today)
            }
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        self.coordinator.detach_page();
    }
}
