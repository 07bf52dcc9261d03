// Pure projection of a day's content into a renderable view model.

use chrono::{Datelike, NaiveDate};

use crate::calendar::{self, CalendarSlot};
use crate::config::SLOT_COUNT;
use crate::content::devotional::DevotionalRecord;
use crate::content::music::MusicRef;

/// Page status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Loading,
    Ready,
    LoadFailed,
}

impl PageStatus {
    /// User-facing status text.
    pub fn message(&self) -> &'static str {
        match self {
            PageStatus::Loading => "Loading today's reading…",
            PageStatus::Ready => "Updates automatically each day.",
            PageStatus::LoadFailed => {
                "Could not load the readings. Check your connection and reload."
            }
        }
    }
}

/// Music portion of the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicView {
    /// Embedded-player frame URL.
    pub embed_url: String,
    /// "Open in provider" link.
    pub open_url: String,
    pub badge: String,
}

/// Everything the presentation layer needs to draw the page. The engine
/// never touches a display surface; a thin host adapter writes this out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub date_label: String,
    pub badge: String,
    pub title: String,
    pub reading: String,
    pub message: String,
    pub prayer: String,
    pub practice: String,
    /// True only on Feb 29 itself, not on the later shifted days.
    pub leap_notice: bool,
    pub music: Option<MusicView>,
    pub status: PageStatus,
}

/// Project one day's record onto the page.
pub fn render(
    record: &DevotionalRecord,
    slot: &CalendarSlot,
    today: NaiveDate,
    music: Option<&MusicRef>,
) -> ViewModel {
    let music = music.map(|reference| MusicView {
        embed_url: reference.embed_url(),
        open_url: reference.open_url(),
        badge: format!("Day {}", slot.index),
    });

    ViewModel {
        date_label: calendar::date_label(today),
        badge: format!("Day {} of {}", slot.index, SLOT_COUNT),
        title: record.title.clone(),
        reading: record.reading.clone(),
        message: record.message.clone(),
        prayer: record.prayer.clone(),
        practice: record.practice.clone(),
        leap_notice: slot.leap_year && today.month() == 2 && today.day() == 29,
        music,
        status: PageStatus::Ready,
    }
}

/// Placeholder view shown when neither network nor cache can supply the
/// texts. The status message is persistent; reloading is up to the user.
pub fn degraded(today: NaiveDate) -> ViewModel {
    ViewModel {
        date_label: calendar::date_label(today),
        badge: String::new(),
        title: String::new(),
        reading: String::new(),
        message: String::new(),
        prayer: String::new(),
        practice: String::new(),
        leap_notice: false,
        music: None,
        status: PageStatus::LoadFailed,
    }
}

/// Plain-text share/copy payload for the current entry.
pub fn share_text(view: &ViewModel) -> String {
    format!(
        "{}\n{}\n\n{}\nReading: {}\n\n{}\n\nPrayer: {}\n\nPractice: {}",
        view.badge, view.date_label, view.title, view.reading, view.message, view.prayer,
        view.practice
    )
}
