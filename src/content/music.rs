// Music configuration — reference normalization and the daily selection policy.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::calendar::CalendarSlot;

// URI form: spotify:track:<id> / spotify:playlist:<id>, id is 10+ alphanumerics.
static URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^spotify:(track|playlist):([A-Za-z0-9]{10,})$").expect("uri pattern")
});

// Web URL form, with an optional /embed/ segment before the kind.
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"open\.spotify\.com/(?:embed/)?(track|playlist)/([A-Za-z0-9]{10,})")
        .expect("url pattern")
});

/// Selection mode declared in the music resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicMode {
    Track,
    Playlist,
}

/// The music configuration resource. Absent fields default; a missing or
/// unreadable resource behaves like `enabled = false`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    pub enabled: bool,
    pub mode: Option<MusicMode>,
    pub tracks: Vec<String>,
    pub playlist: Option<String>,
}

impl MusicConfig {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// A normalized provider reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicRef {
    Track(String),
    Playlist(String),
}

impl MusicRef {
    pub fn kind(&self) -> &'static str {
        match self {
            MusicRef::Track(_) => "track",
            MusicRef::Playlist(_) => "playlist",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            MusicRef::Track(id) | MusicRef::Playlist(id) => id,
        }
    }

    /// Embedded-player URL for this reference.
    pub fn embed_url(&self) -> String {
        format!(
            "https://open.spotify.com/embed/{}/{}?utm_source=generator",
            self.kind(),
            self.id()
        )
    }

    /// Canonical "open in provider" web URL.
    pub fn open_url(&self) -> String {
        format!("https://open.spotify.com/{}/{}", self.kind(), self.id())
    }
}

/// Normalize a raw track/playlist string. Unrecognized input is absent,
/// never an error.
pub fn normalize(input: &str) -> Option<MusicRef> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    let caps = URI_RE.captures(s).or_else(|| URL_RE.captures(s))?;
    let id = caps.get(2)?.as_str().to_string();
    match caps.get(1)?.as_str() {
        "track" => Some(MusicRef::Track(id)),
        "playlist" => Some(MusicRef::Playlist(id)),
        _ => None,
    }
}

/// Pick the reference to render for the given slot, if any.
///
/// Playlist mode wins when a valid playlist is configured. Otherwise the
/// track list is indexed by `(index - 1) mod len` and the entry is used
/// whether it normalizes as a track or a playlist. The top-level playlist
/// is the final fallback; when nothing normalizes the music section stays
/// hidden.
pub fn select(config: &MusicConfig, slot: &CalendarSlot) -> Option<MusicRef> {
    if !config.enabled {
        return None;
    }

    if matches!(config.mode, Some(MusicMode::Playlist)) {
        if let Some(playlist) = normalized_playlist(config) {
            return Some(playlist);
        }
    }

    if !config.tracks.is_empty() {
        let idx = (slot.index as usize - 1) % config.tracks.len();
        if let Some(reference) = normalize(&config.tracks[idx]) {
            return Some(reference);
        }
    }

    normalized_playlist(config)
}

fn normalized_playlist(config: &MusicConfig) -> Option<MusicRef> {
    match config.playlist.as_deref().and_then(normalize) {
        Some(reference @ MusicRef::Playlist(_)) => Some(reference),
        _ => None,
    }
}
