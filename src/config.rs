use serde::Deserialize;

/// Number of fixed slots in the devotional calendar.
pub const SLOT_COUNT: u16 = 365;

/// Interval between foreground countdown ticks in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Prefix for versioned cache bucket names.
pub const BUCKET_PREFIX: &str = "devotional-cache";

/// Relative path of the devotional text resource (365 records).
pub const DEVOTIONAL_RESOURCE: &str = "data/devotionals.json";

/// Relative path of the music configuration resource.
pub const MUSIC_RESOURCE: &str = "data/music.json";

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Deployment version identifier, injected at build/deploy time.
    /// Drives cache bucket naming and stale-bucket eviction.
    pub version: String,
    /// Directory used for on-disk cache buckets.
    pub cache_dir: String,
    /// Static shell assets pre-populated at install, relative to the
    /// deployment root.
    pub shell_assets: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "dev".to_string(),
            cache_dir: String::new(),
            shell_assets: default_shell_assets(),
        }
    }
}

impl AppConfig {
    pub fn new(version: impl Into<String>, cache_dir: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            cache_dir: cache_dir.into(),
            ..Default::default()
        }
    }

    /// Full install manifest: the shell assets plus both data resources.
    pub fn manifest(&self) -> Vec<String> {
        let mut paths = self.shell_assets.clone();
        paths.push(DEVOTIONAL_RESOURCE.to_string());
        paths.push(MUSIC_RESOURCE.to_string());
        paths
    }

    /// Paths the coordinator serves network-first.
    pub fn volatile_resources() -> Vec<String> {
        vec![DEVOTIONAL_RESOURCE.to_string(), MUSIC_RESOURCE.to_string()]
    }
}

fn default_shell_assets() -> Vec<String> {
    [
        "index.html",
        "styles.css",
        "app.js",
        "manifest.webmanifest",
        "assets/logo.png",
        "assets/icon-192.png",
        "assets/icon-512.png",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
