//! Persistence for local UI preferences (`app-settings`).
//!
//! - **Settings** (`app-settings.json`): base dimensions and feature toggles,
//!   saved to the platform config directory.
//! - **Watcher**: the daemon watches that file; a change is the storage-change
//!   signal that propagates settings between processes (they are not sent on
//!   a broadcast channel).
//!
//! On macOS the file lives under `~/Library/Application Support/nook/`.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User preferences (persisted to app-settings.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Collapsed pill width (matches the physical notch when there is one).
    #[serde(default = "default_base_width")]
    pub base_width: f64,
    /// Collapsed pill height.
    #[serde(default = "default_base_height")]
    pub base_height: f64,
    /// Extra width added to the fixed overlay window.
    #[serde(default = "default_extra_width")]
    pub extra_width: f64,
    /// Extra height added to the fixed overlay window.
    #[serde(default = "default_extra_height")]
    pub extra_height: f64,
    /// Screen has no physical notch: the idle pill shrinks to nothing.
    #[serde(default)]
    pub non_notch_mode: bool,
    #[serde(default = "default_true")]
    pub haptics: bool,
    /// Length of the onboarding window after launch.
    #[serde(default = "default_onboarding_secs")]
    pub onboarding_secs: u64,
    /// How long `media` stays active after playback pauses.
    #[serde(default = "default_media_linger_secs")]
    pub media_linger_secs: u64,
}

fn default_base_width() -> f64 {
    185.0
}

fn default_base_height() -> f64 {
    32.0
}

fn default_extra_width() -> f64 {
    400.0
}

fn default_extra_height() -> f64 {
    800.0
}

fn default_true() -> bool {
    true
}

fn default_onboarding_secs() -> u64 {
    5
}

fn default_media_linger_secs() -> u64 {
    3
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_width: default_base_width(),
            base_height: default_base_height(),
            extra_width: default_extra_width(),
            extra_height: default_extra_height(),
            non_notch_mode: false,
            haptics: true,
            onboarding_secs: default_onboarding_secs(),
            media_linger_secs: default_media_linger_secs(),
        }
    }
}

impl AppSettings {
    pub fn onboarding_window(&self) -> Duration {
        Duration::from_secs(self.onboarding_secs)
    }

    pub fn media_linger(&self) -> Duration {
        Duration::from_secs(self.media_linger_secs)
    }
}

/// Screen and notch metrics as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotchInfo {
    pub has_notch: bool,
    pub notch_width: f64,
    pub notch_height: f64,
    pub screen_width: f64,
    pub screen_height: f64,
}

impl Default for NotchInfo {
    /// 14" MacBook Pro logical resolution.
    fn default() -> Self {
        Self {
            has_notch: true,
            notch_width: 185.0,
            notch_height: 32.0,
            screen_width: 1512.0,
            screen_height: 982.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Directory helpers
// ---------------------------------------------------------------------------

/// Nook config directory (e.g. `~/Library/Application Support/nook/`).
fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nook"))
}

/// Full path of the settings file.
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("app-settings.json"))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load settings from disk, returning defaults if the file is missing or invalid.
pub fn load_settings() -> AppSettings {
    let Some(path) = settings_path() else {
        return AppSettings::default();
    };
    load_settings_from(&path)
}

/// Save settings to disk.
pub fn save_settings(settings: &AppSettings) -> Result<(), std::io::Error> {
    let path = settings_path().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "config dir not found")
    })?;
    save_settings_to(settings, &path)
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("invalid {}: {}; using defaults", path.display(), e);
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    }
}

pub fn save_settings_to(settings: &AppSettings, path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Write bytes to a file atomically: write to a temp file in the same
/// directory, then rename over the target. Prevents partial JSON on crash.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    use std::io::Write;

    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Storage-change signal
// ---------------------------------------------------------------------------

/// Watches the settings file and yields freshly loaded settings on change.
///
/// Keep the value alive; dropping it stops the watch.
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<AppSettings>,
}

impl SettingsWatcher {
    /// Watch `path`. The parent directory is watched so atomic renames are seen.
    pub fn new(path: PathBuf) -> notify::Result<Self> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir).map_err(notify::Error::io)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let target = path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if event.paths.iter().any(|p| p == &target) => {
                    debug!(kind = ?event.kind, "settings file changed");
                    let _ = tx.send(load_settings_from(&target));
                }
                Ok(_) => {}
                Err(e) => warn!("settings watch error: {e}"),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Next settings snapshot after a change.
    pub async fn changed(&mut self) -> Option<AppSettings> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
