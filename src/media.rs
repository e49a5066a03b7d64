//! Now-playing state and the `media` mode's activity window.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Track info pushed by the host's media session query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub elapsed_time: Option<f64>,
    #[serde(default)]
    pub is_playing: bool,
    /// Player app (Spotify, Music, Safari, ...).
    #[serde(default)]
    pub app_name: Option<String>,
}

impl NowPlaying {
    pub fn has_track(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Tracks playback and keeps `media` active briefly after a pause.
#[derive(Debug)]
pub struct MediaTracker {
    linger: Duration,
    current: Option<NowPlaying>,
    /// Last update that carried a track, kept for display after the player goes away.
    last_track: Option<NowPlaying>,
    paused_at: Option<Instant>,
}

impl MediaTracker {
    pub fn new(linger: Duration) -> Self {
        Self {
            linger,
            current: None,
            last_track: None,
            paused_at: None,
        }
    }

    pub fn set_linger(&mut self, linger: Duration) {
        self.linger = linger;
    }

    /// Apply a host update. `None` means no media session at all.
    pub fn update(&mut self, now_playing: Option<NowPlaying>, now: Instant) {
        let was_playing = self.is_playing();
        let playing = now_playing.as_ref().is_some_and(|np| np.is_playing);

        if was_playing && !playing {
            debug!("playback paused");
            self.paused_at = Some(now);
        } else if playing {
            self.paused_at = None;
        }

        if let Some(np) = now_playing.as_ref().filter(|np| np.has_track()) {
            self.last_track = Some(np.clone());
        }
        self.current = now_playing;
    }

    pub fn is_playing(&self) -> bool {
        self.current.as_ref().is_some_and(|np| np.is_playing)
    }

    /// Playing, or paused less than the linger window ago.
    pub fn is_active(&self, now: Instant) -> bool {
        self.is_playing()
            || self
                .paused_at
                .is_some_and(|at| now.saturating_duration_since(at) < self.linger)
    }

    /// What to show: the live track, or the cached last one.
    pub fn track(&self) -> Option<&NowPlaying> {
        self.current
            .as_ref()
            .filter(|np| np.has_track())
            .or(self.last_track.as_ref())
    }
}
