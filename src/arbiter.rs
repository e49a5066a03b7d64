//! Mode arbitration - which single mode owns the collapsed pill
//!
//! Candidates come from two places: synthetic modes (`onboard`, `media`,
//! `files`, `idle`) and every enabled, compact-capable widget in the
//! registry whose activation predicate holds. Active candidates are sorted
//! by priority (stable, so declaration order breaks ties). The user's
//! preferred mode wins while it is available; otherwise the head wins.

use crate::registry::{RegisteredWidget, WidgetManifest};
use std::collections::HashSet;
use tracing::{debug, info};

pub const ONBOARD: &str = "onboard";
pub const MEDIA: &str = "media";
pub const FILES: &str = "files";
pub const IDLE: &str = "idle";

pub const ONBOARD_PRIORITY: i32 = 0;
pub const MEDIA_PRIORITY: i32 = 10;
pub const FILES_PRIORITY: i32 = 30;
pub const IDLE_PRIORITY: i32 = 999;

/// Domain facts the activation predicates look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySignals {
    pub timers_running: bool,
    pub sessions_active: bool,
    /// Playing, or within the just-paused linger window.
    pub media_active: bool,
    pub has_files: bool,
    /// Still inside the onboarding window after launch.
    pub onboarding: bool,
    /// Plugins that reported themselves active.
    pub active_plugins: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeCandidate {
    pub id: String,
    pub priority: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    /// Positive deltas move forward.
    pub fn from_delta(delta: f64) -> Self {
        if delta < 0.0 { Self::Prev } else { Self::Next }
    }
}

/// Every candidate in declaration order, active or not.
pub fn candidates<'a>(
    widgets: impl IntoIterator<Item = &'a RegisteredWidget>,
    is_enabled: impl Fn(&WidgetManifest) -> bool,
    signals: &ActivitySignals,
) -> Vec<ModeCandidate> {
    let synthetic = |id: &str, priority, active| ModeCandidate {
        id: id.to_string(),
        priority,
        active,
    };

    let mut list = vec![
        synthetic(ONBOARD, ONBOARD_PRIORITY, signals.onboarding),
        synthetic(MEDIA, MEDIA_PRIORITY, signals.media_active),
        synthetic(FILES, FILES_PRIORITY, signals.has_files),
    ];
    list.extend(
        widgets
            .into_iter()
            .filter(|w| w.manifest.has_compact_capability && is_enabled(&w.manifest))
            .map(|w| ModeCandidate {
                id: w.manifest.id.clone(),
                priority: w.manifest.priority,
                active: w.is_active(signals),
            }),
    );
    list.push(synthetic(IDLE, IDLE_PRIORITY, true));
    list
}

/// Active mode ids, ascending by priority. Always contains `idle`.
pub fn compute_available_modes<'a>(
    widgets: impl IntoIterator<Item = &'a RegisteredWidget>,
    is_enabled: impl Fn(&WidgetManifest) -> bool,
    signals: &ActivitySignals,
) -> Vec<String> {
    let mut active: Vec<ModeCandidate> = candidates(widgets, is_enabled, signals)
        .into_iter()
        .filter(|c| c.active)
        .collect();
    // `sort_by_key` is stable: equal priorities keep declaration order.
    active.sort_by_key(|c| c.priority);
    active.into_iter().map(|c| c.id).collect()
}

/// `preferred` if it is available, else the head, else `idle`.
///
/// A stale preference is ignored, not reported.
pub fn resolve_active_mode(available: &[String], preferred: Option<&str>) -> String {
    preferred
        .filter(|p| available.iter().any(|m| m == p))
        .or_else(|| available.first().map(String::as_str))
        .unwrap_or(IDLE)
        .to_string()
}

/// Neighbour of `active` in `available`, wrapping. No-op below two modes.
pub fn cycle_mode(available: &[String], active: &str, direction: Direction) -> String {
    let len = available.len();
    if len < 2 {
        return active.to_string();
    }
    let index = available.iter().position(|m| m == active).unwrap_or(0);
    let next = match direction {
        Direction::Next => (index + 1) % len,
        Direction::Prev => (index + len - 1) % len,
    };
    available[next].clone()
}

/// Arbiter state for one overlay window.
#[derive(Debug, Clone)]
pub struct ModeArbiter {
    available: Vec<String>,
    preferred: Option<String>,
    active: String,
    media_was_active: bool,
    files_were_present: bool,
}

impl Default for ModeArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeArbiter {
    pub fn new() -> Self {
        Self {
            available: vec![IDLE.to_string()],
            preferred: None,
            active: IDLE.to_string(),
            media_was_active: false,
            files_were_present: false,
        }
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn preferred(&self) -> Option<&str> {
        self.preferred.as_deref()
    }

    pub fn is_idle(&self) -> bool {
        self.active == IDLE
    }

    /// Take a new candidate list and signals; returns `true` if the active mode changed.
    ///
    /// Rising edges of `media` and `files` force the preference to that
    /// mode, except during onboarding where edges are only recorded.
    pub fn recompute(&mut self, available: Vec<String>, signals: &ActivitySignals) -> bool {
        let media_rose = signals.media_active && !self.media_was_active;
        let files_rose = signals.has_files && !self.files_were_present;
        self.media_was_active = signals.media_active;
        self.files_were_present = signals.has_files;

        if signals.onboarding {
            if media_rose || files_rose {
                debug!(media_rose, files_rose, "auto-switch suppressed during onboarding");
            }
        } else if media_rose {
            info!("media started, switching to media");
            self.preferred = Some(MEDIA.to_string());
        } else if files_rose && !signals.media_active {
            info!("files added, switching to files");
            self.preferred = Some(FILES.to_string());
        }

        self.available = if available.is_empty() {
            vec![IDLE.to_string()]
        } else {
            available
        };
        self.resolve()
    }

    /// Explicit user choice (e.g. tapping a mode in the expanded view).
    pub fn set_preferred(&mut self, id: &str) -> bool {
        self.preferred = Some(id.to_string());
        self.resolve()
    }

    /// Move the preference to the neighbouring mode.
    pub fn cycle(&mut self, direction: Direction) -> bool {
        if self.available.len() < 2 {
            return false;
        }
        let next = cycle_mode(&self.available, &self.active, direction);
        self.preferred = Some(next);
        self.resolve()
    }

    fn resolve(&mut self) -> bool {
        if let Some(preferred) = &self.preferred
            && !self.available.contains(preferred)
        {
            debug!(mode = %preferred, "preferred mode unavailable, discarding");
            self.preferred = None;
        }
        let next = resolve_active_mode(&self.available, self.preferred.as_deref());
        if next == self.active {
            return false;
        }
        debug!(from = %self.active, to = %next, available = ?self.available, "active mode changed");
        self.active = next;
        true
    }
}
