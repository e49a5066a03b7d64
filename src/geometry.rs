//! Geometry state machine - how big the overlay should be, and where
//!
//! The controller maps (expanded, hovered, active mode) to a target size,
//! flags an animation whenever the target moves, and debounces reporting the
//! on-screen bounds to the host so a running animation doesn't spam it.

use crate::bridge::UiBounds;
use crate::config::{AppSettings, NotchInfo};
use crate::debounce::Debounce;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Gap left on each side of the expanded panel inside the window.
pub const EXPANDED_MARGIN: f64 = 40.0;
/// Expanded panel never grows taller than this.
pub const EXPANDED_HEIGHT_CAP: f64 = 420.0;
/// Extra window width beyond the notch, before `extra_width`.
pub const WINDOW_SIDE_ALLOWANCE: f64 = 160.0;

pub const HOVER_DELTA_IDLE: Size = Size { w: 24.0, h: 6.0 };
pub const HOVER_DELTA_ACTIVE: Size = Size { w: 100.0, h: 8.0 };
pub const ACTIVE_DELTA: Size = Size { w: 80.0, h: 0.0 };

/// Delay before reporting bounds after a target change (~animation settle).
pub const BOUNDS_REPORT_DELAY: Duration = Duration::from_millis(350);
/// Upper bound on `animating` if the renderer never reports settling.
pub const ANIMATION_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

impl Size {
    fn plus(self, delta: Size) -> Size {
        Size {
            w: self.w + delta.w,
            h: self.h + delta.h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    CollapsedIdle,
    CollapsedActive,
    CollapsedHovered,
    Expanded,
}

/// Inputs to the sizing function that come from settings and the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingConfig {
    pub base: Size,
    pub window: Size,
    pub screen_width: f64,
    /// No physical notch: the idle pill collapses to zero height.
    pub non_notch_mode: bool,
}

impl SizingConfig {
    pub fn new(settings: &AppSettings, notch: &NotchInfo) -> Self {
        let base = if notch.has_notch && !settings.non_notch_mode {
            Size {
                w: notch.notch_width,
                h: notch.notch_height,
            }
        } else {
            Size {
                w: settings.base_width,
                h: settings.base_height,
            }
        };
        Self {
            base,
            window: Size {
                w: notch.notch_width + WINDOW_SIDE_ALLOWANCE + settings.extra_width,
                h: notch.notch_height + settings.extra_height,
            },
            screen_width: notch.screen_width,
            non_notch_mode: settings.non_notch_mode,
        }
    }
}

/// Target size for a phase. `idle_mode` picks the smaller hover delta.
pub fn target_size(phase: Phase, idle_mode: bool, config: &SizingConfig) -> Size {
    match phase {
        Phase::Expanded => Size {
            w: config.window.w - EXPANDED_MARGIN,
            h: config.window.h.min(EXPANDED_HEIGHT_CAP),
        },
        Phase::CollapsedHovered if idle_mode => config.base.plus(HOVER_DELTA_IDLE),
        Phase::CollapsedHovered => config.base.plus(HOVER_DELTA_ACTIVE),
        Phase::CollapsedIdle if config.non_notch_mode => Size {
            w: config.base.w,
            h: 0.0,
        },
        Phase::CollapsedIdle => config.base,
        Phase::CollapsedActive => config.base.plus(ACTIVE_DELTA),
    }
}

/// Observable geometry state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeometryState {
    pub expanded: bool,
    /// Pointer is over the overlay.
    pub hovered: bool,
    pub animating: bool,
    pub target: Size,
}

pub struct GeometryController {
    state: GeometryState,
    config: SizingConfig,
    idle_mode: bool,
    popover_open: bool,
    /// Pointer left while an animation was running; collapse once it settles.
    collapse_on_settle: bool,
    animation_started: Option<Instant>,
    bounds_report: Debounce<UiBounds>,
}

impl GeometryController {
    pub fn new(config: SizingConfig, now: Instant) -> Self {
        let target = target_size(Phase::CollapsedIdle, true, &config);
        let mut controller = Self {
            state: GeometryState {
                expanded: false,
                hovered: false,
                animating: false,
                target,
            },
            config,
            idle_mode: true,
            popover_open: false,
            collapse_on_settle: false,
            animation_started: None,
            bounds_report: Debounce::new(BOUNDS_REPORT_DELAY),
        };
        // First report goes out after the usual delay.
        let bounds = controller.bounds_for(target);
        controller.bounds_report.schedule(bounds, now);
        controller
    }

    pub fn state(&self) -> &GeometryState {
        &self.state
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    pub fn popover_open(&self) -> bool {
        self.popover_open
    }

    pub fn phase(&self) -> Phase {
        if self.state.expanded {
            Phase::Expanded
        } else if self.state.hovered {
            Phase::CollapsedHovered
        } else if self.idle_mode {
            Phase::CollapsedIdle
        } else {
            Phase::CollapsedActive
        }
    }

    pub fn configure(&mut self, config: SizingConfig, now: Instant) -> bool {
        self.config = config;
        self.retarget(now)
    }

    /// The arbiter picked a new mode.
    pub fn set_idle_mode(&mut self, idle: bool, now: Instant) -> bool {
        self.idle_mode = idle;
        self.retarget(now)
    }

    pub fn toggle_expanded(&mut self, now: Instant) -> bool {
        let expanded = !self.state.expanded;
        self.set_expanded(expanded, now)
    }

    pub fn set_expanded(&mut self, expanded: bool, now: Instant) -> bool {
        if self.state.expanded == expanded {
            return false;
        }
        info!(expanded, "overlay {}", if expanded { "expanding" } else { "collapsing" });
        self.state.expanded = expanded;
        self.collapse_on_settle = false;
        self.retarget(now)
    }

    pub fn hover_enter(&mut self, now: Instant) -> bool {
        self.state.hovered = true;
        self.collapse_on_settle = false;
        self.retarget(now)
    }

    /// Pointer left. While expanded this auto-collapses, unless a popover
    /// pins the panel; mid-animation the collapse waits for the settle signal.
    pub fn hover_leave(&mut self, now: Instant) -> bool {
        self.state.hovered = false;
        if self.state.expanded {
            if self.popover_open {
                debug!("hover lost; popover open, staying expanded");
                return false;
            }
            if self.state.animating {
                debug!("hover lost mid-animation; collapse deferred");
                self.collapse_on_settle = true;
                return false;
            }
            return self.set_expanded(false, now);
        }
        self.retarget(now)
    }

    /// A popover (modal sub-dialog) opened or closed inside the panel.
    pub fn set_popover(&mut self, open: bool, now: Instant) -> bool {
        self.popover_open = open;
        if !open && self.state.expanded && !self.state.hovered {
            return self.hover_leave(now);
        }
        false
    }

    /// The renderer finished the running transition.
    pub fn animation_settled(&mut self, now: Instant) -> bool {
        if !self.state.animating {
            return false;
        }
        trace!("animation settled");
        self.state.animating = false;
        self.animation_started = None;
        if std::mem::take(&mut self.collapse_on_settle)
            && self.state.expanded
            && !self.state.hovered
            && !self.popover_open
        {
            return self.set_expanded(false, now);
        }
        false
    }

    /// Per-frame housekeeping: expire a stuck animation flag and hand out a
    /// due bounds report.
    pub fn poll(&mut self, now: Instant) -> Option<UiBounds> {
        if self
            .animation_started
            .is_some_and(|at| now.saturating_duration_since(at) >= ANIMATION_TIMEOUT)
        {
            debug!("no settle signal; clearing animation flag");
            self.animation_settled(now);
        }
        self.bounds_report.poll(now)
    }

    /// Screen-space box of a target: centred horizontally, flush with the top.
    pub fn bounds_for(&self, size: Size) -> UiBounds {
        UiBounds {
            x: (self.config.screen_width - size.w) / 2.0,
            y: 0.0,
            width: size.w,
            height: size.h,
        }
    }

    /// Recompute the target. A new target during an animation replaces the
    /// old one; it never queues behind it.
    fn retarget(&mut self, now: Instant) -> bool {
        let target = target_size(self.phase(), self.idle_mode, &self.config);
        if target == self.state.target {
            return false;
        }
        trace!(w = target.w, h = target.h, phase = ?self.phase(), "new target");
        self.state.target = target;
        self.state.animating = true;
        self.animation_started = Some(now);
        let bounds = self.bounds_for(target);
        self.bounds_report.schedule(bounds, now);
        true
    }
}

// ---------------------------------------------------------------------------
// Hover hit-testing
// ---------------------------------------------------------------------------

/// Padding around the hit area before the pointer counts as inside.
pub const HOVER_PADDING_ENTER: f64 = 20.0;
/// Padding once inside; larger so the edge doesn't flicker.
pub const HOVER_PADDING_EXIT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverEdge {
    Entered,
    Exited,
}

/// Turns raw pointer positions into enter/exit edges.
#[derive(Debug, Default)]
pub struct HoverTracker {
    inside: bool,
}

impl HoverTracker {
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Hit area when nothing has been reported yet: the notch itself.
    pub fn fallback_area(notch: &NotchInfo, non_notch_mode: bool) -> UiBounds {
        let width = if non_notch_mode { 0.0 } else { notch.notch_width };
        UiBounds {
            x: (notch.screen_width - width) / 2.0,
            y: 0.0,
            width,
            height: if non_notch_mode { 1.0 } else { notch.notch_height },
        }
    }

    pub fn update(&mut self, x: f64, y: f64, area: &UiBounds) -> Option<HoverEdge> {
        let padding = if self.inside {
            HOVER_PADDING_EXIT
        } else {
            HOVER_PADDING_ENTER
        };
        let hit = x >= area.x - padding
            && x <= area.x + area.width + padding
            && y >= area.y - padding
            && y <= area.y + area.height + padding;

        match (self.inside, hit) {
            (false, true) => {
                self.inside = true;
                trace!(x, y, "pointer entered");
                Some(HoverEdge::Entered)
            }
            (true, false) => {
                self.inside = false;
                trace!(x, y, "pointer exited");
                Some(HoverEdge::Exited)
            }
            _ => None,
        }
    }
}
