//! Wheel/trackpad gestures to intents
//!
//! Rules, first match wins:
//! 1. mid-animation: ignore
//! 2. collapsed, scroll up past the threshold: expand
//! 3. expanded, scroll down past the threshold: collapse
//! 4. expanded, horizontal: switch tab (clamped, no wraparound)
//! 5. collapsed, horizontal, cooldown elapsed: cycle mode
//!
//! A nested horizontally-scrollable region gets first refusal, see
//! [`ScrollRegion::captures`].

use crate::arbiter::Direction;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::trace;

/// Minimum delta (px) on an axis before a gesture counts.
pub const WHEEL_THRESHOLD: f64 = 15.0;
/// Minimum gap between two mode cycles from the wheel.
pub const CYCLE_COOLDOWN: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Widgets,
    Files,
}

impl Tab {
    const ORDER: [Tab; 2] = [Tab::Widgets, Tab::Files];

    /// Neighbouring tab, or `None` at either end.
    pub fn step(self, direction: Direction) -> Option<Tab> {
        let index = Self::ORDER.iter().position(|t| *t == self)?;
        let next = match direction {
            Direction::Next => index.checked_add(1)?,
            Direction::Prev => index.checked_sub(1)?,
        };
        Self::ORDER.get(next).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Expand,
    Collapse,
    SwitchTab(Tab),
    CycleMode(Direction),
}

/// Geometry facts the router needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelContext {
    pub expanded: bool,
    pub animating: bool,
    pub tab: Tab,
}

/// Scroll position of a nested horizontal scroller under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollRegion {
    pub offset: f64,
    pub max_offset: f64,
}

impl ScrollRegion {
    /// The region keeps the event when vertical motion doesn't dominate and
    /// it can still scroll in the gesture's direction. Otherwise it bubbles.
    pub fn captures(&self, delta_x: f64, delta_y: f64) -> bool {
        if delta_y.abs() > delta_x.abs() {
            return false;
        }
        if delta_x > 0.0 {
            self.offset < self.max_offset
        } else if delta_x < 0.0 {
            self.offset > 0.0
        } else {
            false
        }
    }
}

/// Result of routing one wheel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelOutcome {
    /// A nested scroller consumed it.
    Captured,
    Intent(Intent),
    Ignored,
}

#[derive(Debug)]
pub struct GestureRouter {
    threshold: f64,
    cooldown: Duration,
    last_cycle: Option<Instant>,
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self::new(WHEEL_THRESHOLD, CYCLE_COOLDOWN)
    }
}

impl GestureRouter {
    pub fn new(threshold: f64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            last_cycle: None,
        }
    }

    /// Full routing including child-scroll arbitration.
    pub fn route(
        &mut self,
        delta_x: f64,
        delta_y: f64,
        child: Option<&ScrollRegion>,
        ctx: WheelContext,
        now: Instant,
    ) -> WheelOutcome {
        if child.is_some_and(|region| region.captures(delta_x, delta_y)) {
            trace!(delta_x, delta_y, "wheel captured by child scroller");
            return WheelOutcome::Captured;
        }
        match self.on_wheel(delta_x, delta_y, ctx, now) {
            Some(intent) => WheelOutcome::Intent(intent),
            None => WheelOutcome::Ignored,
        }
    }

    pub fn on_wheel(
        &mut self,
        delta_x: f64,
        delta_y: f64,
        ctx: WheelContext,
        now: Instant,
    ) -> Option<Intent> {
        if ctx.animating {
            return None;
        }
        if !ctx.expanded && delta_y < -self.threshold {
            return Some(Intent::Expand);
        }
        if ctx.expanded && delta_y > self.threshold {
            return Some(Intent::Collapse);
        }

        let horizontal = delta_x.abs() > self.threshold && delta_x.abs() >= delta_y.abs();
        if !horizontal {
            return None;
        }
        let direction = Direction::from_delta(delta_x);

        if ctx.expanded {
            return ctx.tab.step(direction).map(Intent::SwitchTab);
        }

        if self
            .last_cycle
            .is_some_and(|at| now.saturating_duration_since(at) < self.cooldown)
        {
            trace!("mode cycle rejected by cooldown");
            return None;
        }
        self.last_cycle = Some(now);
        Some(Intent::CycleMode(direction))
    }
}
