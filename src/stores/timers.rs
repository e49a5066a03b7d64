//! Countdown timers shared across windows.
//!
//! `remaining` is a snapshot taken when the timer last stopped. While a
//! timer runs, the live value is derived from `lastStartTime` on every read
//! and never written back until the timer stops.

use crate::bridge::{channels, keys, HostBridge};
use crate::clock::{elapsed_secs, Millis};
use crate::sync::{CrossWindowSync, Domain, SenderId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const DOMAIN: Domain = Domain {
    key: keys::TIMERS,
    channel: channels::TIMER,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerInstance {
    pub id: String,
    pub name: String,
    /// Configured length in seconds.
    pub duration: u64,
    /// Seconds left as of the last stop.
    pub remaining: u64,
    pub is_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_start_time: Option<Millis>,
}

impl TimerInstance {
    pub fn new(name: impl Into<String>, duration: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            duration,
            remaining: duration,
            is_running: false,
            last_start_time: None,
        }
    }

    /// Seconds left at `now`.
    pub fn live_remaining(&self, now: Millis) -> u64 {
        match (self.is_running, self.last_start_time) {
            (true, Some(started)) => self.remaining.saturating_sub(elapsed_secs(started, now)),
            _ => self.remaining,
        }
    }

    fn start(&mut self, now: Millis) {
        if self.remaining == 0 {
            self.remaining = self.duration;
        }
        self.is_running = true;
        self.last_start_time = Some(now);
    }

    fn stop(&mut self, now: Millis) {
        self.remaining = self.live_remaining(now);
        self.is_running = false;
        self.last_start_time = None;
    }

    fn toggle(&mut self, now: Millis) {
        if self.is_running {
            self.stop(now);
        } else {
            self.start(now);
        }
    }
}

/// Window-local replica of the timer list.
pub struct TimerStore {
    sync: CrossWindowSync<Vec<TimerInstance>>,
}

impl TimerStore {
    pub fn open(bridge: Arc<dyn HostBridge>, sender_id: SenderId) -> Self {
        Self {
            sync: CrossWindowSync::open(bridge, DOMAIN, sender_id),
        }
    }

    pub fn all(&self) -> &[TimerInstance] {
        self.sync.state()
    }

    pub fn get(&self, id: &str) -> Option<&TimerInstance> {
        self.all().iter().find(|t| t.id == id)
    }

    pub fn any_running(&self) -> bool {
        self.all().iter().any(|t| t.is_running)
    }

    /// Create a stopped timer and return its id.
    pub fn add(&mut self, name: &str, duration: u64) -> String {
        let timer = TimerInstance::new(name, duration);
        let id = timer.id.clone();
        info!(%id, %name, duration, "timer added");
        self.sync.update(|timers| timers.push(timer));
        id
    }

    /// Start a stopped timer or stop a running one. Unknown ids are ignored.
    pub fn toggle(&mut self, id: &str, now: Millis) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.sync.update(|timers| {
            if let Some(timer) = timers.iter_mut().find(|t| t.id == id) {
                timer.toggle(now);
                debug!(
                    %id,
                    running = timer.is_running,
                    remaining = timer.remaining,
                    "timer toggled"
                );
            }
        });
        true
    }

    /// Stop and rewind to the full duration.
    pub fn reset(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.sync.update(|timers| {
            if let Some(timer) = timers.iter_mut().find(|t| t.id == id) {
                timer.remaining = timer.duration;
                timer.is_running = false;
                timer.last_start_time = None;
            }
        });
        true
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.sync.update(|timers| {
            if let Some(timer) = timers.iter_mut().find(|t| t.id == id) {
                timer.name = name.to_string();
            }
        });
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.sync.update(|timers| timers.retain(|t| t.id != id));
        true
    }

    /// Per-second tick: remove running timers that reached zero.
    ///
    /// Returns the names of the timers that completed.
    pub fn tick(&mut self, now: Millis) -> Vec<String> {
        let finished: Vec<String> = self
            .all()
            .iter()
            .filter(|t| t.is_running && t.live_remaining(now) == 0)
            .map(|t| t.id.clone())
            .collect();
        if finished.is_empty() {
            return Vec::new();
        }

        let names = self
            .all()
            .iter()
            .filter(|t| finished.contains(&t.id))
            .map(|t| t.name.clone())
            .collect::<Vec<_>>();
        info!(?names, "timers completed");
        self.sync.update(|timers| timers.retain(|t| !finished.contains(&t.id)));
        names
    }

    /// Apply queued broadcasts from other windows.
    pub fn pump(&mut self) -> bool {
        self.sync.pump()
    }
}
