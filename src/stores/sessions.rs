//! Work sessions (stopwatch-style) shared across windows.

use crate::bridge::{channels, keys, HostBridge};
use crate::clock::{elapsed_secs, Millis};
use crate::sync::{CrossWindowSync, Domain, SenderId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DOMAIN: Domain = Domain {
    key: keys::SESSIONS,
    channel: channels::SESSION,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInstance {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub start_time: Millis,
    /// Set once the session stops; always `None` while active.
    #[serde(default)]
    pub end_time: Option<Millis>,
    pub is_active: bool,
}

impl SessionInstance {
    /// Whole seconds on the clock at `now`.
    pub fn elapsed(&self, now: Millis) -> u64 {
        match self.end_time {
            Some(end) if !self.is_active => elapsed_secs(self.start_time, end),
            _ => elapsed_secs(self.start_time, now),
        }
    }

    fn stop(&mut self, now: Millis) {
        self.is_active = false;
        self.end_time = Some(now);
    }

    /// Shift `start_time` forward so the clock continues from where it stopped.
    fn resume(&mut self, now: Millis) {
        let ran_for = self
            .end_time
            .map(|end| (end - self.start_time).max(0))
            .unwrap_or(0);
        self.start_time = now - ran_for;
        self.end_time = None;
        self.is_active = true;
    }
}

/// Window-local replica of the session list.
pub struct SessionStore {
    sync: CrossWindowSync<Vec<SessionInstance>>,
}

impl SessionStore {
    pub fn open(bridge: Arc<dyn HostBridge>, sender_id: SenderId) -> Self {
        Self {
            sync: CrossWindowSync::open(bridge, DOMAIN, sender_id),
        }
    }

    pub fn all(&self) -> &[SessionInstance] {
        self.sync.state()
    }

    pub fn get(&self, id: &str) -> Option<&SessionInstance> {
        self.all().iter().find(|s| s.id == id)
    }

    pub fn any_active(&self) -> bool {
        self.all().iter().any(|s| s.is_active)
    }

    /// Start a new active session and return its id.
    pub fn start(&mut self, name: &str, icon: Option<String>, now: Millis) -> String {
        let session = SessionInstance {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            icon,
            start_time: now,
            end_time: None,
            is_active: true,
        };
        let id = session.id.clone();
        info!(%id, %name, "session started");
        self.sync.update(|sessions| sessions.push(session));
        id
    }

    pub fn stop(&mut self, id: &str, now: Millis) -> bool {
        self.edit(id, |s| s.is_active, |s| s.stop(now))
    }

    pub fn resume(&mut self, id: &str, now: Millis) -> bool {
        self.edit(id, |s| !s.is_active, |s| s.resume(now))
    }

    /// Stop if active, resume if stopped.
    pub fn toggle(&mut self, id: &str, now: Millis) -> bool {
        match self.get(id).map(|s| s.is_active) {
            Some(true) => self.stop(id, now),
            Some(false) => self.resume(id, now),
            None => false,
        }
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        self.edit(id, |_| true, |s| s.name = name.to_string())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.sync.update(|sessions| sessions.retain(|s| s.id != id));
        true
    }

    pub fn pump(&mut self) -> bool {
        self.sync.pump()
    }

    /// Apply `change` to session `id` if `allowed` holds for it.
    fn edit(
        &mut self,
        id: &str,
        allowed: impl Fn(&SessionInstance) -> bool,
        change: impl FnOnce(&mut SessionInstance),
    ) -> bool {
        if !self.get(id).is_some_and(&allowed) {
            return false;
        }
        self.sync.update(|sessions| {
            if let Some(session) = sessions.iter_mut().find(|s| s.id == id) {
                change(session);
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalBridge;

    const T0: Millis = 1_700_000_000_000;

    fn store(bridge: &Arc<LocalBridge>, id: &str) -> SessionStore {
        SessionStore::open(bridge.clone(), SenderId::from(id))
    }

    #[test]
    fn stop_sets_end_time() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut sessions = store(&bridge, "w");
        let id = sessions.start("writing", None, T0);
        assert!(sessions.any_active());

        assert!(sessions.stop(&id, T0 + 90_000));
        let s = sessions.get(&id).unwrap();
        assert!(!s.is_active);
        assert_eq!(s.end_time, Some(T0 + 90_000));
        assert_eq!(s.elapsed(T0 + 500_000), 90);
        assert!(!sessions.stop(&id, T0 + 100_000));
    }

    #[test]
    fn resume_continues_elapsed_time() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut sessions = store(&bridge, "w");
        let id = sessions.start("reading", Some("book".into()), T0);
        sessions.stop(&id, T0 + 60_000);

        // An hour later the clock picks up at 60s, not 0 or 3660.
        let later = T0 + 3_660_000;
        assert!(sessions.resume(&id, later));
        let s = sessions.get(&id).unwrap();
        assert!(s.is_active);
        assert_eq!(s.end_time, None);
        assert_eq!(s.elapsed(later), 60);
        assert_eq!(s.elapsed(later + 5_000), 65);
    }

    #[test]
    fn toggle_flips_state() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut sessions = store(&bridge, "w");
        let id = sessions.start("x", None, T0);
        assert!(sessions.toggle(&id, T0 + 1_000));
        assert!(!sessions.any_active());
        assert!(sessions.toggle(&id, T0 + 2_000));
        assert!(sessions.any_active());
        assert!(!sessions.toggle("missing", T0));
    }

    #[test]
    fn rename_and_remove() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut sessions = store(&bridge, "w");
        let id = sessions.start("x", None, T0);
        assert!(sessions.rename(&id, "y"));
        assert_eq!(sessions.get(&id).unwrap().name, "y");
        assert!(sessions.remove(&id));
        assert!(sessions.all().is_empty());
    }

    #[test]
    fn sessions_and_timers_do_not_interfere() {
        use crate::stores::timers::TimerStore;

        let bridge = Arc::new(LocalBridge::in_memory());
        let mut sessions_a = store(&bridge, "a");
        let mut timers_b = TimerStore::open(bridge.clone(), SenderId::from("b"));
        let mut sessions_b = store(&bridge, "b");

        timers_b.add("tea", 60);
        sessions_a.start("deep work", None, T0);

        assert!(sessions_b.pump());
        assert_eq!(sessions_b.all().len(), 1);
        assert!(!sessions_a.pump());
        assert_eq!(timers_b.all().len(), 1);
    }

    #[test]
    fn wire_format_keeps_null_end_time() {
        let s = SessionInstance {
            id: "s1".into(),
            name: "n".into(),
            icon: None,
            start_time: T0,
            end_time: None,
            is_active: true,
        };
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["endTime"].is_null());
        assert_eq!(json["startTime"], T0);
        assert!(json.get("icon").is_none());
    }
}
