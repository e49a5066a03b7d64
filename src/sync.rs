//! Cross-window state replication
//!
//! Every window keeps its own copy of each domain collection (timers,
//! sessions, widget enablement, file tray). A local edit replaces the copy,
//! persists it through the Host Bridge, and broadcasts the full snapshot on
//! the domain's channel tagged with the window's sender id. Receivers drop
//! their own echoes and replace their copy wholesale with anything else.
//!
//! There is no version or merge: the last snapshot applied wins for the whole
//! collection. Two windows editing the same collection at once can lose one
//! side's edit. Separate domains never interfere since they use separate
//! keys and channels.

use crate::bridge::{BridgeCommand, HostBridge, Reply};
use crate::error::SyncError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Identity of one window process in the broadcast protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    /// Fresh random id for a new window.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SenderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire format of a broadcast snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEnvelope<T> {
    pub payload: T,
    pub sender_id: SenderId,
}

/// Where a domain lives: its store key and its broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domain {
    pub key: &'static str,
    pub channel: &'static str,
}

/// What happened to one inbound broadcast.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    Applied,
    /// Our own broadcast coming back.
    Echo,
    /// Unparseable payload; local state kept.
    Dropped,
}

/// Replicated copy of one domain collection.
pub struct CrossWindowSync<T> {
    domain: Domain,
    sender_id: SenderId,
    bridge: Arc<dyn HostBridge>,
    state: T,
    inbox: broadcast::Receiver<Value>,
    /// Persist replies not yet observed, checked for failure on each pump.
    pending_persists: Vec<Reply>,
}

impl<T> CrossWindowSync<T>
where
    T: Serialize + DeserializeOwned + Clone + Default,
{
    /// Subscribe to the domain channel and load the boot snapshot.
    ///
    /// Absent or unparseable snapshots start from `T::default()`. There is no
    /// join handshake: whatever was last persisted is what this window sees.
    pub fn open(bridge: Arc<dyn HostBridge>, domain: Domain, sender_id: SenderId) -> Self {
        let inbox = bridge.listen(domain.channel);
        let state = match bridge.load(domain.key) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(key = domain.key, "ignoring unreadable snapshot: {e}");
                T::default()
            }),
            None => T::default(),
        };
        debug!(key = domain.key, %sender_id, "sync opened");
        Self {
            domain,
            sender_id,
            bridge,
            state,
            inbox,
            pending_persists: Vec::new(),
        }
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn sender_id(&self) -> &SenderId {
        &self.sender_id
    }

    /// Replace local state, persist it, then broadcast it.
    ///
    /// Persistence is fire-and-forget: a failure is logged on a later
    /// [`pump`](Self::pump) and the optimistic state stays.
    pub fn apply_local(&mut self, next: T) {
        self.state = next;
        let value = match serde_json::to_value(&self.state) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = self.domain.key, "snapshot not serializable: {e}");
                return;
            }
        };

        self.pending_persists.push(self.bridge.invoke(BridgeCommand::Persist {
            key: self.domain.key.to_string(),
            value: value.clone(),
        }));

        let envelope = SyncEnvelope {
            payload: value,
            sender_id: self.sender_id.clone(),
        };
        match serde_json::to_value(&envelope) {
            Ok(message) => {
                trace!(channel = self.domain.channel, "broadcast");
                self.bridge.emit(self.domain.channel, message);
            }
            Err(e) => warn!(channel = self.domain.channel, "envelope not serializable: {e}"),
        }
    }

    /// Edit a copy of the current state and apply it locally.
    pub fn update(&mut self, edit: impl FnOnce(&mut T)) {
        let mut next = self.state.clone();
        edit(&mut next);
        self.apply_local(next);
    }

    /// Handle one raw broadcast message.
    pub fn receive(&mut self, message: Value) -> Received {
        let envelope: SyncEnvelope<T> = match self.decode(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("{e}; keeping local state");
                return Received::Dropped;
            }
        };
        if envelope.sender_id == self.sender_id {
            trace!(channel = self.domain.channel, "dropping own echo");
            return Received::Echo;
        }
        debug!(
            channel = self.domain.channel,
            from = %envelope.sender_id,
            "applying remote snapshot"
        );
        self.state = envelope.payload;
        Received::Applied
    }

    fn decode(&self, message: Value) -> Result<SyncEnvelope<T>, SyncError> {
        serde_json::from_value(message).map_err(|source| SyncError::MalformedSnapshot {
            channel: self.domain.channel,
            source,
        })
    }

    /// Drain queued broadcasts and check outstanding persists.
    ///
    /// Returns `true` if any remote snapshot replaced local state.
    pub fn pump(&mut self) -> bool {
        self.check_persist();

        let mut changed = false;
        loop {
            match self.inbox.try_recv() {
                Ok(message) => changed |= self.receive(message) == Received::Applied,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(channel = self.domain.channel, skipped, "sync inbox lagged");
                }
                Err(TryRecvError::Closed) => {
                    warn!(channel = self.domain.channel, "sync channel closed");
                    break;
                }
            }
        }
        changed
    }

    fn check_persist(&mut self) {
        let key = self.domain.key;
        self.pending_persists.retain_mut(|reply| match reply.try_recv() {
            Ok(Ok(_)) => false,
            Ok(Err(e)) => {
                warn!(key, "persist failed, keeping local state: {e}");
                false
            }
            Err(oneshot::error::TryRecvError::Empty) => true,
            Err(oneshot::error::TryRecvError::Closed) => {
                debug!(key, "persist reply dropped");
                false
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bridge::resolved;
    use crate::error::BridgeError;
    use crate::host::LocalBridge;
    use serde_json::json;
    use std::sync::Mutex;

    const DOMAIN: Domain = Domain {
        key: "numbers",
        channel: "numbers-sync",
    };

    /// Bridge whose persist always fails; events still flow.
    pub(crate) struct FailingBridge {
        inner: LocalBridge,
        pub(crate) attempts: Mutex<usize>,
    }

    impl FailingBridge {
        pub(crate) fn new() -> Self {
            Self {
                inner: LocalBridge::in_memory(),
                attempts: Mutex::new(0),
            }
        }
    }

    impl HostBridge for FailingBridge {
        fn invoke(&self, command: BridgeCommand) -> Reply {
            *self.attempts.lock().unwrap() += 1;
            resolved(Err(BridgeError::call_failed(command.name(), "disk full")))
        }
        fn emit(&self, event: &str, payload: Value) {
            self.inner.emit(event, payload)
        }
        fn listen(&self, event: &str) -> broadcast::Receiver<Value> {
            self.inner.listen(event)
        }
        fn load(&self, key: &str) -> Option<Value> {
            self.inner.load(key)
        }
    }

    fn window(bridge: &Arc<LocalBridge>, id: &str) -> CrossWindowSync<Vec<u32>> {
        let bridge: Arc<dyn HostBridge> = bridge.clone();
        CrossWindowSync::open(bridge, DOMAIN, SenderId::from(id))
    }

    #[test]
    fn local_edit_reaches_other_window() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut a = window(&bridge, "a");
        let mut b = window(&bridge, "b");

        a.apply_local(vec![1, 2, 3]);
        assert!(b.pump());
        assert_eq!(b.state(), &vec![1, 2, 3]);
    }

    #[test]
    fn own_echo_is_ignored() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut a = window(&bridge, "a");

        a.apply_local(vec![7]);
        a.update(|v| v.push(8));
        assert!(!a.pump());
        assert_eq!(a.state(), &vec![7, 8]);
    }

    #[test]
    fn redelivered_echo_is_noop() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut a = window(&bridge, "a");
        a.apply_local(vec![1]);

        let echo = json!({"payload": [9, 9], "senderId": "a"});
        assert_eq!(a.receive(echo), Received::Echo);
        assert_eq!(a.state(), &vec![1]);
    }

    #[test]
    fn malformed_snapshot_is_dropped() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut b = window(&bridge, "b");
        b.apply_local(vec![4]);

        let bad = json!({"payload": "not a list", "senderId": "a"});
        assert_eq!(b.receive(bad), Received::Dropped);
        assert_eq!(b.receive(json!(42)), Received::Dropped);
        assert_eq!(b.state(), &vec![4]);
    }

    #[test]
    fn remote_snapshot_replaces_not_merges() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut a = window(&bridge, "a");
        let mut b = window(&bridge, "b");

        b.apply_local(vec![10, 11]);
        a.apply_local(vec![1]);
        b.pump();
        assert_eq!(b.state(), &vec![1]);
    }

    #[test]
    fn concurrent_edits_last_writer_wins() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut a = window(&bridge, "a");
        let mut b = window(&bridge, "b");

        a.update(|v| v.push(1));
        b.update(|v| v.push(2));
        a.pump();
        b.pump();

        // a took b's snapshot, b took a's: one edit is lost on each side.
        assert_eq!(a.state(), &vec![2]);
        assert_eq!(b.state(), &vec![1]);
    }

    #[test]
    fn boot_loads_last_persisted_snapshot() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut a = window(&bridge, "a");
        a.apply_local(vec![5, 6]);

        let late = window(&bridge, "late");
        assert_eq!(late.state(), &vec![5, 6]);
    }

    #[test]
    fn boot_with_garbage_snapshot_uses_default() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let mut writer: CrossWindowSync<Value> = CrossWindowSync::open(
            bridge.clone() as Arc<dyn HostBridge>,
            DOMAIN,
            SenderId::from("w"),
        );
        writer.apply_local(json!({"oops": true}));

        let reader = window(&bridge, "r");
        assert!(reader.state().is_empty());
    }

    #[test]
    fn persist_failure_keeps_optimistic_state() {
        let bridge = Arc::new(FailingBridge::new());
        let mut a: CrossWindowSync<Vec<u32>> =
            CrossWindowSync::open(bridge.clone(), DOMAIN, SenderId::from("a"));

        a.apply_local(vec![3]);
        a.pump();
        assert_eq!(a.state(), &vec![3]);
        assert_eq!(*bridge.attempts.lock().unwrap(), 1);
    }

    #[test]
    fn every_persist_is_checked_before_the_next_pump() {
        let bridge = Arc::new(FailingBridge::new());
        let mut a: CrossWindowSync<Vec<u32>> =
            CrossWindowSync::open(bridge.clone(), DOMAIN, SenderId::from("a"));

        a.apply_local(vec![1]);
        a.apply_local(vec![1, 2]);
        assert_eq!(a.pending_persists.len(), 2);

        a.pump();
        assert!(a.pending_persists.is_empty());
        assert_eq!(*bridge.attempts.lock().unwrap(), 2);
        assert_eq!(a.state(), &vec![1, 2]);
    }

    #[test]
    fn envelope_wire_format() {
        let env = SyncEnvelope {
            payload: vec![1u32],
            sender_id: SenderId::from("w1"),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, json!({"payload": [1], "senderId": "w1"}));
    }

    #[test]
    fn generated_sender_ids_differ() {
        assert_ne!(SenderId::generate(), SenderId::generate());
    }
}
