//! Daemon-side Host Bridge
//!
//! - `KvStore`: the shared key-value store (one JSON file per key, or memory)
//! - `LocalBridge`: KV store + in-process event bus + headless native commands
//!
//! Persist jobs run on tokio's blocking pool when a runtime is available and
//! inline otherwise. Each persist takes a sequence number when it is invoked;
//! a job that lands after a newer one for the same key is skipped, so the
//! file on disk always holds the latest snapshot the core produced.

use crate::bridge::{self, BridgeCommand, EVENT_CAPACITY, HostBridge, Reply, UiBounds};
use crate::config::atomic_write;
use crate::error::BridgeError;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, trace, warn};

/// Accent color reported when the host has no native query.
pub const DEFAULT_ACCENT_COLOR: &str = "#007AFF";

enum Backend {
    Memory(Mutex<HashMap<String, Value>>),
    Dir(PathBuf),
}

/// Shared key-value store for domain snapshots.
pub struct KvStore {
    backend: Backend,
    /// Highest sequence number written per key.
    applied: Mutex<HashMap<String, u64>>,
    next_seq: AtomicU64,
}

impl KvStore {
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory(Mutex::new(HashMap::new())))
    }

    /// Store rooted at `root`; the directory is created on first write.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self::with_backend(Backend::Dir(root.into()))
    }

    /// Platform default location (e.g. `~/.local/share/nook/store`).
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("nook").join("store"))
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            applied: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Reserve the sequence number for a write that is about to be queued.
    pub fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn load(&self, key: &str) -> Option<Value> {
        match &self.backend {
            Backend::Memory(map) => lock(map).get(key).cloned(),
            Backend::Dir(root) => {
                let path = key_path(root, key);
                let contents = std::fs::read_to_string(&path).ok()?;
                match serde_json::from_str(&contents) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("ignoring unreadable {}: {}", path.display(), e);
                        None
                    }
                }
            }
        }
    }

    /// Write `value` under `key` unless a newer sequence already landed.
    ///
    /// Returns `Ok(false)` when the write was superseded.
    pub fn write(&self, key: &str, value: &Value, seq: u64) -> Result<bool, BridgeError> {
        let mut applied = lock(&self.applied);
        if applied.get(key).is_some_and(|&last| last > seq) {
            trace!(%key, seq, "persist superseded");
            return Ok(false);
        }
        match &self.backend {
            Backend::Memory(map) => {
                lock(map).insert(key.to_string(), value.clone());
            }
            Backend::Dir(root) => {
                std::fs::create_dir_all(root)?;
                let json = serde_json::to_string_pretty(value)?;
                atomic_write(&key_path(root, key), json.as_bytes())?;
            }
        }
        applied.insert(key.to_string(), seq);
        Ok(true)
    }
}

fn key_path(root: &Path, key: &str) -> PathBuf {
    root.join(format!("{key}.json"))
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Host Bridge used by the overlay daemon.
pub struct LocalBridge {
    store: Arc<KvStore>,
    bus: Mutex<HashMap<String, broadcast::Sender<Value>>>,
    bounds: Arc<Mutex<Option<UiBounds>>>,
}

impl LocalBridge {
    pub fn new(store: KvStore) -> Self {
        Self {
            store: Arc::new(store),
            bus: Mutex::new(HashMap::new()),
            bounds: Arc::new(Mutex::new(None)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(KvStore::in_memory())
    }

    /// Last bounds reported by the overlay, used for hover hit-testing.
    pub fn last_bounds(&self) -> Option<UiBounds> {
        *lock(&self.bounds)
    }

    fn sender(&self, event: &str) -> broadcast::Sender<Value> {
        lock(&self.bus)
            .entry(event.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CAPACITY).0)
            .clone()
    }
}

impl HostBridge for LocalBridge {
    fn invoke(&self, command: BridgeCommand) -> Reply {
        let seq = self.store.next_seq();
        let store = Arc::clone(&self.store);
        let bounds = Arc::clone(&self.bounds);
        let (tx, rx) = oneshot::channel();

        let job = move || {
            let name = command.name();
            let result = execute(command, &store, &bounds, seq);
            if let Err(e) = &result {
                warn!("{name} failed: {e}");
            }
            let _ = tx.send(result);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
        rx
    }

    fn emit(&self, event: &str, payload: Value) {
        let receivers = self.sender(event).send(payload).unwrap_or(0);
        trace!(%event, receivers, "emit");
    }

    fn listen(&self, event: &str) -> broadcast::Receiver<Value> {
        self.sender(event).subscribe()
    }

    fn load(&self, key: &str) -> Option<Value> {
        self.store.load(key)
    }
}

fn execute(
    command: BridgeCommand,
    store: &KvStore,
    bounds: &Mutex<Option<UiBounds>>,
    seq: u64,
) -> Result<Value, BridgeError> {
    match command {
        BridgeCommand::Persist { key, value } => {
            let written = store.write(&key, &value, seq)?;
            debug!(%key, written, "persisted");
            Ok(Value::Null)
        }
        BridgeCommand::UpdateUiBounds {
            x,
            y,
            width,
            height,
        } => {
            debug!("ui bounds x={x:.0} y={y:.0} w={width:.0} h={height:.0}");
            *lock(bounds) = Some(UiBounds {
                x,
                y,
                width,
                height,
            });
            Ok(Value::Null)
        }
        BridgeCommand::TriggerHaptics { pattern } => {
            debug!(?pattern, "haptics requested (no actuator on this host)");
            Ok(Value::Null)
        }
        BridgeCommand::GetAccentColor => Ok(json!(DEFAULT_ACCENT_COLOR)),
        BridgeCommand::ResolvePath { path } => std::fs::canonicalize(&path)
            .map(|p| json!(p.to_string_lossy()))
            .map_err(|e| BridgeError::call_failed("resolve_path", e.to_string())),
        BridgeCommand::OpenFile { path } => {
            open_with_system(&[path.as_str()])?;
            Ok(Value::Null)
        }
        BridgeCommand::RevealFile { path } => {
            reveal_with_system(&path)?;
            Ok(Value::Null)
        }
        BridgeCommand::OpenSettings => {
            info!("settings window requested; use the `nook` CLI subcommands");
            Ok(Value::Null)
        }
    }
}

#[cfg(target_os = "macos")]
fn open_with_system(args: &[&str]) -> Result<(), BridgeError> {
    std::process::Command::new("open").args(args).spawn()?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn open_with_system(args: &[&str]) -> Result<(), BridgeError> {
    std::process::Command::new("xdg-open").args(args).spawn()?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn reveal_with_system(path: &str) -> Result<(), BridgeError> {
    open_with_system(&["-R", path])
}

#[cfg(not(target_os = "macos"))]
fn reveal_with_system(path: &str) -> Result<(), BridgeError> {
    let parent = Path::new(path)
        .parent()
        .ok_or_else(|| BridgeError::call_failed("reveal_file", "path has no parent"))?;
    open_with_system(&[&parent.to_string_lossy()])
}

/// Wait for a reply that is known to be resolved already (inline execution).
pub fn settle(mut reply: Reply) -> Result<Value, BridgeError> {
    reply
        .try_recv()
        .map_err(|e| BridgeError::Disconnected(e.to_string()))?
}
