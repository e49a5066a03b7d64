//! Host Bridge - the boundary to native OS operations and cross-window plumbing
//!
//! The core never blocks on the host. `invoke` hands back a [`Reply`] that
//! callers are free to drop; `emit`/`listen` move JSON payloads over named
//! event channels; `load` reads a persisted blob at boot.
//!
//! Two implementations live elsewhere: `host::LocalBridge` (the daemon) and
//! `ipc::SocketBridge` (CLI processes acting as the settings window).

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

/// Pending result of a bridge command. Dropping it is fine.
pub type Reply = oneshot::Receiver<Result<Value, BridgeError>>;

/// Capacity of each broadcast channel on the event bus.
pub const EVENT_CAPACITY: usize = 64;

/// Inbound host events.
pub mod events {
    /// Pointer entered the notch / overlay region. Payload: `null`.
    pub const MOUSE_ENTERED: &str = "mouse-entered-notch";
    /// Pointer left the notch / overlay region. Payload: `null`.
    pub const MOUSE_EXITED: &str = "mouse-exited-notch";
    /// OS drag session entered the window. Payload: `[path, ...]`.
    pub const DRAG_ENTER: &str = "drag-enter-event";
    /// Files dropped on the window. Payload: `[path, ...]`.
    pub const FILE_DROP: &str = "file-drop-event";
}

/// Cross-window broadcast channels, one per domain.
pub mod channels {
    pub const TIMER: &str = "timer-sync";
    pub const SESSION: &str = "session-sync";
    pub const WIDGETS: &str = "widget-sync";
    pub const FILE_TRAY: &str = "file-tray-sync";
    /// Plugins were installed or removed. Payload: `null`.
    pub const PLUGIN_CHANGED: &str = "plugin-changed";
}

/// Keys in the shared key-value store.
pub mod keys {
    pub const TIMERS: &str = "timer-instances";
    pub const SESSIONS: &str = "session-instances";
    pub const WIDGETS: &str = "widget-state";
    pub const FILE_TRAY: &str = "file-tray";
    pub const NOTES: &str = "notes";
    pub const APP_SETTINGS: &str = "app-settings";
}

/// Screen-space bounding box of the visible overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UiBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Haptic feedback patterns understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HapticPattern {
    Generic,
    Alignment,
    LevelChange,
    Light,
    #[default]
    Medium,
    Heavy,
    Selection,
    Success,
    Error,
}

/// One-shot imperative operations on the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Store a named JSON blob in the shared key-value store.
    Persist { key: String, value: Value },
    /// Report where the overlay currently sits on screen.
    UpdateUiBounds {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    TriggerHaptics { pattern: HapticPattern },
    GetAccentColor,
    OpenFile { path: String },
    RevealFile { path: String },
    ResolvePath { path: String },
    OpenSettings,
}

impl BridgeCommand {
    /// Command name as used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Persist { .. } => "persist",
            Self::UpdateUiBounds { .. } => "update_ui_bounds",
            Self::TriggerHaptics { .. } => "trigger_haptics",
            Self::GetAccentColor => "get_system_accent_color",
            Self::OpenFile { .. } => "open_file",
            Self::RevealFile { .. } => "reveal_file",
            Self::ResolvePath { .. } => "resolve_path",
            Self::OpenSettings => "open_settings",
        }
    }

    pub fn bounds(bounds: UiBounds) -> Self {
        Self::UpdateUiBounds {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        }
    }
}

/// Abstract native/OS boundary.
pub trait HostBridge: Send + Sync {
    /// Run an imperative command. Never blocks the caller.
    fn invoke(&self, command: BridgeCommand) -> Reply;

    /// Publish `payload` on the named event channel.
    fn emit(&self, event: &str, payload: Value);

    /// Subscribe to the named event channel. Dropping the receiver unsubscribes.
    fn listen(&self, event: &str) -> broadcast::Receiver<Value>;

    /// Read a persisted blob. `None` when absent or unreadable.
    fn load(&self, key: &str) -> Option<Value>;
}

/// A reply that is already resolved.
pub fn resolved(result: Result<Value, BridgeError>) -> Reply {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(result);
    rx
}
