//! Nook - notch overlay core: mode arbitration, geometry, gestures and
//! cross-window state sync

pub mod arbiter;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod geometry;
pub mod gesture;
pub mod host;
pub mod ipc;
pub mod media;
pub mod overlay;
pub mod plugins;
pub mod registry;
pub mod server;
pub mod stores;
pub mod sync;

pub use error::{BridgeError, ManifestError, SyncError};
pub use event::InputEvent;
