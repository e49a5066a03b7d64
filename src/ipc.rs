//! IPC between `nook` CLI invocations and the daemon
//!
//! Both ends live in the same binary, so [`IpcMessage`] goes on the wire as
//! newline-delimited JSON tagged by `"msg"`.

use crate::bridge::{BridgeCommand, HostBridge, Reply};
use crate::error::BridgeError;
use crate::event::InputEvent;
use crate::host::{KvStore, LocalBridge};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default socket path for the daemon.
pub fn socket_path() -> PathBuf {
    std::env::temp_dir().join("nook.sock")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum IpcMessage {
    /// An input event for the overlay.
    Input { event: InputEvent },
    /// A cross-window broadcast to re-emit on the daemon's bus.
    Broadcast { channel: String, payload: Value },
}

/// Send one message to the daemon at the default socket.
pub fn send(message: &IpcMessage) -> Result<(), BridgeError> {
    send_to(&socket_path(), message)
}

pub fn send_to(path: &Path, message: &IpcMessage) -> Result<(), BridgeError> {
    let mut stream = UnixStream::connect(path)
        .map_err(|e| BridgeError::Disconnected(format!("{}: {e}", path.display())))?;
    let json = serde_json::to_string(message)?;
    writeln!(stream, "{json}")?;
    Ok(())
}

/// Host Bridge for processes that act as the settings window.
///
/// Commands and loads go straight to the shared store. Broadcasts are
/// delivered locally and forwarded to the daemon, which re-emits them to the
/// overlay.
pub struct SocketBridge {
    local: LocalBridge,
    socket: PathBuf,
}

impl SocketBridge {
    pub fn new(store: KvStore, socket: PathBuf) -> Self {
        Self {
            local: LocalBridge::new(store),
            socket,
        }
    }
}

impl HostBridge for SocketBridge {
    fn invoke(&self, command: BridgeCommand) -> Reply {
        self.local.invoke(command)
    }

    fn emit(&self, event: &str, payload: Value) {
        self.local.emit(event, payload.clone());
        let message = IpcMessage::Broadcast {
            channel: event.to_string(),
            payload,
        };
        match send_to(&self.socket, &message) {
            Ok(()) => trace!(%event, "forwarded to daemon"),
            Err(e) => debug!(%event, "daemon not reachable: {e}"),
        }
    }

    fn listen(&self, event: &str) -> broadcast::Receiver<Value> {
        self.local.listen(event)
    }

    fn load(&self, key: &str) -> Option<Value> {
        self.local.load(key)
    }
}
