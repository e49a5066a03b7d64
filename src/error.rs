//! Error types for the overlay core.
//!
//! Nothing here is fatal: callers log these and keep the last known-good
//! local state.

use std::path::PathBuf;
use thiserror::Error;

/// A Host Bridge call failed.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host rejected or could not perform the command.
    #[error("host bridge call `{command}` failed: {reason}")]
    CallFailed { command: String, reason: String },
    /// The host side is gone (daemon not running, reply dropped).
    #[error("host bridge unavailable: {0}")]
    Disconnected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn call_failed(command: &str, reason: impl Into<String>) -> Self {
        Self::CallFailed {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

/// A broadcast snapshot could not be applied.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed snapshot on `{channel}`: {source}")]
    MalformedSnapshot {
        channel: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A plugin folder failed validation.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("plugin.json not found in {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid plugin.json in {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("bundle file '{main}' not found for plugin '{id}'")]
    MissingBundle { id: String, main: String },
}
