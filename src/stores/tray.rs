//! File tray: paths dropped onto the overlay, shared across windows.

use crate::bridge::{channels, keys, HostBridge};
use crate::clock::Millis;
use crate::sync::{CrossWindowSync, Domain, SenderId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

pub const DOMAIN: Domain = Domain {
    key: keys::FILE_TRAY,
    channel: channels::FILE_TRAY,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTrayItem {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Millis>,
}

impl FileTrayItem {
    /// Build an item from a dropped path.
    ///
    /// Missing files still produce an item (size 0, no resolved path): the
    /// drop is recorded even if the source is gone by the time we look.
    pub fn from_path(path: &str) -> Self {
        let p = Path::new(path);
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());

        let (size, last_modified) = match std::fs::metadata(p) {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as Millis);
                (meta.len(), modified)
            }
            Err(e) => {
                warn!(%path, "no metadata for dropped file: {e}");
                (0, None)
            }
        };

        let resolved_path = std::fs::canonicalize(p)
            .ok()
            .map(|r| r.to_string_lossy().into_owned());

        Self {
            path: path.to_string(),
            resolved_path,
            name,
            size,
            mime_type: guess_mime(p).to_string(),
            last_modified,
        }
    }
}

/// MIME type from the file extension; `application/octet-stream` otherwise.
pub fn guess_mime(path: &Path) -> &'static str {
    if path.is_dir() {
        return "inode/directory";
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

pub struct TrayStore {
    sync: CrossWindowSync<Vec<FileTrayItem>>,
}

impl TrayStore {
    pub fn open(bridge: Arc<dyn HostBridge>, sender_id: SenderId) -> Self {
        Self {
            sync: CrossWindowSync::open(bridge, DOMAIN, sender_id),
        }
    }

    pub fn items(&self) -> &[FileTrayItem] {
        self.sync.state()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Append items whose `path` is not already in the tray.
    ///
    /// Returns how many were actually added.
    pub fn add(&mut self, items: Vec<FileTrayItem>) -> usize {
        let mut fresh: Vec<FileTrayItem> = Vec::new();
        for item in items {
            let known = self.items().iter().any(|i| i.path == item.path)
                || fresh.iter().any(|i| i.path == item.path);
            if known {
                debug!(path = %item.path, "already in tray");
            } else {
                fresh.push(item);
            }
        }
        let added = fresh.len();
        if added > 0 {
            self.sync.update(|tray| tray.extend(fresh));
        }
        added
    }

    /// Add dropped paths, reading metadata for each.
    pub fn add_paths<S: AsRef<str>>(&mut self, paths: &[S]) -> usize {
        self.add(paths.iter().map(|p| FileTrayItem::from_path(p.as_ref())).collect())
    }

    pub fn remove(&mut self, path: &str) -> bool {
        if !self.items().iter().any(|i| i.path == path) {
            return false;
        }
        self.sync.update(|tray| tray.retain(|i| i.path != path));
        true
    }

    pub fn clear(&mut self) {
        if !self.is_empty() {
            self.sync.apply_local(Vec::new());
        }
    }

    pub fn pump(&mut self) -> bool {
        self.sync.pump()
    }
}
