//! Plugin discovery
//!
//! Plugins live in `~/.nook/plugins/<folder>/plugin.json`, next to the
//! bundle named by `main`. A folder whose bundle is missing is skipped.
//! Discovered plugins become widgets; rendering the bundle is the host's job.

use crate::error::ManifestError;
use crate::registry::{when, WidgetManifest, WidgetRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Priority for plugins that do not declare `compactPriority`.
pub const DEFAULT_PLUGIN_PRIORITY: i32 = 50;

pub const MANIFEST_FILE: &str = "plugin.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Bundle file, relative to the plugin folder.
    pub main: String,
    pub category: String,
    #[serde(default)]
    pub min_width: Option<u32>,
    #[serde(default)]
    pub has_compact_mode: bool,
    #[serde(default)]
    pub compact_priority: Option<i32>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl PluginManifest {
    pub fn to_widget(&self) -> WidgetManifest {
        WidgetManifest {
            id: self.id.clone(),
            name: self.name.clone(),
            priority: self.compact_priority.unwrap_or(DEFAULT_PLUGIN_PRIORITY),
            has_compact_capability: self.has_compact_mode,
            category: self.category.clone(),
            default_enabled: true,
        }
    }
}

/// A validated plugin folder.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub manifest: PluginManifest,
    pub bundle_path: PathBuf,
    pub plugin_dir: PathBuf,
}

/// `~/.nook/plugins`
pub fn plugins_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".nook").join("plugins"))
}

/// Validate one plugin folder.
pub fn load_plugin(dir: &Path) -> Result<PluginInfo, ManifestError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(ManifestError::Missing(dir.to_path_buf()));
    }
    let contents =
        std::fs::read_to_string(&manifest_path).map_err(|source| ManifestError::Read {
            path: manifest_path.clone(),
            source,
        })?;
    let manifest: PluginManifest =
        serde_json::from_str(&contents).map_err(|source| ManifestError::Invalid {
            path: manifest_path.clone(),
            source,
        })?;

    let bundle_path = dir.join(&manifest.main);
    if !bundle_path.exists() {
        return Err(ManifestError::MissingBundle {
            id: manifest.id,
            main: manifest.main,
        });
    }

    Ok(PluginInfo {
        manifest,
        bundle_path,
        plugin_dir: dir.to_path_buf(),
    })
}

/// Every valid plugin under `root`, sorted by id. Invalid folders are logged
/// and skipped; a missing root yields nothing.
pub fn scan(root: &Path) -> Vec<PluginInfo> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("no plugins at {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut plugins: Vec<PluginInfo> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| match load_plugin(&path) {
            Ok(info) => Some(info),
            Err(ManifestError::Missing(_)) => None,
            Err(e) => {
                warn!("skipping plugin: {e}");
                None
            }
        })
        .collect();
    plugins.sort_by(|a, b| a.manifest.id.cmp(&b.manifest.id));
    plugins
}

/// What [`sync_registry`] did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PluginDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Make the registry's plugin widgets match `plugins`.
///
/// `known` is the set of ids previously registered as plugins; it is
/// updated in place. Built-in widgets are never touched. A plugin is active
/// in the pill while its id is in `ActivitySignals::active_plugins`.
pub fn sync_registry(
    registry: &mut WidgetRegistry,
    known: &mut BTreeSet<String>,
    plugins: &[PluginInfo],
) -> PluginDiff {
    let mut diff = PluginDiff::default();
    let current: BTreeSet<String> = plugins.iter().map(|p| p.manifest.id.clone()).collect();

    for id in known.difference(&current) {
        if registry.unregister(id) {
            diff.removed.push(id.clone());
        }
    }

    let mut registered = BTreeSet::new();
    for plugin in plugins {
        let id = plugin.manifest.id.clone();
        let is_new = !known.contains(&id);
        if is_new && registry.contains(&id) {
            warn!(%id, "plugin id collides with a built-in widget; ignoring");
            continue;
        }
        if is_new {
            diff.added.push(id.clone());
        }
        let key = id.clone();
        registry.register(
            plugin.manifest.to_widget(),
            when(move |s| s.active_plugins.contains(&key)),
        );
        registered.insert(id);
    }

    *known = registered;
    diff
}
