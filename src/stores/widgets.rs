//! Widget enablement flags shared across windows.
//!
//! Only explicit user choices are stored. Ids that were never toggled fall
//! back to the manifest's `defaultEnabled`, so a newly installed plugin shows
//! up with its own default rather than "off".

use crate::bridge::{channels, keys, HostBridge};
use crate::registry::WidgetManifest;
use crate::sync::{CrossWindowSync, Domain, SenderId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const DOMAIN: Domain = Domain {
    key: keys::WIDGETS,
    channel: channels::WIDGETS,
};

/// Persisted as `{"enabled": {id: bool}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetState {
    #[serde(default)]
    pub enabled: BTreeMap<String, bool>,
}

impl WidgetState {
    pub fn is_enabled(&self, id: &str, default: bool) -> bool {
        self.enabled.get(id).copied().unwrap_or(default)
    }
}

pub struct WidgetStore {
    sync: CrossWindowSync<WidgetState>,
}

impl WidgetStore {
    pub fn open(bridge: Arc<dyn HostBridge>, sender_id: SenderId) -> Self {
        Self {
            sync: CrossWindowSync::open(bridge, DOMAIN, sender_id),
        }
    }

    pub fn state(&self) -> &WidgetState {
        self.sync.state()
    }

    /// Effective flag for a registered widget.
    pub fn is_enabled(&self, manifest: &WidgetManifest) -> bool {
        self.state().is_enabled(&manifest.id, manifest.default_enabled)
    }

    /// Effective flags for every manifest, in registry order.
    pub fn merged<'a>(
        &self,
        manifests: impl IntoIterator<Item = &'a WidgetManifest>,
    ) -> Vec<(String, bool)> {
        manifests
            .into_iter()
            .map(|m| (m.id.clone(), self.is_enabled(m)))
            .collect()
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) {
        if self.state().enabled.get(id) == Some(&enabled) {
            return;
        }
        info!(%id, enabled, "widget toggled");
        self.sync.update(|state| {
            state.enabled.insert(id.to_string(), enabled);
        });
    }

    pub fn pump(&mut self) -> bool {
        self.sync.pump()
    }
}
