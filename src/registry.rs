//! Widget registry - the pluggable widgets that can compete for the pill
//!
//! The registry is an owned value injected into whoever needs it (the
//! overlay controller owns the live one). Registration order is kept: it is
//! the tie-breaker when two widgets share a priority.

use crate::arbiter::ActivitySignals;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Descriptor of one widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetManifest {
    pub id: String,
    pub name: String,
    /// Lower wins.
    pub priority: i32,
    /// Widget can render itself in the collapsed pill.
    pub has_compact_capability: bool,
    pub category: String,
    pub default_enabled: bool,
}

/// Decides whether a widget currently wants the pill.
pub type Activation = Arc<dyn Fn(&ActivitySignals) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RegisteredWidget {
    pub manifest: WidgetManifest,
    activation: Activation,
}

impl RegisteredWidget {
    pub fn is_active(&self, signals: &ActivitySignals) -> bool {
        (self.activation)(signals)
    }
}

impl fmt::Debug for RegisteredWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredWidget")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

/// What changed in a registry notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Registered(String),
    /// Same id registered again; descriptor swapped in place.
    Replaced(String),
    Unregistered(String),
}

/// Handle returned by [`WidgetRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

type Observer = Box<dyn FnMut(&RegistryChange) + Send>;

#[derive(Default)]
pub struct WidgetRegistry {
    widgets: Vec<RegisteredWidget>,
    observers: Vec<(u64, Observer)>,
    next_subscription: u64,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in widgets.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (manifest, activation) in builtin_widgets() {
            registry.register(manifest, activation);
        }
        registry
    }

    /// Add a widget, or replace the one with the same id in place.
    pub fn register(&mut self, manifest: WidgetManifest, activation: Activation) {
        let id = manifest.id.clone();
        let widget = RegisteredWidget {
            manifest,
            activation,
        };
        let change = match self.widgets.iter_mut().find(|w| w.manifest.id == id) {
            Some(existing) => {
                *existing = widget;
                debug!(%id, "widget replaced");
                RegistryChange::Replaced(id)
            }
            None => {
                self.widgets.push(widget);
                info!(%id, "widget registered");
                RegistryChange::Registered(id)
            }
        };
        self.notify(&change);
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        let Some(pos) = self.widgets.iter().position(|w| w.manifest.id == id) else {
            return false;
        };
        self.widgets.remove(pos);
        info!(%id, "widget unregistered");
        self.notify(&RegistryChange::Unregistered(id.to_string()));
        true
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredWidget> {
        self.widgets.iter().find(|w| w.manifest.id == id)
    }

    /// All manifests in registration order.
    pub fn get_all(&self) -> Vec<WidgetManifest> {
        self.widgets.iter().map(|w| w.manifest.clone()).collect()
    }

    pub fn widgets(&self) -> &[RegisteredWidget] {
        &self.widgets
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Call `observer` on every later change until unsubscribed.
    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&RegistryChange) + Send + 'static,
    ) -> Subscription {
        self.next_subscription += 1;
        let id = self.next_subscription;
        self.observers.push((id, Box::new(observer)));
        Subscription(id)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.observers.retain(|(id, _)| *id != subscription.0);
    }

    fn notify(&mut self, change: &RegistryChange) {
        for (_, observer) in &mut self.observers {
            observer(change);
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in widgets
// ---------------------------------------------------------------------------

pub const TIMER_WIDGET: &str = "timer";
pub const SESSION_WIDGET: &str = "session";

fn manifest(id: &str, name: &str, priority: i32, compact: bool, category: &str) -> WidgetManifest {
    WidgetManifest {
        id: id.to_string(),
        name: name.to_string(),
        priority,
        has_compact_capability: compact,
        category: category.to_string(),
        default_enabled: true,
    }
}

/// Wrap a predicate as an [`Activation`].
pub fn when(predicate: impl Fn(&ActivitySignals) -> bool + Send + Sync + 'static) -> Activation {
    Arc::new(predicate)
}

fn never() -> Activation {
    when(|_| false)
}

/// Built-in widgets with their activation predicates.
pub fn builtin_widgets() -> Vec<(WidgetManifest, Activation)> {
    vec![
        (
            manifest(TIMER_WIDGET, "Timers", 20, true, "productivity"),
            when(|s| s.timers_running),
        ),
        (
            manifest(SESSION_WIDGET, "Sessions", 25, true, "productivity"),
            when(|s| s.sessions_active),
        ),
        (manifest("calendar", "Calendar", 40, false, "schedule"), never()),
        (manifest("reminders", "Reminders", 45, false, "schedule"), never()),
        (manifest("notes", "Notes", 50, false, "productivity"), never()),
    ]
}

pub fn builtin_manifests() -> Vec<WidgetManifest> {
    builtin_widgets().into_iter().map(|(m, _)| m).collect()
}
