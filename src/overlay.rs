//! Overlay controller - composes arbitration, geometry, gestures and the
//! replicated stores into render props
//!
//! Everything here runs on one task. Input events are applied as they
//! arrive via [`OverlayController::handle`]; [`OverlayController::frame`] runs
//! once per animation frame to drain host events and remote snapshots, fire
//! due timers, and recompute the active mode.

use crate::arbiter::{compute_available_modes, ActivitySignals, ModeArbiter};
use crate::bridge::{channels, events, BridgeCommand, HapticPattern, HostBridge, Reply, UiBounds};
use crate::clock::Millis;
use crate::config::{AppSettings, NotchInfo};
use crate::debounce::Debounce;
use crate::event::InputEvent;
use crate::geometry::{
    GeometryController, GeometryState, HoverEdge, HoverTracker, Phase, SizingConfig,
};
use crate::gesture::{GestureRouter, Intent, Tab, WheelContext, WheelOutcome};
use crate::media::{MediaTracker, NowPlaying};
use crate::plugins;
use crate::registry::WidgetRegistry;
use crate::stores::{FileTrayItem, NotesStore, SessionStore, TimerStore, TrayStore, WidgetStore};
use crate::sync::SenderId;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, trace, warn};

/// Period of the timer/session tick.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Construction parameters.
#[derive(Debug, Clone)]
pub struct OverlayOptions {
    pub settings: AppSettings,
    pub notch: NotchInfo,
    /// Where to look for plugins; `None` disables discovery.
    pub plugin_dir: Option<PathBuf>,
    pub sender_id: SenderId,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            settings: AppSettings::default(),
            notch: NotchInfo::default(),
            plugin_dir: None,
            sender_id: SenderId::generate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerView {
    pub id: String,
    pub name: String,
    pub remaining: u64,
    pub is_running: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub elapsed: u64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetView {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderProps {
    pub mode: String,
    pub available_modes: Vec<String>,
    pub phase: Phase,
    pub geometry: GeometryState,
    pub tab: Tab,
    pub accent_color: Option<String>,
    pub now_playing: Option<NowPlaying>,
    pub timers: Vec<TimerView>,
    pub sessions: Vec<SessionView>,
    pub tray: Vec<FileTrayItem>,
    pub widgets: Vec<WidgetView>,
    pub notes: String,
}

/// Host event subscriptions.
struct HostEvents {
    entered: broadcast::Receiver<Value>,
    exited: broadcast::Receiver<Value>,
    drag_enter: broadcast::Receiver<Value>,
    file_drop: broadcast::Receiver<Value>,
    plugin_changed: broadcast::Receiver<Value>,
}

impl HostEvents {
    fn listen(bridge: &dyn HostBridge) -> Self {
        Self {
            entered: bridge.listen(events::MOUSE_ENTERED),
            exited: bridge.listen(events::MOUSE_EXITED),
            drag_enter: bridge.listen(events::DRAG_ENTER),
            file_drop: bridge.listen(events::FILE_DROP),
            plugin_changed: bridge.listen(channels::PLUGIN_CHANGED),
        }
    }
}

fn drain(rx: &mut broadcast::Receiver<Value>, name: &str) -> Vec<Value> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(value) => out.push(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(skipped)) => warn!(%name, skipped, "host events lagged"),
        }
    }
    out
}

fn paths_of(payload: Value, name: &str) -> Option<Vec<String>> {
    match serde_json::from_value(payload) {
        Ok(paths) => Some(paths),
        Err(e) => {
            trace!(%name, "ignoring malformed payload: {e}");
            None
        }
    }
}

pub struct OverlayController {
    bridge: Arc<dyn HostBridge>,
    settings: AppSettings,
    notch: NotchInfo,
    launched_at: Instant,

    registry: WidgetRegistry,
    registry_changed: Arc<AtomicBool>,
    plugin_dir: Option<PathBuf>,
    known_plugins: BTreeSet<String>,
    active_plugins: HashSet<String>,

    timers: TimerStore,
    sessions: SessionStore,
    widgets: WidgetStore,
    tray: TrayStore,
    notes: NotesStore,
    media: MediaTracker,

    arbiter: ModeArbiter,
    geometry: GeometryController,
    gestures: GestureRouter,
    hover: HoverTracker,
    tab: Tab,
    /// Last bounds sent to the host; the hover hit area.
    reported_bounds: Option<UiBounds>,

    tick: Debounce<()>,
    host_events: HostEvents,
    accent_color: Option<String>,
    pending_accent: Option<Reply>,
}

impl OverlayController {
    pub fn new(bridge: Arc<dyn HostBridge>, options: OverlayOptions, now: Instant) -> Self {
        let OverlayOptions {
            settings,
            notch,
            plugin_dir,
            sender_id,
        } = options;
        info!(%sender_id, "overlay starting");

        let mut registry = WidgetRegistry::with_builtins();
        let registry_changed = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&registry_changed);
        registry.subscribe(move |change| {
            trace!(?change, "registry changed");
            flag.store(true, Ordering::Relaxed);
        });

        let mut tick = Debounce::new(TICK_INTERVAL);
        tick.schedule((), now);

        let mut controller = Self {
            host_events: HostEvents::listen(bridge.as_ref()),
            timers: TimerStore::open(Arc::clone(&bridge), sender_id.clone()),
            sessions: SessionStore::open(Arc::clone(&bridge), sender_id.clone()),
            widgets: WidgetStore::open(Arc::clone(&bridge), sender_id.clone()),
            tray: TrayStore::open(Arc::clone(&bridge), sender_id),
            notes: NotesStore::open(Arc::clone(&bridge)),
            media: MediaTracker::new(settings.media_linger()),
            pending_accent: Some(bridge.invoke(BridgeCommand::GetAccentColor)),
            geometry: GeometryController::new(SizingConfig::new(&settings, &notch), now),
            bridge,
            settings,
            notch,
            launched_at: now,
            registry,
            registry_changed,
            plugin_dir,
            known_plugins: BTreeSet::new(),
            active_plugins: HashSet::new(),
            arbiter: ModeArbiter::new(),
            gestures: GestureRouter::default(),
            hover: HoverTracker::default(),
            tab: Tab::default(),
            reported_bounds: None,
            tick,
            accent_color: None,
        };
        controller.rescan_plugins();
        controller.recompute(now);
        controller
    }

    pub fn arbiter(&self) -> &ModeArbiter {
        &self.arbiter
    }

    pub fn geometry(&self) -> &GeometryController {
        &self.geometry
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    pub fn timers(&self) -> &TimerStore {
        &self.timers
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn tray(&self) -> &TrayStore {
        &self.tray
    }

    pub fn notes(&self) -> &NotesStore {
        &self.notes
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Settings changed on disk (storage-change signal).
    pub fn apply_settings(&mut self, settings: AppSettings, now: Instant) {
        info!("settings reloaded");
        self.media.set_linger(settings.media_linger());
        self.settings = settings;
        self.geometry
            .configure(SizingConfig::new(&self.settings, &self.notch), now);
        self.recompute(now);
    }

    /// Apply one input event. `now` drives local timing, `wall` is the
    /// epoch-millis clock stamped into shared state.
    pub fn handle(&mut self, event: InputEvent, now: Instant, wall: Millis) {
        trace!(kind = event.kind(), "input");
        match event {
            InputEvent::PointerEntered => {
                self.geometry.hover_enter(now);
            }
            InputEvent::PointerExited => {
                self.geometry.hover_leave(now);
            }
            InputEvent::PointerMoved { x, y } => {
                let area = self.reported_bounds.unwrap_or_else(|| {
                    HoverTracker::fallback_area(&self.notch, self.settings.non_notch_mode)
                });
                match self.hover.update(x, y, &area) {
                    Some(HoverEdge::Entered) => {
                        self.geometry.hover_enter(now);
                    }
                    Some(HoverEdge::Exited) => {
                        self.geometry.hover_leave(now);
                    }
                    None => {}
                }
            }
            InputEvent::Click => {
                self.geometry.toggle_expanded(now);
            }
            InputEvent::Wheel {
                delta_x,
                delta_y,
                child,
            } => {
                let state = self.geometry.state();
                let ctx = WheelContext {
                    expanded: state.expanded,
                    animating: state.animating,
                    tab: self.tab,
                };
                let outcome = self.gestures.route(delta_x, delta_y, child.as_ref(), ctx, now);
                if let WheelOutcome::Intent(intent) = outcome {
                    self.apply_intent(intent, now);
                }
            }
            InputEvent::AnimationSettled => {
                self.geometry.animation_settled(now);
            }
            InputEvent::PopoverChanged { open } => {
                self.geometry.set_popover(open, now);
            }
            InputEvent::DragEnter { .. } => {
                debug!("drag entered; showing files");
                self.tab = Tab::Files;
                self.geometry.set_expanded(true, now);
            }
            InputEvent::FileDrop { paths } => {
                let added = self.tray.add_paths(&paths);
                info!(dropped = paths.len(), added, "files dropped");
            }
            InputEvent::MediaChanged(now_playing) => {
                self.media.update(Some(now_playing), now);
            }
            InputEvent::SelectMode { id } => {
                if self.arbiter.set_preferred(&id) {
                    info!(mode = self.arbiter.active(), "mode selected");
                }
            }
            InputEvent::ToggleTimer { id } => {
                if !self.timers.toggle(&id, wall) {
                    debug!(%id, "toggle for unknown timer");
                }
            }
            InputEvent::ToggleSession { id } => {
                if !self.sessions.toggle(&id, wall) {
                    debug!(%id, "toggle for unknown session");
                }
            }
            InputEvent::RemoveTrayItem { path } => {
                self.tray.remove(&path);
            }
            InputEvent::OpenFile { path } => {
                drop(self.bridge.invoke(BridgeCommand::OpenFile { path }));
            }
            InputEvent::RevealFile { path } => {
                drop(self.bridge.invoke(BridgeCommand::RevealFile { path }));
            }
            InputEvent::EditNotes { text } => {
                self.notes.edit(text, now);
            }
            InputEvent::PluginActivity { id, active } => {
                if active {
                    self.active_plugins.insert(id);
                } else {
                    self.active_plugins.remove(&id);
                }
            }
            InputEvent::OpenSettings => {
                drop(self.bridge.invoke(BridgeCommand::OpenSettings));
            }
        }
        self.recompute(now);
    }

    fn apply_intent(&mut self, intent: Intent, now: Instant) {
        debug!(?intent, "gesture");
        match intent {
            Intent::Expand => {
                self.geometry.set_expanded(true, now);
            }
            Intent::Collapse => {
                self.geometry.set_expanded(false, now);
            }
            Intent::SwitchTab(tab) => self.tab = tab,
            Intent::CycleMode(direction) => {
                if self.arbiter.cycle(direction) {
                    self.haptic(HapticPattern::Selection);
                }
            }
        }
    }

    /// One animation frame.
    pub fn frame(&mut self, now: Instant, wall: Millis) -> RenderProps {
        self.drain_host_events(now, wall);

        let mut remote = self.timers.pump();
        remote |= self.sessions.pump();
        remote |= self.widgets.pump();
        remote |= self.tray.pump();
        if remote {
            trace!("remote snapshot applied");
        }

        if self.tick.poll(now).is_some() {
            let completed = self.timers.tick(wall);
            if !completed.is_empty() {
                self.haptic(HapticPattern::Success);
            }
            self.tick.schedule((), now);
        }

        self.notes.poll(now);
        self.poll_accent();

        if self.registry_changed.swap(false, Ordering::Relaxed) {
            let registry = &self.registry;
            self.active_plugins.retain(|id| registry.contains(id));
        }

        self.recompute(now);

        if let Some(bounds) = self.geometry.poll(now) {
            debug!(
                "reporting bounds x={:.0} w={:.0} h={:.0}",
                bounds.x, bounds.width, bounds.height
            );
            self.reported_bounds = Some(bounds);
            drop(self.bridge.invoke(BridgeCommand::bounds(bounds)));
        }

        self.render_props(wall)
    }

    /// Save pending notes before shutdown.
    pub fn shutdown(&mut self) {
        self.notes.flush();
    }

    fn drain_host_events(&mut self, now: Instant, wall: Millis) {
        for _ in drain(&mut self.host_events.entered, events::MOUSE_ENTERED) {
            self.handle(InputEvent::PointerEntered, now, wall);
        }
        for _ in drain(&mut self.host_events.exited, events::MOUSE_EXITED) {
            self.handle(InputEvent::PointerExited, now, wall);
        }
        for payload in drain(&mut self.host_events.drag_enter, events::DRAG_ENTER) {
            let paths = paths_of(payload, events::DRAG_ENTER).unwrap_or_default();
            self.handle(InputEvent::DragEnter { paths }, now, wall);
        }
        for payload in drain(&mut self.host_events.file_drop, events::FILE_DROP) {
            if let Some(paths) = paths_of(payload, events::FILE_DROP) {
                self.handle(InputEvent::FileDrop { paths }, now, wall);
            }
        }
        if !drain(&mut self.host_events.plugin_changed, channels::PLUGIN_CHANGED).is_empty() {
            self.rescan_plugins();
        }
    }

    fn rescan_plugins(&mut self) {
        let Some(dir) = self.plugin_dir.as_deref() else {
            return;
        };
        let found = plugins::scan(dir);
        let diff = plugins::sync_registry(&mut self.registry, &mut self.known_plugins, &found);
        if !diff.added.is_empty() || !diff.removed.is_empty() {
            info!(added = ?diff.added, removed = ?diff.removed, "plugins changed");
        }
    }

    fn poll_accent(&mut self) {
        let Some(reply) = self.pending_accent.as_mut() else {
            return;
        };
        match reply.try_recv() {
            Ok(Ok(Value::String(color))) => {
                debug!(%color, "accent color");
                self.accent_color = Some(color);
                self.pending_accent = None;
            }
            Ok(Ok(other)) => {
                warn!("unexpected accent color reply: {other}");
                self.pending_accent = None;
            }
            Ok(Err(e)) => {
                warn!("accent color unavailable: {e}");
                self.pending_accent = None;
            }
            Err(tokio::sync::oneshot::error::TryRecvError::Empty) => {}
            Err(tokio::sync::oneshot::error::TryRecvError::Closed) => self.pending_accent = None,
        }
    }

    fn haptic(&self, pattern: HapticPattern) {
        if self.settings.haptics {
            drop(self.bridge.invoke(BridgeCommand::TriggerHaptics { pattern }));
        }
    }

    fn signals(&self, now: Instant) -> ActivitySignals {
        ActivitySignals {
            timers_running: self.timers.any_running(),
            sessions_active: self.sessions.any_active(),
            media_active: self.media.is_active(now),
            has_files: !self.tray.is_empty(),
            onboarding: now.saturating_duration_since(self.launched_at)
                < self.settings.onboarding_window(),
            active_plugins: self.active_plugins.clone(),
        }
    }

    fn recompute(&mut self, now: Instant) {
        let signals = self.signals(now);
        let widgets = &self.widgets;
        let available =
            compute_available_modes(self.registry.widgets(), |m| widgets.is_enabled(m), &signals);
        if self.arbiter.recompute(available, &signals) {
            info!(mode = self.arbiter.active(), "mode");
        }
        // The active mode can also move outside recompute (selection, cycling).
        self.geometry.set_idle_mode(self.arbiter.is_idle(), now);
    }

    pub fn render_props(&self, wall: Millis) -> RenderProps {
        RenderProps {
            mode: self.arbiter.active().to_string(),
            available_modes: self.arbiter.available().to_vec(),
            phase: self.geometry.phase(),
            geometry: *self.geometry.state(),
            tab: self.tab,
            accent_color: self.accent_color.clone(),
            now_playing: self.media.track().cloned(),
            timers: self
                .timers
                .all()
                .iter()
                .map(|t| TimerView {
                    id: t.id.clone(),
                    name: t.name.clone(),
                    remaining: t.live_remaining(wall),
                    is_running: t.is_running,
                })
                .collect(),
            sessions: self
                .sessions
                .all()
                .iter()
                .map(|s| SessionView {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    icon: s.icon.clone(),
                    elapsed: s.elapsed(wall),
                    is_active: s.is_active,
                })
                .collect(),
            tray: self.tray.items().to_vec(),
            widgets: self
                .registry
                .widgets()
                .iter()
                .map(|w| WidgetView {
                    id: w.manifest.id.clone(),
                    name: w.manifest.name.clone(),
                    enabled: self.widgets.is_enabled(&w.manifest),
                })
                .collect(),
            notes: self.notes.text().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::{FILES, IDLE, MEDIA, ONBOARD};
    use crate::host::LocalBridge;
    use serde_json::json;

    const WALL: Millis = 1_700_000_000_000;

    fn no_onboarding() -> OverlayOptions {
        OverlayOptions {
            settings: AppSettings {
                onboarding_secs: 0,
                ..AppSettings::default()
            },
            sender_id: SenderId::from("overlay"),
            ..OverlayOptions::default()
        }
    }

    fn overlay(bridge: &Arc<LocalBridge>, t0: Instant) -> OverlayController {
        OverlayController::new(bridge.clone(), no_onboarding(), t0)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_in_onboarding_then_idles() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let options = OverlayOptions {
            sender_id: SenderId::from("overlay"),
            ..OverlayOptions::default()
        };
        let mut o = OverlayController::new(bridge, options, t0);
        assert_eq!(o.arbiter().active(), ONBOARD);

        let props = o.frame(t0 + Duration::from_secs(6), WALL);
        assert_eq!(props.mode, IDLE);
        assert_eq!(props.phase, Phase::CollapsedIdle);
    }

    #[test]
    fn media_takes_over_and_lingers() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);

        let playing = NowPlaying {
            title: Some("Song".into()),
            is_playing: true,
            ..NowPlaying::default()
        };
        o.handle(InputEvent::MediaChanged(playing.clone()), t0, WALL);
        assert_eq!(o.arbiter().active(), MEDIA);
        assert_eq!(o.geometry().phase(), Phase::CollapsedActive);

        let paused = NowPlaying {
            is_playing: false,
            ..playing
        };
        o.handle(InputEvent::MediaChanged(paused), t0 + ms(1000), WALL);
        assert_eq!(o.frame(t0 + ms(3000), WALL).mode, MEDIA);
        let props = o.frame(t0 + ms(4100), WALL);
        assert_eq!(props.mode, IDLE);
        assert_eq!(props.now_playing.unwrap().title.as_deref(), Some("Song"));
    }

    #[test]
    fn file_drop_switches_to_files() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);

        o.handle(InputEvent::DragEnter { paths: vec![] }, t0, WALL);
        assert!(o.geometry().state().expanded);
        assert_eq!(o.tab(), Tab::Files);

        o.handle(
            InputEvent::FileDrop {
                paths: vec!["/tmp/nook-missing-a.txt".into()],
            },
            t0,
            WALL,
        );
        assert_eq!(o.arbiter().active(), FILES);
        assert_eq!(o.tray().items().len(), 1);
    }

    #[test]
    fn selecting_idle_resizes_to_the_idle_pill() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        o.handle(
            InputEvent::FileDrop {
                paths: vec!["/tmp/nook-missing-select.txt".into()],
            },
            t0,
            WALL,
        );
        assert_eq!(o.geometry().phase(), Phase::CollapsedActive);
        assert_eq!(o.geometry().state().target.w, 265.0);

        o.handle(InputEvent::SelectMode { id: IDLE.into() }, t0 + ms(100), WALL);
        assert_eq!(o.arbiter().active(), IDLE);
        assert_eq!(o.geometry().phase(), Phase::CollapsedIdle);
        assert_eq!(o.geometry().state().target.w, 185.0);
        assert_eq!(o.geometry().state().target.h, 32.0);

        // Still idle after a frame; the pick sticks while files stay present.
        let props = o.frame(t0 + ms(200), WALL);
        assert_eq!(props.mode, IDLE);
        assert_eq!(props.phase, Phase::CollapsedIdle);
    }

    #[test]
    fn wheel_expands_and_cycles() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        o.handle(
            InputEvent::FileDrop {
                paths: vec!["/tmp/nook-missing-b.txt".into()],
            },
            t0,
            WALL,
        );
        o.handle(InputEvent::AnimationSettled, t0, WALL);
        assert_eq!(o.arbiter().available(), [FILES, IDLE]);

        let wheel = |dx, dy| InputEvent::Wheel {
            delta_x: dx,
            delta_y: dy,
            child: None,
        };
        o.handle(wheel(25.0, 0.0), t0 + ms(10), WALL);
        assert_eq!(o.arbiter().active(), IDLE);
        o.handle(InputEvent::AnimationSettled, t0 + ms(20), WALL);
        o.handle(wheel(25.0, 0.0), t0 + ms(100), WALL);
        assert_eq!(o.arbiter().active(), IDLE, "cooldown");

        o.handle(wheel(0.0, -25.0), t0 + ms(200), WALL);
        assert!(o.geometry().state().expanded);
    }

    #[test]
    fn hover_leave_auto_collapses() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        o.handle(InputEvent::PointerEntered, t0, WALL);
        o.handle(InputEvent::Click, t0, WALL);
        o.handle(InputEvent::AnimationSettled, t0 + ms(300), WALL);
        o.handle(InputEvent::PointerExited, t0 + ms(400), WALL);
        assert!(!o.geometry().state().expanded);
    }

    #[test]
    fn pointer_moves_hit_the_notch() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        o.handle(InputEvent::PointerMoved { x: 756.0, y: 10.0 }, t0, WALL);
        assert!(o.geometry().state().hovered);
        o.handle(InputEvent::PointerMoved { x: 100.0, y: 500.0 }, t0, WALL);
        assert!(!o.geometry().state().hovered);
    }

    #[test]
    fn host_mouse_events_drive_hover() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        bridge.emit(events::MOUSE_ENTERED, Value::Null);
        o.frame(t0, WALL);
        assert!(o.geometry().state().hovered);
    }

    #[test]
    fn bounds_reported_once_after_delay() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        o.frame(t0 + ms(100), WALL);
        assert_eq!(bridge.last_bounds(), None);

        o.frame(t0 + ms(400), WALL);
        let bounds = bridge.last_bounds().unwrap();
        assert_eq!(bounds.width, 185.0);
        assert_eq!(bounds.y, 0.0);
    }

    #[test]
    fn tick_completes_timers() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut settings_window = TimerStore::open(bridge.clone(), SenderId::from("settings"));
        let mut o = overlay(&bridge, t0);

        let id = settings_window.add("egg", 2);
        settings_window.toggle(&id, WALL);
        let props = o.frame(t0 + ms(16), WALL);
        assert_eq!(props.mode, "timer");
        assert_eq!(props.timers[0].remaining, 2);

        let props = o.frame(t0 + ms(3000), WALL + 3000);
        assert!(props.timers.is_empty());
        assert_eq!(props.mode, IDLE);
    }

    #[test]
    fn disabled_widget_leaves_the_pill() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        let mut settings_window = WidgetStore::open(bridge.clone(), SenderId::from("settings"));

        o.handle(InputEvent::ToggleSession { id: "nope".into() }, t0, WALL);
        let mut sessions = SessionStore::open(bridge.clone(), SenderId::from("settings"));
        sessions.start("focus", None, WALL);
        assert_eq!(o.frame(t0, WALL).mode, "session");

        settings_window.set_enabled("session", false);
        assert_eq!(o.frame(t0, WALL).mode, IDLE);
    }

    #[test]
    fn plugin_activity_and_rescan() {
        let dir = tempfile::TempDir::new().unwrap();
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = OverlayController::new(
            bridge.clone(),
            OverlayOptions {
                plugin_dir: Some(dir.path().to_path_buf()),
                ..no_onboarding()
            },
            t0,
        );

        let plugin = dir.path().join("weather");
        std::fs::create_dir_all(&plugin).unwrap();
        std::fs::write(plugin.join("index.js"), "").unwrap();
        std::fs::write(
            plugin.join("plugin.json"),
            json!({
                "id": "weather", "name": "Weather", "version": "1.0.0",
                "description": "", "main": "index.js", "category": "info",
                "hasCompactMode": true, "compactPriority": 5, "permissions": []
            })
            .to_string(),
        )
        .unwrap();

        bridge.emit(channels::PLUGIN_CHANGED, Value::Null);
        o.frame(t0, WALL);
        assert!(o.registry().contains("weather"));

        o.handle(
            InputEvent::PluginActivity {
                id: "weather".into(),
                active: true,
            },
            t0,
            WALL,
        );
        assert_eq!(o.arbiter().active(), "weather");

        std::fs::remove_dir_all(&plugin).unwrap();
        bridge.emit(channels::PLUGIN_CHANGED, Value::Null);
        assert_eq!(o.frame(t0, WALL).mode, IDLE);
    }

    #[test]
    fn notes_autosave_through_frames() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        o.handle(InputEvent::EditNotes { text: "milk".into() }, t0, WALL);
        o.frame(t0 + ms(100), WALL);
        assert_eq!(bridge.load(crate::bridge::keys::NOTES), None);
        o.frame(t0 + ms(600), WALL);
        assert_eq!(bridge.load(crate::bridge::keys::NOTES), Some(json!("milk")));
    }

    #[test]
    fn accent_color_arrives() {
        let bridge = Arc::new(LocalBridge::in_memory());
        let t0 = Instant::now();
        let mut o = overlay(&bridge, t0);
        let props = o.frame(t0, WALL);
        assert_eq!(
            props.accent_color.as_deref(),
            Some(crate::host::DEFAULT_ACCENT_COLOR)
        );
    }
}
