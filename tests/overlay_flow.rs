use nook::arbiter::{FILES, IDLE, MEDIA};
use nook::bridge::{HostBridge, events};
use nook::config::AppSettings;
use nook::event::InputEvent;
use nook::geometry::Phase;
use nook::gesture::Tab;
use nook::host::{KvStore, LocalBridge};
use nook::ipc::{self, IpcMessage};
use nook::media::NowPlaying;
use nook::overlay::{OverlayController, OverlayOptions};
use nook::stores::{SessionStore, TimerStore};
use nook::sync::SenderId;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc;

const WALL: i64 = 1_700_000_000_000;

fn options() -> OverlayOptions {
    OverlayOptions {
        settings: AppSettings {
            onboarding_secs: 0,
            ..AppSettings::default()
        },
        sender_id: SenderId::from("overlay"),
        ..OverlayOptions::default()
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn host_drop_flow() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("report.pdf");
    std::fs::write(&file, b"%PDF-1.4").unwrap();
    let path = file.to_string_lossy().to_string();

    let bridge = Arc::new(LocalBridge::new(KvStore::at(dir.path().join("store"))));
    let t0 = Instant::now();
    let mut overlay = OverlayController::new(bridge.clone(), options(), t0);

    bridge.emit(events::DRAG_ENTER, json!([path]));
    bridge.emit(events::FILE_DROP, json!([path]));
    let props = overlay.frame(t0 + ms(16), WALL);

    assert_eq!(props.mode, FILES);
    assert_eq!(props.tab, Tab::Files);
    assert_eq!(props.phase, Phase::Expanded);
    assert_eq!(props.tray.len(), 1);
    assert_eq!(props.tray[0].mime_type, "application/pdf");
    assert_eq!(props.tray[0].size, 8);

    // Dropping the same file again doesn't duplicate it.
    bridge.emit(events::FILE_DROP, json!([path]));
    assert_eq!(overlay.frame(t0 + ms(32), WALL).tray.len(), 1);
}

#[test]
fn media_preempts_files_and_widgets() {
    let bridge = Arc::new(LocalBridge::in_memory());
    let t0 = Instant::now();
    let mut overlay = OverlayController::new(bridge.clone(), options(), t0);
    let mut sessions = SessionStore::open(bridge.clone(), SenderId::from("settings"));
    sessions.start("deep work", Some("brain".into()), WALL);

    overlay.handle(
        InputEvent::FileDrop {
            paths: vec!["/tmp/nook-flow-missing.txt".into()],
        },
        t0,
        WALL,
    );
    assert_eq!(overlay.frame(t0, WALL).available_modes, ["session", FILES, IDLE]);

    overlay.handle(
        InputEvent::MediaChanged(NowPlaying {
            title: Some("Song".into()),
            is_playing: true,
            ..NowPlaying::default()
        }),
        t0 + ms(10),
        WALL,
    );
    let props = overlay.frame(t0 + ms(20), WALL + 20);
    assert_eq!(props.mode, MEDIA);
    assert_eq!(props.available_modes, [MEDIA, "session", FILES, IDLE]);

    // The user picks the session; it sticks until it goes away.
    overlay.handle(InputEvent::SelectMode { id: "session".into() }, t0 + ms(30), WALL);
    assert_eq!(overlay.arbiter().active(), "session");

    let id = sessions.all()[0].id.clone();
    sessions.stop(&id, WALL + 5_000);
    assert_eq!(overlay.frame(t0 + ms(40), WALL + 5_000).mode, MEDIA);
}

#[test]
fn expand_cycle_and_collapse_with_the_wheel() {
    let bridge = Arc::new(LocalBridge::in_memory());
    let t0 = Instant::now();
    let mut overlay = OverlayController::new(bridge.clone(), options(), t0);
    let mut timers = TimerStore::open(bridge.clone(), SenderId::from("settings"));
    let id = timers.add("tea", 180);
    timers.toggle(&id, WALL);

    let props = overlay.frame(t0, WALL);
    assert_eq!(props.mode, "timer");
    assert_eq!(props.phase, Phase::CollapsedActive);
    overlay.handle(InputEvent::AnimationSettled, t0 + ms(300), WALL);

    let wheel = |dx: f64, dy: f64| InputEvent::Wheel {
        delta_x: dx,
        delta_y: dy,
        child: None,
    };

    overlay.handle(wheel(-20.0, 0.0), t0 + ms(400), WALL);
    assert_eq!(overlay.arbiter().active(), IDLE);
    overlay.handle(InputEvent::AnimationSettled, t0 + ms(700), WALL);

    overlay.handle(wheel(0.0, -30.0), t0 + ms(800), WALL);
    assert!(overlay.geometry().state().expanded);
    overlay.handle(InputEvent::AnimationSettled, t0 + ms(1100), WALL);

    overlay.handle(wheel(30.0, 0.0), t0 + ms(1200), WALL);
    assert_eq!(overlay.tab(), Tab::Files);

    overlay.handle(wheel(0.0, 30.0), t0 + ms(1300), WALL);
    assert!(!overlay.geometry().state().expanded);
}

#[test]
fn popover_pins_the_panel_open() {
    let bridge = Arc::new(LocalBridge::in_memory());
    let t0 = Instant::now();
    let mut overlay = OverlayController::new(bridge, options(), t0);

    overlay.handle(InputEvent::PointerEntered, t0, WALL);
    overlay.handle(InputEvent::Click, t0, WALL);
    overlay.handle(InputEvent::AnimationSettled, t0 + ms(300), WALL);
    overlay.handle(InputEvent::PopoverChanged { open: true }, t0 + ms(400), WALL);
    overlay.handle(InputEvent::PointerExited, t0 + ms(500), WALL);
    assert!(overlay.geometry().state().expanded);

    overlay.handle(InputEvent::PopoverChanged { open: false }, t0 + ms(600), WALL);
    assert!(!overlay.geometry().state().expanded);
}

#[test]
fn settings_change_resizes_the_pill() {
    let bridge = Arc::new(LocalBridge::in_memory());
    let t0 = Instant::now();
    let mut overlay = OverlayController::new(bridge.clone(), options(), t0);
    overlay.frame(t0 + ms(400), WALL);
    assert_eq!(bridge.last_bounds().unwrap().width, 185.0);

    let pill = AppSettings {
        non_notch_mode: true,
        base_width: 200.0,
        onboarding_secs: 0,
        ..AppSettings::default()
    };
    overlay.apply_settings(pill, t0 + ms(500));
    overlay.frame(t0 + ms(1000), WALL);
    let bounds = bridge.last_bounds().unwrap();
    assert_eq!(bounds.width, 200.0);
    assert_eq!(bounds.height, 0.0);
}

#[tokio::test]
async fn socket_input_reaches_the_overlay() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("nook.sock");
    let (tx, mut rx) = mpsc::channel(8);
    tokio::spawn(nook::server::serve(socket.clone(), tx));
    while !socket.exists() {
        tokio::task::yield_now().await;
    }

    ipc::send_to(
        &socket,
        &IpcMessage::Input {
            event: InputEvent::Click,
        },
    )
    .unwrap();

    let t0 = Instant::now();
    let mut overlay = OverlayController::new(Arc::new(LocalBridge::in_memory()), options(), t0);
    match rx.recv().await.unwrap() {
        IpcMessage::Input { event } => overlay.handle(event, t0, WALL),
        other => panic!("expected input, got {other:?}"),
    }
    assert!(overlay.geometry().state().expanded);
}
