//! Nook - notch overlay daemon
//!
//! With no subcommand, runs the overlay daemon. Subcommands act as the
//! settings window: they edit the shared stores and broadcast to the daemon,
//! or forward raw input events to it.

use clap::Parser;
use nook::bridge::HostBridge;
use nook::clock::{self, Millis};
use nook::config::{self, NotchInfo, SettingsWatcher};
use nook::event::InputEvent;
use nook::host::{KvStore, LocalBridge};
use nook::ipc::{self, IpcMessage, SocketBridge};
use nook::overlay::{OverlayController, OverlayOptions, RenderProps};
use nook::plugins;
use nook::registry::builtin_manifests;
use nook::stores::{SessionStore, TimerStore, TrayStore, WidgetStore};
use nook::sync::SenderId;
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// ~60 Hz.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "nook", about = "Notch overlay daemon")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Forward one input event (JSON) to the running daemon
    Input {
        /// e.g. '{"type":"click"}'
        event: String,
    },
    /// Manage countdown timers
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },
    /// Manage stopwatch sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Enable or disable widgets
    Widget {
        #[command(subcommand)]
        action: WidgetAction,
    },
    /// Manage the file tray
    Tray {
        #[command(subcommand)]
        action: TrayAction,
    },
    /// List installed plugins and ask the daemon to rescan
    Plugins,
}

#[derive(clap::Subcommand)]
enum TimerAction {
    Add {
        name: String,
        #[arg(long)]
        seconds: u64,
    },
    Toggle {
        id: String,
    },
    Reset {
        id: String,
    },
    Remove {
        id: String,
    },
    List,
}

#[derive(clap::Subcommand)]
enum SessionAction {
    Start {
        name: String,
        #[arg(long)]
        icon: Option<String>,
    },
    Stop {
        id: String,
    },
    Resume {
        id: String,
    },
    Remove {
        id: String,
    },
    List,
}

#[derive(clap::Subcommand)]
enum WidgetAction {
    Enable { id: String },
    Disable { id: String },
    List,
}

#[derive(clap::Subcommand)]
enum TrayAction {
    Add {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    Remove {
        path: String,
    },
    Clear,
    List,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("NOOK_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn store() -> Result<KvStore, Box<dyn Error>> {
    let root = KvStore::default_root().ok_or("data directory not found")?;
    Ok(KvStore::at(root))
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

fn run_daemon() -> CliResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(daemon())
}

async fn next_settings(watcher: &mut Option<SettingsWatcher>) -> Option<config::AppSettings> {
    match watcher {
        Some(w) => w.changed().await,
        None => std::future::pending().await,
    }
}

async fn daemon() -> CliResult {
    let bridge = Arc::new(LocalBridge::new(store()?));
    let settings_path: Option<PathBuf> = config::settings_path();
    let settings = settings_path
        .as_deref()
        .map(config::load_settings_from)
        .unwrap_or_default();

    let options = OverlayOptions {
        settings,
        notch: NotchInfo::default(),
        plugin_dir: plugins::plugins_dir(),
        sender_id: SenderId::generate(),
    };
    let mut overlay = OverlayController::new(bridge.clone(), options, Instant::now());

    let (tx, mut rx) = mpsc::channel::<IpcMessage>(256);
    tokio::spawn(nook::server::start(tx));

    let mut watcher = settings_path.and_then(|path| match SettingsWatcher::new(path) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("not watching settings: {e}");
            None
        }
    });

    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_props: Option<RenderProps> = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("nook daemon running");
    loop {
        tokio::select! {
            Some(message) = rx.recv() => match message {
                IpcMessage::Input { event } => {
                    overlay.handle(event, Instant::now(), clock::now_millis());
                }
                IpcMessage::Broadcast { channel, payload } => bridge.emit(&channel, payload),
            },
            _ = frames.tick() => {
                let props = overlay.frame(Instant::now(), clock::now_millis());
                let changed = last_props
                    .as_ref()
                    .is_none_or(|last| last.mode != props.mode || last.phase != props.phase);
                if changed {
                    debug!(mode = %props.mode, phase = ?props.phase, "render");
                }
                last_props = Some(props);
            }
            Some(settings) = next_settings(&mut watcher) => {
                overlay.apply_settings(settings, Instant::now());
            }
            _ = &mut shutdown => {
                info!("shutting down");
                overlay.shutdown();
                break;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings-window commands
// ---------------------------------------------------------------------------

fn settings_bridge() -> Result<Arc<dyn HostBridge>, Box<dyn Error>> {
    Ok(Arc::new(SocketBridge::new(store()?, ipc::socket_path())))
}

fn format_secs(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

fn not_found(kind: &str, id: &str) -> Box<dyn Error> {
    format!("no {kind} with id {id}").into()
}

fn run_timer(action: TimerAction, now: Millis) -> CliResult {
    let mut timers = TimerStore::open(settings_bridge()?, SenderId::generate());
    let (ok, id) = match action {
        TimerAction::Add { name, seconds } => {
            println!("{}", timers.add(&name, seconds));
            return Ok(());
        }
        TimerAction::Toggle { id } => (timers.toggle(&id, now), id),
        TimerAction::Reset { id } => (timers.reset(&id), id),
        TimerAction::Remove { id } => (timers.remove(&id), id),
        TimerAction::List => {
            for t in timers.all() {
                let state = if t.is_running { "running" } else { "paused" };
                println!(
                    "{}\t{}\t{}\t{state}",
                    t.id,
                    t.name,
                    format_secs(t.live_remaining(now))
                );
            }
            return Ok(());
        }
    };
    if ok { Ok(()) } else { Err(not_found("timer", &id)) }
}

fn run_session(action: SessionAction, now: Millis) -> CliResult {
    let mut sessions = SessionStore::open(settings_bridge()?, SenderId::generate());
    let (ok, id) = match action {
        SessionAction::Start { name, icon } => {
            println!("{}", sessions.start(&name, icon, now));
            return Ok(());
        }
        SessionAction::Stop { id } => (sessions.stop(&id, now), id),
        SessionAction::Resume { id } => (sessions.resume(&id, now), id),
        SessionAction::Remove { id } => (sessions.remove(&id), id),
        SessionAction::List => {
            for s in sessions.all() {
                let state = if s.is_active { "active" } else { "stopped" };
                println!("{}\t{}\t{}\t{state}", s.id, s.name, format_secs(s.elapsed(now)));
            }
            return Ok(());
        }
    };
    if ok { Ok(()) } else { Err(not_found("session", &id)) }
}

fn run_widget(action: WidgetAction) -> CliResult {
    let mut widgets = WidgetStore::open(settings_bridge()?, SenderId::generate());
    let mut manifests = builtin_manifests();
    if let Some(dir) = plugins::plugins_dir() {
        manifests.extend(plugins::scan(&dir).iter().map(|p| p.manifest.to_widget()));
    }

    let (id, enabled) = match action {
        WidgetAction::Enable { id } => (id, true),
        WidgetAction::Disable { id } => (id, false),
        WidgetAction::List => {
            for (id, enabled) in widgets.merged(&manifests) {
                println!("{id}\t{}", if enabled { "enabled" } else { "disabled" });
            }
            return Ok(());
        }
    };
    if !manifests.iter().any(|m| m.id == id) {
        return Err(not_found("widget", &id));
    }
    widgets.set_enabled(&id, enabled);
    Ok(())
}

fn run_tray(action: TrayAction) -> CliResult {
    let mut tray = TrayStore::open(settings_bridge()?, SenderId::generate());
    match action {
        TrayAction::Add { paths } => {
            let added = tray.add_paths(&paths);
            println!("added {added}");
        }
        TrayAction::Remove { path } => {
            if !tray.remove(&path) {
                return Err(format!("{path} is not in the tray").into());
            }
        }
        TrayAction::Clear => tray.clear(),
        TrayAction::List => {
            for item in tray.items() {
                println!("{}\t{}\t{}", item.path, item.mime_type, item.size);
            }
        }
    }
    Ok(())
}

fn run_plugins() -> CliResult {
    let dir = plugins::plugins_dir().ok_or("home directory not found")?;
    for plugin in plugins::scan(&dir) {
        let m = &plugin.manifest;
        println!("{}\t{}\t{}\t{}", m.id, m.version, m.category, plugin.plugin_dir.display());
    }
    let message = IpcMessage::Broadcast {
        channel: nook::bridge::channels::PLUGIN_CHANGED.to_string(),
        payload: Value::Null,
    };
    if let Err(e) = ipc::send(&message) {
        debug!("daemon not notified: {e}");
    }
    Ok(())
}

fn run_input(json: &str) -> CliResult {
    let event: InputEvent = serde_json::from_str(json)?;
    ipc::send(&IpcMessage::Input { event })?;
    Ok(())
}

fn run(command: Option<Command>) -> CliResult {
    let now = clock::now_millis();
    match command {
        None => run_daemon(),
        Some(Command::Input { event }) => run_input(&event),
        Some(Command::Timer { action }) => run_timer(action, now),
        Some(Command::Session { action }) => run_session(action, now),
        Some(Command::Widget { action }) => run_widget(action),
        Some(Command::Tray { action }) => run_tray(action),
        Some(Command::Plugins) => run_plugins(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("nook: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_no_subcommand() {
        let cli = Cli::try_parse_from(["nook"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn cli_verbose_three() {
        let cli = Cli::try_parse_from(["nook", "-vvv"]).unwrap();
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn cli_input() {
        let cli = Cli::try_parse_from(["nook", "input", r#"{"type":"click"}"#]).unwrap();
        match cli.command {
            Some(Command::Input { event }) => assert_eq!(event, r#"{"type":"click"}"#),
            _ => panic!("expected Input command"),
        }
    }

    #[test]
    fn cli_timer_add() {
        let cli =
            Cli::try_parse_from(["nook", "timer", "add", "tea", "--seconds", "180"]).unwrap();
        match cli.command {
            Some(Command::Timer {
                action: TimerAction::Add { name, seconds },
            }) => {
                assert_eq!(name, "tea");
                assert_eq!(seconds, 180);
            }
            _ => panic!("expected timer add"),
        }
    }

    #[test]
    fn cli_timer_add_requires_seconds() {
        assert!(Cli::try_parse_from(["nook", "timer", "add", "tea"]).is_err());
    }

    #[test]
    fn cli_session_start_with_icon() {
        let cli =
            Cli::try_parse_from(["nook", "session", "start", "focus", "--icon", "brain"]).unwrap();
        match cli.command {
            Some(Command::Session {
                action: SessionAction::Start { name, icon },
            }) => {
                assert_eq!(name, "focus");
                assert_eq!(icon.as_deref(), Some("brain"));
            }
            _ => panic!("expected session start"),
        }
    }

    #[test]
    fn cli_tray_add_needs_paths() {
        assert!(Cli::try_parse_from(["nook", "tray", "add"]).is_err());
        let cli = Cli::try_parse_from(["nook", "tray", "add", "/a", "/b"]).unwrap();
        match cli.command {
            Some(Command::Tray {
                action: TrayAction::Add { paths },
            }) => assert_eq!(paths, ["/a", "/b"]),
            _ => panic!("expected tray add"),
        }
    }

    #[test]
    fn cli_widget_disable() {
        let cli = Cli::try_parse_from(["nook", "widget", "disable", "calendar"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Widget {
                action: WidgetAction::Disable { .. }
            })
        ));
    }

    #[test]
    fn format_secs_pads() {
        assert_eq!(format_secs(65), "01:05");
        assert_eq!(format_secs(3725), "1:02:05");
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(run_input("{not json").is_err());
    }
}
