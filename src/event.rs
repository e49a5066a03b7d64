//! Input events delivered to the overlay daemon
//!
//! Sent on the wire as newline-delimited JSON, tagged by `"type"`.

use crate::gesture::ScrollRegion;
use crate::media::NowPlaying;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerEntered,
    PointerExited,
    /// Raw pointer position in screen points (origin top-left).
    PointerMoved {
        x: f64,
        y: f64,
    },
    Click,
    Wheel {
        delta_x: f64,
        delta_y: f64,
        /// Nested horizontal scroller under the pointer, if any.
        #[serde(default)]
        child: Option<ScrollRegion>,
    },
    AnimationSettled,
    PopoverChanged {
        open: bool,
    },
    DragEnter {
        #[serde(default)]
        paths: Vec<String>,
    },
    FileDrop {
        paths: Vec<String>,
    },
    /// Host media session update; absent fields mean "nothing playing".
    MediaChanged(NowPlaying),
    SelectMode {
        id: String,
    },
    ToggleTimer {
        id: String,
    },
    ToggleSession {
        id: String,
    },
    RemoveTrayItem {
        path: String,
    },
    OpenFile {
        path: String,
    },
    RevealFile {
        path: String,
    },
    EditNotes {
        text: String,
    },
    /// A plugin reports whether it wants the pill.
    PluginActivity {
        id: String,
        active: bool,
    },
    OpenSettings,
}

impl InputEvent {
    /// Event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PointerEntered => "pointer_entered",
            Self::PointerExited => "pointer_exited",
            Self::PointerMoved { .. } => "pointer_moved",
            Self::Click => "click",
            Self::Wheel { .. } => "wheel",
            Self::AnimationSettled => "animation_settled",
            Self::PopoverChanged { .. } => "popover_changed",
            Self::DragEnter { .. } => "drag_enter",
            Self::FileDrop { .. } => "file_drop",
            Self::MediaChanged(_) => "media_changed",
            Self::SelectMode { .. } => "select_mode",
            Self::ToggleTimer { .. } => "toggle_timer",
            Self::ToggleSession { .. } => "toggle_session",
            Self::RemoveTrayItem { .. } => "remove_tray_item",
            Self::OpenFile { .. } => "open_file",
            Self::RevealFile { .. } => "reveal_file",
            Self::EditNotes { .. } => "edit_notes",
            Self::PluginActivity { .. } => "plugin_activity",
            Self::OpenSettings => "open_settings",
        }
    }
}
