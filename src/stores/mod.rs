//! Domain stores, each a replicated collection over [`crate::sync`].
//!
//! | Store      | Key                 | Channel          |
//! |------------|---------------------|------------------|
//! | timers     | `timer-instances`   | `timer-sync`     |
//! | sessions   | `session-instances` | `session-sync`   |
//! | widgets    | `widget-state`      | `widget-sync`    |
//! | tray       | `file-tray`         | `file-tray-sync` |
//! | notes      | `notes`             | (local only)     |

pub mod notes;
pub mod sessions;
pub mod timers;
pub mod tray;
pub mod widgets;

pub use notes::NotesStore;
pub use sessions::{SessionInstance, SessionStore};
pub use timers::{TimerInstance, TimerStore};
pub use tray::{FileTrayItem, TrayStore};
pub use widgets::{WidgetState, WidgetStore};
