//! Scratch notes with debounced autosave.
//!
//! Notes are local to one window: they are persisted but never broadcast.

use crate::bridge::{keys, BridgeCommand, HostBridge, Reply};
use crate::debounce::Debounce;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const AUTOSAVE_DELAY: Duration = Duration::from_millis(500);

pub struct NotesStore {
    bridge: Arc<dyn HostBridge>,
    text: String,
    autosave: Debounce<String>,
    pending_save: Option<Reply>,
}

impl NotesStore {
    pub fn open(bridge: Arc<dyn HostBridge>) -> Self {
        let text = match bridge.load(keys::NOTES) {
            Some(Value::String(text)) => text,
            Some(other) => {
                warn!("ignoring non-text notes blob: {other}");
                String::new()
            }
            None => String::new(),
        };
        Self {
            bridge,
            text,
            autosave: Debounce::new(AUTOSAVE_DELAY),
            pending_save: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_dirty(&self) -> bool {
        self.autosave.is_pending()
    }

    /// Replace the text and (re)start the autosave delay.
    pub fn edit(&mut self, text: impl Into<String>, now: Instant) {
        self.text = text.into();
        self.autosave.schedule(self.text.clone(), now);
    }

    /// Save if the autosave delay has passed. Returns `true` when a save was issued.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.check_save();
        match self.autosave.poll(now) {
            Some(text) => {
                self.save(text);
                true
            }
            None => false,
        }
    }

    /// Save any pending edit right away.
    pub fn flush(&mut self) {
        if let Some(text) = self.autosave.cancel() {
            self.save(text);
        }
    }

    fn save(&mut self, text: String) {
        debug!(chars = text.chars().count(), "notes autosave");
        self.pending_save = Some(self.bridge.invoke(BridgeCommand::Persist {
            key: keys::NOTES.to_string(),
            value: Value::String(text),
        }));
    }

    fn check_save(&mut self) {
        if let Some(reply) = self.pending_save.as_mut()
            && let Ok(result) = reply.try_recv()
        {
            if let Err(e) = result {
                warn!("notes save failed: {e}");
            }
            self.pending_save = None;
        }
    }
}
