//! Session callbacks towards the surrounding editor integration
//!
//! The session fires these after it has brought its own state up to date.
//! Observers receive borrowed views; buffer ownership stays with the slots.

use sqlscope_core::{Completion, ScriptCursor, ScriptKey};

use crate::slot::ScriptBuffers;

/// Callbacks consumed by editor decoration and graph rendering layers.
/// All methods default to no-ops so observers implement what they need.
pub trait SessionObserver {
    /// Fired after every successful re-analysis of a slot
    fn on_script_update(
        &mut self,
        key: ScriptKey,
        buffers: &ScriptBuffers,
        cursor: Option<&ScriptCursor>,
    ) {
        let _ = (key, buffers, cursor);
    }

    /// Fired on pure cursor moves
    fn on_cursor_update(&mut self, key: ScriptKey, cursor: &ScriptCursor) {
        let _ = (key, cursor);
    }

    /// Fired when a completion session opens with a fresh candidate list
    fn on_completion_start(&mut self, key: ScriptKey, completion: &Completion) {
        let _ = (key, completion);
    }

    /// Fired when the selected candidate changes
    fn on_completion_peek(&mut self, key: ScriptKey, completion: &Completion, candidate: usize) {
        let _ = (key, completion, candidate);
    }

    /// Fired when a completion session ends, with or without an applied candidate
    fn on_completion_stop(&mut self, key: ScriptKey) {
        let _ = key;
    }
}
