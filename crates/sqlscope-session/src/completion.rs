//! The completion session controller
//!
//! Thin by design: candidate generation lives in the engine. This layer only
//! drives cursor-triggered requests, keeps at most one completion buffer
//! alive per slot, and applies the chosen candidate back into the script as
//! a single replace-range edit.

use sqlscope_core::{Result, ScriptKey, SqlscopeError, TextChange, TextRange};

use crate::session::Session;
use crate::slot::CompletionState;

/// Upper bound on candidates requested from the engine
pub const COMPLETION_CANDIDATE_LIMIT: usize = 32;

impl Session {
    /// Refresh the completion session after a cursor move: request candidates
    /// while the cursor sits at the begin, middle or end of a token, release
    /// the buffer as soon as it moves elsewhere.
    pub(crate) fn update_completion(&mut self, key: ScriptKey) {
        let eligible = self
            .slots
            .get(key)
            .cursor
            .as_ref()
            .is_some_and(|c| c.at_token());
        if eligible {
            if let Err(error) = self.start_completion(key) {
                tracing::debug!(?key, %error, "completion request failed");
                self.stop_completion(key);
            }
        } else {
            self.stop_completion(key);
        }
    }

    /// Request a fresh candidate list at the slot's cursor. Starting a new
    /// request implicitly releases the slot's previous completion buffer,
    /// and any completion on the other slot stops.
    pub fn start_completion(&mut self, key: ScriptKey) -> Result<()> {
        let slot = self.slots.get(key);
        let script = slot
            .script
            .ok_or(SqlscopeError::NullHandle("script handle"))?;
        let offset = slot.cursor.as_ref().map_or(0, |c| c.text_offset);

        let buffer = self
            .engine
            .complete_at_cursor(script, offset, COMPLETION_CANDIDATE_LIMIT)?;

        let other = match key {
            ScriptKey::Query => ScriptKey::Schema,
            ScriptKey::Schema => ScriptKey::Query,
        };
        self.stop_completion(other);

        let slot = self.slots.get_mut(key);
        if let Some(previous) = slot.completion.as_mut() {
            previous.buffer.release();
        }
        slot.completion = Some(CompletionState {
            buffer,
            selected: 0,
        });

        if let Some(observer) = self.observer.as_mut() {
            if let Some((completion, _)) = self.slots.get(key).completion() {
                observer.on_completion_start(key, completion);
            }
        }
        self.refresh_focus(key);
        Ok(())
    }

    /// Change the selected candidate and re-derive focus from it
    pub fn peek_completion(&mut self, key: ScriptKey, candidate: usize) -> Result<()> {
        let slot = self.slots.get_mut(key);
        let state = slot
            .completion
            .as_mut()
            .ok_or(SqlscopeError::NullHandle("completion buffer"))?;
        let completion = state.buffer.read()?;
        if candidate >= completion.candidates.len() {
            return Err(SqlscopeError::NullHandle("completion candidate"));
        }
        state.selected = candidate;

        if let Some(observer) = self.observer.as_mut() {
            if let Some((completion, selected)) = self.slots.get(key).completion() {
                observer.on_completion_peek(key, completion, selected);
            }
        }
        self.completion_focus = Some(key);
        self.refresh_focus(key);
        Ok(())
    }

    /// Apply the selected candidate as a single replace-range edit, then
    /// release the completion buffer and re-analyze through the normal edit
    /// path
    pub fn apply_completion(&mut self, key: ScriptKey) -> Result<()> {
        let (text, replace_at): (String, TextRange) = {
            let (completion, selected) = self
                .slots
                .get(key)
                .completion()
                .ok_or(SqlscopeError::NullHandle("completion buffer"))?;
            let candidate = completion
                .candidates
                .get(selected)
                .ok_or(SqlscopeError::NullHandle("completion candidate"))?;
            (candidate.text.clone(), candidate.replace_at)
        };

        self.stop_completion(key);
        self.edit_text(
            key,
            &[
                TextChange::Erase {
                    offset: replace_at.offset,
                    length: replace_at.length,
                },
                TextChange::Insert {
                    offset: replace_at.offset,
                    text,
                },
            ],
        )
    }

    /// End the slot's completion session, releasing its buffer. A no-op when
    /// no completion is active.
    pub fn stop_completion(&mut self, key: ScriptKey) {
        let slot = self.slots.get_mut(key);
        let Some(mut state) = slot.completion.take() else {
            return;
        };
        state.buffer.release();
        if self.completion_focus == Some(key) {
            self.completion_focus = None;
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.on_completion_stop(key);
        }
        self.refresh_focus(key);
    }
}
