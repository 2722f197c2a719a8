//! Script slots: per-script analysis state
//!
//! A session tracks exactly two slots, one per `ScriptKey`. Each slot owns
//! its engine script handle, the analysis buffer triple produced from the
//! current text version, the last cursor and the loading state machine.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use sqlscope_core::{
    AnalyzedScript, BufferHandle, Completion, ParsedScript, ScannedScript, ScriptCursor, ScriptId,
    ScriptKey,
};

/// The analysis buffers of one script slot.
///
/// A non-null `analyzed` implies non-null `parsed` implies non-null `scanned`,
/// all produced from the same text version. The slot is the single owner;
/// buffers are released before they are replaced.
#[derive(Debug, Default)]
pub struct ScriptBuffers {
    pub scanned: BufferHandle<ScannedScript>,
    pub parsed: BufferHandle<ParsedScript>,
    pub analyzed: BufferHandle<AnalyzedScript>,
}

impl ScriptBuffers {
    /// Release all three buffers. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.scanned.release();
        self.parsed.release();
        self.analyzed.release();
    }

    pub fn has_analysis(&self) -> bool {
        !self.analyzed.is_null()
    }
}

/// Per-edit analysis state of a slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    /// No load or edit has been processed yet
    #[default]
    Pending,
    /// An analysis run is in flight
    Started,
    Succeeded,
    Failed,
}

/// Loading state of a slot, fed by edits and external text loads
#[derive(Debug, Clone, Default)]
pub struct LoadingState {
    pub status: SlotStatus,
    pub error: Option<String>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl LoadingState {
    pub(crate) fn start(&mut self) {
        self.status = SlotStatus::Started;
        self.error = None;
        self.started_at = Some(Instant::now());
        self.finished_at = None;
    }

    pub(crate) fn succeed(&mut self) {
        self.status = SlotStatus::Succeeded;
        self.error = None;
        self.finished_at = Some(Instant::now());
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.status = SlotStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Instant::now());
    }
}

/// An active completion session on a slot. At most one completion buffer is
/// alive per slot; starting a new request releases the previous one.
#[derive(Debug, Default)]
pub struct CompletionState {
    pub buffer: BufferHandle<Completion>,
    pub selected: usize,
}

/// One logical script of the session
#[derive(Debug)]
pub struct ScriptSlot {
    pub key: ScriptKey,
    /// Bumped on every successful re-analysis or text load
    pub version: u64,
    pub(crate) script: Option<ScriptId>,
    pub buffers: ScriptBuffers,
    pub cursor: Option<ScriptCursor>,
    pub loading: LoadingState,
    pub(crate) completion: Option<CompletionState>,
}

impl ScriptSlot {
    fn new(key: ScriptKey) -> Self {
        Self {
            key,
            version: 0,
            script: None,
            buffers: ScriptBuffers::default(),
            cursor: None,
            loading: LoadingState::default(),
            completion: None,
        }
    }

    /// The engine script handle, while the slot has one
    pub fn script(&self) -> Option<ScriptId> {
        self.script
    }

    /// The active completion and its selected candidate index
    pub fn completion(&self) -> Option<(&Completion, usize)> {
        let state = self.completion.as_ref()?;
        state.buffer.get().map(|c| (c, state.selected))
    }
}

/// The two slots of a session, indexed by `ScriptKey`
#[derive(Debug)]
pub struct SlotMap {
    slots: [ScriptSlot; 2],
}

impl Default for SlotMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotMap {
    pub fn new() -> Self {
        Self {
            slots: [
                ScriptSlot::new(ScriptKey::Query),
                ScriptSlot::new(ScriptKey::Schema),
            ],
        }
    }

    pub fn get(&self, key: ScriptKey) -> &ScriptSlot {
        &self.slots[key.index()]
    }

    pub fn get_mut(&mut self, key: ScriptKey) -> &mut ScriptSlot {
        &mut self.slots[key.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptSlot> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_state_machine() {
        let mut state = LoadingState::default();
        assert_eq!(state.status, SlotStatus::Pending);

        state.start();
        assert_eq!(state.status, SlotStatus::Started);
        assert!(state.started_at.is_some());
        assert!(state.finished_at.is_none());

        state.fail("parse error".into());
        assert_eq!(state.status, SlotStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("parse error"));
        assert!(state.finished_at.is_some());

        state.start();
        state.succeed();
        assert_eq!(state.status, SlotStatus::Succeeded);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_buffers_release_is_idempotent() {
        let mut buffers = ScriptBuffers {
            scanned: BufferHandle::new(ScannedScript::default()),
            parsed: BufferHandle::new(ParsedScript::default()),
            analyzed: BufferHandle::new(AnalyzedScript::default()),
        };
        assert!(buffers.has_analysis());
        buffers.release();
        buffers.release();
        assert!(!buffers.has_analysis());
        assert!(buffers.scanned.is_null());
        assert!(buffers.parsed.is_null());
    }

    #[test]
    fn test_slot_map_lookup() {
        let mut slots = SlotMap::new();
        assert_eq!(slots.get(ScriptKey::Query).key, ScriptKey::Query);
        assert_eq!(slots.get(ScriptKey::Schema).key, ScriptKey::Schema);

        slots.get_mut(ScriptKey::Schema).version = 3;
        assert_eq!(slots.get(ScriptKey::Schema).version, 3);
        assert_eq!(slots.get(ScriptKey::Query).version, 0);
    }
}
