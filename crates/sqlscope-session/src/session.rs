//! The editing session and its re-analysis pipeline
//!
//! A session owns the engine box, the shared catalog, the two script slots
//! and the derived view state. All engine calls are synchronous and processed
//! one event at a time: an edit is handled to completion, including release
//! of replaced buffers and the dependent schema-to-query refresh, before the
//! next event is looked at.

use sqlscope_core::{
    AnalysisEngine, BufferHandle, CatalogId, GraphConfig, GraphConnectionId, GraphLayout,
    Result, ScriptKey, SqlscopeError, TextChange,
};
use sqlscope_graph::{AnalyzedViews, GraphViewModel, build_graph_view_model};

use crate::events::SessionObserver;
use crate::focus::{
    FocusInfo, GraphNodeDescriptor, derive_focus_from_completion, derive_focus_from_cursor,
    derive_focus_from_graph_edge, derive_focus_from_graph_node,
};
use crate::slot::{ScriptBuffers, ScriptSlot, SlotMap};

/// Rank of the schema script in the shared catalog. High enough to outrank
/// any externally loaded schema metadata.
pub const SCHEMA_SCRIPT_CATALOG_RANK: u32 = 1_000_000_000;

/// One editing session: two script slots, a shared catalog and the derived
/// graph and focus state
pub struct Session {
    pub(crate) engine: Box<dyn AnalysisEngine>,
    pub(crate) catalog: CatalogId,
    pub(crate) slots: SlotMap,
    pub(crate) graph_config: GraphConfig,
    pub(crate) graph_layout: BufferHandle<GraphLayout>,
    pub(crate) view_model: GraphViewModel,
    pub(crate) focus: FocusInfo,
    pub(crate) observer: Option<Box<dyn SessionObserver>>,
    /// Slot whose peeked completion candidate currently owns the focus;
    /// such a focus survives analysis updates while that completion
    /// session stays open
    pub(crate) completion_focus: Option<ScriptKey>,
    torn_down: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("catalog", &self.catalog)
            .field("slots", &self.slots)
            .field("view_model", &self.view_model)
            .field("focus", &self.focus)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Initialize a session: allocate the shared catalog and one script
    /// handle per slot. Engine failures here are fatal, there is no session
    /// to fall back to.
    pub fn new(mut engine: Box<dyn AnalysisEngine>) -> Result<Self> {
        let catalog = engine.create_catalog()?;
        let mut slots = SlotMap::new();
        for key in ScriptKey::ALL {
            let script = engine.create_script(catalog, key)?;
            slots.get_mut(key).script = Some(script);
        }
        let graph_config = GraphConfig::default();
        engine.graph_configure(&graph_config);
        tracing::debug!(?catalog, "session initialized");

        Ok(Self {
            engine,
            catalog,
            slots,
            graph_config,
            graph_layout: BufferHandle::null(),
            view_model: GraphViewModel::default(),
            focus: FocusInfo::default(),
            observer: None,
            completion_focus: None,
            torn_down: false,
        })
    }

    pub fn set_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    /// The slot for `key`
    pub fn slot(&self, key: ScriptKey) -> &ScriptSlot {
        self.slots.get(key)
    }

    /// The current graph view model
    pub fn view_model(&self) -> &GraphViewModel {
        &self.view_model
    }

    /// The current highlight set
    pub fn focus(&self) -> &FocusInfo {
        &self.focus
    }

    pub fn graph_config(&self) -> &GraphConfig {
        &self.graph_config
    }

    /// Reconfigure the graph board and rebuild the view model from the
    /// existing layout. No engine analysis is re-run.
    pub fn set_graph_config(&mut self, config: GraphConfig) {
        self.engine.graph_configure(&config);
        self.graph_config = config;
        self.view_model = build_graph_view_model(
            self.graph_layout.get(),
            self.analyzed_views(),
            &self.graph_config,
        );
    }

    /// Replace the slot's text wholesale, typically from an external source.
    ///
    /// The slot gets a freshly created script handle, the full
    /// scan/parse/analyze pipeline runs, previous buffers are released and
    /// the version is bumped. On failure the slot keeps its cursor but is
    /// left with null buffers and a `Failed` loading state; the error is
    /// also returned for callers that want it. The session stays usable
    /// either way.
    pub fn load_text(&mut self, key: ScriptKey, text: &str) -> Result<()> {
        self.slots.get_mut(key).loading.start();
        self.stop_completion(key);
        tracing::debug!(?key, bytes = text.len(), "loading script text");

        let result = self.load_text_inner(key, text);
        self.finish_analysis(key, result)
    }

    fn load_text_inner(&mut self, key: ScriptKey, text: &str) -> Result<()> {
        if let Some(old) = self.slots.get_mut(key).script.take() {
            self.engine.destroy_script(old);
        }
        let script = self.engine.create_script(self.catalog, key)?;
        let slot = self.slots.get_mut(key);
        slot.script = Some(script);
        slot.cursor = None;
        self.engine.insert_text_at(script, 0, text)?;
        self.run_pipeline(key)
    }

    /// Apply a set of text changes to the slot's existing script handle and
    /// re-run the full analysis pipeline. No new handle is created.
    pub fn edit_text(&mut self, key: ScriptKey, changes: &[TextChange]) -> Result<()> {
        let script = self
            .slots
            .get(key)
            .script
            .ok_or(SqlscopeError::NullHandle("script handle"))?;
        self.slots.get_mut(key).loading.start();

        let result = (|| -> Result<()> {
            for change in changes {
                match change {
                    TextChange::Erase { offset, length } => {
                        self.engine.erase_text_range(script, *offset, *length)?;
                    }
                    TextChange::Insert { offset, text } => {
                        self.engine.insert_text_at(script, *offset, text)?;
                    }
                }
            }
            self.run_pipeline(key)
        })();
        self.finish_analysis(key, result)
    }

    /// Ask the engine for a cursor description at `offset` without
    /// re-analyzing, then refresh completion and focus from it
    pub fn move_cursor(&mut self, key: ScriptKey, offset: usize) -> Result<()> {
        let script = self
            .slots
            .get(key)
            .script
            .ok_or(SqlscopeError::NullHandle("script handle"))?;
        let mut buffer = self.engine.move_cursor(script, offset)?;
        let cursor = buffer.read()?.clone();
        buffer.release();

        self.slots.get_mut(key).cursor = Some(cursor);
        self.update_completion(key);
        self.refresh_focus(key);
        if let Some(observer) = self.observer.as_mut() {
            if let Some(cursor) = &self.slots.get(key).cursor {
                observer.on_cursor_update(key, cursor);
            }
        }
        Ok(())
    }

    /// Select a graph node (or one of its ports). Selecting `None` clears
    /// the focus and both slots' cursors: selection and cursor are mutually
    /// exclusive highlight sources.
    pub fn select_graph_node(&mut self, target: Option<GraphNodeDescriptor>) {
        match target {
            None => self.clear_selection(),
            Some(target) => {
                self.focus = derive_focus_from_graph_node(&self.slots, &self.view_model, &target);
            }
        }
    }

    /// Select a graph edge by connection id, in either direction
    pub fn select_graph_edge(&mut self, conn: Option<GraphConnectionId>) {
        match conn {
            None => self.clear_selection(),
            Some(conn) => {
                self.focus = derive_focus_from_graph_edge(&self.slots, &self.view_model, conn);
            }
        }
    }

    fn clear_selection(&mut self) {
        self.focus = FocusInfo::default();
        for key in ScriptKey::ALL {
            self.slots.get_mut(key).cursor = None;
        }
    }

    /// Release every outstanding handle. Idempotent; also invoked on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        for key in ScriptKey::ALL {
            let script = {
                let slot = self.slots.get_mut(key);
                if let Some(completion) = slot.completion.as_mut() {
                    completion.buffer.release();
                }
                slot.completion = None;
                slot.buffers.release();
                slot.cursor = None;
                slot.script.take()
            };
            if let Some(script) = script {
                self.engine.destroy_script(script);
            }
        }
        self.graph_layout.release();
        self.engine.destroy_catalog(self.catalog);
        self.view_model = GraphViewModel::default();
        self.focus = FocusInfo::default();
        self.completion_focus = None;
        tracing::debug!("session torn down");
    }

    /// Run scan, parse and analyze for the slot, then swap the buffer triple
    /// and bump the version. The previous buffers are released only after
    /// the whole pipeline succeeded.
    fn run_pipeline(&mut self, key: ScriptKey) -> Result<()> {
        let script = self
            .slots
            .get(key)
            .script
            .ok_or(SqlscopeError::NullHandle("script handle"))?;
        let scanned = self.engine.scan(script)?;
        let parsed = self.engine.parse(script)?;
        let analyzed = self.engine.analyze(script)?;

        let slot = self.slots.get_mut(key);
        slot.buffers.release();
        slot.buffers = ScriptBuffers {
            scanned,
            parsed,
            analyzed,
        };
        slot.version += 1;
        Ok(())
    }

    /// Record the outcome of an analysis run on the slot and, on success,
    /// propagate it through the rest of the session
    fn finish_analysis(&mut self, key: ScriptKey, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.slots.get_mut(key).loading.succeed();
                self.after_analysis_success(key)
            }
            Err(error) => {
                let slot = self.slots.get_mut(key);
                slot.buffers.release();
                slot.loading.fail(error.to_string());
                tracing::warn!(?key, %error, "script analysis failed");
                // Stale decorations would lie about the failed text; rebuild
                // the view model and focus from whatever analysis is left
                self.rebuild_graph_view();
                self.refresh_focus(key);
                Err(error)
            }
        }
    }

    /// After a successful analysis of `key`: register schema changes with the
    /// catalog, refresh the dependent query analysis, rebuild the graph and
    /// re-derive focus
    fn after_analysis_success(&mut self, key: ScriptKey) -> Result<()> {
        self.notify_script_update(key);

        if key == ScriptKey::Schema {
            let schema_script = self
                .slots
                .get(ScriptKey::Schema)
                .script
                .ok_or(SqlscopeError::NullHandle("schema script handle"))?;
            self.engine
                .catalog_load_script(self.catalog, schema_script, SCHEMA_SCRIPT_CATALOG_RANK)?;
            tracing::debug!("schema script registered with catalog");
            self.refresh_dependent_query();
        }

        self.rebuild_graph()?;
        self.refresh_focus(key);
        Ok(())
    }

    /// Re-run only the analyze step for the query slot against the updated
    /// catalog, reusing its scanned and parsed buffers. Scanning and parsing
    /// cost is paid once per keystroke in the edited slot only.
    fn refresh_dependent_query(&mut self) {
        let query = self.slots.get(ScriptKey::Query);
        let (Some(script), false) = (query.script, query.buffers.parsed.is_null()) else {
            return;
        };
        match self.engine.analyze(script) {
            Ok(analyzed) => {
                let slot = self.slots.get_mut(ScriptKey::Query);
                slot.buffers.analyzed.replace(analyzed);
                slot.version += 1;
                tracing::debug!("query script re-analyzed against updated schema");
                self.notify_script_update(ScriptKey::Query);
            }
            Err(error) => {
                let slot = self.slots.get_mut(ScriptKey::Query);
                slot.buffers.release();
                slot.loading.fail(error.to_string());
                tracing::warn!(%error, "dependent query re-analysis failed");
            }
        }
    }

    /// Request a fresh layout for the query analysis and rebuild the view
    /// model. With no query analysis the view model is empty, never an error.
    fn rebuild_graph(&mut self) -> Result<()> {
        self.graph_layout.release();
        let query = self.slots.get(ScriptKey::Query);
        if let (Some(script), true) = (query.script, query.buffers.has_analysis()) {
            self.graph_layout = self.engine.graph_load_script(script)?;
        }
        self.rebuild_graph_view();
        Ok(())
    }

    fn rebuild_graph_view(&mut self) {
        self.view_model = build_graph_view_model(
            self.graph_layout.get(),
            self.analyzed_views(),
            &self.graph_config,
        );
    }

    fn analyzed_views(&self) -> AnalyzedViews<'_> {
        AnalyzedViews {
            query: self.slots.get(ScriptKey::Query).buffers.analyzed.get(),
            schema: self.slots.get(ScriptKey::Schema).buffers.analyzed.get(),
        }
    }

    /// Recompute the focus for the slot whose state changed. A focus derived
    /// from a peeked completion candidate is kept while the completion stays
    /// open; otherwise the slot's cursor decides.
    pub(crate) fn refresh_focus(&mut self, key: ScriptKey) {
        if let Some(owner) = self.completion_focus {
            if let Some((completion, selected)) = self.slots.get(owner).completion() {
                self.focus = derive_focus_from_completion(completion, selected);
                return;
            }
            self.completion_focus = None;
        }
        let slot = self.slots.get(key);
        let focus = if let Some(cursor) = &slot.cursor {
            derive_focus_from_cursor(key, &self.slots, &self.view_model, cursor)
        } else {
            FocusInfo::default()
        };
        self.focus = focus;
    }

    pub(crate) fn notify_script_update(&mut self, key: ScriptKey) {
        if let Some(observer) = self.observer.as_mut() {
            let slot = self.slots.get(key);
            observer.on_script_update(key, &slot.buffers, slot.cursor.as_ref());
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
