//! End-to-end session scenarios, driven by the testkit engine

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use sqlscope_core::{
    Completion, GraphConfig, GraphConnectionId, QualifiedObjectId, ScriptCursor, ScriptKey,
    SqlscopeError, TextChange,
};
use sqlscope_session::{GraphNodeDescriptor, ScriptBuffers, Session, SessionObserver, SlotStatus};
use sqlscope_testkit::LocalEngine;

fn session() -> Session {
    Session::new(Box::new(LocalEngine::new())).expect("session init")
}

fn offset_of(text: &str, needle: &str) -> usize {
    text.find(needle).expect("needle in text")
}

fn schema_table(index: u32) -> QualifiedObjectId {
    QualifiedObjectId::new(ScriptKey::Schema, index)
}

fn query_ref(index: u32) -> QualifiedObjectId {
    QualifiedObjectId::new(ScriptKey::Query, index)
}

/// Schema with a(x) and b(y), query joining them
fn joined_session() -> Session {
    let mut session = session();
    session
        .load_text(
            ScriptKey::Schema,
            "create table a(x int); create table b(y int);",
        )
        .unwrap();
    session
        .load_text(ScriptKey::Query, "select * from a, b where a.x = b.y;")
        .unwrap();
    session
}

#[test]
fn test_single_table_end_to_end() {
    let mut session = session();
    session
        .load_text(ScriptKey::Schema, "create table foo(a int);")
        .unwrap();
    let query_text = "select * from foo;";
    session.load_text(ScriptKey::Query, query_text).unwrap();

    let analyzed = session
        .slot(ScriptKey::Query)
        .buffers
        .analyzed
        .get()
        .expect("query analyzed");
    assert_eq!(analyzed.table_refs.len(), 1);
    assert_eq!(analyzed.table_refs[0].resolved_table, Some(schema_table(0)));

    let view_model = session.view_model();
    assert_eq!(view_model.nodes.len(), 1);
    assert_eq!(view_model.nodes[0].name, "foo");
    assert_eq!(view_model.nodes[0].columns, vec!["a".to_string()]);
    assert!(view_model.edges.is_empty());

    // Cursor on the table reference highlights the table and the one reference
    session
        .move_cursor(ScriptKey::Query, offset_of(query_text, "foo") + 1)
        .unwrap();
    let focus = session.focus();
    assert_eq!(focus.table_ids, BTreeSet::from([schema_table(0)]));
    assert_eq!(focus.table_refs, BTreeSet::from([query_ref(0)]));
    assert!(focus.column_refs.is_empty());
    assert!(focus.graph_connections.is_empty());
}

#[test]
fn test_join_produces_one_merged_edge() {
    let session = joined_session();

    let view_model = session.view_model();
    assert_eq!(view_model.nodes.len(), 2);
    assert_eq!(view_model.edges.len(), 1);

    let edge = view_model.edges.values().next().unwrap();
    assert_eq!(edge.query_edges, BTreeSet::from([query_ref(0)]));
    assert_eq!(
        edge.column_refs,
        BTreeSet::from([query_ref(0), query_ref(1)])
    );
}

#[test]
fn test_query_edge_focus_is_symmetric() {
    let mut session = joined_session();
    let query_text = "select * from a, b where a.x = b.y;";

    session
        .move_cursor(ScriptKey::Query, offset_of(query_text, "="))
        .unwrap();
    let conn = GraphConnectionId::new(0, 1);
    assert_eq!(
        session.focus().graph_connections,
        BTreeSet::from([conn, conn.flipped()])
    );
    assert!(session.focus().table_ids.is_empty());
}

#[test]
fn test_schema_edit_reanalyzes_dependent_query() {
    let mut session = session();
    session
        .load_text(ScriptKey::Query, "select * from t1;")
        .unwrap();

    // Nothing to resolve against yet
    let analyzed = session
        .slot(ScriptKey::Query)
        .buffers
        .analyzed
        .get()
        .unwrap();
    assert_eq!(analyzed.table_refs[0].resolved_table, None);
    assert!(session.view_model().is_empty());
    let version_before = session.slot(ScriptKey::Query).version;

    // Loading the schema re-analyzes the query without a query-side edit
    session
        .load_text(ScriptKey::Schema, "create table t1(a int);")
        .unwrap();
    let query = session.slot(ScriptKey::Query);
    assert_eq!(query.version, version_before + 1);
    assert_eq!(
        query.buffers.analyzed.get().unwrap().table_refs[0].resolved_table,
        Some(schema_table(0))
    );
    assert_eq!(session.view_model().nodes.len(), 1);
    assert_eq!(session.view_model().nodes[0].name, "t1");
}

#[test]
fn test_version_bumps_only_on_success() {
    let mut session = session();
    session
        .load_text(ScriptKey::Query, "select 1;")
        .unwrap();
    assert_eq!(session.slot(ScriptKey::Query).version, 1);

    session
        .edit_text(
            ScriptKey::Query,
            &[TextChange::Insert {
                offset: 8,
                text: ", 2".into(),
            }],
        )
        .unwrap();
    assert_eq!(session.slot(ScriptKey::Query).version, 2);
    assert_eq!(
        session.slot(ScriptKey::Query).loading.status,
        SlotStatus::Succeeded
    );

    // A malformed load fails, keeps the version and nulls the buffers
    let error = session
        .load_text(ScriptKey::Query, "select from where (")
        .unwrap_err();
    assert!(matches!(error, SqlscopeError::Engine(_)));
    let slot = session.slot(ScriptKey::Query);
    assert_eq!(slot.version, 2);
    assert_eq!(slot.loading.status, SlotStatus::Failed);
    assert!(slot.loading.error.as_deref().unwrap().contains("parse error"));
    assert!(slot.buffers.analyzed.is_null());
    assert!(slot.buffers.scanned.is_null());
    assert!(session.view_model().is_empty());

    // The next successful load recovers the slot
    session
        .load_text(ScriptKey::Query, "select 2;")
        .unwrap();
    let slot = session.slot(ScriptKey::Query);
    assert_eq!(slot.version, 3);
    assert_eq!(slot.loading.status, SlotStatus::Succeeded);
    assert!(slot.buffers.has_analysis());
}

#[test]
fn test_failed_edit_keeps_cursor() {
    let mut session = session();
    let schema_text = "create table foo(a int);";
    session.load_text(ScriptKey::Schema, schema_text).unwrap();
    session
        .move_cursor(ScriptKey::Schema, offset_of(schema_text, "foo"))
        .unwrap();
    assert!(session.slot(ScriptKey::Schema).cursor.is_some());

    // Erasing "create" leaves text sqlparser rejects
    session
        .edit_text(
            ScriptKey::Schema,
            &[TextChange::Erase {
                offset: 0,
                length: 6,
            }],
        )
        .unwrap_err();
    let slot = session.slot(ScriptKey::Schema);
    assert_eq!(slot.loading.status, SlotStatus::Failed);
    assert!(slot.buffers.analyzed.is_null());
    assert!(slot.cursor.is_some());
}

#[test]
fn test_graph_selection_and_clearing() {
    let mut session = joined_session();
    let query_text = "select * from a, b where a.x = b.y;";
    session
        .move_cursor(ScriptKey::Query, offset_of(query_text, "a.x"))
        .unwrap();

    session.select_graph_node(Some(GraphNodeDescriptor {
        node_id: 0,
        port: None,
    }));
    let focus = session.focus();
    assert_eq!(focus.table_ids, BTreeSet::from([schema_table(0)]));
    assert_eq!(focus.graph_connections.len(), 2);

    let conn = GraphConnectionId::new(0, 1);
    session.select_graph_edge(Some(conn.flipped()));
    assert_eq!(
        session.focus().column_refs,
        BTreeSet::from([query_ref(0), query_ref(1)])
    );

    // Clearing the selection clears focus and both cursors
    session.select_graph_node(None);
    assert!(session.focus().is_empty());
    assert!(session.slot(ScriptKey::Query).cursor.is_none());
    assert!(session.slot(ScriptKey::Schema).cursor.is_none());
}

#[derive(Default)]
struct Recorder {
    events: Rc<RefCell<Vec<String>>>,
}

impl SessionObserver for Recorder {
    fn on_script_update(
        &mut self,
        key: ScriptKey,
        _buffers: &ScriptBuffers,
        _cursor: Option<&ScriptCursor>,
    ) {
        self.events.borrow_mut().push(format!("update:{key:?}"));
    }

    fn on_cursor_update(&mut self, key: ScriptKey, _cursor: &ScriptCursor) {
        self.events.borrow_mut().push(format!("cursor:{key:?}"));
    }

    fn on_completion_start(&mut self, key: ScriptKey, completion: &Completion) {
        self.events
            .borrow_mut()
            .push(format!("start:{key:?}:{}", completion.candidates.len()));
    }

    fn on_completion_peek(&mut self, key: ScriptKey, _completion: &Completion, candidate: usize) {
        self.events
            .borrow_mut()
            .push(format!("peek:{key:?}:{candidate}"));
    }

    fn on_completion_stop(&mut self, key: ScriptKey) {
        self.events.borrow_mut().push(format!("stop:{key:?}"));
    }
}

#[test]
fn test_completion_session_flow() {
    let mut session = session();
    let events = Rc::new(RefCell::new(Vec::new()));
    session.set_observer(Box::new(Recorder {
        events: events.clone(),
    }));

    session
        .load_text(ScriptKey::Schema, "create table facts(id int);")
        .unwrap();
    let query_text = "select * from fa";
    session.load_text(ScriptKey::Query, query_text).unwrap();

    // Cursor at the end of the partial identifier opens a completion
    session
        .move_cursor(ScriptKey::Query, query_text.len())
        .unwrap();
    let (completion, selected) = session
        .slot(ScriptKey::Query)
        .completion()
        .expect("open completion");
    assert_eq!(selected, 0);
    assert_eq!(completion.candidates[0].text, "facts");

    // Peeking a candidate focuses its table
    session.peek_completion(ScriptKey::Query, 0).unwrap();
    assert_eq!(
        session.focus().table_ids,
        BTreeSet::from([schema_table(0)])
    );

    // Applying replaces the span and re-analyzes
    session.apply_completion(ScriptKey::Query).unwrap();
    assert!(session.slot(ScriptKey::Query).completion().is_none());
    let analyzed = session
        .slot(ScriptKey::Query)
        .buffers
        .analyzed
        .get()
        .unwrap();
    assert_eq!(analyzed.table_refs[0].name, "facts");
    assert_eq!(analyzed.table_refs[0].resolved_table, Some(schema_table(0)));
    assert_eq!(session.view_model().nodes[0].name, "facts");

    let events = events.borrow();
    assert!(events.iter().any(|e| e.starts_with("start:Query")));
    assert!(events.iter().any(|e| e == "peek:Query:0"));
    assert!(events.iter().any(|e| e == "stop:Query"));
    assert!(events.iter().filter(|e| *e == "update:Query").count() >= 2);
}

#[test]
fn test_one_completion_per_session() {
    let mut session = session();
    let schema_text = "create table facts(id int);";
    session.load_text(ScriptKey::Schema, schema_text).unwrap();
    session
        .load_text(ScriptKey::Query, "select * from fa")
        .unwrap();

    session.move_cursor(ScriptKey::Query, 16).unwrap();
    assert!(session.slot(ScriptKey::Query).completion().is_some());

    // Completing in the schema slot stops the query slot's session
    session
        .move_cursor(ScriptKey::Schema, offset_of(schema_text, "facts") + 2)
        .unwrap();
    assert!(session.slot(ScriptKey::Schema).completion().is_some());
    assert!(session.slot(ScriptKey::Query).completion().is_none());
}

#[test]
fn test_board_resize_rebuilds_view_model() {
    let mut session = joined_session();
    let versions = (
        session.slot(ScriptKey::Query).version,
        session.slot(ScriptKey::Schema).version,
    );

    session.set_graph_config(GraphConfig {
        board_width: 400.0,
        board_height: 300.0,
        cell_width: 30.0,
        cell_height: 12.0,
    });

    // The rebuild is a pure recomputation: no slot was re-analyzed
    assert_eq!(session.slot(ScriptKey::Query).version, versions.0);
    assert_eq!(session.slot(ScriptKey::Schema).version, versions.1);
    let view_model = session.view_model();
    assert_eq!(view_model.nodes.len(), 2);
    assert_eq!(view_model.edges.len(), 1);
    assert_eq!(session.graph_config().cell_width, 30.0);
}

#[test]
fn test_teardown_is_idempotent() {
    let mut session = joined_session();
    session.teardown();
    session.teardown();

    assert!(session.slot(ScriptKey::Query).buffers.analyzed.is_null());
    assert!(session.view_model().is_empty());
    assert!(session.focus().is_empty());
    assert!(session.load_text(ScriptKey::Query, "select 1;").is_err());
}
