//! Focus derivation
//!
//! Maps a cursor position or an explicit graph selection to the set of
//! semantically related objects to highlight. Focus is recomputed wholesale
//! whenever the cursor or the selected graph element changes; it is never
//! patched incrementally.

use std::collections::BTreeSet;

use serde::Serialize;
use sqlscope_core::{Completion, GraphConnectionId, QualifiedObjectId, ScriptCursor, ScriptKey};
use sqlscope_graph::{GraphViewModel, NodePort};

use crate::slot::SlotMap;

/// The derived highlight set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FocusInfo {
    /// Focused graph connections, both directions of each pair
    pub graph_connections: BTreeSet<GraphConnectionId>,
    /// Focused tables, the join key across both slots
    pub table_ids: BTreeSet<QualifiedObjectId>,
    /// Focused table references
    pub table_refs: BTreeSet<QualifiedObjectId>,
    /// Focused column references
    pub column_refs: BTreeSet<QualifiedObjectId>,
}

impl FocusInfo {
    pub fn is_empty(&self) -> bool {
        self.graph_connections.is_empty()
            && self.table_ids.is_empty()
            && self.table_refs.is_empty()
            && self.column_refs.is_empty()
    }
}

/// A graph node selection, optionally narrowed to one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNodeDescriptor {
    pub node_id: u32,
    pub port: Option<NodePort>,
}

/// Collect everything related to `target` across both slots: the table id
/// itself, every table reference and every column reference resolving to it.
/// References stay qualified by their owning slot; only the table id joins
/// across slots.
fn collect_table_focus(focus: &mut FocusInfo, slots: &SlotMap, target: QualifiedObjectId) {
    focus.table_ids.insert(target);
    for key in ScriptKey::ALL {
        let Some(analyzed) = slots.get(key).buffers.analyzed.get() else {
            continue;
        };
        for index in analyzed.table_refs_of(target) {
            focus.table_refs.insert(QualifiedObjectId::new(key, index));
        }
        for index in analyzed.column_refs_of(target) {
            focus.column_refs.insert(QualifiedObjectId::new(key, index));
        }
    }
}

/// Derive focus from a script cursor. The first matching context wins:
/// query edge, table reference, column reference, table declaration.
pub fn derive_focus_from_cursor(
    key: ScriptKey,
    slots: &SlotMap,
    view_model: &GraphViewModel,
    cursor: &ScriptCursor,
) -> FocusInfo {
    let mut focus = FocusInfo::default();
    let Some(analyzed) = slots.get(key).buffers.analyzed.get() else {
        return focus;
    };

    // A query edge under the cursor highlights its graph connections
    if let Some(edge_index) = cursor.query_edge {
        let Some(edge) = analyzed.query_edges.get(edge_index as usize) else {
            return focus;
        };
        for &left in &edge.left {
            let Some(left_table) = analyzed
                .column_refs
                .get(left as usize)
                .and_then(|c| c.resolved_table)
            else {
                continue;
            };
            let Some(left_node) = view_model.node_by_table(left_table) else {
                continue;
            };
            for &right in &edge.right {
                let Some(right_table) = analyzed
                    .column_refs
                    .get(right as usize)
                    .and_then(|c| c.resolved_table)
                else {
                    continue;
                };
                // A table not visible in the view model is not an error,
                // it is just not focusable yet
                let Some(right_node) = view_model.node_by_table(right_table) else {
                    continue;
                };
                let conn = GraphConnectionId::new(left_node.node_id, right_node.node_id);
                focus.graph_connections.insert(conn);
                focus.graph_connections.insert(conn.flipped());
            }
        }
        return focus;
    }

    // A table reference highlights everything resolving to its table
    if let Some(ref_index) = cursor.table_ref {
        focus
            .table_refs
            .insert(QualifiedObjectId::new(key, ref_index));
        if let Some(target) = analyzed
            .table_refs
            .get(ref_index as usize)
            .and_then(|r| r.resolved_table)
        {
            collect_table_focus(&mut focus, slots, target);
        }
        return focus;
    }

    // A column reference, symmetrically
    if let Some(col_index) = cursor.column_ref {
        focus
            .column_refs
            .insert(QualifiedObjectId::new(key, col_index));
        if let Some(target) = analyzed
            .column_refs
            .get(col_index as usize)
            .and_then(|c| c.resolved_table)
        {
            collect_table_focus(&mut focus, slots, target);
        }
        return focus;
    }

    // A table declaration under the cursor
    if let Some(table_index) = cursor.table_id {
        collect_table_focus(&mut focus, slots, QualifiedObjectId::new(key, table_index));
        return focus;
    }

    focus
}

/// Derive focus from a clicked graph node, or one of its ports
pub fn derive_focus_from_graph_node(
    slots: &SlotMap,
    view_model: &GraphViewModel,
    target: &GraphNodeDescriptor,
) -> FocusInfo {
    let mut focus = FocusInfo::default();
    let Some(node) = view_model
        .nodes
        .iter()
        .find(|n| n.node_id == target.node_id)
    else {
        return focus;
    };
    collect_table_focus(&mut focus, slots, node.table_id);

    for (conn, edge) in &view_model.edges {
        let incident = match target.port {
            None => edge.from_node == target.node_id || edge.to_node == target.node_id,
            Some(port) => {
                (edge.from_node == target.node_id && edge.from_port == port)
                    || (edge.to_node == target.node_id && edge.to_port == port)
            }
        };
        if incident {
            focus.graph_connections.insert(*conn);
            focus.graph_connections.insert(conn.flipped());
        }
    }
    focus
}

/// Derive focus from a clicked graph edge
pub fn derive_focus_from_graph_edge(
    slots: &SlotMap,
    view_model: &GraphViewModel,
    conn: GraphConnectionId,
) -> FocusInfo {
    let mut focus = FocusInfo::default();
    let Some(edge) = view_model.connection(conn) else {
        return focus;
    };
    focus.graph_connections.insert(edge.connection_id);
    focus.graph_connections.insert(edge.connection_id.flipped());
    focus.column_refs = edge.column_refs.clone();
    for column_ref in &edge.column_refs {
        let Some(analyzed) = slots.get(column_ref.script).buffers.analyzed.get() else {
            continue;
        };
        if let Some(table) = analyzed
            .column_refs
            .get(column_ref.index as usize)
            .and_then(|c| c.resolved_table)
        {
            focus.table_ids.insert(table);
        }
    }
    focus
}

/// Derive focus from the selected completion candidate
pub fn derive_focus_from_completion(completion: &Completion, selected: usize) -> FocusInfo {
    let mut focus = FocusInfo::default();
    if let Some(table) = completion
        .candidates
        .get(selected)
        .and_then(|candidate| candidate.table)
    {
        focus.table_ids.insert(table);
    }
    focus
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;
    use sqlscope_core::{
        AnalyzedScript, AnalyzedTable, BufferHandle, ColumnRef, GraphConfig, GraphLayout,
        LayoutEdge, LayoutEdgeEndpoint, LayoutNode, QueryEdge, TableColumn, TableRef, TextRange,
    };
    use sqlscope_graph::{AnalyzedViews, build_graph_view_model};

    fn schema_table(index: u32) -> QualifiedObjectId {
        QualifiedObjectId::new(ScriptKey::Schema, index)
    }

    /// Schema declaring a(x) and b(y); query joining them on a.x = b.y
    fn joined_slots() -> SlotMap {
        let schema = AnalyzedScript {
            tables: vec![
                AnalyzedTable {
                    name: "a".into(),
                    columns: vec![TableColumn { name: "x".into() }],
                    declared_at: Some(TextRange::new(13, 1)),
                },
                AnalyzedTable {
                    name: "b".into(),
                    columns: vec![TableColumn { name: "y".into() }],
                    declared_at: Some(TextRange::new(36, 1)),
                },
            ],
            ..Default::default()
        };
        let query = AnalyzedScript {
            table_refs: vec![
                TableRef {
                    range: TextRange::new(14, 1),
                    name: "a".into(),
                    alias: None,
                    resolved_table: Some(schema_table(0)),
                },
                TableRef {
                    range: TextRange::new(17, 1),
                    name: "b".into(),
                    alias: None,
                    resolved_table: Some(schema_table(1)),
                },
            ],
            column_refs: vec![
                ColumnRef {
                    range: TextRange::new(25, 3),
                    column: "x".into(),
                    resolved_table: Some(schema_table(0)),
                    column_index: Some(0),
                },
                ColumnRef {
                    range: TextRange::new(31, 3),
                    column: "y".into(),
                    resolved_table: Some(schema_table(1)),
                    column_index: Some(0),
                },
            ],
            query_edges: vec![QueryEdge {
                left: smallvec![0],
                right: smallvec![1],
                at: TextRange::new(29, 1),
            }],
            ..Default::default()
        };

        let mut slots = SlotMap::new();
        slots.get_mut(ScriptKey::Query).buffers.analyzed = BufferHandle::new(query);
        slots.get_mut(ScriptKey::Schema).buffers.analyzed = BufferHandle::new(schema);
        slots
    }

    fn joined_view_model(slots: &SlotMap) -> GraphViewModel {
        let layout = GraphLayout {
            nodes: vec![
                LayoutNode {
                    table_id: Some(schema_table(0)),
                    x: 0.0,
                    y: 0.0,
                    width: 120.0,
                    height: 72.0,
                    is_referenced: true,
                },
                LayoutNode {
                    table_id: Some(schema_table(1)),
                    x: 360.0,
                    y: 0.0,
                    width: 120.0,
                    height: 72.0,
                    is_referenced: true,
                },
            ],
            edges: vec![LayoutEdge {
                query_edge: QualifiedObjectId::new(ScriptKey::Query, 0),
                left: smallvec![LayoutEdgeEndpoint {
                    table_id: Some(schema_table(0)),
                    column_ref: QualifiedObjectId::new(ScriptKey::Query, 0),
                }],
                right: smallvec![LayoutEdgeEndpoint {
                    table_id: Some(schema_table(1)),
                    column_ref: QualifiedObjectId::new(ScriptKey::Query, 1),
                }],
            }],
        };
        let views = AnalyzedViews {
            query: slots.get(ScriptKey::Query).buffers.analyzed.get(),
            schema: slots.get(ScriptKey::Schema).buffers.analyzed.get(),
        };
        build_graph_view_model(Some(&layout), views, &GraphConfig::default())
    }

    #[test]
    fn test_query_edge_focus_contains_both_directions() {
        let slots = joined_slots();
        let view_model = joined_view_model(&slots);
        let cursor = ScriptCursor {
            text_offset: 29,
            query_edge: Some(0),
            ..Default::default()
        };

        let focus = derive_focus_from_cursor(ScriptKey::Query, &slots, &view_model, &cursor);
        let conn = GraphConnectionId::new(0, 1);
        assert_eq!(
            focus.graph_connections,
            BTreeSet::from([conn, conn.flipped()])
        );
        assert!(focus.table_ids.is_empty());
        assert!(focus.table_refs.is_empty());
        assert!(focus.column_refs.is_empty());
    }

    #[test]
    fn test_table_ref_focus_scans_both_slots() {
        let slots = joined_slots();
        let view_model = joined_view_model(&slots);
        let cursor = ScriptCursor {
            text_offset: 14,
            table_ref: Some(0),
            ..Default::default()
        };

        let focus = derive_focus_from_cursor(ScriptKey::Query, &slots, &view_model, &cursor);
        assert_eq!(focus.table_ids, BTreeSet::from([schema_table(0)]));
        assert_eq!(
            focus.table_refs,
            BTreeSet::from([QualifiedObjectId::new(ScriptKey::Query, 0)])
        );
        assert_eq!(
            focus.column_refs,
            BTreeSet::from([QualifiedObjectId::new(ScriptKey::Query, 0)])
        );
        assert!(focus.graph_connections.is_empty());
    }

    #[test]
    fn test_column_ref_focus_is_symmetric_to_table_ref() {
        let slots = joined_slots();
        let view_model = joined_view_model(&slots);
        let cursor = ScriptCursor {
            text_offset: 31,
            column_ref: Some(1),
            ..Default::default()
        };

        let focus = derive_focus_from_cursor(ScriptKey::Query, &slots, &view_model, &cursor);
        assert_eq!(focus.table_ids, BTreeSet::from([schema_table(1)]));
        assert_eq!(
            focus.table_refs,
            BTreeSet::from([QualifiedObjectId::new(ScriptKey::Query, 1)])
        );
        assert_eq!(
            focus.column_refs,
            BTreeSet::from([QualifiedObjectId::new(ScriptKey::Query, 1)])
        );
    }

    #[test]
    fn test_unresolved_reference_focuses_only_itself() {
        let mut slots = joined_slots();
        let mut analyzed = slots
            .get(ScriptKey::Query)
            .buffers
            .analyzed
            .get()
            .unwrap()
            .clone();
        analyzed.table_refs[0].resolved_table = None;
        slots.get_mut(ScriptKey::Query).buffers.analyzed = BufferHandle::new(analyzed);
        let view_model = joined_view_model(&slots);
        let cursor = ScriptCursor {
            text_offset: 14,
            table_ref: Some(0),
            ..Default::default()
        };

        let focus = derive_focus_from_cursor(ScriptKey::Query, &slots, &view_model, &cursor);
        assert_eq!(
            focus.table_refs,
            BTreeSet::from([QualifiedObjectId::new(ScriptKey::Query, 0)])
        );
        assert!(focus.table_ids.is_empty());
        assert!(focus.column_refs.is_empty());
    }

    #[test]
    fn test_table_declaration_focus() {
        let slots = joined_slots();
        let view_model = joined_view_model(&slots);
        let cursor = ScriptCursor {
            text_offset: 13,
            table_id: Some(0),
            ..Default::default()
        };

        let focus = derive_focus_from_cursor(ScriptKey::Schema, &slots, &view_model, &cursor);
        assert_eq!(focus.table_ids, BTreeSet::from([schema_table(0)]));
        assert_eq!(
            focus.table_refs,
            BTreeSet::from([QualifiedObjectId::new(ScriptKey::Query, 0)])
        );
        assert_eq!(
            focus.column_refs,
            BTreeSet::from([QualifiedObjectId::new(ScriptKey::Query, 0)])
        );
    }

    #[test]
    fn test_empty_cursor_yields_empty_focus() {
        let slots = joined_slots();
        let view_model = joined_view_model(&slots);
        let cursor = ScriptCursor::default();

        let focus = derive_focus_from_cursor(ScriptKey::Query, &slots, &view_model, &cursor);
        assert!(focus.is_empty());
    }

    #[test]
    fn test_null_analysis_yields_empty_focus() {
        let mut slots = joined_slots();
        slots.get_mut(ScriptKey::Query).buffers.release();
        let view_model = GraphViewModel::default();
        let cursor = ScriptCursor {
            query_edge: Some(0),
            ..Default::default()
        };

        let focus = derive_focus_from_cursor(ScriptKey::Query, &slots, &view_model, &cursor);
        assert!(focus.is_empty());
    }

    #[test]
    fn test_graph_node_selection_collects_incident_edges() {
        let slots = joined_slots();
        let view_model = joined_view_model(&slots);

        let focus = derive_focus_from_graph_node(
            &slots,
            &view_model,
            &GraphNodeDescriptor {
                node_id: 0,
                port: None,
            },
        );
        assert_eq!(focus.table_ids, BTreeSet::from([schema_table(0)]));
        assert_eq!(focus.graph_connections.len(), 2);

        // A port with no incident edge focuses the node alone
        let focus = derive_focus_from_graph_node(
            &slots,
            &view_model,
            &GraphNodeDescriptor {
                node_id: 0,
                port: Some(NodePort::NORTH),
            },
        );
        assert!(focus.graph_connections.is_empty());
        assert_eq!(focus.table_ids, BTreeSet::from([schema_table(0)]));
    }

    #[test]
    fn test_graph_edge_selection_resolves_column_refs() {
        let slots = joined_slots();
        let view_model = joined_view_model(&slots);
        let conn = GraphConnectionId::new(0, 1);

        // Either direction addresses the recorded edge
        for conn in [conn, conn.flipped()] {
            let focus = derive_focus_from_graph_edge(&slots, &view_model, conn);
            assert_eq!(focus.graph_connections.len(), 2);
            assert_eq!(
                focus.column_refs,
                BTreeSet::from([
                    QualifiedObjectId::new(ScriptKey::Query, 0),
                    QualifiedObjectId::new(ScriptKey::Query, 1),
                ])
            );
            assert_eq!(
                focus.table_ids,
                BTreeSet::from([schema_table(0), schema_table(1)])
            );
        }
    }
}
