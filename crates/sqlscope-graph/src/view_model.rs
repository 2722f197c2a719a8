//! Graph view model construction
//!
//! Rebuilds the renderable model wholesale from the engine's raw layout and
//! the two slots' analyzed buffers. The builder is a pure function of
//! (layout, analysis, config): it never mutates its inputs and may be called
//! repeatedly, e.g. after a board resize.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use sqlscope_core::{
    AnalyzedScript, GraphConfig, GraphConnectionId, GraphLayout, QualifiedObjectId, ScriptKey,
};

use crate::edges::{EdgeKind, EdgePathBuilder, NodePort, build_edge_path, select_edge_kind};

const EDGE_CORNER_RADIUS: f64 = 8.0;

/// The two slots' analyzed buffers, as far as they exist
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzedViews<'a> {
    pub query: Option<&'a AnalyzedScript>,
    pub schema: Option<&'a AnalyzedScript>,
}

impl<'a> AnalyzedViews<'a> {
    pub fn get(&self, key: ScriptKey) -> Option<&'a AnalyzedScript> {
        match key {
            ScriptKey::Query => self.query,
            ScriptKey::Schema => self.schema,
        }
    }
}

/// Bounding box summary over all emitted nodes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Boundaries {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub total_width: f64,
    pub total_height: f64,
}

/// One drawable table node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeViewModel {
    /// Index of the node in the engine layout
    pub node_id: u32,
    pub table_id: QualifiedObjectId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub columns: Vec<String>,
    /// Ports occupied by at least one edge
    pub ports: NodePort,
    /// Number of edge endpoints touching this node
    pub peer_count: u32,
    pub is_referenced: bool,
}

/// One drawable connection between two nodes. Multiple query edges between
/// the same node pair merge into a single edge view model.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeViewModel {
    pub connection_id: GraphConnectionId,
    /// The query edges the connection stands for
    pub query_edges: BTreeSet<QualifiedObjectId>,
    /// The column references on both sides of those query edges
    pub column_refs: BTreeSet<QualifiedObjectId>,
    pub from_node: u32,
    pub from_table: QualifiedObjectId,
    pub from_port: NodePort,
    pub to_node: u32,
    pub to_table: QualifiedObjectId,
    pub to_port: NodePort,
    pub kind: EdgeKind,
    pub path: String,
}

/// The UI-facing graph model, rebuilt wholesale on every layout change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphViewModel {
    pub nodes: Vec<NodeViewModel>,
    nodes_by_table: HashMap<QualifiedObjectId, usize>,
    pub edges: IndexMap<GraphConnectionId, EdgeViewModel>,
    pub boundaries: Boundaries,
}

impl GraphViewModel {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// The node showing `table`, if the table is visible in the graph
    pub fn node_by_table(&self, table: QualifiedObjectId) -> Option<&NodeViewModel> {
        self.nodes_by_table.get(&table).map(|i| &self.nodes[*i])
    }

    /// The edge recorded for a connection, in either direction
    pub fn connection(&self, conn: GraphConnectionId) -> Option<&EdgeViewModel> {
        self.edges
            .get(&conn)
            .or_else(|| self.edges.get(&conn.flipped()))
    }
}

/// Build the graph view model from the engine layout and the latest analyses.
///
/// Nodes whose table could not be resolved are skipped, as are edge endpoints
/// pointing at tables that are not visible in the node set. Self edges are
/// valid analysis results (self joins, correlated subqueries) but are never
/// drawn; they are dropped before any port or path computation.
pub fn build_graph_view_model(
    layout: Option<&GraphLayout>,
    analyzed: AnalyzedViews<'_>,
    config: &GraphConfig,
) -> GraphViewModel {
    let mut model = GraphViewModel::default();
    let (Some(layout), Some(_)) = (layout, analyzed.query) else {
        return model;
    };

    for (node_id, node) in layout.nodes.iter().enumerate() {
        // A null table id means the engine could not resolve a table
        let Some(table_id) = node.table_id else {
            continue;
        };
        let Some(owner) = analyzed.get(table_id.script) else {
            continue;
        };
        let Some(table) = owner.tables.get(table_id.index as usize) else {
            tracing::trace!(?table_id, "layout node points at unknown table");
            continue;
        };

        let view = NodeViewModel {
            node_id: node_id as u32,
            table_id,
            name: table.name.clone(),
            x: node.x,
            y: node.y,
            width: node.width,
            height: node.height,
            columns: table.columns.iter().map(|c| c.name.clone()).collect(),
            ports: NodePort::empty(),
            peer_count: 0,
            is_referenced: node.is_referenced,
        };
        model.boundaries.min_x = model.boundaries.min_x.min(view.x);
        model.boundaries.max_x = model.boundaries.max_x.max(view.x + view.width);
        model.boundaries.min_y = model.boundaries.min_y.min(view.y);
        model.boundaries.max_y = model.boundaries.max_y.max(view.y + view.height);
        model.nodes_by_table.insert(table_id, model.nodes.len());
        model.nodes.push(view);
    }

    let mut path_builder = EdgePathBuilder::new();
    for edge in &layout.edges {
        for left in &edge.left {
            let Some(left_table) = left.table_id else {
                continue;
            };
            let Some(&li) = model.nodes_by_table.get(&left_table) else {
                continue;
            };

            for right in &edge.right {
                let Some(right_table) = right.table_id else {
                    continue;
                };
                let Some(&ri) = model.nodes_by_table.get(&right_table) else {
                    continue;
                };
                model.nodes[li].peer_count += 1;
                model.nodes[ri].peer_count += 1;

                let from_node = model.nodes[li].node_id;
                let to_node = model.nodes[ri].node_id;
                if from_node == to_node {
                    continue;
                }

                let conn = GraphConnectionId::new(from_node, to_node);
                let flipped = conn.flipped();
                let key = if model.edges.contains_key(&flipped) {
                    flipped
                } else {
                    conn
                };
                if let Some(prev) = model.edges.get_mut(&key) {
                    prev.query_edges.insert(edge.query_edge);
                    prev.column_refs.insert(left.column_ref);
                    prev.column_refs.insert(right.column_ref);
                    continue;
                }

                let (from_x, from_y, width, height) = {
                    let n = &model.nodes[li];
                    (n.x + n.width / 2.0, n.y + n.height / 2.0, n.width, n.height)
                };
                let (to_x, to_y) = {
                    let n = &model.nodes[ri];
                    (n.x + n.width / 2.0, n.y + n.height / 2.0)
                };
                let kind = select_edge_kind(from_x, from_y, to_x, to_y, width, height);
                let from_port = kind.from_port();
                let to_port = kind.to_port();
                model.nodes[li].ports |= from_port;
                model.nodes[ri].ports |= to_port;
                let path = build_edge_path(
                    &mut path_builder,
                    kind,
                    from_x,
                    from_y,
                    to_x,
                    to_y,
                    width,
                    height,
                    config.cell_width,
                    config.cell_height,
                    EDGE_CORNER_RADIUS,
                );

                model.edges.insert(
                    conn,
                    EdgeViewModel {
                        connection_id: conn,
                        query_edges: BTreeSet::from([edge.query_edge]),
                        column_refs: BTreeSet::from([left.column_ref, right.column_ref]),
                        from_node,
                        from_table: left_table,
                        from_port,
                        to_node,
                        to_table: right_table,
                        to_port,
                        kind,
                        path,
                    },
                );
            }
        }
    }

    model.boundaries.total_width = model.boundaries.max_x - model.boundaries.min_x;
    model.boundaries.total_height = model.boundaries.max_y - model.boundaries.min_y;
    tracing::debug!(
        nodes = model.nodes.len(),
        edges = model.edges.len(),
        "rebuilt graph view model"
    );
    model
}
