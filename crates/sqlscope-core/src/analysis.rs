//! Structured views over engine result buffers
//!
//! The engine hands results back as opaque buffers; these are the typed views
//! a buffer exposes through `BufferHandle::read`. They are plain data: all
//! cross-references are indices into the sibling vectors, qualified with the
//! owning script slot where they may cross slots.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ids::QualifiedObjectId;

/// A byte range in the script text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub offset: usize,
    pub length: usize,
}

impl TextRange {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Whether `offset` lies within the range, end-inclusive.
    /// A cursor sitting directly behind the last character still addresses
    /// the range (the editor reports the caret between characters).
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset <= self.end()
    }
}

/// Token classes produced by the scan stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    StringLiteral,
    Operator,
    Punctuation,
    Comment,
}

/// A single scanned token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub range: TextRange,
    pub kind: TokenKind,
}

/// Result buffer of the scan stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannedScript {
    pub tokens: Vec<Token>,
}

impl ScannedScript {
    /// Index of the token containing `offset`, if any
    pub fn token_at(&self, offset: usize) -> Option<usize> {
        self.tokens.iter().position(|t| t.range.contains(offset))
    }
}

/// Statement classes surfaced by the parse stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    CreateTable,
    Insert,
    Update,
    Delete,
    Other,
}

/// Summary of one parsed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub kind: StatementKind,
    pub range: TextRange,
}

/// Result buffer of the parse stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedScript {
    pub statements: Vec<StatementSummary>,
}

/// A column of an analyzed table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
}

/// A table the analyzer discovered in the script (e.g. a CREATE TABLE)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedTable {
    pub name: String,
    pub columns: Vec<TableColumn>,
    /// Where the table name is declared, when the table is declared in
    /// this script rather than imported through the catalog
    pub declared_at: Option<TextRange>,
}

/// A table reference in a FROM/JOIN clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub range: TextRange,
    pub name: String,
    pub alias: Option<String>,
    /// The table this reference resolved to, if resolution succeeded
    pub resolved_table: Option<QualifiedObjectId>,
}

/// A column reference expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub range: TextRange,
    pub column: String,
    /// The owning table of the referenced column, if resolution succeeded
    pub resolved_table: Option<QualifiedObjectId>,
    /// Index of the column within the owning table
    pub column_index: Option<u32>,
}

/// An engine-identified relationship between column references,
/// e.g. a join predicate. Sides hold column-reference indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEdge {
    pub left: SmallVec<[u32; 2]>,
    pub right: SmallVec<[u32; 2]>,
    /// Location of the predicate that produced the edge
    pub at: TextRange,
}

/// Result buffer of the analyze stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzedScript {
    pub tables: Vec<AnalyzedTable>,
    pub table_refs: Vec<TableRef>,
    pub column_refs: Vec<ColumnRef>,
    pub query_edges: Vec<QueryEdge>,
}

impl AnalyzedScript {
    /// Table-reference indices resolving to `table`
    pub fn table_refs_of(&self, table: QualifiedObjectId) -> impl Iterator<Item = u32> + '_ {
        self.table_refs
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.resolved_table == Some(table))
            .map(|(i, _)| i as u32)
    }

    /// Column-reference indices resolving to a column of `table`
    pub fn column_refs_of(&self, table: QualifiedObjectId) -> impl Iterator<Item = u32> + '_ {
        self.column_refs
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.resolved_table == Some(table))
            .map(|(i, _)| i as u32)
    }
}

/// Where the cursor sits relative to the token under it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenRelative {
    /// Not on any token
    #[default]
    None,
    /// At the first character of a token
    Begin,
    /// Inside a token
    Mid,
    /// Directly behind the last character of a token
    End,
    /// Inside a comment
    Comment,
}

/// Engine-derived description of a text cursor position.
/// All object fields are local indices into the owning slot's analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCursor {
    pub text_offset: usize,
    pub token: Option<u32>,
    pub token_relative: TokenRelative,
    pub statement: Option<u32>,
    /// A table declared at the cursor position
    pub table_id: Option<u32>,
    /// A table reference under the cursor
    pub table_ref: Option<u32>,
    /// A column reference under the cursor
    pub column_ref: Option<u32>,
    /// A query edge whose predicate is under the cursor
    pub query_edge: Option<u32>,
}

impl ScriptCursor {
    /// Whether the cursor sits at the begin, middle or end of a token,
    /// the positions at which completion may be requested
    pub fn at_token(&self) -> bool {
        matches!(
            self.token_relative,
            TokenRelative::Begin | TokenRelative::Mid | TokenRelative::End
        )
    }
}

/// One completion candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCandidate {
    /// Replacement text
    pub text: String,
    /// Engine-assigned score, higher is better
    pub score: u32,
    /// The span the candidate replaces when applied
    pub replace_at: TextRange,
    /// The catalog table the candidate refers to, if any
    pub table: Option<QualifiedObjectId>,
}

/// Result buffer of a completion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Completion {
    pub text_offset: usize,
    pub candidates: Vec<CompletionCandidate>,
}

/// One positioned table node of the engine's graph layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    /// The analyzed table behind the node; null when the engine could not
    /// resolve a table for it
    pub table_id: Option<QualifiedObjectId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Whether any reference in the query script points at the node
    pub is_referenced: bool,
}

/// One endpoint of an abstract layout edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEdgeEndpoint {
    pub table_id: Option<QualifiedObjectId>,
    pub column_ref: QualifiedObjectId,
}

/// An abstract edge between 1..N endpoints per side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEdge {
    /// The query edge underlying the connection
    pub query_edge: QualifiedObjectId,
    pub left: SmallVec<[LayoutEdgeEndpoint; 2]>,
    pub right: SmallVec<[LayoutEdgeEndpoint; 2]>,
}

/// Result buffer of the graph layout stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphLayout {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ScriptKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_range_contains() {
        let range = TextRange::new(4, 3);
        assert!(!range.contains(3));
        assert!(range.contains(4));
        assert!(range.contains(6));
        assert!(range.contains(7));
        assert!(!range.contains(8));
    }

    #[test]
    fn test_token_at() {
        let scanned = ScannedScript {
            tokens: vec![
                Token {
                    range: TextRange::new(0, 6),
                    kind: TokenKind::Keyword,
                },
                Token {
                    range: TextRange::new(7, 1),
                    kind: TokenKind::Operator,
                },
            ],
        };
        assert_eq!(scanned.token_at(0), Some(0));
        assert_eq!(scanned.token_at(6), Some(0));
        assert_eq!(scanned.token_at(7), Some(1));
        assert_eq!(scanned.token_at(9), None);
    }

    #[test]
    fn test_reference_lookup_by_table() {
        let table = QualifiedObjectId::new(ScriptKey::Schema, 0);
        let other = QualifiedObjectId::new(ScriptKey::Schema, 1);
        let analyzed = AnalyzedScript {
            table_refs: vec![
                TableRef {
                    range: TextRange::new(0, 3),
                    name: "foo".into(),
                    alias: None,
                    resolved_table: Some(table),
                },
                TableRef {
                    range: TextRange::new(8, 3),
                    name: "bar".into(),
                    alias: None,
                    resolved_table: Some(other),
                },
            ],
            column_refs: vec![ColumnRef {
                range: TextRange::new(14, 1),
                column: "a".into(),
                resolved_table: Some(table),
                column_index: Some(0),
            }],
            ..Default::default()
        };
        assert_eq!(analyzed.table_refs_of(table).collect::<Vec<_>>(), vec![0]);
        assert_eq!(analyzed.column_refs_of(table).collect::<Vec<_>>(), vec![0]);
        assert_eq!(analyzed.column_refs_of(other).count(), 0);
    }
}
