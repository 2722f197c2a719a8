//! Shared identifiers for scripts, analyzed objects and graph connections

use serde::{Deserialize, Serialize};

/// A key identifying one of the two logical scripts of an editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScriptKey {
    /// The query script the user is editing
    Query,
    /// The schema script the query script resolves against
    Schema,
}

impl ScriptKey {
    /// Both script keys, in scan order
    pub const ALL: [ScriptKey; 2] = [ScriptKey::Query, ScriptKey::Schema];

    /// Stable slot index for array-backed storage
    pub fn index(self) -> usize {
        match self {
            ScriptKey::Query => 0,
            ScriptKey::Schema => 1,
        }
    }
}

/// Identifies a table, table reference or column reference across the two
/// script slots. Equality requires both the slot and the local index to match;
/// ids are never reused for different logical objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedObjectId {
    /// The slot the object was analyzed in
    pub script: ScriptKey,
    /// The object index local to that slot's analysis
    pub index: u32,
}

impl QualifiedObjectId {
    pub fn new(script: ScriptKey, index: u32) -> Self {
        Self { script, index }
    }
}

/// Packed identifier of a connection between two graph nodes.
///
/// The id itself is directed (from, to); an undirected connection is
/// represented by checking both the id and its flip before inserting, so a
/// connection and its reverse collapse onto whichever direction was recorded
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphConnectionId(u64);

impl GraphConnectionId {
    pub fn new(from_node: u32, to_node: u32) -> Self {
        Self((u64::from(from_node) << 32) | u64::from(to_node))
    }

    /// The same connection, seen from the other endpoint
    pub fn flipped(self) -> Self {
        Self::new(self.to_node(), self.from_node())
    }

    pub fn from_node(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn to_node(self) -> u32 {
        (self.0 & u64::from(u32::MAX)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_key_index() {
        assert_eq!(ScriptKey::Query.index(), 0);
        assert_eq!(ScriptKey::Schema.index(), 1);
        assert_eq!(ScriptKey::ALL[0], ScriptKey::Query);
        assert_eq!(ScriptKey::ALL[1], ScriptKey::Schema);
    }

    #[test]
    fn test_qualified_object_id_equality() {
        let a = QualifiedObjectId::new(ScriptKey::Query, 3);
        let b = QualifiedObjectId::new(ScriptKey::Query, 3);
        let c = QualifiedObjectId::new(ScriptKey::Schema, 3);
        let d = QualifiedObjectId::new(ScriptKey::Query, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_connection_id_packing() {
        let conn = GraphConnectionId::new(7, 11);
        assert_eq!(conn.from_node(), 7);
        assert_eq!(conn.to_node(), 11);

        let flipped = conn.flipped();
        assert_eq!(flipped.from_node(), 11);
        assert_eq!(flipped.to_node(), 7);
        assert_eq!(flipped.flipped(), conn);
        assert_ne!(conn, flipped);
    }

    #[test]
    fn test_connection_id_large_indices() {
        let conn = GraphConnectionId::new(u32::MAX, 1);
        assert_eq!(conn.from_node(), u32::MAX);
        assert_eq!(conn.to_node(), 1);
    }
}
