//! The call contract of the opaque analysis engine
//!
//! The engine is an external collaborator: sqlscope never looks inside the
//! scanner, parser, analyzer or layout machinery. Everything this workspace
//! does is built on the call surface below, and every buffer the engine
//! returns comes wrapped in a `BufferHandle` owned by the caller.

use serde::{Deserialize, Serialize};

use crate::analysis::{
    AnalyzedScript, Completion, GraphLayout, ParsedScript, ScannedScript, ScriptCursor,
};
use crate::buffer::BufferHandle;
use crate::error::Result;
use crate::ids::ScriptKey;

/// Engine-owned mutable text buffer for one script slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptId(pub u32);

/// Engine-owned catalog shared by the scripts of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogId(pub u32);

/// One text mutation applied to an engine-owned script buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextChange {
    Erase { offset: usize, length: usize },
    Insert { offset: usize, text: String },
}

/// A table described by an externally loaded schema descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<String>,
}

/// Graph layout configuration, in board coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub board_width: f64,
    pub board_height: f64,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            board_width: 1024.0,
            board_height: 768.0,
            cell_width: 120.0,
            cell_height: 48.0,
        }
    }
}

/// The opaque scanner/parser/analyzer/completion engine.
///
/// All calls are synchronous and serialized by the single-threaded session;
/// the trait therefore takes `&mut self` and needs no interior locking.
/// Errors carry decoded engine messages, never raw failure codes.
pub trait AnalysisEngine {
    /// Allocate a script buffer bound to `catalog`
    fn create_script(&mut self, catalog: CatalogId, key: ScriptKey) -> Result<ScriptId>;
    /// Destroy a script buffer. Unknown ids are ignored.
    fn destroy_script(&mut self, script: ScriptId);

    fn insert_text_at(&mut self, script: ScriptId, offset: usize, text: &str) -> Result<()>;
    fn erase_text_range(&mut self, script: ScriptId, offset: usize, length: usize) -> Result<()>;
    fn replace_text(&mut self, script: ScriptId, text: &str) -> Result<()>;

    fn scan(&mut self, script: ScriptId) -> Result<BufferHandle<ScannedScript>>;
    fn parse(&mut self, script: ScriptId) -> Result<BufferHandle<ParsedScript>>;
    fn analyze(&mut self, script: ScriptId) -> Result<BufferHandle<AnalyzedScript>>;

    /// Describe the cursor at `offset` without re-analyzing
    fn move_cursor(&mut self, script: ScriptId, offset: usize) -> Result<BufferHandle<ScriptCursor>>;
    /// Request at most `limit` completion candidates at the current cursor
    fn complete_at_cursor(
        &mut self,
        script: ScriptId,
        offset: usize,
        limit: usize,
    ) -> Result<BufferHandle<Completion>>;

    fn create_catalog(&mut self) -> Result<CatalogId>;
    /// Destroy a catalog. Unknown ids are ignored.
    fn destroy_catalog(&mut self, catalog: CatalogId);
    /// Register (or re-register) a script's analyzed tables with the catalog.
    /// Higher ranks win name collisions.
    fn catalog_load_script(
        &mut self,
        catalog: CatalogId,
        script: ScriptId,
        rank: u32,
    ) -> Result<()>;
    fn catalog_clear(&mut self, catalog: CatalogId) -> Result<()>;
    /// Register an externally loaded descriptor pool with the catalog
    fn catalog_add_descriptor_pool(
        &mut self,
        catalog: CatalogId,
        pool_id: u32,
        rank: u32,
    ) -> Result<()>;
    /// Add table descriptors to a previously registered pool
    fn catalog_add_schema_descriptor(
        &mut self,
        catalog: CatalogId,
        pool_id: u32,
        tables: Vec<TableDescriptor>,
    ) -> Result<()>;

    fn graph_configure(&mut self, config: &GraphConfig);
    /// Compute a graph layout for the script's latest analysis
    fn graph_load_script(&mut self, script: ScriptId) -> Result<BufferHandle<GraphLayout>>;
}
