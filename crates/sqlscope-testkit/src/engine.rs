//! `LocalEngine`, the in-process implementation of the engine contract
//!
//! Scripts are plain strings, the catalog holds table snapshots taken when a
//! script is registered, and every result buffer is computed fresh from the
//! current text. `sqlparser` guards the parse stage so malformed scripts
//! fail with a decodable message.

use std::collections::HashMap;

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlscope_core::{
    AnalysisEngine, AnalyzedScript, AnalyzedTable, BufferHandle, CatalogId, Completion,
    CompletionCandidate, GraphConfig, GraphLayout, LayoutEdge, LayoutEdgeEndpoint, LayoutNode,
    ParsedScript, QualifiedObjectId, Result, ScannedScript, ScriptCursor, ScriptId, ScriptKey,
    SqlscopeError, TableDescriptor, TextRange, TokenKind, TokenRelative,
};

use crate::analyze::{ResolveTable, ResolvedTable, analyze_text, statement_summaries};
use crate::tokenizer::{KEYWORDS, tokenize};

const LAYOUT_GRID_COLUMNS: usize = 3;

#[derive(Debug)]
struct ScriptState {
    key: ScriptKey,
    catalog: CatalogId,
    text: String,
}

#[derive(Debug)]
struct RegisteredScript {
    rank: u32,
    key: ScriptKey,
    tables: Vec<AnalyzedTable>,
}

#[derive(Debug)]
struct DescriptorPool {
    rank: u32,
    tables: Vec<TableDescriptor>,
}

#[derive(Debug, Default)]
struct CatalogState {
    scripts: HashMap<u32, RegisteredScript>,
    pools: HashMap<u32, DescriptorPool>,
}

impl ResolveTable for CatalogState {
    fn resolve_table(&self, name: &str) -> Option<ResolvedTable> {
        let mut best: Option<(u32, ResolvedTable)> = None;
        for registered in self.scripts.values() {
            if let Some((index, table)) = registered
                .tables
                .iter()
                .enumerate()
                .find(|(_, t)| t.name.eq_ignore_ascii_case(name))
            {
                let resolved = ResolvedTable {
                    id: Some(QualifiedObjectId::new(registered.key, index as u32)),
                    columns: table.columns.iter().map(|c| c.name.clone()).collect(),
                };
                if best.as_ref().is_none_or(|(rank, _)| registered.rank > *rank) {
                    best = Some((registered.rank, resolved));
                }
            }
        }
        for pool in self.pools.values() {
            if let Some(table) = pool
                .tables
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(name))
            {
                let resolved = ResolvedTable {
                    id: None,
                    columns: table.columns.clone(),
                };
                if best.as_ref().is_none_or(|(rank, _)| pool.rank > *rank) {
                    best = Some((pool.rank, resolved));
                }
            }
        }
        best.map(|(_, resolved)| resolved)
    }
}

/// The in-process reference engine
#[derive(Debug, Default)]
pub struct LocalEngine {
    scripts: HashMap<u32, ScriptState>,
    catalogs: HashMap<u32, CatalogState>,
    next_script: u32,
    next_catalog: u32,
    graph_config: GraphConfig,
    fail_next_analyze: Option<String>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `analyze` call fail with `message`. Used by tests to
    /// exercise failure capture on the slots.
    pub fn inject_analyze_error(&mut self, message: impl Into<String>) {
        self.fail_next_analyze = Some(message.into());
    }

    fn script(&self, id: ScriptId) -> Result<&ScriptState> {
        self.scripts
            .get(&id.0)
            .ok_or(SqlscopeError::NullHandle("engine script"))
    }

    fn script_mut(&mut self, id: ScriptId) -> Result<&mut ScriptState> {
        self.scripts
            .get_mut(&id.0)
            .ok_or(SqlscopeError::NullHandle("engine script"))
    }

    fn catalog_mut(&mut self, id: CatalogId) -> Result<&mut CatalogState> {
        self.catalogs
            .get_mut(&id.0)
            .ok_or(SqlscopeError::NullHandle("engine catalog"))
    }

    fn analysis_for(&self, state: &ScriptState) -> AnalyzedScript {
        let empty = CatalogState::default();
        let catalog = self.catalogs.get(&state.catalog.0).unwrap_or(&empty);
        analyze_text(&state.text, state.key, catalog)
    }

    /// Columns of a table visible from `state`, for node sizing
    fn column_count(&self, state: &ScriptState, analysis: &AnalyzedScript, id: QualifiedObjectId) -> usize {
        if id.script == state.key {
            return analysis
                .tables
                .get(id.index as usize)
                .map_or(0, |t| t.columns.len());
        }
        self.catalogs
            .get(&state.catalog.0)
            .and_then(|catalog| {
                catalog
                    .scripts
                    .values()
                    .find(|r| r.key == id.script)
                    .and_then(|r| r.tables.get(id.index as usize))
            })
            .map_or(0, |t| t.columns.len())
    }
}

impl AnalysisEngine for LocalEngine {
    fn create_script(&mut self, catalog: CatalogId, key: ScriptKey) -> Result<ScriptId> {
        if !self.catalogs.contains_key(&catalog.0) {
            return Err(SqlscopeError::engine("unknown catalog"));
        }
        let id = self.next_script;
        self.next_script += 1;
        self.scripts.insert(
            id,
            ScriptState {
                key,
                catalog,
                text: String::new(),
            },
        );
        Ok(ScriptId(id))
    }

    fn destroy_script(&mut self, script: ScriptId) {
        self.scripts.remove(&script.0);
    }

    fn insert_text_at(&mut self, script: ScriptId, offset: usize, text: &str) -> Result<()> {
        let state = self.script_mut(script)?;
        if offset > state.text.len() || !state.text.is_char_boundary(offset) {
            return Err(SqlscopeError::engine(format!(
                "insert offset {offset} out of bounds"
            )));
        }
        state.text.insert_str(offset, text);
        Ok(())
    }

    fn erase_text_range(&mut self, script: ScriptId, offset: usize, length: usize) -> Result<()> {
        let state = self.script_mut(script)?;
        let end = offset + length;
        if end > state.text.len()
            || !state.text.is_char_boundary(offset)
            || !state.text.is_char_boundary(end)
        {
            return Err(SqlscopeError::engine(format!(
                "erase range {offset}..{end} out of bounds"
            )));
        }
        state.text.replace_range(offset..end, "");
        Ok(())
    }

    fn replace_text(&mut self, script: ScriptId, text: &str) -> Result<()> {
        self.script_mut(script)?.text = text.to_string();
        Ok(())
    }

    fn scan(&mut self, script: ScriptId) -> Result<BufferHandle<ScannedScript>> {
        let state = self.script(script)?;
        Ok(BufferHandle::new(ScannedScript {
            tokens: tokenize(&state.text),
        }))
    }

    fn parse(&mut self, script: ScriptId) -> Result<BufferHandle<ParsedScript>> {
        let state = self.script(script)?;
        Parser::parse_sql(&GenericDialect {}, &state.text)
            .map_err(|e| SqlscopeError::engine(format!("parse error: {e}")))?;
        Ok(BufferHandle::new(ParsedScript {
            statements: statement_summaries(&state.text),
        }))
    }

    fn analyze(&mut self, script: ScriptId) -> Result<BufferHandle<AnalyzedScript>> {
        if let Some(message) = self.fail_next_analyze.take() {
            return Err(SqlscopeError::engine(message));
        }
        let state = self.script(script)?;
        Ok(BufferHandle::new(self.analysis_for(state)))
    }

    fn move_cursor(&mut self, script: ScriptId, offset: usize) -> Result<BufferHandle<ScriptCursor>> {
        let state = self.script(script)?;
        let tokens = tokenize(&state.text);
        let analysis = self.analysis_for(state);
        let statements = statement_summaries(&state.text);

        let mut cursor = ScriptCursor {
            text_offset: offset,
            ..Default::default()
        };
        if let Some(index) = tokens.iter().position(|t| t.range.contains(offset)) {
            let token = &tokens[index];
            cursor.token = Some(index as u32);
            cursor.token_relative = if token.kind == TokenKind::Comment {
                TokenRelative::Comment
            } else if offset == token.range.offset {
                TokenRelative::Begin
            } else if offset == token.range.end() {
                TokenRelative::End
            } else {
                TokenRelative::Mid
            };
        }
        cursor.statement = statements
            .iter()
            .position(|s| s.range.contains(offset))
            .map(|i| i as u32);
        cursor.table_id = analysis
            .tables
            .iter()
            .position(|t| t.declared_at.is_some_and(|r| r.contains(offset)))
            .map(|i| i as u32);
        cursor.table_ref = analysis
            .table_refs
            .iter()
            .position(|r| r.range.contains(offset))
            .map(|i| i as u32);
        cursor.column_ref = analysis
            .column_refs
            .iter()
            .position(|r| r.range.contains(offset))
            .map(|i| i as u32);
        cursor.query_edge = analysis
            .query_edges
            .iter()
            .position(|e| e.at.contains(offset))
            .map(|i| i as u32);

        Ok(BufferHandle::new(cursor))
    }

    fn complete_at_cursor(
        &mut self,
        script: ScriptId,
        offset: usize,
        limit: usize,
    ) -> Result<BufferHandle<Completion>> {
        let state = self.script(script)?;
        let tokens = tokenize(&state.text);
        let (prefix, replace_at) = match tokens.iter().find(|t| {
            t.kind == TokenKind::Identifier && t.range.contains(offset) && offset > t.range.offset
        }) {
            Some(token) => (
                state.text[token.range.offset..offset].to_ascii_lowercase(),
                token.range,
            ),
            None => (String::new(), TextRange::new(offset, 0)),
        };
        let matches = |name: &str| prefix.is_empty() || name.to_ascii_lowercase().starts_with(&prefix);

        let mut candidates = Vec::new();
        let analysis = self.analysis_for(state);
        for (index, table) in analysis.tables.iter().enumerate() {
            if matches(&table.name) {
                candidates.push(CompletionCandidate {
                    text: table.name.clone(),
                    score: 80,
                    replace_at,
                    table: Some(QualifiedObjectId::new(state.key, index as u32)),
                });
            }
        }
        if let Some(catalog) = self.catalogs.get(&state.catalog.0) {
            for registered in catalog.scripts.values() {
                for (index, table) in registered.tables.iter().enumerate() {
                    let id = QualifiedObjectId::new(registered.key, index as u32);
                    if matches(&table.name) {
                        candidates.push(CompletionCandidate {
                            text: table.name.clone(),
                            score: 80,
                            replace_at,
                            table: Some(id),
                        });
                    }
                    for column in &table.columns {
                        if matches(&column.name) {
                            candidates.push(CompletionCandidate {
                                text: column.name.clone(),
                                score: 70,
                                replace_at,
                                table: Some(id),
                            });
                        }
                    }
                }
            }
            for pool in catalog.pools.values() {
                for table in &pool.tables {
                    if matches(&table.name) {
                        candidates.push(CompletionCandidate {
                            text: table.name.clone(),
                            score: 80,
                            replace_at,
                            table: None,
                        });
                    }
                }
            }
        }
        for keyword in KEYWORDS {
            if matches(keyword) {
                candidates.push(CompletionCandidate {
                    text: (*keyword).to_string(),
                    score: 50,
                    replace_at,
                    table: None,
                });
            }
        }

        candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.text.cmp(&b.text)));
        candidates.dedup_by(|a, b| a.text.eq_ignore_ascii_case(&b.text));
        candidates.truncate(limit);

        Ok(BufferHandle::new(Completion {
            text_offset: offset,
            candidates,
        }))
    }

    fn create_catalog(&mut self) -> Result<CatalogId> {
        let id = self.next_catalog;
        self.next_catalog += 1;
        self.catalogs.insert(id, CatalogState::default());
        Ok(CatalogId(id))
    }

    fn destroy_catalog(&mut self, catalog: CatalogId) {
        self.catalogs.remove(&catalog.0);
    }

    fn catalog_load_script(
        &mut self,
        catalog: CatalogId,
        script: ScriptId,
        rank: u32,
    ) -> Result<()> {
        let state = self.script(script)?;
        let key = state.key;
        let tables = self.analysis_for(state).tables;
        let entry = RegisteredScript { rank, key, tables };
        self.catalog_mut(catalog)?.scripts.insert(script.0, entry);
        Ok(())
    }

    fn catalog_clear(&mut self, catalog: CatalogId) -> Result<()> {
        let state = self.catalog_mut(catalog)?;
        state.scripts.clear();
        state.pools.clear();
        Ok(())
    }

    fn catalog_add_descriptor_pool(
        &mut self,
        catalog: CatalogId,
        pool_id: u32,
        rank: u32,
    ) -> Result<()> {
        self.catalog_mut(catalog)?.pools.insert(
            pool_id,
            DescriptorPool {
                rank,
                tables: Vec::new(),
            },
        );
        Ok(())
    }

    fn catalog_add_schema_descriptor(
        &mut self,
        catalog: CatalogId,
        pool_id: u32,
        tables: Vec<TableDescriptor>,
    ) -> Result<()> {
        let pool = self
            .catalog_mut(catalog)?
            .pools
            .get_mut(&pool_id)
            .ok_or_else(|| SqlscopeError::engine("unknown descriptor pool"))?;
        pool.tables.extend(tables);
        Ok(())
    }

    fn graph_configure(&mut self, config: &GraphConfig) {
        self.graph_config = config.clone();
    }

    fn graph_load_script(&mut self, script: ScriptId) -> Result<BufferHandle<GraphLayout>> {
        let state = self.script(script)?;
        let analysis = self.analysis_for(state);
        let config = &self.graph_config;

        let mut nodes: Vec<LayoutNode> = Vec::new();
        let mut index_of: HashMap<QualifiedObjectId, usize> = HashMap::new();
        for table_ref in &analysis.table_refs {
            match table_ref.resolved_table {
                Some(id) => {
                    if index_of.contains_key(&id) {
                        continue;
                    }
                    let columns = self.column_count(state, &analysis, id);
                    let width = config.cell_width * 2.0;
                    let height = config.cell_height * (1 + columns) as f64;
                    let slot = nodes.len();
                    let column = slot % LAYOUT_GRID_COLUMNS;
                    let row = slot / LAYOUT_GRID_COLUMNS;
                    index_of.insert(id, slot);
                    nodes.push(LayoutNode {
                        table_id: Some(id),
                        x: column as f64 * (width + config.cell_width),
                        y: row as f64 * (config.cell_height * 6.0),
                        width,
                        height,
                        is_referenced: true,
                    });
                }
                None => {
                    nodes.push(LayoutNode {
                        table_id: None,
                        x: 0.0,
                        y: 0.0,
                        width: config.cell_width * 2.0,
                        height: config.cell_height,
                        is_referenced: false,
                    });
                }
            }
        }

        let edges = analysis
            .query_edges
            .iter()
            .enumerate()
            .map(|(index, edge)| LayoutEdge {
                query_edge: QualifiedObjectId::new(state.key, index as u32),
                left: edge
                    .left
                    .iter()
                    .map(|&c| LayoutEdgeEndpoint {
                        table_id: analysis.column_refs[c as usize].resolved_table,
                        column_ref: QualifiedObjectId::new(state.key, c),
                    })
                    .collect(),
                right: edge
                    .right
                    .iter()
                    .map(|&c| LayoutEdgeEndpoint {
                        table_id: analysis.column_refs[c as usize].resolved_table,
                        column_ref: QualifiedObjectId::new(state.key, c),
                    })
                    .collect(),
            })
            .collect();

        Ok(BufferHandle::new(GraphLayout { nodes, edges }))
    }
}
