//! Token-driven analysis for the reference engine
//!
//! Walks the scanned token stream to find table declarations, FROM-clause
//! relations, column reference expressions and equality predicates. Name
//! resolution goes through the owning script's tables first, then the
//! catalog the caller passes in.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use smallvec::smallvec;
use sqlscope_core::{
    AnalyzedScript, AnalyzedTable, ColumnRef, QualifiedObjectId, QueryEdge, ScriptKey,
    StatementKind, StatementSummary, TableColumn, TableRef, TextRange, TokenKind,
};

use crate::tokenizer::tokenize;

/// A table a name resolved to. Tables backed by one of the two script slots
/// carry a `QualifiedObjectId`; tables known only through an external
/// descriptor pool resolve by name but are not addressable as slot objects.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTable {
    pub id: Option<QualifiedObjectId>,
    pub columns: Vec<String>,
}

/// Catalog-side name resolution
pub(crate) trait ResolveTable {
    fn resolve_table(&self, name: &str) -> Option<ResolvedTable>;
}

struct Tok<'a> {
    range: TextRange,
    kind: TokenKind,
    text: &'a str,
}

fn kw(t: &Tok<'_>, word: &str) -> bool {
    t.kind == TokenKind::Keyword && t.text.eq_ignore_ascii_case(word)
}

fn punct(t: &Tok<'_>, text: &str) -> bool {
    t.kind == TokenKind::Punctuation && t.text == text
}

fn unquote(text: &str) -> String {
    text.trim_matches('"').to_string()
}

fn span(from: TextRange, to: TextRange) -> TextRange {
    TextRange::new(from.offset, to.end() - from.offset)
}

fn scan_filtered(text: &str) -> Vec<Tok<'_>> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.kind != TokenKind::Comment)
        .map(|t| Tok {
            range: t.range,
            kind: t.kind,
            text: &text[t.range.offset..t.range.end()],
        })
        .collect()
}

fn split_statements(toks: &[Tok<'_>]) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, t) in toks.iter().enumerate() {
        if punct(t, ";") {
            if i > start {
                out.push(start..i);
            }
            start = i + 1;
        }
    }
    if start < toks.len() {
        out.push(start..toks.len());
    }
    out
}

/// Statement summaries for the parse-stage buffer
pub(crate) fn statement_summaries(text: &str) -> Vec<StatementSummary> {
    let toks = scan_filtered(text);
    split_statements(&toks)
        .into_iter()
        .map(|stmt| {
            let slice = &toks[stmt];
            let kind = match slice.first() {
                Some(t) if kw(t, "SELECT") || kw(t, "WITH") => StatementKind::Select,
                Some(t) if kw(t, "CREATE") => StatementKind::CreateTable,
                Some(t) if kw(t, "INSERT") => StatementKind::Insert,
                Some(t) if kw(t, "UPDATE") => StatementKind::Update,
                Some(t) if kw(t, "DELETE") => StatementKind::Delete,
                _ => StatementKind::Other,
            };
            let range = span(
                slice.first().map(|t| t.range).unwrap_or_default(),
                slice.last().map(|t| t.range).unwrap_or_default(),
            );
            StatementSummary { kind, range }
        })
        .collect()
}

/// Analyze the script text against the given catalog
pub(crate) fn analyze_text(
    text: &str,
    key: ScriptKey,
    catalog: &dyn ResolveTable,
) -> AnalyzedScript {
    let toks = scan_filtered(text);
    let statements = split_statements(&toks);
    let mut analysis = AnalyzedScript::default();

    // Declarations first: later statements of the same script may reference
    // tables created earlier in it
    for stmt in &statements {
        collect_created_table(&toks[stmt.clone()], &mut analysis);
    }
    for stmt in &statements {
        let slice = &toks[stmt.clone()];
        if slice.first().is_some_and(|t| kw(t, "SELECT")) {
            analyze_select(slice, key, catalog, &mut analysis);
        }
    }
    analysis
}

fn collect_created_table(stmt: &[Tok<'_>], analysis: &mut AnalyzedScript) {
    if !stmt.first().is_some_and(|t| kw(t, "CREATE")) {
        return;
    }
    let Some(table_kw) = stmt.iter().position(|t| kw(t, "TABLE")) else {
        return;
    };
    let mut i = table_kw + 1;
    while stmt
        .get(i)
        .is_some_and(|t| kw(t, "IF") || kw(t, "NOT") || kw(t, "EXISTS"))
    {
        i += 1;
    }
    if stmt.get(i).is_none_or(|t| t.kind != TokenKind::Identifier) {
        return;
    }
    // A dotted chain keeps the last identifier as the table name
    let mut name_at = i;
    i += 1;
    while i + 1 < stmt.len() && punct(&stmt[i], ".") && stmt[i + 1].kind == TokenKind::Identifier {
        name_at = i + 1;
        i += 2;
    }

    let mut columns = Vec::new();
    if stmt.get(i).is_some_and(|t| punct(t, "(")) {
        let mut depth = 1usize;
        let mut at_def_start = true;
        i += 1;
        while i < stmt.len() && depth > 0 {
            let t = &stmt[i];
            if punct(t, "(") {
                depth += 1;
            } else if punct(t, ")") {
                depth -= 1;
            } else if punct(t, ",") && depth == 1 {
                at_def_start = true;
            } else if at_def_start && depth == 1 {
                // Constraint clauses (PRIMARY KEY, UNIQUE, ...) start with a
                // keyword and declare no column
                if t.kind == TokenKind::Identifier {
                    columns.push(TableColumn {
                        name: unquote(t.text),
                    });
                }
                at_def_start = false;
            }
            i += 1;
        }
    }

    analysis.tables.push(AnalyzedTable {
        name: unquote(stmt[name_at].text),
        columns,
        declared_at: Some(stmt[name_at].range),
    });
}

fn resolve_name(
    tables: &[AnalyzedTable],
    key: ScriptKey,
    catalog: &dyn ResolveTable,
    name: &str,
) -> Option<ResolvedTable> {
    if let Some((index, table)) = tables
        .iter()
        .enumerate()
        .find(|(_, t)| t.name.eq_ignore_ascii_case(name))
    {
        return Some(ResolvedTable {
            id: Some(QualifiedObjectId::new(key, index as u32)),
            columns: table.columns.iter().map(|c| c.name.clone()).collect(),
        });
    }
    catalog.resolve_table(name)
}

fn analyze_select(
    stmt: &[Tok<'_>],
    key: ScriptKey,
    catalog: &dyn ResolveTable,
    analysis: &mut AnalyzedScript,
) {
    // Locate the top-level FROM section
    let mut depth = 0usize;
    let mut from_start = None;
    let mut from_end = stmt.len();
    for (i, t) in stmt.iter().enumerate() {
        if punct(t, "(") {
            depth += 1;
        } else if punct(t, ")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            if from_start.is_none() && kw(t, "FROM") {
                from_start = Some(i + 1);
            } else if from_start.is_some()
                && (kw(t, "WHERE")
                    || kw(t, "GROUP")
                    || kw(t, "ORDER")
                    || kw(t, "HAVING")
                    || kw(t, "LIMIT")
                    || kw(t, "UNION"))
            {
                from_end = i;
                break;
            }
        }
    }

    // Relations with optional aliases
    let mut ref_tables: Vec<Option<ResolvedTable>> = Vec::new();
    let mut alias_map: HashMap<String, usize> = HashMap::new();
    let mut consumed: HashSet<usize> = HashSet::new();

    if let Some(from_start) = from_start {
        let mut expecting_relation = true;
        let mut depth = 0usize;
        let mut i = from_start;
        while i < from_end {
            let t = &stmt[i];
            if punct(t, "(") {
                depth += 1;
                i += 1;
                continue;
            }
            if punct(t, ")") {
                depth = depth.saturating_sub(1);
                i += 1;
                continue;
            }
            if depth > 0 {
                i += 1;
                continue;
            }
            if punct(t, ",") || kw(t, "JOIN") {
                expecting_relation = true;
                i += 1;
                continue;
            }
            if expecting_relation && t.kind == TokenKind::Identifier {
                let name_from = i;
                let mut name_at = i;
                let mut j = i + 1;
                while j + 1 < from_end
                    && punct(&stmt[j], ".")
                    && stmt[j + 1].kind == TokenKind::Identifier
                {
                    name_at = j + 1;
                    j += 2;
                }
                let name = unquote(stmt[name_at].text);

                let mut alias = None;
                if stmt.get(j).is_some_and(|t| kw(t, "AS")) {
                    consumed.insert(j);
                    j += 1;
                }
                if j < from_end && stmt[j].kind == TokenKind::Identifier {
                    alias = Some(unquote(stmt[j].text));
                    consumed.insert(j);
                    j += 1;
                }
                for used in name_from..(name_at + 1) {
                    consumed.insert(used);
                }

                let resolved = resolve_name(&analysis.tables, key, catalog, &name);
                let local = ref_tables.len();
                alias_map.insert(name.to_lowercase(), local);
                if let Some(alias) = &alias {
                    alias_map.insert(alias.to_lowercase(), local);
                }
                analysis.table_refs.push(TableRef {
                    range: span(stmt[name_from].range, stmt[name_at].range),
                    name,
                    alias,
                    resolved_table: resolved.as_ref().and_then(|r| r.id),
                });
                ref_tables.push(resolved);
                expecting_relation = false;
                i = j;
                continue;
            }
            i += 1;
        }
    }

    // Column references anywhere in the statement
    let mut starts: HashMap<usize, u32> = HashMap::new();
    let mut ends: HashMap<usize, u32> = HashMap::new();
    let mut i = 0;
    while i < stmt.len() {
        let t = &stmt[i];
        if t.kind != TokenKind::Identifier || consumed.contains(&i) {
            i += 1;
            continue;
        }
        // Function call, not a column
        if stmt.get(i + 1).is_some_and(|n| punct(n, "(")) {
            i += 2;
            continue;
        }
        // Projection alias, not a column
        if i > 0 && kw(&stmt[i - 1], "AS") {
            i += 1;
            continue;
        }

        if i + 2 < stmt.len() && punct(&stmt[i + 1], ".") && stmt[i + 2].kind == TokenKind::Identifier
        {
            let qualifier = unquote(t.text).to_lowercase();
            let column = unquote(stmt[i + 2].text);
            let resolved = alias_map
                .get(&qualifier)
                .and_then(|&local| ref_tables[local].as_ref());
            let (resolved_table, column_index) = match resolved {
                Some(table) => (
                    table.id,
                    table
                        .columns
                        .iter()
                        .position(|c| c.eq_ignore_ascii_case(&column))
                        .map(|p| p as u32),
                ),
                None => (None, None),
            };
            let index = analysis.column_refs.len() as u32;
            analysis.column_refs.push(ColumnRef {
                range: span(t.range, stmt[i + 2].range),
                column,
                resolved_table,
                column_index,
            });
            starts.insert(i, index);
            ends.insert(i + 2, index);
            i += 3;
            continue;
        }

        // Bare columns resolve when exactly one relation of the statement
        // carries the name
        let column = unquote(t.text);
        let candidates: Vec<&ResolvedTable> = ref_tables
            .iter()
            .filter_map(|r| r.as_ref())
            .filter(|r| r.columns.iter().any(|c| c.eq_ignore_ascii_case(&column)))
            .collect();
        if let [table] = candidates.as_slice() {
            let column_index = table
                .columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&column))
                .map(|p| p as u32);
            let index = analysis.column_refs.len() as u32;
            analysis.column_refs.push(ColumnRef {
                range: t.range,
                column,
                resolved_table: table.id,
                column_index,
            });
            starts.insert(i, index);
            ends.insert(i, index);
        }
        i += 1;
    }

    // Equality predicates between two column references become query edges
    for (i, t) in stmt.iter().enumerate() {
        if t.kind != TokenKind::Operator || t.text != "=" {
            continue;
        }
        let left = i.checked_sub(1).and_then(|p| ends.get(&p));
        let right = starts.get(&(i + 1));
        if let (Some(&left), Some(&right)) = (left, right) {
            analysis.query_edges.push(QueryEdge {
                left: smallvec![left],
                right: smallvec![right],
                at: t.range,
            });
        }
    }
}
