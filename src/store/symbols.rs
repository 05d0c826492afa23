//! Symbol and edge rows: replace-per-file upsert, name resolution,
//! file-edge aggregation

use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

use super::SymbolStore;
use crate::extract::{EdgeKind, ReferenceRecord, SymbolKind, SymbolRecord};

/// One row of the `symbols` table, joined with its file path.
#[derive(Debug, Clone)]
pub struct SymbolRow {
    pub id: i64,
    pub file_id: i64,
    pub file_path: String,
    pub name: String,
    pub qualified_name: Option<String>,
    pub kind: SymbolKind,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub visibility: String,
    pub is_exported: bool,
    pub parent_id: Option<i64>,
}

/// One row of the `edges` table.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRow {
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
    pub line: Option<i64>,
}

fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        file_path: row.get(2)?,
        name: row.get(3)?,
        qualified_name: row.get(4)?,
        kind: SymbolKind::parse(&row.get::<_, String>(5)?),
        line_start: row.get(6)?,
        line_end: row.get(7)?,
        visibility: row.get(8)?,
        is_exported: row.get::<_, i64>(9)? != 0,
        parent_id: row.get(10)?,
    })
}

const SYMBOL_COLS: &str = "s.id, s.file_id, f.path, s.name, s.qualified_name, s.kind,
     s.line_start, s.line_end, s.visibility, s.is_exported, s.parent_id";

impl SymbolStore {
    /// Replace all symbols for a file with the extracted records.
    ///
    /// Deletes the file's previous symbols first (edges, metrics, and
    /// cluster rows follow via cascade), then inserts the new set and
    /// wires parent references. Records violating the line invariant
    /// get `line_end` clamped to `line_start`; a `parent_name` that
    /// resolves to no sibling in the same file is dropped.
    ///
    /// Returns the inserted (name -> symbol id) map for resolution.
    pub fn replace_file_symbols(
        &self,
        file_id: i64,
        records: &[SymbolRecord],
    ) -> Result<HashMap<String, i64>> {
        self.conn
            .execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;

        let mut by_name: HashMap<String, i64> = HashMap::new();
        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO symbols
                 (file_id, name, qualified_name, kind, signature, line_start, line_end,
                  docstring, visibility, is_exported, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for record in records {
                let line_end = record.line_end.max(record.line_start);
                let extra = if record.extra.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&record.extra)?)
                };
                stmt.execute(params![
                    file_id,
                    record.name,
                    record.qualified_name,
                    record.kind.as_str(),
                    record.signature,
                    record.line_start,
                    line_end,
                    record.docstring,
                    record.visibility.as_str(),
                    record.is_exported as i64,
                    extra,
                ])?;
                // First occurrence wins for duplicate names in one file.
                by_name
                    .entry(record.name.clone())
                    .or_insert(self.conn.last_insert_rowid());
            }
        }

        // Second pass: parent wiring, same-file only.
        let mut stmt = self
            .conn
            .prepare_cached("UPDATE symbols SET parent_id = ?1 WHERE id = ?2")?;
        for record in records {
            let Some(parent_name) = &record.parent_name else {
                continue;
            };
            let (Some(&child_id), Some(&parent_id)) =
                (by_name.get(&record.name), by_name.get(parent_name))
            else {
                continue;
            };
            if child_id != parent_id {
                stmt.execute(params![parent_id, child_id])?;
            }
        }

        Ok(by_name)
    }

    /// Resolve a reference name to a symbol id: exact qualified name,
    /// then exact name, then case-insensitive name. Ties are broken
    /// deterministically: a match in `prefer_file` wins, then the
    /// lowest id. Returns None when nothing matches.
    pub fn resolve_name(&self, name: &str, prefer_file: Option<i64>) -> Result<Option<i64>> {
        let queries = [
            "SELECT id, file_id FROM symbols WHERE qualified_name = ?1 ORDER BY id",
            "SELECT id, file_id FROM symbols WHERE name = ?1 ORDER BY id",
            "SELECT id, file_id FROM symbols WHERE name = ?1 COLLATE NOCASE ORDER BY id",
        ];
        for sql in queries {
            let mut stmt = self.conn.prepare_cached(sql)?;
            let rows: Vec<(i64, i64)> = stmt
                .query_map(params![name], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?;
            if rows.is_empty() {
                continue;
            }
            if let Some(pref) = prefer_file {
                if let Some((id, _)) = rows.iter().find(|(_, fid)| *fid == pref) {
                    return Ok(Some(*id));
                }
            }
            return Ok(Some(rows[0].0));
        }
        Ok(None)
    }

    /// Delete all edges whose source symbol lives in the given file.
    pub fn delete_outgoing_edges(&self, file_id: i64) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM edges WHERE source_id IN
                 (SELECT id FROM symbols WHERE file_id = ?1)",
            params![file_id],
        )?;
        Ok(affected)
    }

    /// Resolve and insert a file's reference records as edges.
    ///
    /// `source_name` must resolve within the file itself; `target_name`
    /// resolves store-wide. Unresolved references are dropped, not
    /// errored. Returns (inserted, dropped).
    pub fn insert_references(
        &self,
        file_id: i64,
        references: &[ReferenceRecord],
    ) -> Result<(usize, usize)> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO edges (source_id, target_id, kind, line) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut inserted = 0usize;
        let mut dropped = 0usize;
        for reference in references {
            let source = self.resolve_in_file(&reference.source_name, file_id)?;
            let target = self.resolve_name(&reference.target_name, Some(file_id))?;
            match (source, target) {
                (Some(source_id), Some(target_id)) => {
                    stmt.execute(params![
                        source_id,
                        target_id,
                        reference.kind.as_str(),
                        reference.line,
                    ])?;
                    inserted += 1;
                }
                _ => dropped += 1,
            }
        }
        Ok((inserted, dropped))
    }

    fn resolve_in_file(&self, name: &str, file_id: i64) -> Result<Option<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id FROM symbols WHERE file_id = ?1 AND (qualified_name = ?2 OR name = ?2)
             ORDER BY id LIMIT 1",
        )?;
        let id = stmt
            .query_row(params![file_id, name], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Rebuild the aggregated file-level import graph from symbol
    /// edges. Derived data: full replace, never incrementally patched.
    pub fn rebuild_file_edges(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM file_edges", [])?;
        let inserted = self.conn.execute(
            "INSERT INTO file_edges (source_file_id, target_file_id, kind, symbol_count)
             SELECT src.file_id, tgt.file_id, 'imports', COUNT(DISTINCT e.target_id)
             FROM edges e
             JOIN symbols src ON e.source_id = src.id
             JOIN symbols tgt ON e.target_id = tgt.id
             WHERE src.file_id != tgt.file_id
             GROUP BY src.file_id, tgt.file_id",
            [],
        )?;
        Ok(inserted)
    }

    /// All symbols joined with file paths, ordered by id.
    pub fn all_symbols(&self) -> Result<Vec<SymbolRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SYMBOL_COLS} FROM symbols s JOIN files f ON s.file_id = f.id ORDER BY s.id"
        ))?;
        let rows = stmt.query_map([], row_to_symbol)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All edges, ordered by id.
    pub fn all_edges(&self) -> Result<Vec<EdgeRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_id, target_id, kind, line FROM edges ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(EdgeRow {
                source_id: row.get(0)?,
                target_id: row.get(1)?,
                kind: EdgeKind::parse(&row.get::<_, String>(2)?),
                line: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn symbols_in_file(&self, file_id: i64) -> Result<Vec<SymbolRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SYMBOL_COLS} FROM symbols s JOIN files f ON s.file_id = f.id
             WHERE s.file_id = ?1 ORDER BY s.line_start, s.id"
        ))?;
        let rows = stmt.query_map(params![file_id], row_to_symbol)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Lookup candidates for a user-supplied name: exact name, then
    /// exact qualified name, then substring (capped at 50).
    pub fn find_symbol_candidates(&self, name: &str) -> Result<Vec<SymbolRow>> {
        let exact = format!(
            "SELECT {SYMBOL_COLS} FROM symbols s JOIN files f ON s.file_id = f.id
             WHERE s.name = ?1 ORDER BY s.id"
        );
        let qualified = format!(
            "SELECT {SYMBOL_COLS} FROM symbols s JOIN files f ON s.file_id = f.id
             WHERE s.qualified_name = ?1 ORDER BY s.id"
        );
        let fuzzy = format!(
            "SELECT {SYMBOL_COLS} FROM symbols s JOIN files f ON s.file_id = f.id
             WHERE s.name LIKE ?1 OR s.qualified_name LIKE ?1 ORDER BY s.id LIMIT 50"
        );

        for (sql, param) in [
            (&exact, name.to_string()),
            (&qualified, name.to_string()),
            (&fuzzy, format!("%{name}%")),
        ] {
            let mut stmt = self.conn.prepare(sql)?;
            let rows: Vec<SymbolRow> = stmt
                .query_map(params![param], row_to_symbol)?
                .collect::<rusqlite::Result<_>>()?;
            if !rows.is_empty() {
                return Ok(rows);
            }
        }
        Ok(Vec::new())
    }

    pub fn symbol_by_id(&self, id: i64) -> Result<Option<SymbolRow>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {SYMBOL_COLS} FROM symbols s JOIN files f ON s.file_id = f.id
             WHERE s.id = ?1"
        ))?;
        let row = stmt.query_row(params![id], row_to_symbol).optional()?;
        Ok(row)
    }

    pub fn count_symbols(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_edges(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Exported symbols of referenceable kinds with zero incoming
    /// edges, ordered by file path and line.
    pub fn unreferenced_exports(&self) -> Result<Vec<SymbolRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SYMBOL_COLS} FROM symbols s JOIN files f ON s.file_id = f.id
             WHERE s.is_exported = 1
             AND s.id NOT IN (SELECT target_id FROM edges)
             AND s.kind IN ('function', 'method', 'class', 'interface', 'struct')
             ORDER BY f.path, s.line_start"
        ))?;
        let rows = stmt.query_map([], row_to_symbol)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::SymbolStore;
    use crate::extract::{EdgeKind, ReferenceRecord, SymbolKind, SymbolRecord};

    fn open_temp() -> (tempfile::TempDir, SymbolStore) {
        let temp = tempfile::TempDir::new().unwrap();
        let store = SymbolStore::open(temp.path().join("index.db")).unwrap();
        (temp, store)
    }

    fn record(name: &str, kind: SymbolKind) -> SymbolRecord {
        SymbolRecord::new(name, kind, 1, 5)
    }

    #[test]
    fn test_replace_file_symbols_wires_parents() {
        let (_temp, store) = open_temp();
        let fid = store.upsert_file("a.py", Some("python"), "h", 1.0, 10).unwrap();

        let mut method = record("run", SymbolKind::Method);
        method.parent_name = Some("Service".to_string());
        let records = vec![record("Service", SymbolKind::Class), method];

        store.replace_file_symbols(fid, &records).unwrap();
        let symbols = store.symbols_in_file(fid).unwrap();
        let class = symbols.iter().find(|s| s.name == "Service").unwrap();
        let method = symbols.iter().find(|s| s.name == "run").unwrap();
        assert_eq!(method.parent_id, Some(class.id));
        assert_eq!(class.parent_id, None);
    }

    #[test]
    fn test_replace_clamps_line_invariant() {
        let (_temp, store) = open_temp();
        let fid = store.upsert_file("a.py", None, "h", 1.0, 10).unwrap();
        let mut bad = record("f", SymbolKind::Function);
        bad.line_start = 10;
        bad.line_end = 3;
        store.replace_file_symbols(fid, &[bad]).unwrap();
        let symbols = store.symbols_in_file(fid).unwrap();
        assert_eq!(symbols[0].line_end, Some(10));
    }

    #[test]
    fn test_resolution_order_qualified_then_name_then_nocase() {
        let (_temp, store) = open_temp();
        let fid = store.upsert_file("a.py", None, "h", 1.0, 10).unwrap();
        let mut a = record("helper", SymbolKind::Function);
        a.qualified_name = Some("pkg.mod.helper".to_string());
        let b = record("Helper", SymbolKind::Class);
        let by_name = store.replace_file_symbols(fid, &[a, b]).unwrap();

        assert_eq!(
            store.resolve_name("pkg.mod.helper", None).unwrap(),
            Some(by_name["helper"])
        );
        assert_eq!(
            store.resolve_name("helper", None).unwrap(),
            Some(by_name["helper"])
        );
        // Only a case-insensitive match exists for "HELPER"; exact name
        // resolution of "Helper" still picks the class.
        assert_eq!(
            store.resolve_name("Helper", None).unwrap(),
            Some(by_name["Helper"])
        );
        assert!(store.resolve_name("HELPER", None).unwrap().is_some());
        assert_eq!(store.resolve_name("nonexistent", None).unwrap(), None);
    }

    #[test]
    fn test_unresolved_references_are_dropped() {
        let (_temp, store) = open_temp();
        let fid = store.upsert_file("a.py", None, "h", 1.0, 10).unwrap();
        store
            .replace_file_symbols(fid, &[record("caller", SymbolKind::Function)])
            .unwrap();

        let refs = vec![
            ReferenceRecord {
                source_name: "caller".to_string(),
                target_name: "caller".to_string(),
                kind: EdgeKind::Calls,
                line: 2,
                import_path: None,
            },
            ReferenceRecord {
                source_name: "caller".to_string(),
                target_name: "missing".to_string(),
                kind: EdgeKind::Calls,
                line: 3,
                import_path: None,
            },
        ];
        let (inserted, dropped) = store.insert_references(fid, &refs).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_rebuild_file_edges_aggregates_cross_file_only() {
        let (_temp, store) = open_temp();
        let fa = store.upsert_file("a.py", None, "h", 1.0, 10).unwrap();
        let fb = store.upsert_file("b.py", None, "h", 1.0, 10).unwrap();
        let a_names = store
            .replace_file_symbols(
                fa,
                &[record("use_x", SymbolKind::Function), record("use_y", SymbolKind::Function)],
            )
            .unwrap();
        let b_names = store
            .replace_file_symbols(
                fb,
                &[record("x", SymbolKind::Function), record("y", SymbolKind::Function)],
            )
            .unwrap();

        let conn = store.connection();
        for (src, tgt) in [
            (a_names["use_x"], b_names["x"]),
            (a_names["use_y"], b_names["y"]),
            (a_names["use_x"], a_names["use_y"]), // same-file, excluded
        ] {
            conn.execute(
                "INSERT INTO edges (source_id, target_id, kind) VALUES (?1, ?2, 'calls')",
                [src, tgt],
            )
            .unwrap();
        }

        store.rebuild_file_edges().unwrap();
        let (count, symbol_count): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), MAX(symbol_count) FROM file_edges",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1, "one aggregated a.py -> b.py edge");
        assert_eq!(symbol_count, 2, "two distinct target symbols justify it");
        assert_eq!(store.importers_of_file(fb).unwrap(), vec![fa]);
    }
}
