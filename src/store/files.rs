//! File rows: upsert, cascading delete, lookups

use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::SymbolStore;

/// One row of the `files` table.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub id: i64,
    pub path: String,
    pub language: Option<String>,
    pub hash: Option<String>,
    pub mtime: Option<f64>,
    pub line_count: i64,
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        path: row.get(1)?,
        language: row.get(2)?,
        hash: row.get(3)?,
        mtime: row.get(4)?,
        line_count: row.get(5)?,
    })
}

impl SymbolStore {
    /// Insert or update a file row keyed by path. Returns the file id.
    pub fn upsert_file(
        &self,
        path: &str,
        language: Option<&str>,
        hash: &str,
        mtime: f64,
        line_count: i64,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO files (path, language, hash, mtime, line_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                 language = excluded.language,
                 hash = excluded.hash,
                 mtime = excluded.mtime,
                 line_count = excluded.line_count",
            params![path, language, hash, mtime, line_count],
        )?;
        let id: i64 = self.conn.query_row(
            "SELECT id FROM files WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Delete a file and everything descending from it. Symbol rows go
    /// via the FK cascade, which in turn drops edges, metrics, and
    /// cluster rows for those symbols.
    pub fn delete_file(&self, path: &str) -> Result<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM files WHERE path = ?1", params![path])?;
        Ok(affected)
    }

    pub fn file_by_path(&self, path: &str) -> Result<Option<FileRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, path, language, hash, mtime, line_count FROM files WHERE path = ?1",
                params![path],
                row_to_file,
            )
            .optional()?;
        Ok(row)
    }

    pub fn file_by_id(&self, id: i64) -> Result<Option<FileRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, path, language, hash, mtime, line_count FROM files WHERE id = ?1",
                params![id],
                row_to_file,
            )
            .optional()?;
        Ok(row)
    }

    /// All files, ordered by path for deterministic output.
    pub fn all_files(&self) -> Result<Vec<FileRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, language, hash, mtime, line_count FROM files ORDER BY path",
        )?;
        let rows = stmt.query_map([], row_to_file)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Recorded (path -> (mtime, hash)) tuples for change detection.
    pub fn recorded_fingerprints(
        &self,
    ) -> Result<std::collections::HashMap<String, (Option<f64>, Option<String>)>> {
        let mut stmt = self.conn.prepare("SELECT path, mtime, hash FROM files")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                (row.get::<_, Option<f64>>(1)?, row.get::<_, Option<String>>(2)?),
            ))
        })?;
        let mut out = std::collections::HashMap::new();
        for row in rows {
            let (path, fp) = row?;
            out.insert(path, fp);
        }
        Ok(out)
    }

    /// Files that import the given file (sources of incoming file edges).
    pub fn importers_of_file(&self, file_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT source_file_id FROM file_edges
             WHERE target_file_id = ?1 ORDER BY source_file_id",
        )?;
        let rows = stmt.query_map(params![file_id], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_files(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::super::SymbolStore;

    fn open_temp() -> (tempfile::TempDir, SymbolStore) {
        let temp = tempfile::TempDir::new().unwrap();
        let store = SymbolStore::open(temp.path().join("index.db")).unwrap();
        (temp, store)
    }

    #[test]
    fn test_upsert_file_is_keyed_by_path() {
        let (_temp, store) = open_temp();
        let id1 = store
            .upsert_file("src/a.py", Some("python"), "h1", 1.0, 10)
            .unwrap();
        let id2 = store
            .upsert_file("src/a.py", Some("python"), "h2", 2.0, 12)
            .unwrap();
        assert_eq!(id1, id2, "re-upsert must keep the same file id");

        let row = store.file_by_path("src/a.py").unwrap().unwrap();
        assert_eq!(row.hash.as_deref(), Some("h2"));
        assert_eq!(row.line_count, 12);
    }

    #[test]
    fn test_delete_file_cascades_to_symbols_and_edges() {
        let (_temp, store) = open_temp();
        let fid = store
            .upsert_file("src/a.py", Some("python"), "h", 1.0, 5)
            .unwrap();
        let conn = store.connection();
        conn.execute(
            "INSERT INTO symbols (file_id, name, kind) VALUES (?1, 'f', 'function')",
            [fid],
        )
        .unwrap();
        let sid = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO edges (source_id, target_id, kind) VALUES (?1, ?1, 'calls')",
            [sid],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO graph_metrics (symbol_id, pagerank) VALUES (?1, 0.5)",
            [sid],
        )
        .unwrap();

        store.delete_file("src/a.py").unwrap();

        for table in ["symbols", "edges", "graph_metrics"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "{table} should be empty after cascade");
        }
    }
}
