//! Durable symbol store over SQLite
//!
//! Provides deterministic, idempotent persistence for files, symbols,
//! edges, and derived metrics. Single writer; any number of concurrent
//! read-only connections (WAL mode keeps readers off the writer's
//! back and vice versa).

mod files;
mod metrics;
pub mod schema;
mod symbols;

use anyhow::Result;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

use crate::error::{classify_sqlite_error, EngineError};

pub use files::FileRow;
pub use metrics::{ClusterRow, FileStatsRow, MetricsRow};
pub use symbols::{EdgeRow, SymbolRow};

/// Maximum parameters per IN (...) list; SQLite's historical limit is
/// 999, chunking at 500 leaves margin for other bind slots.
pub const IN_CHUNK: usize = 500;

/// Handle on the index database.
#[derive(Debug)]
pub struct SymbolStore {
    pub(crate) conn: Connection,
    readonly: bool,
}

impl SymbolStore {
    /// Open read-write, creating the database and parent directory if
    /// needed, and applying schema creation/migration.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path).map_err(classify_sqlite_error)?;
        apply_pragmas(&conn)?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn,
            readonly: false,
        })
    }

    /// Open read-only. Fails with [`EngineError::MissingIndex`] when no
    /// database exists; never creates or migrates.
    pub fn open_readonly<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let exists = std::fs::metadata(db_path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !exists {
            return Err(EngineError::MissingIndex {
                path: db_path.display().to_string(),
            }
            .into());
        }
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(classify_sqlite_error)?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn,
            readonly: true,
        })
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Begin a write transaction on this connection. Store methods
    /// called while it is open participate in it; dropping without
    /// commit rolls the whole batch back.
    pub fn begin(&self) -> Result<rusqlite::Transaction<'_>> {
        rusqlite::Transaction::new_unchecked(
            &self.conn,
            rusqlite::TransactionBehavior::Immediate,
        )
        .map_err(classify_sqlite_error)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.busy_timeout(std::time::Duration::from_secs(30))?;
    // WAL lets readers proceed during a write and writers proceed
    // during long analytic reads.
    let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.execute_batch(
        "PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;
         PRAGMA cache_size=-64000;
         PRAGMA temp_store=MEMORY;",
    )?;
    Ok(())
}

/// Run a query with an `IN ({ph})` list, chunked to respect parameter
/// limits. `sql` must contain the literal `{ph}` placeholder marker.
/// Results from all chunks are concatenated in chunk order.
pub fn chunked_in<T>(
    conn: &Connection,
    sql: &str,
    ids: &[i64],
    mut map_row: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for chunk in ids.chunks(IN_CHUNK) {
        let placeholders = std::iter::repeat("?")
            .take(chunk.len())
            .collect::<Vec<_>>()
            .join(", ");
        let stmt_sql = sql.replace("{ph}", &placeholders);
        let mut stmt = conn.prepare(&stmt_sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), &mut map_row)?;
        for row in rows {
            out.push(row?);
        }
    }
    Ok(out)
}
