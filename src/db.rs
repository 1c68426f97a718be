use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "portal.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    // Several sidecars may share one workspace; wait instead of failing on a busy lock.
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_entries(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            revision INTEGER NOT NULL,
            writer TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    ensure_kv_digest(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_kv_entries_revision ON kv_entries(revision)",
        [],
    )?;

    // Single-row clock. Never reset, so revisions stay monotonic across a reset.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_clock(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            revision INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO kv_clock(id, revision) VALUES(1, 0)",
        [],
    )?;

    Ok(conn)
}

fn ensure_kv_digest(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "kv_entries", "digest")? {
        return Ok(());
    }
    // Rows written before digests existed are accepted as-is on load.
    conn.execute(
        "ALTER TABLE kv_entries ADD COLUMN digest TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
