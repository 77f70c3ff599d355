use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("rollbook.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // Single-row session table: one workspace serves one signed-in teacher.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS session(
            id INTEGER PRIMARY KEY CHECK(id = 1),
            session_id TEXT,
            backend_url TEXT,
            token TEXT,
            teacher_id TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    // Last-write-wins snapshot of the filter selection. Overwritten on every
    // mutation; only one tab is assumed active against a workspace.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS filter_state(
            id INTEGER PRIMARY KEY CHECK(id = 1),
            payload TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    // Durable subject-list cache, one row per lookup key tuple.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_cache(
            cache_key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    Ok(())
}
