use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::store::StoreConfig;

pub const DB_FILE_NAME: &str = "admission.sqlite3";

pub fn open_db(workspace: &Path, config: &StoreConfig) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace directory {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    // WAL lets readers keep going while one session holds the write lock for a commit.
    conn.execute_batch("PRAGMA journal_mode = wal;")?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            version INTEGER NOT NULL,
            PRIMARY KEY(collection, id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS store_meta(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO store_meta(key, value) VALUES('schema_version', '1')",
        [],
    )?;

    Ok(conn)
}
