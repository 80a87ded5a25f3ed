use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tracing::debug;

use super::{parse_body, timestamp_now, Document, DocumentStore, Snapshot, StoreError, Transaction};
use crate::db;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// One connection per store. Concurrent sessions open their own store on the
/// same workspace file.
pub struct SqliteDocumentStore {
    conn: Connection,
}

impl SqliteDocumentStore {
    pub fn open(workspace: &Path, config: &StoreConfig) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace, config)?;
        Ok(Self { conn })
    }
}

fn serialize_body(collection: &str, id: &str, body: &Document) -> Result<String, StoreError> {
    serde_json::to_string(body).map_err(|e| StoreError::Invalid {
        collection: collection.to_string(),
        id: id.to_string(),
        message: e.to_string(),
    })
}

fn read_snapshot(
    conn: &Connection,
    collection: &str,
    id: &str,
) -> Result<Option<Snapshot>, StoreError> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT body, version FROM documents WHERE collection = ? AND id = ?",
            (collection, id),
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    match row {
        Some((raw, version)) => Ok(Some(Snapshot {
            id: id.to_string(),
            version,
            body: parse_body(collection, id, &raw)?,
        })),
        None => Ok(None),
    }
}

fn read_version(conn: &Connection, collection: &str, id: &str) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT version FROM documents WHERE collection = ? AND id = ?",
            (collection, id),
            |r| r.get(0),
        )
        .optional()?)
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>, StoreError> {
        read_snapshot(&self.conn, collection, id)
    }

    fn set(&self, collection: &str, id: &str, body: &Document) -> Result<(), StoreError> {
        let raw = serialize_body(collection, id, body)?;
        self.conn.execute(
            "INSERT INTO documents(collection, id, body, version) VALUES(?, ?, ?, 1)
             ON CONFLICT(collection, id) DO UPDATE
             SET body = excluded.body, version = documents.version + 1",
            (collection, id, &raw),
        )?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let n = self.conn.execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            (collection, id),
        )?;
        Ok(n > 0)
    }

    fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, body, version FROM documents WHERE collection = ? ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([collection], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, raw, version) in rows {
            let body = parse_body(collection, &id, &raw)?;
            out.push(Snapshot { id, version, body });
        }
        Ok(out)
    }

    fn server_timestamp(&self) -> String {
        timestamp_now()
    }

    fn begin(&self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        Ok(Box::new(SqliteTransaction {
            conn: &self.conn,
            reads: Vec::new(),
            writes: Vec::new(),
        }))
    }
}

enum StagedWrite {
    Create {
        collection: String,
        id: String,
        body: Document,
    },
    Update {
        collection: String,
        id: String,
        fields: Document,
    },
}

struct ReadMark {
    collection: String,
    id: String,
    // None means the document was observed absent.
    version: Option<i64>,
}

pub struct SqliteTransaction<'a> {
    conn: &'a Connection,
    reads: Vec<ReadMark>,
    writes: Vec<StagedWrite>,
}

impl SqliteTransaction<'_> {
    fn remember_read(&mut self, collection: &str, id: &str, version: Option<i64>) {
        if self
            .reads
            .iter()
            .any(|m| m.collection == collection && m.id == id)
        {
            return;
        }
        self.reads.push(ReadMark {
            collection: collection.to_string(),
            id: id.to_string(),
            version,
        });
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn get(&mut self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let snapshot = read_snapshot(self.conn, collection, id)?;
        self.remember_read(collection, id, snapshot.as_ref().map(|s| s.version));
        Ok(snapshot.map(|s| s.body))
    }

    fn create(&mut self, collection: &str, id: &str, body: Document) -> Result<(), StoreError> {
        self.writes.push(StagedWrite::Create {
            collection: collection.to_string(),
            id: id.to_string(),
            body,
        });
        Ok(())
    }

    fn update(&mut self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        self.writes.push(StagedWrite::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let SqliteTransaction {
            conn,
            reads,
            writes,
        } = *self;

        // IMMEDIATE takes the write lock up front so validation and apply see the same state.
        let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        for mark in &reads {
            let current = read_version(&tx, &mark.collection, &mark.id)?;
            if current != mark.version {
                debug!(
                    collection = %mark.collection,
                    id = %mark.id,
                    read = ?mark.version,
                    current = ?current,
                    "stale read detected at commit"
                );
                // Dropping `tx` rolls back; nothing has been written yet.
                return Err(StoreError::Conflict {
                    collection: mark.collection.clone(),
                    id: mark.id.clone(),
                });
            }
        }

        for write in writes {
            match write {
                StagedWrite::Create {
                    collection,
                    id,
                    body,
                } => {
                    if read_version(&tx, &collection, &id)?.is_some() {
                        return Err(StoreError::AlreadyExists { collection, id });
                    }
                    let raw = serialize_body(&collection, &id, &body)?;
                    tx.execute(
                        "INSERT INTO documents(collection, id, body, version) VALUES(?, ?, ?, 1)",
                        (&collection, &id, &raw),
                    )?;
                }
                StagedWrite::Update {
                    collection,
                    id,
                    fields,
                } => {
                    let Some(mut current) = read_snapshot(&tx, &collection, &id)? else {
                        return Err(StoreError::NotFound { collection, id });
                    };
                    for (k, v) in fields {
                        current.body.insert(k, v);
                    }
                    let raw = serialize_body(&collection, &id, &current.body)?;
                    tx.execute(
                        "UPDATE documents SET body = ?, version = version + 1
                         WHERE collection = ? AND id = ?",
                        (&raw, &collection, &id),
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}
