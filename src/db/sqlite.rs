//! SQLite backend for the document store.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use super::schema::SCHEMA;
use super::{split_path, DocumentStore, Filter, WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::InvalidPath(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn read_doc(conn: &Connection, collection: &str, id: &str) -> StoreResult<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    match body {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

fn write_doc(conn: &Connection, collection: &str, id: &str, value: &Value) -> StoreResult<()> {
    let body = serde_json::to_string(value)?;
    conn.execute(
        r#"
        INSERT INTO documents (collection, id, body, updated_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = CURRENT_TIMESTAMP
        "#,
        params![collection, id, body],
    )?;
    Ok(())
}

fn merge_doc(conn: &Connection, path: &str, fields: &Map<String, Value>) -> StoreResult<()> {
    let (collection, id) = split_path(path)?;
    let mut doc = match read_doc(conn, collection, id)? {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(StoreError::malformed(path, "document is not an object")),
        None => Map::new(),
    };
    for (key, value) in fields {
        doc.insert(key.clone(), value.clone());
    }
    write_doc(conn, collection, id, &Value::Object(doc))
}

fn delete_doc(conn: &Connection, path: &str) -> StoreResult<()> {
    let (collection, id) = split_path(path)?;
    conn.execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        params![collection, id],
    )?;
    Ok(())
}

fn list_docs(conn: &Connection, collection: &str) -> StoreResult<Vec<(String, Value)>> {
    let mut stmt = conn.prepare("SELECT id, body FROM documents WHERE collection = ? ORDER BY id")?;
    let rows: Vec<(String, String)> = stmt
        .query_map([collection], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;

    let docs = rows
        .into_iter()
        .filter_map(|(id, body)| match serde_json::from_str(&body) {
            Ok(value) => Some((id, value)),
            Err(e) => {
                warn!("Skipping unreadable document {}/{}: {}", collection, id, e);
                None
            }
        })
        .collect();
    Ok(docs)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let (collection, id) = split_path(path)?;
        let conn = self.conn()?;
        read_doc(&conn, collection, id)
    }

    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        let (collection, id) = split_path(path)?;
        let conn = self.conn()?;
        write_doc(&conn, collection, id, &value)
    }

    async fn merge(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        let conn = self.conn()?;
        merge_doc(&conn, path, &fields)
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        delete_doc(&conn, path)
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>> {
        let conn = self.conn()?;
        list_docs(&conn, collection)
    }

    async fn delete_collection(&self, collection: &str) -> StoreResult<usize> {
        let conn = self.conn()?;
        let nested = format!("{}/%", collection);
        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ? OR collection LIKE ?",
            params![collection, nested],
        )?;
        Ok(deleted)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for op in batch.into_ops() {
            match op {
                WriteOp::Set { path, value } => {
                    let (collection, id) = split_path(&path)?;
                    write_doc(&tx, collection, id, &value)?;
                }
                WriteOp::Merge { path, fields } => merge_doc(&tx, &path, &fields)?,
                WriteOp::Delete { path } => delete_doc(&tx, &path)?,
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> StoreResult<Vec<(String, Value)>> {
        let conn = self.conn()?;
        let docs = list_docs(&conn, collection)?;
        Ok(docs
            .into_iter()
            .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
            .collect())
    }
}
