//! Path-addressed document store and the repositories built on it.
//!
//! Documents live at `collection/id` paths, where the collection may itself
//! be nested (`patients/p1/clusters/c1`). Bodies are JSON objects.

mod schema;
pub mod clusters;
pub mod daily;
pub mod sqlite;
pub mod videos;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub use clusters::{ClusterRepository, ClusterSummary};
pub use daily::DailyStateRepository;
pub use schema::SCHEMA;
pub use sqlite::SqliteStore;
pub use videos::VideoRepository;

use crate::error::{StoreError, StoreResult};

pub const VIDEOS_COLLECTION: &str = "generated_videos";
pub const FAILURES_COLLECTION: &str = "generation_failures";

pub fn patient_root(patient_id: &str) -> String {
    format!("patients/{}", patient_id)
}

pub fn clusters_collection(patient_id: &str) -> String {
    format!("{}/clusters", patient_root(patient_id))
}

pub fn cluster_doc(patient_id: &str, cluster_id: &str) -> String {
    format!("{}/{}", clusters_collection(patient_id), cluster_id)
}

pub fn summary_doc(patient_id: &str) -> String {
    format!("{}/summary/clusters", patient_root(patient_id))
}

pub fn daily_state_doc(patient_id: &str) -> String {
    format!("{}/state/daily", patient_root(patient_id))
}

/// Split a document path into `(collection, id)`.
pub fn split_path(path: &str) -> StoreResult<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((collection, id)) if !collection.is_empty() && !id.is_empty() => Ok((collection, id)),
        _ => Err(StoreError::InvalidPath(path.to_string())),
    }
}

/// Make an arbitrary string usable as a single path segment or map key.
pub fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | '/' | '#' | '$' | '[' | ']' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Reject ids that would change the shape of a path.
pub fn validate_segment(segment: &str) -> StoreResult<()> {
    if segment.is_empty() || segment.contains('/') {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

/// A field condition for `query`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// Field is greater than or equal to the value.
    Gte(String, Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte(field.into(), value.into())
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => match doc.get(field) {
                Some(actual) => values_equal(actual, expected),
                None => false,
            },
            Filter::Gte(field, bound) => match doc.get(field) {
                Some(actual) => matches!(
                    compare_values(actual, bound),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                None => false,
            },
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// One write in an ordered batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Set { path: String, value: Value },
    Merge { path: String, fields: Map<String, Value> },
    Delete { path: String },
}

/// Writes applied in insertion order by `DocumentStore::commit`.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<String>, value: Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            path: path.into(),
            value,
        });
        self
    }

    pub fn merge(&mut self, path: impl Into<String>, fields: Map<String, Value>) -> &mut Self {
        self.ops.push(WriteOp::Merge {
            path: path.into(),
            fields,
        });
        self
    }

    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { path: path.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Remote key-value document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Create or replace a document.
    async fn set(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Shallow-merge top-level fields, creating the document if missing.
    async fn merge(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()>;

    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// All documents directly in a collection, as `(id, body)`.
    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>>;

    /// Delete a collection and everything nested under it.
    async fn delete_collection(&self, collection: &str) -> StoreResult<usize>;

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    async fn query(&self, collection: &str, filters: &[Filter]) -> StoreResult<Vec<(String, Value)>>;

    async fn count(&self, collection: &str, filters: &[Filter]) -> StoreResult<usize> {
        Ok(self.query(collection, filters).await?.len())
    }
}
