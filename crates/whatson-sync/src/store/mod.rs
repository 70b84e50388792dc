//! Remote persistence: the document store holding businesses and events, and
//! the object store holding uploaded media.

mod client;
pub mod document;
mod firestore;
mod memory;
mod storage;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use client::{StoreClient, MEDIA_PREFIX, UNKNOWN_BUSINESS};
pub use document::{Document, Fields, Value};
pub use firestore::FirestoreClient;
pub use memory::{MemoryBlobStore, MemoryDocumentStore};
pub use storage::{ObjectRef, StorageClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Businesses,
    Events,
    PendingEvents,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Businesses => "businesses",
            Self::Events => "events",
            Self::PendingEvents => "pending-events",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A single-collection query: an optional equality filter, an optional
/// ordering and an optional limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filter = Some((field.into(), value));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query(&self, collection: Collection, query: Query) -> Result<Vec<Document>>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Replaces the whole document, creating it when missing.
    async fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<()>;

    /// Deleting an id that does not exist succeeds.
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;
}

/// Receives whole-number upload percentages between 0 and 100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Outcome of a best-effort blob removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobDeletion {
    Deleted,
    NotFound,
    /// The URL does not point into the object store, nothing was attempted.
    Skipped,
    Failed(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads a local file under `object_path` and resolves to its public URL.
    async fn upload(
        &self,
        local_path: &Path,
        object_path: &str,
        progress: Option<ProgressFn>,
    ) -> Result<String>;

    /// Never fails: every outcome is reported through [`BlobDeletion`].
    async fn delete(&self, url: &str) -> BlobDeletion;
}

pub(crate) fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent as f64 / total as f64) * 100.0).round().min(100.0) as u8
}
