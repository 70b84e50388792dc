use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    percent, BlobDeletion, BlobStore, Collection, Direction, Document, DocumentStore, Fields,
    ObjectRef, ProgressFn, Query,
};
use crate::error::{AppError, Result};

/// In-process [`DocumentStore`]. Can be switched offline to exercise the
/// failure paths of its callers.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Fields>>>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(AppError::remote("memory store is offline"));
        }
        Ok(())
    }
}

fn compare_field(a: &Fields, b: &Fields, field: &str) -> Ordering {
    let key = |f: &Fields| f.get(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
    key(a).cmp(&key(b))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(&self, collection: Collection, query: Query) -> Result<Vec<Document>> {
        self.check_online()?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<(&String, &Fields)> = docs
            .iter()
            .filter(|(_, fields)| match &query.filter {
                Some((field, value)) => fields.get(field) == Some(value),
                None => true,
            })
            .collect();

        if let Some((field, direction)) = &query.order_by {
            matched.sort_by(|(_, a), (_, b)| {
                let ord = compare_field(a, b, field);
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        self.check_online()?;
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<()> {
        self.check_online()?;
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.check_online()?;
        if let Some(docs) = self.collections.write().await.get_mut(&collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

pub const MEMORY_BLOB_BASE: &str = "memory://blobs/v0";
const MEMORY_BUCKET: &str = "local";
const MEMORY_CHUNK: usize = 64 * 1024;

/// In-process [`BlobStore`] minting URLs in the same shape as the real
/// storage service.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    tokens: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        local_path: &Path,
        object_path: &str,
        progress: Option<ProgressFn>,
    ) -> Result<String> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| AppError::upload(format!("cannot read {}: {e}", local_path.display())))?;

        if let Some(report) = &progress {
            report(0);
            let mut sent = 0;
            for chunk in bytes.chunks(MEMORY_CHUNK) {
                sent += chunk.len();
                report(percent(sent, bytes.len()));
            }
            report(100);
        }

        let token = self.tokens.fetch_add(1, AtomicOrdering::SeqCst).to_string();
        debug!(object_path, bytes = bytes.len(), "storing blob in memory");
        self.objects
            .write()
            .await
            .insert(object_path.to_string(), bytes);

        let url = ObjectRef::new(MEMORY_BUCKET, object_path)
            .download_url(MEMORY_BLOB_BASE, Some(&token))
            .map_err(AppError::upload)?;
        Ok(url.into())
    }

    async fn delete(&self, url: &str) -> BlobDeletion {
        let Some(object) = ObjectRef::parse(url) else {
            return BlobDeletion::Skipped;
        };
        match self.objects.write().await.remove(&object.path) {
            Some(_) => BlobDeletion::Deleted,
            None => BlobDeletion::NotFound,
        }
    }
}
