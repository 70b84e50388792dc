use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::document::{
    business_fields, decode_business, decode_event, event_fields, stored_precision,
};
use super::{
    BlobDeletion, BlobStore, Collection, Direction, Document, DocumentStore, ProgressFn, Query,
    Value,
};
use crate::domain::{Business, Event, Media};
use crate::error::Result;

/// Object path prefix for uploaded event media.
pub const MEDIA_PREFIX: &str = "events/";

/// Name shown for an event whose business is not in the business list.
pub const UNKNOWN_BUSINESS: &str = "Unknown Business";

static VIDEO_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mp4|mov|m4v)").expect("valid regex"));

/// Typed access to the remote collections and media storage.
#[derive(Clone)]
pub struct StoreClient {
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

fn decode_events(docs: Vec<Document>) -> Vec<Event> {
    docs.iter()
        .filter_map(|doc| match decode_event(doc) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, "skipping undecodable event document");
                None
            }
        })
        .collect()
}

impl StoreClient {
    pub fn new(docs: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { docs, blobs }
    }

    /// All live events, earliest first.
    #[instrument(skip(self))]
    pub async fn fetch_all_events(&self) -> Result<Vec<Event>> {
        let docs = self
            .docs
            .query(
                Collection::Events,
                Query::new().order_by("date", Direction::Ascending),
            )
            .await?;
        let events = decode_events(docs);
        info!(count = events.len(), "loaded events");
        Ok(events)
    }

    /// Live events of one business, latest first. Sorted here rather than by
    /// the store so no composite index is needed.
    #[instrument(skip(self))]
    pub async fn fetch_events_for_business(&self, business_id: &str) -> Result<Vec<Event>> {
        let docs = self
            .docs
            .query(
                Collection::Events,
                Query::new().where_eq("businessId", Value::string(business_id)),
            )
            .await?;
        let mut events = decode_events(docs);
        events.sort_by(|a, b| b.date.cmp(&a.date));
        info!(count = events.len(), "loaded business events");
        Ok(events)
    }

    #[instrument(skip(self))]
    pub async fn fetch_all_businesses(&self) -> Result<Vec<Business>> {
        let docs = self
            .docs
            .query(
                Collection::Businesses,
                Query::new().order_by("name", Direction::Ascending),
            )
            .await?;
        let businesses: Vec<Business> = docs.iter().map(decode_business).collect();
        info!(count = businesses.len(), "loaded businesses");
        Ok(businesses)
    }

    /// A missing business is `Ok(None)`, not an error.
    #[instrument(skip(self))]
    pub async fn fetch_business_by_id(&self, id: &str) -> Result<Option<Business>> {
        let doc = self.docs.get(Collection::Businesses, id).await?;
        if doc.is_none() {
            info!(id, "business not found");
        }
        Ok(doc.as_ref().map(decode_business))
    }

    /// Upserts the event. `created_at` is kept from an existing document and
    /// only set on the first write; `updated_at` is refreshed every time.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn save_event(&self, event: &Event) -> Result<Event> {
        self.write_event(Collection::Events, event).await
    }

    /// Stores an event whose video is still being transcoded. It stays out of
    /// the public listings until promoted.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn save_pending_event(&self, event: &Event) -> Result<Event> {
        self.write_event(Collection::PendingEvents, event).await
    }

    async fn write_event(&self, collection: Collection, event: &Event) -> Result<Event> {
        let now = stored_precision(Utc::now());
        let created_at = self
            .docs
            .get(collection, &event.id)
            .await?
            .and_then(|doc| doc.timestamp("createdAt"))
            .unwrap_or(now);

        let mut saved = event.clone();
        saved.date = stored_precision(saved.date);
        saved.created_at = Some(created_at);
        saved.updated_at = Some(now);

        self.docs
            .set(collection, &saved.id, event_fields(&saved))
            .await?;
        info!(%collection, "event saved");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn fetch_pending_events_for_business(&self, business_id: &str) -> Result<Vec<Event>> {
        let docs = self
            .docs
            .query(
                Collection::PendingEvents,
                Query::new().where_eq("businessId", Value::string(business_id)),
            )
            .await?;
        let mut events = decode_events(docs);
        events.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(events)
    }

    /// Moves a pending event into the live collection with its video replaced
    /// by the transcoded one. Returns `false` when no such pending event exists.
    #[instrument(skip(self))]
    pub async fn promote_pending_event(&self, id: &str, video_url: &str) -> Result<bool> {
        let Some(doc) = self.docs.get(Collection::PendingEvents, id).await? else {
            info!("pending event not found");
            return Ok(false);
        };

        let mut event = decode_event(&doc).map_err(anyhow::Error::from)?;
        event.media = Some(Media::Video(video_url.to_string()));
        event.updated_at = Some(stored_precision(Utc::now()));

        self.docs
            .set(Collection::Events, id, event_fields(&event))
            .await?;
        self.docs.delete(Collection::PendingEvents, id).await?;
        info!("pending event promoted");
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn delete_event(&self, id: &str) -> Result<()> {
        self.docs.delete(Collection::Events, id).await?;
        info!("event deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_pending_event(&self, id: &str) -> Result<()> {
        self.docs.delete(Collection::PendingEvents, id).await?;
        info!("pending event deleted");
        Ok(())
    }

    /// Removes the event's media, then the record. Media cleanup never
    /// prevents the record from being deleted.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn delete_event_with_media(&self, event: &Event) -> Result<()> {
        match &event.media {
            Some(Media::Video(url)) => {
                self.delete_video_blobs(url).await;
            }
            Some(Media::Image(url)) => {
                self.delete_blob(url).await;
            }
            None => {}
        }
        self.delete_event(&event.id).await
    }

    #[instrument(skip(self, business), fields(business_id = %business.id))]
    pub async fn save_business(&self, business: &Business) -> Result<Business> {
        let now = stored_precision(Utc::now());
        let created_at = self
            .docs
            .get(Collection::Businesses, &business.id)
            .await?
            .and_then(|doc| doc.timestamp("createdAt"))
            .unwrap_or(now);

        let mut saved = business.clone();
        saved.created_at = Some(created_at);
        saved.updated_at = Some(now);

        self.docs
            .set(Collection::Businesses, &saved.id, business_fields(&saved))
            .await?;
        info!("business saved");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete_business(&self, id: &str) -> Result<()> {
        self.docs.delete(Collection::Businesses, id).await?;
        info!("business deleted");
        Ok(())
    }

    /// Uploads a local file under the media prefix and resolves to its URL.
    /// Progress values are advisory; only the returned URL means done.
    #[instrument(skip(self, progress))]
    pub async fn upload_blob(
        &self,
        local_path: &Path,
        destination_name: &str,
        progress: Option<ProgressFn>,
    ) -> Result<String> {
        let object_path = format!("{MEDIA_PREFIX}{destination_name}");
        self.blobs.upload(local_path, &object_path, progress).await
    }

    pub async fn delete_blob(&self, url: &str) -> BlobDeletion {
        let outcome = self.blobs.delete(url).await;
        match &outcome {
            BlobDeletion::Failed(reason) => {
                warn!(url, %reason, "could not delete blob, continuing")
            }
            BlobDeletion::NotFound => info!(url, "blob already gone"),
            BlobDeletion::Skipped => info!(url, "not a stored blob, skipping"),
            BlobDeletion::Deleted => info!(url, "blob deleted"),
        }
        outcome
    }

    /// Deletes a video and its transcoding sibling: the original when given
    /// a `_compressed.mp4` URL, the compressed copy otherwise.
    pub async fn delete_video_blobs(&self, url: &str) -> Vec<BlobDeletion> {
        let mut outcomes = vec![self.delete_blob(url).await];

        let sibling = if url.contains("_compressed") {
            Some(url.replacen("_compressed.mp4", ".mp4", 1))
        } else {
            VIDEO_EXTENSION
                .find_iter(url)
                .last()
                .map(|m| format!("{}_compressed.mp4{}", &url[..m.start()], &url[m.end()..]))
        };

        if let Some(sibling) = sibling.filter(|s| s != url) {
            outcomes.push(self.delete_blob(&sibling).await);
        }
        outcomes
    }

    /// Cheap reachability probe against the businesses collection.
    pub async fn check_connection(&self) -> bool {
        match self
            .docs
            .query(Collection::Businesses, Query::new().limit(1))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "remote store unreachable");
                false
            }
        }
    }
}
