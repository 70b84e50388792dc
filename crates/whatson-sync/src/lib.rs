pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod session;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod validation;

use anyhow::Result;
use std::sync::Arc;

use crate::cache::{FileCache, LocalCache, SessionCache};
use crate::config::Config;
use crate::session::AdminSession;
use crate::store::{BlobStore, DocumentStore, FirestoreClient, StorageClient, StoreClient};
use crate::sync::{SyncOptions, Synchronizer};
use crate::validation::{Geocoder, NominatimGeocoder};

/// Everything one app session needs, wired from a [`Config`].
pub struct App {
    config: Config,
    store: StoreClient,
    cache: SessionCache,
    geocoder: Arc<dyn Geocoder>,
    synchronizer: Arc<Synchronizer>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let docs = Arc::new(FirestoreClient::new(http_client.clone(), &config));
        let blobs = Arc::new(StorageClient::new(http_client.clone(), &config));
        let cache = Arc::new(FileCache::open(&config.cache_path).await?);
        let geocoder = Arc::new(NominatimGeocoder::new(
            http_client,
            config.geocoder_url.clone(),
        ));

        Ok(Self::with_backends(config, docs, blobs, cache, geocoder))
    }

    /// Wires the app over explicit backends, e.g. the in-memory ones.
    pub fn with_backends(
        config: Config,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        cache: Arc<dyn LocalCache>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        let store = StoreClient::new(docs, blobs);
        let cache = SessionCache::new(cache);
        let synchronizer = Arc::new(Synchronizer::new(
            store.clone(),
            Some(cache.clone()),
            SyncOptions::from(&config),
        ));

        Self {
            config,
            store,
            cache,
            geocoder,
            synchronizer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn geocoder(&self) -> &dyn Geocoder {
        self.geocoder.as_ref()
    }

    pub fn synchronizer(&self) -> Arc<Synchronizer> {
        self.synchronizer.clone()
    }

    pub fn admin(&self) -> AdminSession {
        AdminSession::new(
            self.cache.clone(),
            self.config.allowed_business_codes.clone(),
        )
    }
}
