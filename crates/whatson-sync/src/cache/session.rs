use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::LocalCache;
use crate::domain::{Business, Event, Interest};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
    BusinessCode,
    IsBusiness,
    Businesses,
    Events,
    UserInterests,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessCode => "businessCode",
            Self::IsBusiness => "isBusiness",
            Self::Businesses => "businesses",
            Self::Events => "events",
            Self::UserInterests => "userInterests",
        }
    }
}

/// Typed view of the app's cached session state and list snapshots.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<dyn LocalCache>,
}

impl SessionCache {
    pub fn new(inner: Arc<dyn LocalCache>) -> Self {
        Self { inner }
    }

    pub async fn business_code(&self) -> Result<Option<String>> {
        Ok(self
            .inner
            .get(CacheKey::BusinessCode.as_str())
            .await?
            .filter(|code| !code.is_empty()))
    }

    pub async fn set_business_code(&self, code: &str) -> Result<()> {
        self.inner
            .set(CacheKey::BusinessCode.as_str(), code.to_string())
            .await?;
        self.inner
            .set(CacheKey::IsBusiness.as_str(), "true".to_string())
            .await
    }

    pub async fn clear_business_code(&self) -> Result<()> {
        self.inner.remove(CacheKey::BusinessCode.as_str()).await?;
        self.inner.remove(CacheKey::IsBusiness.as_str()).await
    }

    pub async fn is_business(&self) -> Result<bool> {
        Ok(self.inner.get(CacheKey::IsBusiness.as_str()).await?.as_deref() == Some("true"))
    }

    pub async fn businesses(&self) -> Result<Vec<Business>> {
        Ok(self.read_json(CacheKey::Businesses).await?.unwrap_or_default())
    }

    pub async fn store_businesses(&self, businesses: &[Business]) -> Result<()> {
        self.write_json(CacheKey::Businesses, &businesses).await
    }

    pub async fn events(&self) -> Result<Vec<Event>> {
        Ok(self.read_json(CacheKey::Events).await?.unwrap_or_default())
    }

    pub async fn store_events(&self, events: &[Event]) -> Result<()> {
        self.write_json(CacheKey::Events, &events).await
    }

    /// Selected interests. Entries no longer in the vocabulary are dropped.
    pub async fn interests(&self) -> Result<Vec<Interest>> {
        let raw: Vec<String> = self
            .read_json(CacheKey::UserInterests)
            .await?
            .unwrap_or_default();
        Ok(raw.iter().filter_map(|s| s.parse().ok()).collect())
    }

    pub async fn store_interests(&self, interests: &[Interest]) -> Result<()> {
        self.write_json(CacheKey::UserInterests, &interests).await
    }

    async fn read_json<T: DeserializeOwned>(&self, key: CacheKey) -> Result<Option<T>> {
        let Some(raw) = self.inner.get(key.as_str()).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "ignoring corrupt cache entry");
                Ok(None)
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.inner.set(key.as_str(), raw).await
    }
}
