//! Combined loading and background polling of the event feed.

mod poller;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::AbortHandle;
use tracing::{info, instrument, warn};

use crate::cache::SessionCache;
use crate::config::{ChangeDetection, Config};
use crate::domain::{Business, Event, EventWithBusiness};
use crate::error::Result;
use crate::store::{StoreClient, UNKNOWN_BUSINESS};

pub use poller::{PollHandle, PollState, MIN_POLL_INTERVAL};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub interval: Duration,
    pub change_detection: ChangeDetection,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            change_detection: ChangeDetection::Count,
        }
    }
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.poll_interval,
            change_detection: config.change_detection,
        }
    }
}

/// Events with their business names resolved, plus the business list used
/// to resolve them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedFeed {
    pub events: Vec<EventWithBusiness>,
    pub businesses: Vec<Business>,
}

/// Attaches each event's business name from the given list. Unknown owners
/// get [`UNKNOWN_BUSINESS`].
pub fn attach_business_names(events: Vec<Event>, businesses: &[Business]) -> Vec<EventWithBusiness> {
    let names: HashMap<&str, &str> = businesses
        .iter()
        .map(|b| (b.id.as_str(), b.name.as_str()))
        .collect();

    events
        .into_iter()
        .map(|event| {
            let business_name = names
                .get(event.business_id.as_str())
                .copied()
                .unwrap_or(UNKNOWN_BUSINESS)
                .to_string();
            EventWithBusiness {
                event,
                business_name,
            }
        })
        .collect()
}

/// Owns the polling state for one app session. Create one and share it by
/// reference with everything that needs the feed.
pub struct Synchronizer {
    store: StoreClient,
    cache: Option<SessionCache>,
    options: SyncOptions,
    state: Arc<AsyncMutex<PollState>>,
    poller: Mutex<Option<AbortHandle>>,
}

impl Synchronizer {
    pub fn new(store: StoreClient, cache: Option<SessionCache>, options: SyncOptions) -> Self {
        Self {
            store,
            cache,
            options,
            state: Arc::new(AsyncMutex::new(PollState::default())),
            poller: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Fetches events and businesses concurrently and joins them.
    #[instrument(skip(self))]
    pub async fn load_combined(&self) -> Result<CombinedFeed> {
        let (events, businesses) = tokio::try_join!(
            self.store.fetch_all_events(),
            self.store.fetch_all_businesses()
        )?;

        self.state
            .lock()
            .await
            .observe(&events, self.options.change_detection);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store_events(&events).await {
                warn!(error = %e, "could not cache events");
            }
            if let Err(e) = cache.store_businesses(&businesses).await {
                warn!(error = %e, "could not cache businesses");
            }
        }

        let events = attach_business_names(events, &businesses);
        info!(
            events = events.len(),
            businesses = businesses.len(),
            "combined feed loaded"
        );
        Ok(CombinedFeed { events, businesses })
    }

    /// The last snapshots written to the local cache, for a first paint
    /// before the network answers.
    pub async fn cached_combined(&self) -> Result<CombinedFeed> {
        let Some(cache) = &self.cache else {
            return Ok(CombinedFeed::default());
        };
        let businesses = cache.businesses().await?;
        let events = attach_business_names(cache.events().await?, &businesses);
        Ok(CombinedFeed { events, businesses })
    }

    /// Manual refresh. Updates the state the poller compares against.
    pub async fn refresh_events(&self) -> Result<Vec<Event>> {
        let events = self.store.fetch_all_events().await?;
        self.state
            .lock()
            .await
            .observe(&events, self.options.change_detection);
        Ok(events)
    }

    /// Pull-to-refresh probe: whether new events showed up since the last
    /// observation, and the current count. A failed fetch reports no news.
    pub async fn check_for_new_events(&self) -> (bool, usize) {
        match self.store.fetch_all_events().await {
            Ok(events) => {
                let has_new = self
                    .state
                    .lock()
                    .await
                    .observe(&events, self.options.change_detection);
                (has_new, events.len())
            }
            Err(e) => {
                warn!(error = %e, "could not check for new events");
                (false, self.state.lock().await.last_count())
            }
        }
    }

    /// Starts the background poller, replacing any poller already running.
    /// The callback receives the whole refreshed list when new events appear.
    pub fn start_polling<F>(&self, on_new_events: F) -> PollHandle
    where
        F: Fn(Vec<Event>) + Send + Sync + 'static,
    {
        let handle = poller::spawn(
            self.store.clone(),
            self.state.clone(),
            self.options,
            on_new_events,
        );

        let mut current = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.replace(handle.abort_handle()) {
            previous.abort();
        }
        info!(interval_secs = self.options.interval.as_secs(), "polling started");
        handle
    }

    /// Stops the running poller, if any.
    pub fn stop_polling(&self) {
        let mut current = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = current.take() {
            handle.abort();
            info!("polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
