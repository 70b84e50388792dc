use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use whatson_sync::cache::{MemoryCache, SessionCache};
use whatson_sync::config::ChangeDetection;
use whatson_sync::domain::{Business, Event, Interest};
use whatson_sync::error::{AppError, Result};
use whatson_sync::store::document::event_fields;
use whatson_sync::store::{
    Collection, Document, DocumentStore, Fields, MemoryBlobStore, MemoryDocumentStore, Query,
    StoreClient, UNKNOWN_BUSINESS,
};
use whatson_sync::sync::{SyncOptions, Synchronizer, MIN_POLL_INTERVAL};

const INTERVAL: Duration = Duration::from_secs(30);

/// Answers each events listing with the next scripted step: a number of
/// events, or a failure. The last step repeats once the script runs out.
struct ScriptedStore {
    steps: Mutex<VecDeque<Option<usize>>>,
    last: Mutex<Option<usize>>,
}

impl ScriptedStore {
    fn new(steps: &[Option<usize>]) -> Self {
        Self {
            steps: Mutex::new(steps.iter().copied().collect()),
            last: Mutex::new(Some(0)),
        }
    }

    fn next_step(&self) -> Option<usize> {
        let mut steps = self.steps.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = steps.pop_front() {
            *last = step;
        }
        *last
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn query(&self, collection: Collection, _query: Query) -> Result<Vec<Document>> {
        if collection != Collection::Events {
            return Ok(Vec::new());
        }
        let count = self
            .next_step()
            .ok_or_else(|| AppError::RemoteUnavailable("scripted outage".into()))?;
        Ok((0..count)
            .map(|i| {
                let event = Event::new(format!("E{i}"), "B1", "Scripted", Utc::now());
                Document::new(event.id.clone(), event_fields(&event))
            })
            .collect())
    }

    async fn get(&self, _collection: Collection, _id: &str) -> Result<Option<Document>> {
        Ok(None)
    }

    async fn set(&self, _collection: Collection, _id: &str, _fields: Fields) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _collection: Collection, _id: &str) -> Result<()> {
        Ok(())
    }
}

fn scripted_sync(steps: &[Option<usize>], detection: ChangeDetection) -> Synchronizer {
    let store = StoreClient::new(
        Arc::new(ScriptedStore::new(steps)),
        Arc::new(MemoryBlobStore::new()),
    );
    Synchronizer::new(
        store,
        None,
        SyncOptions {
            interval: INTERVAL,
            change_detection: detection,
        },
    )
}

fn recorder() -> (Arc<Mutex<Vec<usize>>>, impl Fn(Vec<Event>) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |events: Vec<Event>| {
        sink.lock().unwrap().push(events.len())
    })
}

fn memory_setup() -> (Arc<MemoryDocumentStore>, StoreClient, SessionCache) {
    let docs = Arc::new(MemoryDocumentStore::new());
    let store = StoreClient::new(docs.clone(), Arc::new(MemoryBlobStore::new()));
    let cache = SessionCache::new(Arc::new(MemoryCache::new()));
    (docs, store, cache)
}

fn cafe_x() -> Business {
    let mut business = Business::new("B1", "Cafe X");
    business.address = "1 Main St".into();
    business.tags = vec!["Food".into()];
    business
}

fn live_music(id: &str, business_id: &str) -> Event {
    let mut event = Event::new(
        id,
        business_id,
        "Live Music",
        Utc::now() + ChronoDuration::days(7),
    );
    event.tags = vec![Interest::LiveMusic];
    event
}

// =============================================================================
// COMBINED LOAD
// =============================================================================

#[tokio::test]
async fn test_combined_load_attaches_business_name() {
    let (_docs, store, cache) = memory_setup();
    store.save_business(&cafe_x()).await.unwrap();
    store.save_event(&live_music("E1", "B1")).await.unwrap();

    let sync = Synchronizer::new(store, Some(cache), SyncOptions::default());
    let feed = sync.load_combined().await.unwrap();

    assert_eq!(feed.events.len(), 1);
    assert_eq!(feed.events[0].event.id, "E1");
    assert_eq!(feed.events[0].business_name, "Cafe X");
    assert_eq!(feed.businesses.len(), 1);
}

#[tokio::test]
async fn test_combined_load_falls_back_for_unknown_business() {
    let (_docs, store, _cache) = memory_setup();
    store.save_business(&cafe_x()).await.unwrap();
    store.save_event(&live_music("E1", "B1")).await.unwrap();
    store.save_event(&live_music("E2", "GONE")).await.unwrap();

    let sync = Synchronizer::new(store, None, SyncOptions::default());
    let feed = sync.load_combined().await.unwrap();

    let orphan = feed
        .events
        .iter()
        .find(|e| e.event.id == "E2")
        .expect("orphan event kept");
    assert_eq!(orphan.business_name, UNKNOWN_BUSINESS);
}

#[tokio::test]
async fn test_combined_load_reports_remote_failure() {
    let (docs, store, _cache) = memory_setup();
    docs.set_offline(true);

    let sync = Synchronizer::new(store, None, SyncOptions::default());
    let err = sync.load_combined().await.unwrap_err();
    assert!(matches!(err, AppError::RemoteUnavailable(_)));
}

#[tokio::test]
async fn test_combined_load_fills_cache_for_first_paint() {
    let (docs, store, cache) = memory_setup();
    store.save_business(&cafe_x()).await.unwrap();
    store.save_event(&live_music("E1", "B1")).await.unwrap();

    let sync = Synchronizer::new(store, Some(cache.clone()), SyncOptions::default());
    let empty = sync.cached_combined().await.unwrap();
    assert!(empty.events.is_empty());

    sync.load_combined().await.unwrap();
    docs.set_offline(true);

    let cached = sync.cached_combined().await.unwrap();
    assert_eq!(cached.events.len(), 1);
    assert_eq!(cached.events[0].business_name, "Cafe X");
    assert_eq!(cache.events().await.unwrap()[0].tags, vec![Interest::LiveMusic]);
}

// =============================================================================
// POLLING
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_polling_fires_once_on_growth() {
    let sync = scripted_sync(
        &[Some(10), Some(10), Some(12), Some(12), Some(9)],
        ChangeDetection::Count,
    );
    sync.load_combined().await.unwrap();

    let (seen, callback) = recorder();
    let handle = sync.start_polling(callback);
    tokio::time::sleep(INTERVAL * 4 + Duration::from_secs(5)).await;
    handle.cancel();

    assert_eq!(*seen.lock().unwrap(), vec![12]);
}

#[tokio::test(start_paused = true)]
async fn test_polling_waits_one_interval_before_first_tick() {
    let sync = scripted_sync(&[Some(3)], ChangeDetection::Count);

    let (seen, callback) = recorder();
    let _handle = sync.start_polling(callback);

    tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
    assert!(seen.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(*seen.lock().unwrap(), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_polling_survives_fetch_errors() {
    let sync = scripted_sync(&[Some(2), None, None, Some(5)], ChangeDetection::Count);
    sync.refresh_events().await.unwrap();

    let (seen, callback) = recorder();
    let handle = sync.start_polling(callback);
    tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(5)).await;

    assert!(handle.is_active());
    assert_eq!(*seen.lock().unwrap(), vec![5]);
    sync.stop_polling();
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_polls_at_the_floor() {
    let store = StoreClient::new(
        Arc::new(ScriptedStore::new(&[Some(1)])),
        Arc::new(MemoryBlobStore::new()),
    );
    let sync = Synchronizer::new(
        store,
        None,
        SyncOptions {
            interval: Duration::ZERO,
            change_detection: ChangeDetection::Count,
        },
    );

    let (seen, callback) = recorder();
    let handle = sync.start_polling(callback);
    tokio::time::sleep(MIN_POLL_INTERVAL * 2 + Duration::from_millis(10)).await;

    assert!(handle.is_active());
    assert!(sync.is_polling());
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    sync.stop_polling();
}

#[tokio::test(start_paused = true)]
async fn test_identifier_policy_reports_replacements() {
    let (docs, store, _cache) = memory_setup();
    store.save_event(&live_music("A", "B1")).await.unwrap();
    store.save_event(&live_music("B", "B1")).await.unwrap();

    let sync = Synchronizer::new(
        store.clone(),
        None,
        SyncOptions {
            interval: INTERVAL,
            change_detection: ChangeDetection::NewIdentifiers,
        },
    );
    sync.refresh_events().await.unwrap();

    let (seen, callback) = recorder();
    let _handle = sync.start_polling(callback);

    store.delete_event("B").await.unwrap();
    store.save_event(&live_music("C", "B1")).await.unwrap();
    assert_eq!(docs.len(Collection::Events).await, 2);

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_starting_again_replaces_previous_poller() {
    let sync = scripted_sync(&[Some(1), Some(2), Some(3), Some(4)], ChangeDetection::Count);

    let (first_seen, first) = recorder();
    let first_handle = sync.start_polling(first);
    let (second_seen, second) = recorder();
    let _second_handle = sync.start_polling(second);

    tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
    assert!(!first_handle.is_active());
    assert!(first_seen.lock().unwrap().is_empty());
    assert_eq!(*second_seen.lock().unwrap(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_and_stop_are_idempotent() {
    let sync = scripted_sync(&[Some(1)], ChangeDetection::Count);

    let (seen, callback) = recorder();
    let handle = sync.start_polling(callback);
    assert!(sync.is_polling());

    handle.cancel();
    handle.cancel();
    sync.stop_polling();
    sync.stop_polling();

    tokio::time::sleep(INTERVAL * 2).await;
    assert!(seen.lock().unwrap().is_empty());
    assert!(!sync.is_polling());
}

#[tokio::test]
async fn test_check_for_new_events() {
    let (docs, store, _cache) = memory_setup();
    store.save_event(&live_music("E1", "B1")).await.unwrap();

    let sync = Synchronizer::new(store.clone(), None, SyncOptions::default());
    sync.refresh_events().await.unwrap();
    assert_eq!(sync.check_for_new_events().await, (false, 1));

    store.save_event(&live_music("E2", "B1")).await.unwrap();
    assert_eq!(sync.check_for_new_events().await, (true, 2));

    docs.set_offline(true);
    assert_eq!(sync.check_for_new_events().await, (false, 2));
}
