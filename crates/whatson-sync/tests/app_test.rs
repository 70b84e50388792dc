use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use whatson_sync::cache::MemoryCache;
use whatson_sync::config::Config;
use whatson_sync::domain::{Event, Interest};
use whatson_sync::error::Result;
use whatson_sync::feed::{matching_interests, upcoming};
use whatson_sync::store::{MemoryBlobStore, MemoryDocumentStore};
use whatson_sync::validation::{validate_business, BusinessDraft, Coordinates, Geocoder};
use whatson_sync::App;

struct AnywhereGeocoder;

#[async_trait]
impl Geocoder for AnywhereGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Vec<Coordinates>> {
        Ok(vec![Coordinates {
            latitude: 0.0,
            longitude: 0.0,
        }])
    }
}

fn setup() -> App {
    let config = Config::from_lookup(|key| match key {
        "FIREBASE_PROJECT_ID" => Some("demo".to_string()),
        "ALLOWED_BUSINESS_CODES" => Some("CAFEX, BREW42".to_string()),
        "CACHE_PATH" => Some("/tmp/whatson-app-test.json".to_string()),
        _ => None,
    })
    .expect("Failed to build config");

    App::with_backends(
        config,
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(MemoryBlobStore::new()),
        Arc::new(MemoryCache::new()),
        Arc::new(AnywhereGeocoder),
    )
}

#[tokio::test]
async fn test_admin_publishes_and_consumer_sees_event() {
    let app = setup();

    let code = app.admin().login("BREW42").await.unwrap();
    let draft = BusinessDraft {
        name: "Stone Brewing".into(),
        address: "4 Station St".into(),
        description: "Small-batch ales.".into(),
        website: "stonebrewing.com".into(),
        tags: "Beer, Pub".into(),
        social_links: String::new(),
    };
    validate_business(&draft, app.geocoder()).await.unwrap();
    app.store()
        .save_business(&draft.into_business(code.clone(), None))
        .await
        .unwrap();

    let mut event = Event::new("E1", code, "Tap Takeover", Utc::now() + Duration::days(2));
    event.tags = vec![Interest::BeerWineSpirits];
    app.store().save_event(&event).await.unwrap();

    app.cache()
        .store_interests(&[Interest::BeerWineSpirits])
        .await
        .unwrap();

    let feed = app.synchronizer().load_combined().await.unwrap();
    let interests = app.cache().interests().await.unwrap();
    let shown = matching_interests(&upcoming(&feed.events, Utc::now()), &interests);

    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].business_name, "Stone Brewing");
    assert_eq!(app.config().allowed_business_codes, vec!["CAFEX", "BREW42"]);
}

#[tokio::test]
async fn test_synchronizer_is_shared() {
    let app = setup();
    let first = app.synchronizer();
    let second = app.synchronizer();

    let _handle = first.start_polling(|_| {});
    assert!(second.is_polling());
    second.stop_polling();
    assert!(!first.is_polling());
}
