use std::collections::BTreeSet;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use percent_encoding::percent_decode_str;
use serde_json::json;
use whatson_sync::config::Config;
use whatson_sync::domain::{Event, Media};
use whatson_sync::store::{
    BlobDeletion, BlobStore, Collection, MemoryDocumentStore, ProgressFn, StorageClient,
    StoreClient,
};

const BUCKET: &str = "demo.appspot.com";

/// Stores object names only; enough to check uploads and delete outcomes.
#[derive(Default)]
struct FakeStorage {
    objects: Mutex<BTreeSet<String>>,
    uploads: Mutex<Vec<(String, Option<String>, usize)>>,
    deletes: Mutex<Vec<String>>,
    failing: AtomicBool,
}

fn object_name(path: &str) -> Option<String> {
    let encoded = path.split_once("/o/")?.1;
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|name| name.into_owned())
}

async fn handle(
    State(fake): State<Arc<FakeStorage>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if fake.failing.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "backend error").into_response();
    }

    match method {
        Method::POST => {
            let name = url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
                .find(|(key, _)| key == "name")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            fake.uploads
                .lock()
                .unwrap()
                .push((name.clone(), content_type, body.len()));
            fake.objects.lock().unwrap().insert(name.clone());
            Json(json!({
                "name": name,
                "bucket": BUCKET,
                "downloadTokens": "tok-1,tok-2",
            }))
            .into_response()
        }
        Method::DELETE => {
            let Some(name) = object_name(uri.path()) else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            fake.deletes.lock().unwrap().push(name.clone());
            if fake.objects.lock().unwrap().remove(&name) {
                StatusCode::NO_CONTENT.into_response()
            } else {
                (StatusCode::NOT_FOUND, "No such object").into_response()
            }
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn start_fake() -> (Arc<FakeStorage>, StorageClient, String) {
    let fake = Arc::new(FakeStorage::default());
    let app = Router::new().fallback(handle).with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = format!("http://{addr}/v0");
    let config = Config::from_lookup(|key| match key {
        "FIREBASE_PROJECT_ID" => Some("demo".to_string()),
        "FIREBASE_STORAGE_BUCKET" => Some(BUCKET.to_string()),
        "FIREBASE_STORAGE_BASE_URL" => Some(base.clone()),
        "CACHE_PATH" => Some("/tmp/whatson-storage-test.json".to_string()),
        _ => None,
    })
    .unwrap();

    (fake, StorageClient::new(reqwest::Client::new(), &config), base)
}

fn temp_media(bytes: usize, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(&vec![3u8; bytes]).unwrap();
    file.flush().unwrap();
    file
}

fn stored_url(base: &str, name: &str) -> String {
    format!(
        "{base}/b/{BUCKET}/o/{}?alt=media&token=tok-1",
        name.replace('/', "%2F")
    )
}

#[tokio::test]
async fn test_upload_streams_file_and_returns_tokenized_url() {
    let (fake, client, base) = start_fake().await;
    let file = temp_media(600 * 1024, ".jpg");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: ProgressFn = Arc::new(move |p: u8| sink.lock().unwrap().push(p));

    let url = client
        .upload(file.path(), "events/poster.jpg", Some(progress))
        .await
        .unwrap();

    assert_eq!(url, stored_url(&base, "events/poster.jpg"));

    let uploads = fake.uploads.lock().unwrap().clone();
    assert_eq!(
        uploads,
        vec![(
            "events/poster.jpg".to_string(),
            Some("image/jpeg".to_string()),
            600 * 1024
        )]
    );

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.len() >= 4, "expected per-chunk progress, got {seen:?}");
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_delete_maps_missing_object_to_not_found() {
    let (fake, client, base) = start_fake().await;
    let file = temp_media(1024, ".jpg");
    let url = client.upload(file.path(), "events/a.jpg", None).await.unwrap();

    assert_eq!(client.delete(&url).await, BlobDeletion::Deleted);
    assert_eq!(client.delete(&url).await, BlobDeletion::NotFound);
    assert_eq!(
        client.delete(&stored_url(&base, "events/never.jpg")).await,
        BlobDeletion::NotFound
    );
    assert_eq!(
        client.delete("file:///data/user/0/event_1.jpg").await,
        BlobDeletion::Skipped
    );
    assert_eq!(fake.deletes.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_video_delete_reports_each_sibling() {
    let (_fake, client, _base) = start_fake().await;
    let store = StoreClient::new(Arc::new(MemoryDocumentStore::new()), Arc::new(client));
    let file = temp_media(2048, ".mp4");

    let url = store
        .upload_blob(file.path(), "event_1.mp4", None)
        .await
        .unwrap();

    let outcomes = store.delete_video_blobs(&url).await;
    assert_eq!(outcomes, vec![BlobDeletion::Deleted, BlobDeletion::NotFound]);
}

#[tokio::test]
async fn test_server_error_still_deletes_the_event() {
    let (fake, client, base) = start_fake().await;
    let docs = Arc::new(MemoryDocumentStore::new());
    let client = Arc::new(client);
    let store = StoreClient::new(docs.clone(), client.clone());

    let file = temp_media(1024, ".jpg");
    let url = store.upload_blob(file.path(), "poster.jpg", None).await.unwrap();
    assert_eq!(url, stored_url(&base, "events/poster.jpg"));

    let mut event = Event::new("E1", "B1", "Open Mic", Utc::now() + Duration::days(1));
    event.media = Some(Media::Image(url.clone()));
    store.save_event(&event).await.unwrap();

    fake.failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        client.delete(&url).await,
        BlobDeletion::Failed(reason) if reason.contains("500")
    ));

    store.delete_event_with_media(&event).await.unwrap();
    assert_eq!(docs.len(Collection::Events).await, 0);
    assert!(store.fetch_all_events().await.unwrap().is_empty());
    assert!(fake.objects.lock().unwrap().contains("events/poster.jpg"));
}
