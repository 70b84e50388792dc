use std::path::Path;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::{percent, BlobDeletion, BlobStore, ProgressFn};
use crate::config::Config;
use crate::error::{AppError, Result};

const CHUNK_SIZE: usize = 256 * 1024;

/// Location of an object inside the storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub path: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// Extracts bucket and object path from a download URL of the form
    /// `.../b/{bucket}/o/{percent-encoded path}`.
    pub fn parse(url: &str) -> Option<Self> {
        let url = Url::parse(url).ok()?;
        let segments: Vec<&str> = url.path_segments()?.collect();
        let b = segments.iter().position(|s| *s == "b")?;
        let bucket = segments.get(b + 1)?;
        if segments.get(b + 2) != Some(&"o") {
            return None;
        }
        let encoded = segments.get(b + 3..)?.join("/");
        let path = decode_component(&encoded)?;
        if bucket.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self::new(*bucket, path))
    }

    pub fn object_url(&self, base: &str) -> Result<Url> {
        let mut url = Url::parse(base).map_err(AppError::remote)?;
        url.path_segments_mut()
            .map_err(|_| AppError::remote("storage url cannot hold a path"))?
            .pop_if_empty()
            .extend(["b", self.bucket.as_str(), "o", self.path.as_str()]);
        Ok(url)
    }

    pub fn download_url(&self, base: &str, token: Option<&str>) -> Result<Url> {
        let mut url = self.object_url(base)?;
        url.query_pairs_mut().append_pair("alt", "media");
        if let Some(token) = token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

fn decode_component(encoded: &str) -> Option<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

pub(crate) fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// [`BlobStore`] backed by the Firebase Storage REST API.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    bucket: String,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    bucket: Option<String>,
    download_tokens: Option<String>,
}

struct ChunkState {
    file: File,
    sent: usize,
    total: usize,
    progress: Option<ProgressFn>,
}

async fn next_chunk(mut state: ChunkState) -> std::io::Result<Option<(Vec<u8>, ChunkState)>> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let n = state.file.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    state.sent += n;
    if let Some(report) = &state.progress {
        report(percent(state.sent, state.total));
    }
    Ok(Some((buf, state)))
}

impl StorageClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.storage_url.trim_end_matches('/').to_string(),
            bucket: config.storage_bucket.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }
}

#[async_trait]
impl BlobStore for StorageClient {
    async fn upload(
        &self,
        local_path: &Path,
        object_path: &str,
        progress: Option<ProgressFn>,
    ) -> Result<String> {
        let file = File::open(local_path)
            .await
            .map_err(|e| AppError::upload(format!("cannot open {}: {e}", local_path.display())))?;
        let total = file
            .metadata()
            .await
            .map_err(|e| AppError::upload(format!("cannot stat {}: {e}", local_path.display())))?
            .len() as usize;

        if let Some(report) = &progress {
            report(0);
        }

        let mut url = Url::parse(&format!("{}/b/{}/o", self.base_url, self.bucket))
            .map_err(AppError::upload)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object_path);

        debug!(object_path, bytes = total, "uploading blob");
        let state = ChunkState {
            file,
            sent: 0,
            total,
            progress: progress.clone(),
        };
        let body = reqwest::Body::wrap_stream(futures::stream::try_unfold(state, next_chunk));

        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type_for(object_path))
            .header(CONTENT_LENGTH, total)
            .body(body);
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| AppError::upload(format!("upload request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AppError::upload(format!("failed to read upload response: {e}")))?;
        if !status.is_success() {
            return Err(AppError::upload(format!(
                "upload failed with status {}: {}",
                status, text
            )));
        }

        let uploaded: UploadResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::upload(format!("failed to parse upload response: {e}")))?;
        let token = uploaded
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|t| !t.is_empty());
        let object = ObjectRef::new(
            uploaded.bucket.unwrap_or_else(|| self.bucket.clone()),
            uploaded.name,
        );
        let download_url = object.download_url(&self.base_url, token)?;

        if let Some(report) = &progress {
            report(100);
        }
        info!(object_path, "blob uploaded");
        Ok(download_url.into())
    }

    async fn delete(&self, url: &str) -> BlobDeletion {
        let Some(object) = ObjectRef::parse(url) else {
            debug!(url, "not a storage url, skipping delete");
            return BlobDeletion::Skipped;
        };

        let object_url = match object.object_url(&self.base_url) {
            Ok(u) => u,
            Err(e) => return BlobDeletion::Failed(e.to_string()),
        };

        let req = self.client.delete(object_url);
        let outcome = match self.authorize(req).send().await {
            Ok(resp) if resp.status().is_success() => BlobDeletion::Deleted,
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => BlobDeletion::NotFound,
            Ok(resp) => BlobDeletion::Failed(format!("delete returned {}", resp.status())),
            Err(e) => BlobDeletion::Failed(e.to_string()),
        };

        match &outcome {
            BlobDeletion::Failed(reason) => {
                warn!(path = %object.path, %reason, "blob delete failed")
            }
            other => debug!(path = %object.path, ?other, "blob delete finished"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://firebasestorage.googleapis.com/v0";

    #[test]
    fn parses_download_url() {
        let url = "https://firebasestorage.googleapis.com/v0/b/byron.appspot.com/o/events%2Fevent_1700000000.mp4?alt=media&token=abc";
        let object = ObjectRef::parse(url).unwrap();
        assert_eq!(object.bucket, "byron.appspot.com");
        assert_eq!(object.path, "events/event_1700000000.mp4");
    }

    #[test]
    fn download_url_round_trips() {
        let object = ObjectRef::new("bucket", "events/live music+1.jpg");
        let url = object.download_url(BASE, Some("tok")).unwrap();
        assert!(url.as_str().contains("/o/events%2Flive%20music+1.jpg"));
        assert_eq!(ObjectRef::parse(url.as_str()), Some(object));
    }

    #[test]
    fn decodes_reserved_characters_literally() {
        let url = format!("{BASE}/b/bucket/o/events%2Fa+b%26c%3Dd%20e.jpg?alt=media");
        let object = ObjectRef::parse(&url).unwrap();
        assert_eq!(object.path, "events/a+b&c=d e.jpg");
        assert_eq!(ObjectRef::parse(&format!("{BASE}/b/bucket/o/%FF%FE")), None);
    }

    #[test]
    fn rejects_foreign_urls() {
        assert_eq!(ObjectRef::parse("file:///data/user/0/event_1.jpg"), None);
        assert_eq!(ObjectRef::parse("https://example.com/images/a.jpg"), None);
        assert_eq!(ObjectRef::parse("not a url"), None);
    }

    #[test]
    fn guesses_content_type() {
        assert_eq!(content_type_for("events/a.MOV"), "video/quicktime");
        assert_eq!(content_type_for("events/a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("events/a"), "application/octet-stream");
    }
}
