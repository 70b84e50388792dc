use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Collection, Direction, Document, DocumentStore, Fields, Query};
use crate::config::Config;
use crate::error::{AppError, Result};

/// [`DocumentStore`] backed by the Firestore REST API.
#[derive(Clone)]
pub struct FirestoreClient {
    client: Client,
    documents_url: String,
    api_key: Option<String>,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Fields,
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        let id = raw.name.rsplit('/').next().unwrap_or_default().to_string();
        Document::new(id, raw.fields)
    }
}

#[derive(Deserialize)]
struct RunQueryItem {
    document: Option<RawDocument>,
}

impl FirestoreClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.firestore_url.trim_end_matches('/'),
                config.project_id
            ),
            api_key: config.api_key.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn document_url(&self, collection: Collection, id: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.documents_url, collection.as_str()))
            .map_err(AppError::remote)?;
        url.path_segments_mut()
            .map_err(|_| AppError::remote("document url cannot hold a path"))?
            .push(id);
        Ok(self.with_key(url))
    }

    fn run_query_url(&self) -> Result<Url> {
        let url = Url::parse(&format!("{}:runQuery", self.documents_url)).map_err(AppError::remote)?;
        Ok(self.with_key(url))
    }

    fn with_key(&self, mut url: Url) -> Url {
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        url
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }

    async fn handle_response<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::remote(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<serde_json::Value>(&body) {
                if let Some(error) = err.get("error") {
                    let code = error
                        .get("status")
                        .and_then(|c| c.as_str())
                        .unwrap_or("UNKNOWN");
                    let message = error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error");
                    return Err(AppError::remote(format!("{}: {}", code, message)));
                }
            }
            return Err(AppError::remote(format!(
                "request failed with status {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::remote(format!("failed to parse response: {e}")))
    }
}

fn structured_query(collection: Collection, query: &Query) -> serde_json::Value {
    let mut structured = json!({
        "from": [{ "collectionId": collection.as_str() }],
    });

    if let Some((field, value)) = &query.filter {
        structured["where"] = json!({
            "fieldFilter": {
                "field": { "fieldPath": field },
                "op": "EQUAL",
                "value": value,
            }
        });
    }

    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured["orderBy"] = json!([{
            "field": { "fieldPath": field },
            "direction": direction,
        }]);
    }

    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }

    json!({ "structuredQuery": structured })
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn query(&self, collection: Collection, query: Query) -> Result<Vec<Document>> {
        debug!(%collection, ?query, "running query");
        let req = self
            .client
            .post(self.run_query_url()?)
            .json(&structured_query(collection, &query));

        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| AppError::remote(format!("query request failed: {e}")))?;
        let items: Vec<RunQueryItem> = self.handle_response(resp).await?;

        Ok(items
            .into_iter()
            .filter_map(|item| item.document)
            .map(Document::from)
            .collect())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        debug!(%collection, id, "fetching document");
        let req = self.client.get(self.document_url(collection, id)?);
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| AppError::remote(format!("get request failed: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: RawDocument = self.handle_response(resp).await?;
        Ok(Some(raw.into()))
    }

    async fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<()> {
        debug!(%collection, id, "writing document");
        let req = self
            .client
            .patch(self.document_url(collection, id)?)
            .json(&json!({ "fields": fields }));
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| AppError::remote(format!("write request failed: {e}")))?;

        let _: serde_json::Value = self.handle_response(resp).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        debug!(%collection, id, "deleting document");
        let req = self.client.delete(self.document_url(collection, id)?);
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| AppError::remote(format!("delete request failed: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let _: serde_json::Value = self.handle_response(resp).await?;
        Ok(())
    }
}
