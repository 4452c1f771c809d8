//! API client module for the hosted media backend.
//!
//! The backend exposes three surfaces: a PostgREST-style row API for the
//! `media_items` table, an object storage API for the media blobs, and an RPC
//! endpoint for atomic counter updates. [`Backend`] abstracts all three so the
//! gallery layer can run against [`ApiClient`] or an in-memory double.

mod model;
mod query;

pub use model::{
    Category, Comment, MediaItem, MediaKind, MediaPatch, NewMediaRow, Tags, Visibility,
    ALL_CATEGORIES,
};
pub use query::{parse_content_range, Column, CountMode, Filter, Order, RowQuery};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub const DEFAULT_BUCKET: &str = "media";
pub const DEFAULT_TABLE: &str = "media_items";

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Request Error: {0}")]
    RequestError(String),
    #[error("Backend Error ({status}): {message}")]
    BackendError { status: u16, message: String },
    #[error("Decode Error: {0}")]
    DecodeError(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Invalid Path: {0}")]
    InvalidPath(String),
}

/// One page of rows plus the total matching count when the backend reported it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowPage {
    pub rows: Vec<MediaItem>,
    pub total: Option<u64>,
}

/// The hosted data service as seen by the gallery.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, query: &RowQuery) -> Result<RowPage, ApiClientError>;

    /// Insert a row and return the stored representation.
    async fn insert(&self, row: &NewMediaRow) -> Result<MediaItem, ApiClientError>;

    /// Update the row with the given id and return the stored representation.
    async fn update(&self, id: &str, patch: &MediaPatch) -> Result<MediaItem, ApiClientError>;

    async fn delete_row(&self, id: &str) -> Result<(), ApiClientError>;

    /// Server-side atomic `downloads = downloads + 1`.
    async fn increment_downloads(&self, id: &str) -> Result<(), ApiClientError>;

    async fn upload_blob(
        &self,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), ApiClientError>;

    /// Public URL under which an uploaded blob is served.
    fn public_url(&self, path: &str) -> Result<String, ApiClientError>;

    async fn remove_blob(&self, path: &str) -> Result<(), ApiClientError>;
}

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub bucket: String,
    pub table: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        ApiClient {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn rows_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, self.config.table)
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url,
            self.config.bucket,
            encode_path(path)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiClientError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiClientError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiClientError::BackendError { status, message });
        }
        Ok(response)
    }

    async fn single_row(&self, response: Response, id: &str) -> Result<MediaItem, ApiClientError> {
        let rows = response
            .json::<Vec<MediaItem>>()
            .await
            .map_err(|e| ApiClientError::DecodeError(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiClientError::NotFound(id.to_string()))
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: String,
        body: &T,
    ) -> Result<Response, ApiClientError> {
        self.send(
            self.client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .json(body),
        )
        .await
    }
}

#[async_trait]
impl Backend for ApiClient {
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    async fn select(&self, query: &RowQuery) -> Result<RowPage, ApiClientError> {
        let mut request = self.client.get(self.rows_url()).query(&query.to_params());
        if let Some(prefer) = query.prefer_header() {
            request = request.header("Prefer", prefer);
        }
        let response = self.send(request).await?;

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows = response
            .json::<Vec<MediaItem>>()
            .await
            .map_err(|e| ApiClientError::DecodeError(e.to_string()))?;

        tracing::debug!(rows = rows.len(), ?total, "Fetched media rows");
        Ok(RowPage { rows, total })
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, row)))]
    async fn insert(&self, row: &NewMediaRow) -> Result<MediaItem, ApiClientError> {
        let response = self
            .send(
                self.client
                    .post(self.rows_url())
                    .header(CONTENT_TYPE, "application/json")
                    .header("Prefer", "return=representation")
                    .json(row),
            )
            .await?;
        self.single_row(response, "inserted row").await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, patch)))]
    async fn update(&self, id: &str, patch: &MediaPatch) -> Result<MediaItem, ApiClientError> {
        let response = self
            .send(
                self.client
                    .patch(self.rows_url())
                    .query(&[("id", format!("eq.{}", id))])
                    .header(CONTENT_TYPE, "application/json")
                    .header("Prefer", "return=representation")
                    .json(patch),
            )
            .await?;
        self.single_row(response, id).await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    async fn delete_row(&self, id: &str) -> Result<(), ApiClientError> {
        self.send(
            self.client
                .delete(self.rows_url())
                .query(&[("id", format!("eq.{}", id))]),
        )
        .await?;
        Ok(())
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    async fn increment_downloads(&self, id: &str) -> Result<(), ApiClientError> {
        let url = format!("{}/rest/v1/rpc/increment_downloads", self.config.base_url);
        self.post_json(url, &json!({ "item_id": id })).await?;
        Ok(())
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, data)))]
    async fn upload_blob(
        &self,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), ApiClientError> {
        if path.is_empty() {
            return Err(ApiClientError::InvalidPath("empty storage path".into()));
        }
        self.send(
            self.client
                .post(self.object_url(path))
                .header(CONTENT_TYPE, content_type)
                .body(data),
        )
        .await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> Result<String, ApiClientError> {
        if path.is_empty() {
            return Err(ApiClientError::InvalidPath("empty storage path".into()));
        }
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url,
            self.config.bucket,
            encode_path(path)
        ))
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    async fn remove_blob(&self, path: &str) -> Result<(), ApiClientError> {
        let url = format!(
            "{}/storage/v1/object/{}",
            self.config.base_url, self.config.bucket
        );
        self.send(
            self.client
                .delete(url)
                .header(CONTENT_TYPE, "application/json")
                .json(&json!({ "prefixes": [path] })),
        )
        .await?;
        Ok(())
    }
}

/// Percent-encode each segment of a storage path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_encodes_segments() {
        let client = ApiClient::new(ClientConfig::new("https://x.example.co/", "key"));
        let url = client.public_url("albums/my photo.jpg").unwrap();
        assert_eq!(
            url,
            "https://x.example.co/storage/v1/object/public/media/albums/my%20photo.jpg"
        );
        assert!(client.public_url("").is_err());
    }

    #[test]
    fn test_client_config_defaults() {
        let cfg = ClientConfig::new("http://localhost:54321///", "anon");
        assert_eq!(cfg.base_url, "http://localhost:54321");
        assert_eq!(cfg.bucket, DEFAULT_BUCKET);
        assert_eq!(cfg.table, DEFAULT_TABLE);
    }
}
