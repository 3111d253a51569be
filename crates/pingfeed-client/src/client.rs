//! HTTP client for the pingfeed backend

use crate::error::{ClientError, Result};
use crate::types::*;
use base64::Engine;
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the hosted backend
///
/// Every request carries the project's anon key in the `apikey` header and a
/// bearer token: the session access token once one is set, otherwise the anon
/// key itself.
///
/// # Example
///
/// ```rust,no_run
/// use pingfeed_client::{BackendClient, BackendConfig, Query};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = BackendClient::new(BackendConfig {
///     base_url: "https://project.example.co".into(),
///     anon_key: "public-anon-key".into(),
///     ..Default::default()
/// })?
/// .with_access_token("user-session-token");
///
/// let me = client.get_user().await?;
/// let rows: Vec<serde_json::Value> = client
///     .select("profiles", &Query::new().eq("id", &me.id))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BackendClient {
    config: BackendConfig,
    client: Client,
    access_token: Option<String>,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            config: BackendConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            client,
            access_token: None,
        })
    }

    /// Attach a session access token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    // ==================== Auth API ====================

    /// Resolve the account behind the current access token
    pub async fn get_user(&self) -> Result<AuthUser> {
        if self.access_token.is_none() {
            return Err(ClientError::Unauthorized("no access token".to_string()));
        }

        let url = format!("{}/auth/v1/user", self.config.base_url);
        let response = self.request(Method::GET, &url).send().await?;
        self.handle_response(response).await
    }

    // ==================== Table API ====================

    /// Select all rows matching the query
    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> Result<Vec<T>> {
        let url = format!(
            "{}?{}",
            self.table_url(table),
            query.to_query_string()
        );

        debug!(table, query = %query.to_query_string(), "select");
        let response = self.request(Method::GET, &url).send().await?;
        self.handle_response(response).await
    }

    /// Select zero or one row; more than one matching row is an error
    pub async fn select_maybe_single<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Option<T>> {
        let mut rows: Vec<T> = self.select(table, query).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(ClientError::InvalidResponse(format!(
                "expected at most one row from {}, got {}",
                table, n
            ))),
        }
    }

    /// Select exactly one row
    pub async fn select_single<T: DeserializeOwned>(&self, table: &str, query: &Query) -> Result<T> {
        self.select_maybe_single(table, query)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("{}?{}", table, query.to_query_string())))
    }

    /// Insert one or more rows, returning the inserted rows
    ///
    /// A duplicate key surfaces as [`ClientError::Conflict`].
    pub async fn insert<T: Serialize + ?Sized>(&self, table: &str, rows: &T) -> Result<Vec<Value>> {
        let url = self.table_url(table);

        debug!(table, "insert");
        let response = self
            .request(Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Insert rows, overwriting the existing row whose `on_conflict` column matches
    pub async fn upsert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        rows: &T,
        on_conflict: &str,
    ) -> Result<Vec<Value>> {
        let url = format!(
            "{}?on_conflict={}",
            self.table_url(table),
            urlencoding::encode(on_conflict)
        );

        debug!(table, on_conflict, "upsert");
        let response = self
            .request(Method::POST, &url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(rows)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Update the rows matching every filter, returning the updated rows
    ///
    /// An empty result means no row matched; conditional updates rely on this.
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        table: &str,
        patch: &T,
        filters: &[Filter],
    ) -> Result<Vec<Value>> {
        if filters.is_empty() {
            return Err(ClientError::Config(format!(
                "refusing unfiltered update of {}",
                table
            )));
        }

        let params: Vec<String> = filters.iter().map(Filter::to_param).collect();
        let url = format!("{}?{}", self.table_url(table), params.join("&"));

        debug!(table, filters = %params.join("&"), "update");
        let response = self
            .request(Method::PATCH, &url)
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;

        self.handle_response(response).await
    }

    // ==================== Object Storage API ====================

    /// Store an object at `bucket/path`
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<UploadResponse> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        );

        debug!(bucket, path, size = data.len(), "upload");
        let response = self
            .request(Method::POST, &url)
            .header(header::CONTENT_TYPE, &options.content_type)
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(data)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Decode base64 text and store the bytes at `bucket/path`
    pub async fn upload_base64(
        &self,
        bucket: &str,
        path: &str,
        data_base64: &str,
        options: &UploadOptions,
    ) -> Result<UploadResponse> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(data_base64.trim())?;
        self.upload(bucket, path, bytes, options).await
    }

    /// Stable public retrieval URL for an object
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }

    // ==================== Helper Methods ====================

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, urlencoding::encode(table))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(&self.config.anon_key);

        self.client
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(body)),
            StatusCode::CONFLICT => Err(ClientError::Conflict(body)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Unauthorized(body)),
            _ => Err(ClientError::Server {
                status: status.as_u16(),
                message: body,
            }),
        }
    }
}

/// Percent-encode each segment of an object path, keeping the separators
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
    fn test_encode_path_keeps_separators() {
        assert_eq!(encode_path("Turnen Club/1700.jpg"), "Turnen%20Club/1700.jpg");
    }

    #[test]
    fn test_public_url() {
        let client = BackendClient::new(BackendConfig {
            base_url: "https://project.example.co/".into(),
            anon_key: "anon".into(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            client.public_url("ping_pics", "Expo/1.jpg"),
            "https://project.example.co/storage/v1/object/public/ping_pics/Expo/1.jpg"
        );
    }
}
