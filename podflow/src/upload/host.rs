//! File host transport.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

use crate::config::HostConfig;
use crate::errors::{PodflowError, PodflowResult};

/// Result of storing an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// Stored; the object is reachable at the URL.
    Created(String),
    /// An object with this name is already stored.
    AlreadyExists,
}

/// Stores binary objects and hands out fetchable URLs.
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Stores `bytes` under `object_name`.
    async fn put(
        &self,
        object_name: &str,
        bytes: Vec<u8>,
        content_md5: &str,
    ) -> PodflowResult<PutOutcome>;

    /// Looks up the URL of an object that already exists.
    async fn existing_url(&self, object_name: &str) -> PodflowResult<String>;
}

/// HTTP object store speaking `PUT {base}/{object}`.
pub struct HttpAssetHost {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for HttpAssetHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAssetHost")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct UrlBody {
    url: String,
}

impl HttpAssetHost {
    /// Creates a host client.
    pub fn new(config: &HostConfig, token: impl Into<String>) -> PodflowResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(PodflowError::missing_credentials(crate::config::HOST_URL_VAR));
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PodflowError::invalid_input(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn object_url(&self, object_name: &str) -> String {
        format!("{}/{}", self.base_url, object_name)
    }

    /// Reads a `{ "url": ... }` body, falling back to the object URL.
    fn url_from_body(&self, object_name: &str, body: &str) -> String {
        serde_json::from_str::<UrlBody>(body)
            .map(|b| b.url)
            .unwrap_or_else(|_| self.object_url(object_name))
    }
}

#[async_trait]
impl AssetHost for HttpAssetHost {
    async fn put(
        &self,
        object_name: &str,
        bytes: Vec<u8>,
        content_md5: &str,
    ) -> PodflowResult<PutOutcome> {
        let size = bytes.len();
        let response = self
            .http_client
            .put(self.object_url(object_name))
            .bearer_auth(&self.token)
            .header("Content-MD5", content_md5)
            .header("Content-Type", "image/png")
            .body(bytes)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        match status {
            200..=299 => {
                tracing::debug!(object = object_name, size, "object stored");
                Ok(PutOutcome::Created(self.url_from_body(object_name, &body)))
            }
            409 => Ok(PutOutcome::AlreadyExists),
            _ => Err(PodflowError::from_status(status, &body)),
        }
    }

    async fn existing_url(&self, object_name: &str) -> PodflowResult<String> {
        let response = self
            .http_client
            .get(format!("{}/meta", self.object_url(object_name)))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(PodflowError::from_status(status, &body));
        }
        Ok(self.url_from_body(object_name, &body))
    }
}
