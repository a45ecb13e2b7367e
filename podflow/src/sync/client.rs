//! Commerce API transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::payload::ProductPayload;
use crate::config::{CommerceConfig, StoreCredentials};
use crate::errors::{PodflowError, PodflowResult};

/// A product as acknowledged by the commerce API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedProduct {
    /// Remote product id.
    pub id: String,
    /// External id echoed back by linked platforms.
    pub external_id: Option<String>,
    /// Public listing URL, when the platform reports one.
    pub external_url: Option<String>,
}

/// Creates and updates products on a commerce platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommerceApi: Send + Sync {
    /// Creates one product with all of its variants.
    ///
    /// Rate limits and server errors are
    /// [`PodflowError::TransientTransport`]; other client errors are
    /// [`PodflowError::DomainRejection`].
    async fn create_product(&self, payload: &ProductPayload) -> PodflowResult<CreatedProduct>;

    /// Replaces the product registered under `external_id`.
    async fn update_product(
        &self,
        external_id: &str,
        payload: &ProductPayload,
    ) -> PodflowResult<CreatedProduct>;
}

/// Printful REST client.
pub struct HttpCommerceApi {
    http_client: reqwest::Client,
    base_url: String,
    credentials: StoreCredentials,
}

impl fmt::Debug for HttpCommerceApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCommerceApi")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl HttpCommerceApi {
    /// Creates a client for the store selected by `credentials`.
    pub fn new(config: &CommerceConfig, credentials: StoreCredentials) -> PodflowResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PodflowError::invalid_input(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn products_url(&self) -> String {
        format!("{}/store/products", self.base_url)
    }

    /// Products are addressed by external id with an `@` prefix.
    fn product_url(&self, external_id: &str) -> String {
        format!("{}/@{external_id}", self.products_url())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> PodflowResult<CreatedProduct> {
        let response = request
            .bearer_auth(self.credentials.api_key())
            .header("X-PF-Store-Id", self.credentials.store_id())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PodflowError::from_status(status.as_u16(), &body));
        }

        let envelope: Envelope = serde_json::from_str(&body)?;
        let id = match envelope.result.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(CreatedProduct {
            id,
            external_id: envelope.result.external_id,
            external_url: envelope.result.url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    result: ResultBody,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    id: serde_json::Value,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl CommerceApi for HttpCommerceApi {
    async fn create_product(&self, payload: &ProductPayload) -> PodflowResult<CreatedProduct> {
        tracing::debug!(
            store = %self.credentials.store(),
            product = %payload.sync_product.name,
            variants = payload.sync_variants.len(),
            "creating sync product"
        );

        self.send(self.http_client.post(self.products_url()).json(payload))
            .await
    }

    async fn update_product(
        &self,
        external_id: &str,
        payload: &ProductPayload,
    ) -> PodflowResult<CreatedProduct> {
        tracing::debug!(
            store = %self.credentials.store(),
            product = %payload.sync_product.name,
            external_id,
            "updating sync product"
        );
        self.send(self.http_client.put(self.product_url(external_id)).json(payload))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreKind;

    #[test]
    fn test_envelope_accepts_numeric_and_string_ids() {
        let numeric: Envelope =
            serde_json::from_str(r#"{"code": 200, "result": {"id": 42, "external_id": "pod-1"}}"#)
                .unwrap();
        assert_eq!(numeric.result.id.to_string(), "42");
        assert_eq!(numeric.result.external_id.as_deref(), Some("pod-1"));

        let string: Envelope = serde_json::from_str(r#"{"result": {"id": "abc"}}"#).unwrap();
        assert!(matches!(string.result.id, serde_json::Value::String(ref s) if s == "abc"));
    }

    #[test]
    fn test_products_url_trims_slash() {
        let config = CommerceConfig {
            base_url: "https://api.printful.test/".into(),
            ..CommerceConfig::default()
        };
        let api = HttpCommerceApi::new(
            &config,
            StoreCredentials::new(StoreKind::Manual, "secret-key-1234", "9"),
        )
        .unwrap();
        assert_eq!(api.products_url(), "https://api.printful.test/store/products");
        assert_eq!(
            api.product_url("pod-0123456789ab"),
            "https://api.printful.test/store/products/@pod-0123456789ab"
        );
        assert!(!format!("{api:?}").contains("secret-key"));
    }

    #[test]
    fn test_rejection_message_from_printful_body() {
        let err = PodflowError::from_status(400, r#"{"code": 400, "result": "Invalid variant"}"#);
        assert!(err.is_known_limitation());
        assert!(err.to_string().contains("Invalid variant"));

        assert!(PodflowError::from_status(429, "").is_retryable());
    }
}
