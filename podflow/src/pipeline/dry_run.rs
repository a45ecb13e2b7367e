//! Placeholder collaborators for dry runs.
//!
//! Every call returns a fixed value derived from its input and nothing
//! leaves the process.

use async_trait::async_trait;
use std::sync::Arc;

use super::sequencer::Collaborators;
use crate::content::ContentGenerator;
use crate::errors::PodflowResult;
use crate::sync::{external_id, CommerceApi, CreatedProduct, ProductPayload};
use crate::upload::{AssetHost, PutOutcome};

/// URL scheme used for every placeholder URL.
pub const DRY_RUN_SCHEME: &str = "dry-run://";

/// Echoes the prompt back as a listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunContentGenerator;

#[async_trait]
impl ContentGenerator for DryRunContentGenerator {
    async fn complete(&self, prompt: &str) -> PodflowResult<String> {
        Ok(serde_json::json!({
            "title": "Dry run listing",
            "description": prompt,
            "tags": ["dry-run"],
        })
        .to_string())
    }
}

/// Pretends every object is stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunAssetHost;

#[async_trait]
impl AssetHost for DryRunAssetHost {
    async fn put(
        &self,
        object_name: &str,
        _bytes: Vec<u8>,
        _content_md5: &str,
    ) -> PodflowResult<PutOutcome> {
        Ok(PutOutcome::Created(format!("{DRY_RUN_SCHEME}assets/{object_name}")))
    }

    async fn existing_url(&self, object_name: &str) -> PodflowResult<String> {
        Ok(format!("{DRY_RUN_SCHEME}assets/{object_name}"))
    }
}

/// Accepts every product with an id derived from its name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunCommerceApi;

#[async_trait]
impl CommerceApi for DryRunCommerceApi {
    async fn create_product(&self, payload: &ProductPayload) -> PodflowResult<CreatedProduct> {
        let id = format!("dry-run-{}", external_id(&payload.sync_product.name));
        Ok(CreatedProduct {
            external_url: Some(format!("{DRY_RUN_SCHEME}products/{id}")),
            external_id: payload.sync_product.external_id.clone(),
            id,
        })
    }

    async fn update_product(
        &self,
        external_id: &str,
        payload: &ProductPayload,
    ) -> PodflowResult<CreatedProduct> {
        let mut product = self.create_product(payload).await?;
        product.external_id = Some(external_id.to_string());
        Ok(product)
    }
}

impl Collaborators {
    /// Placeholder collaborators that never touch the network.
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            generator: Arc::new(DryRunContentGenerator),
            host: Arc::new(DryRunAssetHost),
            commerce: Arc::new(DryRunCommerceApi),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_listing;

    #[tokio::test]
    async fn test_echo_content_parses() {
        let text = DryRunContentGenerator.complete("Listing for TACO").await.unwrap();
        let parsed = parse_listing(&text).unwrap();
        assert_eq!(parsed.tier(), "strict");
        assert_eq!(parsed.content().description, "Listing for TACO");
    }

    #[tokio::test]
    async fn test_placeholders_are_deterministic() {
        let a = DryRunAssetHost.put("TACO.png", vec![1], "x").await.unwrap();
        let b = DryRunAssetHost.put("TACO.png", vec![2], "y").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, PutOutcome::Created("dry-run://assets/TACO.png".into()));
    }
}
