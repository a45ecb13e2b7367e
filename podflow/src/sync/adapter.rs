//! Product sync with retries.

use std::sync::Arc;

use super::client::CommerceApi;
use super::payload::{PlacementPolicy, ProductPayload, SyncRequest, SyncVariant};
use crate::core::ProductRecord;
use crate::errors::{PodflowError, PodflowResult};
use crate::events::EventSink;
use crate::pipeline::{with_retry, Attempted, RetryPolicy};

/// Creates products for validated sync requests.
pub struct ProductSync {
    api: Arc<dyn CommerceApi>,
    policy: RetryPolicy,
    sink: Arc<dyn EventSink>,
    variant_ids: Vec<u64>,
    placement: PlacementPolicy,
    variant: SyncVariant,
}

impl ProductSync {
    /// Creates a sync adapter.
    #[must_use]
    pub fn new(api: Arc<dyn CommerceApi>, policy: RetryPolicy, sink: Arc<dyn EventSink>) -> Self {
        Self {
            api,
            policy,
            sink,
            variant_ids: Vec::new(),
            placement: PlacementPolicy::default(),
            variant: SyncVariant::default(),
        }
    }

    /// Sets the catalog variants every product is created with.
    #[must_use]
    pub fn with_variant_ids(mut self, ids: Vec<u64>) -> Self {
        self.variant_ids = ids;
        self
    }

    /// Sets the placement policy.
    #[must_use]
    pub fn with_placement(mut self, placement: PlacementPolicy) -> Self {
        self.placement = placement;
        self
    }

    /// Sets the payload shape.
    #[must_use]
    pub fn with_variant(mut self, variant: SyncVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Builds the payload for `request`.
    pub fn payload(&self, request: &SyncRequest) -> PodflowResult<ProductPayload> {
        ProductPayload::build(request, &self.variant_ids, &self.placement, self.variant)
    }

    /// Validates `request` and creates the product.
    ///
    /// Validation failures never reach the API. When the platform reports
    /// that a product with the payload's external id already exists, that
    /// product is updated instead. Other rejections are returned as-is and
    /// are not retried.
    pub async fn sync(&self, request: &SyncRequest) -> PodflowResult<Attempted<ProductRecord>> {
        let payload = self.payload(request)?;
        let key = format!("sync:{}", request.name);

        let created = match with_retry(&self.policy, &key, self.sink.as_ref(), || {
            self.api.create_product(&payload)
        })
        .await
        {
            Err(e) if is_duplicate_product(&e) => match &payload.sync_product.external_id {
                Some(external_id) => {
                    tracing::info!(
                        unit = %request.name,
                        external_id = %external_id,
                        "product exists, updating"
                    );
                    with_retry(&self.policy, &format!("{key}:update"), self.sink.as_ref(), || {
                        self.api.update_product(external_id, &payload)
                    })
                    .await
                }
                None => Err(e),
            },
            other => other,
        }
        .map_err(|e| {
            if e.is_known_limitation() {
                tracing::warn!(
                    unit = %request.name,
                    variant = ?self.variant,
                    error = %e,
                    "product rejected by platform (known limitation)"
                );
            }
            e
        })?;

        tracing::info!(
            unit = %request.name,
            product_id = %created.value.id,
            attempt = created.attempt,
            "product synced"
        );

        Ok(Attempted {
            value: ProductRecord::new(created.value.id, created.value.external_url),
            attempt: created.attempt,
        })
    }
}

/// A rejection caused by an external id that is already taken.
fn is_duplicate_product(err: &PodflowError) -> bool {
    match err {
        PodflowError::DomainRejection { status, message } => {
            *status == 409 || message.to_lowercase().contains("already exists")
        }
        _ => false,
    }
}
