//! Recording collaborators for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::content::ContentGenerator;
use crate::errors::{PodflowError, PodflowResult};
use crate::sync::{CommerceApi, CreatedProduct, ProductPayload};
use crate::upload::{AssetHost, PutOutcome};

/// A completion service with scripted replies.
///
/// Replies are chosen by the first registered key the prompt contains;
/// unmatched prompts get a valid JSON listing.
#[derive(Debug, Default)]
pub struct MockContentGenerator {
    replies: Mutex<Vec<(String, String)>>,
    failures: Mutex<VecDeque<PodflowError>>,
    persistent_failures: Mutex<HashMap<String, u16>>,
    prompts: Mutex<Vec<String>>,
}

impl MockContentGenerator {
    /// Creates a generator that answers every prompt with valid JSON.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers prompts containing `key` with `text`.
    pub fn reply_for(&self, key: impl Into<String>, text: impl Into<String>) {
        self.replies.lock().push((key.into(), text.into()));
    }

    /// Fails the next call with `error`. Queued failures are used in order.
    pub fn fail_next(&self, error: PodflowError) {
        self.failures.lock().push_back(error);
    }

    /// Fails every prompt containing `key` with an HTTP `status` error.
    pub fn fail_prompt(&self, key: impl Into<String>, status: u16) {
        self.persistent_failures.lock().insert(key.into(), status);
    }

    /// Number of completion calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Prompts received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn complete(&self, prompt: &str) -> PodflowResult<String> {
        self.prompts.lock().push(prompt.to_string());

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        if let Some(status) = self
            .persistent_failures
            .lock()
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
            .map(|(_, status)| *status)
        {
            return Err(PodflowError::from_status(status, "scripted failure"));
        }
        if let Some((_, text)) = self
            .replies
            .lock()
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
        {
            return Ok(text.clone());
        }

        Ok(serde_json::json!({
            "title": "Minimalist Word Sweatshirt",
            "description": "A soft crewneck with a single bold word.",
            "tags": ["sweatshirt", "minimalist", "gift"],
        })
        .to_string())
    }
}

/// An in-memory object store.
///
/// URLs have the form `mock://assets/<object>`. Storing a name twice
/// reports [`PutOutcome::AlreadyExists`].
#[derive(Debug, Default)]
pub struct MockAssetHost {
    objects: Mutex<Vec<(String, String)>>,
    failures: Mutex<VecDeque<PodflowError>>,
    failing_objects: Mutex<HashMap<String, u16>>,
    put_calls: Mutex<usize>,
}

impl MockAssetHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `put` with `error`.
    pub fn fail_next(&self, error: PodflowError) {
        self.failures.lock().push_back(error);
    }

    /// Fails every `put` for objects whose name contains `key`.
    pub fn fail_object(&self, key: impl Into<String>, status: u16) {
        self.failing_objects.lock().insert(key.into(), status);
    }

    /// Number of `put` calls.
    #[must_use]
    pub fn put_calls(&self) -> usize {
        *self.put_calls.lock()
    }

    /// Names of stored objects, in storage order.
    #[must_use]
    pub fn stored_objects(&self) -> Vec<String> {
        self.objects.lock().iter().map(|(name, _)| name.clone()).collect()
    }
}

#[async_trait]
impl AssetHost for MockAssetHost {
    async fn put(
        &self,
        object_name: &str,
        _bytes: Vec<u8>,
        _content_md5: &str,
    ) -> PodflowResult<PutOutcome> {
        *self.put_calls.lock() += 1;

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        if let Some(status) = self
            .failing_objects
            .lock()
            .iter()
            .find(|(key, _)| object_name.contains(key.as_str()))
            .map(|(_, status)| *status)
        {
            return Err(PodflowError::from_status(status, "scripted failure"));
        }

        let mut objects = self.objects.lock();
        if objects.iter().any(|(name, _)| name == object_name) {
            return Ok(PutOutcome::AlreadyExists);
        }
        let url = format!("mock://assets/{object_name}");
        objects.push((object_name.to_string(), url.clone()));
        Ok(PutOutcome::Created(url))
    }

    async fn existing_url(&self, object_name: &str) -> PodflowResult<String> {
        self.objects
            .lock()
            .iter()
            .find(|(name, _)| name == object_name)
            .map(|(_, url)| url.clone())
            .ok_or_else(|| PodflowError::rejected(404, format!("{object_name} not found")))
    }
}

/// A commerce API that records payloads and hands out sequential ids.
#[derive(Debug, Default)]
pub struct RecordingCommerceApi {
    payloads: Mutex<Vec<ProductPayload>>,
    rejections: Mutex<HashMap<String, (u16, String)>>,
    products: Mutex<HashMap<String, String>>,
    updates: Mutex<Vec<String>>,
}

impl RecordingCommerceApi {
    /// Creates an API that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects products whose title contains `key`.
    pub fn reject_title(&self, key: impl Into<String>, status: u16, message: impl Into<String>) {
        self.rejections
            .lock()
            .insert(key.into(), (status, message.into()));
    }

    /// Payloads received, in call order.
    #[must_use]
    pub fn payloads(&self) -> Vec<ProductPayload> {
        self.payloads.lock().clone()
    }

    /// Number of create calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.payloads.lock().len()
    }

    /// External ids passed to `update_product`, in call order.
    #[must_use]
    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl CommerceApi for RecordingCommerceApi {
    async fn create_product(&self, payload: &ProductPayload) -> PodflowResult<CreatedProduct> {
        let mut payloads = self.payloads.lock();
        payloads.push(payload.clone());

        if let Some((status, message)) = self
            .rejections
            .lock()
            .iter()
            .find(|(key, _)| payload.sync_product.name.contains(key.as_str()))
            .map(|(_, rejection)| rejection.clone())
        {
            return Err(PodflowError::rejected(status, message));
        }

        let id = format!("prod-{}", payloads.len());
        if let Some(external_id) = &payload.sync_product.external_id {
            let mut products = self.products.lock();
            if products.contains_key(external_id) {
                return Err(PodflowError::rejected(
                    400,
                    format!("Product with external ID {external_id} already exists"),
                ));
            }
            products.insert(external_id.clone(), id.clone());
        }
        Ok(CreatedProduct {
            external_url: Some(format!("mock://products/{id}")),
            external_id: payload.sync_product.external_id.clone(),
            id,
        })
    }

    async fn update_product(
        &self,
        external_id: &str,
        _payload: &ProductPayload,
    ) -> PodflowResult<CreatedProduct> {
        self.updates.lock().push(external_id.to_string());
        let Some(id) = self.products.lock().get(external_id).cloned() else {
            return Err(PodflowError::rejected(404, "Product not found"));
        };
        Ok(CreatedProduct {
            external_url: Some(format!("mock://products/{id}")),
            external_id: Some(external_id.to_string()),
            id,
        })
    }
}
