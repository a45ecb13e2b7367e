//! Listing generation with retries and two-tier parsing.

use std::sync::Arc;

use super::client::ContentGenerator;
use super::parse::{parse_listing, ParsedContent};
use crate::errors::{PodflowError, PodflowResult};
use crate::events::EventSink;
use crate::pipeline::{with_retry, RetryPolicy};

/// Turns a design name into validated listing content.
pub struct ContentAdapter {
    generator: Arc<dyn ContentGenerator>,
    policy: RetryPolicy,
    sink: Arc<dyn EventSink>,
    prompt_template: String,
}

impl ContentAdapter {
    /// Creates an adapter. `prompt_template` must contain `{name}`.
    #[must_use]
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        policy: RetryPolicy,
        sink: Arc<dyn EventSink>,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            policy,
            sink,
            prompt_template: prompt_template.into(),
        }
    }

    /// Generates and parses listing content for `name`.
    ///
    /// Only the transport call is retried. A completion that parses in
    /// neither tier fails with [`PodflowError::MalformedContent`] without
    /// another request.
    pub async fn generate(&self, name: &str) -> PodflowResult<ParsedContent> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PodflowError::invalid_input("design name must not be empty"));
        }

        let prompt = self.prompt_template.replace("{name}", name);
        let key = format!("content:{name}");
        let completion = with_retry(&self.policy, &key, self.sink.as_ref(), || {
            self.generator.complete(&prompt)
        })
        .await?;

        let parsed = parse_listing(&completion.value)?;
        tracing::info!(
            unit = name,
            tier = parsed.tier(),
            attempt = completion.attempt,
            tags = parsed.content().tags.len(),
            "listing content generated"
        );
        Ok(parsed)
    }
}
