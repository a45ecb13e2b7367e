//! Per-unit stage sequencing with partial-failure isolation.
//!
//! Units run one after another in enumeration order. A unit that fails is
//! recorded with the stage it could not reach and the run moves on; only
//! configuration problems detected before the first unit abort a run.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::summary::{RunSummary, UnitOutcome};
use crate::config::{resolve_credentials, resolve_service_keys, EnvSource, RunConfig};
use crate::content::{ContentAdapter, ContentGenerator, HttpCompletionClient};
use crate::core::{DesignUnit, UnitStage, UnitUploads};
use crate::errors::{PodflowError, PodflowResult};
use crate::events::{names, EventSink};
use crate::observability::SpanTimer;
use crate::results::ResultLog;
use crate::sync::{CommerceApi, HttpCommerceApi, ProductSync, SyncRequest};
use crate::upload::{default_object_name, AssetHost, AssetUploader, HttpAssetHost};

/// The remote services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Completion service for listing copy.
    pub generator: Arc<dyn ContentGenerator>,
    /// File host for designs and mockups.
    pub host: Arc<dyn AssetHost>,
    /// Commerce API for product creation.
    pub commerce: Arc<dyn CommerceApi>,
}

impl Collaborators {
    /// HTTP collaborators with credentials resolved from `env`.
    ///
    /// Fails with [`PodflowError::MissingCredentials`] naming the first
    /// absent key.
    pub fn live(config: &RunConfig, env: &EnvSource) -> PodflowResult<Self> {
        let credentials = resolve_credentials(env, config.store)?;
        let keys = resolve_service_keys(env)?;
        Ok(Self {
            generator: Arc::new(HttpCompletionClient::new(
                config.completion.clone(),
                keys.completion_api_key,
            )?),
            host: Arc::new(HttpAssetHost::new(&config.host, keys.host_token)?),
            commerce: Arc::new(HttpCommerceApi::new(&config.commerce, credentials)?),
        })
    }

    /// Placeholders for dry runs, live collaborators otherwise.
    pub fn for_config(config: &RunConfig, env: &EnvSource) -> PodflowResult<Self> {
        if config.dry_run {
            Ok(Self::dry_run())
        } else {
            Self::live(config, env)
        }
    }
}

/// Drives design units through content generation, upload and sync.
pub struct PipelineRunner {
    run_id: Uuid,
    dry_run: bool,
    price: String,
    content: ContentAdapter,
    uploader: AssetUploader,
    sync: ProductSync,
    sink: Arc<dyn EventSink>,
    results: Option<ResultLog>,
}

impl PipelineRunner {
    /// Builds a runner. The configuration is validated here so that a bad
    /// policy or price aborts before any unit starts.
    pub fn new(
        config: &RunConfig,
        collaborators: Collaborators,
        sink: Arc<dyn EventSink>,
    ) -> PodflowResult<Self> {
        config.validate()?;
        let policy = config.retry.clone();

        Ok(Self {
            run_id: Uuid::now_v7(),
            dry_run: config.dry_run,
            price: config.commerce.price.clone(),
            content: ContentAdapter::new(
                collaborators.generator,
                policy.clone(),
                sink.clone(),
                config.completion.prompt_template.clone(),
            ),
            uploader: AssetUploader::new(
                collaborators.host,
                policy.clone(),
                sink.clone(),
                config.host.max_upload_bytes,
            ),
            sync: ProductSync::new(collaborators.commerce, policy, sink.clone())
                .with_variant_ids(config.commerce.variant_ids.clone())
                .with_placement(config.commerce.placement.clone())
                .with_variant(config.sync_variant()),
            sink,
            results: Some(ResultLog::new(&config.results_dir)),
        })
    }

    /// Disables the result log.
    #[must_use]
    pub fn without_result_log(mut self) -> Self {
        self.results = None;
        self
    }

    /// Identifier stamped on the summary and result files.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Processes `units` in order and summarizes the run.
    ///
    /// Returns an error only for run-level problems found before the first
    /// unit starts. Unit failures are reported in the summary.
    pub async fn run(&self, units: &[DesignUnit]) -> PodflowResult<RunSummary> {
        check_unique(units)?;

        tracing::info!(
            run_id = %self.run_id,
            units = units.len(),
            dry_run = self.dry_run,
            "run started"
        );

        let mut summary = RunSummary::new(self.run_id, self.dry_run);
        for unit in units {
            let outcome = self.process(unit).await;
            summary.record(outcome);
        }
        summary.finish();

        tracing::info!(
            run_id = %self.run_id,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "run completed"
        );
        self.sink.try_emit(
            names::RUN_COMPLETED,
            Some(serde_json::json!({
                "run_id": self.run_id.to_string(),
                "dry_run": self.dry_run,
                "processed": summary.processed,
                "succeeded": summary.succeeded,
                "failed": summary.failed,
            })),
        );

        if let Some(log) = &self.results {
            if let Err(error) = log.write_summary(&summary) {
                tracing::warn!(error = %error, "could not write run summary");
            }
        }
        Ok(summary)
    }

    async fn process(&self, unit: &DesignUnit) -> UnitOutcome {
        let mut outcome = UnitOutcome::pending(unit.name());
        self.sink.try_emit(
            names::UNIT_STARTED,
            Some(serde_json::json!({"unit": unit.name()})),
        );

        match self.advance_unit(unit, &mut outcome).await {
            Ok(()) => {
                self.sink.try_emit(
                    names::UNIT_SYNCED,
                    Some(serde_json::json!({
                        "unit": unit.name(),
                        "product_id": outcome.product.as_ref().map(|p| p.id.clone()),
                    })),
                );
                self.log_result(unit, &mut outcome);
            }
            Err(error) => {
                outcome.fail(&error);
                let stage = outcome.state.stage();
                if error.is_known_limitation() {
                    tracing::warn!(unit = unit.name(), %stage, error = %error, "unit rejected by platform");
                } else {
                    tracing::error!(unit = unit.name(), %stage, error = %error, "unit failed");
                }
                self.sink.try_emit(
                    names::UNIT_FAILED,
                    Some(serde_json::json!({
                        "unit": unit.name(),
                        "stage": stage,
                        "error": error.to_dict(),
                    })),
                );
            }
        }
        outcome
    }

    async fn advance_unit(
        &self,
        unit: &DesignUnit,
        outcome: &mut UnitOutcome,
    ) -> PodflowResult<()> {
        let timer = SpanTimer::start(UnitStage::ContentGenerated.to_string());
        let generated = self.content.generate(unit.name()).await;
        outcome.record_duration(UnitStage::ContentGenerated, timer.finish());
        let parsed = generated?;
        outcome.content_tier = Some(parsed.tier().to_string());
        let listing = parsed.into_content();
        outcome.listing = Some(listing.clone());
        self.complete_stage(unit, outcome);

        let timer = SpanTimer::start(UnitStage::Uploaded.to_string());
        let uploaded = self.upload_assets(unit, &mut outcome.uploads).await;
        outcome.record_duration(UnitStage::Uploaded, timer.finish());
        uploaded?;
        self.complete_stage(unit, outcome);

        let request = SyncRequest {
            name: unit.name().to_string(),
            design_url: outcome.uploads.design_url().unwrap_or_default().to_string(),
            mockup_urls: outcome.uploads.mockup_urls(),
            listing,
            price: self.price.clone(),
        };
        let timer = SpanTimer::start(UnitStage::Synced.to_string());
        let synced = self.sync.sync(&request).await;
        outcome.record_duration(UnitStage::Synced, timer.finish());
        outcome.product = Some(synced?.value);
        self.complete_stage(unit, outcome);

        Ok(())
    }

    async fn upload_assets(&self, unit: &DesignUnit, uploads: &mut UnitUploads) -> PodflowResult<()> {
        uploads.design = Some(self.uploader.upload(unit.source_image_path()).await?);
        for mockup in unit.mockup_paths() {
            let object_name = mockup_object_name(unit, mockup)?;
            uploads
                .mockups
                .push(self.uploader.upload_as(mockup, &object_name).await?);
        }
        Ok(())
    }

    fn complete_stage(&self, unit: &DesignUnit, outcome: &mut UnitOutcome) {
        outcome.advance();
        let stage = outcome.state.stage();
        tracing::debug!(unit = unit.name(), %stage, "stage completed");
        self.sink.try_emit(
            names::UNIT_STAGE_COMPLETED,
            Some(serde_json::json!({"unit": unit.name(), "stage": stage})),
        );
    }

    fn log_result(&self, unit: &DesignUnit, outcome: &mut UnitOutcome) {
        let (Some(log), Some(product), Some(listing)) =
            (&self.results, &outcome.product, &outcome.listing)
        else {
            return;
        };
        match log.append(self.run_id, unit, product, listing, &outcome.uploads, self.dry_run) {
            Ok(path) => outcome.result_file = Some(path),
            Err(error) => {
                tracing::warn!(unit = unit.name(), error = %error, "could not write result log entry");
            }
        }
    }
}

/// Host object name for a mockup of `unit`.
///
/// `<NAME>_*.png` files keep their name; anything else is stored under
/// `<NAME>/` so units with equally named mockups never share an object.
fn mockup_object_name(unit: &DesignUnit, path: &Path) -> PodflowResult<String> {
    let file = default_object_name(path)?;
    let name = unit.name().trim();
    if file.starts_with(&format!("{name}_")) {
        Ok(file)
    } else {
        Ok(format!("{name}/{file}"))
    }
}

/// Rejects runs where two units share a name.
fn check_unique(units: &[DesignUnit]) -> PodflowResult<()> {
    let mut seen = HashSet::new();
    for unit in units {
        let name = unit.name().trim();
        if name.is_empty() {
            return Err(PodflowError::invalid_input("design names must not be empty"));
        }
        if !seen.insert(name) {
            return Err(PodflowError::invalid_input(format!(
                "design name '{name}' appears more than once"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreKind;

    #[test]
    fn test_check_unique() {
        let units = vec![DesignUnit::new("TACO", "a"), DesignUnit::new("MOLE", "b")];
        assert!(check_unique(&units).is_ok());

        let dupes = vec![DesignUnit::new("TACO", "a"), DesignUnit::new("TACO", "b")];
        let err = check_unique(&dupes).unwrap_err();
        assert!(err.is_run_level());
        assert!(err.to_string().contains("TACO"));

        let padded = vec![DesignUnit::new(" TACO", "a"), DesignUnit::new("TACO", "b")];
        assert!(check_unique(&padded).unwrap_err().is_run_level());
    }

    #[test]
    fn test_mockup_object_names_are_scoped_to_the_unit() {
        let taco = DesignUnit::new("TACO", "assets/TACO.png");
        assert_eq!(
            mockup_object_name(&taco, Path::new("assets/mockups/TACO/white.png")).unwrap(),
            "TACO/white.png"
        );
        assert_eq!(
            mockup_object_name(&taco, Path::new("assets/mockups/TACO_black.png")).unwrap(),
            "TACO_black.png"
        );
    }

    #[test]
    fn test_live_collaborators_need_credentials() {
        let mut config = RunConfig::default();
        config.store = StoreKind::Etsy;
        config.host.base_url = "https://files.test".into();

        let env = EnvSource::from_pairs([("PRINTFUL_API_KEY", "k"), ("PRINTFUL_STORE_ID", "1")]);
        let Err(err) = Collaborators::for_config(&config, &env) else {
            panic!("expected missing credentials");
        };
        assert!(matches!(err, PodflowError::MissingCredentials { ref key } if key == "PRINTFUL_ETSY_API_KEY"));
    }

    #[test]
    fn test_dry_run_needs_no_credentials() {
        let config = RunConfig {
            dry_run: true,
            ..RunConfig::default()
        };
        assert!(Collaborators::for_config(&config, &EnvSource::default()).is_ok());
    }

    #[test]
    fn test_runner_rejects_invalid_policy() {
        let mut config = RunConfig {
            dry_run: true,
            ..RunConfig::default()
        };
        config.retry.max_attempts = 0;
        let sink: Arc<dyn EventSink> = Arc::new(crate::events::NoOpEventSink);
        let Err(err) = PipelineRunner::new(&config, Collaborators::dry_run(), sink) else {
            panic!("expected invalid policy");
        };
        assert!(err.is_run_level());
    }
}
