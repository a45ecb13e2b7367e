//! End-to-end tests for pipeline runs.

#[cfg(test)]
mod tests {
    use crate::config::{EnvSource, RunConfig};
    use crate::core::{DesignUnit, UnitStage, UnitState};
    use crate::discovery::Discovery;
    use crate::errors::PodflowError;
    use crate::events::{names, CollectingEventSink, EventSink};
    use crate::pipeline::{Collaborators, PipelineRunner, RetryPolicy, DRY_RUN_SCHEME};
    use crate::results::ResultLog;
    use crate::testing::{MockAssetHost, MockContentGenerator, RecordingCommerceApi};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        generator: Arc<MockContentGenerator>,
        host: Arc<MockAssetHost>,
        commerce: Arc<RecordingCommerceApi>,
        sink: Arc<CollectingEventSink>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                generator: Arc::new(MockContentGenerator::new()),
                host: Arc::new(MockAssetHost::new()),
                commerce: Arc::new(RecordingCommerceApi::new()),
                sink: Arc::new(CollectingEventSink::new()),
            }
        }

        fn assets_dir(&self) -> PathBuf {
            self.dir.path().join("assets")
        }

        fn results_dir(&self) -> PathBuf {
            self.dir.path().join("results")
        }

        fn config(&self) -> RunConfig {
            let mut config = RunConfig::default();
            config.assets_dir = self.assets_dir();
            config.results_dir = self.results_dir();
            config.host.base_url = "mock://assets".into();
            config.retry = RetryPolicy::new()
                .with_max_attempts(3)
                .with_initial_delay_ms(1);
            config
        }

        fn units(&self, names: &[&str]) -> Vec<DesignUnit> {
            for name in names {
                let path = self.assets_dir().join(format!("{name}.png"));
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, name.as_bytes()).unwrap();
            }
            Discovery::new(self.assets_dir()).from_names(names).unwrap()
        }

        fn listing_for(&self, name: &str, title: &str) {
            self.generator.reply_for(
                name,
                serde_json::json!({
                    "title": title,
                    "description": format!("Sweatshirt printed with {name}."),
                    "tags": [name.to_lowercase(), "sweatshirt"],
                })
                .to_string(),
            );
        }

        fn collaborators(&self) -> Collaborators {
            Collaborators {
                generator: self.generator.clone(),
                host: self.host.clone(),
                commerce: self.commerce.clone(),
            }
        }

        fn runner(&self, config: &RunConfig) -> PipelineRunner {
            let sink: Arc<dyn EventSink> = self.sink.clone();
            let Ok(runner) = PipelineRunner::new(config, self.collaborators(), sink) else {
                panic!("runner should build");
            };
            runner
        }
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let harness = Harness::new();
        harness.listing_for("ALPHA", "Alpha Sweatshirt");
        harness.listing_for("BRAVO", "Bravo Sweatshirt");
        harness.listing_for("CHARLIE", "Charlie Sweatshirt");
        harness
            .commerce
            .reject_title("Bravo", 400, "Etsy-linked stores cannot create this product");
        let units = harness.units(&["ALPHA", "BRAVO", "CHARLIE"]);

        let summary = harness.runner(&harness.config()).run(&units).await.unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let names: Vec<&str> = summary.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["ALPHA", "BRAVO", "CHARLIE"]);

        let bravo = summary.outcome("BRAVO").unwrap();
        assert!(matches!(bravo.state, UnitState::Failed { stage: UnitStage::Synced, .. }));
        assert!(bravo.failure.as_ref().unwrap().known_limitation);
        assert_eq!(summary.known_limitations.len(), 1);
        assert_eq!(summary.failed_by_stage.get("synced"), Some(&1));

        assert!(summary.outcome("ALPHA").unwrap().is_success());
        assert!(summary.outcome("CHARLIE").unwrap().is_success());
        // rejections are not retried
        assert_eq!(harness.commerce.call_count(), 3);
        assert_eq!(harness.sink.count(names::UNIT_FAILED), 1);
        assert_eq!(harness.sink.count(names::UNIT_SYNCED), 2);
    }

    #[tokio::test]
    async fn test_upload_exhaustion_fails_only_that_unit() {
        let harness = Harness::new();
        harness.host.fail_object("BRAVO", 503);
        let units = harness.units(&["ALPHA", "BRAVO", "CHARLIE"]);

        let summary = harness.runner(&harness.config()).run(&units).await.unwrap();

        assert_eq!(summary.succeeded, 2);
        let bravo = summary.outcome("BRAVO").unwrap();
        assert_eq!(bravo.state.stage(), UnitStage::Uploaded);
        let failure = bravo.failure.as_ref().unwrap();
        assert_eq!(failure.error_type, "ExhaustedRetriesError");
        assert!(bravo.listing.is_some());
        assert!(bravo.product.is_none());

        // 1 + 3 + 1 attempts
        assert_eq!(harness.host.put_calls(), 5);
        assert_eq!(harness.commerce.call_count(), 2);
        assert_eq!(harness.sink.count(names::RETRY_EXHAUSTED), 1);
    }

    #[tokio::test]
    async fn test_malformed_content_fails_without_retry() {
        let harness = Harness::new();
        harness.generator.reply_for("MOLE", "I'm sorry, I can't write that listing.");
        let units = harness.units(&["TACO", "MOLE"]);

        let summary = harness.runner(&harness.config()).run(&units).await.unwrap();

        let mole = summary.outcome("MOLE").unwrap();
        assert_eq!(mole.state.stage(), UnitStage::ContentGenerated);
        assert_eq!(
            mole.failure.as_ref().unwrap().error_type,
            "MalformedContentError"
        );
        assert_eq!(harness.generator.call_count(), 2);
        assert!(harness.sink.events_of_type("retry.").is_empty());
        assert_eq!(harness.host.stored_objects(), vec!["TACO.png".to_string()]);
    }

    #[tokio::test]
    async fn test_stage_events_and_result_log() {
        let harness = Harness::new();
        let units = harness.units(&["TACO"]);

        let summary = harness.runner(&harness.config()).run(&units).await.unwrap();

        assert_eq!(harness.sink.count(names::UNIT_STARTED), 1);
        assert_eq!(harness.sink.count(names::UNIT_STAGE_COMPLETED), 3);
        assert_eq!(harness.sink.count(names::RUN_COMPLETED), 1);

        let taco = summary.outcome("TACO").unwrap();
        assert_eq!(taco.content_tier.as_deref(), Some("strict"));
        assert_eq!(taco.uploads.design_url(), Some("mock://assets/TACO.png"));
        assert_eq!(taco.stage_durations_ms.len(), 3);
        assert!(taco.result_file.as_ref().unwrap().exists());

        let entries = ResultLog::new(harness.results_dir()).entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].product.id, "prod-1");
        assert_eq!(entries[0].run_id, summary.run_id);

        let payload = &harness.commerce.payloads()[0];
        assert_eq!(payload.sync_variants[0].files[0].url, "mock://assets/TACO.png");
        assert_eq!(payload.sync_variants[0].retail_price, "34.99");
    }

    #[tokio::test]
    async fn test_mockups_are_uploaded_and_linked() {
        let harness = Harness::new();
        let mockups = harness.assets_dir().join("mockups");
        std::fs::create_dir_all(&mockups).unwrap();
        std::fs::write(mockups.join("TACO_black.png"), b"black").unwrap();
        let units = harness.units(&["TACO"]);

        let mut config = harness.config();
        config.store = crate::config::StoreKind::Etsy;
        let summary = harness.runner(&config).run(&units).await.unwrap();

        let taco = summary.outcome("TACO").unwrap();
        assert_eq!(taco.uploads.mockups.len(), 1);

        let payload = &harness.commerce.payloads()[0];
        assert_eq!(payload.sync_product.thumbnail, "mock://assets/TACO_black.png");
        assert!(payload.sync_product.external_id.is_some());
        assert_eq!(payload.sync_variants[0].files.len(), 2);
    }

    #[tokio::test]
    async fn test_equally_named_mockups_stay_with_their_unit() {
        let harness = Harness::new();
        for name in ["TACO", "MOLE"] {
            let dir = harness.assets_dir().join("mockups").join(name);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("white.png"), name.as_bytes()).unwrap();
        }
        let units = harness.units(&["TACO", "MOLE"]);

        let summary = harness.runner(&harness.config()).run(&units).await.unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(
            harness.host.stored_objects(),
            vec!["TACO.png", "TACO/white.png", "MOLE.png", "MOLE/white.png"]
        );
        let mole = summary.outcome("MOLE").unwrap();
        assert!(!mole.uploads.mockups[0].reconciled);
        assert_eq!(mole.uploads.mockups[0].url, "mock://assets/MOLE/white.png");

        let payloads = harness.commerce.payloads();
        assert_eq!(payloads[0].sync_product.thumbnail, "mock://assets/TACO/white.png");
        assert_eq!(payloads[1].sync_product.thumbnail, "mock://assets/MOLE/white.png");
    }

    #[tokio::test]
    async fn test_linked_rerun_updates_existing_product() {
        let harness = Harness::new();
        let units = harness.units(&["TACO"]);
        let mut config = harness.config();
        config.store = crate::config::StoreKind::Etsy;

        let first = harness.runner(&config).run(&units).await.unwrap();
        let second = harness.runner(&config).run(&units).await.unwrap();

        assert_eq!(second.succeeded, 1);
        let first_id = &first.outcome("TACO").unwrap().product.as_ref().unwrap().id;
        let second_id = &second.outcome("TACO").unwrap().product.as_ref().unwrap().id;
        assert_eq!(first_id, second_id);
        assert_eq!(harness.commerce.call_count(), 2);
        assert_eq!(harness.commerce.updates().len(), 1);
        assert!(second.known_limitations.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_scenario() {
        let harness = Harness::new();
        let units = harness.units(&["TACO", "MOLE"]);
        let mut config = harness.config();
        config.dry_run = true;
        config.host.base_url = String::new();

        let collaborators = Collaborators::for_config(&config, &EnvSource::default());
        let Ok(collaborators) = collaborators else {
            panic!("dry run needs no credentials");
        };
        let sink: Arc<dyn EventSink> = harness.sink.clone();
        let Ok(runner) = PipelineRunner::new(&config, collaborators, sink) else {
            panic!("runner should build");
        };

        let summary = runner.run(&units).await.unwrap();

        assert!(summary.dry_run);
        assert_eq!(
            (summary.processed, summary.succeeded, summary.failed),
            (2, 2, 0)
        );
        for outcome in &summary.outcomes {
            assert!(outcome.uploads.design_url().unwrap().starts_with(DRY_RUN_SCHEME));
            assert!(outcome.product.as_ref().unwrap().id.starts_with("dry-run-"));
        }

        // mocks wired into the harness were never touched
        assert_eq!(harness.generator.call_count(), 0);
        assert_eq!(harness.host.put_calls(), 0);
        assert_eq!(harness.commerce.call_count(), 0);

        // only the result log was written
        let written: Vec<String> = std::fs::read_dir(harness.results_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(written.len(), 3);
        assert_eq!(written.iter().filter(|n| n.starts_with("run_")).count(), 1);
        let assets: Vec<_> = std::fs::read_dir(harness.assets_dir()).unwrap().collect();
        assert_eq!(assets.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_units_abort_before_any_call() {
        let harness = Harness::new();
        let units = vec![
            DesignUnit::new("TACO", harness.assets_dir().join("TACO.png")),
            DesignUnit::new("TACO", harness.assets_dir().join("TACO.png")),
        ];

        let err = harness.runner(&harness.config()).run(&units).await.unwrap_err();

        assert!(err.is_run_level());
        assert_eq!(harness.generator.call_count(), 0);
        assert!(harness.sink.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_is_run_level() {
        let harness = Harness::new();
        let config = harness.config();
        let env = EnvSource::from_pairs([("OPENAI_API_KEY", "sk-test")]);

        let Err(err) = Collaborators::for_config(&config, &env) else {
            panic!("expected missing credentials");
        };
        assert!(matches!(err, PodflowError::MissingCredentials { ref key } if key == "PRINTFUL_API_KEY"));
        assert!(err.is_run_level());
    }

    #[tokio::test]
    async fn test_missing_asset_fails_unit_at_upload() {
        let harness = Harness::new();
        let mut units = harness.units(&["TACO"]);
        units.push(DesignUnit::new("GHOST", harness.assets_dir().join("GHOST.png")));

        let summary = harness.runner(&harness.config()).run(&units).await.unwrap();

        let ghost = summary.outcome("GHOST").unwrap();
        assert_eq!(ghost.state.stage(), UnitStage::Uploaded);
        assert_eq!(ghost.failure.as_ref().unwrap().error_type, "InvalidInputError");
        assert_eq!(summary.succeeded, 1);
    }
}
