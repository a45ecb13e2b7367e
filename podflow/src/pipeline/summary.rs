//! Per-unit outcomes and the run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use uuid::Uuid;

use crate::core::{ListingContent, ProductRecord, UnitStage, UnitState, UnitUploads};
use crate::errors::PodflowError;

/// Record of a unit failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage the unit could not reach.
    pub stage: UnitStage,
    /// Error message.
    pub error: String,
    /// Stable error kind, see [`PodflowError::error_kind`].
    pub error_type: String,
    /// Whether the remote API rejected the request on business grounds.
    pub known_limitation: bool,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a record for `error` raised while attempting `stage`.
    #[must_use]
    pub fn from_error(stage: UnitStage, error: &PodflowError) -> Self {
        Self {
            stage,
            error: error.to_string(),
            error_type: error.error_kind().to_string(),
            known_limitation: error.is_known_limitation(),
            timestamp: Utc::now(),
        }
    }
}

/// Terminal result for one design unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    /// Design name.
    pub name: String,
    /// Final state.
    pub state: UnitState,
    /// Generated listing, if content generation succeeded.
    pub listing: Option<ListingContent>,
    /// Parse tier that produced the listing.
    pub content_tier: Option<String>,
    /// Hosted assets.
    #[serde(default)]
    pub uploads: UnitUploads,
    /// Product record, if the unit was synced.
    pub product: Option<ProductRecord>,
    /// Failure details, if the unit failed.
    pub failure: Option<FailureRecord>,
    /// Milliseconds spent per completed or failed stage.
    #[serde(default)]
    pub stage_durations_ms: BTreeMap<String, f64>,
    /// Result log file written for this unit.
    pub result_file: Option<PathBuf>,
}

impl UnitOutcome {
    /// Starts an outcome in the `Pending` state.
    #[must_use]
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: UnitState::default(),
            listing: None,
            content_tier: None,
            uploads: UnitUploads::default(),
            product: None,
            failure: None,
            stage_durations_ms: BTreeMap::new(),
            result_file: None,
        }
    }

    /// Records the time spent on `stage`.
    pub fn record_duration(&mut self, stage: UnitStage, ms: f64) {
        self.stage_durations_ms.insert(stage.to_string(), ms);
    }

    /// Moves to the next stage.
    pub fn advance(&mut self) {
        self.state = std::mem::take(&mut self.state).advance();
    }

    /// Fails the unit at the stage it was attempting.
    pub fn fail(&mut self, error: &PodflowError) {
        let state = std::mem::take(&mut self.state).fail(error.to_string());
        self.failure = Some(FailureRecord::from_error(state.stage(), error));
        self.state = state;
    }

    /// Whether the unit reached `Synced`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }
}

/// Aggregate result of a run. Outcomes keep enumeration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: Uuid,
    /// Whether placeholders replaced the remote collaborators.
    pub dry_run: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Units processed.
    pub processed: usize,
    /// Units that reached `Synced`.
    pub succeeded: usize,
    /// Units that failed.
    pub failed: usize,
    /// Failure counts keyed by stage.
    pub failed_by_stage: BTreeMap<String, usize>,
    /// Failures caused by remote API limitations, as `name: message`.
    pub known_limitations: Vec<String>,
    /// Per-unit outcomes.
    pub outcomes: Vec<UnitOutcome>,
}

impl RunSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            processed: 0,
            succeeded: 0,
            failed: 0,
            failed_by_stage: BTreeMap::new(),
            known_limitations: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// Adds a terminal outcome.
    pub fn record(&mut self, outcome: UnitOutcome) {
        self.processed += 1;
        if outcome.is_success() {
            self.succeeded += 1;
        }
        if let Some(failure) = &outcome.failure {
            self.failed += 1;
            *self
                .failed_by_stage
                .entry(failure.stage.to_string())
                .or_insert(0) += 1;
            if failure.known_limitation {
                self.known_limitations
                    .push(format!("{}: {}", outcome.name, failure.error));
            }
        }
        self.outcomes.push(outcome);
    }

    /// Stamps the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Returns true if any unit failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Returns the fraction of units synced.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.succeeded as f64 / self.processed as f64;
        rate
    }

    /// Looks up the outcome for `name`.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&UnitOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Human readable report for the terminal.
    #[must_use]
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };
        let _ = writeln!(out, "Run {}{mode}", self.run_id);
        let _ = writeln!(
            out,
            "  processed: {}  synced: {}  failed: {}",
            self.processed, self.succeeded, self.failed
        );

        for outcome in &self.outcomes {
            match (&outcome.product, &outcome.failure) {
                (Some(product), _) => {
                    let url = product.external_url.as_deref().unwrap_or("-");
                    let _ = writeln!(out, "  [ok]   {:<16} product {} {url}", outcome.name, product.id);
                }
                (None, Some(failure)) => {
                    let _ = writeln!(
                        out,
                        "  [fail] {:<16} at {}: {}",
                        outcome.name, failure.stage, failure.error
                    );
                }
                (None, None) => {
                    let _ = writeln!(out, "  [..]   {:<16} {}", outcome.name, outcome.state);
                }
            }
        }

        if !self.failed_by_stage.is_empty() {
            let by_stage: Vec<String> = self
                .failed_by_stage
                .iter()
                .map(|(stage, count)| format!("{stage}={count}"))
                .collect();
            let _ = writeln!(out, "  failures by stage: {}", by_stage.join(", "));
        }
        if !self.known_limitations.is_empty() {
            let _ = writeln!(out, "  known limitations (rejected by the platform):");
            for note in &self.known_limitations {
                let _ = writeln!(out, "    - {note}");
            }
        }
        out
    }
}
