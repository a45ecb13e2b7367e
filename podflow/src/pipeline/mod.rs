//! Retry execution and per-unit pipeline sequencing.
//!
//! This module provides:
//! - The retry-with-backoff executor shared by every remote call
//! - The sequencer that moves units through their stages
//! - Placeholder collaborators for dry runs
//! - Run summaries

mod dry_run;
mod retry;
mod sequencer;
mod summary;

#[cfg(test)]
mod integration_tests;

pub use dry_run::{DryRunAssetHost, DryRunCommerceApi, DryRunContentGenerator, DRY_RUN_SCHEME};
pub use retry::{decide, with_retry, Attempted, JitterStrategy, RetryDecision, RetryPolicy};
pub use sequencer::{Collaborators, PipelineRunner};
pub use summary::{FailureRecord, RunSummary, UnitOutcome};
