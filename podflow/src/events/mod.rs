//! Event sinks for pipeline observability.
//!
//! The retry executor and the sequencer report through an [`EventSink`]
//! passed in explicitly; there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by the crate.
pub mod names {
    /// A retried operation failed one attempt.
    pub const RETRY_ATTEMPT_FAILED: &str = "retry.attempt_failed";
    /// A retry was scheduled after a delay.
    pub const RETRY_SCHEDULED: &str = "retry.scheduled";
    /// All attempts failed.
    pub const RETRY_EXHAUSTED: &str = "retry.exhausted";
    /// A unit entered the pipeline.
    pub const UNIT_STARTED: &str = "unit.started";
    /// A unit completed a stage.
    pub const UNIT_STAGE_COMPLETED: &str = "unit.stage_completed";
    /// A unit reached `Synced`.
    pub const UNIT_SYNCED: &str = "unit.synced";
    /// A unit failed.
    pub const UNIT_FAILED: &str = "unit.failed";
    /// A run finished.
    pub const RUN_COMPLETED: &str = "run.completed";
}
