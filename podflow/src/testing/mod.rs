//! Testing utilities for podflow runs.
//!
//! In-memory collaborators that record their calls and can be scripted to
//! fail, so pipelines can be exercised without network access.

mod mocks;

pub use mocks::{MockAssetHost, MockContentGenerator, RecordingCommerceApi};
