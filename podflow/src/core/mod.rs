//! Core domain model types for podflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Design units and upload results
//! - Generated listing content
//! - Product records
//! - Per-unit stage and state enums

mod listing;
mod product;
mod status;
mod unit;

pub use listing::{ListingContent, MAX_TAGS};
pub use product::ProductRecord;
pub use status::{UnitStage, UnitState};
pub use unit::{DesignUnit, UnitUploads, UploadResult};
