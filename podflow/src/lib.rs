//! # Podflow
//!
//! Upload and product sync automation for print-on-demand designs.
//!
//! For every design unit podflow:
//!
//! - **Generates listing copy** through an OpenAI-compatible completion
//!   endpoint, parsing the reply strictly first and tolerantly second
//! - **Hosts the design and its mockups** on a file host, reconciling
//!   objects that already exist
//! - **Creates the product** on Printful, optionally linked to Etsy
//!
//! Every remote call goes through one retry-with-backoff executor. Units run
//! sequentially; a failing unit is recorded with the stage it could not
//! reach and the run continues.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use podflow::prelude::*;
//!
//! let env = EnvSource::from_env();
//! let config = RunConfig::resolve(None, &env)?;
//! let units = Discovery::new(&config.assets_dir).from_names(&["TACO", "MOLE"])?;
//!
//! let collaborators = Collaborators::for_config(&config, &env)?;
//! let runner = PipelineRunner::new(&config, collaborators, Arc::new(LoggingEventSink::default()))?;
//! let summary = runner.run(&units).await?;
//! println!("{}", summary.render_report());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod content;
pub mod core;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod results;
pub mod sync;
pub mod testing;
pub mod upload;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EnvSource, RunConfig, StoreCredentials, StoreKind};
    pub use crate::content::{ContentAdapter, ContentGenerator, ParsedContent};
    pub use crate::core::{
        DesignUnit, ListingContent, ProductRecord, UnitStage, UnitState, UploadResult,
    };
    pub use crate::discovery::Discovery;
    pub use crate::errors::{PodflowError, PodflowResult};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        with_retry, Collaborators, PipelineRunner, RetryPolicy, RunSummary, UnitOutcome,
    };
    pub use crate::results::ResultLog;
    pub use crate::sync::{CommerceApi, ProductSync, SyncRequest};
    pub use crate::upload::{AssetHost, AssetUploader};
    pub use std::sync::Arc;
}
