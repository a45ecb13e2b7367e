//! Local result log.
//!
//! One pretty-printed JSON file per synced unit, named
//! `<name>_<timestamp>.json`. Existing files are never overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::{DesignUnit, ListingContent, ProductRecord, UnitUploads};
use crate::errors::{PodflowError, PodflowResult};
use crate::pipeline::RunSummary;

/// Timestamp format used in result file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Contents of one result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Run that produced the record.
    pub run_id: Uuid,
    /// Design name.
    pub name: String,
    /// Whether the run was a dry run.
    pub dry_run: bool,
    /// The synced product.
    pub product: ProductRecord,
    /// Listing copy the product was created with.
    pub listing: ListingContent,
    /// Hosted assets.
    pub uploads: UnitUploads,
    /// When the entry was written.
    pub recorded_at: DateTime<Utc>,
}

/// Writes result files under a directory.
#[derive(Debug, Clone)]
pub struct ResultLog {
    dir: PathBuf,
}

impl ResultLog {
    /// Creates a log rooted at `dir`. Nothing is created until the first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The results directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the record for one synced unit and returns its path.
    pub fn append(
        &self,
        run_id: Uuid,
        unit: &DesignUnit,
        product: &ProductRecord,
        listing: &ListingContent,
        uploads: &UnitUploads,
        dry_run: bool,
    ) -> PodflowResult<PathBuf> {
        let entry = ResultEntry {
            run_id,
            name: unit.name().to_string(),
            dry_run,
            product: product.clone(),
            listing: listing.clone(),
            uploads: uploads.clone(),
            recorded_at: Utc::now(),
        };
        let stem = format!(
            "{}_{}",
            unit.slug(),
            entry.recorded_at.format(FILE_TIMESTAMP_FORMAT)
        );
        self.write_new(&stem, &entry)
    }

    /// Writes the run summary as `run_<run_id>.json`.
    pub fn write_summary(&self, summary: &RunSummary) -> PodflowResult<PathBuf> {
        self.write_new(&format!("run_{}", summary.run_id), summary)
    }

    /// Reads every result entry in the directory, oldest file name first.
    pub fn entries(&self) -> PodflowResult<Vec<ResultEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json") && !is_summary_file(p))
            .collect();
        paths.sort();

        paths
            .iter()
            .map(|p| -> PodflowResult<ResultEntry> {
                Ok(serde_json::from_str(&std::fs::read_to_string(p)?)?)
            })
            .collect()
    }

    fn write_new<T: Serialize>(&self, stem: &str, value: &T) -> PodflowResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(value)?;

        // Same-millisecond collisions get a numeric suffix instead of
        // overwriting.
        for n in 0..100 {
            let name = if n == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}-{n}.json")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())?;
                    file.write_all(b"\n")?;
                    tracing::debug!(path = %path.display(), "result written");
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(PodflowError::invalid_input(format!(
            "could not find a free file name for {stem} in {}",
            self.dir.display()
        )))
    }
}

/// Whether `path` is a `run_<uuid>.json` summary.
fn is_summary_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("run_"))
        .is_some_and(|id| Uuid::parse_str(id).is_ok())
}
