//! Design units and hosted asset results.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One word/graphic to be turned into a product listing.
///
/// Units are created by discovery and are read-only afterwards; every
/// downstream stage only borrows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignUnit {
    name: String,
    source_image_path: PathBuf,
    #[serde(default)]
    mockup_paths: Vec<PathBuf>,
}

impl DesignUnit {
    /// Creates a new design unit.
    #[must_use]
    pub fn new(name: impl Into<String>, source_image_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_image_path: source_image_path.into(),
            mockup_paths: Vec::new(),
        }
    }

    /// Attaches mockup renders, in color order.
    #[must_use]
    pub fn with_mockups(mut self, mockups: Vec<PathBuf>) -> Self {
        self.mockup_paths = mockups;
        self
    }

    /// The design identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path to the generated design asset.
    #[must_use]
    pub fn source_image_path(&self) -> &Path {
        &self.source_image_path
    }

    /// Per-color mockup renders.
    #[must_use]
    pub fn mockup_paths(&self) -> &[PathBuf] {
        &self.mockup_paths
    }

    /// A filesystem-safe slug of the name for result file names.
    #[must_use]
    pub fn slug(&self) -> String {
        let slug: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
            .collect();
        let trimmed = slug.trim_matches('-');
        if trimmed.is_empty() {
            "unit".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Outcome of hosting an asset.
///
/// Only built for a successful attempt; failures are reported as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Fetchable URL of the hosted asset.
    pub url: String,
    /// Attempt (1-based) that succeeded.
    pub attempt: usize,
    /// Hex MD5 of the uploaded bytes.
    pub checksum: String,
    /// True when the URL came from the already-exists reconciliation path.
    #[serde(default)]
    pub reconciled: bool,
}

impl UploadResult {
    /// Creates a new upload result.
    #[must_use]
    pub fn new(url: impl Into<String>, attempt: usize, checksum: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempt: attempt.max(1),
            checksum: checksum.into(),
            reconciled: false,
        }
    }

    /// Marks the result as reconciled from an existing resource.
    #[must_use]
    pub fn reconciled(mut self) -> Self {
        self.reconciled = true;
        self
    }
}

/// Hosted URLs for everything belonging to one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitUploads {
    /// The design image.
    pub design: Option<UploadResult>,
    /// Mockups, in the unit's mockup order.
    #[serde(default)]
    pub mockups: Vec<UploadResult>,
}

impl UnitUploads {
    /// URL of the design image, if uploaded.
    #[must_use]
    pub fn design_url(&self) -> Option<&str> {
        self.design.as_ref().map(|u| u.url.as_str())
    }

    /// URLs of the uploaded mockups.
    #[must_use]
    pub fn mockup_urls(&self) -> Vec<String> {
        self.mockups.iter().map(|u| u.url.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_unit_accessors() {
        let unit = DesignUnit::new("TACO", "/designs/TACO.png")
            .with_mockups(vec!["/m/TACO_black.png".into(), "/m/TACO_white.png".into()]);

        assert_eq!(unit.name(), "TACO");
        assert_eq!(unit.source_image_path(), Path::new("/designs/TACO.png"));
        assert_eq!(unit.mockup_paths().len(), 2);
    }

    #[test]
    fn test_slug() {
        assert_eq!(DesignUnit::new("TACO", "a").slug(), "TACO");
        assert_eq!(DesignUnit::new("Día de Muertos", "a").slug(), "D-a-de-Muertos");
        assert_eq!(DesignUnit::new("???", "a").slug(), "unit");
    }

    #[test]
    fn test_upload_result_attempt_is_at_least_one() {
        let result = UploadResult::new("https://cdn/x.png", 0, "abc");
        assert_eq!(result.attempt, 1);
        assert!(!result.reconciled);
        assert!(result.reconciled().reconciled);
    }

    #[test]
    fn test_unit_uploads_urls() {
        let uploads = UnitUploads {
            design: Some(UploadResult::new("https://cdn/d.png", 1, "a")),
            mockups: vec![UploadResult::new("https://cdn/m1.png", 2, "b")],
        };
        assert_eq!(uploads.design_url(), Some("https://cdn/d.png"));
        assert_eq!(uploads.mockup_urls(), vec!["https://cdn/m1.png".to_string()]);
        assert_eq!(UnitUploads::default().design_url(), None);
    }
}
