//! Generated listing copy.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::{PodflowError, PodflowResult};

/// Maximum number of tags kept on a listing.
pub const MAX_TAGS: usize = 13;

/// Marketing copy for one design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingContent {
    /// Listing title.
    pub title: String,
    /// Listing description.
    pub description: String,
    /// Search tags, in generator order.
    pub tags: Vec<String>,
}

impl ListingContent {
    /// Builds validated content.
    ///
    /// Fields are trimmed, empty and duplicate tags are dropped and the tag
    /// list is capped at [`MAX_TAGS`]. Fails with
    /// [`PodflowError::MalformedContent`] if any field ends up empty.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> PodflowResult<Self> {
        let mut seen = HashSet::new();
        let tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.into().trim().trim_start_matches('#').trim().to_string())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.to_lowercase()))
            .take(MAX_TAGS)
            .collect();

        let content = Self {
            title: title.into().trim().to_string(),
            description: description.into().trim().to_string(),
            tags,
        };
        content.validate()?;
        Ok(content)
    }

    /// Checks that title, description and tags are all non-empty.
    pub fn validate(&self) -> PodflowResult<()> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.tags.iter().all(|t| t.trim().is_empty()) {
            missing.push("tags");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PodflowError::malformed(format!(
                "missing or empty field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Returns true if the content passes [`validate`](Self::validate).
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.validate().is_ok()
    }
}
