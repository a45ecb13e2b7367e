//! Enumeration of design units from disk.
//!
//! Designs live at `<assets>/<NAME>.png`. Mockups are picked up from
//! `<assets>/mockups/<NAME>/*.png` or `<assets>/mockups/<NAME>_*.png`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::DesignUnit;
use crate::errors::{PodflowError, PodflowResult};

/// Extension of design and mockup images.
pub const IMAGE_EXTENSION: &str = "png";

/// Finds design units under an assets directory.
#[derive(Debug, Clone)]
pub struct Discovery {
    assets_dir: PathBuf,
}

impl Discovery {
    /// Creates a discovery rooted at `assets_dir`.
    #[must_use]
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
        }
    }

    /// Units for explicit names, in the given order.
    ///
    /// Image files are not required to exist here; a missing file fails
    /// that unit at upload time.
    pub fn from_names<S: AsRef<str>>(&self, names: &[S]) -> PodflowResult<Vec<DesignUnit>> {
        let mut seen = HashSet::new();
        let mut units = Vec::with_capacity(names.len());
        for raw in names {
            let name = raw.as_ref().trim();
            if name.is_empty() {
                return Err(PodflowError::invalid_input("design names must not be empty"));
            }
            if !seen.insert(name.to_string()) {
                return Err(PodflowError::invalid_input(format!(
                    "design name '{name}' appears more than once"
                )));
            }
            units.push(self.unit(name)?);
        }
        Ok(units)
    }

    /// Units for the names listed in a word file.
    pub fn from_words_file(&self, path: &Path) -> PodflowResult<Vec<DesignUnit>> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PodflowError::invalid_input(format!("cannot read word list {}: {e}", path.display()))
        })?;
        self.from_names(&parse_word_list(&raw))
    }

    /// Units for every image directly inside the assets directory, sorted
    /// by name.
    pub fn from_assets_dir(&self) -> PodflowResult<Vec<DesignUnit>> {
        let mut names: Vec<String> = list_images(&self.assets_dir)
            .map_err(|e| {
                PodflowError::invalid_input(format!(
                    "cannot list assets in {}: {e}",
                    self.assets_dir.display()
                ))
            })?
            .iter()
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        self.from_names(&names)
    }

    fn unit(&self, name: &str) -> PodflowResult<DesignUnit> {
        let image = self.assets_dir.join(format!("{name}.{IMAGE_EXTENSION}"));
        let mockups = self.mockups_for(name)?;
        tracing::debug!(unit = name, mockups = mockups.len(), "discovered unit");
        Ok(DesignUnit::new(name, image).with_mockups(mockups))
    }

    fn mockups_for(&self, name: &str) -> PodflowResult<Vec<PathBuf>> {
        let root = self.assets_dir.join("mockups");
        let mut found = Vec::new();

        let per_unit = root.join(name);
        if per_unit.is_dir() {
            found.extend(list_images(&per_unit)?);
        }
        if root.is_dir() {
            let prefix = format!("{name}_");
            found.extend(list_images(&root)?.into_iter().filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))
            }));
        }
        found.sort();
        Ok(found)
    }
}

/// Extracts names from a word list: one per line or the first CSV column.
///
/// Blank lines, `#` comments and a `word`/`name` header are skipped.
#[must_use]
pub fn parse_word_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split(',').next())
        .map(|cell| cell.trim().trim_matches('"').trim().to_string())
        .filter(|cell| !cell.is_empty())
        .enumerate()
        .filter(|(i, cell)| {
            !(*i == 0 && (cell.eq_ignore_ascii_case("word") || cell.eq_ignore_ascii_case("name")))
        })
        .map(|(_, cell)| cell)
        .collect()
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .is_some_and(|ext| ext == IMAGE_EXTENSION);
        if path.is_file() && is_image {
            images.push(path);
        }
    }
    Ok(images)
}
