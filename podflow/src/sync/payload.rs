//! Product payloads sent to the commerce API.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::core::ListingContent;
use crate::errors::{PodflowError, PodflowResult};

/// Where the design sits on the product, as fractions of a canonical print
/// area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementPolicy {
    /// Width of the canonical print area in pixels.
    #[serde(default = "default_area_width")]
    pub area_width: u32,
    /// Height of the canonical print area in pixels.
    #[serde(default = "default_area_height")]
    pub area_height: u32,
    /// Design width as a fraction of `area_width`.
    #[serde(default = "default_width_fraction")]
    pub width_fraction: f64,
    /// Design height as a fraction of `area_height`.
    #[serde(default = "default_height_fraction")]
    pub height_fraction: f64,
    /// Top offset as a fraction of `area_height`.
    #[serde(default = "default_top_fraction")]
    pub top_fraction: f64,
    /// Left offset as a fraction of `area_width`.
    #[serde(default)]
    pub left_fraction: f64,
}

fn default_area_width() -> u32 {
    1800
}

fn default_area_height() -> u32 {
    2400
}

fn default_width_fraction() -> f64 {
    1.0
}

fn default_height_fraction() -> f64 {
    0.5
}

fn default_top_fraction() -> f64 {
    0.1
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            area_width: default_area_width(),
            area_height: default_area_height(),
            width_fraction: default_width_fraction(),
            height_fraction: default_height_fraction(),
            top_fraction: default_top_fraction(),
            left_fraction: 0.0,
        }
    }
}

impl PlacementPolicy {
    /// Checks that every fraction lies in `[0, 1]` and the design fits.
    pub fn validate(&self) -> PodflowResult<()> {
        let fractions = [
            ("width_fraction", self.width_fraction),
            ("height_fraction", self.height_fraction),
            ("top_fraction", self.top_fraction),
            ("left_fraction", self.left_fraction),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(PodflowError::invalid_input(format!(
                    "placement {name} must be between 0 and 1 (got {value})"
                )));
            }
        }
        if self.left_fraction + self.width_fraction > 1.0 + f64::EPSILON
            || self.top_fraction + self.height_fraction > 1.0 + f64::EPSILON
        {
            return Err(PodflowError::invalid_input(
                "placement does not fit inside the print area",
            ));
        }
        Ok(())
    }

    /// Converts the fractions into a pixel position block.
    #[must_use]
    pub fn position(&self) -> Position {
        let scale = |fraction: f64, total: u32| -> u32 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let px = (fraction * f64::from(total)).round() as u32;
            px
        };
        Position {
            area_width: self.area_width,
            area_height: self.area_height,
            width: scale(self.width_fraction, self.area_width),
            height: scale(self.height_fraction, self.area_height),
            top: scale(self.top_fraction, self.area_height),
            left: scale(self.left_fraction, self.area_width),
        }
    }
}

/// Pixel placement block understood by the commerce API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Print area width.
    pub area_width: u32,
    /// Print area height.
    pub area_height: u32,
    /// Design width.
    pub width: u32,
    /// Design height.
    pub height: u32,
    /// Offset from the top.
    pub top: u32,
    /// Offset from the left.
    pub left: u32,
}

/// Platform-specific shape of the sync payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncVariant {
    /// Plain sync product on a manual/API store.
    #[default]
    Printful,
    /// Store linked to Etsy: adds an external id, listing copy and mockup
    /// previews.
    EtsyLinked,
}

/// Everything needed to sync one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Design name.
    pub name: String,
    /// Hosted URL of the design image.
    pub design_url: String,
    /// Hosted mockup URLs.
    pub mockup_urls: Vec<String>,
    /// Listing copy.
    pub listing: ListingContent,
    /// Retail price as configured, e.g. `"34.99"`.
    pub price: String,
}

impl SyncRequest {
    /// Checks all required fields and returns the parsed price.
    ///
    /// Every failure is [`PodflowError::InvalidInput`] and is never retried.
    pub fn validate(&self) -> PodflowResult<f64> {
        let required = [
            ("design name", self.name.as_str()),
            ("asset URL", self.design_url.as_str()),
            ("title", self.listing.title.as_str()),
            ("description", self.listing.description.as_str()),
            ("price", self.price.as_str()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();
        if !missing.is_empty() {
            return Err(PodflowError::invalid_input(format!(
                "product sync for '{}' is missing: {}",
                self.name,
                missing.join(", ")
            )));
        }

        parse_price(&self.price)
    }
}

/// Parses a positive price.
pub fn parse_price(raw: &str) -> PodflowResult<f64> {
    let cleaned = raw.trim().trim_start_matches('$');
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(PodflowError::invalid_input(format!(
            "price must be a positive number (got '{raw}')"
        ))),
    }
}

/// Top-level payload for product creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    /// Product-level fields.
    pub sync_product: SyncProduct,
    /// One entry per catalog variant.
    pub sync_variants: Vec<SyncVariantPayload>,
}

/// Product-level fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProduct {
    /// Product name (the listing title).
    pub name: String,
    /// Thumbnail URL.
    pub thumbnail: String,
    /// Stable external id for linked platforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Listing description for linked platforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Listing tags for linked platforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// One catalog variant of the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncVariantPayload {
    /// Catalog variant id.
    pub variant_id: u64,
    /// Retail price with two decimals.
    pub retail_price: String,
    /// Stable external id for linked platforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Print and preview files.
    pub files: Vec<PrintFile>,
}

/// A print or preview file attached to a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintFile {
    /// `default` for the print file, `preview` for mockups.
    #[serde(rename = "type")]
    pub file_type: String,
    /// Hosted URL.
    pub url: String,
    /// Placement; only set on the print file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl ProductPayload {
    /// Builds the payload for a validated request.
    pub fn build(
        request: &SyncRequest,
        variant_ids: &[u64],
        placement: &PlacementPolicy,
        variant: SyncVariant,
    ) -> PodflowResult<Self> {
        let price = request.validate()?;
        if variant_ids.is_empty() {
            return Err(PodflowError::invalid_input(
                "at least one catalog variant id must be configured",
            ));
        }
        placement.validate()?;

        let linked = variant == SyncVariant::EtsyLinked;
        let product_external_id = linked.then(|| external_id(&request.name));
        let position = placement.position();
        let retail_price = format!("{price:.2}");

        let sync_variants = variant_ids
            .iter()
            .map(|&variant_id| {
                let mut files = vec![PrintFile {
                    file_type: "default".to_string(),
                    url: request.design_url.clone(),
                    position: Some(position),
                }];
                if linked {
                    files.extend(request.mockup_urls.iter().map(|url| PrintFile {
                        file_type: "preview".to_string(),
                        url: url.clone(),
                        position: None,
                    }));
                }
                SyncVariantPayload {
                    variant_id,
                    retail_price: retail_price.clone(),
                    external_id: product_external_id
                        .as_ref()
                        .map(|id| format!("{id}-{variant_id}")),
                    files,
                }
            })
            .collect();

        Ok(Self {
            sync_product: SyncProduct {
                name: request.listing.title.clone(),
                thumbnail: request
                    .mockup_urls
                    .first()
                    .unwrap_or(&request.design_url)
                    .clone(),
                external_id: product_external_id,
                description: linked.then(|| request.listing.description.clone()),
                tags: linked.then(|| request.listing.tags.clone()),
            },
            sync_variants,
        })
    }
}

/// Stable external id derived from the design name.
#[must_use]
pub fn external_id(name: &str) -> String {
    let digest = Md5::digest(name.trim().to_lowercase().as_bytes());
    let hex = format!("{digest:x}");
    format!("pod-{}", &hex[..12])
}
