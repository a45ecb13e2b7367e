//! Parsing of generated listing text.
//!
//! Parsing is attempted in two tiers: a strict JSON parse, then a tolerant
//! field extraction for responses that only loosely follow the requested
//! format. Anything that survives neither is malformed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::core::ListingContent;
use crate::errors::{PodflowError, PodflowResult};

/// Listing content tagged with the parse tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", content = "content", rename_all = "snake_case")]
pub enum ParsedContent {
    /// The response contained a valid JSON object.
    Strict(ListingContent),
    /// Fields were recovered by pattern matching.
    Tolerant(ListingContent),
}

impl ParsedContent {
    /// The parsed content, whichever tier produced it.
    #[must_use]
    pub fn content(&self) -> &ListingContent {
        match self {
            Self::Strict(c) | Self::Tolerant(c) => c,
        }
    }

    /// Consumes self and returns the content.
    #[must_use]
    pub fn into_content(self) -> ListingContent {
        match self {
            Self::Strict(c) | Self::Tolerant(c) => c,
        }
    }

    /// Name of the tier, for logs.
    #[must_use]
    pub fn tier(&self) -> &'static str {
        match self {
            Self::Strict(_) => "strict",
            Self::Tolerant(_) => "tolerant",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawListing {
    title: String,
    description: String,
    #[serde(default)]
    tags: RawTags,
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum RawTags {
    List(Vec<String>),
    Csv(String),
    #[default]
    Missing,
}

impl RawTags {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::List(tags) => tags,
            Self::Csv(raw) => split_tags(&raw),
            Self::Missing => Vec::new(),
        }
    }
}

#[allow(clippy::expect_used)]
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid regex"));

#[allow(clippy::expect_used)]
static JSON_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"title"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});

#[allow(clippy::expect_used)]
static JSON_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"description"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});

#[allow(clippy::expect_used)]
static JSON_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)"tags"\s*:\s*\[(.*?)\]"#).expect("valid regex"));

#[allow(clippy::expect_used)]
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("valid regex"));

#[allow(clippy::expect_used)]
static LABEL_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#>\-]*title[\s*]*:[\s*]*(.+?)[\s*]*$").expect("valid regex")
});

#[allow(clippy::expect_used)]
static LABEL_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ims)^[\s*#>\-]*description[\s*]*:[\s*]*(.+?)\s*(?:^[\s*#>\-]*tags[\s*]*:|\z)")
        .expect("valid regex")
});

#[allow(clippy::expect_used)]
static LABEL_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#>\-]*tags[\s*]*:[\s*]*(.+?)\s*$").expect("valid regex")
});

/// Parses `text` as a JSON listing object.
///
/// The object may be wrapped in prose or a fenced code block. Returns `None`
/// if no object deserializes into valid content.
#[must_use]
pub fn parse_strict(text: &str) -> Option<ListingContent> {
    let body = FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }

    let raw: RawListing = serde_json::from_str(&body[start..=end]).ok()?;
    ListingContent::new(raw.title, raw.description, raw.tags.into_vec()).ok()
}

/// Recovers listing fields from loosely formatted text.
///
/// Understands quoted `"title": "..."` pairs and `Title:` style labelled
/// lines. Returns `None` if any field cannot be found.
#[must_use]
pub fn parse_tolerant(text: &str) -> Option<ListingContent> {
    let title = capture(&JSON_TITLE, text)
        .map(|t| unescape(&t))
        .or_else(|| capture(&LABEL_TITLE, text))?;
    let description = capture(&JSON_DESCRIPTION, text)
        .map(|d| unescape(&d))
        .or_else(|| capture(&LABEL_DESCRIPTION, text))?;

    let tags = capture(&JSON_TAGS, text)
        .map(|list| {
            QUOTED
                .captures_iter(&list)
                .filter_map(|c| c.get(1).map(|m| unescape(m.as_str())))
                .collect::<Vec<_>>()
        })
        .filter(|tags| !tags.is_empty())
        .or_else(|| capture(&LABEL_TAGS, text).map(|line| split_tags(&line)))?;

    ListingContent::new(title.trim_matches('"'), description, tags).ok()
}

/// Runs the strict parse, then the tolerant one.
///
/// Fails with [`PodflowError::MalformedContent`] when both tiers fail.
pub fn parse_listing(text: &str) -> PodflowResult<ParsedContent> {
    if text.trim().is_empty() {
        return Err(PodflowError::malformed("empty completion"));
    }
    if let Some(content) = parse_strict(text) {
        return Ok(ParsedContent::Strict(content));
    }
    if let Some(content) = parse_tolerant(text) {
        tracing::debug!("strict parse failed, recovered content with tolerant parse");
        return Ok(ParsedContent::Tolerant(content));
    }

    let preview: String = text.trim().chars().take(120).collect();
    Err(PodflowError::malformed(format!(
        "no title, description and tags found in completion: {preview:?}"
    )))
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split([',', ';', '#'])
        .map(|t| t.trim().trim_matches('"').trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}
