//! Listing copy generation.

mod adapter;
mod client;
mod parse;

pub use adapter::ContentAdapter;
pub use client::{ContentGenerator, HttpCompletionClient};
pub use parse::{parse_listing, parse_strict, parse_tolerant, ParsedContent};
