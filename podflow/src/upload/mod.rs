//! Hosting of design and mockup images.

mod host;
mod uploader;

pub use host::{AssetHost, HttpAssetHost, PutOutcome};
pub use uploader::{checksums, default_object_name, AssetUploader};
