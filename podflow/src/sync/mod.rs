//! Product creation on the commerce platform.

mod adapter;
mod client;
mod payload;

pub use adapter::ProductSync;
pub use client::{CommerceApi, CreatedProduct, HttpCommerceApi};
pub use payload::{
    external_id, parse_price, PlacementPolicy, Position, PrintFile, ProductPayload, SyncProduct,
    SyncRequest, SyncVariant, SyncVariantPayload,
};
