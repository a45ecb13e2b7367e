//! Product records produced by a successful sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome of syncing one design unit to the commerce API.
///
/// Records are never updated in place; a re-run produces a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Remote product identifier.
    pub id: String,
    /// Public URL of the product, when the API returns one.
    pub external_url: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, external_url: Option<String>) -> Self {
        Self {
            id: id.into(),
            external_url,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_record_serialization() {
        let record = ProductRecord::new("12345", Some("https://shop/p/12345".into()));
        let json = serde_json::to_string(&record).unwrap();
        let back: ProductRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(back, record);
        assert!(json.contains("\"external_url\":\"https://shop/p/12345\""));
    }

    #[test]
    fn test_product_record_without_url() {
        let record = ProductRecord::new("1", None);
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["external_url"].is_null());
    }
}
