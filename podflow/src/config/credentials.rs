//! Store selection and credential resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::EnvSource;
use crate::errors::{PodflowError, PodflowResult};

/// Which commerce account a run operates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Manual/API Printful store.
    #[default]
    Manual,
    /// Printful store linked to an Etsy shop.
    Etsy,
}

impl StoreKind {
    /// Configuration key holding the API key for this store.
    #[must_use]
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Manual => "PRINTFUL_API_KEY",
            Self::Etsy => "PRINTFUL_ETSY_API_KEY",
        }
    }

    /// Configuration key holding the store id for this store.
    #[must_use]
    pub fn store_id_var(self) -> &'static str {
        match self {
            Self::Manual => "PRINTFUL_STORE_ID",
            Self::Etsy => "PRINTFUL_ETSY_STORE_ID",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Etsy => write!(f, "etsy"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = PodflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "printful" => Ok(Self::Manual),
            "etsy" => Ok(Self::Etsy),
            other => Err(PodflowError::invalid_input(format!(
                "unknown store '{other}' (expected 'manual' or 'etsy')"
            ))),
        }
    }
}

/// API key and account id for one store. Immutable for a run.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    store: StoreKind,
    api_key: String,
    store_id: String,
}

impl StoreCredentials {
    /// Creates credentials directly.
    #[must_use]
    pub fn new(store: StoreKind, api_key: impl Into<String>, store_id: impl Into<String>) -> Self {
        Self {
            store,
            api_key: api_key.into(),
            store_id: store_id.into(),
        }
    }

    /// The store these credentials select.
    #[must_use]
    pub fn store(&self) -> StoreKind {
        self.store
    }

    /// The API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The store/account id.
    #[must_use]
    pub fn store_id(&self) -> &str {
        &self.store_id
    }
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("store", &self.store)
            .field("api_key", &redact(&self.api_key))
            .field("store_id", &self.store_id)
            .finish()
    }
}

/// Keys for the completion endpoint and the file host.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceKeys {
    /// Bearer key for the completion endpoint.
    pub completion_api_key: String,
    /// Bearer token for the file host.
    pub host_token: String,
}

impl fmt::Debug for ServiceKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKeys")
            .field("completion_api_key", &redact(&self.completion_api_key))
            .field("host_token", &redact(&self.host_token))
            .finish()
    }
}

/// Configuration key for the completion endpoint API key.
pub const COMPLETION_API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Configuration key for the file host token.
pub const HOST_TOKEN_VAR: &str = "ASSET_HOST_TOKEN";

/// Resolves the credentials for `store`.
///
/// Fails with [`PodflowError::MissingCredentials`] naming the first absent
/// key. Never falls back to another store.
pub fn resolve_credentials(source: &EnvSource, store: StoreKind) -> PodflowResult<StoreCredentials> {
    let api_key = require(source, store.api_key_var())?;
    let store_id = require(source, store.store_id_var())?;
    Ok(StoreCredentials::new(store, api_key, store_id))
}

/// Resolves the completion and host keys.
pub fn resolve_service_keys(source: &EnvSource) -> PodflowResult<ServiceKeys> {
    Ok(ServiceKeys {
        completion_api_key: require(source, COMPLETION_API_KEY_VAR)?.to_string(),
        host_token: require(source, HOST_TOKEN_VAR)?.to_string(),
    })
}

fn require<'a>(source: &'a EnvSource, key: &str) -> PodflowResult<&'a str> {
    source
        .get(key)
        .ok_or_else(|| PodflowError::missing_credentials(key))
}

/// Masks all but the last four characters.
#[must_use]
pub fn redact(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}
