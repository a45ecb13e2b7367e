//! Error types for the podflow pipeline.
//!
//! Every fallible operation in the crate returns [`PodflowError`]. The
//! variants double as the retry classification: only
//! [`PodflowError::TransientTransport`] is retried by the executor, every
//! other kind fails the current operation immediately.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result alias used across the crate.
pub type PodflowResult<T> = Result<T, PodflowError>;

/// The main error type for podflow operations.
#[derive(Debug, Error)]
pub enum PodflowError {
    /// Network failure, 5xx, timeout or rate limiting. Always retried.
    #[error("transient transport error: {message}")]
    TransientTransport {
        /// Human readable cause.
        message: String,
        /// HTTP status when the failure came from a response.
        status: Option<u16>,
    },

    /// A retried operation failed on every attempt.
    #[error("'{key}' failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        /// Operation key used for logging.
        key: String,
        /// Number of attempts made.
        attempts: usize,
        /// The error from the final attempt.
        #[source]
        source: Box<PodflowError>,
    },

    /// Generated listing content could not be parsed or validated.
    #[error("malformed content: {0}")]
    MalformedContent(String),

    /// A required configuration key is absent.
    #[error("missing credentials: configuration key '{key}' is not set")]
    MissingCredentials {
        /// The missing configuration key.
        key: String,
    },

    /// Invalid argument, input file or configuration value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The remote API rejected the request on business grounds.
    #[error("rejected by remote API (status {status}): {message}")]
    DomainRejection {
        /// HTTP status code of the rejection.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PodflowError {
    /// Creates a transient transport error without a status.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientTransport {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a missing credentials error.
    #[must_use]
    pub fn missing_credentials(key: impl Into<String>) -> Self {
        Self::MissingCredentials { key: key.into() }
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a malformed content error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedContent(message.into())
    }

    /// Creates a domain rejection error.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::DomainRejection {
            status,
            message: message.into(),
        }
    }

    /// Classifies a non-success HTTP response.
    ///
    /// 408, 429 and 5xx are transient; every other status is a permanent
    /// rejection carrying the message extracted from `body`.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body);
        if status == 408 || status == 429 || (500..600).contains(&status) {
            Self::TransientTransport {
                message: format!("HTTP {status}: {message}"),
                status: Some(status),
            }
        } else {
            Self::rejected(status, message)
        }
    }

    /// Whether the retry executor may try the operation again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientTransport { .. })
    }

    /// Whether this error represents run-level misconfiguration.
    #[must_use]
    pub fn is_run_level(&self) -> bool {
        matches!(self, Self::MissingCredentials { .. } | Self::InvalidInput(_))
    }

    /// Whether the failure is a known limitation of the remote API rather
    /// than a defect.
    #[must_use]
    pub fn is_known_limitation(&self) -> bool {
        matches!(self, Self::DomainRejection { .. })
    }

    /// Stable kind name used in failure records and reports.
    #[must_use]
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::TransientTransport { .. } => "TransientTransportError",
            Self::ExhaustedRetries { .. } => "ExhaustedRetriesError",
            Self::MalformedContent(_) => "MalformedContentError",
            Self::MissingCredentials { .. } => "MissingCredentialsError",
            Self::InvalidInput(_) => "InvalidInputError",
            Self::DomainRejection { .. } => "DomainRejectionError",
            Self::Serialization(_) => "SerializationError",
            Self::Io(_) => "IoError",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.error_kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("retryable".to_string(), serde_json::json!(self.is_retryable()));

        match self {
            Self::TransientTransport {
                status: Some(status),
                ..
            }
            | Self::DomainRejection { status, .. } => {
                map.insert("status".to_string(), serde_json::json!(status));
            }
            Self::ExhaustedRetries { key, attempts, .. } => {
                map.insert("key".to_string(), serde_json::json!(key));
                map.insert("attempts".to_string(), serde_json::json!(attempts));
            }
            Self::MissingCredentials { key } => {
                map.insert("key".to_string(), serde_json::json!(key));
            }
            _ => {}
        }

        map
    }
}

impl From<serde_json::Error> for PodflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for PodflowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Serialization(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), &err.to_string());
        }
        if err.is_builder() {
            return Self::InvalidInput(err.to_string());
        }
        // connect, timeout, body and redirect failures
        Self::transient(err.to_string())
    }
}

/// Error body shapes returned by the remote APIs.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { error: String },
    Printful { result: String },
    Message { message: String },
}

#[derive(Debug, Deserialize, Serialize)]
struct ErrorDetail {
    message: String,
}

/// Pulls the most specific message out of an error response body.
fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Nested { error }) => error.message,
        Ok(ErrorBody::Flat { error }) => error,
        Ok(ErrorBody::Printful { result }) => result,
        Ok(ErrorBody::Message { message }) => message,
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.chars().take(300).collect()
            }
        }
    }
}
