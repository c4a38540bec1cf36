//! Shared Error Types
//!
//! This module defines the error types used across the inbox crate.
//!
//! # Error Categories
//!
//! - `GatewayError` - Failures reported by a Remote Data Gateway adapter
//! - `InboxError` - Failures of inbox operations (fetch, thread updates, store handle)
//!
//! Configuration errors live next to the configuration types in
//! [`crate::shared::config`].
//!
//! # Usage
//!
//! ```rust
//! use roamly_inbox::shared::error::InboxError;
//!
//! let error = InboxError::validation("text", "Message text cannot be empty");
//! assert!(error.to_string().contains("text"));
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be moved out of spawned tasks.
use thiserror::Error;

/// Errors reported by a Remote Data Gateway
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never produced a response (connection, DNS, timeout)
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable error message
        message: String,
    },

    /// The backend rejected the caller's credentials
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message
        message: String,
    },

    /// The backend answered with an unexpected status
    #[error("Unexpected status {status}: {message}")]
    Status {
        /// HTTP-like status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The addressed document or collection does not exist
    #[error("Not found: {what}")]
    NotFound {
        /// Description of the missing resource
        what: String,
    },

    /// A response body could not be decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// A realtime subscription could not be established
    #[error("Subscription error: {message}")]
    Subscription {
        /// Human-readable error message
        message: String,
    },
}

impl GatewayError {
    /// Create a new transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new authorization error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a new unexpected-status error
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new subscription error
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::serialization(err.to_string());
        }
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                Self::unauthorized(err.to_string())
            }
            Some(status) => Self::status(status.as_u16(), err.to_string()),
            None => Self::transport(err.to_string()),
        }
    }
}

/// Errors produced by inbox operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InboxError {
    /// The gateway failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Input validation failed
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// A document could not be converted into a domain type
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// The reconciliation task behind a handle has stopped
    #[error("inbox store is closed")]
    StoreClosed,
}

impl InboxError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for InboxError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
