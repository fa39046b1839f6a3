//! Error types for janus
//!
//! This module defines the common error kinds surfaced by the storage
//! layer. The dual writer propagates the first failing store's error
//! unchanged; divergence between stores is never an error.

use thiserror::Error;

/// Common result type for janus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for janus
#[derive(Debug, Error)]
pub enum Error {
    /// The named object does not exist in the store that was asked
    #[error("{resource} {name:?} not found")]
    NotFound { resource: String, name: String },

    /// Optimistic-concurrency mismatch on resource version
    #[error("conflict writing {name:?}: {message}")]
    Conflict { name: String, message: String },

    /// A create or update validator rejected the object
    #[error("validation failed: {0}")]
    Validation(String),

    /// Programming error, e.g. a UID present on a create
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// The object does not carry identity metadata
    #[error("metadata accessor error: {0}")]
    Accessor(String),

    /// The backing store could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A bounded list returned at least `limit` records
    #[error("store has {limit} or more records, refusing partial work")]
    ListTooLarge { limit: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error
    pub fn not_found(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid-object error
    pub fn invalid_object(msg: impl Into<String>) -> Self {
        Self::InvalidObject(msg.into())
    }

    /// Create an accessor error
    pub fn accessor(msg: impl Into<String>) -> Self {
        Self::Accessor(msg.into())
    }

    /// Create a store-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a not-found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an optimistic-concurrency conflict
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
