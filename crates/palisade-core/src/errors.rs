//! Unified error system for Palisade
//!
//! A single error type shared by every crate in the workspace. Verification and
//! authorization failures are always surfaced as errors so that callers fail
//! closed; nothing in here is ever turned into an implicit allow.

use serde::{Deserialize, Serialize};

/// Unified error type for all Palisade operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum PalisadeError {
    /// Invalid input, malformed frame or broken construction invariant
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Access was refused by a decision or by sender checks
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Error message describing the permission issue
        message: String,
    },

    /// Cryptographic operation failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// Network or transport error
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// A requested resource did not arrive within its retry budget
    #[error("Timeout: {message}")]
    Timeout {
        /// Error message describing what timed out
        message: String,
    },

    /// A blocking wait was cancelled by shutdown
    #[error("Cancelled: {message}")]
    Cancelled {
        /// Error message describing the cancelled operation
        message: String,
    },

    /// A predicate referenced an attribute that is not present
    #[error("Attribute unavailable: {identifier}")]
    AttributeUnavailable {
        /// Identifier of the missing attribute
        identifier: String,
    },

    /// A predicate was evaluated against an attribute of the wrong type
    #[error("Incompatible attribute: {message}")]
    IncompatibleAttribute {
        /// Error message describing the type mismatch
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl PalisadeError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Create an unavailable attribute error
    pub fn attribute_unavailable(identifier: impl Into<String>) -> Self {
        Self::AttributeUnavailable {
            identifier: identifier.into(),
        }
    }

    /// Create an incompatible attribute error
    pub fn incompatible_attribute(message: impl Into<String>) -> Self {
        Self::IncompatibleAttribute {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the operation later might succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Network { .. } | Self::AttributeUnavailable { .. }
        )
    }
}

/// Standard Result type for Palisade operations
pub type Result<T> = std::result::Result<T, PalisadeError>;

impl From<serde_json::Error> for PalisadeError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for PalisadeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(err.to_string()),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                Self::timeout(err.to_string())
            }
            _ => Self::network(err.to_string()),
        }
    }
}
