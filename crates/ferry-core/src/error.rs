//! Error types for ferry core operations.
//!
//! Every crate in the workspace funnels its failures into [`Error`] before
//! they reach a caller, so the kinds here double as the replication error
//! taxonomy: validation problems are [`Error::BadRequest`], adapter I/O
//! failures are [`Error::Upstream`], and so on.

use std::fmt;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the replication control plane.
#[derive(Error, Debug)]
pub enum Error {
    /// The request failed validation.
    #[error("bad request: {reason}")]
    BadRequest {
        /// Reason the request was rejected.
        reason: String,
    },

    /// A referenced object does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Description of the missing object (e.g. `registry 3`).
        resource: String,
    },

    /// The operation is not supported by the target.
    #[error("unsupported: {reason}")]
    Unsupported {
        /// Reason the operation is unsupported.
        reason: String,
    },

    /// A registry adapter or another external collaborator failed.
    #[error("upstream error: {reason}")]
    Upstream {
        /// Failure reported by the collaborator.
        reason: String,
    },

    /// An argument passed to an entry point was empty or malformed.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Reason the argument is invalid.
        reason: String,
    },

    /// The target is not in a state that allows the operation.
    #[error("precondition failed: {reason}")]
    Precondition {
        /// Reason the precondition failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {reason}")]
    Internal {
        /// Reason for the internal error.
        reason: String,
    },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Validation failure.
    BadRequest,
    /// Missing object.
    NotFound,
    /// Unsupported operation or capability.
    Unsupported,
    /// Failure of an external collaborator.
    Upstream,
    /// Empty or malformed argument.
    InvalidArgument,
    /// State precondition violated.
    Precondition,
    /// Anything else, including serialization failures.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
            Self::Upstream => "upstream",
            Self::InvalidArgument => "invalid_argument",
            Self::Precondition => "precondition",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Creates a [`Error::BadRequest`].
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    /// Creates a [`Error::NotFound`].
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a [`Error::Unsupported`].
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }

    /// Creates a [`Error::Upstream`].
    pub fn upstream(reason: impl Into<String>) -> Self {
        Self::Upstream {
            reason: reason.into(),
        }
    }

    /// Creates a [`Error::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates a [`Error::Precondition`].
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
        }
    }

    /// Creates a [`Error::Internal`].
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Precondition { .. } => ErrorKind::Precondition,
            Self::Serialization(_) | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns true if retrying the operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_bad_request() {
        let err = Error::bad_request("the policy name is required");
        assert_eq!(err.to_string(), "bad request: the policy name is required");
    }

    #[test]
    fn test_error_display_not_found() {
        let err = Error::not_found("registry 3");
        assert_eq!(err.to_string(), "registry 3 not found");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::bad_request("x").kind(), ErrorKind::BadRequest);
        assert_eq!(Error::unsupported("x").kind(), ErrorKind::Unsupported);
        assert_eq!(Error::upstream("x").kind(), ErrorKind::Upstream);
        assert_eq!(Error::invalid_argument("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(Error::precondition("x").kind(), ErrorKind::Precondition);
        assert_eq!(Error::internal("x").kind(), ErrorKind::Internal);

        let serde_err = serde_json::from_str::<u8>("oops").unwrap_err();
        assert_eq!(Error::from(serde_err).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_only_upstream_is_retryable() {
        assert!(Error::upstream("connection reset").is_retryable());
        assert!(!Error::bad_request("bad cron").is_retryable());
        assert!(!Error::not_found("registry 1").is_retryable());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::BadRequest.to_string(), "bad_request");
        assert_eq!(ErrorKind::InvalidArgument.to_string(), "invalid_argument");
    }
}
