//! Unified catalog error types.
//!
//! All crates map their internal errors into [`CatalogError`] for consistent
//! propagation through the ? operator.

use std::fmt;

use thiserror::Error;

/// Top-level error kind categorization used across the entire catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// An id, name, or path does not resolve to an existing entity.
    NotFound,
    /// A bare name matched more than one entity.
    Ambiguous,
    /// An ACL check denied the operation.
    PermissionDenied,
    /// A malformed id, unknown permission name, or bad member reference.
    InvalidArgument,
    /// An operation precondition was violated (e.g. a member lacks the
    /// required study-level ACL).
    Precondition,
    /// Batch-operation admission was rejected by the state machine.
    Conflict,
    /// A study lock could not be acquired in time.
    Timeout,
    /// Output of an external tool could not be parsed.
    Malformed,
    /// A configuration file or environment overlay is invalid.
    Configuration,
    /// A database error occurred.
    Database,
    /// An adaptor or scheduler I/O failure.
    Internal,
}

impl ErrorKind {
    /// Process exit code for the CLI wrapper.
    ///
    /// 0 success, 1 malformed arguments, 2 permission denied, 3 not found,
    /// 4 lock or concurrency conflict, 5 internal.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument | Self::Malformed | Self::Configuration | Self::Precondition => 1,
            Self::PermissionDenied => 2,
            Self::NotFound | Self::Ambiguous => 3,
            Self::Timeout | Self::Conflict => 4,
            Self::Database | Self::Internal => 5,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Ambiguous => write!(f, "AMBIGUOUS"),
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            Self::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            Self::Precondition => write!(f, "PRECONDITION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Malformed => write!(f, "MALFORMED"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Database => write!(f, "DATABASE"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout Genocat.
///
/// Crate-specific failures are mapped into `CatalogError` using `From` impls
/// or explicit `.map_err()` calls, so that every fallible surface exposes a
/// single error type.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct CatalogError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable, single-sentence message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CatalogError {
    /// Create a new catalog error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new catalog error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an ambiguous-reference error.
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ambiguous, message)
    }

    /// Create a permission-denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Permission-denied error in the canonical "deny" form.
    pub fn deny(user: &str, permission: impl fmt::Display, resource: &str, id: i64) -> Self {
        Self::new(
            ErrorKind::PermissionDenied,
            format!("Permission denied. {user} cannot {permission} {resource} {{ id: {id} }}"),
        )
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Precondition, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a lock-timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a malformed-output error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether this error is normal control flow (not logged as an error).
    pub fn is_control_flow(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound | ErrorKind::PermissionDenied)
    }
}

impl Clone for CatalogError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Internal,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for CatalogError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ErrorKind::PermissionDenied.exit_code(), 2);
        assert_eq!(ErrorKind::NotFound.exit_code(), 3);
        assert_eq!(ErrorKind::Ambiguous.exit_code(), 3);
        assert_eq!(ErrorKind::Timeout.exit_code(), 4);
        assert_eq!(ErrorKind::Conflict.exit_code(), 4);
        assert_eq!(ErrorKind::Internal.exit_code(), 5);
        assert_eq!(ErrorKind::InvalidArgument.exit_code(), 1);
    }

    #[test]
    fn test_control_flow_errors_are_not_logged() {
        assert!(CatalogError::not_found("x").is_control_flow());
        assert!(CatalogError::permission_denied("x").is_control_flow());
        assert!(!CatalogError::internal("x").is_control_flow());
    }
}
