//! Convenience result type alias for Genocat.

use crate::error::CatalogError;

/// A specialized `Result` type for catalog operations.
///
/// This is defined as a convenience so that every crate does not need to
/// write `Result<T, CatalogError>` explicitly.
pub type CatalogResult<T> = Result<T, CatalogError>;
