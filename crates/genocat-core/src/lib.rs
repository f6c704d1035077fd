//! # genocat-core
//!
//! Core crate for the Genocat study catalog. Contains traits, configuration
//! schemas, typed identifiers, principal/member parsing, the study
//! configuration document, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Genocat crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::CatalogError;
pub use result::CatalogResult;
