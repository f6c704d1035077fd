//! # genocat-catalog
//!
//! The catalog service layer: identifier resolution, hierarchical
//! permission checks with a request-scoped ACL cache, ACL mutation, and the
//! job read operations built on top of them. Everything is written against
//! the injected [`genocat_core::traits::MetadataAdaptor`].

pub mod acl;
pub mod authz;
pub mod jobs;
pub mod resolver;

pub use acl::AclMutator;
pub use authz::{AuthorizationManager, StudyAuthContext};
pub use jobs::JobManager;
pub use resolver::CatalogResolver;
