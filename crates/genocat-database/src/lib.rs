//! # genocat-database
//!
//! Implementations of the metadata adaptor: PostgreSQL for deployments and
//! an in-memory adaptor for tests and embedded use. Both uphold the same
//! contract: study locks provide cross-process mutual exclusion (scoped to
//! the process for the in-memory variant) and configuration reads observe
//! every completed write.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod postgres;

pub use connection::DatabasePool;
pub use memory::MemoryMetadataAdaptor;
pub use postgres::PostgresMetadataAdaptor;
