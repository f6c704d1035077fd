//! Metadata store configuration.

use serde::{Deserialize, Serialize};

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Query timeout in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
}

fn default_max_connections() -> u32 {
    20
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    10
}
