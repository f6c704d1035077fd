//! Catalog configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod catalog;
pub mod database;
pub mod lock;
pub mod logging;
pub mod scheduler;

use serde::{Deserialize, Serialize};

pub use self::catalog::CatalogSettings;
pub use self::database::DatabaseConfig;
pub use self::lock::LockConfig;
pub use self::logging::LoggingConfig;
pub use self::scheduler::{QueueConfig, SchedulerConfig};

use crate::error::CatalogError;

/// Root catalog configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Id-space and naming settings.
    #[serde(default)]
    pub catalog: CatalogSettings,
    /// Study-lock settings.
    #[serde(default)]
    pub lock: LockConfig,
    /// Batch-scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Metadata store connection settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CatalogConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `GENOCAT_`.
    pub fn load(env: &str) -> Result<Self, CatalogError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("GENOCAT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CatalogError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| CatalogError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
