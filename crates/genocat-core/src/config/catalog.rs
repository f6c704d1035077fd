//! Catalog id-space settings.

use serde::{Deserialize, Serialize};

/// Settings for the numeric id space of catalog entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Entity ids are only valid strictly above this offset. References
    /// that parse as numbers at or below the offset are treated as names.
    #[serde(default = "default_id_offset")]
    pub id_offset: i64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            id_offset: default_id_offset(),
        }
    }
}

fn default_id_offset() -> i64 {
    0
}
