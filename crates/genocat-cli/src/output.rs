//! CLI output rendering.

use serde::Serialize;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> CatalogResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(CatalogError::from)?;
    println!("{rendered}");
    Ok(())
}
