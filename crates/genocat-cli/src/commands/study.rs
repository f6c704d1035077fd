//! Study configuration subcommands.

use clap::Subcommand;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_metadata::ReadOptions;

use crate::output::print_json;

use super::CliContext;

/// Study configuration inspection.
#[derive(Debug, Subcommand)]
pub enum StudyCommand {
    /// Show a study configuration document.
    Config {
        /// Study name or id.
        study: String,
        /// Serve from the process cache without consulting the store.
        #[arg(long)]
        cached: bool,
    },
    /// List every study with a configuration.
    List,
    /// Show the batch-operation history of a study.
    Batches {
        /// Study name or id.
        study: String,
    },
}

impl StudyCommand {
    /// Run the command.
    pub async fn run(self, context: &CliContext) -> CatalogResult<()> {
        match self {
            Self::Config { study, cached } => {
                let options = if cached {
                    ReadOptions::cached()
                } else {
                    ReadOptions::fresh()
                };
                let config = context
                    .metadata
                    .get_by_name(&study, options)
                    .await?
                    .ok_or_else(|| {
                        CatalogError::not_found(format!(
                            "Study configuration {study} not found"
                        ))
                    })?;
                print_json(&config)
            }
            Self::List => {
                let studies = context.metadata.studies().await?;
                print_json(&studies)
            }
            Self::Batches { study } => {
                let config = context
                    .metadata
                    .get_by_name(&study, ReadOptions::fresh())
                    .await?
                    .ok_or_else(|| {
                        CatalogError::not_found(format!(
                            "Study configuration {study} not found"
                        ))
                    })?;
                print_json(&config.batches)
            }
        }
    }
}
