//! CLI command definitions and dispatch.

pub mod acl;
pub mod job;
pub mod study;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use genocat_catalog::{AclMutator, AuthorizationManager, CatalogResolver, JobManager};
use genocat_core::config::CatalogConfig;
use genocat_core::result::CatalogResult;
use genocat_core::traits::MetadataAdaptor;
use genocat_database::{DatabasePool, PostgresMetadataAdaptor};
use genocat_metadata::StudyConfigurationManager;
use genocat_scheduler::{SchedulerBridge, SgeScheduler};

/// Genocat: study catalog administration.
///
/// The caller identity is taken from `--user`; session authentication
/// happens upstream of this tool.
#[derive(Debug, Parser)]
#[command(name = "genocat", version, about)]
pub struct Cli {
    /// Principal performing the operation.
    #[arg(long, global = true, default_value = "anonymous")]
    pub user: String,

    /// Configuration environment (selects config/<env>.toml).
    #[arg(long, global = true, default_value = "development")]
    pub env: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect and mutate ACLs.
    #[command(subcommand)]
    Acl(acl::AclCommand),
    /// Submit jobs and reconcile their scheduler state.
    #[command(subcommand)]
    Job(job::JobCommand),
    /// Inspect study configurations.
    #[command(subcommand)]
    Study(study::StudyCommand),
}

/// Shared wiring for every command.
pub struct CliContext {
    pub user: String,
    pub adaptor: Arc<dyn MetadataAdaptor>,
    pub authz: AuthorizationManager,
    pub resolver: CatalogResolver,
    pub mutator: AclMutator,
    pub jobs: JobManager,
    pub metadata: StudyConfigurationManager,
    pub bridge: SchedulerBridge,
}

impl CliContext {
    async fn build(user: String, env: &str) -> CatalogResult<Self> {
        let config = CatalogConfig::load(env)?;
        let pool = DatabasePool::connect(&config.database).await?;
        genocat_database::migration::run_migrations(pool.pool(), config.catalog.id_offset).await?;

        let adaptor: Arc<dyn MetadataAdaptor> =
            Arc::new(PostgresMetadataAdaptor::new(pool.into_pool()));
        let authz = AuthorizationManager::new(Arc::clone(&adaptor));
        let resolver = CatalogResolver::new(Arc::clone(&adaptor), config.catalog.id_offset);
        let mutator = AclMutator::new(
            Arc::clone(&adaptor),
            authz.clone(),
            config.lock.clone(),
        );
        let jobs = JobManager::new(Arc::clone(&adaptor), authz.clone(), resolver.clone());
        let metadata =
            StudyConfigurationManager::new(Arc::clone(&adaptor), config.lock.clone());
        let bridge = SchedulerBridge::new(
            Arc::new(SgeScheduler::new(config.scheduler.clone())),
            config.scheduler.clone(),
        );

        Ok(Self {
            user,
            adaptor,
            authz,
            resolver,
            mutator,
            jobs,
            metadata,
            bridge,
        })
    }
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> CatalogResult<()> {
        let context = CliContext::build(self.user.clone(), &self.env).await?;
        match self.command {
            Commands::Acl(command) => command.run(&context).await,
            Commands::Job(command) => command.run(&context).await,
            Commands::Study(command) => command.run(&context).await,
        }
    }
}
