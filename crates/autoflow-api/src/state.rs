//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! The engine is generic over repository and collaborator traits; AppState
//! pins it to the SQLite stores, the local text extractor and the Airtable
//! client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use autoflow_core::service::file::FileService;
use autoflow_core::service::workflow::WorkflowService;
use autoflow_core::workflow::coordinator::ExecutionCoordinator;
use autoflow_core::workflow::scheduler::Scheduler;
use autoflow_infra::config::{load_global_config, resolve_data_dir, resolve_upload_dir};
use autoflow_infra::record_store::airtable::AirtableClient;
use autoflow_infra::sqlite::file::SqliteFileRepository;
use autoflow_infra::sqlite::pool::{DatabasePool, database_url};
use autoflow_infra::sqlite::workflow::SqliteWorkflowRepository;
use autoflow_infra::storage::extractor::LocalTextExtractor;
use autoflow_types::config::GlobalConfig;

/// Concrete type aliases for the engine generics pinned to infra implementations.
pub type ConcreteCoordinator = ExecutionCoordinator<
    SqliteWorkflowRepository,
    SqliteFileRepository,
    LocalTextExtractor,
    AirtableClient,
>;

pub type ConcreteScheduler =
    Scheduler<SqliteWorkflowRepository, SqliteFileRepository, LocalTextExtractor, AirtableClient>;

pub type ConcreteWorkflowService = WorkflowService<
    SqliteWorkflowRepository,
    SqliteFileRepository,
    LocalTextExtractor,
    AirtableClient,
>;

pub type ConcreteFileService = FileService<SqliteFileRepository, LocalTextExtractor>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow_service: Arc<ConcreteWorkflowService>,
    pub file_service: Arc<ConcreteFileService>,
    pub coordinator: Arc<ConcreteCoordinator>,
    pub scheduler: Arc<ConcreteScheduler>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state from the resolved data directory.
    pub async fn init() -> anyhow::Result<Self> {
        Self::open(resolve_data_dir()).await
    }

    /// Connect to the database under `data_dir` and wire every service.
    pub async fn open(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;

        let upload_dir = resolve_upload_dir(&config, &data_dir);
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", upload_dir.display()))?;

        let db_pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .context("Failed to open database")?;

        let workflows = Arc::new(SqliteWorkflowRepository::new(db_pool.clone()));
        let files = Arc::new(SqliteFileRepository::new(db_pool.clone()));
        let extractor = Arc::new(LocalTextExtractor::new());
        let records = Arc::new(
            AirtableClient::new(&config.record_store)
                .context("Failed to build record-store client")?,
        );

        let coordinator = Arc::new(ExecutionCoordinator::new(
            workflows.clone(),
            files.clone(),
            extractor.clone(),
            records,
        ));

        // A zero interval would spin the scheduler loop.
        let interval = Duration::from_secs(config.scheduler_interval_secs.max(1));
        let scheduler = Arc::new(Scheduler::new(
            workflows.clone(),
            coordinator.clone(),
            interval,
            config.max_workflow_executions,
        ));

        let workflow_service = WorkflowService::new(workflows, coordinator.clone());
        let file_service = FileService::new(files, extractor);

        Ok(Self {
            workflow_service: Arc::new(workflow_service),
            file_service: Arc::new(file_service),
            coordinator,
            scheduler,
            config: Arc::new(config),
            data_dir,
            upload_dir,
        })
    }
}
