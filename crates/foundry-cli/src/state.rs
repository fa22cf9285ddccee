//! Application state wiring every component together.
//!
//! Core components are generic over repository/filesystem/generator traits;
//! AppState pins them to the concrete infra implementations. One registry
//! and one gateway exist per process and are shared by reference.

use std::path::PathBuf;
use std::sync::Arc;

use foundry_core::launch::LaunchController;
use foundry_core::llm::gateway::ProviderGateway;
use foundry_core::materializer::{ProgramTemplate, WorkerMaterializer};
use foundry_core::pipeline::BuildPipeline;
use foundry_core::planner::Planner;
use foundry_core::registry::CapabilityRegistry;
use foundry_core::synthesizer::CapabilitySynthesizer;
use foundry_infra::config::{apply_env_overrides, load_config};
use foundry_infra::filesystem::{LocalFileSystem, resolve_data_dir};
use foundry_infra::llm::build_providers;
use foundry_infra::process::DetachedSpawner;
use foundry_infra::sandbox::SubprocessValidator;
use foundry_infra::sqlite::capability::SqliteCapabilityRepository;
use foundry_infra::sqlite::pool::{DatabasePool, database_url};
use foundry_infra::sqlite::trace::SqliteTraceRepository;
use foundry_infra::sqlite::worker::{SqliteRunRepository, SqliteWorkerRepository};
use foundry_types::config::FoundryConfig;

/// Concrete type aliases for the core generics pinned to infra implementations.
pub type ConcreteGateway = Arc<ProviderGateway<SqliteTraceRepository>>;

pub type ConcreteRegistry = CapabilityRegistry<SqliteCapabilityRepository>;

pub type ConcretePlanner = Planner<ConcreteGateway, SqliteTraceRepository>;

pub type ConcreteSynthesizer =
    CapabilitySynthesizer<ConcreteGateway, LocalFileSystem, SqliteTraceRepository>;

pub type ConcreteMaterializer = WorkerMaterializer<SqliteWorkerRepository, LocalFileSystem>;

pub type ConcreteLauncher =
    LaunchController<SqliteWorkerRepository, LocalFileSystem, DetachedSpawner>;

pub type ConcretePipeline<'a> = BuildPipeline<
    'a,
    ConcreteGateway,
    SqliteTraceRepository,
    LocalFileSystem,
    SqliteCapabilityRepository,
    SubprocessValidator,
    SqliteWorkerRepository,
    DetachedSpawner,
>;

/// Shared application state used by every CLI command.
pub struct AppState {
    pub config: FoundryConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub gateway: ConcreteGateway,
    pub registry: ConcreteRegistry,
    pub planner: ConcretePlanner,
    pub synthesizer: ConcreteSynthesizer,
    pub validator: SubprocessValidator,
    pub materializer: ConcreteMaterializer,
    pub launcher: ConcreteLauncher,
    pub workers: SqliteWorkerRepository,
    pub runs: SqliteRunRepository,
    pub trace: SqliteTraceRepository,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire components.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let mut config = load_config(&data_dir).await;
        apply_env_overrides(&mut config);

        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let trace = SqliteTraceRepository::new(db_pool.clone());
        let workers = SqliteWorkerRepository::new(db_pool.clone());
        let runs = SqliteRunRepository::new(db_pool.clone());

        let providers = build_providers(&config.providers);
        if providers.is_empty() {
            tracing::warn!("No text-generation providers configured");
        }
        let gateway = Arc::new(ProviderGateway::new(
            config.gateway.clone(),
            providers,
            trace.clone(),
        ));

        let registry = CapabilityRegistry::new(SqliteCapabilityRepository::new(db_pool.clone()));
        let planner = Planner::new(gateway.clone(), trace.clone());
        let synthesizer = CapabilitySynthesizer::new(
            gateway.clone(),
            LocalFileSystem::new(),
            trace.clone(),
            LocalFileSystem::capabilities_dir(&data_dir),
            config.sandbox.mock_env_var.clone(),
        );
        let validator = SubprocessValidator::new(&config.sandbox);

        // Worker programs exec this very binary.
        let template = ProgramTemplate {
            launcher: std::env::current_exe()?,
            data_dir: data_dir.clone(),
        };
        let materializer = WorkerMaterializer::new(workers.clone(), LocalFileSystem::new(), template);
        let launcher = LaunchController::new(
            workers.clone(),
            LocalFileSystem::new(),
            DetachedSpawner::new(),
        );

        Ok(Self {
            config,
            data_dir,
            db_pool,
            gateway,
            registry,
            planner,
            synthesizer,
            validator,
            materializer,
            launcher,
            workers,
            runs,
            trace,
        })
    }

    /// Borrow the build pipeline over this state's components.
    pub fn pipeline(&self) -> ConcretePipeline<'_> {
        BuildPipeline {
            registry: &self.registry,
            planner: &self.planner,
            synthesizer: &self.synthesizer,
            validator: &self.validator,
            materializer: &self.materializer,
            launcher: &self.launcher,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("foundry.db")
    }
}
