/// Service setup and initialization
///
/// Wires together storage, the block-type catalog, the evaluation engine, the
/// revision manager and the schedule service, and runs the poller for the
/// lifetime of the process.

use crate::{
    config::Config,
    runtime::{engine::ExecutionEngine, executor::BlockExecutorRegistry, scheduler::ScheduleService},
    workflow::{registry::BlockTypeCatalog, revision::RevisionManager, storage::WorkflowStorage},
};
use anyhow::Result;
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Fully wired application components
#[derive(Debug, Clone)]
pub struct Runtime {
    pub storage: WorkflowStorage,
    pub catalog: Arc<BlockTypeCatalog>,
    pub engine: ExecutionEngine,
    pub revisions: RevisionManager,
    pub schedules: ScheduleService,
}

/// Filesystem path of a SQLite URL, if it names a file
fn sqlite_file_path(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}

/// Create every component from `config`
///
/// Creates the database directory when needed, initializes the schema and
/// loads the block-type catalog.
pub async fn create_runtime(config: &Config) -> Result<Runtime> {
    if let Some(dir) = sqlite_file_path(&config.database.url).and_then(Path::parent) {
        if !dir.as_os_str().is_empty() {
            tracing::info!("📁 Ensuring data directory exists: {}", dir.display());
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow::anyhow!("Failed to create data directory {}: {}", dir.display(), e))?;
        }
    }

    tracing::info!("📋 Opening workflow storage at {}", config.database.url);
    let storage = WorkflowStorage::connect(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open workflow storage: {}", e))?;

    tracing::info!("📚 Loading block type catalog");
    let catalog = Arc::new(BlockTypeCatalog::load(storage.clone()).await?);

    tracing::info!("⚙️ Initializing block executors");
    let executors = Arc::new(
        BlockExecutorRegistry::with_builtin(&config.executors)
            .map_err(|e| anyhow::anyhow!("Failed to initialize block executors: {}", e))?,
    );

    tracing::info!("🚀 Initializing evaluation engine");
    let engine = ExecutionEngine::new(executors, storage.clone());
    let revisions = RevisionManager::new(storage.clone(), Arc::clone(&catalog));
    let schedules = ScheduleService::new(engine.clone(), storage.clone(), config.scheduler.poll_interval());

    tracing::info!("✅ Runtime initialized successfully");
    Ok(Runtime {
        storage,
        catalog,
        engine,
        revisions,
        schedules,
    })
}

/// Run the schedule poller until Ctrl-C
pub async fn start_service(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Blockway...");

    let runtime = create_runtime(&config).await?;

    let cancel = CancellationToken::new();
    let schedules = runtime.schedules.clone();
    let poller_cancel = cancel.clone();
    let poller = tokio::spawn(async move { schedules.run(poller_cancel).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 Shutdown requested");

    cancel.cancel();
    if let Err(e) = poller.await {
        tracing::error!("❌ Schedule poller task failed: {}", e);
    }

    tracing::info!("👋 Blockway stopped");
    Ok(())
}
