//! Application state and composition.

use std::sync::Arc;

use anyhow::Context;

use crate::infrastructure::{
    broadcast::ChannelBroadcaster,
    clock::SystemClock,
    config::{AppConfig, StorageBackend},
    game_table::{GameTableConnections, HttpGameTableTransport},
    health::PreflightHealthProbe,
    memory::{InMemoryCatalog, InMemoryCooldownRepo, InMemoryInstanceRepo, InMemorySessionRepo},
    objective::StandardObjectiveCalculator,
    ports::{ActionTransportPort, ClockPort, CooldownRepo, InstanceRepo, SessionRepo},
    sqlite::{self, SqliteCooldownRepo, SqliteInstanceRepo, SqliteSessionRepo},
    tasks::BackgroundTasks,
};
use crate::use_cases::gamification::{
    ActionExecutor, CooldownTracker, GamificationService, InstanceManager,
};

/// Main application state.
///
/// Passed to HTTP/WebSocket handlers via Axum state.
pub struct App {
    pub config: AppConfig,
    pub gamification: Arc<GamificationService>,
    pub connections: Arc<GameTableConnections>,
    pub broadcaster: Arc<ChannelBroadcaster>,
    pub tasks: BackgroundTasks,
}

/// Storage ports for the configured backend.
struct Storage {
    instances: Arc<dyn InstanceRepo>,
    cooldowns: Arc<dyn CooldownRepo>,
    sessions: Arc<dyn SessionRepo>,
}

impl Storage {
    async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                tracing::info!("Using in-memory storage");
                Ok(Self {
                    instances: Arc::new(InMemoryInstanceRepo::new()),
                    cooldowns: Arc::new(InMemoryCooldownRepo::new()),
                    sessions: Arc::new(InMemorySessionRepo::new()),
                })
            }
            StorageBackend::Sqlite => {
                let path = &config.storage.sqlite_path;
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent)
                            .await
                            .with_context(|| format!("creating {}", parent.display()))?;
                    }
                }
                tracing::info!(path = %path, "Using SQLite storage");
                let pool = sqlite::connect(path)
                    .await
                    .context("opening SQLite database")?;
                Ok(Self {
                    instances: Arc::new(SqliteInstanceRepo::new(pool.clone())),
                    cooldowns: Arc::new(SqliteCooldownRepo::new(pool.clone())),
                    sessions: Arc::new(SqliteSessionRepo::new(pool)),
                })
            }
        }
    }
}

impl App {
    /// Wire every adapter and the gamification service from configuration.
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

        let catalog = match &config.catalog_path {
            Some(path) => InMemoryCatalog::from_path(path)
                .await
                .with_context(|| format!("loading catalog from {path}"))?,
            None => {
                tracing::warn!("CATALOG_PATH not set; no events are configured");
                InMemoryCatalog::new()
            }
        };
        tracing::info!(
            events = catalog.event_count(),
            configs = catalog.config_count(),
            "Catalog loaded"
        );
        let catalog = Arc::new(catalog);

        let storage = Storage::open(&config).await?;
        let transport: Arc<dyn ActionTransportPort> = Arc::new(HttpGameTableTransport::new(
            config.runtime.health_probe_timeout,
        ));
        let connections = Arc::new(GameTableConnections::new());
        let broadcaster = Arc::new(ChannelBroadcaster::new(config.runtime.broadcast_capacity));
        let tasks = BackgroundTasks::new(config.runtime.background_task_limit);

        let cooldowns = Arc::new(CooldownTracker::new(storage.cooldowns, clock.clone()));
        let instances = Arc::new(InstanceManager::new(
            storage.instances,
            Arc::new(StandardObjectiveCalculator),
            Arc::new(ActionExecutor::new(transport.clone())),
            cooldowns.clone(),
            clock.clone(),
        ));
        let probe = Arc::new(PreflightHealthProbe::new(
            catalog.clone(),
            connections.clone(),
            transport,
        ));

        let gamification = Arc::new(GamificationService::new(
            catalog.clone(),
            catalog,
            storage.sessions,
            instances,
            cooldowns,
            connections.clone(),
            probe,
            broadcaster.clone(),
            tasks.clone(),
            clock,
            config.runtime.health_probe_timeout,
        ));

        Ok(Self {
            config,
            gamification,
            connections,
            broadcaster,
            tasks,
        })
    }
}
