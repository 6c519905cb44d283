use std::sync::Arc;

use codlocker_assets::{
    build_router,
    config::Config,
    db::Database,
    logging,
    services::{
        flags::{self, FlagHandle, FlagPoller, Flags, LogLevel},
        storage::{LocalStorage, StorageSelector},
    },
    AppState,
};

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // Initialize tracing first so we can log configuration loading
    let levels = logging::init_tracing(LogLevel::default());

    tracing::info!("Starting codlocker-assets v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::load() {
        Ok(cfg) => {
            tracing::info!("Configuration loaded successfully");
            tracing::debug!("Server: {}:{}", cfg.server.host, cfg.server.port);
            tracing::debug!("Assets: {:?}", cfg.assets.base_path);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let database = match Database::connect(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Database init failed: {}", e);
            std::process::exit(1);
        }
    };

    // Flags are best effort: a missing or broken source leaves the defaults.
    let flag_handle = FlagHandle::new(Flags::default());
    let source = match flags::build_source(&config.flags) {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!("Feature flags disabled: {}", e);
            None
        }
    };

    let poller = match source {
        Some(source) => {
            flags::initial_refresh(source.as_ref(), &flag_handle, config.flags.init_timeout())
                .await;
            Some(FlagPoller::spawn(
                source,
                config.flags.fetch_interval(),
                flag_handle.clone(),
            ))
        }
        None => {
            tracing::info!("No flag source configured, using defaults");
            None
        }
    };

    let initial_level = flag_handle.current().log_level;
    if let Err(e) = levels.set(initial_level) {
        tracing::warn!("Failed to apply log level {}: {}", initial_level, e);
    }
    tracing::info!("log level set to {}", levels.level());
    let level_watcher = logging::spawn_level_watcher(&flag_handle, levels);

    let storage = StorageSelector::new(LocalStorage::new(config.assets.base_path.clone()));

    let state = AppState {
        config: Arc::new(config.clone()),
        flags: flag_handle,
        storage,
        readiness: Arc::new(database),
    };

    let app = build_router(state);

    let addr = config.server_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("codlocker-assets listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    if let Some(poller) = poller {
        poller.stop().await;
    }
    level_watcher.abort();

    tracing::info!("Shutdown complete");
}
