//! Codlocker asset service library.
//!
//! Serves static binary assets from a storage root with traversal-safe path
//! resolution and content-type sniffing, behind an offline kill switch driven
//! by dynamic flags. This library exposes modules for use in integration tests.

use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod services;

use config::Config;
use db::ReadinessCheck;
use services::flags::FlagHandle;
use services::storage::StorageSelector;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub flags: FlagHandle,
    pub storage: StorageSelector,
    pub readiness: Arc<dyn ReadinessCheck>,
}

impl AppState {
    /// Get a reference to the flag handle.
    pub fn flags(&self) -> &FlagHandle {
        &self.flags
    }

    /// Get a reference to the storage selector.
    pub fn storage(&self) -> &StorageSelector {
        &self.storage
    }

    /// Get a reference to the readiness check.
    pub fn readiness(&self) -> &dyn ReadinessCheck {
        self.readiness.as_ref()
    }
}

/// Build the complete application router.
///
/// The offline gate wraps everything, then the access log, then the routes.
pub fn build_router(state: AppState) -> Router {
    let request_logger = middleware::RequestLogger::with_skips(middleware::PROBE_PATHS);

    Router::new()
        .route("/health", get(api::system::health))
        .route("/ready", get(api::system::ready))
        .route("/_flags", get(api::system::flags))
        .route("/assets/*path", get(api::assets::serve_asset))
        .layer(
            ServiceBuilder::new()
                .layer(axum_mw::from_fn_with_state(
                    state.flags.clone(),
                    middleware::offline_gate,
                ))
                .layer(axum_mw::from_fn_with_state(
                    request_logger,
                    middleware::log_requests,
                )),
        )
        .with_state(state)
}
