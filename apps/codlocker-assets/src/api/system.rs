//! Probe and introspection endpoints.

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::services::flags::LogLevel;
use crate::services::storage::StorageLocation;
use crate::AppState;

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness probe: the database must answer a ping.
pub async fn ready(State(state): State<AppState>) -> Result<&'static str> {
    if let Err(e) = state.readiness().ping().await {
        tracing::warn!("Readiness check failed: {}", e);
        return Err(AppError::Unavailable("db not ready".to_string()));
    }
    Ok("ready")
}

/// Current flag values.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagsResponse {
    pub offline: bool,
    pub log_level: LogLevel,
    pub image_storage_location: StorageLocation,
}

pub async fn flags(State(state): State<AppState>) -> Json<FlagsResponse> {
    let flags = state.flags().current();
    Json(FlagsResponse {
        offline: flags.offline,
        log_level: flags.log_level,
        image_storage_location: flags.image_storage_location,
    })
}
