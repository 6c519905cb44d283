//! Asset serving endpoint.

use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header, Response, StatusCode},
};

use crate::error::{AppError, Result};
use crate::services::assets;
use crate::services::storage::StorageError;
use crate::AppState;

/// Serve an asset at `/assets/*path`.
///
/// The backend is chosen per request from the `imageStorageLocation` flag.
/// Every lookup failure is answered with the same `404`, including paths
/// that do not decode to UTF-8.
pub async fn serve_asset(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Response<Body>> {
    let path = match path {
        Ok(Path(path)) => path,
        Err(rejection) => {
            tracing::debug!("Undecodable asset path: {}", rejection);
            return Err(StorageError::InvalidPath.into());
        }
    };

    let location = state.flags().current().image_storage_location;
    let store = state.storage().select(location);

    let asset = match assets::resolve(store.as_ref(), &path).await {
        Ok(asset) => asset,
        Err(err) => {
            match &err {
                StorageError::Io(detail) => {
                    tracing::error!(path = %path, "Asset read failed: {}", detail)
                }
                _ => tracing::debug!(path = %path, "Asset not found: {}", err),
            }
            return Err(err.into());
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, asset.content_type)
        .header(header::CACHE_CONTROL, state.config.assets.cache_control.as_str())
        .body(Body::from(asset.bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build asset response: {}", e)))
}
