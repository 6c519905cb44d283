//! Offline kill switch.
//!
//! While the `offline` flag is set every request except the probes is
//! rejected with `503`.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use super::PROBE_PATHS;
use crate::error::{AppError, Result};
use crate::services::flags::FlagHandle;

pub async fn offline_gate(
    State(flags): State<FlagHandle>,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let path = request.uri().path();
    if !PROBE_PATHS.contains(&path) && flags.current().offline {
        tracing::debug!(path, "Rejecting request while offline");
        return Err(AppError::Unavailable(
            "service temporarily offline".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
