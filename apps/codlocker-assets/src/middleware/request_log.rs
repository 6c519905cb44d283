//! Access logging.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header::USER_AGENT, Request},
    middleware::Next,
    response::Response,
};

/// Which request paths get an access log line.
#[derive(Clone, Debug, Default)]
pub struct RequestLogger {
    skips: Arc<HashSet<String>>,
}

impl RequestLogger {
    /// Logs every path except the exact matches in `paths`.
    pub fn with_skips<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skips: Arc::new(paths.into_iter().map(Into::into).collect()),
        }
    }

    pub fn should_log(&self, path: &str) -> bool {
        !self.skips.contains(path)
    }
}

/// Logs method, URI, status, duration and user agent once the handler returns.
pub async fn log_requests(
    State(logger): State<RequestLogger>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !logger.should_log(request.uri().path()) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let start = Instant::now();
    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        duration = ?start.elapsed(),
        ua = ?user_agent,
        "request"
    );

    response
}
