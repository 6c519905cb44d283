//! Database module for the asset service.
//!
//! The service stores nothing; the PostgreSQL pool exists so the readiness
//! probe can report whether the shared database is reachable.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

use crate::config::DatabaseConfig;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database URL is empty")]
    MissingUrl,

    #[error("cannot parse `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("database ping timed out after {0:?}")]
    Timeout(Duration),
}

/// Normalizes a connection URL for sqlx.
///
/// Accepts `jdbc:postgresql://...`, `postgres://...` or a bare
/// `host:port/db`. Configured credentials replace any in the URL, and
/// `sslmode=disable` is added when no `sslmode` is given.
pub fn normalize_dsn(
    raw: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<String, DbError> {
    let mut dsn = raw.trim();
    if dsn.is_empty() {
        return Err(DbError::MissingUrl);
    }

    if dsn
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("jdbc:"))
    {
        dsn = &dsn[5..];
    }

    let with_scheme = if dsn.contains("://") {
        dsn.to_string()
    } else {
        format!("postgres://{}", dsn)
    };

    let invalid = |reason: String| DbError::InvalidUrl {
        url: redact_dsn(raw),
        reason,
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;

    if let Some(user) = username.filter(|u| !u.is_empty()) {
        url.set_username(user)
            .map_err(|_| invalid("URL cannot carry credentials".to_string()))?;
        url.set_password(password.filter(|p| !p.is_empty()))
            .map_err(|_| invalid("URL cannot carry credentials".to_string()))?;
    }

    let has_sslmode = url
        .query_pairs()
        .any(|(key, value)| key == "sslmode" && !value.is_empty());
    if !has_sslmode {
        url.query_pairs_mut().append_pair("sslmode", "disable");
    }

    Ok(url.to_string())
}

/// Hides the password in a connection URL for logging.
pub fn redact_dsn(dsn: &str) -> String {
    let Ok(mut url) = Url::parse(dsn.trim().trim_start_matches("jdbc:")) else {
        return "[REDACTED]".to_string();
    };
    if url.password().is_some() {
        let _ = url.set_password(Some("****"));
    }
    url.to_string()
}

/// Something the readiness probe can ping.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn ping(&self) -> Result<(), DbError>;
}

/// PostgreSQL connection pool used by the readiness probe.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    ping_timeout: Duration,
}

impl Database {
    /// Builds the pool without connecting.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DbError> {
        let raw = config.url.as_deref().ok_or(DbError::MissingUrl)?;
        let dsn = normalize_dsn(
            raw,
            config.username.as_deref(),
            config.password.as_deref(),
        )?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Some(config.max_lifetime()))
            .acquire_timeout(config.ping_timeout())
            .connect_lazy(&dsn)?;

        tracing::debug!("Database pool configured for {}", redact_dsn(&dsn));

        Ok(Self {
            pool,
            ping_timeout: config.ping_timeout(),
        })
    }

    /// Builds the pool and waits for the database to accept connections.
    ///
    /// Pings once a second until `connect_timeout` elapses.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let db = Self::connect_lazy(config)?;
        let deadline = Instant::now() + config.connect_timeout();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match db.ping().await {
                Ok(()) => {
                    tracing::info!(attempt, "Connected to database");
                    return Ok(db);
                }
                Err(e) => e,
            };

            if attempt <= 2 {
                tracing::debug!(attempt, "Database ping failed: {}", err);
            } else if attempt % 5 == 0 {
                tracing::warn!(attempt, "Still waiting for database: {}", err);
            }

            if Instant::now() >= deadline {
                db.pool.close().await;
                return Err(err);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

#[async_trait]
impl ReadinessCheck for Database {
    async fn ping(&self) -> Result<(), DbError> {
        tokio::time::timeout(self.ping_timeout, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|_| DbError::Timeout(self.ping_timeout))??;
        Ok(())
    }
}
